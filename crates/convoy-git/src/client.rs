//! `VersionControlClient` backed by a git repository

use std::path::{Path, PathBuf};

use convoy_core::error::Result;
use convoy_core::traits::{DescribeResult, VersionControlClient};

use crate::repository::GitRepo;

impl VersionControlClient for GitRepo {
    fn current_branch(&self) -> Result<Option<String>> {
        Ok(GitRepo::current_branch(self)?)
    }

    fn is_anything_committed(&self) -> Result<bool> {
        Ok(GitRepo::is_anything_committed(self)?)
    }

    fn uncommitted_changes(&self) -> Result<Vec<String>> {
        Ok(GitRepo::uncommitted_changes(self)?)
    }

    fn is_behind_upstream(&self, remote: &str, branch: &str) -> Result<bool> {
        Ok(GitRepo::is_behind_upstream(self, remote, branch)?)
    }

    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        Ok(GitRepo::remote_branch_exists(self, remote, branch)?)
    }

    fn head_sha(&self) -> Result<String> {
        Ok(GitRepo::head_sha(self)?)
    }

    fn commit(&self, message: &str, files: &[PathBuf]) -> Result<()> {
        Ok(self.commit_files(message, files)?)
    }

    fn tag(&self, name: &str, message: &str) -> Result<()> {
        Ok(self.create_tag(name, message)?)
    }

    fn push(&self, remote: &str, branch: &str, atomic: bool) -> Result<()> {
        Ok(GitRepo::push(self, remote, branch, atomic)?)
    }

    fn describe(&self, pattern: &str) -> Result<DescribeResult> {
        Ok(GitRepo::describe(self, pattern)?)
    }

    fn list_tags_at_head(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self.tags_at_head(pattern)?)
    }

    fn list_changed_manifests_at_head(&self) -> Result<Vec<PathBuf>> {
        Ok(self.changed_manifests_at_head()?)
    }

    fn changed_files_since(&self, since: &str) -> Result<Vec<PathBuf>> {
        Ok(GitRepo::changed_files_since(self, since)?)
    }

    fn commit_messages_since(&self, since: Option<&str>, path: &Path) -> Result<Vec<String>> {
        Ok(GitRepo::commit_messages_since(self, since, path)?)
    }

    fn reset_files(&self, files: &[PathBuf]) -> Result<()> {
        Ok(self.checkout_files(files)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::tests::setup_repo;

    #[test]
    fn test_git_errors_surface_with_codes() {
        let (_temp, repo) = setup_repo();
        let vcs: &dyn VersionControlClient = &repo;
        assert!(vcs.is_anything_committed().unwrap());

        let err = vcs.tag("v1.0.0", "v1.0.0").and_then(|_| vcs.tag("v1.0.0", "v1.0.0"));
        assert_eq!(err.unwrap_err().code(), "ETAGEXISTS");
    }
}
