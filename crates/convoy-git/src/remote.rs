//! Remote operations

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::command::run_git;
use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Get list of remote names
    pub fn remotes(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let remotes = repo.remotes()?;
        Ok(remotes
            .iter()
            .filter_map(|r| r.map(|s| s.to_string()))
            .collect())
    }

    /// Whether `branch` exists on `remote`
    #[instrument(skip(self))]
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool> {
        let output = run_git(self.root(), &["ls-remote", "--heads", remote, branch])?;
        let exists = !output.trim().is_empty();
        debug!(remote, branch, exists, "checked remote branch");
        Ok(exists)
    }

    /// Fetch `remote` and compare the local branch with its remote counterpart
    #[instrument(skip(self))]
    pub fn is_behind_upstream(&self, remote: &str, branch: &str) -> Result<bool> {
        let start = Instant::now();
        run_git(self.root(), &["fetch", remote])?;

        let repo = self.repo()?;
        let local = repo.refname_to_id(&format!("refs/heads/{branch}"));
        let upstream = repo.refname_to_id(&format!("refs/remotes/{remote}/{branch}"));
        let (local, upstream) = match (local, upstream) {
            (Ok(local), Ok(upstream)) => (local, upstream),
            _ => {
                warn!(remote, branch, "no remote tracking ref, assuming up to date");
                return Ok(false);
            }
        };

        let (ahead, behind) = repo.graph_ahead_behind(local, upstream)?;
        info!(
            remote,
            branch,
            ahead,
            behind,
            duration_ms = start.elapsed().as_millis() as u64,
            "compared with upstream"
        );
        Ok(behind > 0)
    }

    /// Push the branch and its annotated tags
    #[instrument(skip(self))]
    pub fn push(&self, remote: &str, branch: &str, atomic: bool) -> Result<()> {
        let start = Instant::now();
        let mut args = vec!["push", "--follow-tags", "--no-verify"];
        if atomic {
            args.push("--atomic");
        }
        args.push(remote);
        args.push(branch);
        run_git(self.root(), &args)?;

        info!(
            remote,
            branch,
            atomic,
            duration_ms = start.elapsed().as_millis() as u64,
            "git push with tags (CLI)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::tests::setup_repo;
    use git2::Repository;
    use tempfile::TempDir;

    #[test]
    fn test_remotes_empty() {
        let (_temp, repo) = setup_repo();
        assert!(repo.remotes().unwrap().is_empty());
    }

    #[test]
    fn test_push_and_upstream_against_bare_remote() {
        let (temp, repo) = setup_repo();
        let remote_dir = TempDir::new().unwrap();
        Repository::init_bare(remote_dir.path()).unwrap();
        Repository::open(temp.path())
            .unwrap()
            .remote("origin", remote_dir.path().to_str().unwrap())
            .unwrap();

        let branch = repo.current_branch().unwrap().unwrap();
        assert!(!repo.remote_branch_exists("origin", &branch).unwrap());

        repo.push("origin", &branch, false).unwrap();
        assert!(repo.remote_branch_exists("origin", &branch).unwrap());
        assert!(!repo.is_behind_upstream("origin", &branch).unwrap());
    }

    #[test]
    fn test_push_failure_carries_stderr() {
        let (_temp, repo) = setup_repo();
        let err = repo.push("nowhere", "main", true).unwrap_err();
        assert_eq!(err.code(), "EGIT");
        assert!(err.stderr().is_some());
    }
}
