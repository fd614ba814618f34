//! Commit history and working tree operations

use std::path::{Path, PathBuf};
use std::time::Instant;

use git2::{DiffOptions, Sort};
use tracing::{debug, info, instrument};

use convoy_core::monorepo::package::MANIFEST_FILE;

use crate::command::{lines, run_git};
use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Stage `files` and commit them with `message`
    #[instrument(skip(self, message, files), fields(files = files.len()))]
    pub fn commit_files(&self, message: &str, files: &[PathBuf]) -> Result<()> {
        let start = Instant::now();
        if !files.is_empty() {
            let mut args = vec!["add".to_string(), "--".to_string()];
            args.extend(files.iter().map(|f| self.relative(f).display().to_string()));
            run_git(self.root(), &args)?;
        }
        run_git(self.root(), &["commit", "-m", message])?;
        info!(
            files = files.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "committed"
        );
        Ok(())
    }

    /// Discard working tree changes to `files`
    #[instrument(skip(self, files), fields(files = files.len()))]
    pub fn checkout_files(&self, files: &[PathBuf]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let mut args = vec!["checkout".to_string(), "--".to_string()];
        args.extend(files.iter().map(|f| self.relative(f).display().to_string()));
        run_git(self.root(), &args)?;
        debug!(files = files.len(), "restored files");
        Ok(())
    }

    /// Files that differ between `since` and the working tree
    pub fn changed_files_since(&self, since: &str) -> Result<Vec<PathBuf>> {
        let output = run_git(self.root(), &["diff", "--name-only", since])?;
        let files: Vec<PathBuf> = lines(&output).map(|l| self.root().join(l)).collect();
        debug!(since, count = files.len(), "listed changed files");
        Ok(files)
    }

    /// Manifest files touched by the HEAD commit
    pub fn changed_manifests_at_head(&self) -> Result<Vec<PathBuf>> {
        let output = run_git(
            self.root(),
            &["diff-tree", "--name-only", "--no-commit-id", "--root", "-r", "-c", "HEAD"],
        )?;
        Ok(lines(&output)
            .filter(|l| Path::new(l).file_name().is_some_and(|n| n == MANIFEST_FILE))
            .map(|l| self.root().join(l))
            .collect())
    }

    /// Messages of commits touching `path`, newest first
    ///
    /// History starts after `since` when it resolves, otherwise at the root.
    pub fn commit_messages_since(&self, since: Option<&str>, path: &Path) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let head = self.head_commit(&repo)?;

        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
        revwalk.push(head.id())?;
        if let Some(since) = since {
            match repo.revparse_single(since).and_then(|o| o.peel_to_commit()) {
                Ok(commit) => revwalk.hide(commit.id())?,
                Err(e) => debug!(since, error = %e, "since ref does not resolve, using all history"),
            }
        }

        let relative = self.relative(path);
        let filter_path = !relative.as_os_str().is_empty();
        let mut messages = Vec::new();
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            if filter_path {
                let tree = commit.tree()?;
                let parent_tree = match commit.parent(0) {
                    Ok(parent) => Some(parent.tree()?),
                    Err(_) => None,
                };
                let mut opts = DiffOptions::new();
                opts.pathspec(relative);
                let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))?;
                if diff.deltas().next().is_none() {
                    continue;
                }
            }
            messages.push(commit.message().unwrap_or_default().to_string());
        }

        debug!(path = %relative.display(), count = messages.len(), "read commit messages");
        Ok(messages)
    }
}
