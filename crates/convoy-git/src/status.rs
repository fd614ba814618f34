//! Repository status operations

use git2::{Status, StatusOptions};

use convoy_core::error::GitError;

use crate::repository::{GitRepo, Result};

impl GitRepo {
    /// Get the current branch name, `None` when HEAD is detached or unborn
    pub fn current_branch(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        let head = match repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Whether HEAD resolves to a commit
    pub fn is_anything_committed(&self) -> Result<bool> {
        let repo = self.repo()?;
        let result = match self.head_commit(&repo) {
            Ok(_) => Ok(true),
            Err(GitError::NoCommits) => Ok(false),
            Err(e) => Err(e),
        };
        result
    }

    /// Full sha of the HEAD commit
    pub fn head_sha(&self) -> Result<String> {
        let repo = self.repo()?;
        let sha = self.head_commit(&repo)?.id().to_string();
        Ok(sha)
    }

    /// Uncommitted paths in `git status --porcelain` form (`XY path`)
    pub fn uncommitted_changes(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let mut files = Vec::new();
        for entry in statuses.iter() {
            let status = entry.status();
            if status.is_empty() || status.is_ignored() {
                continue;
            }
            if let Some(path) = entry.path() {
                files.push(format!("{} {}", porcelain_code(status), path));
            }
        }
        Ok(files)
    }
}

fn porcelain_code(status: Status) -> String {
    if status.is_wt_new() && !status.is_index_new() {
        return "??".to_string();
    }
    let index = if status.is_index_new() {
        'A'
    } else if status.is_index_modified() || status.is_index_typechange() {
        'M'
    } else if status.is_index_deleted() {
        'D'
    } else if status.is_index_renamed() {
        'R'
    } else {
        ' '
    };
    let worktree = if status.is_wt_modified() || status.is_wt_typechange() {
        'M'
    } else if status.is_wt_deleted() {
        'D'
    } else if status.is_wt_renamed() {
        'R'
    } else {
        ' '
    };
    format!("{index}{worktree}")
}
