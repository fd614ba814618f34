//! Pre-release repository checks

use globset::Glob;
use tracing::debug;

use crate::error::{ConfigError, GitError, Result};
use crate::traits::VersionControlClient;

/// Whether `branch` matches one of the allowed globs (empty allows all)
pub fn branch_allowed(branch: &str, allowed: &[String]) -> Result<bool> {
    if allowed.is_empty() {
        return Ok(true);
    }
    for pattern in allowed {
        let matcher = Glob::new(pattern)
            .map_err(|e| ConfigError::InvalidValue {
                field: "git.allow_branches".to_string(),
                message: e.to_string(),
            })?
            .compile_matcher();
        if matcher.is_match(branch) {
            debug!(branch, pattern = %pattern, "branch allowed");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fail if the working tree has uncommitted changes
pub fn ensure_clean(vcs: &dyn VersionControlClient) -> Result<()> {
    let changes = vcs.uncommitted_changes()?;
    if changes.is_empty() {
        Ok(())
    } else {
        Err(GitError::DirtyWorkingDirectory(changes.join("\n")).into())
    }
}

/// Current branch, failing on a detached HEAD or a disallowed branch
pub fn ensure_branch(vcs: &dyn VersionControlClient, allowed: &[String]) -> Result<String> {
    let branch = vcs.current_branch()?.ok_or(GitError::DetachedHead)?;
    if !branch_allowed(&branch, allowed)? {
        return Err(GitError::BranchNotAllowed {
            branch,
            allowed: allowed.to_vec(),
        }
        .into());
    }
    Ok(branch)
}
