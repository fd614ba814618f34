//! Git repository operations

use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::{info, instrument};

use convoy_core::error::GitError;

/// Result type for git operations
pub type Result<T> = std::result::Result<T, GitError>;

/// Git repository handle
///
/// Only the working directory is kept; each query opens the repository
/// afresh so the handle can be shared across threads.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open the repository whose working directory is `path`
    #[instrument(fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| open_error(e, path))?;
        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        info!(root = %root.display(), "opened git repository");
        Ok(Self { root })
    }

    /// Discover and open a repository by searching parent directories
    #[instrument(fields(start_path = %start_path.display()))]
    pub fn discover(start_path: &Path) -> Result<Self> {
        let repo = Repository::discover(start_path).map_err(|e| open_error(e, start_path))?;
        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        info!(root = %root.display(), "discovered git repository");
        Ok(Self { root })
    }

    /// Working directory root
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn repo(&self) -> Result<Repository> {
        Repository::open(&self.root).map_err(|e| open_error(e, &self.root))
    }

    /// Get the HEAD commit
    pub(crate) fn head_commit<'r>(&self, repo: &'r Repository) -> Result<git2::Commit<'r>> {
        match repo.head() {
            Ok(head) => head.peel_to_commit().map_err(GitError::Git2),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                Err(GitError::NoCommits)
            }
            Err(e) => Err(GitError::Git2(e)),
        }
    }

    /// Path relative to the working directory, as git expects in pathspecs
    pub(crate) fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

fn open_error(e: git2::Error, path: &Path) -> GitError {
    if e.code() == git2::ErrorCode::NotFound {
        GitError::NotARepository(path.to_path_buf())
    } else {
        GitError::OpenFailed(e.to_string())
    }
}
