//! Collaborator traits
//!
//! The release engine talks to version control, the registry, the packer,
//! lifecycle scripts and the user only through these interfaces.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::monorepo::package::Package;
use crate::monorepo::versioning::VersionPlan;

/// Output of `git describe` against a tag pattern
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DescribeResult {
    /// Most recent matching tag reachable from HEAD
    pub last_tag: Option<String>,
    /// Commits since that tag (or since the root commit without one)
    pub ref_count: u64,
    /// Abbreviated HEAD sha
    pub sha: String,
    /// Whether the working tree has uncommitted changes
    pub is_dirty: bool,
}

/// Version control operations used during a release
pub trait VersionControlClient: Send + Sync {
    /// Current branch name, `None` when HEAD is detached
    fn current_branch(&self) -> Result<Option<String>>;

    /// Whether HEAD points at a commit
    fn is_anything_committed(&self) -> Result<bool>;

    /// Uncommitted paths, empty when the working tree is clean
    fn uncommitted_changes(&self) -> Result<Vec<String>>;

    /// Whether `remote/branch` has commits the local branch lacks
    fn is_behind_upstream(&self, remote: &str, branch: &str) -> Result<bool>;

    /// Whether `branch` exists on `remote`
    fn remote_branch_exists(&self, remote: &str, branch: &str) -> Result<bool>;

    /// Full sha of HEAD
    fn head_sha(&self) -> Result<String>;

    /// Stage `files` and commit them
    fn commit(&self, message: &str, files: &[PathBuf]) -> Result<()>;

    /// Create an annotated tag at HEAD
    fn tag(&self, name: &str, message: &str) -> Result<()>;

    /// Push the branch and its tags; `atomic` requests `--atomic`
    fn push(&self, remote: &str, branch: &str, atomic: bool) -> Result<()>;

    /// Describe HEAD against tags matching `pattern`
    fn describe(&self, pattern: &str) -> Result<DescribeResult>;

    /// Tags pointing at HEAD that match `pattern`
    fn list_tags_at_head(&self, pattern: &str) -> Result<Vec<String>>;

    /// Manifest files touched by the HEAD commit, as absolute paths
    fn list_changed_manifests_at_head(&self) -> Result<Vec<PathBuf>>;

    /// Files changed between `since` and HEAD, as absolute paths
    fn changed_files_since(&self, since: &str) -> Result<Vec<PathBuf>>;

    /// Commit messages touching `path` since `since` (all history when `None`
    /// or when `since` does not resolve)
    fn commit_messages_since(&self, since: Option<&str>, path: &Path) -> Result<Vec<String>>;

    /// Discard working tree changes to `files`
    fn reset_files(&self, files: &[PathBuf]) -> Result<()>;
}

/// A packed package ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tarball {
    /// Package name
    pub name: String,
    /// Package version
    pub version: String,
    /// Archive file name
    pub filename: String,
    /// Archive contents
    pub data: Vec<u8>,
    /// `sha512-<base64>` subresource integrity
    pub integrity: String,
    /// Hex sha1 reported by the packer
    pub shasum: String,
}

/// Registry operations used during a release
#[async_trait::async_trait]
pub trait RegistryClient: Send + Sync {
    /// Publish a tarball under `dist_tag`
    ///
    /// Fails with `RegistryError::AlreadyPublished` when the exact version
    /// already exists.
    async fn publish(&self, manifest: &Map<String, Value>, tarball: &Tarball, dist_tag: &str) -> Result<()>;

    /// Every version the registry has for `name`
    ///
    /// Fails with `RegistryError::NotFound` for unknown packages.
    async fn fetch_versions(&self, name: &str) -> Result<Vec<String>>;

    /// Point `tag` at `version`
    async fn add_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()>;

    /// Remove `tag`
    async fn remove_dist_tag(&self, name: &str, tag: &str) -> Result<()>;
}

/// Produces a publishable tarball for a package
#[async_trait::async_trait]
pub trait PackageArchiver: Send + Sync {
    /// Pack the package's publish directory
    async fn pack(&self, package: &Package) -> Result<Tarball>;
}

/// Lifecycle script stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    Preversion,
    Version,
    Postversion,
    Prepublish,
    Prepack,
    Postpack,
    Publish,
    Postpublish,
}

impl LifecycleStage {
    /// Script name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preversion => "preversion",
            Self::Version => "version",
            Self::Postversion => "postversion",
            Self::Prepublish => "prepublish",
            Self::Prepack => "prepack",
            Self::Postpack => "postpack",
            Self::Publish => "publish",
            Self::Postpublish => "postpublish",
        }
    }
}

impl std::fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a lifecycle script runs for
#[derive(Debug, Clone, Copy)]
pub enum LifecycleTarget<'a> {
    /// The repository root
    Root,
    /// One package
    Package(&'a Package),
}

/// Runs lifecycle scripts; convoy only guarantees the call order
pub trait LifecycleRunner: Send + Sync {
    /// Run `stage` for `target`
    fn run(&self, target: LifecycleTarget<'_>, stage: LifecycleStage) -> Result<()>;
}

/// Lifecycle runner that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycle;

impl LifecycleRunner for NoopLifecycle {
    fn run(&self, _target: LifecycleTarget<'_>, _stage: LifecycleStage) -> Result<()> {
        Ok(())
    }
}

/// Asks the user to approve a version plan
pub trait Confirmation: Send + Sync {
    /// Whether to go ahead with `plan`
    fn confirm(&self, plan: &VersionPlan) -> Result<bool>;
}

/// Approves every plan
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

impl Confirmation for AutoConfirm {
    fn confirm(&self, _plan: &VersionPlan) -> Result<bool> {
        Ok(true)
    }
}
