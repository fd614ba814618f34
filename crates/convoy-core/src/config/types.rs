//! Configuration types

use serde::{Deserialize, Serialize};

use crate::monorepo::graph::GraphType;
use crate::types::VersionMode;

/// Main configuration for convoy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Current shared version (fixed mode only)
    pub version: Option<String>,

    /// Workspace package globs, relative to the repository root
    pub packages: Vec<String>,

    /// Versioning configuration
    pub versioning: VersioningConfig,

    /// Git configuration
    pub git: GitConfig,

    /// Publishing configuration
    pub publish: PublishConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: None,
            packages: vec!["packages/*".to_string()],
            versioning: VersioningConfig::default(),
            git: GitConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

/// Versioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Fixed or independent versioning
    pub mode: VersionMode,

    /// Prefix of fixed-mode release tags
    pub tag_prefix: String,

    /// Pin local dependency ranges to exact versions
    pub exact: bool,

    /// Default prerelease identifier
    pub preid: Option<String>,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            mode: VersionMode::Fixed,
            tag_prefix: "v".to_string(),
            exact: false,
            preid: None,
        }
    }
}

/// Git configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Remote name
    pub remote: String,

    /// Branch globs releases are allowed from (empty = any)
    pub allow_branches: Vec<String>,

    /// Whether to require a clean working directory
    pub require_clean: bool,

    /// Create a release commit
    pub commit: bool,

    /// Create release tags
    pub tag: bool,

    /// Push commit and tags
    pub push: bool,

    /// Revert publish-time manifest edits after publishing
    pub reset: bool,

    /// Commit message template (`{version}` is replaced in fixed mode)
    pub commit_message: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            allow_branches: Vec::new(),
            require_clean: true,
            commit: true,
            tag: true,
            push: true,
            reset: true,
            commit_message: "chore(release): publish {version}".to_string(),
        }
    }
}

/// Publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Dist-tag applied to published versions
    pub dist_tag: String,

    /// Publish under a transient dist-tag first, then move the real one
    pub temp_tag: bool,

    /// Maximum concurrent registry operations within a stage
    pub concurrency: usize,

    /// Registry URL
    pub registry: String,

    /// Which dependency maps form graph edges
    pub graph_type: GraphType,

    /// Fail instead of breaking dependency cycles
    pub reject_cycles: bool,

    /// Release private packages too
    pub include_private: bool,

    /// Globs of changed files that never trigger a release
    pub ignore_changes: Vec<String>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            dist_tag: "latest".to_string(),
            temp_tag: false,
            concurrency: 4,
            registry: "https://registry.npmjs.org".to_string(),
            graph_type: GraphType::AllDependencies,
            reject_cycles: false,
            include_private: false,
            ignore_changes: Vec::new(),
        }
    }
}
