//! Error types for convoy
//!
//! Every error carries a short machine-checkable code (see [`ConvoyError::code`])
//! alongside its human-readable message.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ConvoyError
pub type Result<T> = std::result::Result<T, ConvoyError>;

/// Main error type for convoy operations
#[derive(Debug, Error)]
pub enum ConvoyError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git-related errors
    #[error(transparent)]
    Git(#[from] GitError),

    /// Version-related errors
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Registry-related errors
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Workflow-related errors
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl ConvoyError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.code(),
            Self::Git(e) => e.code(),
            Self::Version(e) => e.code(),
            Self::Registry(e) => e.code(),
            Self::Workflow(e) => e.code(),
            Self::Io(_) => "EIO",
            Self::Toml(_) => "ETOML",
            Self::Json(_) => "EJSON",
            Self::Other(_) => "EUNKNOWN",
        }
    }
}

/// Configuration-related errors
///
/// These are always raised before any manifest or repository mutation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found at {0}")]
    NotFound(PathBuf),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// Package manifest not found
    #[error("Package manifest not found at {0}")]
    ManifestNotFound(PathBuf),

    /// Package manifest could not be parsed
    #[error("Failed to parse manifest {path}: {reason}")]
    ManifestParse { path: PathBuf, reason: String },

    /// Two packages share a name
    #[error("Package name \"{name}\" used by both {first} and {second}")]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A publishable package has no version field
    #[error("A version field is required in {name}'s package.json file. If you wish to keep the package unversioned, it must be made private.")]
    MissingVersion { name: String },

    /// Dependency cycle found while `reject_cycles` is enabled
    #[error("Dependency cycles detected, you should fix these! {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// TOML editing error
    #[error("Failed to edit configuration: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ENOCONFIG",
            Self::ParseError(_) | Self::TomlEdit(_) => "EBADCONFIG",
            Self::InvalidValue { .. } => "EINVALID",
            Self::ManifestNotFound(_) => "ENOPKG",
            Self::ManifestParse { .. } => "EPKGJSON",
            Self::DuplicatePackage { .. } => "EDUPLICATE",
            Self::MissingVersion { .. } => "ENOVERSION",
            Self::CyclicDependency(_) => "ECYCLE",
            Self::Io(_) => "EIO",
        }
    }
}

/// Git-related errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git repository
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    /// Failed to open repository
    #[error("Failed to open repository: {0}")]
    OpenFailed(String),

    /// No commits found
    #[error("No commits in this repository. Please commit something before using version.")]
    NoCommits,

    /// HEAD is not on a branch
    #[error("Detached git HEAD, please checkout a branch to choose versions.")]
    DetachedHead,

    /// Current branch is not in the allowed list
    #[error("Branch \"{branch}\" is restricted from versioning due to allowed branches {allowed:?}")]
    BranchNotAllowed { branch: String, allowed: Vec<String> },

    /// Upstream branch does not exist
    #[error("Branch \"{branch}\" doesn't exist in remote \"{remote}\".")]
    RemoteBranchMissing { remote: String, branch: String },

    /// Local branch is behind its upstream
    #[error("Local branch \"{branch}\" is behind remote upstream {remote}/{branch}")]
    BehindUpstream { remote: String, branch: String },

    /// Working directory is not clean
    #[error("Working tree has uncommitted changes, please commit or remove the following changes before continuing:\n{0}")]
    DirtyWorkingDirectory(String),

    /// Tag already exists
    #[error("Tag already exists: {0}")]
    TagExists(String),

    /// A git subprocess failed
    #[error("Command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Git2 library error
    #[error("Git error: {0}")]
    Git2(#[from] git2::Error),

    /// IO error spawning git
    #[error("IO error running git: {0}")]
    Io(#[from] std::io::Error),
}

impl GitError {
    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotARepository(_) | Self::OpenFailed(_) => "ENOGIT",
            Self::NoCommits => "ENOCOMMIT",
            Self::DetachedHead => "EDETACHED",
            Self::BranchNotAllowed { .. } => "ENOTALLOWED",
            Self::RemoteBranchMissing { .. } => "ENOREMOTEBRANCH",
            Self::BehindUpstream { .. } => "EBEHIND",
            Self::DirtyWorkingDirectory(_) => "EUNCOMMIT",
            Self::TagExists(_) => "ETAGEXISTS",
            Self::CommandFailed { .. } | Self::Git2(_) | Self::Io(_) => "EGIT",
        }
    }

    /// Stderr of a failed git subprocess, if that is what this error is
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Version-related errors
#[derive(Debug, Error)]
pub enum VersionError {
    /// Failed to parse version
    #[error("Failed to parse version '{0}': {1}")]
    ParseFailed(String, String),

    /// Invalid bump type
    #[error("Invalid bump type: {0}")]
    InvalidBumpType(String),

    /// Recommendation required but no recommender configured
    #[error("No version or increment given and no recommendation strategy is available")]
    NoRecommendation,

    /// Fixed mode needs a current global version
    #[error("Fixed versioning requires a current project version")]
    MissingGlobalVersion,

    /// Semver error
    #[error("Semver error: {0}")]
    Semver(#[from] semver::Error),
}

impl VersionError {
    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseFailed(..) | Self::Semver(_) => "EBADVERSION",
            Self::InvalidBumpType(_) => "EBADBUMP",
            Self::NoRecommendation => "ENORECOMMEND",
            Self::MissingGlobalVersion => "ENOGLOBALVERSION",
        }
    }
}

/// Registry-related errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The exact version is already on the registry
    #[error("{package}@{version} is already published")]
    AlreadyPublished { package: String, version: String },

    /// Publish failed
    #[error("Failed to publish {package}: {reason}")]
    PublishFailed { package: String, reason: String },

    /// Packing failed
    #[error("Failed to pack {package}: {reason}")]
    PackFailed { package: String, reason: String },

    /// Dist-tag update failed
    #[error("Failed to update dist-tag '{tag}' on {package}: {reason}")]
    DistTagFailed {
        package: String,
        tag: String,
        reason: String,
    },

    /// Package lookup failed
    #[error("Failed to fetch {package} from registry: {reason}")]
    LookupFailed { package: String, reason: String },

    /// Authentication failed
    #[error("Authentication failed for registry {registry}: {reason}")]
    AuthenticationFailed { registry: String, reason: String },

    /// Package does not exist on the registry
    #[error("Package not found on registry: {0}")]
    NotFound(String),
}

impl RegistryError {
    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyPublished { .. } => "EPUBLISHCONFLICT",
            Self::PublishFailed { .. } => "EPUBLISH",
            Self::PackFailed { .. } => "EPACK",
            Self::DistTagFailed { .. } => "EDISTTAG",
            Self::LookupFailed { .. } => "ELOOKUP",
            Self::AuthenticationFailed { .. } => "EAUTH",
            Self::NotFound(_) => "E404",
        }
    }
}

/// Workflow-related errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Validation failed
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Step failed
    #[error("Workflow step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// Publishing stopped partway; `published` already reached the registry
    #[error("Publish aborted after {} package(s) succeeded ({}): {source}", published.len(), published.join(", "))]
    PublishAborted {
        published: Vec<String>,
        #[source]
        source: Box<ConvoyError>,
    },

    /// User cancelled
    #[error("Operation cancelled by user")]
    Cancelled,
}

impl WorkflowError {
    /// Short machine-checkable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "EVALIDATION",
            Self::StepFailed { .. } => "ESTEP",
            Self::PublishAborted { .. } => "EPUBLISH",
            Self::Cancelled => "ECANCELLED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_propagate_through_root_error() {
        let err: ConvoyError = ConfigError::MissingVersion {
            name: "pkg".to_string(),
        }
        .into();
        assert_eq!(err.code(), "ENOVERSION");

        let err: ConvoyError = GitError::BehindUpstream {
            remote: "origin".to_string(),
            branch: "main".to_string(),
        }
        .into();
        assert_eq!(err.code(), "EBEHIND");
    }

    #[test]
    fn test_cycle_message_names_packages() {
        let err = ConfigError::CyclicDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_publish_aborted_lists_published() {
        let err = WorkflowError::PublishAborted {
            published: vec!["core".to_string()],
            source: Box::new(ConvoyError::other("boom")),
        };
        assert_eq!(err.code(), "EPUBLISH");
        assert!(err.to_string().contains("core"));
    }
}
