//! Core types for convoy

use serde::{Deserialize, Serialize};

/// Semver increment keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    /// Major version bump (breaking changes)
    Major,
    /// Minor version bump (new features)
    Minor,
    /// Patch version bump (bug fixes)
    Patch,
    /// Next major as a prerelease
    Premajor,
    /// Next minor as a prerelease
    Preminor,
    /// Next patch as a prerelease
    Prepatch,
    /// Increment the prerelease counter
    Prerelease,
}

impl ReleaseType {
    /// Returns the string representation of the release type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Premajor => "premajor",
            Self::Preminor => "preminor",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        }
    }

    /// Whether this increment produces a prerelease version
    pub fn is_prerelease(&self) -> bool {
        matches!(
            self,
            Self::Premajor | Self::Preminor | Self::Prepatch | Self::Prerelease
        )
    }

    /// The non-prerelease increment underlying this one (`prepatch` -> `patch`)
    ///
    /// `prerelease` has no single base and maps to `patch`.
    pub fn base(&self) -> Self {
        match self {
            Self::Major | Self::Premajor => Self::Major,
            Self::Minor | Self::Preminor => Self::Minor,
            Self::Patch | Self::Prepatch | Self::Prerelease => Self::Patch,
        }
    }

    /// The prerelease counterpart of this increment (`minor` -> `preminor`)
    pub fn to_prerelease(&self) -> Self {
        match self {
            Self::Major | Self::Premajor => Self::Premajor,
            Self::Minor | Self::Preminor => Self::Preminor,
            Self::Patch | Self::Prepatch => Self::Prepatch,
            Self::Prerelease => Self::Prerelease,
        }
    }
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "premajor" => Ok(Self::Premajor),
            "preminor" => Ok(Self::Preminor),
            "prepatch" => Ok(Self::Prepatch),
            "prerelease" | "pre" => Ok(Self::Prerelease),
            _ => Err(format!("Unknown release type: {}", s)),
        }
    }
}

/// Versioning mode for the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionMode {
    /// All packages share one version number
    #[default]
    Fixed,
    /// Each package has its own version
    Independent,
}

impl std::fmt::Display for VersionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Independent => write!(f, "independent"),
        }
    }
}

/// Outcome for a single released package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedPackage {
    /// The package name
    pub name: String,
    /// Version before the release, if the manifest had one
    pub previous_version: Option<String>,
    /// Version that was released
    pub version: String,
    /// Whether the registry already had this version
    pub already_published: bool,
}

/// Summary of a completed release run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseReport {
    /// Shared version (fixed mode only)
    pub global_version: Option<String>,
    /// Packages whose versions were planned, in publish order when published
    pub packages: Vec<ReleasedPackage>,
    /// Git tags created
    pub tags: Vec<String>,
    /// Whether anything reached the registry
    pub published: bool,
}

impl ReleaseReport {
    /// Names of packages in the report
    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_release_type_from_str() {
        assert_eq!(ReleaseType::from_str("major").unwrap(), ReleaseType::Major);
        assert_eq!(ReleaseType::from_str("MINOR").unwrap(), ReleaseType::Minor);
        assert_eq!(ReleaseType::from_str("prepatch").unwrap(), ReleaseType::Prepatch);
        assert!(ReleaseType::from_str("invalid").is_err());
    }

    #[test]
    fn test_release_type_base() {
        assert_eq!(ReleaseType::Prepatch.base(), ReleaseType::Patch);
        assert_eq!(ReleaseType::Premajor.base(), ReleaseType::Major);
        assert_eq!(ReleaseType::Minor.base(), ReleaseType::Minor);
        assert!(ReleaseType::Prerelease.is_prerelease());
        assert!(!ReleaseType::Patch.is_prerelease());
    }
}
