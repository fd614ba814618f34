//! Package manifests
//!
//! A [`Package`] keeps its `package.json` as an insertion-ordered JSON
//! object. Fields convoy doesn't understand are carried through untouched
//! when the manifest is written back.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Manifest file name
pub const MANIFEST_FILE: &str = "package.json";

/// One of the dependency maps in a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// `dependencies`
    Dependencies,
    /// `devDependencies`
    Dev,
    /// `peerDependencies`
    Peer,
    /// `optionalDependencies`
    Optional,
}

impl DependencyKind {
    /// All kinds, in manifest order
    pub const ALL: [DependencyKind; 4] = [Self::Dependencies, Self::Dev, Self::Peer, Self::Optional];

    /// Maps a local dependency edge is resolved from, by precedence
    ///
    /// Peer ranges are read last and never rewritten.
    pub const PRECEDENCE: [DependencyKind; 4] = [Self::Dependencies, Self::Optional, Self::Dev, Self::Peer];

    /// Manifest key of this map
    pub fn key(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::Dev => "devDependencies",
            Self::Peer => "peerDependencies",
            Self::Optional => "optionalDependencies",
        }
    }
}

/// A package in the workspace
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    name: String,
    location: PathBuf,
    manifest_path: PathBuf,
    manifest: Map<String, Value>,
}

impl Package {
    /// Load a package from its manifest file
    pub fn load(manifest_path: &Path) -> Result<Self> {
        if !manifest_path.is_file() {
            return Err(ConfigError::ManifestNotFound(manifest_path.to_path_buf()).into());
        }

        let content = std::fs::read_to_string(manifest_path).map_err(ConfigError::Io)?;
        let value: Value =
            serde_json::from_str(&content).map_err(|e| ConfigError::ManifestParse {
                path: manifest_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let location = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let package = Self::from_value(location, value).map_err(|reason| {
            ConfigError::ManifestParse {
                path: manifest_path.to_path_buf(),
                reason,
            }
        })?;

        debug!(name = %package.name, path = %manifest_path.display(), "loaded manifest");
        Ok(package)
    }

    /// Build a package from an in-memory manifest
    pub fn from_value(location: impl Into<PathBuf>, value: Value) -> std::result::Result<Self, String> {
        let Value::Object(manifest) = value else {
            return Err("manifest must be a JSON object".to_string());
        };
        let name = manifest
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| "missing \"name\" field".to_string())?
            .to_string();
        let location = location.into();

        Ok(Self {
            name,
            manifest_path: location.join(MANIFEST_FILE),
            location,
            manifest,
        })
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared version, if any
    pub fn version(&self) -> Option<&str> {
        self.manifest.get("version").and_then(Value::as_str)
    }

    /// Declared version parsed as semver
    pub fn semver(&self) -> Option<semver::Version> {
        self.version().and_then(|v| semver::Version::parse(v).ok())
    }

    /// Set the manifest version
    pub fn set_version(&mut self, version: &str) {
        self.manifest
            .insert("version".to_string(), Value::String(version.to_string()));
    }

    /// Whether the package is marked private
    pub fn is_private(&self) -> bool {
        self.manifest
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Package directory
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of the manifest file
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Raw manifest
    pub fn manifest(&self) -> &Map<String, Value> {
        &self.manifest
    }

    /// `(name, spec)` pairs of one dependency map, in manifest order
    pub fn dependencies(&self, kind: DependencyKind) -> Vec<(&str, &str)> {
        self.manifest
            .get(kind.key())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, spec)| spec.as_str().map(|s| (name.as_str(), s)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Spec declared for `dependency`, from the first map that has it
    pub fn dependency_spec(&self, dependency: &str) -> Option<&str> {
        DependencyKind::PRECEDENCE.iter().find_map(|kind| {
            self.manifest
                .get(kind.key())
                .and_then(|deps| deps.get(dependency))
                .and_then(Value::as_str)
        })
    }

    /// Replace the spec of `dependency` in the map it is resolved from
    ///
    /// Only `dependencies`, `optionalDependencies` and `devDependencies` are
    /// rewritten, in that order; a peer-only dependency is left alone.
    /// Returns whether anything changed.
    pub fn set_dependency_spec(&mut self, dependency: &str, spec: &str) -> bool {
        let kind = DependencyKind::PRECEDENCE
            .into_iter()
            .filter(|kind| *kind != DependencyKind::Peer)
            .find(|kind| {
                self.manifest
                    .get(kind.key())
                    .and_then(|deps| deps.get(dependency))
                    .is_some()
            });
        let Some(kind) = kind else {
            return false;
        };
        match self
            .manifest
            .get_mut(kind.key())
            .and_then(|deps| deps.get_mut(dependency))
        {
            Some(entry) if entry.as_str() != Some(spec) => {
                *entry = Value::String(spec.to_string());
                true
            }
            _ => false,
        }
    }

    /// Directory that gets packed (`publishConfig.directory` or the package root)
    pub fn publish_directory(&self) -> PathBuf {
        self.manifest
            .get("publishConfig")
            .and_then(|c| c.get("directory"))
            .and_then(Value::as_str)
            .map(|dir| self.location.join(dir))
            .unwrap_or_else(|| self.location.clone())
    }

    /// Commit the package was published from
    pub fn git_head(&self) -> Option<&str> {
        self.manifest.get("gitHead").and_then(Value::as_str)
    }

    /// Record the commit the package is published from
    pub fn set_git_head(&mut self, sha: &str) {
        self.manifest
            .insert("gitHead".to_string(), Value::String(sha.to_string()));
    }

    /// Drop the `gitHead` field
    pub fn remove_git_head(&mut self) {
        self.manifest.shift_remove("gitHead");
    }

    /// Serialized manifest: pretty JSON with a trailing newline
    pub fn to_json_string(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.manifest)?;
        out.push('\n');
        Ok(out)
    }
}

/// Persists a mutated package
pub trait ManifestWriter: Send + Sync {
    /// Write the package manifest
    fn write(&self, package: &Package) -> Result<()>;
}

/// Writes `package.json` next to the package
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonManifestWriter;

impl ManifestWriter for JsonManifestWriter {
    fn write(&self, package: &Package) -> Result<()> {
        let content = package.to_json_string()?;
        std::fs::write(package.manifest_path(), content)?;
        debug!(name = %package.name(), "wrote manifest");
        Ok(())
    }
}
