//! Persisted project-level version record

use std::path::{Path, PathBuf};

use toml_edit::{value, DocumentMut};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// The shared version stored at the top of the config file
///
/// Edits go through `toml_edit` so comments and layout survive.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    path: PathBuf,
}

impl ProjectRecord {
    /// Record backed by the given config file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded version, if any
    pub fn version(&self) -> Result<Option<String>> {
        let doc = self.load()?;
        Ok(doc
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Write a new version into the record
    pub fn set_version(&self, version: &str) -> Result<()> {
        let mut doc = self.load()?;
        doc["version"] = value(version);
        std::fs::write(&self.path, doc.to_string()).map_err(ConfigError::Io)?;
        debug!(path = %self.path.display(), version, "updated project version record");
        Ok(())
    }

    fn load(&self) -> Result<DocumentMut> {
        let content = if self.path.exists() {
            std::fs::read_to_string(&self.path).map_err(ConfigError::Io)?
        } else {
            String::new()
        };
        Ok(content.parse::<DocumentMut>().map_err(ConfigError::TomlEdit)?)
    }
}
