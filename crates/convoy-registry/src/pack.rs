//! Tarball creation with `npm pack`

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use sha2::{Digest, Sha512};
use tokio::process::Command;
use tracing::{debug, instrument};

use convoy_core::error::{RegistryError, Result};
use convoy_core::monorepo::package::Package;
use convoy_core::traits::{PackageArchiver, Tarball};

/// Packs packages by running `npm pack` in their publish directory
#[derive(Debug, Clone, Default)]
pub struct NpmPacker {
    npm: Option<String>,
}

impl NpmPacker {
    /// Packer using `npm` from `PATH`
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific npm executable
    pub fn with_npm(mut self, npm: impl Into<String>) -> Self {
        self.npm = Some(npm.into());
        self
    }

    fn npm(&self) -> &str {
        self.npm.as_deref().unwrap_or("npm")
    }
}

/// One entry of `npm pack --json` output
#[derive(Debug, Deserialize)]
pub(crate) struct PackEntry {
    pub filename: String,
    #[serde(default)]
    pub integrity: Option<String>,
    #[serde(default)]
    pub shasum: Option<String>,
}

#[async_trait]
impl PackageArchiver for NpmPacker {
    #[instrument(skip(self, package), fields(package = %package.name()))]
    async fn pack(&self, package: &Package) -> Result<Tarball> {
        let start = Instant::now();
        let dir = package.publish_directory();
        let pack_failed = |reason: String| RegistryError::PackFailed {
            package: package.name().to_string(),
            reason,
        };

        // Lifecycle scripts run through convoy, not npm.
        let output = Command::new(self.npm())
            .args(["pack", "--json", "--ignore-scripts"])
            .current_dir(&dir)
            .output()
            .await
            .map_err(|e| pack_failed(e.to_string()))?;
        if !output.status.success() {
            return Err(pack_failed(String::from_utf8_lossy(&output.stderr).trim().to_string()).into());
        }

        let entry = parse_pack_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| pack_failed("unrecognized npm pack output".to_string()))?;
        let path = dir.join(&entry.filename);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| pack_failed(format!("{}: {}", path.display(), e)))?;
        remove_tarball(&path).await;

        let integrity = entry.integrity.unwrap_or_else(|| integrity_of(&data));
        debug!(
            filename = %entry.filename,
            size = data.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "packed package"
        );

        Ok(Tarball {
            name: package.name().to_string(),
            version: package.version().unwrap_or_default().to_string(),
            filename: entry.filename,
            data,
            integrity,
            shasum: entry.shasum.unwrap_or_default(),
        })
    }
}

/// `sha512-<base64>` subresource integrity of `data`
pub fn integrity_of(data: &[u8]) -> String {
    format!("sha512-{}", BASE64.encode(Sha512::digest(data)))
}

/// First entry of `npm pack --json`; older npm prints only the filename
pub(crate) fn parse_pack_output(stdout: &str) -> Option<PackEntry> {
    if let Ok(entries) = serde_json::from_str::<Vec<PackEntry>>(stdout) {
        return entries.into_iter().next();
    }
    stdout
        .lines()
        .map(str::trim)
        .rfind(|l| l.ends_with(".tgz"))
        .map(|filename| PackEntry {
            filename: filename.to_string(),
            integrity: None,
            shasum: None,
        })
}

async fn remove_tarball(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "could not remove packed tarball");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pack_json() {
        let stdout = r#"[{"id":"a@1.0.0","name":"a","version":"1.0.0","filename":"a-1.0.0.tgz","integrity":"sha512-xyz","shasum":"abc"}]"#;
        let entry = parse_pack_output(stdout).unwrap();
        assert_eq!(entry.filename, "a-1.0.0.tgz");
        assert_eq!(entry.integrity.as_deref(), Some("sha512-xyz"));
        assert_eq!(entry.shasum.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_plain_pack_output() {
        let entry = parse_pack_output("npm notice ...\nscope-a-1.0.0.tgz\n").unwrap();
        assert_eq!(entry.filename, "scope-a-1.0.0.tgz");
        assert!(entry.integrity.is_none());
        assert!(parse_pack_output("").is_none());
    }

    #[test]
    fn test_integrity_of() {
        // sha512 of the empty input
        assert_eq!(
            integrity_of(b""),
            "sha512-z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwvY7kxvUdBeoGlODJ6+SfaPg=="
        );
    }

    #[tokio::test]
    async fn test_missing_npm_is_a_pack_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let package = Package::from_value(
            temp.path(),
            serde_json::json!({ "name": "a", "version": "1.0.0" }),
        )
        .unwrap();
        let packer = NpmPacker::new().with_npm("convoy-test-missing-npm");
        let err = packer.pack(&package).await.unwrap_err();
        assert_eq!(err.code(), "EPACK");
    }
}
