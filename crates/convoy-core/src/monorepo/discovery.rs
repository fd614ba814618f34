//! Package discovery in monorepos

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glob::glob;
use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::package::{Package, MANIFEST_FILE};

/// Discover packages matching workspace globs under `root`
///
/// Directories matched by a wildcard pattern without a manifest are
/// skipped; a literal pattern that names a directory without one is an
/// error. Packages come back sorted by location.
pub fn discover_packages(root: &Path, patterns: &[String]) -> Result<Vec<Package>> {
    debug!(root = %root.display(), patterns = patterns.len(), "discovering packages");
    let mut by_location: HashMap<PathBuf, Package> = HashMap::new();

    for pattern in patterns {
        let full_pattern = if pattern == "." {
            root.to_string_lossy().to_string()
        } else {
            root.join(pattern).to_string_lossy().to_string()
        };
        let literal = !pattern.contains(['*', '?', '[']);

        let entries = glob(&full_pattern).map_err(|e| ConfigError::InvalidValue {
            field: "packages".to_string(),
            message: e.to_string(),
        })?;

        for entry in entries {
            let path = entry.map_err(|e| ConfigError::InvalidValue {
                field: "packages".to_string(),
                message: e.to_string(),
            })?;

            if path.components().any(|c| c.as_os_str() == "node_modules") {
                continue;
            }

            let manifest_path = if path.is_dir() {
                path.join(MANIFEST_FILE)
            } else if path.file_name().is_some_and(|f| f == MANIFEST_FILE) {
                path.clone()
            } else {
                continue;
            };

            if !manifest_path.exists() {
                if literal {
                    return Err(ConfigError::ManifestNotFound(manifest_path).into());
                }
                continue;
            }

            let package = Package::load(&manifest_path)?;
            by_location.insert(package.location().to_path_buf(), package);
        }
    }

    let mut packages: Vec<Package> = by_location.into_values().collect();
    packages.sort_by(|a, b| a.location().cmp(b.location()));

    info!(count = packages.len(), "discovered packages");
    Ok(packages)
}
