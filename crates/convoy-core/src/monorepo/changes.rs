//! Change detection for monorepos

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::traits::VersionControlClient;
use crate::types::VersionMode;

use super::graph::PackageGraph;

/// Tag pattern matching release tags (`v*.*.*` or `*@*`)
pub fn release_tag_pattern(mode: VersionMode, tag_prefix: &str) -> String {
    match mode {
        VersionMode::Fixed => format!("{tag_prefix}*.*.*"),
        VersionMode::Independent => "*@*".to_string(),
    }
}

/// Inputs to change detection
#[derive(Debug, Clone, Default)]
pub struct ChangeOptions {
    /// Compare against this ref instead of the last release tag
    pub since: Option<String>,
    /// Globs (relative to each package) of files that never count as changes
    pub ignore_changes: Vec<String>,
    /// Packages always treated as changed; `*` means all
    pub force: Vec<String>,
    /// Only look at the HEAD commit
    pub canary: bool,
}

/// Finds packages that need a release
pub trait ChangeDetector: Send + Sync {
    /// Names of changed packages and their transitive dependents, in graph order
    fn collect_updates(&self, graph: &PackageGraph, options: &ChangeOptions) -> Result<Vec<String>>;
}

/// Change detector backed by the version control diff since the last release
pub struct DiffChangeDetector {
    vcs: Arc<dyn VersionControlClient>,
    mode: VersionMode,
    tag_prefix: String,
}

impl DiffChangeDetector {
    /// Create a new change detector
    pub fn new(vcs: Arc<dyn VersionControlClient>, mode: VersionMode, tag_prefix: impl Into<String>) -> Self {
        Self {
            vcs,
            mode,
            tag_prefix: tag_prefix.into(),
        }
    }

    fn since_ref(&self, options: &ChangeOptions) -> Result<SinceRef> {
        if options.canary {
            return Ok(SinceRef::Ref("HEAD^".to_string()));
        }
        if let Some(since) = &options.since {
            return Ok(SinceRef::Ref(since.clone()));
        }

        let described = self
            .vcs
            .describe(&release_tag_pattern(self.mode, &self.tag_prefix))?;
        Ok(match described.last_tag {
            None => SinceRef::NoRelease,
            Some(_) if described.ref_count == 0 => SinceRef::HeadReleased,
            Some(tag) => SinceRef::Ref(tag),
        })
    }
}

enum SinceRef {
    Ref(String),
    NoRelease,
    HeadReleased,
}

impl ChangeDetector for DiffChangeDetector {
    fn collect_updates(&self, graph: &PackageGraph, options: &ChangeOptions) -> Result<Vec<String>> {
        let all = graph.names();
        let force_all = options.force.iter().any(|f| f == "*");
        let mut changed: Vec<String> = if force_all {
            all.clone()
        } else {
            all.iter()
                .filter(|name| options.force.contains(name))
                .cloned()
                .collect()
        };

        match self.since_ref(options)? {
            SinceRef::NoRelease => {
                info!("no release tag found, assuming every package changed");
                changed = all;
            }
            SinceRef::HeadReleased => {
                info!("current HEAD is already released, skipping change detection");
            }
            SinceRef::Ref(since) if !force_all => {
                debug!(since = %since, "detecting changes");
                let ignore = build_globset(&options.ignore_changes)?;
                let files = self.vcs.changed_files_since(&since)?;
                for file in &files {
                    if let Some(name) = owning_package(graph, file, &ignore) {
                        if !changed.contains(&name) {
                            changed.push(name);
                        }
                    }
                }
            }
            SinceRef::Ref(_) => {}
        }

        let updates = graph.with_dependents(&changed);
        info!(
            directly_changed = changed.len(),
            updates = updates.len(),
            "change detection complete"
        );
        Ok(updates)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
            field: "publish.ignore_changes".to_string(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    Ok(builder.build().map_err(|e| ConfigError::InvalidValue {
        field: "publish.ignore_changes".to_string(),
        message: e.to_string(),
    })?)
}

// Deepest package location containing `file` wins, so nested packages
// don't count toward their parent.
fn owning_package(graph: &PackageGraph, file: &Path, ignore: &GlobSet) -> Option<String> {
    let owner = graph
        .nodes()
        .filter(|n| file.starts_with(n.package.location()))
        .max_by_key(|n| n.package.location().components().count())?;

    let relative: PathBuf = file
        .strip_prefix(owner.package.location())
        .unwrap_or(file)
        .to_path_buf();
    if ignore.is_match(&relative) {
        debug!(file = %relative.display(), package = %owner.name(), "ignoring change");
        return None;
    }
    Some(owner.name().to_string())
}
