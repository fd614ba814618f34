//! Release candidate selection
//!
//! Each [`SelectionStrategy`] turns the repository state into the set of
//! packages to release.

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConvoyError, RegistryError, Result};
use crate::traits::{RegistryClient, VersionControlClient};
use crate::types::VersionMode;

use super::changes::{release_tag_pattern, ChangeDetector, ChangeOptions};
use super::graph::PackageGraph;

/// How release candidates are chosen
#[derive(Debug, Clone)]
pub enum SelectionStrategy {
    /// Packages changed since the last release
    Diff(ChangeOptions),
    /// Packages tagged at HEAD
    FromGit,
    /// Packages whose manifest version is missing from the registry
    FromPackage,
    /// Packages changed in the HEAD commit, released as canaries
    Canary(ChangeOptions),
}

impl SelectionStrategy {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Diff(_) => "diff",
            Self::FromGit => "from-git",
            Self::FromPackage => "from-package",
            Self::Canary(_) => "canary",
        }
    }
}

/// Collaborators and settings a strategy selects with
pub struct SelectionContext<'a> {
    pub graph: &'a PackageGraph,
    pub vcs: &'a dyn VersionControlClient,
    pub registry: &'a dyn RegistryClient,
    pub detector: &'a dyn ChangeDetector,
    pub mode: VersionMode,
    pub tag_prefix: &'a str,
    pub include_private: bool,
}

/// Chosen candidates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Candidate package names, in graph order
    pub candidates: Vec<String>,
    /// Whether the user should approve the release
    pub needs_confirmation: bool,
}

impl SelectionStrategy {
    /// Select candidates for this strategy
    pub async fn select(&self, ctx: &SelectionContext<'_>) -> Result<Selection> {
        let names = match self {
            Self::Diff(options) => ctx.detector.collect_updates(ctx.graph, options)?,
            Self::Canary(options) => {
                let options = ChangeOptions {
                    canary: true,
                    ..options.clone()
                };
                ctx.detector.collect_updates(ctx.graph, &options)?
            }
            Self::FromGit => select_from_git(ctx)?,
            Self::FromPackage => select_from_registry(ctx).await?,
        };

        let candidates = finalize(ctx, names)?;
        info!(strategy = self.name(), candidates = candidates.len(), "selected packages");
        Ok(Selection {
            needs_confirmation: !candidates.is_empty(),
            candidates,
        })
    }
}

fn select_from_git(ctx: &SelectionContext<'_>) -> Result<Vec<String>> {
    let pattern = release_tag_pattern(ctx.mode, ctx.tag_prefix);
    let tags = ctx.vcs.list_tags_at_head(&pattern)?;
    debug!(pattern = %pattern, tags = tags.len(), "tags at HEAD");
    if tags.is_empty() {
        return Ok(Vec::new());
    }

    match ctx.mode {
        VersionMode::Independent => Ok(tags
            .iter()
            .filter_map(|tag| tag.rsplit_once('@').map(|(name, _)| name.to_string()))
            .filter(|name| ctx.graph.contains(name))
            .collect()),
        VersionMode::Fixed => {
            let manifests = ctx.vcs.list_changed_manifests_at_head()?;
            Ok(ctx
                .graph
                .nodes()
                .filter(|n| manifests.iter().any(|m| m == n.package.manifest_path()))
                .map(|n| n.name().to_string())
                .collect())
        }
    }
}

async fn select_from_registry(ctx: &SelectionContext<'_>) -> Result<Vec<String>> {
    let mut unpublished = Vec::new();

    for node in ctx.graph.nodes() {
        let Some(version) = node.package.version() else {
            continue;
        };
        if node.package.is_private() && !ctx.include_private {
            continue;
        }

        match ctx.registry.fetch_versions(node.name()).await {
            Ok(versions) if versions.iter().any(|v| v == version) => {
                debug!(package = %node.name(), version, "already on registry");
            }
            Ok(_) | Err(ConvoyError::Registry(RegistryError::NotFound(_))) => {
                unpublished.push(node.name().to_string());
            }
            Err(e) => {
                warn!(
                    package = %node.name(),
                    error = %e,
                    "registry lookup failed, treating package as unpublished"
                );
                unpublished.push(node.name().to_string());
            }
        }
    }

    Ok(unpublished)
}

// Drop private packages, require versions of public ones, restore graph order.
fn finalize(ctx: &SelectionContext<'_>, names: Vec<String>) -> Result<Vec<String>> {
    let mut candidates = Vec::new();
    for node in ctx.graph.nodes() {
        if !names.iter().any(|n| n == node.name()) {
            continue;
        }
        let private = node.package.is_private();
        if private && !ctx.include_private {
            debug!(package = %node.name(), "skipping private package");
            continue;
        }
        if node.package.version().is_none() {
            if private {
                debug!(package = %node.name(), "skipping unversioned private package");
                continue;
            }
            return Err(ConfigError::MissingVersion {
                name: node.name().to_string(),
            }
            .into());
        }
        candidates.push(node.name().to_string());
    }
    Ok(candidates)
}
