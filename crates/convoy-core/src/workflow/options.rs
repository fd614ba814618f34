//! Release run options

use semver::Version;

use crate::config::{Config, TEMP_DIST_TAG};
use crate::monorepo::changes::ChangeOptions;
use crate::monorepo::selection::SelectionStrategy;
use crate::monorepo::versioning::{VersionRequest, DEFAULT_PREID};
use crate::types::{ReleaseType, VersionMode};

/// Options for a release run
#[derive(Debug, Clone)]
pub struct ReleaseOptions {
    /// How candidates are selected
    pub strategy: SelectionStrategy,
    /// How versions are chosen (diff strategy)
    pub request: VersionRequest,
    /// Fixed or independent versioning
    pub mode: VersionMode,
    /// Recorded shared version (fixed mode)
    pub global_version: Option<Version>,
    /// Prefix of fixed-mode tags
    pub tag_prefix: String,
    /// Pin rewritten dependency ranges exactly
    pub exact: bool,
    /// Remote to push to
    pub remote: String,
    /// Branch globs allowed to release
    pub allow_branches: Vec<String>,
    /// Fail on uncommitted changes
    pub require_clean: bool,
    /// Commit the version bump
    pub commit: bool,
    /// Tag the release commit
    pub tag: bool,
    /// Push commit and tags
    pub push: bool,
    /// Publish to the registry
    pub publish: bool,
    /// Revert publish-time manifest edits afterwards
    pub reset: bool,
    /// Commit message template
    pub commit_message: String,
    /// Dist-tag for published versions
    pub dist_tag: String,
    /// Publish under a temporary dist-tag first
    pub temp_tag: bool,
    /// Concurrent registry operations per stage
    pub concurrency: usize,
    /// Fail on dependency cycles
    pub reject_cycles: bool,
    /// Release private packages too
    pub include_private: bool,
    /// Unattended run (CI)
    pub ci: bool,
    /// Skip confirmation
    pub yes: bool,
    /// Canary prerelease identifier
    pub canary_preid: String,
    /// Canary base increment
    pub canary_base: ReleaseType,
}

impl ReleaseOptions {
    /// Options derived from configuration, selecting by diff
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: SelectionStrategy::Diff(ChangeOptions {
                ignore_changes: config.publish.ignore_changes.clone(),
                ..Default::default()
            }),
            request: VersionRequest::Recommend {
                preid: config.versioning.preid.clone(),
            },
            mode: config.versioning.mode,
            global_version: config
                .version
                .as_deref()
                .and_then(|v| Version::parse(v).ok()),
            tag_prefix: config.versioning.tag_prefix.clone(),
            exact: config.versioning.exact,
            remote: config.git.remote.clone(),
            allow_branches: config.git.allow_branches.clone(),
            require_clean: config.git.require_clean,
            commit: config.git.commit,
            tag: config.git.tag,
            push: config.git.push,
            publish: true,
            reset: config.git.reset,
            commit_message: config.git.commit_message.clone(),
            dist_tag: config.publish.dist_tag.clone(),
            temp_tag: config.publish.temp_tag,
            concurrency: config.publish.concurrency,
            reject_cycles: config.publish.reject_cycles,
            include_private: config.publish.include_private,
            ci: false,
            yes: false,
            canary_preid: config
                .versioning
                .preid
                .clone()
                .unwrap_or_else(|| DEFAULT_PREID.to_string()),
            canary_base: ReleaseType::Minor,
        }
    }

    /// Range prefix for rewritten dependency specs
    pub fn save_prefix(&self) -> &'static str {
        if self.exact {
            ""
        } else {
            "^"
        }
    }

    /// Dist-tag packages are first published under
    pub fn publish_tag(&self) -> &str {
        if self.temp_tag {
            TEMP_DIST_TAG
        } else {
            &self.dist_tag
        }
    }

    /// Whether this run creates a version commit
    pub fn versions_in_git(&self) -> bool {
        matches!(self.strategy, SelectionStrategy::Diff(_))
    }

    /// Whether this run rewrites manifests before publishing
    pub fn mutates_manifests(&self) -> bool {
        matches!(
            self.strategy,
            SelectionStrategy::Diff(_) | SelectionStrategy::Canary(_)
        )
    }

    /// Commit message for the planned release
    pub fn format_commit_message(&self, global: Option<&Version>, packages: &[(String, Version)]) -> String {
        match (self.mode, global) {
            (VersionMode::Fixed, Some(version)) => self
                .commit_message
                .replace("{version}", &format!("{}{}", self.tag_prefix, version)),
            _ => {
                let mut message = self.commit_message.replace(" {version}", "").replace("{version}", "");
                message.push('\n');
                for (name, version) in packages {
                    message.push_str(&format!("\n - {}@{}", name, version));
                }
                message
            }
        }
    }
}
