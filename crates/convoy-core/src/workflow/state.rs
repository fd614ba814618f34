//! Release state machine types

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::monorepo::graph::PackageGraph;
use crate::monorepo::selection::Selection;
use crate::monorepo::versioning::VersionPlan;
use crate::types::{ReleaseReport, ReleasedPackage};

/// Stages of a release, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseStage {
    Validate,
    Plan,
    Confirm,
    Mutate,
    Commit,
    Push,
    Publish,
    DistTag,
    Reset,
    Done,
}

impl ReleaseStage {
    /// Stage that follows this one
    pub fn next(self) -> Self {
        match self {
            Self::Validate => Self::Plan,
            Self::Plan => Self::Confirm,
            Self::Confirm => Self::Mutate,
            Self::Mutate => Self::Commit,
            Self::Commit => Self::Push,
            Self::Push => Self::Publish,
            Self::Publish => Self::DistTag,
            Self::DistTag => Self::Reset,
            Self::Reset | Self::Done => Self::Done,
        }
    }

    /// Stage name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Plan => "plan",
            Self::Confirm => "confirm",
            Self::Mutate => "mutate",
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Publish => "publish",
            Self::DistTag => "dist-tag",
            Self::Reset => "reset",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens after a stage ran
#[derive(Debug)]
pub enum Transition {
    /// Move on to the next stage
    Continue,
    /// The stage did nothing; move on
    Skip(String),
    /// Stop here with this outcome
    Finish(ReleaseOutcome),
}

/// How a release run ended
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// Packages were versioned and/or published
    Released(ReleaseReport),
    /// No package needed a release
    NothingToRelease,
    /// The user declined the plan
    Cancelled,
    /// Local branch is behind upstream in an unattended run
    BehindUpstreamInCi,
}

/// Per-run context threaded through every stage
#[derive(Debug)]
pub struct ReleaseState {
    /// The package graph; manifests are mutated in place
    pub graph: PackageGraph,
    /// Branch being released from
    pub branch: Option<String>,
    /// Selected candidates
    pub selection: Selection,
    /// Planned versions
    pub plan: VersionPlan,
    /// Dependency-ordered stages of `plan.packages`
    pub batches: Vec<Vec<String>>,
    /// Manifest versions before mutation
    pub previous_versions: BTreeMap<String, Option<String>>,
    /// Files changed by the mutate stage
    pub mutated_files: Vec<PathBuf>,
    /// Files changed only for publishing
    pub publish_files: Vec<PathBuf>,
    /// Tags created
    pub tags: Vec<String>,
    /// Packages that reached the registry, in publish order
    pub published: Vec<String>,
    /// Packages the registry already had
    pub already_published: Vec<String>,
}

impl ReleaseState {
    /// Fresh state for `graph`
    pub fn new(graph: PackageGraph) -> Self {
        Self {
            graph,
            branch: None,
            selection: Selection::default(),
            plan: VersionPlan::default(),
            batches: Vec::new(),
            previous_versions: BTreeMap::new(),
            mutated_files: Vec::new(),
            publish_files: Vec::new(),
            tags: Vec::new(),
            published: Vec::new(),
            already_published: Vec::new(),
        }
    }

    /// Summary of the run so far
    pub fn report(&self) -> ReleaseReport {
        let mut order: Vec<&String> = self
            .published
            .iter()
            .chain(self.already_published.iter())
            .collect();
        for name in &self.plan.packages {
            if !order.contains(&name) {
                order.push(name);
            }
        }

        let packages = order
            .into_iter()
            .filter_map(|name| {
                let version = self.plan.version_of(name)?;
                Some(ReleasedPackage {
                    name: name.clone(),
                    previous_version: self.previous_versions.get(name).cloned().flatten(),
                    version: version.to_string(),
                    already_published: self.already_published.contains(name),
                })
            })
            .collect();

        ReleaseReport {
            global_version: self.plan.global_version.as_ref().map(ToString::to_string),
            packages,
            tags: self.tags.clone(),
            published: !self.published.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = ReleaseStage::Validate;
        let mut seen = vec![stage];
        while stage != ReleaseStage::Done {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[6], ReleaseStage::Publish);
        assert_eq!(ReleaseStage::Done.next(), ReleaseStage::Done);
    }
}
