//! Monorepo support for multi-package repositories
//!
//! - Package discovery and manifest handling
//! - Dependency graph with local/external edge resolution
//! - Topological batching with bounded-concurrency stage execution
//! - Version resolution for fixed and independent modes
//! - Change detection and release candidate selection

pub mod batch;
pub mod changes;
pub mod conventional;
pub mod discovery;
pub mod graph;
pub mod package;
pub mod resolve;
pub mod selection;
pub mod versioning;

pub use batch::{batch_packages, run_batched, BatchOptions, BatchOutcome};
pub use changes::{release_tag_pattern, ChangeDetector, ChangeOptions, DiffChangeDetector};
pub use conventional::ConventionalCommitRecommender;
pub use discovery::discover_packages;
pub use graph::{GraphType, PackageGraph, PackageGraphNode};
pub use package::{DependencyKind, JsonManifestWriter, ManifestWriter, Package};
pub use resolve::{GitReference, ResolvedDependency, WorkspaceRange};
pub use selection::{Selection, SelectionContext, SelectionStrategy};
pub use versioning::{
    canary_version, increment, is_breaking_change, resolve_preid, Recommender, VersionPlan,
    VersionRequest, VersionResolver,
};
