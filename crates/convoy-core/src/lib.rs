//! Convoy Core - release engine for multi-package JavaScript repositories
//!
//! This crate provides configuration, the package graph, version planning,
//! change detection and the release state machine. Version control and the
//! package registry are reached through the traits in [`traits`].

pub mod config;
pub mod error;
pub mod monorepo;
pub mod traits;
pub mod types;
pub mod workflow;

pub use config::{Config, ProjectRecord};
pub use error::{ConvoyError, Result};
pub use monorepo::{
    discover_packages, ChangeDetector, DiffChangeDetector, GraphType, Package, PackageGraph,
    SelectionStrategy, VersionPlan, VersionRequest,
};
pub use traits::{
    Confirmation, DescribeResult, LifecycleRunner, PackageArchiver, RegistryClient, Tarball,
    VersionControlClient,
};
pub use types::{ReleaseReport, ReleaseType, ReleasedPackage, VersionMode};
pub use workflow::{Collaborators, ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome};
