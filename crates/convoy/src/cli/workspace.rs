//! Loading the repository, configuration and collaborators for a command

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use convoy_core::config::{load_config_or_default, project_root, Config, ProjectRecord};
use convoy_core::monorepo::package::JsonManifestWriter;
use convoy_core::monorepo::{
    discover_packages, ConventionalCommitRecommender, DiffChangeDetector, PackageGraph,
};
use convoy_core::traits::{AutoConfirm, Confirmation, NoopLifecycle, VersionControlClient};
use convoy_core::workflow::{Collaborators, ReleaseOptions};
use convoy_git::GitRepo;
use convoy_registry::{NpmConfig, NpmPacker, NpmRegistry};

use super::prompt::PromptConfirm;

/// Repository, configuration and project root for one invocation
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub repo: Arc<GitRepo>,
}

impl Workspace {
    /// Discover the repository and configuration from `cwd`
    pub fn load(cwd: &Path) -> anyhow::Result<Self> {
        let repo = GitRepo::discover(cwd)?;
        let (config, config_path) = load_config_or_default(cwd)?;
        let root = match &config_path {
            Some(path) => project_root(path),
            None => repo.root().to_path_buf(),
        };
        info!(
            root = %root.display(),
            config = ?config_path,
            mode = %config.versioning.mode,
            "loaded workspace"
        );
        Ok(Self {
            root,
            config,
            config_path,
            repo: Arc::new(repo),
        })
    }

    /// Discover packages and build their graph
    pub fn graph(&self) -> anyhow::Result<PackageGraph> {
        let packages = discover_packages(&self.root, &self.config.packages)?;
        debug!(count = packages.len(), "discovered packages");
        Ok(PackageGraph::build(packages, self.config.publish.graph_type)?)
    }

    /// Version control client for this workspace
    pub fn vcs(&self) -> Arc<dyn VersionControlClient> {
        self.repo.clone()
    }

    /// Collaborators backed by git, the npm registry and `npm pack`
    pub fn collaborators(
        &self,
        options: &ReleaseOptions,
        graph: &PackageGraph,
        interactive: bool,
    ) -> anyhow::Result<Collaborators> {
        let vcs = self.vcs();
        let registry = NpmRegistry::new(
            NpmConfig::default().with_registry_url(self.config.publish.registry.clone()),
        );
        let recommender = ConventionalCommitRecommender::new(
            vcs.clone(),
            options.mode,
            options.tag_prefix.clone(),
        );

        let confirmation: Arc<dyn Confirmation> = if interactive {
            let current: HashMap<String, Option<String>> = graph
                .nodes()
                .map(|n| (n.name().to_string(), n.package.version().map(str::to_string)))
                .collect();
            Arc::new(PromptConfirm::new(current))
        } else {
            Arc::new(AutoConfirm)
        };

        Ok(Collaborators {
            detector: Arc::new(DiffChangeDetector::new(
                vcs.clone(),
                options.mode,
                options.tag_prefix.clone(),
            )),
            vcs,
            registry: Arc::new(registry),
            archiver: Arc::new(NpmPacker::new()),
            recommender: Some(Arc::new(recommender)),
            lifecycle: Arc::new(NoopLifecycle),
            confirmation,
            writer: Arc::new(JsonManifestWriter),
            record: self.config_path.as_ref().map(ProjectRecord::new),
        })
    }
}

/// Whether we run unattended (the `CI` environment variable is set)
pub fn is_ci() -> bool {
    std::env::var("CI")
        .map(|v| !v.is_empty() && v != "false" && v != "0")
        .unwrap_or(false)
}
