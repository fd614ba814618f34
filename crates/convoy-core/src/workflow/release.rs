//! Release orchestration
//!
//! [`ReleaseOrchestrator::run`] drives a [`ReleaseState`] through the
//! [`ReleaseStage`]s in order. Each stage either continues, skips itself
//! with a logged reason, or finishes the run early.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use semver::Version;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ProjectRecord, TEMP_DIST_TAG};
use crate::error::{ConvoyError, GitError, RegistryError, Result, VersionError, WorkflowError};
use crate::monorepo::batch::{batch_packages, run_batched, BatchOptions};
use crate::monorepo::changes::ChangeDetector;
use crate::monorepo::graph::PackageGraph;
use crate::monorepo::package::{ManifestWriter, Package};
use crate::monorepo::resolve::ResolvedDependency;
use crate::monorepo::selection::{SelectionContext, SelectionStrategy};
use crate::monorepo::versioning::{Recommender, VersionPlan, VersionResolver};
use crate::traits::{
    Confirmation, LifecycleRunner, LifecycleStage, LifecycleTarget, PackageArchiver,
    RegistryClient, VersionControlClient,
};
use crate::types::VersionMode;

use super::options::ReleaseOptions;
use super::push::push_with_fallback;
use super::state::{ReleaseOutcome, ReleaseStage, ReleaseState, Transition};
use super::validation::{ensure_branch, ensure_clean};

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub vcs: Arc<dyn VersionControlClient>,
    pub registry: Arc<dyn RegistryClient>,
    pub archiver: Arc<dyn PackageArchiver>,
    pub detector: Arc<dyn ChangeDetector>,
    pub recommender: Option<Arc<dyn Recommender>>,
    pub lifecycle: Arc<dyn LifecycleRunner>,
    pub confirmation: Arc<dyn Confirmation>,
    pub writer: Arc<dyn ManifestWriter>,
    /// Where the fixed-mode version is persisted
    pub record: Option<ProjectRecord>,
}

/// Drives a release from validation to reset
pub struct ReleaseOrchestrator {
    options: ReleaseOptions,
    collaborators: Collaborators,
}

impl ReleaseOrchestrator {
    /// Create an orchestrator
    pub fn new(options: ReleaseOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
        }
    }

    /// Options this orchestrator runs with
    pub fn options(&self) -> &ReleaseOptions {
        &self.options
    }

    /// Run every stage against `graph`
    #[instrument(skip_all, fields(strategy = self.options.strategy.name(), mode = %self.options.mode))]
    pub async fn run(&self, graph: PackageGraph) -> Result<ReleaseOutcome> {
        let start = Instant::now();
        let mut state = ReleaseState::new(graph);
        let mut stage = ReleaseStage::Validate;

        while stage != ReleaseStage::Done {
            let stage_start = Instant::now();
            match self.run_stage(stage, &mut state).await? {
                Transition::Continue => {
                    debug!(
                        stage = %stage,
                        duration_ms = stage_start.elapsed().as_millis() as u64,
                        "stage complete"
                    );
                }
                Transition::Skip(reason) => {
                    info!(stage = %stage, reason = %reason, "skipping stage");
                }
                Transition::Finish(outcome) => {
                    info!(stage = %stage, outcome = ?outcome, "release finished early");
                    return Ok(outcome);
                }
            }
            stage = stage.next();
        }

        let report = state.report();
        info!(
            packages = report.packages.len(),
            published = report.published,
            tags = report.tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "release complete"
        );
        Ok(ReleaseOutcome::Released(report))
    }

    async fn run_stage(&self, stage: ReleaseStage, state: &mut ReleaseState) -> Result<Transition> {
        match stage {
            ReleaseStage::Validate => self.validate(state),
            ReleaseStage::Plan => self.plan(state).await,
            ReleaseStage::Confirm => self.confirm(state),
            ReleaseStage::Mutate => self.mutate(state),
            ReleaseStage::Commit => self.commit(state),
            ReleaseStage::Push => self.push(state),
            ReleaseStage::Publish => self.publish(state).await,
            ReleaseStage::DistTag => self.finalize_dist_tags(state).await,
            ReleaseStage::Reset => self.reset(state),
            ReleaseStage::Done => Ok(Transition::Continue),
        }
    }

    fn validate(&self, state: &mut ReleaseState) -> Result<Transition> {
        let vcs = self.collaborators.vcs.as_ref();
        if !vcs.is_anything_committed()? {
            return Err(GitError::NoCommits.into());
        }
        if self.options.require_clean {
            ensure_clean(vcs)?;
        }

        let writes_git = self.options.versions_in_git() && (self.options.commit || self.options.push);
        if !writes_git {
            state.branch = vcs.current_branch()?;
            return Ok(Transition::Continue);
        }

        let branch = ensure_branch(vcs, &self.options.allow_branches)?;
        if self.options.push {
            let remote = &self.options.remote;
            if !vcs.remote_branch_exists(remote, &branch)? {
                return Err(GitError::RemoteBranchMissing {
                    remote: remote.clone(),
                    branch,
                }
                .into());
            }
            if vcs.is_behind_upstream(remote, &branch)? {
                if self.options.ci {
                    warn!(
                        remote = %remote,
                        branch = %branch,
                        "local branch is behind upstream, exiting without a release"
                    );
                    return Ok(Transition::Finish(ReleaseOutcome::BehindUpstreamInCi));
                }
                return Err(GitError::BehindUpstream {
                    remote: remote.clone(),
                    branch,
                }
                .into());
            }
        }

        state.branch = Some(branch);
        Ok(Transition::Continue)
    }

    async fn plan(&self, state: &mut ReleaseState) -> Result<Transition> {
        let graph = &state.graph;
        let ctx = SelectionContext {
            graph,
            vcs: self.collaborators.vcs.as_ref(),
            registry: self.collaborators.registry.as_ref(),
            detector: self.collaborators.detector.as_ref(),
            mode: self.options.mode,
            tag_prefix: &self.options.tag_prefix,
            include_private: self.options.include_private,
        };
        let selection = self.options.strategy.select(&ctx).await?;
        if selection.candidates.is_empty() {
            info!("no changed packages to release");
            return Ok(Transition::Finish(ReleaseOutcome::NothingToRelease));
        }

        let plan = match &self.options.strategy {
            SelectionStrategy::Diff(_) => {
                let mut resolver = VersionResolver::new(graph, self.options.mode)
                    .with_global_version(self.options.global_version.clone())
                    .include_private(self.options.include_private);
                if let Some(recommender) = &self.collaborators.recommender {
                    resolver = resolver.with_recommender(recommender.as_ref());
                }
                resolver.plan(&selection.candidates, &self.options.request)?
            }
            SelectionStrategy::Canary(_) => {
                let vcs = self.collaborators.vcs.as_ref();
                VersionResolver::new(graph, self.options.mode).plan_canary(
                    &selection.candidates,
                    self.options.canary_base,
                    &self.options.canary_preid,
                    &self.options.tag_prefix,
                    |pattern| vcs.describe(pattern),
                )?
            }
            SelectionStrategy::FromGit | SelectionStrategy::FromPackage => {
                manifest_plan(graph, &selection.candidates)?
            }
        };

        let batches = batch_packages(
            graph,
            &plan.packages,
            BatchOptions {
                reject_cycles: self.options.reject_cycles,
                sort: true,
            },
        )?;

        let previous_versions: BTreeMap<String, Option<String>> = plan
            .packages
            .iter()
            .map(|name| {
                let version = graph
                    .get(name)
                    .and_then(|n| n.package.version())
                    .map(str::to_string);
                (name.clone(), version)
            })
            .collect();

        info!(
            packages = plan.packages.len(),
            stages = batches.len(),
            global_version = ?plan.global_version.as_ref().map(ToString::to_string),
            "release planned"
        );
        state.selection = selection;
        state.plan = plan;
        state.batches = batches;
        state.previous_versions = previous_versions;
        Ok(Transition::Continue)
    }

    fn confirm(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !state.selection.needs_confirmation {
            return Ok(Transition::Skip("confirmation not required".to_string()));
        }
        if self.options.yes || self.options.ci {
            return Ok(Transition::Skip("auto-confirmed".to_string()));
        }
        if self.collaborators.confirmation.confirm(&state.plan)? {
            Ok(Transition::Continue)
        } else {
            info!("release cancelled by user");
            Ok(Transition::Finish(ReleaseOutcome::Cancelled))
        }
    }

    fn mutate(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.mutates_manifests() {
            return Ok(Transition::Skip("versions come from manifests".to_string()));
        }
        let canary = matches!(self.options.strategy, SelectionStrategy::Canary(_));
        let lifecycle = self.collaborators.lifecycle.as_ref();

        if !canary {
            lifecycle.run(LifecycleTarget::Root, LifecycleStage::Preversion)?;
            self.run_package_lifecycle(state, LifecycleStage::Preversion)?;
        }

        let prefix = self.options.save_prefix();
        for name in state.plan.packages.clone() {
            let Some(version) = state.plan.version_of(&name).cloned() else {
                continue;
            };
            let rewrites: Vec<(String, String)> = match state.graph.get(&name) {
                Some(node) => node
                    .local_dependencies
                    .iter()
                    .filter_map(|(dep, resolved)| {
                        let next = state.plan.version_of(dep)?;
                        resolved.rewritten(next, prefix).map(|spec| (dep.clone(), spec))
                    })
                    .collect(),
                None => continue,
            };

            let Some(package) = state.graph.package_mut(&name) else {
                continue;
            };
            package.set_version(&version.to_string());
            for (dep, spec) in &rewrites {
                package.set_dependency_spec(dep, spec);
            }
            self.collaborators.writer.write(package)?;
            debug!(package = %name, version = %version, rewritten = rewrites.len(), "updated manifest");
            state.mutated_files.push(package.manifest_path().to_path_buf());
        }

        if !canary {
            self.run_package_lifecycle(state, LifecycleStage::Version)?;
            if let (VersionMode::Fixed, Some(global), Some(record)) = (
                self.options.mode,
                state.plan.global_version.as_ref(),
                self.collaborators.record.as_ref(),
            ) {
                record.set_version(&global.to_string())?;
                state.mutated_files.push(record.path().to_path_buf());
            }
            lifecycle.run(LifecycleTarget::Root, LifecycleStage::Version)?;
        }

        Ok(Transition::Continue)
    }

    fn commit(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.versions_in_git() {
            return Ok(Transition::Skip("no version commit for this strategy".to_string()));
        }
        let vcs = self.collaborators.vcs.as_ref();

        if self.options.commit {
            let versions: Vec<(String, Version)> = state
                .plan
                .packages
                .iter()
                .filter_map(|name| Some((name.clone(), state.plan.version_of(name)?.clone())))
                .collect();
            let message = self
                .options
                .format_commit_message(state.plan.global_version.as_ref(), &versions);
            vcs.commit(&message, &state.mutated_files)?;
            info!(files = state.mutated_files.len(), "committed version changes");

            if self.options.tag {
                let tags: Vec<String> = match (self.options.mode, &state.plan.global_version) {
                    (VersionMode::Fixed, Some(global)) => {
                        vec![format!("{}{}", self.options.tag_prefix, global)]
                    }
                    _ => versions
                        .iter()
                        .map(|(name, version)| format!("{name}@{version}"))
                        .collect(),
                };
                for tag in tags {
                    vcs.tag(&tag, &tag)?;
                    debug!(tag = %tag, "created tag");
                    state.tags.push(tag);
                }
            }
        } else {
            info!("commit disabled, leaving version changes in the working tree");
        }

        self.run_package_lifecycle(state, LifecycleStage::Postversion)?;
        self.collaborators
            .lifecycle
            .run(LifecycleTarget::Root, LifecycleStage::Postversion)?;
        Ok(Transition::Continue)
    }

    fn push(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.versions_in_git() {
            return Ok(Transition::Skip("nothing to push for this strategy".to_string()));
        }
        if !self.options.push {
            return Ok(Transition::Skip("push disabled".to_string()));
        }
        if !self.options.commit {
            return Ok(Transition::Skip("nothing committed".to_string()));
        }

        let branch = state.branch.as_deref().ok_or(GitError::DetachedHead)?;
        push_with_fallback(self.collaborators.vcs.as_ref(), &self.options.remote, branch)?;
        Ok(Transition::Continue)
    }

    async fn publish(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.publish {
            return Ok(Transition::Skip("publishing disabled".to_string()));
        }

        let git_head = self.collaborators.vcs.head_sha()?;
        let prefix = self.options.save_prefix();
        let mut prepared: HashMap<String, Package> = HashMap::new();

        for name in &state.plan.packages {
            let Some(node) = state.graph.get(name) else {
                continue;
            };
            if node.package.is_private() {
                debug!(package = %name, "private package is never published");
                continue;
            }

            let mut package = node.package.clone();
            for dep in node.local_dependencies.keys() {
                let target_version = state
                    .plan
                    .version_of(dep)
                    .cloned()
                    .or_else(|| state.graph.get(dep).and_then(|n| n.package.semver()));
                let resolved = package
                    .dependency_spec(dep)
                    .and_then(|spec| ResolvedDependency::parse(spec, package.location()));
                if let (Some(version), Some(resolved)) = (target_version, resolved) {
                    if let Some(spec) = resolved.resolve_for_publish(&version, prefix) {
                        package.set_dependency_spec(dep, &spec);
                    }
                }
            }
            package.set_git_head(&git_head);
            self.collaborators.writer.write(&package)?;
            state.publish_files.push(package.manifest_path().to_path_buf());
            prepared.insert(name.clone(), package);
        }

        let batches: Vec<Vec<String>> = state
            .batches
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .filter(|name| prepared.contains_key(*name))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .filter(|stage| !stage.is_empty())
            .collect();

        let prepared = Arc::new(prepared);
        let registry = self.collaborators.registry.clone();
        let archiver = self.collaborators.archiver.clone();
        let lifecycle = self.collaborators.lifecycle.clone();
        let dist_tag = self.options.publish_tag().to_string();

        let outcome = run_batched(&batches, self.options.concurrency, |name| {
            let prepared = prepared.clone();
            let registry = registry.clone();
            let archiver = archiver.clone();
            let lifecycle = lifecycle.clone();
            let dist_tag = dist_tag.clone();
            async move {
                match prepared.get(&name) {
                    Some(package) => {
                        publish_one(
                            package,
                            registry.as_ref(),
                            archiver.as_ref(),
                            lifecycle.as_ref(),
                            &dist_tag,
                        )
                        .await
                    }
                    None => Err(ConvoyError::other(format!("no publish manifest for {name}"))),
                }
            }
        })
        .await;

        for (name, already) in outcome.completed {
            if already {
                state.already_published.push(name);
            } else {
                state.published.push(name);
            }
        }
        if let Some((name, err)) = outcome.failure {
            error!(package = %name, error = %err, published = state.published.len(), "publish failed");
            return Err(WorkflowError::PublishAborted {
                published: state.published.clone(),
                source: Box::new(err),
            }
            .into());
        }

        self.collaborators
            .lifecycle
            .run(LifecycleTarget::Root, LifecycleStage::Postpublish)?;
        Ok(Transition::Continue)
    }

    async fn finalize_dist_tags(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.publish {
            return Ok(Transition::Skip("publishing disabled".to_string()));
        }
        if !self.options.temp_tag {
            return Ok(Transition::Skip("temporary dist-tag disabled".to_string()));
        }

        let versions: Arc<HashMap<String, String>> = Arc::new(
            state
                .published
                .iter()
                .chain(state.already_published.iter())
                .filter_map(|name| Some((name.clone(), state.plan.version_of(name)?.to_string())))
                .collect(),
        );
        let batches: Vec<Vec<String>> = state
            .batches
            .iter()
            .map(|stage| {
                stage
                    .iter()
                    .filter(|name| versions.contains_key(*name))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .filter(|stage| !stage.is_empty())
            .collect();

        let registry = self.collaborators.registry.clone();
        let dist_tag = self.options.dist_tag.clone();
        let outcome = run_batched(&batches, self.options.concurrency, |name| {
            let registry = registry.clone();
            let versions = versions.clone();
            let dist_tag = dist_tag.clone();
            async move {
                match versions.get(&name) {
                    Some(version) => move_dist_tag(registry.as_ref(), &name, version, &dist_tag).await,
                    None => Err(ConvoyError::other(format!("no planned version for {name}"))),
                }
            }
        })
        .await;

        if let Some((name, err)) = outcome.failure {
            error!(package = %name, error = %err, "dist-tag update failed");
            return Err(WorkflowError::PublishAborted {
                published: state.published.clone(),
                source: Box::new(err),
            }
            .into());
        }
        info!(packages = outcome.completed.len(), tag = %self.options.dist_tag, "dist-tags finalized");
        Ok(Transition::Continue)
    }

    fn reset(&self, state: &mut ReleaseState) -> Result<Transition> {
        if !self.options.reset {
            return Ok(Transition::Skip("reset disabled".to_string()));
        }

        let mut files = state.publish_files.clone();
        if matches!(self.options.strategy, SelectionStrategy::Canary(_)) {
            files.extend(state.mutated_files.iter().cloned());
        }
        files.sort();
        files.dedup();
        if files.is_empty() {
            return Ok(Transition::Skip("nothing to reset".to_string()));
        }

        self.collaborators.vcs.reset_files(&files)?;
        info!(files = files.len(), "reset publish-time manifest changes");
        Ok(Transition::Continue)
    }

    // Runs `stage` for every planned package in dependency order.
    fn run_package_lifecycle(&self, state: &ReleaseState, stage: LifecycleStage) -> Result<()> {
        for name in state.batches.iter().flatten() {
            if let Some(node) = state.graph.get(name) {
                self.collaborators
                    .lifecycle
                    .run(LifecycleTarget::Package(&node.package), stage)?;
            }
        }
        Ok(())
    }
}

// Returns whether the registry already had this version.
async fn publish_one(
    package: &Package,
    registry: &dyn RegistryClient,
    archiver: &dyn PackageArchiver,
    lifecycle: &dyn LifecycleRunner,
    dist_tag: &str,
) -> Result<bool> {
    let target = LifecycleTarget::Package(package);
    lifecycle.run(target, LifecycleStage::Prepublish)?;
    lifecycle.run(target, LifecycleStage::Prepack)?;
    let tarball = archiver.pack(package).await?;
    lifecycle.run(target, LifecycleStage::Postpack)?;

    let already = match registry.publish(package.manifest(), &tarball, dist_tag).await {
        Ok(()) => {
            info!(package = %package.name(), version = %tarball.version, tag = dist_tag, "published package");
            false
        }
        Err(ConvoyError::Registry(RegistryError::AlreadyPublished { package: name, version })) => {
            warn!(package = %name, version = %version, "version already published, skipping");
            true
        }
        Err(e) => return Err(e),
    };

    lifecycle.run(target, LifecycleStage::Publish)?;
    lifecycle.run(target, LifecycleStage::Postpublish)?;
    Ok(already)
}

// Points `dist_tag` at the release and drops the temporary tag.
async fn move_dist_tag(
    registry: &dyn RegistryClient,
    name: &str,
    version: &str,
    dist_tag: &str,
) -> Result<()> {
    registry.add_dist_tag(name, version, dist_tag).await?;
    match registry.remove_dist_tag(name, TEMP_DIST_TAG).await {
        Ok(()) | Err(ConvoyError::Registry(RegistryError::NotFound(_))) => {}
        Err(e) => return Err(e),
    }
    debug!(package = %name, version = %version, tag = %dist_tag, "moved dist-tag");
    Ok(())
}

// Publish-only strategies release what the manifests already say.
fn manifest_plan(graph: &PackageGraph, candidates: &[String]) -> Result<VersionPlan> {
    let mut plan = VersionPlan::default();
    for node in graph.nodes() {
        if !candidates.iter().any(|c| c == node.name()) {
            continue;
        }
        let raw = node.package.version().unwrap_or_default();
        let version = Version::parse(raw)
            .map_err(|e| VersionError::ParseFailed(raw.to_string(), e.to_string()))?;
        plan.packages.push(node.name().to_string());
        plan.versions.insert(node.name().to_string(), version);
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::monorepo::changes::ChangeOptions;
    use crate::monorepo::graph::tests::chain_graph;
    use crate::monorepo::versioning::VersionRequest;
    use crate::traits::DescribeResult;
    use crate::types::ReleaseType;
    use crate::workflow::testing::{FakeRegistry, FakeVcs, Harness, ScriptedRecommender};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn options(mode: VersionMode, release: ReleaseType) -> ReleaseOptions {
        let mut options = ReleaseOptions::from_config(&Config::default());
        options.mode = mode;
        options.request = VersionRequest::Bump {
            release,
            preid: None,
        };
        options.global_version = Some(Version::new(1, 0, 0));
        options.ci = true;
        options
    }

    fn released(outcome: ReleaseOutcome) -> crate::types::ReleaseReport {
        match outcome {
            ReleaseOutcome::Released(report) => report,
            other => panic!("expected a release, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_independent_release_publishes_in_dependency_order() {
        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Independent, ReleaseType::Patch),
            harness.collaborators(&["a"], true),
        );

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(report.package_names(), vec!["a", "b", "c"]);
        assert!(report.published);
        assert_eq!(report.tags, vec!["a@1.0.1", "b@1.0.1", "c@1.0.1"]);
        assert_eq!(harness.registry.published_names(), vec!["a", "b", "c"]);
        assert_eq!(report.packages[0].previous_version.as_deref(), Some("1.0.0"));

        let b = harness.writer.last("b").unwrap();
        assert_eq!(b.dependency_spec("a"), Some("^1.0.1"));
        assert_eq!(b.git_head(), Some("deadbeef"));

        let calls = harness.vcs.calls();
        assert!(calls[0].starts_with("commit 3 files: chore(release): publish\n"));
        assert!(calls[0].contains(" - b@1.0.1"));
        assert!(calls.contains(&"push origin main atomic=true".to_string()));
        assert_eq!(calls.last().map(String::as_str), Some("reset 3"));

        let lifecycle = harness.lifecycle.calls();
        assert_eq!(lifecycle.first().map(String::as_str), Some("root:preversion"));
        assert_eq!(lifecycle.last().map(String::as_str), Some("root:postpublish"));
        let pos = |call: &str| lifecycle.iter().position(|c| c == call).unwrap();
        assert!(pos("a:version") < pos("root:version"));
        assert!(pos("a:prepack") < pos("a:postpack"));
    }

    #[tokio::test]
    async fn test_independent_release_with_recommended_increments() {
        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let mut collaborators = harness.collaborators(&["a"], true);
        collaborators.recommender = Some(Arc::new(ScriptedRecommender::new(&[
            ("a", ReleaseType::Minor),
            ("c", ReleaseType::Major),
        ])));
        let mut options = options(VersionMode::Independent, ReleaseType::Patch);
        options.request = VersionRequest::Recommend { preid: None };
        let orchestrator = ReleaseOrchestrator::new(options, collaborators);

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        let versions: Vec<(&str, &str)> = report
            .packages
            .iter()
            .map(|p| (p.name.as_str(), p.version.as_str()))
            .collect();
        assert_eq!(versions, vec![("a", "1.1.0"), ("b", "1.0.1"), ("c", "2.0.0")]);
        assert_eq!(report.tags, vec!["a@1.1.0", "b@1.0.1", "c@2.0.0"]);
        assert_eq!(harness.registry.published_names(), vec!["a", "b", "c"]);

        assert_eq!(harness.writer.last("b").unwrap().dependency_spec("a"), Some("^1.1.0"));
        assert_eq!(harness.writer.last("c").unwrap().dependency_spec("b"), Some("^1.0.1"));
    }

    #[tokio::test]
    async fn test_fixed_release_tags_once_and_updates_record() {
        let dir = TempDir::new().unwrap();
        let record_path = dir.path().join("convoy.toml");
        std::fs::write(&record_path, "# shared version\nversion = \"1.0.0\"\n").unwrap();

        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let mut collaborators = harness.collaborators(&["b"], true);
        collaborators.record = Some(ProjectRecord::new(&record_path));
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Fixed, ReleaseType::Minor),
            collaborators,
        );

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(report.global_version.as_deref(), Some("1.1.0"));
        assert_eq!(report.package_names(), vec!["b", "c"]);
        assert_eq!(report.tags, vec!["v1.1.0"]);
        assert!(harness.vcs.calls()[0].ends_with("chore(release): publish v1.1.0"));

        let record = ProjectRecord::new(&record_path);
        assert_eq!(record.version().unwrap().as_deref(), Some("1.1.0"));
        assert!(std::fs::read_to_string(&record_path)
            .unwrap()
            .contains("# shared version"));
    }

    #[tokio::test]
    async fn test_canary_skips_git_and_resets_manifests() {
        let vcs = FakeVcs {
            describe: DescribeResult {
                last_tag: Some("v1.0.0".to_string()),
                ref_count: 3,
                sha: "abc1234".to_string(),
                is_dirty: false,
            },
            ..FakeVcs::on_main()
        };
        let harness = Harness::new(vcs, FakeRegistry::default());
        let mut opts = options(VersionMode::Fixed, ReleaseType::Patch);
        opts.strategy = SelectionStrategy::Canary(ChangeOptions::default());
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&["a"], true));

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert!(report.global_version.is_none());
        assert!(report.tags.is_empty());
        for package in &report.packages {
            assert_eq!(package.version, "1.1.0-alpha.2+abc1234");
        }

        let calls = harness.vcs.calls();
        assert!(calls.contains(&"describe v*.*.*".to_string()));
        assert!(calls.iter().all(|c| !c.starts_with("commit") && !c.starts_with("push")));
        assert_eq!(calls.last().map(String::as_str), Some("reset 3"));
        assert!(!harness.lifecycle.calls().contains(&"root:preversion".to_string()));
    }

    #[tokio::test]
    async fn test_already_published_counts_as_success() {
        let registry = FakeRegistry {
            existing: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let harness = Harness::new(FakeVcs::on_main(), registry);
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Independent, ReleaseType::Patch),
            harness.collaborators(&["a"], true),
        );

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(harness.registry.published_names(), vec!["a", "c"]);
        let b = report.packages.iter().find(|p| p.name == "b").unwrap();
        assert!(b.already_published);
        assert!(report.published);
    }

    #[tokio::test]
    async fn test_temp_tag_moves_to_final_tag() {
        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let mut opts = options(VersionMode::Independent, ReleaseType::Patch);
        opts.temp_tag = true;
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&["c"], true));

        released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(
            harness.registry.published(),
            vec![("c".to_string(), TEMP_DIST_TAG.to_string())]
        );
        assert_eq!(
            harness.registry.tag_ops(),
            vec!["add c@1.0.1 latest".to_string(), format!("rm c {TEMP_DIST_TAG}")]
        );
    }

    #[tokio::test]
    async fn test_publish_failure_reports_what_was_published() {
        let registry = FakeRegistry {
            publish_failures: HashSet::from(["b".to_string()]),
            ..Default::default()
        };
        let harness = Harness::new(FakeVcs::on_main(), registry);
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Independent, ReleaseType::Patch),
            harness.collaborators(&["a"], true),
        );

        let err = orchestrator.run(chain_graph()).await.unwrap_err();

        assert_eq!(err.code(), "EPUBLISH");
        match err {
            ConvoyError::Workflow(WorkflowError::PublishAborted { published, .. }) => {
                assert_eq!(published, vec!["a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(harness.registry.published_names(), vec!["a"]);
        assert!(!harness.vcs.calls().iter().any(|c| c.starts_with("reset")));
    }

    #[tokio::test]
    async fn test_from_package_publishes_missing_versions() {
        let registry = FakeRegistry {
            versions: HashMap::from([("a".to_string(), vec!["1.0.0".to_string()])]),
            lookup_failures: HashSet::from(["c".to_string()]),
            ..Default::default()
        };
        let harness = Harness::new(FakeVcs::on_main(), registry);
        let mut opts = options(VersionMode::Independent, ReleaseType::Patch);
        opts.strategy = SelectionStrategy::FromPackage;
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&[], true));

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(harness.registry.published_names(), vec!["b", "c"]);
        assert!(report.packages.iter().all(|p| p.version == "1.0.0"));
        assert!(harness.vcs.calls().iter().all(|c| !c.starts_with("commit")));
    }

    #[tokio::test]
    async fn test_from_git_publishes_tagged_packages() {
        let vcs = FakeVcs {
            tags_at_head: vec!["b@1.0.0".to_string()],
            ..FakeVcs::on_main()
        };
        let harness = Harness::new(vcs, FakeRegistry::default());
        let mut opts = options(VersionMode::Independent, ReleaseType::Patch);
        opts.strategy = SelectionStrategy::FromGit;
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&[], true));

        let report = released(orchestrator.run(chain_graph()).await.unwrap());

        assert_eq!(report.package_names(), vec!["b"]);
        assert_eq!(harness.registry.published_names(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_nothing_changed_finishes_early() {
        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Independent, ReleaseType::Patch),
            harness.collaborators(&[], true),
        );

        let outcome = orchestrator.run(chain_graph()).await.unwrap();

        assert!(matches!(outcome, ReleaseOutcome::NothingToRelease));
        assert!(harness.vcs.calls().is_empty());
    }

    #[tokio::test]
    async fn test_behind_upstream() {
        let vcs = FakeVcs {
            behind: true,
            ..FakeVcs::on_main()
        };
        let harness = Harness::new(vcs, FakeRegistry::default());
        let orchestrator = ReleaseOrchestrator::new(
            options(VersionMode::Independent, ReleaseType::Patch),
            harness.collaborators(&["a"], true),
        );
        let outcome = orchestrator.run(chain_graph()).await.unwrap();
        assert!(matches!(outcome, ReleaseOutcome::BehindUpstreamInCi));

        let mut opts = options(VersionMode::Independent, ReleaseType::Patch);
        opts.ci = false;
        opts.yes = true;
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&["a"], true));
        let err = orchestrator.run(chain_graph()).await.unwrap_err();
        assert_eq!(err.code(), "EBEHIND");
        assert!(harness.registry.published().is_empty());
    }

    #[tokio::test]
    async fn test_declined_confirmation_cancels() {
        let harness = Harness::new(FakeVcs::on_main(), FakeRegistry::default());
        let mut opts = options(VersionMode::Independent, ReleaseType::Patch);
        opts.ci = false;
        let orchestrator = ReleaseOrchestrator::new(opts, harness.collaborators(&["a"], false));

        let outcome = orchestrator.run(chain_graph()).await.unwrap();

        assert!(matches!(outcome, ReleaseOutcome::Cancelled));
        assert!(harness.writer.written.lock().unwrap().is_empty());
        assert!(harness.vcs.calls().is_empty());
    }
}
