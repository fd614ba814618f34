//! In-memory collaborators for release tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use semver::Version;
use serde_json::{Map, Value};

use crate::error::{GitError, RegistryError, Result};
use crate::monorepo::changes::{ChangeDetector, ChangeOptions};
use crate::monorepo::graph::PackageGraph;
use crate::monorepo::package::{ManifestWriter, Package};
use crate::monorepo::versioning::{Recommender, VersionPlan};
use crate::traits::{
    Confirmation, DescribeResult, LifecycleRunner, LifecycleStage, LifecycleTarget,
    PackageArchiver, RegistryClient, Tarball, VersionControlClient,
};
use crate::types::ReleaseType;

use super::release::Collaborators;

#[derive(Default)]
pub struct FakeVcs {
    pub branch: Option<String>,
    pub behind: bool,
    pub reject_atomic: bool,
    pub push_error: Option<String>,
    pub describe: DescribeResult,
    pub tags_at_head: Vec<String>,
    pub manifests_at_head: Vec<PathBuf>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeVcs {
    pub fn on_main() -> Self {
        Self {
            branch: Some("main".to_string()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl VersionControlClient for FakeVcs {
    fn current_branch(&self) -> Result<Option<String>> {
        Ok(self.branch.clone())
    }
    fn is_anything_committed(&self) -> Result<bool> {
        Ok(true)
    }
    fn uncommitted_changes(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn is_behind_upstream(&self, _: &str, _: &str) -> Result<bool> {
        Ok(self.behind)
    }
    fn remote_branch_exists(&self, _: &str, _: &str) -> Result<bool> {
        Ok(true)
    }
    fn head_sha(&self) -> Result<String> {
        Ok("deadbeef".to_string())
    }
    fn commit(&self, message: &str, files: &[PathBuf]) -> Result<()> {
        self.record(format!("commit {} files: {}", files.len(), message));
        Ok(())
    }
    fn tag(&self, name: &str, _: &str) -> Result<()> {
        self.record(format!("tag {name}"));
        Ok(())
    }
    fn push(&self, remote: &str, branch: &str, atomic: bool) -> Result<()> {
        self.record(format!("push {remote} {branch} atomic={atomic}"));
        if let Some(stderr) = &self.push_error {
            return Err(GitError::CommandFailed {
                command: "git push".to_string(),
                stderr: stderr.clone(),
            }
            .into());
        }
        if atomic && self.reject_atomic {
            return Err(GitError::CommandFailed {
                command: "git push --atomic".to_string(),
                stderr: "fatal: the receiving end does not support --atomic push".to_string(),
            }
            .into());
        }
        Ok(())
    }
    fn describe(&self, pattern: &str) -> Result<DescribeResult> {
        self.record(format!("describe {pattern}"));
        Ok(self.describe.clone())
    }
    fn list_tags_at_head(&self, _: &str) -> Result<Vec<String>> {
        Ok(self.tags_at_head.clone())
    }
    fn list_changed_manifests_at_head(&self) -> Result<Vec<PathBuf>> {
        Ok(self.manifests_at_head.clone())
    }
    fn changed_files_since(&self, _: &str) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
    fn commit_messages_since(&self, _: Option<&str>, _: &Path) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn reset_files(&self, files: &[PathBuf]) -> Result<()> {
        self.record(format!("reset {}", files.len()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    pub versions: HashMap<String, Vec<String>>,
    pub lookup_failures: HashSet<String>,
    pub existing: HashSet<String>,
    pub publish_failures: HashSet<String>,
    pub published: Mutex<Vec<(String, String)>>,
    pub tag_ops: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_names(&self) -> Vec<String> {
        self.published().into_iter().map(|(name, _)| name).collect()
    }

    pub fn tag_ops(&self) -> Vec<String> {
        self.tag_ops.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RegistryClient for FakeRegistry {
    async fn publish(&self, _: &Map<String, Value>, tarball: &Tarball, dist_tag: &str) -> Result<()> {
        if self.publish_failures.contains(&tarball.name) {
            return Err(RegistryError::PublishFailed {
                package: tarball.name.clone(),
                reason: "500 Internal Server Error".to_string(),
            }
            .into());
        }
        if self.existing.contains(&tarball.name) {
            return Err(RegistryError::AlreadyPublished {
                package: tarball.name.clone(),
                version: tarball.version.clone(),
            }
            .into());
        }
        self.published
            .lock()
            .unwrap()
            .push((tarball.name.clone(), dist_tag.to_string()));
        Ok(())
    }

    async fn fetch_versions(&self, name: &str) -> Result<Vec<String>> {
        if self.lookup_failures.contains(name) {
            return Err(RegistryError::LookupFailed {
                package: name.to_string(),
                reason: "connection reset".to_string(),
            }
            .into());
        }
        self.versions
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()).into())
    }

    async fn add_dist_tag(&self, name: &str, version: &str, tag: &str) -> Result<()> {
        self.tag_ops.lock().unwrap().push(format!("add {name}@{version} {tag}"));
        Ok(())
    }

    async fn remove_dist_tag(&self, name: &str, tag: &str) -> Result<()> {
        self.tag_ops.lock().unwrap().push(format!("rm {name} {tag}"));
        Err(RegistryError::NotFound(name.to_string()).into())
    }
}

pub struct FakeArchiver;

#[async_trait::async_trait]
impl PackageArchiver for FakeArchiver {
    async fn pack(&self, package: &Package) -> Result<Tarball> {
        let version = package.version().unwrap_or_default().to_string();
        Ok(Tarball {
            filename: format!("{}-{}.tgz", package.name(), version),
            name: package.name().to_string(),
            version,
            data: vec![0x1f, 0x8b],
            integrity: "sha512-AAAA".to_string(),
            shasum: "0000".to_string(),
        })
    }
}

pub struct StaticDetector(pub Vec<String>);

impl ChangeDetector for StaticDetector {
    fn collect_updates(&self, graph: &PackageGraph, _: &ChangeOptions) -> Result<Vec<String>> {
        Ok(graph.with_dependents(&self.0))
    }
}

#[derive(Default)]
pub struct RecordingWriter {
    pub written: Mutex<Vec<Package>>,
}

impl RecordingWriter {
    pub fn last(&self, name: &str) -> Option<Package> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|p| p.name() == name)
            .cloned()
    }
}

impl ManifestWriter for RecordingWriter {
    fn write(&self, package: &Package) -> Result<()> {
        self.written.lock().unwrap().push(package.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLifecycle {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingLifecycle {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl LifecycleRunner for RecordingLifecycle {
    fn run(&self, target: LifecycleTarget<'_>, stage: LifecycleStage) -> Result<()> {
        let who = match target {
            LifecycleTarget::Root => "root".to_string(),
            LifecycleTarget::Package(p) => p.name().to_string(),
        };
        self.calls.lock().unwrap().push(format!("{who}:{stage}"));
        Ok(())
    }
}

/// Recommends a fixed increment per package, patch for the rest
pub struct ScriptedRecommender(pub HashMap<String, ReleaseType>);

impl ScriptedRecommender {
    pub fn new(entries: &[(&str, ReleaseType)]) -> Self {
        Self(entries.iter().map(|(name, r)| (name.to_string(), *r)).collect())
    }
}

impl Recommender for ScriptedRecommender {
    fn recommend(&self, package: &Package, _: &Version, _: Option<&str>) -> Result<ReleaseType> {
        Ok(self.0.get(package.name()).copied().unwrap_or(ReleaseType::Patch))
    }
}

pub struct Answer(pub bool);

impl Confirmation for Answer {
    fn confirm(&self, _: &VersionPlan) -> Result<bool> {
        Ok(self.0)
    }
}

pub struct Harness {
    pub vcs: Arc<FakeVcs>,
    pub registry: Arc<FakeRegistry>,
    pub writer: Arc<RecordingWriter>,
    pub lifecycle: Arc<RecordingLifecycle>,
}

impl Harness {
    pub fn new(vcs: FakeVcs, registry: FakeRegistry) -> Self {
        Self {
            vcs: Arc::new(vcs),
            registry: Arc::new(registry),
            writer: Arc::new(RecordingWriter::default()),
            lifecycle: Arc::new(RecordingLifecycle::default()),
        }
    }

    pub fn collaborators(&self, changed: &[&str], confirm: bool) -> Collaborators {
        Collaborators {
            vcs: self.vcs.clone(),
            registry: self.registry.clone(),
            archiver: Arc::new(FakeArchiver),
            detector: Arc::new(StaticDetector(changed.iter().map(|s| s.to_string()).collect())),
            recommender: None,
            lifecycle: self.lifecycle.clone(),
            confirmation: Arc::new(Answer(confirm)),
            writer: self.writer.clone(),
            record: None,
        }
    }
}
