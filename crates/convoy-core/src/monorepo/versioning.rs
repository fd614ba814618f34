//! Version resolution
//!
//! Computes the next version of every candidate under fixed or independent
//! versioning, including prerelease identifiers, the fixed-mode breaking
//! change cascade, and git-distance canary versions.

use std::collections::BTreeMap;

use semver::{BuildMetadata, Prerelease, Version};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{ConfigError, Result, VersionError};
use crate::traits::DescribeResult;
use crate::types::{ReleaseType, VersionMode};

use super::graph::PackageGraph;
use super::package::Package;

/// Prerelease identifier used when nothing else applies
pub const DEFAULT_PREID: &str = "alpha";

/// How the next version is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRequest {
    /// Use exactly this version
    Explicit(Version),
    /// Apply a semver increment
    Bump {
        release: ReleaseType,
        preid: Option<String>,
    },
    /// Ask the recommender for an increment per package
    Recommend { preid: Option<String> },
}

/// Supplies an increment for a package, e.g. from commit history
pub trait Recommender: Send + Sync {
    /// Increment to apply to `current`
    fn recommend(&self, package: &Package, current: &Version, preid: Option<&str>) -> Result<ReleaseType>;
}

/// Next versions for a release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionPlan {
    /// Packages being released, in graph order
    pub packages: Vec<String>,
    /// Next version per package
    pub versions: BTreeMap<String, Version>,
    /// Shared version (fixed mode only)
    pub global_version: Option<Version>,
}

impl VersionPlan {
    /// Next version of `name`
    pub fn version_of(&self, name: &str) -> Option<&Version> {
        self.versions.get(name)
    }

    /// Whether nothing is planned
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Increment `version` the way `semver.inc` does
///
/// `preid` only matters for prerelease increments.
pub fn increment(version: &Version, release: ReleaseType, preid: Option<&str>) -> Version {
    let mut next = version.clone();
    next.build = BuildMetadata::EMPTY;
    let has_pre = !next.pre.is_empty();

    match release {
        ReleaseType::Major => {
            if !(has_pre && next.minor == 0 && next.patch == 0) {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Minor => {
            if !(has_pre && next.patch == 0) {
                next.minor += 1;
            }
            next.patch = 0;
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Patch => {
            if !has_pre {
                next.patch += 1;
            }
            next.pre = Prerelease::EMPTY;
        }
        ReleaseType::Premajor => {
            next.major += 1;
            next.minor = 0;
            next.patch = 0;
            next.pre = bump_prerelease(&Prerelease::EMPTY, preid);
        }
        ReleaseType::Preminor => {
            next.minor += 1;
            next.patch = 0;
            next.pre = bump_prerelease(&Prerelease::EMPTY, preid);
        }
        ReleaseType::Prepatch => {
            next.patch += 1;
            next.pre = bump_prerelease(&Prerelease::EMPTY, preid);
        }
        ReleaseType::Prerelease => {
            if !has_pre {
                next.patch += 1;
            }
            next.pre = bump_prerelease(&next.pre, preid);
        }
    }

    next
}

// Increment the last numeric identifier (appending `0` if none), then
// restart at `<preid>.0` when the leading identifier differs.
fn bump_prerelease(current: &Prerelease, preid: Option<&str>) -> Prerelease {
    let mut parts: Vec<String> = if current.is_empty() {
        vec!["0".to_string()]
    } else {
        let mut parts: Vec<String> = current.as_str().split('.').map(str::to_string).collect();
        match parts.iter().rposition(|p| p.parse::<u64>().is_ok()) {
            Some(i) => {
                let n = parts[i].parse::<u64>().unwrap_or(0);
                parts[i] = (n + 1).to_string();
            }
            None => parts.push("0".to_string()),
        }
        parts
    };

    if let Some(id) = preid.filter(|id| !id.is_empty()) {
        let same_id = parts.first().is_some_and(|p| p == id);
        let numeric_second = parts.get(1).is_some_and(|p| p.parse::<u64>().is_ok());
        if !(same_id && numeric_second) {
            parts = vec![id.to_string(), "0".to_string()];
        }
    }

    Prerelease::new(&parts.join(".")).unwrap_or(Prerelease::EMPTY)
}

/// Leading non-numeric prerelease identifier (`beta` for `1.0.1-beta.1`)
pub fn prerelease_id(version: &Version) -> Option<&str> {
    version
        .pre
        .as_str()
        .split('.')
        .next()
        .filter(|id| !id.is_empty() && id.parse::<u64>().is_err())
}

/// Identifier for a prerelease increment
///
/// An explicit id wins; otherwise a prerelease increment keeps the
/// current id; otherwise [`DEFAULT_PREID`].
pub fn resolve_preid(explicit: Option<&str>, current: &Version, release: ReleaseType) -> String {
    if let Some(id) = explicit {
        return id.to_string();
    }
    if release.is_prerelease() {
        if let Some(id) = prerelease_id(current) {
            return id.to_string();
        }
    }
    DEFAULT_PREID.to_string()
}

/// Whether moving from `current` to `next` breaks consumers
///
/// Major bumps always break; minor bumps break below 1.0.0; patch bumps
/// break below 0.1.0. Prerelease-only changes, including graduating a
/// prerelease to its release, never break.
pub fn is_breaking_change(current: &Version, next: &Version) -> bool {
    if !next.pre.is_empty() {
        return false;
    }
    let same_core = current.major == next.major
        && current.minor == next.minor
        && current.patch == next.patch;
    if same_core {
        return false;
    }

    if current.major != next.major {
        true
    } else if current.minor != next.minor {
        *current < Version::new(1, 0, 0)
    } else {
        *current < Version::new(0, 1, 0)
    }
}

/// `{inc(last, base)}-{preid}.{max(0, ref_count - 1)}+{sha}`
///
/// A prerelease `base` is reduced to its plain increment.
pub fn canary_version(
    last: &Version,
    ref_count: u64,
    sha: &str,
    preid: &str,
    base: ReleaseType,
) -> Result<Version> {
    let next = increment(last, base.base(), None);
    let raw = format!("{}-{}.{}+{}", next, preid, ref_count.saturating_sub(1), sha);
    Version::parse(&raw).map_err(|e| VersionError::ParseFailed(raw, e.to_string()).into())
}

/// Computes version plans against a package graph
pub struct VersionResolver<'a> {
    graph: &'a PackageGraph,
    mode: VersionMode,
    global_version: Option<Version>,
    include_private: bool,
    recommender: Option<&'a dyn Recommender>,
}

impl<'a> VersionResolver<'a> {
    /// Create a resolver
    pub fn new(graph: &'a PackageGraph, mode: VersionMode) -> Self {
        Self {
            graph,
            mode,
            global_version: None,
            include_private: false,
            recommender: None,
        }
    }

    /// Set the recorded global version (fixed mode)
    pub fn with_global_version(mut self, version: Option<Version>) -> Self {
        self.global_version = version;
        self
    }

    /// Let the breaking-change cascade pull in private packages
    pub fn include_private(mut self, include: bool) -> Self {
        self.include_private = include;
        self
    }

    /// Set the recommender used for [`VersionRequest::Recommend`]
    pub fn with_recommender(mut self, recommender: &'a dyn Recommender) -> Self {
        self.recommender = Some(recommender);
        self
    }

    /// Plan next versions for `candidates`
    pub fn plan(&self, candidates: &[String], request: &VersionRequest) -> Result<VersionPlan> {
        info!(mode = %self.mode, candidates = candidates.len(), "resolving versions");
        let packages = self.in_graph_order(candidates);
        if packages.is_empty() {
            return Ok(VersionPlan::default());
        }

        let plan = match self.mode {
            VersionMode::Independent => self.plan_independent(packages, request)?,
            VersionMode::Fixed => self.plan_fixed(packages, request)?,
        };

        for name in &plan.packages {
            debug!(
                package = %name,
                from = self.graph.get(name).and_then(|n| n.package.version()).unwrap_or("none"),
                to = %plan.versions[name],
                "planned version"
            );
        }
        Ok(plan)
    }

    fn plan_independent(&self, packages: Vec<String>, request: &VersionRequest) -> Result<VersionPlan> {
        let mut versions = BTreeMap::new();

        for name in &packages {
            let next = match request {
                VersionRequest::Explicit(version) => version.clone(),
                VersionRequest::Bump { release, preid } => {
                    let current = self.current_version(name)?;
                    let preid = resolve_preid(preid.as_deref(), &current, *release);
                    increment(&current, *release, Some(&preid))
                }
                VersionRequest::Recommend { preid } => {
                    let current = self.current_version(name)?;
                    self.recommended(name, &current, preid.as_deref())?
                }
            };
            versions.insert(name.clone(), next);
        }

        Ok(VersionPlan {
            packages,
            versions,
            global_version: None,
        })
    }

    fn plan_fixed(&self, packages: Vec<String>, request: &VersionRequest) -> Result<VersionPlan> {
        let current_global = self.current_global()?;

        let global = match request {
            VersionRequest::Explicit(version) => version.clone(),
            VersionRequest::Bump { release, preid } => {
                let preid = resolve_preid(preid.as_deref(), &current_global, *release);
                increment(&current_global, *release, Some(&preid))
            }
            VersionRequest::Recommend { preid } => {
                let mut highest: Option<Version> = None;
                for name in &packages {
                    let recorded = self.current_version(name)?;
                    let floor = std::cmp::max(recorded, current_global.clone());
                    let next = self.recommended(name, &floor, preid.as_deref())?;
                    if highest.as_ref().map_or(true, |h| next > *h) {
                        highest = Some(next);
                    }
                }
                highest.unwrap_or(current_global.clone())
            }
        };

        // Recommendations start from the recorded version raised to the
        // global one; explicit and bump requests compare the raw record.
        let floor = match request {
            VersionRequest::Recommend { .. } => Some(&current_global),
            _ => None,
        };
        let packages = self.cascade_breaking(packages, &global, floor)?;
        let versions = packages
            .iter()
            .map(|name| (name.clone(), global.clone()))
            .collect();

        Ok(VersionPlan {
            packages,
            versions,
            global_version: Some(global),
        })
    }

    // A breaking bump on part of a fixed-mode repository re-releases every
    // other package at the same version.
    fn cascade_breaking(
        &self,
        packages: Vec<String>,
        global: &Version,
        floor: Option<&Version>,
    ) -> Result<Vec<String>> {
        if packages.len() >= self.graph.len() {
            return Ok(packages);
        }

        let breaking = packages.iter().find(|name| {
            self.graph
                .get(name)
                .and_then(|n| n.package.semver())
                .map(|recorded| match floor {
                    Some(floor) if *floor > recorded => floor.clone(),
                    _ => recorded,
                })
                .is_some_and(|current| is_breaking_change(&current, global))
        });
        let Some(trigger) = breaking else {
            return Ok(packages);
        };

        let widened: Vec<String> = self
            .graph
            .nodes()
            .filter(|n| self.include_private || !n.package.is_private())
            .filter(|n| !(n.package.is_private() && n.package.version().is_none()))
            .map(|n| n.name().to_string())
            .collect();
        for name in &widened {
            if self.graph.get(name).is_some_and(|n| n.package.version().is_none()) {
                return Err(ConfigError::MissingVersion { name: name.clone() }.into());
            }
        }

        info!(
            trigger = %trigger,
            version = %global,
            from = packages.len(),
            to = widened.len(),
            "breaking change in fixed mode, releasing all packages"
        );
        Ok(widened)
    }

    /// Plan canary versions from `git describe` output
    ///
    /// Fixed mode describes the repository once; independent mode
    /// describes each package against its own tags. A package without a
    /// matching tag counts from its manifest version.
    pub fn plan_canary<F>(
        &self,
        candidates: &[String],
        base: ReleaseType,
        preid: &str,
        tag_prefix: &str,
        describe: F,
    ) -> Result<VersionPlan>
    where
        F: Fn(&str) -> Result<DescribeResult>,
    {
        let packages = self.in_graph_order(candidates);
        let mut versions = BTreeMap::new();

        let shared = match self.mode {
            VersionMode::Fixed if !packages.is_empty() => {
                Some(describe(&format!("{tag_prefix}*.*.*"))?)
            }
            _ => None,
        };

        for name in &packages {
            let result = match &shared {
                Some(result) => result.clone(),
                None => describe(&format!("{name}@*"))?,
            };
            let last = result
                .last_tag
                .as_deref()
                .and_then(|tag| match self.mode {
                    VersionMode::Fixed => tag.strip_prefix(tag_prefix),
                    VersionMode::Independent => tag.rsplit_once('@').map(|(_, v)| v),
                })
                .and_then(|v| Version::parse(v).ok());
            let last = match last {
                Some(v) => v,
                None => self.current_version(name)?,
            };

            let version = canary_version(&last, result.ref_count, &result.sha, preid, base)?;
            debug!(package = %name, version = %version, "canary version");
            versions.insert(name.clone(), version);
        }

        Ok(VersionPlan {
            packages,
            versions,
            global_version: None,
        })
    }

    fn in_graph_order(&self, candidates: &[String]) -> Vec<String> {
        self.graph
            .nodes()
            .map(|n| n.name())
            .filter(|name| candidates.iter().any(|c| c == name))
            .map(str::to_string)
            .collect()
    }

    fn current_version(&self, name: &str) -> Result<Version> {
        let version = self
            .graph
            .get(name)
            .and_then(|n| n.package.version())
            .ok_or_else(|| ConfigError::MissingVersion {
                name: name.to_string(),
            })?;
        Version::parse(version)
            .map_err(|e| VersionError::ParseFailed(version.to_string(), e.to_string()).into())
    }

    fn current_global(&self) -> Result<Version> {
        if let Some(version) = &self.global_version {
            return Ok(version.clone());
        }
        let highest = self.graph.nodes().filter_map(|n| n.package.semver()).max();
        if let Some(version) = &highest {
            debug!(version = %version, "no recorded global version, using highest package version");
        }
        highest.ok_or_else(|| VersionError::MissingGlobalVersion.into())
    }

    fn recommended(&self, name: &str, current: &Version, preid: Option<&str>) -> Result<Version> {
        let recommender = self.recommender.ok_or(VersionError::NoRecommendation)?;
        let node = self
            .graph
            .get(name)
            .ok_or_else(|| ConfigError::MissingVersion {
                name: name.to_string(),
            })?;
        let release = recommender.recommend(&node.package, current, preid)?;
        let preid = resolve_preid(preid, current, release);
        Ok(increment(current, release, Some(&preid)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monorepo::graph::tests::{chain_graph, pkg};
    use crate::monorepo::graph::GraphType;
    use serde_json::json;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    struct Fixed(ReleaseType);

    impl Recommender for Fixed {
        fn recommend(&self, package: &Package, _current: &Version, _preid: Option<&str>) -> Result<ReleaseType> {
            Ok(if package.name() == "b" { ReleaseType::Minor } else { self.0 })
        }
    }

    #[test]
    fn test_increment_matches_semver_inc() {
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Major, None), v("2.0.0"));
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Minor, None), v("1.3.0"));
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Patch, None), v("1.2.4"));
        assert_eq!(increment(&v("1.0.0-rc.1"), ReleaseType::Major, None), v("1.0.0"));
        assert_eq!(increment(&v("1.2.3-rc.1"), ReleaseType::Patch, None), v("1.2.3"));
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Premajor, Some("beta")), v("2.0.0-beta.0"));
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Prepatch, Some("alpha")), v("1.2.4-alpha.0"));
        assert_eq!(increment(&v("1.2.3"), ReleaseType::Prerelease, Some("alpha")), v("1.2.4-alpha.0"));
        assert_eq!(increment(&v("1.2.4-alpha.0"), ReleaseType::Prerelease, Some("beta")), v("1.2.4-beta.0"));
        assert_eq!(increment(&v("1.2.4-alpha"), ReleaseType::Prerelease, None), v("1.2.4-alpha.0"));
    }

    #[test]
    fn test_existing_preid_is_kept() {
        let current = v("1.0.1-beta.1");
        let preid = resolve_preid(None, &current, ReleaseType::Prerelease);
        assert_eq!(preid, "beta");
        assert_eq!(increment(&current, ReleaseType::Prerelease, Some(&preid)), v("1.0.1-beta.2"));

        assert_eq!(resolve_preid(None, &current, ReleaseType::Patch), "alpha");
        assert_eq!(resolve_preid(Some("rc"), &current, ReleaseType::Prerelease), "rc");
        assert_eq!(resolve_preid(None, &v("1.0.0"), ReleaseType::Prepatch), "alpha");
    }

    #[test]
    fn test_is_breaking_change() {
        assert!(is_breaking_change(&v("1.0.0"), &v("2.0.0")));
        assert!(is_breaking_change(&v("0.1.9"), &v("0.2.0")));
        assert!(!is_breaking_change(&v("1.1.0"), &v("1.2.0")));
        assert!(is_breaking_change(&v("0.0.1"), &v("0.0.2")));
        assert!(!is_breaking_change(&v("0.2.0"), &v("0.2.1")));
        assert!(!is_breaking_change(&v("1.0.0"), &v("1.0.0")));
        assert!(!is_breaking_change(&v("1.0.0-beta.1"), &v("1.0.0")));
        assert!(!is_breaking_change(&v("1.0.0"), &v("2.0.0-alpha.0")));
    }

    #[test]
    fn test_canary_version() {
        let version = canary_version(&v("1.0.0"), 3, "abc1234", "alpha", ReleaseType::Patch).unwrap();
        assert_eq!(version.to_string(), "1.0.1-alpha.2+abc1234");

        let version = canary_version(&v("1.0.0"), 0, "abc1234", "alpha", ReleaseType::Preminor).unwrap();
        assert_eq!(version.to_string(), "1.1.0-alpha.0+abc1234");
    }

    #[test]
    fn test_independent_bump() {
        let graph = chain_graph();
        let plan = VersionResolver::new(&graph, VersionMode::Independent)
            .plan(
                &names(&["c", "a"]),
                &VersionRequest::Bump {
                    release: ReleaseType::Minor,
                    preid: None,
                },
            )
            .unwrap();
        assert_eq!(plan.packages, names(&["a", "c"]));
        assert_eq!(plan.version_of("a"), Some(&v("1.1.0")));
        assert_eq!(plan.global_version, None);
    }

    #[test]
    fn test_independent_recommend_requires_recommender() {
        let graph = chain_graph();
        let err = VersionResolver::new(&graph, VersionMode::Independent)
            .plan(&names(&["a"]), &VersionRequest::Recommend { preid: None })
            .unwrap_err();
        assert_eq!(err.code(), "ENORECOMMEND");
    }

    #[test]
    fn test_fixed_recommend_floors_and_ceils() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", "1.0.0", json!({})),
                pkg("b", "1.3.0", json!({})),
                pkg("c", "1.0.0", json!({})),
            ],
            GraphType::AllDependencies,
        )
        .unwrap();
        let recommender = Fixed(ReleaseType::Patch);
        let plan = VersionResolver::new(&graph, VersionMode::Fixed)
            .with_global_version(Some(v("1.2.0")))
            .with_recommender(&recommender)
            .plan(&names(&["a", "b"]), &VersionRequest::Recommend { preid: None })
            .unwrap();

        // a: floor 1.2.0 -> 1.2.1; b: 1.3.0 -> 1.4.0; ceiling wins
        assert_eq!(plan.global_version, Some(v("1.4.0")));
        assert_eq!(plan.packages, names(&["a", "b"]));
        assert!(plan.versions.values().all(|x| *x == v("1.4.0")));
    }

    #[test]
    fn test_fixed_recommend_on_stale_package_stays_partial() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", "0.1.0", json!({})),
                pkg("b", "0.2.0", json!({})),
                pkg("c", "0.2.0", json!({})),
            ],
            GraphType::AllDependencies,
        )
        .unwrap();
        let recommender = Fixed(ReleaseType::Patch);
        let plan = VersionResolver::new(&graph, VersionMode::Fixed)
            .with_global_version(Some(v("0.2.0")))
            .with_recommender(&recommender)
            .plan(&names(&["a"]), &VersionRequest::Recommend { preid: None })
            .unwrap();

        assert_eq!(plan.global_version, Some(v("0.2.1")));
        assert_eq!(plan.packages, names(&["a"]));
    }

    #[test]
    fn test_fixed_bump_compares_recorded_version() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", "0.1.0", json!({})),
                pkg("b", "0.2.0", json!({})),
            ],
            GraphType::AllDependencies,
        )
        .unwrap();
        let plan = VersionResolver::new(&graph, VersionMode::Fixed)
            .with_global_version(Some(v("0.2.0")))
            .plan(
                &names(&["a"]),
                &VersionRequest::Bump {
                    release: ReleaseType::Patch,
                    preid: None,
                },
            )
            .unwrap();

        // 0.1.0 -> 0.2.1 crosses a minor boundary below 1.0.0
        assert_eq!(plan.packages, names(&["a", "b"]));
    }

    #[test]
    fn test_fixed_major_bump_widens_to_all_public_packages() {
        let private = Package::from_value(
            "/repo/packages/internal",
            json!({ "name": "internal", "version": "1.0.0", "private": true }),
        )
        .unwrap();
        let graph = PackageGraph::build(
            vec![
                pkg("a", "1.0.0", json!({})),
                pkg("b", "1.0.0", json!({})),
                private,
            ],
            GraphType::AllDependencies,
        )
        .unwrap();

        let plan = VersionResolver::new(&graph, VersionMode::Fixed)
            .with_global_version(Some(v("1.0.0")))
            .plan(
                &names(&["a"]),
                &VersionRequest::Bump {
                    release: ReleaseType::Major,
                    preid: None,
                },
            )
            .unwrap();
        assert_eq!(plan.packages, names(&["a", "b"]));
        assert_eq!(plan.version_of("b"), Some(&v("2.0.0")));
    }

    #[test]
    fn test_fixed_minor_bump_stays_partial() {
        let graph = chain_graph();
        let plan = VersionResolver::new(&graph, VersionMode::Fixed)
            .with_global_version(Some(v("1.0.0")))
            .plan(
                &names(&["a"]),
                &VersionRequest::Bump {
                    release: ReleaseType::Minor,
                    preid: None,
                },
            )
            .unwrap();
        assert_eq!(plan.packages, names(&["a"]));
        assert_eq!(plan.global_version, Some(v("1.1.0")));
    }

    #[test]
    fn test_canary_plan_fixed_and_independent() {
        let graph = chain_graph();
        let describe = |pattern: &str| {
            Ok(DescribeResult {
                last_tag: Some(if pattern.starts_with('v') {
                    "v1.0.0".to_string()
                } else {
                    format!("{}1.2.0", pattern.trim_end_matches('*'))
                }),
                ref_count: 3,
                sha: "abc1234".to_string(),
                is_dirty: false,
            })
        };

        let fixed = VersionResolver::new(&graph, VersionMode::Fixed)
            .plan_canary(&names(&["a", "b"]), ReleaseType::Patch, "alpha", "v", describe)
            .unwrap();
        assert_eq!(fixed.version_of("b").unwrap().to_string(), "1.0.1-alpha.2+abc1234");

        let independent = VersionResolver::new(&graph, VersionMode::Independent)
            .plan_canary(&names(&["a"]), ReleaseType::Minor, "beta", "v", describe)
            .unwrap();
        assert_eq!(independent.version_of("a").unwrap().to_string(), "1.3.0-beta.2+abc1234");
    }
}
