//! Dependency graph for workspace packages
//!
//! Nodes live in an arena indexed by position; edges are package names.
//! `local_dependents` is always the transpose of every node's
//! `local_dependencies`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{ConfigError, Result};

use super::package::{DependencyKind, Package};
use super::resolve::ResolvedDependency;

/// Which dependency maps contribute edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GraphType {
    /// dependencies, devDependencies, peerDependencies, optionalDependencies
    #[default]
    #[serde(rename = "all")]
    AllDependencies,
    /// dependencies and optionalDependencies only
    #[serde(rename = "dependencies")]
    Dependencies,
}

impl GraphType {
    // Later maps win when a name appears in several.
    fn kinds(&self) -> &'static [DependencyKind] {
        match self {
            Self::AllDependencies => &[
                DependencyKind::Peer,
                DependencyKind::Dev,
                DependencyKind::Optional,
                DependencyKind::Dependencies,
            ],
            Self::Dependencies => &[DependencyKind::Optional, DependencyKind::Dependencies],
        }
    }
}

/// A node in the package graph
#[derive(Debug, Clone)]
pub struct PackageGraphNode {
    /// The package
    pub package: Package,
    /// Edges to other local packages
    pub local_dependencies: BTreeMap<String, ResolvedDependency>,
    /// Local packages depending on this one
    pub local_dependents: BTreeSet<String>,
    /// Dependencies not satisfied by a local package, name to raw spec
    pub external_dependencies: BTreeMap<String, String>,
}

impl PackageGraphNode {
    /// Package name
    pub fn name(&self) -> &str {
        self.package.name()
    }
}

/// Graph of all packages in the repository
#[derive(Debug, Clone)]
pub struct PackageGraph {
    nodes: Vec<PackageGraphNode>,
    index: HashMap<String, usize>,
}

impl PackageGraph {
    /// Build the graph from discovered packages
    #[instrument(skip_all, fields(packages = packages.len(), graph_type = ?graph_type))]
    pub fn build(packages: Vec<Package>, graph_type: GraphType) -> Result<Self> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, package) in packages.iter().enumerate() {
            if let Some(&first) = index.get(package.name()) {
                return Err(ConfigError::DuplicatePackage {
                    name: package.name().to_string(),
                    first: packages[first].location().to_path_buf(),
                    second: package.location().to_path_buf(),
                }
                .into());
            }
            index.insert(package.name().to_string(), i);
        }

        let mut nodes: Vec<PackageGraphNode> = Vec::with_capacity(packages.len());
        for package in &packages {
            let mut declared: BTreeMap<&str, &str> = BTreeMap::new();
            for kind in graph_type.kinds() {
                declared.extend(package.dependencies(*kind));
            }

            let mut local_dependencies = BTreeMap::new();
            let mut external_dependencies = BTreeMap::new();

            for (dep_name, spec) in declared {
                let target = index
                    .get(dep_name)
                    .map(|&i| &packages[i])
                    .filter(|t| t.name() != package.name());

                let resolved = target.and_then(|t| {
                    let resolved = ResolvedDependency::parse(spec, package.location())?;
                    if resolved.points_to(t.location(), t.semver().as_ref()) {
                        Some(resolved)
                    } else {
                        warn!(
                            package = %package.name(),
                            dependency = dep_name,
                            spec,
                            local_version = t.version().unwrap_or("none"),
                            "local package does not satisfy declared range, treating as external"
                        );
                        None
                    }
                });

                match resolved {
                    Some(resolved) => {
                        local_dependencies.insert(dep_name.to_string(), resolved);
                    }
                    None => {
                        external_dependencies.insert(dep_name.to_string(), spec.to_string());
                    }
                }
            }

            nodes.push(PackageGraphNode {
                package: package.clone(),
                local_dependencies,
                local_dependents: BTreeSet::new(),
                external_dependencies,
            });
        }

        let edges: Vec<(String, String)> = nodes
            .iter()
            .flat_map(|n| {
                n.local_dependencies
                    .keys()
                    .map(move |dep| (dep.clone(), n.name().to_string()))
            })
            .collect();
        for (dependency, dependent) in edges {
            if let Some(&i) = index.get(&dependency) {
                nodes[i].local_dependents.insert(dependent);
            }
        }

        info!(
            nodes = nodes.len(),
            edges = nodes.iter().map(|n| n.local_dependencies.len()).sum::<usize>(),
            "package graph built"
        );
        Ok(Self { nodes, index })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get a node by package name
    pub fn get(&self, name: &str) -> Option<&PackageGraphNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Whether a package with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Mutable access to a node's package
    pub fn package_mut(&mut self, name: &str) -> Option<&mut Package> {
        let i = *self.index.get(name)?;
        Some(&mut self.nodes[i].package)
    }

    /// Nodes in discovery order
    pub fn nodes(&self) -> impl Iterator<Item = &PackageGraphNode> {
        self.nodes.iter()
    }

    /// Package names in discovery order
    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.name().to_string()).collect()
    }

    /// `names` plus every package that transitively depends on one of them
    ///
    /// The result is in discovery order.
    pub fn with_dependents(&self, names: &[String]) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = names.iter().map(String::as_str).collect();

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(node) = self.get(current) {
                for dependent in &node.local_dependents {
                    if !seen.contains(dependent.as_str()) {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        self.nodes
            .iter()
            .map(|n| n.name())
            .filter(|name| seen.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Find a dependency cycle among `within`, returned closed (`a -> b -> a`)
    pub fn find_cycle(&self, within: &[String]) -> Option<Vec<String>> {
        let allowed: HashSet<&str> = within.iter().map(String::as_str).collect();

        fn dfs<'a>(
            graph: &'a PackageGraph,
            current: &'a str,
            allowed: &HashSet<&str>,
            visiting: &mut Vec<&'a str>,
            done: &mut HashSet<&'a str>,
        ) -> Option<Vec<String>> {
            if let Some(pos) = visiting.iter().position(|n| *n == current) {
                let mut cycle: Vec<String> = visiting[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(current.to_string());
                return Some(cycle);
            }
            if done.contains(current) || !allowed.contains(current) {
                return None;
            }

            visiting.push(current);
            if let Some(node) = graph.get(current) {
                for dep in node.local_dependencies.keys() {
                    if let Some(cycle) = dfs(graph, dep, allowed, visiting, done) {
                        return Some(cycle);
                    }
                }
            }
            visiting.pop();
            done.insert(current);
            None
        }

        let mut done = HashSet::new();
        for start in within {
            let mut visiting = Vec::new();
            if let Some(cycle) = dfs(self, start, &allowed, &mut visiting, &mut done) {
                debug!(cycle = %cycle.join(" -> "), "found dependency cycle");
                return Some(cycle);
            }
        }
        None
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn pkg(name: &str, version: &str, deps: serde_json::Value) -> Package {
        Package::from_value(
            format!("/repo/packages/{name}"),
            json!({ "name": name, "version": version, "dependencies": deps }),
        )
        .unwrap()
    }

    pub(crate) fn chain_graph() -> PackageGraph {
        PackageGraph::build(
            vec![
                pkg("a", "1.0.0", json!({})),
                pkg("b", "1.0.0", json!({ "a": "^1.0.0" })),
                pkg("c", "1.0.0", json!({ "b": "^1.0.0", "lodash": "^4.0.0" })),
            ],
            GraphType::AllDependencies,
        )
        .unwrap()
    }

    #[test]
    fn test_edges_and_transpose() {
        let graph = chain_graph();
        let b = graph.get("b").unwrap();
        assert!(b.local_dependencies.contains_key("a"));
        assert!(b.local_dependents.contains("c"));
        assert_eq!(
            graph.get("c").unwrap().external_dependencies.get("lodash").map(String::as_str),
            Some("^4.0.0")
        );

        for node in graph.nodes() {
            for dep in node.local_dependencies.keys() {
                assert!(graph.get(dep).unwrap().local_dependents.contains(node.name()));
            }
        }
    }

    #[test]
    fn test_unsatisfied_range_is_external() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", "2.0.0", json!({})),
                pkg("b", "1.0.0", json!({ "a": "^1.0.0" })),
            ],
            GraphType::AllDependencies,
        )
        .unwrap();
        let b = graph.get("b").unwrap();
        assert!(b.local_dependencies.is_empty());
        assert!(b.external_dependencies.contains_key("a"));
        assert!(graph.get("a").unwrap().local_dependents.is_empty());
    }

    #[test]
    fn test_graph_type_excludes_dev_dependencies() {
        let tool = Package::from_value(
            "/repo/packages/tool",
            json!({ "name": "tool", "version": "1.0.0", "devDependencies": { "a": "^1.0.0" } }),
        )
        .unwrap();
        let packages = vec![pkg("a", "1.0.0", json!({})), tool];

        let all = PackageGraph::build(packages.clone(), GraphType::AllDependencies).unwrap();
        assert!(all.get("tool").unwrap().local_dependencies.contains_key("a"));

        let prod = PackageGraph::build(packages, GraphType::Dependencies).unwrap();
        assert!(prod.get("tool").unwrap().local_dependencies.is_empty());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let other = Package::from_value("/repo/other/a", json!({ "name": "a", "version": "2.0.0" })).unwrap();
        let err = PackageGraph::build(vec![pkg("a", "1.0.0", json!({})), other], GraphType::AllDependencies)
            .unwrap_err();
        assert_eq!(err.code(), "EDUPLICATE");
    }

    #[test]
    fn test_with_dependents() {
        let graph = chain_graph();
        assert_eq!(graph.with_dependents(&["a".to_string()]), vec!["a", "b", "c"]);
        assert_eq!(graph.with_dependents(&["c".to_string()]), vec!["c"]);
    }

    #[test]
    fn test_find_cycle() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", "1.0.0", json!({ "b": "^1.0.0" })),
                pkg("b", "1.0.0", json!({ "a": "^1.0.0" })),
                pkg("c", "1.0.0", json!({ "a": "^1.0.0" })),
            ],
            GraphType::AllDependencies,
        )
        .unwrap();
        assert_eq!(graph.find_cycle(&graph.names()), Some(vec!["a".into(), "b".into(), "a".into()]));
        assert_eq!(chain_graph().find_cycle(&chain_graph().names()), None);
    }
}
