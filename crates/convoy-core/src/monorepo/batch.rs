//! Topological batching and stage execution
//!
//! [`batch_packages`] splits a subset of the graph into stages whose
//! members have no unresolved local dependency on each other or on later
//! stages. [`run_batched`] walks those stages strictly in order, running
//! the members of one stage concurrently up to a limit.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConvoyError, Result};

use super::graph::PackageGraph;

/// Options for [`batch_packages`]
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Fail on a dependency cycle instead of breaking it
    pub reject_cycles: bool,
    /// Order by dependencies; when false, one stage sorted by name
    pub sort: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            reject_cycles: false,
            sort: true,
        }
    }
}

/// Split `names` into dependency-ordered stages
pub fn batch_packages(
    graph: &PackageGraph,
    names: &[String],
    options: BatchOptions,
) -> Result<Vec<Vec<String>>> {
    let mut remaining: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if graph.contains(name) && !remaining.contains(name) {
            remaining.push(name.clone());
        }
    }
    if remaining.is_empty() {
        return Ok(Vec::new());
    }

    if !options.sort {
        remaining.sort();
        return Ok(vec![remaining]);
    }

    let in_set: HashSet<&str> = remaining.iter().map(String::as_str).collect();
    let mut refcounts: HashMap<String, usize> = remaining
        .iter()
        .map(|name| {
            let count = graph
                .get(name)
                .map(|n| {
                    n.local_dependencies
                        .keys()
                        .filter(|d| in_set.contains(d.as_str()))
                        .count()
                })
                .unwrap_or(0);
            (name.clone(), count)
        })
        .collect();

    let mut stages: Vec<Vec<String>> = Vec::new();
    while !remaining.is_empty() {
        let mut stage: Vec<String> = remaining
            .iter()
            .filter(|name| refcounts.get(*name).copied().unwrap_or(0) == 0)
            .cloned()
            .collect();

        if stage.is_empty() {
            if options.reject_cycles {
                let cycle = graph
                    .find_cycle(&remaining)
                    .unwrap_or_else(|| remaining.clone());
                return Err(ConfigError::CyclicDependency(cycle).into());
            }

            let forced = most_depended_upon(graph, &remaining);
            warn!(
                package = %forced,
                remaining = remaining.len(),
                "dependency cycle detected, releasing most depended-upon package first"
            );
            stage = vec![forced];
        }

        remaining.retain(|name| !stage.contains(name));
        for name in &stage {
            if let Some(node) = graph.get(name) {
                for dependent in &node.local_dependents {
                    if let Some(count) = refcounts.get_mut(dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }
        }
        stages.push(stage);
    }

    debug!(stages = stages.len(), "batched packages");
    Ok(stages)
}

// Ties go to the first package in `remaining`.
fn most_depended_upon(graph: &PackageGraph, remaining: &[String]) -> String {
    let in_set: HashSet<&str> = remaining.iter().map(String::as_str).collect();
    let mut best: Option<(&String, usize)> = None;
    for name in remaining {
        let dependents = graph
            .get(name)
            .map(|n| {
                n.local_dependents
                    .iter()
                    .filter(|d| in_set.contains(d.as_str()))
                    .count()
            })
            .unwrap_or(0);
        if best.map_or(true, |(_, count)| dependents > count) {
            best = Some((name, dependents));
        }
    }
    best.map(|(name, _)| name.clone()).unwrap_or_default()
}

/// Result of running a task over batched stages
#[derive(Debug)]
pub struct BatchOutcome<T> {
    /// Packages whose task finished, in completion order
    pub completed: Vec<(String, T)>,
    /// The first failure, if any; nothing after it was started
    pub failure: Option<(String, ConvoyError)>,
}

impl<T> BatchOutcome<T> {
    /// Names of packages whose task finished
    pub fn completed_names(&self) -> Vec<String> {
        self.completed.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Run `task` for every package, stage by stage
///
/// Within a stage at most `concurrency` tasks run at once. The first
/// error aborts the rest of that stage and skips every later stage.
pub async fn run_batched<T, F, Fut>(
    stages: &[Vec<String>],
    concurrency: usize,
    task: F,
) -> BatchOutcome<T>
where
    T: Send + 'static,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut outcome = BatchOutcome {
        completed: Vec::new(),
        failure: None,
    };

    for (stage_idx, stage) in stages.iter().enumerate() {
        debug!(stage = stage_idx, packages = stage.len(), "starting stage");
        let mut set = JoinSet::new();

        for name in stage {
            let semaphore = semaphore.clone();
            let fut = task(name.clone());
            let name = name.clone();
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (name, Err(ConvoyError::other(e.to_string()))),
                };
                let result = fut.await;
                (name, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(value))) => outcome.completed.push((name, value)),
                Ok((name, Err(e))) => {
                    if outcome.failure.is_none() {
                        outcome.failure = Some((name, e));
                        set.abort_all();
                    }
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    if outcome.failure.is_none() {
                        outcome.failure = Some((
                            format!("stage {}", stage_idx),
                            ConvoyError::other(format!("task panicked: {}", e)),
                        ));
                        set.abort_all();
                    }
                }
            }
        }

        if outcome.failure.is_some() {
            break;
        }
    }

    info!(
        completed = outcome.completed.len(),
        failed = outcome.failure.is_some(),
        duration_ms = start.elapsed().as_millis() as u64,
        "batched run finished"
    );
    outcome
}
