//! Changed command

use clap::Args;
use serde_json::json;

use convoy_core::monorepo::{ChangeDetector, DiffChangeDetector, PackageGraph};

use super::BumpArgs;
use crate::cli::output;
use crate::cli::workspace::Workspace;
use crate::cli::{Cli, OutputFormat};

/// List packages that changed since the last release
#[derive(Debug, Args)]
pub struct ChangedCommand {
    #[command(flatten)]
    pub args: BumpArgs,
}

impl ChangedCommand {
    /// Execute the changed command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let workspace = Workspace::load(&cwd)?;
        let graph = workspace.graph()?;
        let detector = DiffChangeDetector::new(
            workspace.vcs(),
            workspace.config.versioning.mode,
            workspace.config.versioning.tag_prefix.clone(),
        );
        let updates = detector.collect_updates(&graph, &self.args.change_options(&workspace))?;
        let include_private = self.args.include_private || workspace.config.publish.include_private;
        let changed = publishable(&graph, updates, include_private);

        if cli.format == OutputFormat::Json {
            let entries: Vec<_> = changed
                .iter()
                .filter_map(|name| graph.get(name))
                .map(|node| {
                    json!({
                        "name": node.name(),
                        "version": node.package.version(),
                        "private": node.package.is_private(),
                        "location": node.package.location(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
            return Ok(());
        }

        if changed.is_empty() {
            if !cli.quiet {
                output::info("No changed packages found.");
            }
            return Ok(());
        }
        for name in &changed {
            println!("{}", name);
        }
        if !cli.quiet {
            output::success(&format!("found {} package(s) ready to publish", changed.len()));
        }
        Ok(())
    }
}

/// Drop private packages unless asked to keep them
fn publishable(graph: &PackageGraph, updates: Vec<String>, include_private: bool) -> Vec<String> {
    updates
        .into_iter()
        .filter(|name| {
            include_private
                || graph
                    .get(name)
                    .map(|node| !node.package.is_private())
                    .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::monorepo::{GraphType, Package};

    fn package(name: &str, private: bool) -> Package {
        Package::from_value(
            format!("/repo/packages/{name}"),
            json!({ "name": name, "version": "1.0.0", "private": private }),
        )
        .unwrap()
    }

    #[test]
    fn test_private_packages_are_hidden() {
        let graph = PackageGraph::build(
            vec![package("a", false), package("b", true)],
            GraphType::AllDependencies,
        )
        .unwrap();
        let updates = vec!["a".to_string(), "b".to_string()];
        assert_eq!(publishable(&graph, updates.clone(), false), vec!["a"]);
        assert_eq!(publishable(&graph, updates, true), vec!["a", "b"]);
    }
}
