//! Publish command

use clap::{Args, ValueEnum};
use tracing::info;

use convoy_core::monorepo::versioning::VersionRequest;
use convoy_core::monorepo::SelectionStrategy;
use convoy_core::workflow::ReleaseOptions;

use super::{apply_common_args, parse_request, run_release, BumpArgs, GitArgs};
use crate::cli::workspace::Workspace;
use crate::cli::Cli;

/// Publish packages to the registry
#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Publish already-versioned packages instead of versioning first
    #[arg(value_enum)]
    pub from: Option<PublishSource>,

    /// Increment or explicit version when versioning first
    #[arg(long)]
    pub bump: Option<String>,

    /// Publish a canary prerelease of packages changed in HEAD
    #[arg(long)]
    pub canary: bool,

    /// Dist-tag to publish under
    #[arg(long)]
    pub dist_tag: Option<String>,

    /// Publish under a temporary dist-tag, then move all packages at once
    #[arg(long)]
    pub temp_tag: bool,

    /// Number of concurrent registry operations
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Registry URL
    #[arg(long)]
    pub registry: Option<String>,

    /// Keep publish-time manifest edits in the working tree
    #[arg(long)]
    pub no_reset: bool,

    #[command(flatten)]
    pub git: GitArgs,

    #[command(flatten)]
    pub args: BumpArgs,
}

/// Where already-versioned packages are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PublishSource {
    /// Packages tagged at the current commit
    FromGit,
    /// Packages whose manifest version is not on the registry yet
    FromPackage,
}

impl PublishCommand {
    /// Execute the publish command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let mut workspace = Workspace::load(&cwd)?;
        if let Some(registry) = &self.registry {
            workspace.config.publish.registry = registry.clone();
        }
        let options = self.options(&workspace)?;
        info!(
            strategy = options.strategy.name(),
            dist_tag = %options.dist_tag,
            "publishing packages"
        );
        run_release(cli, &workspace, options)
    }

    fn options(&self, workspace: &Workspace) -> anyhow::Result<ReleaseOptions> {
        let mut options = ReleaseOptions::from_config(&workspace.config);
        let preid = self
            .args
            .preid
            .clone()
            .or_else(|| workspace.config.versioning.preid.clone());

        options.strategy = match (self.from, self.canary) {
            (Some(_), true) => {
                anyhow::bail!("--canary cannot be combined with from-git or from-package")
            }
            (Some(PublishSource::FromGit), false) => SelectionStrategy::FromGit,
            (Some(PublishSource::FromPackage), false) => SelectionStrategy::FromPackage,
            (None, true) => {
                let mut change = self.args.change_options(workspace);
                change.canary = true;
                SelectionStrategy::Canary(change)
            }
            (None, false) => SelectionStrategy::Diff(self.args.change_options(workspace)),
        };

        if self.canary {
            if let Some(preid) = preid.clone() {
                options.canary_preid = preid;
            }
            if let Some(bump) = &self.bump {
                match parse_request(Some(bump), None)? {
                    VersionRequest::Bump { release, .. } => options.canary_base = release.base(),
                    _ => anyhow::bail!("--canary takes an increment keyword, not a version: {}", bump),
                }
            }
            options.dist_tag = "canary".to_string();
        } else {
            options.request = parse_request(self.bump.as_deref(), preid)?;
        }

        if let Some(dist_tag) = &self.dist_tag {
            options.dist_tag = dist_tag.clone();
        }
        if self.temp_tag {
            options.temp_tag = true;
        }
        if let Some(concurrency) = self.concurrency {
            options.concurrency = concurrency.max(1);
        }
        if self.no_reset {
            options.reset = false;
        }
        apply_common_args(&mut options, &self.git, &self.args);
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        cmd: PublishCommand,
    }

    fn parse(args: &[&str]) -> PublishCommand {
        let mut argv = vec!["publish"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).unwrap().cmd
    }

    #[test]
    fn test_from_source_is_positional() {
        assert_eq!(parse(&["from-git"]).from, Some(PublishSource::FromGit));
        assert_eq!(parse(&["from-package"]).from, Some(PublishSource::FromPackage));
        assert_eq!(parse(&[]).from, None);
    }

    #[test]
    fn test_canary_flags() {
        let cmd = parse(&["--canary", "--preid", "beta", "--bump", "patch"]);
        assert!(cmd.canary);
        assert_eq!(cmd.args.preid.as_deref(), Some("beta"));
        assert_eq!(cmd.bump.as_deref(), Some("patch"));
    }
}
