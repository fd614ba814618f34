//! Version command

use clap::Args;
use tracing::info;

use convoy_core::monorepo::SelectionStrategy;
use convoy_core::workflow::ReleaseOptions;

use super::{apply_common_args, parse_request, run_release, BumpArgs, GitArgs};
use crate::cli::workspace::Workspace;
use crate::cli::Cli;

/// Bump versions of changed packages without publishing
#[derive(Debug, Args)]
pub struct VersionCommand {
    /// Increment (major, minor, patch, premajor, ...) or an explicit version
    pub bump: Option<String>,

    #[command(flatten)]
    pub git: GitArgs,

    #[command(flatten)]
    pub args: BumpArgs,
}

impl VersionCommand {
    /// Execute the version command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let workspace = Workspace::load(&cwd)?;
        let options = self.options(&workspace)?;
        info!(bump = ?self.bump, "versioning packages");
        run_release(cli, &workspace, options)
    }

    fn options(&self, workspace: &Workspace) -> anyhow::Result<ReleaseOptions> {
        let mut options = ReleaseOptions::from_config(&workspace.config);
        let preid = self
            .args
            .preid
            .clone()
            .or_else(|| workspace.config.versioning.preid.clone());
        options.request = parse_request(self.bump.as_deref(), preid)?;
        options.strategy = SelectionStrategy::Diff(self.args.change_options(workspace));
        options.publish = false;
        options.reset = false;
        apply_common_args(&mut options, &self.git, &self.args);
        Ok(options)
    }
}
