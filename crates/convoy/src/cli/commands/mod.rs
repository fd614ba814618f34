//! CLI commands

mod changed;
mod publish;
mod version;

pub use changed::ChangedCommand;
pub use publish::PublishCommand;
pub use version::VersionCommand;

use std::str::FromStr;

use clap::Args;
use console::style;
use tracing::info;

use convoy_core::error::{ConvoyError, VersionError};
use convoy_core::monorepo::changes::ChangeOptions;
use convoy_core::monorepo::versioning::VersionRequest;
use convoy_core::types::ReleaseType;
use convoy_core::workflow::{ReleaseOptions, ReleaseOrchestrator, ReleaseOutcome};

use super::output;
use super::workspace::{is_ci, Workspace};
use super::{Cli, OutputFormat};

/// Git flags shared by `version` and `publish`
#[derive(Debug, Clone, Default, Args)]
pub struct GitArgs {
    /// Do not push the release commit and tags
    #[arg(long)]
    pub no_push: bool,

    /// Do not commit or tag version changes
    #[arg(long)]
    pub no_git_tag_version: bool,

    /// Commit message template; `{version}` is replaced
    #[arg(short, long)]
    pub message: Option<String>,

    /// Branch globs allowed to release from
    #[arg(long = "allow-branch")]
    pub allow_branch: Vec<String>,

    /// Allow uncommitted changes in the working tree
    #[arg(long)]
    pub allow_dirty: bool,

    /// Remote to push to
    #[arg(long)]
    pub git_remote: Option<String>,
}

/// Versioning flags shared by `version` and `publish`
#[derive(Debug, Clone, Default, Args)]
pub struct BumpArgs {
    /// Prerelease identifier
    #[arg(long)]
    pub preid: Option<String>,

    /// Pin rewritten local dependency ranges exactly
    #[arg(long)]
    pub exact: bool,

    /// Packages to treat as changed; `*` for all
    #[arg(long, value_delimiter = ',')]
    pub force_publish: Vec<String>,

    /// Ignore changes in files matching these globs
    #[arg(long)]
    pub ignore_changes: Vec<String>,

    /// Compare against this ref instead of the last release tag
    #[arg(long)]
    pub since: Option<String>,

    /// Release private packages too
    #[arg(long)]
    pub include_private: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl BumpArgs {
    /// Change detection options merged with configured ignore globs
    pub fn change_options(&self, workspace: &Workspace) -> ChangeOptions {
        let mut ignore_changes = workspace.config.publish.ignore_changes.clone();
        ignore_changes.extend(self.ignore_changes.iter().cloned());
        ChangeOptions {
            since: self.since.clone(),
            ignore_changes,
            force: self.force_publish.clone(),
            canary: false,
        }
    }
}

/// `major`, `prerelease`, ... or an explicit `x.y.z`; nothing means recommend
pub fn parse_request(bump: Option<&str>, preid: Option<String>) -> convoy_core::Result<VersionRequest> {
    let Some(bump) = bump else {
        return Ok(VersionRequest::Recommend { preid });
    };
    if let Ok(version) = semver::Version::parse(bump.trim_start_matches('v')) {
        return Ok(VersionRequest::Explicit(version));
    }
    let release = ReleaseType::from_str(bump)
        .map_err(|_| ConvoyError::from(VersionError::InvalidBumpType(bump.to_string())))?;
    Ok(VersionRequest::Bump { release, preid })
}

/// Apply shared flags on top of configured options
pub fn apply_common_args(options: &mut ReleaseOptions, git: &GitArgs, bump: &BumpArgs) {
    if git.no_push {
        options.push = false;
    }
    if git.no_git_tag_version {
        options.commit = false;
        options.tag = false;
        options.push = false;
    }
    if let Some(message) = &git.message {
        options.commit_message = message.clone();
    }
    if !git.allow_branch.is_empty() {
        options.allow_branches = git.allow_branch.clone();
    }
    if git.allow_dirty {
        options.require_clean = false;
    }
    if let Some(remote) = &git.git_remote {
        options.remote = remote.clone();
    }
    if bump.exact {
        options.exact = true;
    }
    if bump.include_private {
        options.include_private = true;
    }
    options.yes = bump.yes;
    options.ci = is_ci();
}

/// Run the release state machine and report the outcome
pub fn run_release(cli: &Cli, workspace: &Workspace, options: ReleaseOptions) -> anyhow::Result<()> {
    info!(
        strategy = options.strategy.name(),
        mode = %options.mode,
        publish = options.publish,
        push = options.push,
        "starting release"
    );
    let graph = workspace.graph()?;
    let interactive = !options.yes && !options.ci;
    let collaborators = workspace.collaborators(&options, &graph, interactive)?;
    let orchestrator = ReleaseOrchestrator::new(options, collaborators);

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(orchestrator.run(graph))?;

    match outcome {
        ReleaseOutcome::Released(report) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !cli.quiet {
                output::print_report(&report);
                output::success(&format!("Released {} package(s)", report.packages.len()));
            }
        }
        ReleaseOutcome::NothingToRelease => {
            if !cli.quiet {
                output::info("No changed packages to release.");
            }
        }
        ReleaseOutcome::Cancelled => {
            println!("{}", style("Aborted.").yellow());
        }
        ReleaseOutcome::BehindUpstreamInCi => {
            output::warning("Local branch is behind upstream, skipping release.");
        }
    }
    Ok(())
}
