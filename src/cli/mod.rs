//! Command-line surface: argument parsing and subcommand dispatch, built on
//! `clap::Parser` derive and organized around nested subcommands instead
//! of one flat flag struct, since `plan` and `run` genuinely need distinct
//! option sets.

pub mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::analyze::Analysis;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::controller::ControllerClient;
use crate::errors::CouError;
use crate::execute::{self, ExecuteOutcome};
use crate::plan;

/// Top-level CLI, parsed once in `main`.
#[derive(Parser, Debug)]
#[command(name = "cou", version, about = "Charmed OpenStack Upgrader: plan and run staged OpenStack cloud upgrades")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// The three top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute and print the upgrade plan without applying it.
    Plan(PlanArgs),
    /// Compute the upgrade plan and execute it.
    Run(RunArgs),
    /// Print usage information (also available via `--help`).
    Help,
}

/// Options shared between `plan` and `run`.
#[derive(ClapArgs, Debug, Clone)]
pub struct CommonOpts {
    /// Juju model to operate against; falls back to `JUJU_MODEL`/
    /// `MODEL_NAME`, then the controller's current model.
    #[arg(long, env = "JUJU_MODEL")]
    pub model: Option<String>,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress all but warning/error output.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Restrict planning/execution to one upgrade group.
    #[command(subcommand)]
    pub group: Option<UpgradeGroup>,

    /// Run independent application/unit steps concurrently where the plan
    /// allows it.
    #[arg(long)]
    pub parallel: bool,

    /// Skip the pre-upgrade database backup step.
    #[arg(long)]
    pub no_backup: bool,
}

/// Restricts a plan/run to the control plane, or a subset of the data
/// plane selected by machine, hostname, or availability zone.
#[derive(Subcommand, Debug, Clone)]
pub enum UpgradeGroup {
    /// Only control-plane applications.
    ControlPlane,
    /// Only data-plane (hypervisor) applications, optionally narrowed.
    DataPlane(DataPlaneArgs),
}

/// Mutually exclusive ways to narrow a data-plane group.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct DataPlaneArgs {
    /// Restrict to these machine ids (comma-separated, repeatable).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["hostname", "availability_zone"])]
    pub machine: Vec<String>,

    /// Restrict to these hostnames (comma-separated, repeatable).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["machine", "availability_zone"])]
    pub hostname: Vec<String>,

    /// Restrict to these availability zones (comma-separated, repeatable).
    #[arg(long, alias = "az", value_delimiter = ',', conflicts_with_all = ["machine", "hostname"])]
    pub availability_zone: Vec<String>,
}

/// `cou plan [OPTIONS]`.
#[derive(ClapArgs, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub common: CommonOpts,
}

/// `cou run [OPTIONS]`.
#[derive(ClapArgs, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub common: CommonOpts,

    /// Prompt before every step (default).
    #[arg(long, conflicts_with = "no_interactive")]
    pub interactive: bool,

    /// Run straight through, auto-continuing past every prompt.
    #[arg(long)]
    pub no_interactive: bool,
}

impl RunArgs {
    /// What: Whether this invocation should prompt the operator —
    /// `--interactive` is the default; `--no-interactive` is the one flag
    /// that turns it off (mirrors the original's `interactive=False ->
    /// auto-continue` default).
    #[must_use]
    pub const fn is_interactive(&self) -> bool {
        !self.no_interactive
    }
}

/// Process exit codes: success, failure, interrupted.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// What: Dispatch a parsed [`Cli`] to its subcommand, given the resolved
/// configuration, loaded catalog, and a controller client.
///
/// Output: Process exit code.
pub async fn run(cli: Cli, config: &Config, catalog: &Arc<Catalog>, controller: &dyn ControllerClient) -> i32 {
    match cli.command {
        Command::Help => {
            print_help();
            EXIT_OK
        }
        Command::Plan(args) => run_plan(&args.common, config, catalog, controller).await,
        Command::Run(args) => run_run(&args, config, catalog, controller).await,
    }
}

fn print_help() {
    println!("cou plan|run [--model NAME] [--verbose|--quiet] [--parallel] [--no-backup] [control-plane|data-plane ...]");
}

async fn run_plan(common: &CommonOpts, config: &Config, catalog: &Arc<Catalog>, controller: &dyn ControllerClient) -> i32 {
    match build_plan(common, config, catalog, controller).await {
        Ok((root, advisories)) => {
            print!("{root}");
            for advisory in advisories {
                eprintln!("warning: {advisory}");
            }
            EXIT_OK
        }
        Err(err) => {
            eprintln!("error: {err}");
            EXIT_FAILURE
        }
    }
}

async fn run_run(args: &RunArgs, config: &Config, catalog: &Arc<Catalog>, controller: &dyn ControllerClient) -> i32 {
    let (mut root, advisories) = match build_plan(&args.common, config, catalog, controller).await {
        Ok(plan) => plan,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_FAILURE;
        }
    };
    for advisory in advisories {
        eprintln!("warning: {advisory}");
    }

    match execute::execute(&mut root, controller, args.is_interactive(), args.common.parallel).await {
        ExecuteOutcome::Completed => EXIT_OK,
        ExecuteOutcome::Failed => EXIT_FAILURE,
        ExecuteOutcome::Interrupted => EXIT_INTERRUPTED,
    }
}

async fn build_plan(
    common: &CommonOpts,
    config: &Config,
    catalog: &Arc<Catalog>,
    controller: &dyn ControllerClient,
) -> Result<(crate::steps::Plan, Vec<String>), CouError> {
    let analysis = Analysis::create(controller, catalog).await?;
    let analysis = restrict_to_group(analysis, common.group.as_ref());
    plan::generate_plan(&analysis, common.no_backup, &data_dir(config), catalog)
}

fn data_dir(config: &Config) -> PathBuf {
    config.data_dir.clone()
}

/// What: Narrow an [`Analysis`] to the applications the operator's
/// `--control-plane`/`--data-plane [...]` selector allows through, before
/// handing it to the plan assembler. `None` (no group given) passes every
/// classified application through unchanged.
fn restrict_to_group(mut analysis: Analysis, group: Option<&UpgradeGroup>) -> Analysis {
    let Some(group) = group else {
        return analysis;
    };
    analysis.apps.retain(|app| match group {
        UpgradeGroup::ControlPlane => !crate::analyze::is_data_plane(app),
        UpgradeGroup::DataPlane(filter) => crate::analyze::is_data_plane(app) && matches_data_plane_filter(app, filter),
    });
    analysis
}

fn matches_data_plane_filter(app: &crate::apps::Application, filter: &DataPlaneArgs) -> bool {
    if filter.machine.is_empty() && filter.hostname.is_empty() && filter.availability_zone.is_empty() {
        return true;
    }
    let core = app.core();
    core.machines.values().any(|m| {
        (!filter.machine.is_empty() && filter.machine.contains(&m.id))
            || (!filter.hostname.is_empty() && m.hostname.as_ref().is_some_and(|h| filter.hostname.contains(h)))
            || (!filter.availability_zone.is_empty() && m.availability_zone.as_ref().is_some_and(|z| filter.availability_zone.contains(z)))
    })
}
