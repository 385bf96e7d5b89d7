//! Binary entrypoint kept minimal: parses arguments, resolves
//! configuration, initializes logging, loads the release catalog, and
//! hands off to `cou::cli::run`.

use std::sync::Arc;

use clap::Parser;
use cou::catalog::Catalog;
use cou::cli::{Cli, EXIT_FAILURE};
use cou::config::Config;
use cou::controller::juju::JujuControllerClient;
use cou::logging::{self, Verbosity};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let common = common_opts(&cli.command);

    let config = Config::resolve(common.and_then(|c| c.model.clone()));
    let verbosity = common.map_or(Verbosity::Normal, |c| Verbosity::from_flags(c.verbose, c.quiet));

    let _log_guard = match logging::init(&config.data_dir, verbosity) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("error: failed to initialize logging: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let catalog = match Catalog::load_default() {
        Ok(catalog) => Arc::new(catalog),
        Err(err) => {
            tracing::error!("failed to load the release catalog: {err}");
            std::process::exit(EXIT_FAILURE);
        }
    };

    let controller = JujuControllerClient::new(config.model.clone());
    let code = cou::cli::run(cli, &config, &catalog, &controller).await;
    std::process::exit(code);
}

fn common_opts(command: &cou::cli::Command) -> Option<&cou::cli::CommonOpts> {
    match command {
        cou::cli::Command::Plan(args) => Some(&args.common),
        cou::cli::Command::Run(args) => Some(&args.common),
        cou::cli::Command::Help => None,
    }
}
