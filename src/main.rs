//! fetchdesk - Browse users and posts from a REST API, and keep a local todo list
//!
//! Each invocation runs one command. Fetched collections are cached with a
//! time-to-live and the cache is carried between runs as a JSON snapshot.

use std::io;
use std::process::ExitCode;

use clap::Parser;

use fetchdesk::app::{AppContext, AppError};
use fetchdesk::cli::{Cli, StartupConfig};
use fetchdesk::logging::init_tracing;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match StartupConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => return report(&AppError::from(e)),
    };

    init_tracing(config.verbose);
    tracing::debug!(?config, "starting");

    let context = AppContext::new(&config);
    let mut stdout = io::stdout().lock();
    match context.run(&cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(error: &AppError) -> ExitCode {
    eprintln!("error: {}", error);
    ExitCode::FAILURE
}
