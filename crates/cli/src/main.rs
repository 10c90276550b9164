mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use ecs_runner_common::{Config, Operation};
use tracing_subscriber::EnvFilter;

use cli::Cli;

fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();

    // Validate every input before any remote call
    let config = Config::from_inputs(&cli.raw_inputs()).context("Invalid inputs")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    match &config.operation {
        Operation::Start(start) => {
            runtime.block_on(commands::start::execute(&config, start, cli.json))
        }
        Operation::Stop(stop) => runtime.block_on(commands::stop::execute(&config, stop, cli.json)),
    }
}

fn setup_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}
