//! modelship: package a model, compile it for a target, host it, invoke it, tear it down.

use anyhow::Context;
use clap::Parser;
use modelship_core::PlatformConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;

use args::{Cli, Command};
use commands::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries command output; logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = PlatformConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    debug!(
        "Platform config: region {}, control plane {}",
        config.region,
        config.control_endpoint()
    );
    let session = Session::new(config)?;

    match cli.command {
        Command::Package(args) => commands::package(&session, args).await,
        Command::Upload(args) => commands::upload(&session, args).await,
        Command::Compile(args) => commands::compile(&session, args).await,
        Command::Deploy(args) => commands::deploy(&session, args).await,
        Command::Invoke(args) => commands::invoke(&session, args).await,
        Command::Teardown(args) => commands::teardown(&session, args).await,
        Command::Run(args) => commands::run(&session, args).await,
    }
}
