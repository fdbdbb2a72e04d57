//! routewise CLI entry point.
//!
//! Binary name: `routewise`
//!
//! Loads the router configuration, bootstraps the provider registry from it,
//! then dispatches to the requested inspection command.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use routewise_core::router::Router;
use routewise_infra::bootstrap::build_registry;
use routewise_infra::config::{load_router_config, load_router_config_file, resolve_config_dir};
use routewise_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,routewise_core=debug",
        _ => "trace",
    };
    init_tracing(filter, cli.otel).map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => load_router_config_file(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => load_router_config(&resolve_config_dir()).await,
    };

    let registry = Arc::new(build_registry(&config));
    tracing::debug!(
        providers = registry.len(),
        hierarchy = ?config.default_hierarchy,
        "Router ready"
    );
    let router = Router::new(registry, config);

    match cli.command {
        Commands::Status => cli::status::status(&router, cli.json),
        Commands::Route(args) => cli::route::route(&router, args, cli.json),
        Commands::Degrade(args) => cli::degrade::degrade(&router, args, cli.json),
        Commands::Chain {
            provider,
            model,
            simulate,
        } => cli::chain::chain(&router, &provider, &model, &simulate, cli.json),
        Commands::Config => cli::config::show_config(&router, cli.json),
    }
}
