//! CLI command definitions for the `routewise` binary.
//!
//! Every command builds a fresh router from the loaded configuration, so
//! isolation and failure flags only shape the single invocation they appear on.

pub mod chain;
pub mod config;
pub mod degrade;
pub mod route;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use routewise_core::router::Router;
use routewise_types::capability::CapabilityType;
use routewise_types::failure::FailureType;

/// Inspect provider selection, isolation and fallback decisions.
#[derive(Parser)]
#[command(name = "routewise", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed logs on stderr (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit config file. Defaults to `$ROUTEWISE_HOME/routewise.toml`.
    #[arg(long, global = true, env = "ROUTEWISE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Export spans through OpenTelemetry to stdout.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Registered providers with health, isolation and failure counts.
    Status,

    /// Dry-run provider selection for a request.
    Route(route::RouteArgs),

    /// Find a provider by relaxing capability requirements.
    Degrade(degrade::DegradeArgs),

    /// Show the model fallback chain for a provider.
    Chain {
        /// Provider name.
        provider: String,

        /// Primary model the chain starts from.
        model: String,

        #[command(flatten)]
        simulate: SimulationArgs,
    },

    /// Print the effective configuration (TOML, or JSON with --json).
    Config,
}

/// Simulated provider state applied before a dry run.
#[derive(Args, Debug, Default)]
pub struct SimulationArgs {
    /// Administratively isolate a provider (repeatable).
    #[arg(long, value_name = "PROVIDER")]
    pub isolate: Vec<String>,

    /// Record a failure, as `provider:failure_type` or `provider/model:failure_type` (repeatable).
    #[arg(long, value_name = "SPEC")]
    pub fail: Vec<String>,
}

impl SimulationArgs {
    pub fn apply(&self, router: &Router) -> Result<()> {
        for spec in &self.fail {
            let failure = parse_failure(spec)?;
            router.record_failure(
                &failure.provider,
                failure.model.as_deref(),
                failure.kind,
                "simulated from command line",
                "chat",
            );
        }
        for provider in &self.isolate {
            router.isolate_provider(provider, "isolated from command line");
        }
        Ok(())
    }
}

/// Parsed `--fail` argument.
#[derive(Debug, PartialEq, Eq)]
pub struct SimulatedFailure {
    pub provider: String,
    pub model: Option<String>,
    pub kind: FailureType,
}

pub fn parse_failure(spec: &str) -> Result<SimulatedFailure> {
    let (target, kind) = spec
        .rsplit_once(':')
        .with_context(|| format!("expected provider:failure_type, got '{spec}'"))?;
    let kind: FailureType = kind.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let (provider, model) = match target.split_once('/') {
        Some((provider, model)) => (provider, Some(model.to_string())),
        None => (target, None),
    };
    if provider.trim().is_empty() {
        anyhow::bail!("missing provider in '{spec}'");
    }
    Ok(SimulatedFailure {
        provider: provider.trim().to_string(),
        model,
        kind,
    })
}

/// Comma-joined capability list, `-` when empty.
pub fn format_capabilities<'a>(caps: impl IntoIterator<Item = &'a CapabilityType>) -> String {
    let joined = caps.into_iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
    if joined.is_empty() { "-".to_string() } else { joined }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_failure_with_and_without_model() {
        assert_eq!(
            parse_failure("openai:rate_limit_error").unwrap(),
            SimulatedFailure {
                provider: "openai".to_string(),
                model: None,
                kind: FailureType::RateLimitError,
            }
        );
        assert_eq!(
            parse_failure("llamacpp/llama-2-13b:timeout_error").unwrap(),
            SimulatedFailure {
                provider: "llamacpp".to_string(),
                model: Some("llama-2-13b".to_string()),
                kind: FailureType::TimeoutError,
            }
        );
    }

    #[test]
    fn parse_failure_rejects_garbage() {
        assert!(parse_failure("openai").is_err());
        assert!(parse_failure("openai:exploded").is_err());
        assert!(parse_failure(":network_error").is_err());
    }

    #[test]
    fn route_flags_parse() {
        let cli = Cli::try_parse_from([
            "routewise",
            "--json",
            "route",
            "--prefer",
            "gpt",
            "--require",
            "streaming,vision",
            "--isolate",
            "openai",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Route(args) => {
                assert_eq!(args.prefer.as_deref(), Some("gpt"));
                assert_eq!(args.require, vec![CapabilityType::Streaming, CapabilityType::Vision]);
                assert_eq!(args.simulate.isolate, vec!["openai"]);
            }
            _ => panic!("expected route command"),
        }
    }

    #[test]
    fn capabilities_format_as_list() {
        assert_eq!(format_capabilities(&[]), "-");
        assert_eq!(
            format_capabilities(&[CapabilityType::Streaming, CapabilityType::Vision]),
            "streaming, vision"
        );
    }
}
