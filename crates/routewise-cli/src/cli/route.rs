//! `routewise route`: dry-run provider selection.

use anyhow::Result;
use clap::Args;
use console::style;

use routewise_core::router::{RouteRequest, Router};
use routewise_types::capability::{CapabilityRequirement, CapabilityType};
use routewise_types::response::RECOVERY_SUGGESTIONS;
use routewise_types::selection::{SelectionResult, UserPreference};

use super::{SimulationArgs, format_capabilities};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Preferred provider (aliases like `gpt` or `hf` are accepted).
    #[arg(long, value_name = "PROVIDER")]
    pub prefer: Option<String>,

    /// Preferred model on the preferred provider.
    #[arg(long)]
    pub model: Option<String>,

    /// Capabilities the provider must declare, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub require: Vec<CapabilityType>,

    /// Capabilities that only improve a provider's score, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub want: Vec<CapabilityType>,

    #[command(flatten)]
    pub simulate: SimulationArgs,
}

impl RouteArgs {
    fn request(&self) -> RouteRequest {
        let preference = UserPreference {
            provider: self.prefer.clone(),
            model: self.model.clone(),
        };
        let requirement =
            CapabilityRequirement::requiring(self.require.iter().copied()).with_preferred(self.want.iter().copied());
        RouteRequest::new("")
            .with_preference(preference)
            .with_requirement(requirement)
    }
}

pub fn route(router: &Router, args: RouteArgs, json: bool) -> Result<()> {
    args.simulate.apply(router)?;
    let result = router.dry_run(&args.request())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_selection(&result);
    Ok(())
}

fn print_selection(result: &SelectionResult) {
    println!();
    match &result.provider {
        Some(provider) => {
            println!(
                "  {} {} {}",
                style("→").green().bold(),
                style(provider).cyan().bold(),
                style(result.model.as_deref().unwrap_or("(provider default)")).dim()
            );
        }
        None => {
            println!("  {} {}", style("✗").red().bold(), style("degraded mode").red().bold());
        }
    }
    println!();
    println!("  Path:        {}", style(result.selection_path).bold());
    println!("  Rationale:   {}", result.rationale);
    println!("  Fallbacks:   {}", result.fallback_attempts);
    println!("  Checks:      {}", result.health_checks_performed);
    println!("  Time:        {:.3}ms", result.total_selection_time_ms);
    if !result.degraded_capabilities.is_empty() {
        println!(
            "  Relaxed:     {}",
            style(format_capabilities(&result.degraded_capabilities)).yellow()
        );
    }

    if result.is_degraded_mode() {
        println!();
        println!("  {}", style("── Suggestions ──").dim());
        for suggestion in RECOVERY_SUGGESTIONS {
            println!("  • {suggestion}");
        }
    }
    println!();
}
