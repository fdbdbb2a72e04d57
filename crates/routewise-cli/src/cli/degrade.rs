//! `routewise degrade`: capability degradation planning.

use anyhow::Result;
use clap::Args;
use console::style;

use routewise_core::router::Router;
use routewise_types::capability::{CapabilityFallbackResult, CapabilityRequirement, CapabilityType};

use super::{SimulationArgs, format_capabilities};

#[derive(Args, Debug)]
pub struct DegradeArgs {
    /// Capabilities to request, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub require: Vec<CapabilityType>,

    /// Provider to leave out of the search.
    #[arg(long, value_name = "PROVIDER")]
    pub exclude: Option<String>,

    #[command(flatten)]
    pub simulate: SimulationArgs,
}

pub fn degrade(router: &Router, args: DegradeArgs, json: bool) -> Result<()> {
    args.simulate.apply(router)?;
    let requirement = CapabilityRequirement::requiring(args.require.iter().copied());
    let result = router.attempt_capability_fallback(&requirement, args.exclude.as_deref());

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &CapabilityFallbackResult) {
    println!();
    if result.success {
        println!(
            "  {} {} {}",
            style("✓").green().bold(),
            style(result.provider.as_deref().unwrap_or("-")).cyan().bold(),
            style(result.model.as_deref().unwrap_or("(provider default)")).dim()
        );
    } else {
        println!(
            "  {} No provider satisfies the request even after relaxing capabilities",
            style("✗").red().bold()
        );
    }
    println!();
    println!("  Requested: {}", format_capabilities(&result.original_capabilities));
    println!("  Achieved:  {}", style(format_capabilities(&result.achieved_capabilities)).green());
    println!("  Degraded:  {}", style(format_capabilities(&result.degraded_capabilities)).yellow());
    if let Some(reason) = &result.fallback_reason {
        println!("  Reason:    {reason}");
    }
    println!();
}
