//! `routewise status`: provider dashboard.

use std::collections::BTreeSet;

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Serialize;

use routewise_core::router::Router;
use routewise_types::capability::CapabilityType;
use routewise_types::provider::HealthStatus;

use super::format_capabilities;

#[derive(Debug, Serialize)]
struct ProviderRow {
    name: String,
    is_llm_provider: bool,
    capabilities: BTreeSet<CapabilityType>,
    health: HealthStatus,
    isolated: bool,
    failures: u32,
    avg_response_secs: Option<f64>,
    models: Vec<String>,
}

fn collect_rows(router: &Router) -> Vec<ProviderRow> {
    let registry = router.registry();
    registry
        .list_providers(false)
        .into_iter()
        .map(|name| {
            let spec = registry.provider_spec(&name);
            let health = registry
                .health_status(&name)
                .ok()
                .flatten()
                .map(|report| report.status)
                .unwrap_or_default();
            let models = registry
                .list_models(&name)
                .map(|models| models.into_iter().map(|m| m.id).collect())
                .unwrap_or_default();
            ProviderRow {
                is_llm_provider: spec.as_ref().is_none_or(|s| s.is_llm_provider),
                capabilities: spec
                    .map(|s| s.capabilities)
                    .unwrap_or_default(),
                health,
                isolated: router.is_provider_isolated(&name),
                failures: router.ledger().failure_count(&name),
                avg_response_secs: router.ledger().performance().avg_response_secs(&name),
                models,
                name,
            }
        })
        .collect()
}

/// Display provider status: health, isolation, failures, plus the
/// configured hierarchy and hard fallback.
pub fn status(router: &Router, json: bool) -> Result<()> {
    let rows = collect_rows(router);
    let config = router.config();

    if json {
        let out = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "providers": rows,
            "default_hierarchy": config.default_hierarchy,
            "hard_final_fallback": config.hard_final_fallback,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("  {} routewise v{}", style("⚡").bold(), env!("CARGO_PKG_VERSION"));
    println!();

    if rows.is_empty() {
        println!("  {} No providers registered.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Provider").fg(Color::White),
        Cell::new("Capabilities").fg(Color::White),
        Cell::new("Health").fg(Color::White),
        Cell::new("Isolated").fg(Color::White),
        Cell::new("Failures").fg(Color::White),
        Cell::new("Avg Response").fg(Color::White),
        Cell::new("Models").fg(Color::White),
    ]);

    for row in &rows {
        let health_cell = match row.health {
            HealthStatus::Healthy => Cell::new("healthy").fg(Color::Green),
            HealthStatus::Degraded => Cell::new("degraded").fg(Color::Yellow),
            HealthStatus::Unhealthy => Cell::new("UNHEALTHY").fg(Color::Red),
            HealthStatus::Unknown => Cell::new("unknown").fg(Color::DarkGrey),
        };
        let isolated_cell = if row.isolated {
            Cell::new("yes").fg(Color::Red)
        } else {
            Cell::new("no").fg(Color::Green)
        };
        let name = if row.is_llm_provider {
            row.name.clone()
        } else {
            format!("{} (non-llm)", row.name)
        };
        let avg = row
            .avg_response_secs
            .map(|secs| format!("{:.0}ms", secs * 1000.0))
            .unwrap_or_else(|| "-".to_string());
        let models = if row.models.is_empty() {
            "-".to_string()
        } else {
            row.models.join(", ")
        };

        table.add_row(vec![
            Cell::new(name).fg(Color::Cyan),
            Cell::new(format_capabilities(&row.capabilities)).fg(Color::DarkGrey),
            health_cell,
            isolated_cell,
            Cell::new(row.failures).fg(Color::White),
            Cell::new(avg).fg(Color::DarkGrey),
            Cell::new(models).fg(Color::DarkGrey),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {}", style("── Routing ──").dim());
    println!("  Hierarchy:     {}", config.default_hierarchy.join(" → "));
    println!(
        "  Hard fallback: {}/{}",
        config.hard_final_fallback.provider, config.hard_final_fallback.model
    );
    println!(
        "  Isolation:     {} failures in {}s, {}s cooldown",
        config.max_failure_threshold, config.failure_window_secs, config.isolation_duration_secs
    );
    println!();

    Ok(())
}
