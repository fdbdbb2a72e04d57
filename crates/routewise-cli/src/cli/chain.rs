//! `routewise chain`: model fallback chain inspection.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use routewise_core::router::Router;
use routewise_core::selection::fallback::size_rank;

use super::SimulationArgs;

pub fn chain(router: &Router, provider: &str, model: &str, simulate: &SimulationArgs, json: bool) -> Result<()> {
    simulate.apply(router)?;
    let chain = router.fallback_chain(provider, model);
    let selected = router.resolver().viable_model(provider, model);

    if json {
        let out = serde_json::json!({
            "provider": provider,
            "primary_model": model,
            "chain": chain,
            "selected_model": selected,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Fallback chain for {} on {}",
        style("⛓").bold(),
        style(model).cyan(),
        style(provider).cyan()
    );
    println!();

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Size Rank").fg(Color::White),
        Cell::new("Role").fg(Color::White),
    ]);

    for (i, candidate) in chain.iter().enumerate() {
        let role = match (i, *candidate == selected) {
            (0, true) => Cell::new("primary, selected").fg(Color::Green),
            (0, false) => Cell::new("primary").fg(Color::Yellow),
            (_, true) => Cell::new("fallback, selected").fg(Color::Green),
            (_, false) => Cell::new("fallback").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(i + 1).fg(Color::Cyan),
            Cell::new(candidate).fg(Color::White),
            Cell::new(size_rank(candidate)).fg(Color::DarkGrey),
            role,
        ]);
    }

    println!("{table}");
    if chain.len() == 1 {
        println!();
        println!(
            "  {}",
            style("No other models are listed for this provider.").dim()
        );
    }
    println!();

    Ok(())
}
