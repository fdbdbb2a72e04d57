//! `routewise config`: print the effective configuration.

use anyhow::Result;

use routewise_core::router::Router;
use routewise_infra::config::render_router_config;

pub fn show_config(router: &Router, json: bool) -> Result<()> {
    let config = router.config();
    if json {
        println!("{}", serde_json::to_string_pretty(config.as_ref())?);
    } else {
        print!("{}", render_router_config(&config)?);
    }
    Ok(())
}
