use anyhow::Context;

use crate::app::AppContext;
use crate::cli::utils::load_config;

pub fn handle() -> anyhow::Result<()> {
    let config = load_config()?;
    let app = AppContext::from_config(&config).context("failed to assemble application")?;
    println!("{}", serde_json::to_string_pretty(&app.openapi)?);
    Ok(())
}
