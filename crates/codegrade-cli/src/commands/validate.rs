//! The `codegrade validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use codegrade_evaluators::config::{build_engine, load_config_from};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let engine = build_engine(&config).context("configuration is invalid")?;

    let names = engine.registry().names();
    println!("{} evaluator(s) registered: {}", names.len(), names.join(", "));
    println!(
        "max_code_length = {}, evaluator_timeout_ms = {}, listen = {}",
        config.max_code_length, config.evaluator_timeout_ms, config.listen
    );
    println!("Configuration valid.");
    Ok(())
}
