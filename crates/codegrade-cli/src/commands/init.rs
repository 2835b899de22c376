//! The `codegrade init` command.

use std::path::Path;

use anyhow::{Context, Result};

use codegrade_evaluators::config::{CONFIG_FILE_NAME, STARTER_CONFIG};

pub fn execute() -> Result<()> {
    if Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, STARTER_CONFIG)
            .with_context(|| format!("failed to write {CONFIG_FILE_NAME}"))?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    println!("\nNext steps:");
    println!("  1. Edit {CONFIG_FILE_NAME} to add or tune evaluators");
    println!("  2. Run: codegrade validate");
    println!("  3. Run: codegrade evaluate --file my_module.py --format table");

    Ok(())
}
