//! The `codegrade list-evaluators` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use codegrade_evaluators::config::{build_engine, load_config_from};

pub fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let engine = build_engine(&config)?;

    let mut table = Table::new();
    table.set_header(vec!["Name", "Kind", "Score rule", "Weight"]);

    for (name, kind) in engine.registry().entries() {
        let rule = engine
            .normalizer()
            .rule(name)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unscored".to_string());
        table.add_row(vec![
            Cell::new(name),
            Cell::new(kind),
            Cell::new(rule),
            Cell::new(format!("{:.1}", engine.config().aggregation.weight(name))),
        ]);
    }

    println!("{table}");
    Ok(())
}
