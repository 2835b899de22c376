//! The `codegrade serve` command.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

use codegrade_evaluators::config::{build_engine, load_config_from};
use codegrade_server::{serve, AppState};

pub async fn execute(listen: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let mut config = load_config_from(config_path.as_deref())?;
    if let Some(listen) = listen {
        config.listen = listen;
    }
    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", config.listen))?;

    let engine = build_engine(&config).context("failed to initialize evaluators")?;
    serve(addr, AppState::new(engine))
        .await
        .with_context(|| format!("server on {addr} failed"))
}
