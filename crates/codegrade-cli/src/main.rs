//! codegrade CLI — evaluate code locally, serve the HTTP API, or query a
//! running service.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "codegrade", version, about = "Multi-evaluator code quality scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a source file in-process
    Evaluate {
        /// Source file to evaluate, or "-" for stdin
        #[arg(long)]
        file: PathBuf,

        /// Evaluators to run (comma-separated, default: all registered)
        #[arg(long)]
        evaluators: Option<String>,

        /// Output format: json, table
        #[arg(long, default_value = "json")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Start the HTTP service
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        listen: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Submit a source file to a running service
    Submit {
        /// Base URL of the service
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        url: String,

        /// Source file to evaluate, or "-" for stdin
        #[arg(long)]
        file: PathBuf,

        /// Evaluators to run (comma-separated, default: all registered)
        #[arg(long)]
        evaluators: Option<String>,
    },

    /// List configured evaluators
    ListEvaluators {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check that the configuration builds a working engine
    Validate {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter codegrade.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codegrade=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Evaluate {
            file,
            evaluators,
            format,
            config,
        } => commands::evaluate::execute(file, evaluators, format, config).await,
        Commands::Serve { listen, config } => commands::serve::execute(listen, config).await,
        Commands::Submit {
            url,
            file,
            evaluators,
        } => commands::submit::execute(url, file, evaluators).await,
        Commands::ListEvaluators { config } => commands::list_evaluators::execute(config),
        Commands::Validate { config } => commands::validate::execute(config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
