//! # cmux CLI entry point
//!
//! Parses command-line arguments, initializes tracing and dispatches to the
//! subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmux_cli::index::{run_index, IndexArgs};
use cmux_cli::serve::{run_serve, ServeArgs};

/// Multi-tenant chart repository server.
///
/// Serves one chart repository per namespace from a single storage root.
/// The number of leading path segments that form a namespace is fixed per
/// server instance (`--depth`).
#[derive(Parser, Debug)]
#[command(name = "cmux", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    /// Ignored when RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, env = "CMUX_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the chart repository server.
    Serve(ServeArgs),

    /// Print the index.yaml of one namespace of a local storage root.
    Index(IndexArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!("cmux v{} starting", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Index(args) => run_index(args).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so `cmux index` output on stdout stays clean.
fn init_tracing(verbose: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("info"),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
