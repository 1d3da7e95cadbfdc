//! PW CLI - Pagewright operator tool.
//!
//! Provides commands for:
//! - `routes`: Print the route table built from the page tree
//! - `resolve`: Show which route a request path matches
//! - `cache show`: Print a persisted page record
//! - `cache purge`: Invalidate page records
//! - `cache purge-tag`: Invalidate every fragment carrying a tag

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{CacheCommand, ResolveArgs, RoutesArgs};
use output::Output;

/// PW - Pagewright operator tool.
#[derive(Parser)]
#[command(name = "pw", version, about)]
struct Cli {
    /// Enable verbose output (show cache and route build logs).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the route table in match order.
    Routes(RoutesArgs),
    /// Show which route a request path resolves to.
    Resolve(ResolveArgs),
    /// Persistent cache commands.
    #[command(subcommand)]
    Cache(CacheCommand),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Routes(args) => args.execute(),
        Commands::Resolve(args) => args.execute(),
        Commands::Cache(cmd) => cmd.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
