//! quill CLI - JSON API server over a declarative ORM
//!
//! - `serve`: run the HTTP API (users, blogs) against the configured database
//! - `schema`: print the table, key and SQL derived for each entity

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod tracing_setup;

use tracing_setup::{init_tracing, TracingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "quill",
    author,
    version,
    about = "JSON API server with signature-driven request binding"
)]
struct Cli {
    /// Enable debug logging (SQL text, binding details)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::ServeArgs),
    /// Show the schema derived for each entity
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&TracingConfig { debug: cli.debug }).ok();

    match cli.command {
        Commands::Serve(args) => commands::run_serve(args).await?,
        Commands::Schema => commands::run_schema()?,
    }

    Ok(())
}
