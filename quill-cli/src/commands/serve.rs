//! HTTP server command
//!
//! Creates the pool, registers entities and runs the API until shutdown.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use quill_orm::Pool;
use quill_web::models::register_entities;
use quill_web::run_server;

use crate::config::{load_dotenv, AppConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Config file (default: ~/.quill/config.toml)
    #[arg(long, short = 'c', env = "QUILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface to bind (overrides [server].bind_addr)
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to bind (overrides [server].bind_addr)
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    load_dotenv();
    let mut config = AppConfig::load(args.config.as_deref())?;

    let bind = config.server.bind_addr;
    config.server.bind_addr = SocketAddr::new(
        args.host.unwrap_or(bind.ip()),
        args.port.unwrap_or(bind.port()),
    );
    config.server.cors_permissive |= args.cors_permissive;

    config
        .database
        .validate()
        .context("Invalid [database] configuration")?;

    tracing::info!("Starting quill server on {}", config.server.bind_addr);

    let pool = Pool::create(&config.database)
        .await
        .context("Failed to create database pool")?;
    tracing::info!(dialect = ?pool.dialect(), "Database pool ready");

    register_entities().context("Failed to register entities")?;

    // Blocks until shutdown; closes the pool on the way out
    run_server(pool, config.server)
        .await
        .context("Server error")?;

    Ok(())
}
