//! Database connection pool management
//!
//! Wraps a sqlx `AnyPool` so one binary can talk to MySQL in production and
//! SQLite in tests. The pool is an owned value: create it once at startup,
//! hand clones to whoever needs connections, and `close()` it at shutdown.

use std::time::Duration;

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};

use crate::config::{DatabaseConfig, MutationPolicy};
use crate::dialect::Dialect;
use crate::error::{OrmError, Result};

/// A borrowed connection; returned to the pool on drop.
pub type PooledConnection = PoolConnection<Any>;

/// Bounded, shareable connection pool
#[derive(Debug, Clone)]
pub struct Pool {
    inner: AnyPool,
    dialect: Dialect,
    autocommit: bool,
    mutation_policy: MutationPolicy,
    acquire_timeout: Duration,
}

impl Pool {
    /// Create the pool and open `min_pool_size` connections.
    ///
    /// # Errors
    ///
    /// Returns `OrmError::Config` for an invalid config and
    /// `OrmError::Query` if the first connection fails.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let pool = Pool::create(&DatabaseConfig::from_url("sqlite::memory:")).await?;
    /// ```
    pub async fn create(config: &DatabaseConfig) -> Result<Self> {
        let url = config.connect_url()?;
        let dialect = Dialect::from_url(&url)?;

        install_default_drivers();

        tracing::info!(
            dialect = ?dialect,
            max = config.max_pool_size,
            min = config.min_pool_size,
            "create database connection pool"
        );

        let inner = AnyPoolOptions::new()
            .max_connections(config.max_pool_size)
            .min_connections(config.min_pool_size)
            .acquire_timeout(config.acquire_timeout())
            .connect(&url)
            .await?;

        Ok(Self {
            inner,
            dialect,
            autocommit: config.autocommit,
            mutation_policy: config.mutation_policy,
            acquire_timeout: config.acquire_timeout(),
        })
    }

    /// Borrow a connection, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> Result<PooledConnection> {
        self.inner.acquire().await.map_err(|e| match OrmError::from(e) {
            OrmError::ResourcePressure { .. } => OrmError::ResourcePressure {
                waited: self.acquire_timeout,
            },
            other => other,
        })
    }

    /// Borrow a connection, giving up after `timeout` even if the pool's own
    /// acquire timeout is longer.
    pub async fn acquire_within(&self, timeout: Duration) -> Result<PooledConnection> {
        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(conn) => conn,
            Err(_) => Err(OrmError::ResourcePressure { waited: timeout }),
        }
    }

    /// Close every connection. Waits for borrowed connections to come back.
    pub async fn close(&self) {
        tracing::info!("close database connection pool");
        self.inner.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit
    }

    pub fn mutation_policy(&self) -> MutationPolicy {
        self.mutation_policy
    }
}
