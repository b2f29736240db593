//! Backend detection from the connection URL
//!
//! Templates are written once with `?` placeholders and backtick-quoted
//! identifiers, which MySQL and SQLite both accept as-is. Backends that
//! need another placeholder or quoting syntax are rejected up front.

use crate::error::{OrmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    Sqlite,
}

impl Dialect {
    /// Pick the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(OrmError::config(format!(
                "unsupported database scheme '{}'",
                other
            ))),
        }
    }
}
