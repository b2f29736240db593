/// Structured error types for quill-orm.
///
/// Library consumers get one composable error enum; the web layer maps
/// each variant onto an HTTP response and the binary wraps it in `anyhow`.
use std::time::Duration;
use thiserror::Error;

/// Main error type for mapping and database operations
#[derive(Error, Debug)]
pub enum OrmError {
    /// Entity declaration is invalid (raised at registration only)
    #[error("Schema error in entity '{entity}': {reason}")]
    Schema { entity: String, reason: String },

    /// Entity type was used before `register` ran for it
    #[error("Entity '{entity}' has not been registered")]
    Unregistered { entity: &'static str },

    /// Attribute is not part of the entity schema
    #[error("Entity '{entity}' has no attribute '{attribute}'")]
    UnknownAttribute { entity: String, attribute: String },

    /// Driver-level failure
    #[error("Query failed: {source}")]
    Query {
        #[source]
        source: sqlx::Error,
    },

    /// Malformed limit or pagination argument
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },

    /// No connection became available in time
    #[error("Connection pool exhausted after waiting {waited:?}")]
    ResourcePressure { waited: Duration },

    /// Pool was closed before or during the borrow
    #[error("Connection pool is closed")]
    PoolClosed,

    /// Mutation touched an unexpected number of rows (strict policy)
    #[error("{operation} on '{entity}' affected {affected} rows, expected 1")]
    Conflict {
        operation: &'static str,
        entity: String,
        affected: u64,
    },

    /// Row or instance could not be converted
    #[error("Failed to decode '{entity}': {reason}")]
    Decode { entity: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Config { reason: String },
}

/// Result type alias for quill-orm operations
pub type Result<T> = std::result::Result<T, OrmError>;

impl OrmError {
    /// Create a schema error
    pub fn schema(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown attribute error
    pub fn unknown_attribute(entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            entity: entity.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid argument error naming the offending argument
    pub fn invalid_argument(argument: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            reason: reason.into(),
        }
    }

    /// Create a decode error
    pub fn decode(entity: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            entity: entity.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourcePressure { .. })
    }

    /// Whether the database rejected a write for breaking a unique or
    /// primary key constraint.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Query { source } => source
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation()),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(source: sqlx::Error) -> Self {
        match source {
            // Pool-level wait failures are pressure, not query failures.
            sqlx::Error::PoolTimedOut => Self::ResourcePressure {
                waited: Duration::ZERO,
            },
            sqlx::Error::PoolClosed => Self::PoolClosed,
            source => Self::Query { source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrmError::schema("User", "primary key not found");
        assert_eq!(
            err.to_string(),
            "Schema error in entity 'User': primary key not found"
        );

        let err = OrmError::Conflict {
            operation: "insert",
            entity: "User".into(),
            affected: 0,
        };
        assert_eq!(err.to_string(), "insert on 'User' affected 0 rows, expected 1");
    }

    #[test]
    fn test_pool_errors_are_classified() {
        let err: OrmError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, OrmError::ResourcePressure { .. }));
        assert!(err.is_retryable());

        let err: OrmError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, OrmError::PoolClosed));

        let err: OrmError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, OrmError::Query { .. }));
        assert!(!err.is_retryable());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn invalid_argument_names_the_argument() {
        let err = OrmError::invalid_argument("limit", "invalid limit value: -1");
        assert_eq!(
            err.to_string(),
            "Invalid argument 'limit': invalid limit value: -1"
        );
        assert!(!err.is_unique_violation());
    }
}
