//! SQL execution primitives
//!
//! `query` returns rows as flat column-name -> JSON value maps; `execute`
//! returns affected-row counts. Each call borrows one connection for its
//! duration and returns it on every path, including errors.

use futures::{StreamExt, TryStreamExt};
use serde_json::{Map, Number, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, Column, Connection, Row, ValueRef};

use crate::config::MutationPolicy;
use crate::error::Result;
use crate::pool::Pool;

/// One decoded result row
pub type RowMap = Map<String, Value>;

/// Runs statements against a pool it owns a handle to
#[derive(Debug, Clone)]
pub struct Executor {
    pool: Pool,
}

impl Executor {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn mutation_policy(&self) -> MutationPolicy {
        self.pool.mutation_policy()
    }

    /// Run a select and decode every row.
    ///
    /// With `limit = Some(n)` at most `n` rows are fetched from the cursor.
    pub async fn query(&self, sql: &str, args: &[Value], limit: Option<usize>) -> Result<Vec<RowMap>> {
        tracing::debug!("SQL: {}", sql);

        let mut conn = self.pool.acquire().await?;
        let query = bind_values(sqlx::query(sql), args);

        let rows: Vec<AnyRow> = match limit {
            Some(n) => query.fetch(&mut *conn).take(n).try_collect().await?,
            None => query.fetch_all(&mut *conn).await?,
        };

        tracing::info!("rows returned: {}", rows.len());

        rows.iter()
            .map(|row| row_to_map(row).map_err(Into::into))
            .collect()
    }

    /// Run a mutation using the pool's default autocommit mode.
    pub async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        self.execute_with(sql, args, self.pool.autocommit()).await
    }

    /// Run a mutation.
    ///
    /// With `autocommit = false` the statement runs inside an explicit
    /// transaction that is committed on success and rolled back on failure.
    pub async fn execute_with(&self, sql: &str, args: &[Value], autocommit: bool) -> Result<u64> {
        tracing::debug!("SQL: {}", sql);

        let mut conn = self.pool.acquire().await?;

        if autocommit {
            let result = bind_values(sqlx::query(sql), args)
                .execute(&mut *conn)
                .await?;
            return Ok(result.rows_affected());
        }

        let mut tx = Connection::begin(&mut *conn).await?;
        match bind_values(sqlx::query(sql), args).execute(&mut *tx).await {
            Ok(result) => {
                tx.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("rollback failed: {}", rollback_err);
                }
                Err(e.into())
            }
        }
    }
}

fn bind_values<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    args: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => query.bind(s.clone()),
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// Convert a driver row into a flat JSON map
fn row_to_map(row: &AnyRow) -> std::result::Result<RowMap, sqlx::Error> {
    let mut map = Map::with_capacity(row.len());

    for column in row.columns() {
        let idx = column.ordinal();
        let value = if row.try_get_raw(idx)?.is_null() {
            Value::Null
        } else if let Ok(v) = row.try_get::<bool, _>(idx) {
            Value::Bool(v)
        } else if let Ok(v) = row.try_get::<i64, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<i32, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<i16, _>(idx) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(idx) {
            Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<f32, _>(idx) {
            Number::from_f64(f64::from(v))
                .map(Value::Number)
                .unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<String, _>(idx) {
            Value::String(v)
        } else if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
            Value::String(String::from_utf8_lossy(&v).into_owned())
        } else {
            return Err(sqlx::Error::ColumnDecode {
                index: column.name().to_owned(),
                source: "unsupported column type".into(),
            });
        };

        map.insert(column.name().to_owned(), value);
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::error::OrmError;
    use serde_json::json;

    async fn executor() -> Executor {
        // One connection keeps every statement on the same in-memory database.
        let config = DatabaseConfig {
            max_pool_size: 1,
            ..DatabaseConfig::from_url("sqlite::memory:")
        };
        let db = Executor::new(Pool::create(&config).await.unwrap());
        db.execute(
            "create table `t` (`id` bigint primary key, `label` varchar(20), `score` real)",
            &[],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn query_decodes_rows_as_maps() {
        let db = executor().await;
        let inserted = db
            .execute(
                "insert into `t` (`label`, `score`, `id`) values (?, ?, ?)",
                &[json!("alpha"), json!(1.5), json!(1)],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = db.query("select * from `t`", &[], None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["label"], json!("alpha"));
        assert_eq!(rows[0]["score"], json!(1.5));
    }

    #[tokio::test]
    async fn limit_caps_fetched_rows() {
        let db = executor().await;
        for id in 1..=5 {
            db.execute("insert into `t` (`id`) values (?)", &[json!(id)])
                .await
                .unwrap();
        }

        let rows = db
            .query("select `id` from `t` order by `id`", &[], Some(2))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], json!(2));
        assert_eq!(rows[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn null_values_round_trip() {
        let db = executor().await;
        db.execute(
            "insert into `t` (`id`, `label`) values (?, ?)",
            &[json!(7), Value::Null],
        )
        .await
        .unwrap();

        let rows = db
            .query("select `label` from `t` where `id`=?", &[json!(7)], None)
            .await
            .unwrap();
        assert_eq!(rows[0]["label"], Value::Null);
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let db = executor().await;
        db.execute("insert into `t` (`id`) values (?)", &[json!(1)])
            .await
            .unwrap();

        // Second tuple collides with the existing key mid-statement.
        let err = db
            .execute_with(
                "insert into `t` (`id`) values (?), (?)",
                &[json!(2), json!(1)],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Query { .. }));

        let rows = db.query("select `id` from `t`", &[], None).await.unwrap();
        assert_eq!(rows.len(), 1, "no partial row may survive the rollback");
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let db = executor().await;
        let affected = db
            .execute_with(
                "insert into `t` (`id`) values (?), (?)",
                &[json!(1), json!(2)],
                false,
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = db.query("select `id` from `t`", &[], None).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn driver_errors_surface_as_query_errors() {
        let db = executor().await;
        let err = db
            .query("select * from `missing_table`", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Query { .. }));
    }
}
