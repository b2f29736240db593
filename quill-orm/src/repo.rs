//! Entity repository
//!
//! CRUD over any registered `Entity` using its cached SQL templates:
//! - find / find_all / find_number read through `Executor::query`
//! - save / update / remove write through `Executor::execute`
//! - mutation row counts are checked against the pool's `MutationPolicy`

use std::marker::PhantomData;

use serde_json::Value;

use crate::config::MutationPolicy;
use crate::entity::{self, Entity};
use crate::error::{OrmError, Result};
use crate::executor::Executor;
use crate::schema::EntitySchema;

/// `limit` clause shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// `limit ?`
    Count(u64),
    /// `limit ?, ?` (offset, count)
    Range(u64, u64),
}

impl TryFrom<&Value> for Limit {
    type Error = OrmError;

    /// Accepts `n` or `[offset, count]` with non-negative integers.
    fn try_from(value: &Value) -> Result<Self> {
        let invalid =
            || OrmError::invalid_argument("limit", format!("invalid limit value: {}", value));
        match value {
            Value::Number(n) => n.as_u64().map(Limit::Count).ok_or_else(invalid),
            Value::Array(items) if items.len() == 2 => {
                match (items[0].as_u64(), items[1].as_u64()) {
                    (Some(offset), Some(count)) => Ok(Limit::Range(offset, count)),
                    _ => Err(invalid()),
                }
            }
            _ => Err(invalid()),
        }
    }
}

/// Options for `Repo::find_all`
#[derive(Debug, Clone, Default)]
pub struct FindAll {
    pub where_clause: Option<String>,
    pub args: Vec<Value>,
    pub order_by: Option<String>,
    pub limit: Option<Limit>,
}

impl FindAll {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw `where` condition using `?` placeholders for `args`.
    pub fn filter(mut self, clause: impl Into<String>, args: Vec<Value>) -> Self {
        self.where_clause = Some(clause.into());
        self.args = args;
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: Limit) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Assemble the statement on top of the base select template.
    fn to_sql(&self, select: &str) -> (String, Vec<Value>) {
        let mut sql = vec![select.to_owned()];
        let mut args = self.args.clone();

        if let Some(clause) = &self.where_clause {
            sql.push("where".into());
            sql.push(clause.clone());
        }
        if let Some(order_by) = &self.order_by {
            sql.push("order by".into());
            sql.push(order_by.clone());
        }
        match self.limit {
            Some(Limit::Count(count)) => {
                sql.push("limit ?".into());
                args.push(Value::from(count));
            }
            Some(Limit::Range(offset, count)) => {
                sql.push("limit ?, ?".into());
                args.push(Value::from(offset));
                args.push(Value::from(count));
            }
            None => {}
        }

        (sql.join(" "), args)
    }
}

/// Repository for one entity type
pub struct Repo<'a, E> {
    db: &'a Executor,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> Repo<'a, E> {
    pub fn new(db: &'a Executor) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    /// Find by primary key. `Ok(None)` when no row matches.
    pub async fn find(&self, pk: impl Into<Value>) -> Result<Option<E>> {
        let schema = entity::schema_of::<E>()?;
        let sql = format!(
            "{} where `{}`=?",
            schema.select_sql(),
            schema.primary_key_column()
        );

        let rows = self.db.query(&sql, &[pk.into()], Some(1)).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(entity::decode(&schema, schema.decode_row(row)?)?)),
            None => Ok(None),
        }
    }

    /// Find every row matching `options`.
    pub async fn find_all(&self, options: FindAll) -> Result<Vec<E>> {
        let schema = entity::schema_of::<E>()?;
        let (sql, args) = options.to_sql(schema.select_sql());

        let rows = self.db.query(&sql, &args, None).await?;
        rows.into_iter()
            .map(|row| entity::decode(&schema, schema.decode_row(row)?))
            .collect()
    }

    /// Single aggregate, e.g. `count(id)`. `Ok(None)` when no row comes back.
    pub async fn find_number(
        &self,
        select_expr: &str,
        where_clause: Option<&str>,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let schema = entity::schema_of::<E>()?;
        let mut sql = format!("select {} as _num_ from `{}`", select_expr, schema.table());
        if let Some(clause) = where_clause {
            sql.push_str(" where ");
            sql.push_str(clause);
        }

        let rows = self.db.query(&sql, &args, Some(1)).await?;
        Ok(rows.into_iter().next().and_then(|mut row| row.remove("_num_")))
    }

    /// `find_number` for a row count, treating "no row" and null as 0.
    pub async fn count(&self, where_clause: Option<&str>, args: Vec<Value>) -> Result<u64> {
        let schema = entity::schema_of::<E>()?;
        let expr = format!("count(`{}`)", schema.primary_key_column());
        let value = self.find_number(&expr, where_clause, args).await?;
        Ok(value.and_then(|v| v.as_u64()).unwrap_or(0))
    }

    /// Insert `entity`, filling absent fields from their declared defaults.
    /// Materialized defaults are written back into `entity`.
    pub async fn save(&self, entity: &mut E) -> Result<u64> {
        let schema = entity::schema_of::<E>()?;
        let mut values = entity::encode(&schema, entity)?;

        let mut args = Vec::with_capacity(schema.fields().len() + 1);
        for attribute in schema.fields() {
            args.push(schema.value_or_default(attribute, &mut values)?);
        }
        args.push(schema.value_or_default(schema.primary_key(), &mut values)?);

        *entity = entity::decode(&schema, values)?;

        let rows = self.db.execute(schema.insert_sql(), &args).await?;
        self.check_affected("insert", &schema, rows)
    }

    /// Update every non-key column of the row identified by `entity`'s key.
    ///
    /// A key-only entity has nothing to write; the affected count is then
    /// whether its row exists, checked against the mutation policy as usual.
    pub async fn update(&self, entity: &E) -> Result<u64> {
        let schema = entity::schema_of::<E>()?;
        let values = entity::encode(&schema, entity)?;
        let pk = schema.value(schema.primary_key(), &values)?;

        let Some(update_sql) = schema.update_sql() else {
            let clause = format!("`{}`=?", schema.primary_key_column());
            let rows = self.count(Some(&clause), vec![pk]).await?;
            return self.check_affected("update", &schema, rows);
        };

        let mut args = Vec::with_capacity(schema.fields().len() + 1);
        for attribute in schema.fields() {
            args.push(schema.value(attribute, &values)?);
        }
        args.push(pk);

        let rows = self.db.execute(update_sql, &args).await?;
        self.check_affected("update", &schema, rows)
    }

    /// Delete the row identified by `entity`'s key.
    pub async fn remove(&self, entity: &E) -> Result<u64> {
        let schema = entity::schema_of::<E>()?;
        let values = entity::encode(&schema, entity)?;
        let args = [schema.value(schema.primary_key(), &values)?];

        let rows = self.db.execute(schema.delete_sql(), &args).await?;
        self.check_affected("remove", &schema, rows)
    }

    fn check_affected(&self, operation: &'static str, schema: &EntitySchema, rows: u64) -> Result<u64> {
        if rows == 1 {
            return Ok(rows);
        }

        match self.db.mutation_policy() {
            MutationPolicy::Lenient => {
                tracing::warn!(
                    "failed to {} {} by primary key: affected rows: {}",
                    operation,
                    schema.entity(),
                    rows
                );
                Ok(rows)
            }
            MutationPolicy::Strict => Err(OrmError::Conflict {
                operation,
                entity: schema.entity().to_owned(),
                affected: rows,
            }),
        }
    }
}
