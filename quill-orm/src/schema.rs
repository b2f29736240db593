//! Entity schema derivation
//!
//! Turns an ordered list of field declarations into an immutable schema:
//! table name, primary key, non-key fields, and the four SQL templates that
//! every instance of the entity reuses.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{OrmError, Result};

/// Lazily produced default value
pub type DefaultProducer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default for a column whose value is absent
#[derive(Clone)]
pub enum FieldDefault {
    /// Literal, cloned on use
    Value(Value),
    /// Invoked each time a default is needed
    Producer(DefaultProducer),
}

impl FieldDefault {
    pub fn produce(&self) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "Value({})", v),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One column of an entity
#[derive(Debug, Clone)]
pub struct FieldDecl {
    attribute: String,
    column: Option<String>,
    sql_type: String,
    primary_key: bool,
    default: Option<FieldDefault>,
}

impl FieldDecl {
    fn new(attribute: &str, sql_type: &str, default: Option<Value>) -> Self {
        Self {
            attribute: attribute.to_owned(),
            column: None,
            sql_type: sql_type.to_owned(),
            primary_key: false,
            default: default.map(FieldDefault::Value),
        }
    }

    /// `varchar(100)`, no default
    pub fn string(attribute: &str) -> Self {
        Self::new(attribute, "varchar(100)", None)
    }

    /// `tinyint(1)`, defaults to `false`; decoded back to a JSON bool
    pub fn boolean(attribute: &str) -> Self {
        Self::new(attribute, "tinyint(1)", Some(Value::Bool(false)))
    }

    /// `bigint`, defaults to `0`
    pub fn integer(attribute: &str) -> Self {
        Self::new(attribute, "bigint", Some(Value::from(0)))
    }

    /// `real`, defaults to `0.0`
    pub fn float(attribute: &str) -> Self {
        Self::new(attribute, "real", Some(Value::from(0.0)))
    }

    /// `text`, no default
    pub fn text(attribute: &str) -> Self {
        Self::new(attribute, "text", None)
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Override the column type
    pub fn ddl(mut self, sql_type: &str) -> Self {
        self.sql_type = sql_type.to_owned();
        self
    }

    /// Store under a column name different from the attribute
    pub fn column(mut self, name: &str) -> Self {
        self.column = Some(name.to_owned());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(producer)));
        self
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.attribute)
    }

    pub fn sql_type(&self) -> &str {
        &self.sql_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }

    /// Normalize a stored value to the JSON shape the declared type implies.
    fn coerce(&self, value: Value) -> Value {
        let ty = self.sql_type.to_ascii_lowercase();
        match value {
            Value::Number(n) if ty.starts_with("bool") || ty == "tinyint(1)" => {
                Value::Bool(n.as_f64().is_some_and(|v| v != 0.0))
            }
            Value::Number(n)
                if ty.starts_with("real") || ty.starts_with("float") || ty.starts_with("double") =>
            {
                n.as_f64().map(Value::from).unwrap_or(Value::Number(n))
            }
            other => other,
        }
    }
}

impl fmt::Display for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}:{}>", self.sql_type, self.column_name())
    }
}

/// Derived, immutable description of an entity's table
#[derive(Debug)]
pub struct EntitySchema {
    entity: String,
    table: String,
    primary_key: String,
    fields: Vec<String>,
    mappings: HashMap<String, FieldDecl>,
    by_column: HashMap<String, String>,
    select: String,
    insert: String,
    update: Option<String>,
    delete: String,
}

impl EntitySchema {
    /// Derive the schema for `entity` from its declarations.
    ///
    /// # Errors
    ///
    /// `OrmError::Schema` when there is no primary key, more than one, or
    /// two declarations share an attribute or column name.
    pub fn build(entity: &str, table: Option<&str>, decls: Vec<FieldDecl>) -> Result<Self> {
        let table = table.unwrap_or(entity).to_owned();
        tracing::info!("found model: {} (table: {})", entity, table);

        let mut primary_key: Option<String> = None;
        let mut fields = Vec::new();
        let mut mappings = HashMap::with_capacity(decls.len());
        let mut by_column = HashMap::with_capacity(decls.len());

        for decl in decls {
            tracing::debug!("found mapping: {} ==> {}", decl.attribute, decl);

            if decl.primary_key {
                if let Some(existing) = &primary_key {
                    return Err(OrmError::schema(
                        entity,
                        format!(
                            "duplicate primary key for field: {} (already {})",
                            decl.attribute, existing
                        ),
                    ));
                }
                primary_key = Some(decl.attribute.clone());
            } else {
                fields.push(decl.attribute.clone());
            }

            if by_column
                .insert(decl.column_name().to_owned(), decl.attribute.clone())
                .is_some()
            {
                return Err(OrmError::schema(
                    entity,
                    format!("duplicate column: {}", decl.column_name()),
                ));
            }
            let attribute = decl.attribute.clone();
            if mappings.insert(attribute.clone(), decl).is_some() {
                return Err(OrmError::schema(
                    entity,
                    format!("duplicate attribute: {}", attribute),
                ));
            }
        }

        let primary_key =
            primary_key.ok_or_else(|| OrmError::schema(entity, "primary key not found"))?;

        let column = |attr: &str| format!("`{}`", mappings[attr].column_name());
        let pk_column = column(&primary_key);
        let escaped: Vec<String> = fields.iter().map(|f| column(f)).collect();

        let select = if escaped.is_empty() {
            format!("select {} from `{}`", pk_column, table)
        } else {
            format!("select {}, {} from `{}`", pk_column, escaped.join(", "), table)
        };

        let insert_columns: Vec<&str> = escaped
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(pk_column.as_str()))
            .collect();
        let insert = format!(
            "insert into `{}` ({}) values ({})",
            table,
            insert_columns.join(", "),
            placeholders(insert_columns.len())
        );

        // A key-only entity has no column to assign
        let update = (!escaped.is_empty()).then(|| {
            let assignments: Vec<String> = escaped.iter().map(|c| format!("{}=?", c)).collect();
            format!(
                "update `{}` set {} where {}=?",
                table,
                assignments.join(", "),
                pk_column
            )
        });

        let delete = format!("delete from `{}` where {}=?", table, pk_column);

        Ok(Self {
            entity: entity.to_owned(),
            table,
            primary_key,
            fields,
            mappings,
            by_column,
            select,
            insert,
            update,
            delete,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Primary key attribute name
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Non-key attribute names in declaration order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, attribute: &str) -> Result<&FieldDecl> {
        self.mappings
            .get(attribute)
            .ok_or_else(|| OrmError::unknown_attribute(&self.entity, attribute))
    }

    pub fn primary_key_column(&self) -> &str {
        self.mappings[&self.primary_key].column_name()
    }

    pub fn select_sql(&self) -> &str {
        &self.select
    }

    pub fn insert_sql(&self) -> &str {
        &self.insert
    }

    /// `None` when the entity declares only a primary key.
    pub fn update_sql(&self) -> Option<&str> {
        self.update.as_deref()
    }

    pub fn delete_sql(&self) -> &str {
        &self.delete
    }

    /// Current value of `attribute`, `Null` when absent.
    pub fn value(&self, attribute: &str, values: &Map<String, Value>) -> Result<Value> {
        self.field(attribute)?;
        Ok(values.get(attribute).cloned().unwrap_or(Value::Null))
    }

    /// Current value of `attribute`, materializing and storing its default
    /// when the value is absent or null.
    pub fn value_or_default(&self, attribute: &str, values: &mut Map<String, Value>) -> Result<Value> {
        let field = self.field(attribute)?;
        let current = values.get(attribute).cloned().unwrap_or(Value::Null);
        if !current.is_null() {
            return Ok(current);
        }

        match field.default() {
            Some(default) => {
                let value = default.produce();
                tracing::debug!("using default value for {}: {}", attribute, value);
                values.insert(attribute.to_owned(), value.clone());
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    /// Reject keys the schema does not declare.
    pub fn check_attributes(&self, values: &Map<String, Value>) -> Result<()> {
        match values.keys().find(|k| !self.mappings.contains_key(k.as_str())) {
            Some(unknown) => Err(OrmError::unknown_attribute(&self.entity, unknown)),
            None => Ok(()),
        }
    }

    /// Map a flat column-name row onto attribute names, coercing each value
    /// by its declared SQL type.
    pub fn decode_row(&self, row: Map<String, Value>) -> Result<Map<String, Value>> {
        let mut values = Map::with_capacity(row.len());
        for (column, value) in row {
            let attribute = self
                .by_column
                .get(&column)
                .ok_or_else(|| OrmError::unknown_attribute(&self.entity, &column))?;
            let field = &self.mappings[attribute];
            values.insert(attribute.clone(), field.coerce(value));
        }
        Ok(values)
    }
}

/// Shared handle to a registered schema
pub type SchemaRef = Arc<EntitySchema>;

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
