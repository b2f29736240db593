//! Entity trait and the process-wide schema registry
//!
//! Entities are plain structs with serde derives plus a static list of
//! field declarations. `register::<E>()` derives the schema once at
//! startup; every later lookup hands out the same `Arc`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OrmError, Result};
use crate::schema::{EntitySchema, FieldDecl, SchemaRef};

/// A fixed-shape record mapped onto one table
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Tag { id: i64, label: String }
///
/// impl Entity for Tag {
///     const NAME: &'static str = "Tag";
///     const TABLE: Option<&'static str> = Some("tags");
///     fn fields() -> Vec<FieldDecl> {
///         vec![FieldDecl::integer("id").primary_key(), FieldDecl::string("label")]
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name; also the table name unless `TABLE` is set
    const NAME: &'static str;

    const TABLE: Option<&'static str> = None;

    fn fields() -> Vec<FieldDecl>;
}

static REGISTRY: Lazy<RwLock<HashMap<TypeId, SchemaRef>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Derive and cache the schema for `E`. Registering twice returns the
/// cached schema without re-deriving it.
pub fn register<E: Entity>() -> Result<SchemaRef> {
    let key = TypeId::of::<E>();
    if let Some(schema) = lookup(key) {
        return Ok(schema);
    }

    let schema = Arc::new(EntitySchema::build(E::NAME, E::TABLE, E::fields())?);

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    // A concurrent registration may have won the race; keep the first one.
    Ok(Arc::clone(registry.entry(key).or_insert(schema)))
}

/// Cached schema for `E`.
///
/// # Errors
///
/// `OrmError::Unregistered` if `register::<E>()` has not run.
pub fn schema_of<E: Entity>() -> Result<SchemaRef> {
    lookup(TypeId::of::<E>()).ok_or(OrmError::Unregistered { entity: E::NAME })
}

/// Every registered schema, ordered by entity name.
pub fn registered() -> Vec<SchemaRef> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let mut schemas: Vec<SchemaRef> = registry.values().cloned().collect();
    schemas.sort_by(|a, b| a.entity().cmp(b.entity()));
    schemas
}

fn lookup(key: TypeId) -> Option<SchemaRef> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
        .cloned()
}

/// Flatten an instance into its attribute map.
pub(crate) fn encode<E: Entity>(schema: &EntitySchema, entity: &E) -> Result<Map<String, Value>> {
    match serde_json::to_value(entity).map_err(|e| OrmError::decode(schema.entity(), e))? {
        Value::Object(values) => {
            schema.check_attributes(&values)?;
            Ok(values)
        }
        other => Err(OrmError::decode(
            schema.entity(),
            format!("expected a struct, serialized to {}", other),
        )),
    }
}

/// Build an instance from an attribute map.
pub(crate) fn decode<E: Entity>(schema: &EntitySchema, values: Map<String, Value>) -> Result<E> {
    schema.check_attributes(&values)?;
    serde_json::from_value(Value::Object(values)).map_err(|e| OrmError::decode(schema.entity(), e))
}
