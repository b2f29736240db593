//! quill-orm: declarative entity mapping over a pooled connection
//!
//! Entities declare their columns once; the schema (table, key, SQL
//! templates) is derived at registration and reused by every query.

pub mod config;
pub mod dialect;
pub mod entity;
pub mod error;
pub mod executor;
pub mod page;
pub mod pool;
pub mod repo;
pub mod schema;

pub use config::{DatabaseConfig, MutationPolicy};
pub use dialect::Dialect;
pub use entity::{register, registered, schema_of, Entity};
pub use error::{OrmError, Result};
pub use executor::{Executor, RowMap};
pub use page::{Page, DEFAULT_PAGE_SIZE};
pub use pool::{Pool, PooledConnection};
pub use repo::{FindAll, Limit, Repo};
pub use schema::{EntitySchema, FieldDecl, FieldDefault, SchemaRef};
