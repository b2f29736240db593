//! Entities served by the demo API

use chrono::Utc;
use quill_orm::{register, Entity, FieldDecl, OrmError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Seconds since the epoch, as stored in `created_at` columns
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Time-ordered unique id: 15-digit millisecond timestamp + random hex
pub fn next_id() -> String {
    format!(
        "{:015}{}000",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

fn created_at() -> FieldDecl {
    FieldDecl::float("created_at").default_with(|| json!(now_timestamp()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    pub passwd: String,
    #[serde(default)]
    pub image: String,
    pub admin: Option<bool>,
    pub created_at: Option<f64>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>, passwd: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            passwd: passwd.into(),
            image: "about:blank".into(),
            admin: None,
            created_at: None,
        }
    }

    /// JSON view with the password masked
    pub fn to_public(&self) -> Value {
        json!({
            "email": self.email,
            "name": self.name,
            "passwd": "******",
            "image": self.image,
            "admin": self.admin.unwrap_or(false),
            "created_at": self.created_at,
        })
    }
}

impl Entity for User {
    const NAME: &'static str = "User";
    const TABLE: Option<&'static str> = Some("users");

    fn fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::string("email").ddl("varchar(50)").primary_key(),
            FieldDecl::string("name").ddl("varchar(50)"),
            FieldDecl::string("passwd").ddl("varchar(50)"),
            FieldDecl::string("image").ddl("varchar(500)"),
            FieldDecl::boolean("admin"),
            created_at(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blog {
    pub id: Option<String>,
    pub user_email: String,
    pub user_name: String,
    pub name: String,
    pub summary: String,
    pub content: String,
    pub created_at: Option<f64>,
}

impl Entity for Blog {
    const NAME: &'static str = "Blog";
    const TABLE: Option<&'static str> = Some("blogs");

    fn fields() -> Vec<FieldDecl> {
        vec![
            FieldDecl::string("id")
                .ddl("varchar(50)")
                .primary_key()
                .default_with(|| json!(next_id())),
            FieldDecl::string("user_email").ddl("varchar(50)"),
            FieldDecl::string("user_name").ddl("varchar(50)"),
            FieldDecl::string("name").ddl("varchar(50)"),
            FieldDecl::string("summary").ddl("varchar(200)"),
            FieldDecl::text("content"),
            created_at(),
        ]
    }
}

/// Register every entity the API serves. Call once at startup.
pub fn register_entities() -> Result<(), OrmError> {
    register::<User>()?;
    register::<Blog>()?;
    Ok(())
}

/// DDL for the demo tables, in the portable subset SQLite and MySQL share
pub const SCHEMA_SQL: &[&str] = &[
    "create table if not exists `users` (
        `email` varchar(50) not null primary key,
        `name` varchar(50) not null,
        `passwd` varchar(50) not null,
        `image` varchar(500) not null,
        `admin` tinyint(1) not null,
        `created_at` real not null
    )",
    "create table if not exists `blogs` (
        `id` varchar(50) not null primary key,
        `user_email` varchar(50) not null,
        `user_name` varchar(50) not null,
        `name` varchar(50) not null,
        `summary` varchar(200) not null,
        `content` text not null,
        `created_at` real not null
    )",
];
