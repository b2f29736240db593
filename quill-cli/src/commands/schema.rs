//! Print the derived schema of every registered entity

use anyhow::{Context, Result};
use quill_orm::registered;
use quill_web::models::register_entities;

pub fn run_schema() -> Result<()> {
    register_entities().context("Failed to register entities")?;

    for schema in registered() {
        println!("{} (table `{}`)", schema.entity(), schema.table());
        println!("  primary key: {}", schema.primary_key());
        for attribute in schema.fields() {
            let field = schema.field(attribute)?;
            println!("  {:<12} {}", attribute, field.sql_type());
        }
        println!("  select: {}", schema.select_sql());
        println!("  insert: {}", schema.insert_sql());
        println!("  update: {}", schema.update_sql().unwrap_or("(key only)"));
        println!("  delete: {}", schema.delete_sql());
        println!();
    }

    Ok(())
}
