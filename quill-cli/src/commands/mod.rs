pub mod schema;
pub mod serve;

pub use schema::run_schema;
pub use serve::{run_serve, ServeArgs};
