//! quill-web: signature-driven request binding over axum
//!
//! Handlers declare their parameters once (`HandlerSignature`). For each
//! request the binder collects keywords from the JSON body, form fields or
//! query string, narrows them to what the handler declared, merges path
//! variables and checks required parameters before the handler runs.

pub mod binder;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod models;
pub mod request;
pub mod route;
pub mod server;
pub mod signature;

pub use binder::{bind, BindingRejected, Kwargs};
pub use error::{ApiError, DomainError};
pub use handler::RequestHandler;
pub use request::{IncomingRequest, RequestBody};
pub use route::{add_routes, get, post, route, Route};
pub use server::{build_router, run_server, ServerConfig, ServerError};
pub use signature::{HandlerSignature, ParamKind, ParamSpec, RegistrationError, SignatureBuilder};
