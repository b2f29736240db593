//! Request handlers with a declared signature

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::binder::{bind, Kwargs};
use crate::error::ApiError;
use crate::request::IncomingRequest;
use crate::signature::HandlerSignature;

type HandlerFn = dyn Fn(Kwargs) -> BoxFuture<'static, Result<Value, ApiError>> + Send + Sync;

/// An async function plus the parameters it declared at registration
#[derive(Clone)]
pub struct RequestHandler {
    name: String,
    signature: Arc<HandlerSignature>,
    func: Arc<HandlerFn>,
}

impl RequestHandler {
    pub fn new<F, Fut>(name: impl Into<String>, signature: HandlerSignature, func: F) -> Self
    where
        F: Fn(Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            signature: Arc::new(signature),
            func: Arc::new(move |kwargs| Box::pin(func(kwargs))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &HandlerSignature {
        &self.signature
    }

    /// Run the handler on already-bound keywords.
    pub async fn invoke(&self, kwargs: Kwargs) -> Result<Value, ApiError> {
        (self.func)(kwargs).await
    }

    /// Bind `request`, run the handler and render the outcome.
    pub async fn call(&self, request: IncomingRequest) -> Response {
        let request = Arc::new(request);
        let kwargs = match bind(&self.signature, &request) {
            Ok(kwargs) => kwargs,
            Err(e) => {
                tracing::info!(handler = %self.name, "binding rejected: {}", e);
                return ApiError::from(e).into_response();
            }
        };

        match self.invoke(kwargs).await {
            Ok(value) => Json(value).into_response(),
            Err(e) => e.into_response(),
        }
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}
