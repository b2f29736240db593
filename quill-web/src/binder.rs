//! Request parameter binding
//!
//! Turns an `IncomingRequest` into the keyword set a handler asked for in
//! its `HandlerSignature`. Binding is a pure function of the signature and
//! the captured request, so the same request always binds the same way.

use std::sync::Arc;

use axum::http::Method;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::DomainError;
use crate::request::{IncomingRequest, RequestBody};
use crate::signature::HandlerSignature;

/// Client-side binding failure (HTTP 400)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingRejected {
    #[error("missing content type")]
    MissingContentType,

    #[error("body must be an object")]
    NotAnObject,

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("missing argument: {0}")]
    MissingArgument(String),

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },
}

impl BindingRejected {
    pub fn invalid_body(reason: impl Into<String>) -> Self {
        Self::InvalidBody {
            reason: reason.into(),
        }
    }
}

/// The request object handed to handlers that declare one
#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestArg {
    name: String,
    request: Arc<IncomingRequest>,
}

/// Keyword arguments produced by `bind`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Kwargs {
    values: Map<String, Value>,
    request: Option<RequestArg>,
}

impl Kwargs {
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Deserialize a keyword. Query and form values arrive as strings, so
    /// a string that does not fit `T` directly is retried as JSON text.
    pub fn parse<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, DomainError> {
        let value = match self.values.get(name) {
            None | Some(Value::Null) => return Ok(None),
            Some(value) => value,
        };

        if let Ok(parsed) = serde_json::from_value(value.clone()) {
            return Ok(Some(parsed));
        }
        if let Value::String(s) = value {
            if let Ok(parsed) = serde_json::from_str(s) {
                return Ok(Some(parsed));
            }
        }
        Err(DomainError::value_invalid(
            name,
            format!("invalid value for {}", name),
        ))
    }

    pub fn require<T: DeserializeOwned>(&self, name: &str) -> Result<T, DomainError> {
        self.parse(name)?
            .ok_or_else(|| DomainError::value_invalid(name, format!("{} is required", name)))
    }

    /// The request object, if the handler declared a request parameter
    pub fn request(&self) -> Option<&Arc<IncomingRequest>> {
        self.request.as_ref().map(|arg| &arg.request)
    }

    pub fn request_name(&self) -> Option<&str> {
        self.request.as_ref().map(|arg| arg.name.as_str())
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<Map<String, Value>> for Kwargs {
    fn from(values: Map<String, Value>) -> Self {
        Self {
            values,
            request: None,
        }
    }
}

fn is_body_bearing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// First value wins on repeated keys
fn first_wins(pairs: impl IntoIterator<Item = (String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        map.entry(key).or_insert(Value::String(value));
    }
    map
}

fn parse_urlencoded(bytes: &[u8]) -> Result<Map<String, Value>, BindingRejected> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
        .map_err(|e| BindingRejected::invalid_body(e.to_string()))?;
    Ok(first_wins(pairs))
}

/// Keyword candidates from the body or the query string.
fn candidates(request: &IncomingRequest) -> Result<Option<Map<String, Value>>, BindingRejected> {
    if !is_body_bearing(&request.method) {
        return match request.query.as_deref() {
            Some(query) if !query.is_empty() => parse_urlencoded(query.as_bytes()).map(Some),
            _ => Ok(None),
        };
    }

    let media = request
        .media_type()
        .filter(|m| !m.is_empty())
        .ok_or(BindingRejected::MissingContentType)?;

    if media.starts_with("application/json") {
        let bytes: &[u8] = match &request.body {
            RequestBody::Raw(bytes) => &bytes[..],
            _ => &[],
        };
        return match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            _ => Err(BindingRejected::NotAnObject),
        };
    }

    match media.as_str() {
        "application/x-www-form-urlencoded" | "multipart/form-data" => match &request.body {
            RequestBody::Form(fields) => Ok(Some(first_wins(fields.iter().cloned()))),
            RequestBody::Raw(bytes) => parse_urlencoded(bytes).map(Some),
            RequestBody::Empty => Ok(Some(Map::new())),
        },
        _ => Err(BindingRejected::UnsupportedContentType(
            request.content_type.clone().unwrap_or(media),
        )),
    }
}

fn path_values(request: &IncomingRequest) -> Map<String, Value> {
    request
        .path_params
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}

/// Bind `request` to the parameters declared in `signature`.
pub fn bind(
    signature: &HandlerSignature,
    request: &Arc<IncomingRequest>,
) -> Result<Kwargs, BindingRejected> {
    let extracted = if signature.wants_keywords() {
        candidates(request)?
    } else {
        None
    };

    let values = match extracted {
        None => path_values(request),
        Some(mut values) => {
            if signature.has_named() && !signature.has_catch_all() {
                values.retain(|key, _| signature.named().iter().any(|n| n == key));
            }
            for (key, value) in &request.path_params {
                if values.contains_key(key) {
                    tracing::warn!(
                        "path variable '{}' overrides keyword argument of the same name",
                        key
                    );
                }
                values.insert(key.clone(), Value::String(value.clone()));
            }
            values
        }
    };

    let request = signature.request_param().map(|name| RequestArg {
        name: name.to_owned(),
        request: Arc::clone(request),
    });

    if let Some(missing) = signature
        .required()
        .iter()
        .find(|name| !values.contains_key(name.as_str()))
    {
        return Err(BindingRejected::MissingArgument(missing.clone()));
    }

    Ok(Kwargs { values, request })
}
