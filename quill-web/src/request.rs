//! Incoming request abstraction
//!
//! Everything the binder needs from an HTTP request, captured once by an
//! axum extractor so binding itself stays synchronous and repeatable.

use std::collections::BTreeMap;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Multipart, RawPathParams, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;

use crate::binder::BindingRejected;
use crate::error::ApiError;

/// Request body as seen by the binder
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Raw(Bytes),
    /// Multipart fields, decoded by the extractor
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub query: Option<String>,
    pub path_params: BTreeMap<String, String>,
    pub body: RequestBody,
}

impl IncomingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            content_type: None,
            query: None,
            path_params: BTreeMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Raw(body.into());
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Media type without parameters, lowercased
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

fn is_multipart(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

impl<S> FromRequest<S> for IncomingRequest
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        // Routes without captures have no path params
        let path_params = match RawPathParams::from_request_parts(&mut parts, state).await {
            Ok(params) => params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            Err(_) => BTreeMap::new(),
        };

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let query = parts.uri.query().map(str::to_owned);
        let method = parts.method.clone();
        let path = parts.uri.path().to_owned();

        let req = Request::from_parts(parts, body);
        let body = if is_multipart(content_type.as_deref()) {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| BindingRejected::invalid_body(e.body_text()))?;

            let mut fields = Vec::new();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| BindingRejected::invalid_body(e.body_text()))?
            {
                let Some(name) = field.name().map(str::to_owned) else {
                    continue;
                };
                if field.file_name().is_some() {
                    tracing::debug!("skipping file part '{}'", name);
                    continue;
                }
                let value = field
                    .text()
                    .await
                    .map_err(|e| BindingRejected::invalid_body(e.body_text()))?;
                fields.push((name, value));
            }
            RequestBody::Form(fields)
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| BindingRejected::invalid_body(e.body_text()))?;
            if bytes.is_empty() {
                RequestBody::Empty
            } else {
                RequestBody::Raw(bytes)
            }
        };

        Ok(Self {
            method,
            path,
            content_type,
            query,
            path_params,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn media_type_strips_parameters() {
        let req = IncomingRequest::new(Method::POST, "/")
            .with_content_type("Application/JSON; charset=utf-8");
        assert_eq!(req.media_type().as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn extracts_query_and_body() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/users?page=2")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();

        let incoming = IncomingRequest::from_request(req, &()).await.unwrap();
        assert_eq!(incoming.method, Method::POST);
        assert_eq!(incoming.path, "/api/users");
        assert_eq!(incoming.query.as_deref(), Some("page=2"));
        assert_eq!(incoming.body, RequestBody::Raw(Bytes::from_static(b"{\"a\":1}")));
        assert!(incoming.path_params.is_empty());
    }

    #[tokio::test]
    async fn empty_body_is_empty() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let incoming = IncomingRequest::from_request(req, &()).await.unwrap();
        assert_eq!(incoming.body, RequestBody::Empty);
        assert_eq!(incoming.content_type, None);
    }

    #[tokio::test]
    async fn multipart_fields_are_decoded() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nAlice\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nBob\r\n\
             --{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();

        let incoming = IncomingRequest::from_request(req, &()).await.unwrap();
        assert_eq!(
            incoming.body,
            RequestBody::Form(vec![
                ("name".into(), "Alice".into()),
                ("name".into(), "Bob".into()),
            ])
        );
    }
}
