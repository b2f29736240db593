//! Handler signature descriptors
//!
//! Each handler declares its parameters once, at registration. The binder
//! reads the derived sets (named, required, catch-all, request) for every
//! request instead of inspecting the handler again.

use std::fmt;

use thiserror::Error;

/// How a handler parameter is filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Required positional; only filled from path variables or by name
    Positional,
    /// Named, has a default
    Optional,
    /// Named, no default
    Required,
    /// Receives every remaining keyword
    CatchAll,
    /// The request object itself
    Request,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

/// Errors raised while registering handlers and routes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("request parameter must be last: '{param}' is followed by positional '{next}'")]
    RequestParamNotLast { param: String, next: String },

    #[error("duplicate parameter: {0}")]
    DuplicateParam(String),

    #[error("more than one {0} parameter")]
    DuplicateKind(&'static str),

    #[error("unsupported route method: {0}")]
    UnsupportedMethod(String),

    #[error("route registered twice: {method} {path}")]
    DuplicateRoute { method: String, path: String },
}

/// Ordered parameter list plus the sets derived from it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HandlerSignature {
    params: Vec<ParamSpec>,
    named: Vec<String>,
    required: Vec<String>,
    catch_all: bool,
    request: Option<String>,
}

impl HandlerSignature {
    /// Validate `params` and derive the lookup sets.
    pub fn new(params: Vec<ParamSpec>) -> Result<Self, RegistrationError> {
        let mut signature = Self::default();

        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(RegistrationError::DuplicateParam(param.name.clone()));
            }

            match param.kind {
                ParamKind::Positional => {
                    if let Some(request) = &signature.request {
                        return Err(RegistrationError::RequestParamNotLast {
                            param: request.clone(),
                            next: param.name.clone(),
                        });
                    }
                }
                ParamKind::Optional => signature.named.push(param.name.clone()),
                ParamKind::Required => {
                    signature.named.push(param.name.clone());
                    signature.required.push(param.name.clone());
                }
                ParamKind::CatchAll => {
                    if signature.catch_all {
                        return Err(RegistrationError::DuplicateKind("catch-all"));
                    }
                    signature.catch_all = true;
                }
                ParamKind::Request => {
                    if signature.request.is_some() {
                        return Err(RegistrationError::DuplicateKind("request"));
                    }
                    signature.request = Some(param.name.clone());
                }
            }
        }

        signature.params = params;
        Ok(signature)
    }

    pub fn builder() -> SignatureBuilder {
        SignatureBuilder::default()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Optional and required named parameters, in declaration order
    pub fn named(&self) -> &[String] {
        &self.named
    }

    /// Named parameters without a default, in declaration order
    pub fn required(&self) -> &[String] {
        &self.required
    }

    pub fn has_named(&self) -> bool {
        !self.named.is_empty()
    }

    pub fn has_catch_all(&self) -> bool {
        self.catch_all
    }

    pub fn request_param(&self) -> Option<&str> {
        self.request.as_deref()
    }

    /// Whether the binder has to look at the body or query string at all.
    pub fn wants_keywords(&self) -> bool {
        self.has_named() || self.catch_all
    }
}

impl fmt::Display for HandlerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        f.write_str(&names.join(", "))
    }
}

/// Fluent construction of a `HandlerSignature`
#[derive(Debug, Default)]
pub struct SignatureBuilder {
    params: Vec<ParamSpec>,
}

impl SignatureBuilder {
    fn push(mut self, name: &str, kind: ParamKind) -> Self {
        self.params.push(ParamSpec {
            name: name.to_owned(),
            kind,
        });
        self
    }

    pub fn positional(self, name: &str) -> Self {
        self.push(name, ParamKind::Positional)
    }

    pub fn optional(self, name: &str) -> Self {
        self.push(name, ParamKind::Optional)
    }

    pub fn required(self, name: &str) -> Self {
        self.push(name, ParamKind::Required)
    }

    pub fn catch_all(self, name: &str) -> Self {
        self.push(name, ParamKind::CatchAll)
    }

    pub fn request(self, name: &str) -> Self {
        self.push(name, ParamKind::Request)
    }

    pub fn build(self) -> Result<HandlerSignature, RegistrationError> {
        HandlerSignature::new(self.params)
    }
}
