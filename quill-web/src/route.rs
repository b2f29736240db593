//! Route declarations and registration on an axum `Router`

use std::collections::HashSet;

use axum::http::Method;
use axum::routing::{on, MethodFilter};
use axum::Router;

use crate::handler::RequestHandler;
use crate::request::IncomingRequest;
use crate::signature::RegistrationError;

#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub handler: RequestHandler,
}

pub fn route(method: Method, path: impl Into<String>, handler: RequestHandler) -> Route {
    Route {
        method,
        path: path.into(),
        handler,
    }
}

pub fn get(path: impl Into<String>, handler: RequestHandler) -> Route {
    route(Method::GET, path, handler)
}

pub fn post(path: impl Into<String>, handler: RequestHandler) -> Route {
    route(Method::POST, path, handler)
}

/// Register every route on `router`.
///
/// Paths use axum's `{name}` captures; captured values reach handlers as
/// path variables.
pub fn add_routes<S>(mut router: Router<S>, routes: Vec<Route>) -> Result<Router<S>, RegistrationError>
where
    S: Clone + Send + Sync + 'static,
{
    let mut seen = HashSet::new();

    for Route {
        method,
        path,
        handler,
    } in routes
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RegistrationError::UnsupportedMethod(method.to_string()))?;

        if !seen.insert((method.clone(), path.clone())) {
            return Err(RegistrationError::DuplicateRoute {
                method: method.to_string(),
                path,
            });
        }

        tracing::info!(
            "add route {} {} => {}({})",
            method,
            path,
            handler.name(),
            handler.signature()
        );

        router = router.route(
            &path,
            on(filter, move |request: IncomingRequest| {
                let handler = handler.clone();
                async move { handler.call(request).await }
            }),
        );
    }

    Ok(router)
}
