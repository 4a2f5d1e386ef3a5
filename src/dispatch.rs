//! Dispatch guard: authentication between route resolution and the handler.
//!
//! axum resolves the route; the guard is attached as a route layer, so it
//! only runs for matched routes and knows the requirement the route was
//! declared with. Unmatched requests go to the router fallback.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};

use crate::api::ApiError;
use crate::auth::{AuthMethod, AuthOutcome, Authenticator};

#[derive(Clone)]
pub struct DispatchGuard {
    authenticator: Arc<Authenticator>,
}

#[derive(Clone)]
struct RouteAuth {
    authenticator: Arc<Authenticator>,
    requirement: AuthMethod,
}

impl DispatchGuard {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }

    /// Declare the auth requirement of a route.
    ///
    /// ```ignore
    /// Router::new().route("/whoami", guard.require(AuthMethod::Token, get(whoami)))
    /// ```
    pub fn require<S>(&self, requirement: AuthMethod, route: MethodRouter<S>) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = RouteAuth {
            authenticator: self.authenticator.clone(),
            requirement,
        };
        route.route_layer(middleware::from_fn_with_state(state, guard_dispatch))
    }
}

async fn guard_dispatch(
    State(route): State<RouteAuth>,
    mut request: Request,
    next: Next,
) -> Response {
    let outcome = route
        .authenticator
        .authenticate(request.headers(), route.requirement)
        .await;

    match outcome {
        Ok(AuthOutcome::Proceed(context)) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(AuthOutcome::Reject(response)) => response,
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Router fallback for requests that match no route.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Not found")
}
