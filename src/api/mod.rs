mod error;
mod tokens;
mod users;

use axum::{Json, Router, response::IntoResponse, routing::get};

use crate::auth::AuthMethod;
use crate::db::{Database, TokenPolicy};
use crate::dispatch::DispatchGuard;

pub use error::{ApiError, ResultExt};

/// Create the API router. Every route declares its auth requirement through
/// `guard`.
pub fn create_api_router(
    db: Database,
    guard: &DispatchGuard,
    token_policy: TokenPolicy,
) -> Router {
    let tokens_state = tokens::TokensState {
        db: db.clone(),
        token_policy,
    };

    let users_state = users::UsersState { db };

    Router::new()
        .route("/health", guard.require(AuthMethod::None, get(health)))
        .nest("/users", users::router(users_state, guard))
        .nest("/tokens", tokens::router(tokens_state, guard))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
