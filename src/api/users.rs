use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use super::error::{ApiError, ResultExt};
use crate::auth::{AuthContext, AuthMethod};
use crate::db::Database;
use crate::dispatch::DispatchGuard;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
}

pub fn router(state: UsersState, guard: &DispatchGuard) -> Router {
    Router::new()
        .route("/me", guard.require(AuthMethod::User, get(current_user)))
        .with_state(state)
}

#[derive(Serialize)]
struct CurrentUserResponse {
    id: i64,
    login: String,
}

async fn current_user(
    State(state): State<UsersState>,
    auth: AuthContext,
) -> Result<Json<CurrentUserResponse>, ApiError> {
    let uid = auth
        .uid()
        .ok_or_else(|| ApiError::unauthorized("Not authenticated as a user"))?;

    let user = state
        .db
        .users()
        .get_by_id(uid)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(CurrentUserResponse {
        id: user.id,
        login: user.login,
    }))
}
