pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod dispatch;

use api::create_api_router;
use auth::{Authenticator, TokenAuthConfig};
use axum::Router;
use db::{Database, TokenPolicy};
use dispatch::{DispatchGuard, not_found};
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Where tokens are read from and how they are cleaned up
    pub auth: TokenAuthConfig,
    /// Expiration policy for newly issued tokens
    pub token_policy: TokenPolicy,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let authenticator = Authenticator::new(config.db.clone(), config.auth.clone());
    let guard = DispatchGuard::new(authenticator);

    let api_router = create_api_router(config.db.clone(), &guard, config.token_policy);

    Router::new().nest("/api", api_router).fallback(not_found)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(
    config: ServerConfig,
    listener: TcpListener,
) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}
