//! Request authentication.
//!
//! A request is first checked against its session. A session whose user is
//! gone or disabled, or which has expired, is logged out (its data is kept)
//! and the request continues as if no session were present. When no session
//! identity is bound, the handler for the route's [`AuthMethod`] runs.

use std::sync::Arc;

use axum::{
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{debug, error, info};

use super::config::TokenAuthConfig;
use super::context::AuthContext;
use super::cookie::{SESSION_COOKIE_NAME, get_cookie};
use super::errors::{AuthError, TokenRejection};
use super::extract::{extract_token, strip_prefixes};
use super::method::AuthMethod;
use crate::db::{Database, Session};

/// Result of authenticating a request.
pub enum AuthOutcome {
    /// Run the handler with this context.
    Proceed(AuthContext),
    /// Send this response instead of running the handler.
    Reject(Response),
}

#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    config: Arc<TokenAuthConfig>,
}

impl Authenticator {
    pub fn new(db: Database, config: TokenAuthConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Authenticate a request against the requirement of its route.
    ///
    /// Token failures come back as [`AuthOutcome::Reject`]. Errors are either
    /// one of the propagating kinds or [`AuthError::AccessDenied`]; internal
    /// details never leave this function.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        method: AuthMethod,
    ) -> Result<AuthOutcome, AuthError> {
        match self.try_authenticate(headers, method).await {
            Err(e) if !e.propagates() => {
                info!(error = %e, %method, "Exception during request authentication");
                Err(AuthError::AccessDenied)
            }
            result => result,
        }
    }

    async fn try_authenticate(
        &self,
        headers: &HeaderMap,
        method: AuthMethod,
    ) -> Result<AuthOutcome, AuthError> {
        if let Some(uid) = self.session_identity(headers).await? {
            return Ok(AuthOutcome::Proceed(AuthContext::session(
                method,
                uid,
                self.config.user_kind(),
            )));
        }

        match method {
            AuthMethod::None => Ok(AuthOutcome::Proceed(AuthContext::anonymous(method))),
            AuthMethod::User => Err(AuthError::SessionExpired),
            AuthMethod::Token => self.auth_method_token(headers, method).await,
        }
    }

    /// The user bound to the request's session, if the session still holds.
    async fn session_identity(&self, headers: &HeaderMap) -> Result<Option<i64>, AuthError> {
        let Some(session_id) = get_cookie(headers, SESSION_COOKIE_NAME) else {
            return Ok(None);
        };
        let Some(session) = self.db.sessions().get(session_id).await? else {
            return Ok(None);
        };
        let Some(uid) = session.uid else {
            return Ok(None);
        };

        match self.check_security(&session, uid).await {
            Ok(()) => Ok(Some(uid)),
            Err(e @ (AuthError::AccessDenied | AuthError::SessionExpired)) => {
                debug!(uid, reason = %e, "Session no longer valid, logging out");
                self.db.sessions().logout(&session.id).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn check_security(&self, session: &Session, uid: i64) -> Result<(), AuthError> {
        if session.is_expired(Utc::now()) {
            return Err(AuthError::SessionExpired);
        }
        match self.db.users().get_by_id(uid).await? {
            Some(user) if user.active => Ok(()),
            _ => Err(AuthError::AccessDenied),
        }
    }

    async fn auth_method_token(
        &self,
        headers: &HeaderMap,
        method: AuthMethod,
    ) -> Result<AuthOutcome, AuthError> {
        let rejection = match extract_token(headers, self.config.header_names()) {
            Ok(None) => TokenRejection::Missing,
            // Present but not visible ASCII: no stored token can match it.
            Err(e) => {
                error!(error = %e, "Unreadable token header");
                TokenRejection::Invalid
            }
            Ok(Some(raw)) => {
                let value = strip_prefixes(raw, self.config.prefixes(), self.config.prefix_strip());
                match self.db.tokens().find_by_value(&value).await? {
                    Some(token) if token.is_valid(Utc::now()) => {
                        debug!(
                            kind = %token.principal.kind,
                            id = token.principal.id,
                            "Token authenticated"
                        );
                        return Ok(AuthOutcome::Proceed(AuthContext::from_token(
                            method,
                            &token,
                            self.config.user_kind(),
                        )));
                    }
                    Some(_) => TokenRejection::Expired,
                    None => TokenRejection::Invalid,
                }
            }
        };

        error!("{}", rejection.message());
        Ok(AuthOutcome::Reject(rejection.into_response()))
    }
}
