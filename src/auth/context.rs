//! Per-request authentication context.

use std::fmt;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;

use super::method::AuthMethod;
use crate::api::ApiError;
use crate::db::{Principal, Token};

/// Where the identity of a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthSource {
    Anonymous,
    Session,
    /// Authenticated by token; the session is not re-validated for the rest
    /// of the request.
    Token,
}

/// The identity bound to a request, built once by the authenticator.
///
/// Handlers receive it as an extractor. It is only available on routes
/// registered through the dispatch guard.
#[derive(Clone)]
pub struct AuthContext {
    method: AuthMethod,
    source: AuthSource,
    principal: Option<Principal>,
    uid: Option<i64>,
    token: Option<String>,
}

impl AuthContext {
    pub(crate) fn anonymous(method: AuthMethod) -> Self {
        Self {
            method,
            source: AuthSource::Anonymous,
            principal: None,
            uid: None,
            token: None,
        }
    }

    pub(crate) fn session(method: AuthMethod, uid: i64, user_kind: &str) -> Self {
        Self {
            method,
            source: AuthSource::Session,
            principal: Some(Principal::new(user_kind, uid)),
            uid: Some(uid),
            token: None,
        }
    }

    /// Only tokens of the user kind set the acting user id.
    pub(crate) fn from_token(method: AuthMethod, token: &Token, user_kind: &str) -> Self {
        let uid = (token.principal.kind == user_kind).then_some(token.principal.id);
        Self {
            method,
            source: AuthSource::Token,
            principal: Some(token.principal.clone()),
            uid,
            token: Some(token.value.clone()),
        }
    }

    /// The requirement declared by the matched route.
    pub fn method(&self) -> AuthMethod {
        self.method
    }

    pub fn source(&self) -> AuthSource {
        self.source
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Effective acting user id.
    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    /// The raw token value, when the request was authenticated by token.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("method", &self.method)
            .field("source", &self.source)
            .field("principal", &self.principal)
            .field("uid", &self.uid)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| ApiError::internal("Route is not behind the dispatch guard"))
    }
}
