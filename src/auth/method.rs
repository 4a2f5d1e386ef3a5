//! Per-route authentication requirements.

use std::fmt;

/// The authentication a route requires before its handler may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthMethod {
    /// No authentication. A valid session is still picked up.
    None,
    /// A logged-in session user.
    #[default]
    User,
    /// A bearer token from the request headers, unless a session user is
    /// already bound.
    Token,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::User => "user",
            AuthMethod::Token => "token",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
