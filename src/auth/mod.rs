//! Bearer token authentication composed with session authentication.
//!
//! Routes declare an [`AuthMethod`]. A still-valid session always wins; when
//! there is none, `token` routes look for an opaque token in the configured
//! headers and bind the request to the token's principal.

mod authenticator;
mod config;
mod context;
mod cookie;
mod errors;
mod extract;
mod method;

pub use authenticator::{AuthOutcome, Authenticator};
pub use config::{
    DEFAULT_TOKEN_HEADERS, DEFAULT_TOKEN_PREFIXES, DEFAULT_USER_KIND, PrefixStrip,
    TokenAuthConfig,
};
pub use context::{AuthContext, AuthSource};
pub use cookie::{SESSION_COOKIE_NAME, get_cookie};
pub use errors::{AuthError, TokenRejection};
pub use extract::{MalformedHeader, extract_token, strip_prefixes};
pub use method::AuthMethod;
