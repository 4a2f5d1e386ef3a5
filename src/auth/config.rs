//! Immutable token authentication settings.

use axum::http::HeaderName;
use axum::http::header::InvalidHeaderName;

/// Headers probed for a token, in order of preference.
pub const DEFAULT_TOKEN_HEADERS: [&str; 3] = ["token", "authorization", "authorization-token"];

/// Scheme prefixes removed from the header value before lookup.
pub const DEFAULT_TOKEN_PREFIXES: [&str; 2] = ["Bearer ", "Token "];

/// Principal kind whose tokens act as a user.
pub const DEFAULT_USER_KIND: &str = "res.users";

/// How configured prefixes are removed from a header value.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrefixStrip {
    /// Remove every occurrence of every prefix anywhere in the value.
    /// Compatible with existing deployments, but a value containing a
    /// prefix text is altered.
    #[default]
    ReplaceAll,
    /// Remove a single prefix from the start of the value.
    Leading,
}

#[derive(Debug, Clone)]
pub struct TokenAuthConfig {
    header_names: Vec<HeaderName>,
    prefixes: Vec<String>,
    prefix_strip: PrefixStrip,
    user_kind: String,
}

impl Default for TokenAuthConfig {
    fn default() -> Self {
        Self {
            header_names: DEFAULT_TOKEN_HEADERS
                .into_iter()
                .map(HeaderName::from_static)
                .collect(),
            prefixes: DEFAULT_TOKEN_PREFIXES.into_iter().map(String::from).collect(),
            prefix_strip: PrefixStrip::default(),
            user_kind: DEFAULT_USER_KIND.to_string(),
        }
    }
}

impl TokenAuthConfig {
    /// Build a configuration from raw header names. Empty prefixes are dropped.
    pub fn new<H, P>(
        header_names: &[H],
        prefixes: &[P],
        prefix_strip: PrefixStrip,
        user_kind: impl Into<String>,
    ) -> Result<Self, InvalidHeaderName>
    where
        H: AsRef<str>,
        P: AsRef<str>,
    {
        let header_names = header_names
            .iter()
            .map(|name| HeaderName::from_bytes(name.as_ref().as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let prefixes = prefixes
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            header_names,
            prefixes,
            prefix_strip,
            user_kind: user_kind.into(),
        })
    }

    pub fn header_names(&self) -> &[HeaderName] {
        &self.header_names
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn prefix_strip(&self) -> PrefixStrip {
        self.prefix_strip
    }

    pub fn user_kind(&self) -> &str {
        &self.user_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_probe_order() {
        let config = TokenAuthConfig::default();
        let names: Vec<&str> = config.header_names().iter().map(|h| h.as_str()).collect();
        assert_eq!(names, ["token", "authorization", "authorization-token"]);
        assert_eq!(config.prefixes(), ["Bearer ", "Token "]);
        assert_eq!(config.user_kind(), "res.users");
    }

    #[test]
    fn test_new_normalizes_header_case() {
        let config =
            TokenAuthConfig::new(&["X-Api-Token"], &["Bearer "], PrefixStrip::Leading, "user")
                .unwrap();
        assert_eq!(config.header_names()[0].as_str(), "x-api-token");
        assert_eq!(config.prefix_strip(), PrefixStrip::Leading);
    }

    #[test]
    fn test_new_drops_empty_prefixes() {
        let config =
            TokenAuthConfig::new(&["token"], &["", "Token "], PrefixStrip::ReplaceAll, "user")
                .unwrap();
        assert_eq!(config.prefixes(), ["Token "]);
    }

    #[test]
    fn test_new_rejects_invalid_header_name() {
        let result =
            TokenAuthConfig::new(&["bad header"], &["Bearer "], PrefixStrip::ReplaceAll, "user");
        assert!(result.is_err());
    }
}
