//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{
    DEFAULT_TOKEN_HEADERS, DEFAULT_TOKEN_PREFIXES, DEFAULT_USER_KIND, PrefixStrip,
    TokenAuthConfig,
};
use crate::db::{DEFAULT_EXPIRATION_DAYS, Database, Principal, TokenPolicy};
use axum::http::header::InvalidHeaderName;
use chrono::TimeDelta;
use clap::Parser;
use tracing::{error, info};

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tokengate",
    about = "Session and bearer token authentication service"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TOKENGATE_PORT", default_value = "7291")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "TOKENGATE_DATABASE", default_value = "tokengate.db")]
    pub database: String,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// Header probed for a token. Repeat to probe several, in order
    #[arg(long = "token-header", value_name = "NAME", default_values = DEFAULT_TOKEN_HEADERS)]
    pub token_headers: Vec<String>,

    /// Prefix removed from the token header value. Repeat for several
    #[arg(
        long = "token-prefix",
        value_name = "PREFIX",
        allow_hyphen_values = true,
        default_values = DEFAULT_TOKEN_PREFIXES
    )]
    pub token_prefixes: Vec<String>,

    /// How token prefixes are removed
    #[arg(long, value_enum, default_value_t = PrefixStrip::default())]
    pub prefix_strip: PrefixStrip,

    /// Principal kind whose tokens act as a user
    #[arg(long, default_value = DEFAULT_USER_KIND)]
    pub user_kind: String,

    /// Expiration interval of newly issued tokens, in days
    #[arg(long, default_value_t = DEFAULT_EXPIRATION_DAYS,
        value_parser = clap::value_parser!(i64).range(1..=3650))]
    pub token_lifetime_days: i64,

    /// Issue tokens that never expire
    #[arg(long)]
    pub tokens_never_expire: bool,

    /// Create a user with this login (if missing) and print a new token for it
    #[arg(long, value_name = "LOGIN")]
    pub create_user: Option<String>,
}

impl Args {
    pub fn token_policy(&self) -> TokenPolicy {
        TokenPolicy {
            expires: !self.tokens_never_expire,
            interval: TimeDelta::days(self.token_lifetime_days),
        }
    }

    pub fn auth_config(&self) -> Result<TokenAuthConfig, InvalidHeaderName> {
        TokenAuthConfig::new(
            &self.token_headers,
            &self.token_prefixes,
            self.prefix_strip,
            &self.user_kind,
        )
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Handle the --create-user flag: make sure the user exists and issue a token for it.
/// Returns false and logs an error on failure.
pub async fn handle_create_user(
    db: &Database,
    login: &str,
    user_kind: &str,
    policy: TokenPolicy,
) -> bool {
    let uid = match db.users().get_by_login(login).await {
        Ok(Some(existing)) => {
            println!();
            println!("User already exists: {}", existing.login);
            existing.id
        }
        Ok(None) => match db.users().create(login).await {
            Ok(id) => {
                println!();
                println!("User created: {}", login);
                id
            }
            Err(e) => {
                error!(login = %login, error = %e, "Failed to create user");
                return false;
            }
        },
        Err(e) => {
            error!(login = %login, error = %e, "Failed to look up user");
            return false;
        }
    };

    match db.tokens().issue(&Principal::new(user_kind, uid), policy).await {
        Ok(token) => {
            println!("Token: {}", token.value);
            if token.expires {
                println!("Expires at: {}", token.expires_at.to_rfc3339());
            } else {
                println!("Never expires");
            }
            println!();
            info!(uid, token_id = token.id, "Token issued from command line");
            true
        }
        Err(e) => {
            error!(uid, error = %e, "Failed to issue token");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
/// Returns None and logs an error if a token header name is invalid.
pub fn build_config(args: &Args, db: Database) -> Option<ServerConfig> {
    let auth = match args.auth_config() {
        Ok(auth) => auth,
        Err(e) => {
            error!(headers = ?args.token_headers, error = %e, "Invalid token header name");
            return None;
        }
    };

    Some(ServerConfig {
        db,
        auth,
        token_policy: args.token_policy(),
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
