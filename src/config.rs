//! Environment configuration loaded once at process start.

use anyhow::{Context, Result};
use std::env;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Document-store connection string and database name.
    pub mongodb_uri: String,
    pub db_name: String,
    /// HS256 secret the identity provider signs session tokens with.
    pub session_secret: String,
    /// Cookie carrying the session token. Defaults to the NextAuth-compatible
    /// name so an existing identity deployment keeps working.
    pub session_cookie: String,
    /// Public base URL of this deployment, used when composing hosted links.
    pub public_url: String,
    /// Object-storage (imgbb) API key; upload endpoint is disabled without it.
    pub imgbb_key: Option<String>,
    /// When true (default), a failed profile-status lookup lets navigation
    /// through instead of blocking it.
    pub gate_fail_open: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let http_port: u16 = var_or("SAWARI_HTTP_PORT", "7878")
            .parse()
            .context("SAWARI_HTTP_PORT must be a port number")?;
        let session_secret = env::var("SAWARI_SESSION_SECRET")
            .context("SAWARI_SESSION_SECRET is required")?;
        let gate_fail_open = var_or("SAWARI_GATE_FAIL_OPEN", "true")
            .parse()
            .context("SAWARI_GATE_FAIL_OPEN must be true or false")?;

        Ok(Self {
            http_port,
            mongodb_uri: var_or("SAWARI_MONGODB_URI", "mongodb://localhost:27017"),
            db_name: var_or("SAWARI_DB_NAME", "sawari"),
            session_secret,
            session_cookie: var_or("SAWARI_SESSION_COOKIE", "next-auth.session-token"),
            public_url: var_or("SAWARI_PUBLIC_URL", "http://localhost:7878"),
            imgbb_key: env::var("SAWARI_IMGBB_KEY").ok(),
            gate_fail_open,
        })
    }
}
