use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your-secret-key-change-this-in-production",
];

const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// Settings read once at startup; read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl: chrono::Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("FOLIO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("FOLIO_JWT_SECRET is unset or still a placeholder");
        }

        let db_path = lookup("FOLIO_DB_PATH").unwrap_or_else(|| "folio.db".into()).into();
        let host = lookup("FOLIO_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("FOLIO_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("FOLIO_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("FOLIO_HOST must be an IP address")?;

        let ttl_hours: i64 = match lookup("FOLIO_TOKEN_TTL_HOURS") {
            Some(v) => v.parse().context("FOLIO_TOKEN_TTL_HOURS must be an integer")?,
            None => DEFAULT_TOKEN_TTL_HOURS,
        };
        if ttl_hours <= 0 {
            bail!("FOLIO_TOKEN_TTL_HOURS must be positive");
        }

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl: chrono::Duration::hours(ttl_hours),
        })
    }
}
