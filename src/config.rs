//! Connection details from the environment

use anyhow::{Context, Result};
use std::fmt;

/// Prefix used when `--env-prefix` is not given
pub const DEFAULT_ENV_PREFIX: &str = "PGO_";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const DEFAULT_DATABASE: &str = "postgres";
const DEFAULT_USER: &str = "postgres";

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database the primary connection is opened against
    pub database: String,
    pub user: String,
    pub password: String,
}

impl ConnectionConfig {
    /// Read `{prefix}HOST`, `{prefix}PORT`, `{prefix}DATABASE`, `{prefix}USER`
    /// (or `{prefix}USERNAME`) and `{prefix}PASSWORD`.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_lookup(prefix, |name| std::env::var(name).ok())
    }

    /// Like [`Self::from_env`], with an explicit variable source.
    pub fn from_lookup(prefix: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{prefix}{name}")).filter(|v| !v.is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("{prefix}PORT must be a port number, got '{raw}'"))?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            database: var("DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            user: var("USER")
                .or_else(|| var("USERNAME"))
                .unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: var("PASSWORD").unwrap_or_default(),
        })
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}
