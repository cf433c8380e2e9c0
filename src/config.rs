//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into type-safe structs.
//! Database settings are read with the `DB_` prefix (`DB_HOST` -> `host`).

use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

/// HTTP server settings.
///
/// # Environment Variables
///
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 8080
/// - `HEALTH_EXIT_ON_DOWN` (optional): terminate the process when the
///   health check reports the database as down, defaults to false
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub health_exit_on_down: bool,
}

/// Token and password hashing settings.
///
/// # Environment Variables
///
/// - `JWT_SECRET` (required): HS256 signing secret
/// - `ACCESS_TOKEN_TTL_SECS` (optional): defaults to 15 minutes
/// - `REFRESH_TOKEN_TTL_SECS` (optional): defaults to 7 days
/// - `BCRYPT_COST` (optional): defaults to `bcrypt::DEFAULT_COST`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: i64,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

/// PostgreSQL connection settings, read from `DB_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,

    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_access_ttl() -> i64 {
    15 * 60
}

fn default_refresh_ttl() -> i64 {
    7 * 24 * 60 * 60
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    1800
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into the config structs.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., `JWT_SECRET`, `DB_HOST`)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        Ok(Self {
            server: envy::from_env::<ServerConfig>()?,
            auth: envy::from_env::<AuthConfig>()?,
            database: envy::prefixed("DB_").from_env::<DatabaseConfig>()?,
        })
    }
}

impl DatabaseConfig {
    /// Connection string in the form
    /// `postgres://<user>:<password>@<host>:<port>/<database>?sslmode=disable&search_path=<schema>`.
    ///
    /// Credentials are percent-encoded.
    pub fn connection_url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "postgres://{}:{}/{}",
            self.host, self.port, self.database
        ))?;

        // Only fails for URLs without a host, which the format above rules out
        let _ = url.set_username(&self.username);
        let _ = url.set_password(Some(&self.password));

        url.query_pairs_mut()
            .append_pair("sslmode", "disable")
            .append_pair("search_path", &self.schema);

        Ok(url)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}
