//! Application settings read from the environment (and a `.env` file, if present).

use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    /// Existing account promoted to Admin at startup
    pub bootstrap_admin_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: StdDuration,
    /// Upper bound for a single core operation, transaction included
    pub operation_timeout: StdDuration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl: chrono::Duration,
    pub refresh_token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
}

impl DatabaseConfig {
    /// A private in-memory database; lives as long as its single pooled connection.
    pub fn in_memory() -> Self {
        DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: StdDuration::from_secs(3),
            operation_timeout: StdDuration::from_secs(5),
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                value: "<empty>".into(),
            });
        }

        Ok(AppConfig {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://flights.db".to_string()),
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10)?,
                acquire_timeout: StdDuration::from_secs(var_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?),
                operation_timeout: StdDuration::from_secs(var_or("OPERATION_TIMEOUT_SECS", 5)?),
            },
            auth: AuthConfig {
                jwt_secret,
                issuer: env::var("JWT_ISSUER")
                    .unwrap_or_else(|_| "flight-reservation-system".to_string()),
                audience: env::var("JWT_AUDIENCE")
                    .unwrap_or_else(|_| "flight-reservation-clients".to_string()),
                access_token_ttl: chrono::Duration::hours(var_or("ACCESS_TOKEN_TTL_HOURS", 24)?),
                refresh_token_ttl: chrono::Duration::days(var_or("REFRESH_TOKEN_TTL_DAYS", 7)?),
                bcrypt_cost: var_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            },
            bootstrap_admin_email: env::var("BOOTSTRAP_ADMIN_EMAIL")
                .ok()
                .filter(|email| !email.trim().is_empty()),
        })
    }
}
