//! Service configuration loaded from environment variables.
//!
//! Required: `DATABASE_URL`, `SECRET` (JWT signing key, 16+ chars).
//! Optional: `HOST` (0.0.0.0), `PORT` (3000), `TOKEN_TTL_HOURS` (24),
//! `SECURE_COOKIES` (false), `ADMIN_EMAIL` + `ADMIN_PASSWORD`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 16;
/// One year. Larger values overflow the cookie and JWT expiry arithmetic.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub secure_cookies: bool,
    /// Seeded on startup when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("secure_cookies", &self.secure_cookies)
            .field("admin_email", &self.admin_email)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_owned()));

        let database_url = required("DATABASE_URL")?;

        let jwt_secret = required("SECRET")?;
        if jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidEnvVar(
                "SECRET".to_owned(),
                format!("must be at least {MIN_SECRET_LENGTH} characters"),
            ));
        }

        let host = match get("HOST") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("HOST".to_owned(), value))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let port = match get("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidEnvVar("PORT".to_owned(), value))?,
            None => 3000,
        };

        let token_ttl_hours = match get("TOKEN_TTL_HOURS") {
            Some(value) => match value.parse::<i64>() {
                Ok(hours) if (1..=MAX_TOKEN_TTL_HOURS).contains(&hours) => hours,
                _ => return Err(ConfigError::InvalidEnvVar("TOKEN_TTL_HOURS".to_owned(), value)),
            },
            None => 24,
        };

        let secure_cookies = match get("SECURE_COOKIES").as_deref() {
            None => false,
            Some("1" | "true" | "yes") => true,
            Some("0" | "false" | "no") => false,
            Some(other) => {
                return Err(ConfigError::InvalidEnvVar(
                    "SECURE_COOKIES".to_owned(),
                    other.to_owned(),
                ))
            }
        };

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            token_ttl_hours,
            secure_cookies,
            admin_email: get("ADMIN_EMAIL"),
            admin_password: get("ADMIN_PASSWORD"),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
