//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Governing timezone for day bucketing of bookings.
    pub governing_tz: Tz,
    /// Origin allowed to call this API from a browser.
    pub frontend_origin: String,
    /// When set, signup only accepts emails in this domain (and its
    /// subdomains), e.g. `nhs.uk`.
    pub allowed_email_domain: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Scheduling Settings ---
        let governing_tz_str =
            std::env::var("GOVERNING_TZ").unwrap_or_else(|_| "Europe/London".to_string());
        let governing_tz = governing_tz_str.parse::<Tz>().map_err(|_| {
            ConfigError::InvalidValue(
                "GOVERNING_TZ".to_string(),
                format!("'{}' is not a valid IANA timezone", governing_tz_str),
            )
        })?;

        // --- Load Web Settings ---
        let frontend_origin = std::env::var("FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let allowed_email_domain = std::env::var("ALLOWED_EMAIL_DOMAIN").ok();

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            governing_tz,
            frontend_origin,
            allowed_email_domain,
        })
    }
}
