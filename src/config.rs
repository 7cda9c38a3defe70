// src/config.rs

use std::{env, net::SocketAddr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;

/// Warning budget handed to the integrity monitor when an attempt starts.
pub const INITIAL_WARNINGS: u32 = 3;

/// Points awarded to a correct single-choice answer by the auto-grader.
pub const AUTO_GRADE_POINTS: f64 = 1.0;

/// Interval between countdown ticks on the client.
pub const TIMER_TICK: Duration = Duration::from_secs(1);

/// How long a terminated session waits for the cheating report to be accepted.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-request timeout of the HTTP gateway.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Default JWT lifetime (24 hours).
pub const DEFAULT_JWT_EXPIRATION: u64 = 86_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let jwt_expiration = match env::var("JWT_EXPIRATION") {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "JWT_EXPIRATION",
                reason: e.to_string(),
            })?,
            Err(_) => DEFAULT_JWT_EXPIRATION,
        };

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let cors_origins = parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        );

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            cors_origins,
        })
    }

    /// Configuration for in-process tests; never touches the environment.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: jwt_secret.to_string(),
            jwt_expiration: 600,
            rust_log: "error".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            cors_origins: Vec::new(),
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
