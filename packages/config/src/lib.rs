// ABOUTME: Environment-driven configuration loaded once at startup
// ABOUTME: Fails fast when any required API key or webhook secret is absent

use std::env;
use std::num::ParseIntError;
use thiserror::Error;

const REQUIRED_VARS: &[&str] = &[
    "TWENTY_API_KEY",
    "TWENTY_BASE_URL",
    "TWENTY_WEBHOOK_SECRET",
    "LINEAR_API_KEY",
    "LINEAR_TEAM_ID",
    "LINEAR_WEBHOOK_SECRET",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variables: {0}")]
    MissingEnv(String),
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
}

/// Twenty CRM connection settings.
#[derive(Debug, Clone)]
pub struct TwentyConfig {
    pub api_key: String,
    pub base_url: String,
    pub webhook_secret: String,
}

/// Linear connection settings.
#[derive(Debug, Clone)]
pub struct LinearConfig {
    pub api_key: String,
    pub team_id: String,
    pub webhook_secret: String,
}

/// Process configuration, constructed once at startup and passed by
/// reference into every component. No ambient globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub twenty: TwentyConfig,
    pub linear: LinearConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| env::var(key).map_or(true, |v| v.is_empty()))
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing.join(", ")));
        }

        let port_str = env::var("PORT").unwrap_or_else(|_| "4001".to_string());
        let port = port_str.parse::<u16>()?;
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        Ok(Config {
            port,
            twenty: TwentyConfig {
                api_key: env::var("TWENTY_API_KEY").unwrap_or_default(),
                base_url: env::var("TWENTY_BASE_URL").unwrap_or_default(),
                webhook_secret: env::var("TWENTY_WEBHOOK_SECRET").unwrap_or_default(),
            },
            linear: LinearConfig {
                api_key: env::var("LINEAR_API_KEY").unwrap_or_default(),
                team_id: env::var("LINEAR_TEAM_ID").unwrap_or_default(),
                webhook_secret: env::var("LINEAR_WEBHOOK_SECRET").unwrap_or_default(),
            },
        })
    }
}
