use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Accept client-supplied charge breakdowns instead of recomputing.
    pub trust_client_charges: bool,
    /// Duplicate-submission window in ms; 0 disables the guard.
    pub duplicate_window_ms: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let trust_client_charges = match env_map
            .get("TRUST_CLIENT_CHARGES")
            .map(|s| s.as_str())
            .unwrap_or("false")
        {
            "true" => true,
            "false" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "TRUST_CLIENT_CHARGES".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        let duplicate_window_ms = env_map
            .get("DUPLICATE_WINDOW_MS")
            .map(|s| s.as_str())
            .unwrap_or("300000")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "DUPLICATE_WINDOW_MS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;
        if duplicate_window_ms < 0 {
            return Err(ConfigError::InvalidValue(
                "DUPLICATE_WINDOW_MS".to_string(),
                "must not be negative".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            trust_client_charges,
            duplicate_window_ms,
        })
    }
}
