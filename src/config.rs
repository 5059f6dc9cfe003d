//! Configuration management for the archival S3 client

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Connection settings for the S3-compatible store
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    #[serde(default)]
    pub tls_enabled: bool,
}

/// Backoff settings applied to every single-request operation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the final one whose failure is surfaced
    pub max_attempts: u32,
    pub initial_delay_secs: f64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_secs: 1.0,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.initial_delay_secs.is_finite() || self.initial_delay_secs < 0.0 {
            return Err(ConfigError::Validation(format!(
                "retry initial_delay_secs must be a non-negative number, got {}",
                self.initial_delay_secs
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "retry backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Initial backoff delay; out-of-range values collapse to zero
    pub fn initial_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_delay_secs).unwrap_or_default()
    }
}

impl StorageConfig {
    /// Check the settings and return the endpoint URL with an explicit scheme
    pub fn validate(&self) -> Result<String, ConfigError> {
        for (field, value) in [
            ("region", &self.region),
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("endpoint", &self.endpoint),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("storage {} must not be empty", field)));
            }
        }

        let endpoint = self.endpoint.trim();
        if endpoint.starts_with("https://") {
            if !self.tls_enabled {
                return Err(ConfigError::Validation(format!(
                    "endpoint {} uses https but TLS is disabled",
                    endpoint
                )));
            }
            Ok(endpoint.to_string())
        } else if endpoint.starts_with("http://") {
            if self.tls_enabled {
                return Err(ConfigError::Validation(format!(
                    "endpoint {} uses plain http but TLS is enabled",
                    endpoint
                )));
            }
            Ok(endpoint.to_string())
        } else if endpoint.contains("://") {
            Err(ConfigError::Validation(format!(
                "endpoint {} has an unsupported scheme",
                endpoint
            )))
        } else {
            let scheme = if self.tls_enabled { "https" } else { "http" };
            Ok(format!("{}://{}", scheme, endpoint))
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            storage: StorageConfig {
                region: "us-west-2".to_string(),
                access_key: "minioadmin".to_string(),
                secret_key: "minioadmin".to_string(),
                endpoint: "http://localhost:9000".to_string(),
                tls_enabled: false,
            },
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = RetryConfig::default();
        let disable_ssl: bool = parse_var("S3_DISABLE_SSL")?.unwrap_or(true);

        Ok(ClientConfig {
            storage: StorageConfig {
                region: required_var("S3_REGION")?,
                access_key: required_var("S3_ACCESS_KEY")?,
                secret_key: required_var("S3_SECRET_KEY")?,
                endpoint: required_var("S3_ENDPOINT")?,
                tls_enabled: !disable_ssl,
            },
            retry: RetryConfig {
                max_attempts: parse_var("S3_RETRY_MAX_ATTEMPTS")?
                    .unwrap_or(defaults.max_attempts),
                initial_delay_secs: parse_var("S3_RETRY_INITIAL_DELAY_SECS")?
                    .unwrap_or(defaults.initial_delay_secs),
                backoff_multiplier: parse_var("S3_RETRY_BACKOFF_MULTIPLIER")?
                    .unwrap_or(defaults.backoff_multiplier),
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.retry.validate()
    }
}

fn required_var(var: &str) -> Result<String, ConfigError> {
    env::var(var).map_err(|_| ConfigError::Missing(var.to_string()))
}

fn parse_var<T: FromStr>(var: &str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: var.to_string(),
            value,
        }),
        Err(_) => Ok(None),
    }
}
