//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid PORT value '{0}'")]
    Port(String),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Load configuration from an optional TOML file, apply environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<RelayConfig, ConfigError> {
    let mut config: RelayConfig = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => RelayConfig::default(),
    };

    apply_port_override(&mut config, std::env::var(PORT_ENV).ok().as_deref())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Replace the port of the bind address, keeping its host.
pub fn apply_port_override(config: &mut RelayConfig, port: Option<&str>) -> Result<(), ConfigError> {
    let Some(port) = port else {
        return Ok(());
    };
    let port: u16 = port.trim().parse().map_err(|_| ConfigError::Port(port.to_string()))?;

    let host = config
        .listener
        .bind_address
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or_else(|| "0.0.0.0".to_string());
    config.listener.bind_address = format!("{}:{}", host, port);
    Ok(())
}
