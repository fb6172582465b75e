//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{Secret, SenderConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `bitcoin.wif`.
pub const BTC_WIF_ENV_VAR: &str = "SENDER_BTC_WIF";

/// Environment variable overriding `ethereum.private_key`.
pub const ETH_PRIVATE_KEY_ENV_VAR: &str = crate::ethereum::wallet::PRIVATE_KEY_ENV_VAR;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load, apply environment overrides, and validate a TOML file.
pub fn load_config(path: &Path) -> Result<SenderConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse TOML without validating.
pub fn parse_config(content: &str) -> Result<SenderConfig, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Replace key material with values from the environment when set.
///
/// `lookup` is `std::env::var` in production and a map in tests.
pub fn apply_env_overrides<F>(config: &mut SenderConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(wif) = lookup(BTC_WIF_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.bitcoin.wif = Secret::new(wif);
    }
    if let Some(key) = lookup(ETH_PRIVATE_KEY_ENV_VAR).filter(|v| !v.trim().is_empty()) {
        config.ethereum.private_key = Secret::new(key);
    }
}
