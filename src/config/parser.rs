use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `api.client-id`
pub const CLIENT_ID_ENV: &str = "MELI_CLIENT_ID";

/// Environment variable overriding `api.client-secret`
pub const CLIENT_SECRET_ENV: &str = "MELI_CLIENT_SECRET";

/// Loads and parses a configuration file from the given path
///
/// Credentials found in the environment (`MELI_CLIENT_ID`,
/// `MELI_CLIENT_SECRET`) take precedence over the file.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use meli_crawler::config::load_config;
///
/// let config = load_config(Path::new("config.toml")).unwrap();
/// println!("Quota: {}", config.crawler.quota);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    apply_overrides(&mut config, |key| std::env::var(key).ok());

    validate(&config)?;

    Ok(config)
}

/// Applies credential overrides from a key lookup (normally the environment)
pub fn apply_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(client_id) = lookup(CLIENT_ID_ENV).filter(|v| !v.is_empty()) {
        config.api.client_id = client_id;
    }

    if let Some(client_secret) = lookup(CLIENT_SECRET_ENV).filter(|v| !v.is_empty()) {
        config.api.client_secret = client_secret;
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Every run row records this hash so runs made with different settings can
/// be told apart.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
