use crate::api::Site;
use crate::config::types::{ApiConfig, Config, CrawlerConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API credentials and endpoints
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if config.client_id.is_empty() {
        return Err(ConfigError::Validation(
            "client_id cannot be empty (set it in [api] or MELI_CLIENT_ID)".to_string(),
        ));
    }

    if config.client_secret.is_empty() {
        return Err(ConfigError::Validation(
            "client_secret cannot be empty (set it in [api] or MELI_CLIENT_SECRET)".to_string(),
        ));
    }

    if Site::from_code(&config.site_id).is_err() {
        return Err(ConfigError::Validation(format!(
            "Unknown site_id '{}'",
            config.site_id
        )));
    }

    Url::parse(&config.redirect_uri)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid redirect_uri: {}", e)))?;

    validate_base_url("api_base", &config.api_base)?;

    if let Some(auth_base) = &config.auth_base {
        validate_base_url("auth_base", auth_base)?;
    }

    Ok(())
}

fn validate_base_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url =
        Url::parse(value).map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", field, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            field,
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.quota < 1 {
        return Err(ConfigError::Validation(format!(
            "quota must be >= 1, got {}",
            config.quota
        )));
    }

    if !(config.coverage_threshold > 0.0 && config.coverage_threshold <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "coverage_threshold must be in (0, 1], got {}",
            config.coverage_threshold
        )));
    }

    if config.max_concurrent_categories < 1 || config.max_concurrent_categories > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_categories must be between 1 and 32, got {}",
            config.max_concurrent_categories
        )));
    }

    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > 64 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_pages must be between 1 and 64, got {}",
            config.max_concurrent_pages
        )));
    }

    if config.refresh_skew_secs > 3600 {
        return Err(ConfigError::Validation(format!(
            "refresh_skew_secs must be <= 3600, got {}",
            config.refresh_skew_secs
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    for id in &config.base_categories {
        validate_category_id(id)?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// A category id is a known site prefix followed by digits (e.g., "MLB1384")
fn validate_category_id(id: &str) -> Result<(), ConfigError> {
    let valid = id.len() > 3
        && id.is_char_boundary(3)
        && Site::from_code(&id[..3]).is_ok()
        && id[3..].chars().all(|c| c.is_ascii_digit());

    if !valid {
        return Err(ConfigError::Validation(format!(
            "Invalid base category id '{}'",
            id
        )));
    }

    Ok(())
}
