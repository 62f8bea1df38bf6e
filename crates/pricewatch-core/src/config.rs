use crate::app_config::AppConfig;
use crate::ConfigError;

pub(crate) const DEFAULT_DATABASE_NAME: &str = "price_tracker";

pub(crate) const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Every six hours, on the hour.
pub(crate) const DEFAULT_REFRESH_SCHEDULE: &str = "0 0 */6 * * *";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` lookup instead of `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        match lookup(var) {
            Ok(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(ConfigError::MissingEnvVar(var.to_string())),
        }
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let mongo_uri = require("MONGO_URI")?;
    let database_name = or_default("PRICEWATCH_DB_NAME", DEFAULT_DATABASE_NAME);
    let default_user = lookup("PRICEWATCH_USER")
        .ok()
        .filter(|u| !u.trim().is_empty());

    let log_level = or_default("PRICEWATCH_LOG_LEVEL", "info");

    let db_max_pool_size = parse_u32("PRICEWATCH_DB_MAX_POOL_SIZE", "10")?;
    if db_max_pool_size == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "PRICEWATCH_DB_MAX_POOL_SIZE".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let db_connect_timeout_secs = parse_u64("PRICEWATCH_DB_CONNECT_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs =
        parse_u64("PRICEWATCH_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("PRICEWATCH_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_max_retries = parse_u32("PRICEWATCH_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("PRICEWATCH_SCRAPER_RETRY_BACKOFF_BASE_SECS", "2")?;

    let refresh_schedule = or_default("PRICEWATCH_REFRESH_SCHEDULE", DEFAULT_REFRESH_SCHEDULE);

    Ok(AppConfig {
        mongo_uri,
        database_name,
        default_user,
        log_level,
        db_max_pool_size,
        db_connect_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        refresh_schedule,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
