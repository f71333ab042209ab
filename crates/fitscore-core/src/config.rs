use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

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
/// Unlike [`load_app_config`], this does NOT load `.env` files, which is useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|var| std::env::var(var))
}

/// Build application configuration using the provided env-var lookup function.
///
/// This is the core parsing/validation logic, decoupled from the actual environment
/// so it can be tested with a pure `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("FITSCORE_ENV", "development"));
    let log_level = or_default("FITSCORE_LOG_LEVEL", "info");
    let catalog_path = PathBuf::from(or_default("FITSCORE_CATALOG_PATH", "./config/models.yaml"));

    let openai_base_url = or_default("FITSCORE_OPENAI_BASE_URL", "https://api.openai.com");
    let anthropic_base_url = or_default("FITSCORE_ANTHROPIC_BASE_URL", "https://api.anthropic.com");
    let user_agent = or_default("FITSCORE_USER_AGENT", "fitscore/0.1 (partnership-analysis)");

    let connect_timeout_secs = parse_u64("FITSCORE_CONNECT_TIMEOUT_SECS", "10")?;
    let triage_timeout_secs = parse_u64("FITSCORE_TRIAGE_TIMEOUT_SECS", "20")?;
    let extraction_timeout_secs = parse_u64("FITSCORE_EXTRACTION_TIMEOUT_SECS", "30")?;
    let analysis_timeout_secs = parse_u64("FITSCORE_ANALYSIS_TIMEOUT_SECS", "60")?;
    let cache_ttl_secs = parse_u64("FITSCORE_CACHE_TTL_SECS", "172800")?;

    Ok(AppConfig {
        env,
        log_level,
        catalog_path,
        openai_base_url,
        anthropic_base_url,
        user_agent,
        connect_timeout_secs,
        triage_timeout_secs,
        extraction_timeout_secs,
        analysis_timeout_secs,
        cache_ttl_secs,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}
