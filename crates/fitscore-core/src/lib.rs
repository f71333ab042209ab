//! Shared configuration and secret access for fitscore.
//!
//! Holds the environment-driven [`AppConfig`], the [`SecretProvider`]
//! abstraction used by the AI request adapter to obtain provider API keys,
//! and the shared [`ConfigError`] type.

pub mod app_config;
pub mod config;
pub mod secrets;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use secrets::{EnvSecrets, SecretProvider, StaticSecrets};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
