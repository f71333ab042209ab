use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Process-wide configuration, loaded once at startup.
///
/// API keys are deliberately absent: the adapter obtains them through
/// [`crate::SecretProvider`] so they never travel inside plain config.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    /// Path to the model catalog data file (models, mappings, workflows, billing).
    pub catalog_path: PathBuf,
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub triage_timeout_secs: u64,
    pub extraction_timeout_secs: u64,
    pub analysis_timeout_secs: u64,
    /// TTL for cached extraction results, in seconds. Default 48 hours.
    pub cache_ttl_secs: u64,
}
