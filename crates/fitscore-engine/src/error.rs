use thiserror::Error;

/// Errors produced inside the orchestration engine.
///
/// Stage fatality is pipeline policy, not an error variant: the same
/// `EngineError` aborts the run when triage or main analysis raises it and
/// merely degrades context when extraction does.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The AI provider answered with a non-success HTTP status.
    #[error("provider error for model {model}: status {status}: {body}")]
    Provider {
        model: String,
        status: u16,
        body: String,
    },

    /// Both the requested model and its designated backup failed. Displays
    /// the primary failure so it survives `to_string()` at the run boundary.
    #[error("model {primary} failed and backup {backup} also failed: {source}")]
    BackupExhausted {
        primary: String,
        backup: String,
        #[source]
        source: Box<EngineError>,
    },

    /// A response body could not be deserialized into the expected shape.
    #[error("deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A model id not present in the catalog was requested.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// No catalog mapping exists for a stage/tier pair.
    #[error("no model mapping for stage {stage} at tier {tier}")]
    UnknownStageMapping { stage: String, tier: String },

    /// A provider named by the catalog has no configured base URL.
    #[error("no base URL configured for provider '{0}'")]
    UnknownProvider(String),

    /// The API key for a provider is not available from the secret provider.
    #[error("missing secret: {0}")]
    MissingSecret(String),

    /// Catalog file could not be loaded or failed validation.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The stage result cache could not be reached. Always swallowed by the
    /// pipeline and treated as a miss.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
}
