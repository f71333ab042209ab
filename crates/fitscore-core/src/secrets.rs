//! Secret access by logical name.
//!
//! The AI request adapter asks for keys like `OPENAI_API_KEY` through this
//! trait and never reads the process environment itself, so tests and
//! alternative secret stores can substitute their own lookup.

use std::collections::HashMap;

/// Resolves a secret value by logical name.
pub trait SecretProvider: Send + Sync {
    /// Returns the secret for `logical_name`, or `None` if it is not configured.
    fn get(&self, logical_name: &str) -> Option<String>;
}

/// Environment-variable backed secrets: the logical name is the variable name.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn get(&self, logical_name: &str) -> Option<String> {
        std::env::var(logical_name).ok()
    }
}

/// Fixed in-memory secrets, mainly for tests and local tooling.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Convenience constructor from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

impl SecretProvider for StaticSecrets {
    fn get(&self, logical_name: &str) -> Option<String> {
        self.values.get(logical_name).cloned()
    }
}
