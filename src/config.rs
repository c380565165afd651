//! Environment configuration and deployment profiles
//!
//! All credentials are read once at startup; a missing required variable is
//! fatal before the listener binds. Each subject-area deployment is a
//! `VariantProfile` consumed by the single parameterized webhook handler.

use crate::error::{ChatError, Result};
use std::env;

/// Number of retrieval passages requested per query, in every variant.
pub const RETRIEVAL_TOP_K: usize = 5;

/// How a variant maintains short-term conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Re-fetch the most recent `window` rows from the conversation store
    /// on every request.
    Stateless { window: usize },
    /// Keep an in-process window per session, trimmed to `cap` entries.
    Stateful { cap: usize },
}

/// Per-deployment configuration consumed by the webhook handler.
#[derive(Debug, Clone)]
pub struct VariantProfile {
    /// URL path the variant is mounted at, without leading slash.
    pub endpoint: &'static str,
    /// Fixed persona + behavior rules injected into every prompt.
    pub system_prompt: &'static str,
    /// Vector index namespace queried by the retrieval tool.
    pub namespace: &'static str,
    /// Conversation table this variant persists into.
    pub table_name: &'static str,
    pub history: HistoryMode,
}

const SCIENCE_SYSTEM_PROMPT: &str = "You are a knowledgeable science tutor. \
Answer questions accurately and cite retrieved reference material when it is \
relevant. Use the vector_database tool to look up scientific information, \
the insights tool to review prior feedback, and the feedback tool to store \
feedback the user offers. Be concise and educational.";

const MATH_SYSTEM_PROMPT: &str = "You are a patient mathematics tutor. Work \
through problems step by step and prefer exact reasoning over approximation. \
Use the vector_database tool to retrieve worked examples and definitions \
when they would help, and the feedback tool to store feedback the user \
offers.";

/// Built-in deployment profiles.
///
/// The science deployment is stateless (history re-fetched from storage);
/// the math deployment keeps a per-session in-process window.
pub fn builtin_variants() -> Vec<VariantProfile> {
    vec![
        VariantProfile {
            endpoint: "science/chat",
            system_prompt: SCIENCE_SYSTEM_PROMPT,
            namespace: "science",
            table_name: "science_messages",
            history: HistoryMode::Stateless { window: 5 },
        },
        VariantProfile {
            endpoint: "math/chat",
            system_prompt: MATH_SYSTEM_PROMPT,
            namespace: "math",
            table_name: "math_messages",
            history: HistoryMode::Stateful { cap: 20 },
        },
    ]
}

/// Process-wide configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: String,
    pub pinecone_api_key: String,
    pub pinecone_index_host: String,
    pub database_url: String,
    pub auth_secret: String,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from the environment. Any missing required
    /// credential is a `ChatError::Config` and the process must not serve.
    pub fn from_env() -> Result<Self> {
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ChatError::Config(format!("PORT is not a valid port: {}", raw)))?,
            Err(_) => 8080,
        };

        let config = Self {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            pinecone_api_key: require_env("PINECONE_API_KEY")?,
            pinecone_index_host: require_env("PINECONE_INDEX_HOST")?,
            database_url: require_env("DATABASE_URL")?,
            auth_secret: require_env("AUTH_SECRET")?,
            port,
        };

        for variant in builtin_variants() {
            validate_table_name(variant.table_name)?;
        }

        Ok(config)
    }
}

fn require_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ChatError::Config(format!(
            "required environment variable {} is not set",
            name
        ))),
    }
}

/// Table names are interpolated into SQL (identifiers cannot be bound), so
/// they must be plain lowercase identifiers.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);
    let valid_rest = name
        .chars()
        .skip(1)
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid_first && valid_rest {
        Ok(())
    } else {
        Err(ChatError::Config(format!(
            "invalid table name: {:?}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("science_messages").is_ok());
        assert!(validate_table_name("_hidden2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("1table").is_err());
        assert!(validate_table_name("messages; DROP TABLE x").is_err());
        assert!(validate_table_name("Messages").is_err());
    }

    #[test]
    fn test_builtin_variants_are_valid() {
        let variants = builtin_variants();
        assert_eq!(variants.len(), 2);
        for v in &variants {
            assert!(validate_table_name(v.table_name).is_ok());
            assert!(!v.endpoint.starts_with('/'));
            assert!(!v.system_prompt.is_empty());
        }
        assert_eq!(variants[0].history, HistoryMode::Stateless { window: 5 });
        assert_eq!(variants[1].history, HistoryMode::Stateful { cap: 20 });
    }

    #[test]
    fn test_missing_required_env_is_fatal() {
        // Serialized by env var uniqueness: use a name no other test touches.
        env::remove_var("RAG_CHAT_TEST_UNSET");
        assert!(require_env("RAG_CHAT_TEST_UNSET").is_err());

        env::set_var("RAG_CHAT_TEST_SET", "value");
        assert_eq!(require_env("RAG_CHAT_TEST_SET").unwrap(), "value");
        env::remove_var("RAG_CHAT_TEST_SET");
    }
}
