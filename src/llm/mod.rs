//! Text-generation integration.
//!
//! The interview core only needs `generate(prompt, system_instruction)`.
//! Google Gemini is the one shipped backend; any `LlmProvider` works, and the
//! core keeps running with no provider at all.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::ExposeSecret;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: secrecy::SecretString,
    pub model: String,
}

impl LlmConfig {
    /// Whether the key looks usable. Empty and placeholder keys are not.
    pub fn has_usable_key(&self) -> bool {
        let key = self.api_key.expose_secret().trim();
        !key.is_empty() && !key.starts_with("AIzaSyDummy")
    }
}

/// Create an LLM provider from configuration, or `None` when no usable key is set.
pub fn create_provider(config: &LlmConfig) -> Option<Arc<dyn LlmProvider>> {
    if !config.has_usable_key() {
        tracing::warn!("No usable text-generation key; running with static responses only");
        return None;
    }
    tracing::info!("Using Gemini (model: {})", config.model);
    Some(Arc::new(GeminiProvider::new(
        config.api_key.clone(),
        config.model.clone(),
    )))
}
