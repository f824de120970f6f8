//! Provider factory - creates clients from config

use super::clients::{OllamaClient, OpenAIClient};
use super::traits::ModelClient;
use crate::config::ModelProviderConfig;
use std::env;
use tracing::warn;

/// Reads the API key from the environment variable named in config.
pub fn resolve_api_key(provider: &str, env_var: Option<&str>) -> Option<String> {
    let raw = env_var.map(str::trim).filter(|raw| !raw.is_empty())?;
    match env::var(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(
                provider,
                env_var = raw,
                %err,
                "API key environment variable is not set"
            );
            None
        }
    }
}

pub struct ProviderFactory;

impl ProviderFactory {
    /// `ollama` and `localai` speak the Ollama API; everything else is
    /// treated as OpenAI-compatible.
    pub fn create(config: &ModelProviderConfig) -> Box<dyn ModelClient> {
        if config.is_ollama() || config.provider_type.eq_ignore_ascii_case("localai") {
            Box::new(OllamaClient::from_config(config))
        } else {
            Box::new(OpenAIClient::from_config(config))
        }
    }
}
