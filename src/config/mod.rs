//! Application configuration

pub mod prompts;

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::conversation::{ClassRoster, RenamePolicy};
use crate::providers::CompletionOptions;

pub use prompts::{compose_greeting, compose_system_prompt, Persona, PromptError, QuickQuestion};

const PROVIDERS: &[&str] = &["openai", "ollama"];

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// `openai` (any OpenAI-compatible endpoint) or `ollama`
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub ollama_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub classes: ClassRoster,
    pub rename_policy: RenamePolicy,
    pub persona_file: Option<PathBuf>,
}

/// Startup configuration errors; fatal before any session exists
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing credential: set {0}")]
    MissingCredential(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let provider = get("LLM_PROVIDER")
            .unwrap_or_else(|| "openai".into())
            .trim()
            .to_lowercase();
        if !PROVIDERS.contains(&provider.as_str()) {
            return Err(ConfigError::Invalid {
                key: "LLM_PROVIDER",
                reason: format!("expected one of {:?}, got '{}'", PROVIDERS, provider),
            });
        }

        let openai_api_key = get("OPENAI_API_KEY");
        if provider == "openai" && openai_api_key.is_none() {
            return Err(ConfigError::MissingCredential("OPENAI_API_KEY"));
        }

        let temperature: f32 = parse_or(&get, "TEMPERATURE", 0.3)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                key: "TEMPERATURE",
                reason: format!("{} is outside 0.0..=2.0", temperature),
            });
        }

        let max_tokens: u32 = parse_or(&get, "MAX_TOKENS", 120)?;
        if max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_TOKENS",
                reason: "must be at least 1".into(),
            });
        }

        let timeout_secs: u64 = parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REQUEST_TIMEOUT_SECS",
                reason: "must be at least 1".into(),
            });
        }

        let classes = match get("CLASS_LABELS") {
            Some(raw) => ClassRoster::new(raw.split(',').map(str::to_string).collect()).ok_or(
                ConfigError::Invalid {
                    key: "CLASS_LABELS",
                    reason: "no labels given".into(),
                },
            )?,
            None => ClassRoster::default(),
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port: parse_or(&get, "PORT", 3000)?,
            provider,
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| "http://localhost:11434".into()),
            model: get("MODEL_NAME").unwrap_or_else(|| "gpt-4o-mini".into()),
            max_tokens,
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
            classes,
            rename_policy: parse_or(&get, "RENAME_POLICY", RenamePolicy::default())?,
            persona_file: get("PERSONA_FILE").map(PathBuf::from),
        })
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("test-key".into()),
            _ => None,
        })
        .unwrap()
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
