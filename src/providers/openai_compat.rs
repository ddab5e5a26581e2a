//! OpenAI-compatible provider
//!
//! Works with any API that implements the OpenAI chat completions format:
//! - OpenAI (api.openai.com)
//! - Groq (api.groq.com)
//! - vLLM (local server)
//! - LM Studio (local server)
//!
//! # Configuration
//!
//! ```text
//! LLM_PROVIDER=openai
//! OPENAI_BASE_URL=https://api.openai.com/v1
//! OPENAI_API_KEY=sk-...
//! MODEL_NAME=gpt-4o-mini
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

use super::{CompletionOptions, CompletionProvider, ProviderError};

/// OpenAI-compatible chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role.as_str().to_string(),
            content: turn.content.clone(),
        }
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error response from API
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone)]
pub struct OpenAICompatConfig {
    /// Base URL for the API (e.g., https://api.openai.com/v1)
    pub base_url: String,
    /// API key (optional for local servers)
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for OpenAICompatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// OpenAI-compatible API provider
pub struct OpenAICompatProvider {
    config: OpenAICompatConfig,
    client: Client,
}

impl OpenAICompatProvider {
    pub fn new(config: OpenAICompatConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn build_request(&self, turns: &[Turn], options: CompletionOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: turns.iter().map(ChatMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        turns: &[Turn],
        options: CompletionOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let request = self.build_request(turns, options);

        let mut req_builder = self.client.post(&url);
        if let Some(ref api_key) = self.config.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_request(e, self.config.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_request(e, self.config.timeout))?;

        parse_completion(status, &body)
    }
}

/// Turn an HTTP status and body into the reply text.
fn parse_completion(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::QuotaExceeded(detail));
        }
        return Err(ProviderError::InvalidResponse(format!(
            "HTTP {}: {}",
            status, detail
        )));
    }

    let completion: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Failed to parse response: {} - Body: {}", e, body))
    })?;

    completion
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| ProviderError::InvalidResponse("No reply text in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;

    #[test]
    fn test_message_conversion() {
        let turn = Turn {
            role: Role::User,
            content: "Hello".to_string(),
        };
        let chat_msg = ChatMessage::from(&turn);
        assert_eq!(chat_msg.role, "user");
        assert_eq!(chat_msg.content, "Hello");
    }

    #[test]
    fn test_request_carries_options() {
        let provider = OpenAICompatProvider::new(OpenAICompatConfig::default()).unwrap();
        let turns = vec![
            Turn {
                role: Role::System,
                content: "be nice".to_string(),
            },
            Turn {
                role: Role::User,
                content: "hi".to_string(),
            },
        ];

        let request = provider.build_request(
            &turns,
            CompletionOptions {
                max_tokens: 120,
                temperature: 0.3,
            },
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 120);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_parse_success() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"It's a waxing moon!"}}]}"#;
        assert_eq!(
            parse_completion(StatusCode::OK, body).unwrap(),
            "It's a waxing moon!"
        );
    }

    #[test]
    fn test_parse_quota_error() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota"}}"#;
        let err = parse_completion(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        assert!(matches!(err, ProviderError::QuotaExceeded(ref m) if m.contains("quota")));
    }

    #[test]
    fn test_parse_malformed_and_empty() {
        assert!(matches!(
            parse_completion(StatusCode::OK, "not json"),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion(StatusCode::OK, r#"{"choices":[]}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion(StatusCode::OK, r#"{"choices":[{"message":{"content":"  "}}]}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion(StatusCode::UNAUTHORIZED, "denied"),
            Err(ProviderError::InvalidResponse(ref m)) if m.contains("401")
        ));
    }
}
