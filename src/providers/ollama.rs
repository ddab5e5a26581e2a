//! Ollama provider implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;

use super::{CompletionOptions, CompletionProvider, ProviderError};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url,
            model,
            timeout,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        turns: &[Turn],
        options: CompletionOptions,
    ) -> Result<String, ProviderError> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: turns
                .iter()
                .map(|t| OllamaMessage {
                    role: t.role.as_str().to_string(),
                    content: t.content.clone(),
                })
                .collect(),
            stream: false,
            options: OllamaOptions {
                num_predict: options.max_tokens,
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url.trim_end_matches('/')))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_request(e, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_request(e, self.timeout))?;
        parse_reply(status, &body)
    }
}

fn parse_reply(status: StatusCode, body: &str) -> Result<String, ProviderError> {
    if !status.is_success() {
        return Err(ProviderError::InvalidResponse(format!("{}: {}", status, body)));
    }

    let ollama_response: OllamaResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

    let content = ollama_response.message.content;
    if content.trim().is_empty() {
        return Err(ProviderError::InvalidResponse("Empty reply".to_string()));
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let body = r#"{"model":"llama3.2","message":{"role":"assistant","content":"Full moon tonight!"},"done":true}"#;
        assert_eq!(parse_reply(StatusCode::OK, body).unwrap(), "Full moon tonight!");
    }

    #[test]
    fn test_parse_empty_reply() {
        let body = r#"{"message":{"role":"assistant","content":""}}"#;
        assert!(matches!(
            parse_reply(StatusCode::OK, body),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_error_status_keeps_body() {
        let err = parse_reply(StatusCode::NOT_FOUND, r#"{"error":"model 'llama9' not found"}"#)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("404"), "{}", message);
        assert!(message.contains("model 'llama9' not found"), "{}", message);
    }
}
