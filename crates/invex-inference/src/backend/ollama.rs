//! Ollama backend using the raw `/api/generate` endpoint.
//!
//! The prompt arrives already wrapped in the model's chat template, so
//! requests are sent with `raw: true` and the server applies no template of
//! its own. Guided decoding maps to the `format` field, which accepts a JSON
//! Schema.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::InferenceError;
use crate::request::{Completion, ImageInput, SamplingParams};
use crate::{InferenceBackend, Result};

/// Connection settings for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server base URL, e.g. `http://localhost:11434`.
    pub base_url: String,

    /// Model tag served by Ollama.
    pub model: String,

    /// Bearer token for servers behind an authenticating proxy.
    pub api_token: Option<String>,

    /// Maximum number of requests in flight.
    pub max_in_flight: usize,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5vl:7b".to_string(),
            api_token: None,
            max_in_flight: 4,
            timeout: Duration::from_secs(600),
        }
    }
}

/// Backend generating completions through an Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    config: OllamaConfig,
    endpoint: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    raw: bool,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a serde_json::Value>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
    #[serde(default)]
    done_reason: Option<String>,
}

impl OllamaBackend {
    /// Create a backend from connection settings.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(InferenceError::InvalidInput("model name is empty".to_string()));
        }
        if config.max_in_flight == 0 {
            return Err(InferenceError::InvalidInput(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::ClientCreate(e.to_string()))?;

        let endpoint = format!("{}/api/generate", config.base_url.trim_end_matches('/'));
        debug!("Ollama endpoint: {}", endpoint);

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Full URL of the generate endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(
        &'a self,
        prompt: &'a str,
        image: &ImageInput,
        params: &'a SamplingParams,
    ) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.config.model,
            prompt,
            images: vec![image.to_base64()],
            raw: true,
            stream: false,
            format: params.guided_json.as_ref(),
            options: GenerateOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
                num_ctx: params.context_length,
            },
        }
    }

    async fn generate_one(
        &self,
        index: usize,
        prompt: &str,
        image: &ImageInput,
        params: &SamplingParams,
    ) -> Result<Completion> {
        let body = self.build_request(prompt, image, params);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| InferenceError::Transport {
            url: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(|e| InferenceError::Transport {
            url: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let completion = parse_response(&text)?;
        debug!(
            "Completion {} finished: tokens={:?}",
            index, completion.tokens
        );
        Ok(completion)
    }
}

/// Decode a non-streaming `/api/generate` response body.
fn parse_response(body: &str) -> Result<Completion> {
    let parsed: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| InferenceError::InvalidResponse(e.to_string()))?;

    if parsed.done_reason.as_deref() == Some("length") {
        debug!("Completion stopped at the token limit");
    }

    let mut completion = Completion::new(parsed.response);
    if let Some(tokens) = parsed.eval_count {
        completion = completion.with_tokens(tokens);
    }
    Ok(completion)
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(
        &self,
        prompt: &str,
        images: &[ImageInput],
        params: &SamplingParams,
    ) -> Result<Vec<Completion>> {
        let permits = Semaphore::new(self.config.max_in_flight);
        let requests = images.iter().enumerate().map(|(index, image)| {
            let permits = &permits;
            async move {
                let _permit = permits
                    .acquire()
                    .await
                    .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
                self.generate_one(index, prompt, image, params).await
            }
        });

        // Results come back in input order, whatever order requests finish in.
        let completions = try_join_all(requests).await?;

        if completions.len() != images.len() {
            return Err(InferenceError::CountMismatch {
                expected: images.len(),
                actual: completions.len(),
            });
        }

        Ok(completions)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn backend() -> OllamaBackend {
        OllamaBackend::new(OllamaConfig {
            base_url: "http://inference.local:11434/".to_string(),
            model: "qwen2.5vl:7b".to_string(),
            ..OllamaConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(backend().endpoint(), "http://inference.local:11434/api/generate");
    }

    #[test]
    fn test_rejects_invalid_config() {
        let empty_model = OllamaConfig {
            model: " ".to_string(),
            ..OllamaConfig::default()
        };
        assert!(matches!(
            OllamaBackend::new(empty_model),
            Err(InferenceError::InvalidInput(_))
        ));

        let no_slots = OllamaConfig {
            max_in_flight: 0,
            ..OllamaConfig::default()
        };
        assert!(OllamaBackend::new(no_slots).is_err());
    }

    #[test]
    fn test_request_body() {
        let backend = backend();
        let image = ImageInput::new(b"abc".to_vec());
        let params = SamplingParams {
            max_tokens: 512,
            temperature: 0.0,
            context_length: 2048,
            guided_json: Some(serde_json::json!({"type": "object"})),
        };

        let body = serde_json::to_value(backend.build_request("PROMPT", &image, &params)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "model": "qwen2.5vl:7b",
                "prompt": "PROMPT",
                "images": ["YWJj"],
                "raw": true,
                "stream": false,
                "format": {"type": "object"},
                "options": {"temperature": 0.0, "num_predict": 512, "num_ctx": 2048}
            })
        );
    }

    #[test]
    fn test_request_body_without_schema() {
        let backend = backend();
        let image = ImageInput::new(vec![0u8; 4]);
        let params = SamplingParams::default();

        let body = serde_json::to_value(backend.build_request("p", &image, &params)).unwrap();
        assert!(body.get("format").is_none());
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{"model":"qwen2.5vl:7b","response":"{\"total\": 1}","done":true,"done_reason":"stop","eval_count":7}"#;
        let completion = parse_response(body).unwrap();
        assert_eq!(completion, Completion::new("{\"total\": 1}").with_tokens(7));
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(
            parse_response("<html>bad gateway</html>"),
            Err(InferenceError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_requests() {
        let completions = backend()
            .generate("p", &[], &SamplingParams::default())
            .await
            .unwrap();
        assert!(completions.is_empty());
    }
}
