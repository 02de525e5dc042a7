//! Inference backend boundary.
//!
//! The engine treats the model runtime as a capability with one operation:
//! given a batch of (prompt, image) pairs and sampling options, return one
//! text completion per input, order-preserving. Everything behind that line
//! (tokenization, chat templating, device placement) is the backend's
//! business.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{EditsetError, Result};

/// Sampling configuration forwarded to the backend. Deterministic-leaning,
/// not greedy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1024,
        }
    }
}

/// One rendered prompt paired with its decoded-and-revalidated image bytes.
#[derive(Debug, Clone)]
pub struct VlmRequest {
    pub prompt: String,
    pub image_bytes: Vec<u8>,
    pub mime: &'static str,
}

/// Batch text generation against a multimodal model.
///
/// Implementations must return exactly one completion per request, in
/// request order; the engine maps outputs back to records positionally.
pub trait VlmBackend {
    /// Human-readable name used for diagnostics.
    fn name(&self) -> &'static str;

    /// Generate one completion per request. A failure fails the whole batch;
    /// per-item recovery is the caller's concern.
    fn generate(&self, requests: &[VlmRequest], sampling: &SamplingOptions)
    -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Backend speaking the OpenAI-compatible `chat/completions` protocol, as
/// served by common VLM inference servers.
pub struct OpenAiBackend {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OpenAiBackend {
    /// Connect to `endpoint` (e.g. `http://127.0.0.1:8000/v1`) and verify it
    /// is reachable. Initialisation failure is fatal for the run.
    pub fn connect(endpoint: &str, model: &str) -> Result<Self> {
        // No request timeout: a batch may legitimately take minutes, and the
        // orchestrator applies no cancellation of its own.
        let http = reqwest::blocking::Client::builder()
            .timeout(None)
            .build()?;

        let endpoint = endpoint.trim_end_matches('/').to_string();
        let probe = format!("{endpoint}/models");
        http.get(&probe)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| EditsetError::Backend {
                reason: format!("backend unreachable at {probe}: {err}"),
            })?;

        tracing::info!(endpoint = %endpoint, model, "backend connected");
        Ok(Self {
            http,
            endpoint,
            model: model.to_string(),
        })
    }

    /// Request body for one work item: a single user turn carrying the image
    /// as a base64 data URL followed by the rendered prompt text.
    fn chat_payload(&self, request: &VlmRequest, sampling: &SamplingOptions) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            request.mime,
            BASE64.encode(&request.image_bytes)
        );
        json!({
            "model": self.model,
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": data_url } },
                    { "type": "text", "text": request.prompt },
                ],
            }],
        })
    }

    fn complete_one(&self, request: &VlmRequest, sampling: &SamplingOptions) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);
        let response: ChatCompletionResponse = self
            .http
            .post(&url)
            .json(&self.chat_payload(request, sampling))
            .send()?
            .error_for_status()?
            .json()?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| EditsetError::Backend {
                reason: "completion response carried no choices".into(),
            })
    }
}

impl VlmBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai-compat"
    }

    fn generate(
        &self,
        requests: &[VlmRequest],
        sampling: &SamplingOptions,
    ) -> Result<Vec<String>> {
        let mut outputs = Vec::with_capacity(requests.len());
        for request in requests {
            outputs.push(self.complete_one(request, sampling)?);
        }
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_backend() -> OpenAiBackend {
        OpenAiBackend {
            http: reqwest::blocking::Client::new(),
            endpoint: "http://127.0.0.1:8000/v1".to_string(),
            model: "qwen2-vl-7b".to_string(),
        }
    }

    #[test]
    fn chat_payload_carries_one_image_and_the_prompt() {
        let backend = test_backend();
        let request = VlmRequest {
            prompt: "describe the edit".to_string(),
            image_bytes: vec![0xFF, 0xD8, 0xFF],
            mime: "image/jpeg",
        };
        let payload = backend.chat_payload(&request, &SamplingOptions::default());

        assert_eq!(payload["model"], "qwen2-vl-7b");
        assert_eq!(payload["max_tokens"], 1024);
        let content = payload["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        let url = content[0]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(content[1]["text"], "describe the edit");
    }

    #[test]
    fn sampling_defaults_are_deterministic_leaning() {
        let sampling = SamplingOptions::default();
        assert!(sampling.temperature > 0.0 && sampling.temperature < 0.5);
    }
}
