use anyhow::{anyhow, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::client::{ChunkStream, GenerativeClient};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
}

/// Client for Google's Generative Language API.
///
/// Model name, API key and generation parameters are fixed at construction;
/// the handle is cheap to clone and safe to share.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: temperature.clamp(0.0, 1.0),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Same credentials and parameters, different model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models?key={}", API_BASE, self.api_key);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("Failed to list models: {}", response.status()));
        }

        let models_response: ModelsResponse = response.json().await?;
        let model_names: Vec<String> = models_response
            .models
            .into_iter()
            .map(|model| {
                model
                    .name
                    .strip_prefix("models/")
                    .map(str::to_string)
                    .unwrap_or(model.name)
            })
            .collect();

        Ok(model_names)
    }

    fn request_body(&self, prompt: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl GenerativeClient for GeminiClient {
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            API_BASE, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error {}: {}", status, text.trim()));
        }

        let mut bytes = response.bytes_stream();

        let stream = try_stream! {
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = chunk?;
                pending.extend_from_slice(&chunk);

                // Events arrive as newline-delimited "data: {json}" lines;
                // a network read may split a line, so keep the tail buffered.
                while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    if let Some(payload) = sse_data(line.trim_end()) {
                        if let Some(text) = chunk_text(payload)? {
                            yield text;
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Extracts the payload of an SSE `data:` line, if this line is one.
fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Pulls the generated text out of one streamed response payload.
///
/// Returns `Ok(None)` for keep-alive events that carry no text and an error
/// for malformed payloads or an in-stream API error envelope.
fn chunk_text(payload: &str) -> Result<Option<String>> {
    let response: GenerateResponse = serde_json::from_str(payload)?;

    if let Some(error) = response.error {
        return Err(anyhow!("Gemini API error: {}", error.message));
    }

    let text: String = response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .map(|part| part.text.as_str())
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_data_strips_prefix() {
        assert_eq!(sse_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_data("data:{\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(sse_data(""), None);
        assert_eq!(sse_data(": keep-alive"), None);
    }

    #[test]
    fn chunk_text_extracts_candidate_parts() {
        let payload = r#"{"candidates":[{"content":{"parts":[{"text":"Plants "},{"text":"convert "}],"role":"model"}}]}"#;
        assert_eq!(chunk_text(payload).unwrap(), Some("Plants convert ".to_string()));
    }

    #[test]
    fn chunk_text_skips_empty_events() {
        let payload = r#"{"candidates":[{"content":{"parts":[],"role":"model"}}]}"#;
        assert_eq!(chunk_text(payload).unwrap(), None);

        let payload = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        assert_eq!(chunk_text(payload).unwrap(), None);
    }

    #[test]
    fn chunk_text_surfaces_error_envelope() {
        let payload = r#"{"error":{"code":429,"message":"quota exceeded"}}"#;
        let err = chunk_text(payload).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn chunk_text_rejects_malformed_payload() {
        assert!(chunk_text("not json").is_err());
    }

    #[test]
    fn request_body_uses_camel_case_generation_config() {
        let client = GeminiClient::new("key", "gemini-pro", 0.7);
        let body = serde_json::to_value(client.request_body("hi")).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn temperature_is_clamped() {
        assert_eq!(GeminiClient::new("k", "m", 3.0).temperature, 1.0);
        assert_eq!(GeminiClient::new("k", "m", -1.0).temperature, 0.0);
    }

    #[test]
    fn with_model_keeps_credentials() {
        let client = GeminiClient::new("key", "gemini-pro", 0.5);
        let flash = client.with_model("gemini-1.5-flash");
        assert_eq!(flash.model(), "gemini-1.5-flash");
        assert_eq!(flash.api_key, "key");
        assert_eq!(flash.temperature, 0.5);
    }
}
