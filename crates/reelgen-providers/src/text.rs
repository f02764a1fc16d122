//! Text generation client.
//!
//! Text generation is a single synchronous call, so it sits outside the
//! job contract and is exposed through [`TextGenerator`] instead.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, check_response};
use crate::metrics;

const PROVIDER: &str = "gemini";

/// One text generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    pub system: String,
    pub prompt: String,
    /// Ask the model for a JSON response body.
    pub json_output: bool,
    pub temperature: f32,
}

impl TextRequest {
    pub fn json(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            json_output: true,
            temperature: 0.7,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Prompt in, raw model text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: &TextRequest) -> ProviderResult<String>;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Models tried in order until one answers.
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-flash-lite".to_string(),
                "gemini-2.5-pro".to_string(),
            ],
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        if !models.is_empty() {
            self.models = models;
        }
        self
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini `generateContent` client with model fallback.
pub struct GeminiTextGenerator {
    http: Client,
    config: GeminiConfig,
}

impl GeminiTextGenerator {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::config("GEMINI_API_KEY not set"));
        }
        Ok(Self {
            http: build_client(config.timeout)?,
            config,
        })
    }

    async fn call_model(&self, model: &str, request: &TextRequest) -> ProviderResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );

        let system = request.system.trim();
        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            system_instruction: (!system.is_empty()).then(|| Content {
                parts: vec![Part { text: system }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.json_output.then_some("application/json"),
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let response = check_response(PROVIDER, response).await?;
        let parsed: GeminiResponse = response.json().await?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::invalid_response(
                PROVIDER,
                format!("{} returned no text", model),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiTextGenerator {
    async fn complete(&self, request: &TextRequest) -> ProviderResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            match self.call_model(model, request).await {
                Ok(text) => {
                    metrics::record_submit(PROVIDER);
                    info!(model = %model, chars = text.len(), "Text generation succeeded");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Text generation failed, trying next model");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ProviderError::config("no text generation models configured")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        }))
    }

    #[tokio::test]
    async fn test_complete_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(reply(r#"{"mode":"ambience"}"#))
            .mount(&server)
            .await;

        let generator =
            GeminiTextGenerator::new(GeminiConfig::new("g-key").with_base_url(server.uri()))
                .unwrap();
        let text = generator
            .complete(&TextRequest::json("You are a director.", "beach at sunset"))
            .await
            .unwrap();
        assert_eq!(text, r#"{"mode":"ambience"}"#);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/primary:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/backup:generateContent"))
            .respond_with(reply("ok"))
            .mount(&server)
            .await;

        let config = GeminiConfig::new("g-key")
            .with_base_url(server.uri())
            .with_models(vec!["primary".into(), "backup".into()]);
        let generator = GeminiTextGenerator::new(config).unwrap();
        let text = generator
            .complete(&TextRequest::json("", "hello"))
            .await
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_all_models_fail_returns_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let config = GeminiConfig::new("g-key")
            .with_base_url(server.uri())
            .with_models(vec!["only".into()]);
        let err = GeminiTextGenerator::new(config)
            .unwrap()
            .complete(&TextRequest::json("", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Request { status: 400, .. }));
    }
}
