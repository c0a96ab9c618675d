//! Vision model seam and the HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::VisionError;

/// Base64-encoded image ready for an inline request part
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

/// External multimodal model capable of comparing two screenshots.
/// Returns the raw reply text; parsing happens upstream.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, prompt: &str, images: &[EncodedImage])
        -> Result<String, VisionError>;
}

#[derive(Debug, Clone)]
pub struct HttpVisionConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for HttpVisionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Vision model backed by a generateContent-style HTTP endpoint.
#[derive(Debug)]
pub struct HttpVisionModel {
    client: Client,
    config: HttpVisionConfig,
}

impl HttpVisionModel {
    pub fn new(config: HttpVisionConfig) -> Result<Self, VisionError> {
        if config.api_key.is_empty() {
            return Err(VisionError::InvalidConfig(
                "missing vision API key".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                VisionError::InvalidConfig(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl VisionModel for HttpVisionModel {
    async fn generate(
        &self,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, VisionError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        );

        let mut parts = vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }];
        for image in images {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                }),
            });
        }

        let body = GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                // Low temperature keeps replies consistent across runs
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| VisionError::CallFailed(format!("request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            return Err(VisionError::CallFailed(format!(
                "status {status}: {text}"
            )));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| VisionError::CallFailed(format!("invalid response body: {err}")))?;

        let text = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| VisionError::CallFailed("empty model reply".to_string()))?;

        debug!(model = %self.config.model, bytes = text.len(), "vision reply received");
        Ok(text)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ReplyContent,
}

#[derive(Deserialize)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_rejected() {
        let err = HttpVisionModel::new(HttpVisionConfig::default()).unwrap_err();
        assert!(matches!(err, VisionError::InvalidConfig(_)));
    }

    #[test]
    fn request_body_uses_camel_case_fields() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some("prompt".to_string()),
                    inline_data: Some(InlineData {
                        mime_type: "image/png".to_string(),
                        data: "AAAA".to_string(),
                    }),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 2048,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("generationConfig"));
        assert!(json.contains("inlineData"));
        assert!(json.contains("mimeType"));
        assert!(json.contains("maxOutputTokens"));
    }
}
