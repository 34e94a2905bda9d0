//! OCR provider backed by an external vision endpoint (e.g. Ollama with a
//! vision model).

use async_trait::async_trait;
use cairn_core::{defaults, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::provider::{VisionOutcome, VisionProvider};

const OCR_PROMPT: &str =
    "Extract all readable text from this image. Respond with the extracted text only, \
     or an empty response if the image contains no text.";

/// Vision provider that posts images to an Ollama-compatible endpoint.
pub struct HttpOcrProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
    timeout_secs: u64,
}

impl HttpOcrProvider {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            timeout_secs: defaults::VISION_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Create from environment variables.
    /// Returns None if VISION_OCR_URL is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var(defaults::ENV_VISION_OCR_URL).ok()?;
        if base_url.is_empty() {
            return None;
        }
        let model = std::env::var(defaults::ENV_VISION_OCR_MODEL)
            .unwrap_or_else(|_| defaults::DEFAULT_VISION_OCR_MODEL.to_string());
        Some(Self::new(base_url, model))
    }

    /// Get the model name being used.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Check if the vision endpoint is reachable.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    async fn request_text(&self, image: &[u8]) -> Result<String> {
        use base64::Engine;
        let image_b64 = base64::engine::general_purpose::STANDARD.encode(image);

        let request = OcrGenerateRequest {
            model: self.model.clone(),
            prompt: OCR_PROMPT.to_string(),
            images: vec![image_b64],
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Request(format!("Vision request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "Vision endpoint returned {}: {}",
                status, body
            )));
        }

        let result: OcrGenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("Failed to parse vision response: {}", e)))?;

        Ok(result.response)
    }
}

#[derive(Serialize)]
struct OcrGenerateRequest {
    model: String,
    prompt: String,
    images: Vec<String>, // base64 encoded
    stream: bool,
}

#[derive(Deserialize)]
struct OcrGenerateResponse {
    response: String,
}

#[async_trait]
impl VisionProvider for HttpOcrProvider {
    fn name(&self) -> &str {
        "HttpOcrProvider"
    }

    async fn analyze(&self, image: &[u8], _content_type: &str) -> VisionOutcome {
        match self.request_text(image).await {
            Ok(raw) => {
                let text = raw.trim().to_string();
                info!(
                    subsystem = "vision",
                    provider = self.name(),
                    model = %self.model,
                    chars = text.len(),
                    "OCR extraction complete"
                );
                let labels = if text.is_empty() {
                    Vec::new()
                } else {
                    vec!["document".to_string(), "text".to_string()]
                };
                VisionOutcome::success(text, labels)
            }
            Err(e) => {
                error!(
                    subsystem = "vision",
                    provider = self.name(),
                    model = %self.model,
                    error = %e,
                    "OCR extraction failed"
                );
                VisionOutcome::failure(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_ocr_provider_new() {
        let provider = HttpOcrProvider::new(
            "http://localhost:11434".to_string(),
            "qwen3-vl:8b".to_string(),
        );
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.model, "qwen3-vl:8b");
        assert_eq!(provider.timeout_secs, defaults::VISION_REQUEST_TIMEOUT_SECS);
        assert_eq!(provider.model_name(), "qwen3-vl:8b");
    }

    #[test]
    fn test_ocr_generate_request_serialization() {
        let request = OcrGenerateRequest {
            model: "qwen3-vl:8b".to_string(),
            prompt: "Extract text".to_string(),
            images: vec!["base64data".to_string()],
            stream: false,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "qwen3-vl:8b");
        assert_eq!(json["prompt"], "Extract text");
        assert_eq!(json["images"][0], "base64data");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_ocr_generate_response_deserialization() {
        let json = r#"{"response": "Meeting notes from Tuesday"}"#;
        let response: OcrGenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.response, "Meeting notes from Tuesday");
    }
}
