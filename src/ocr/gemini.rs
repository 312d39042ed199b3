//! Google Gemini vision backend.
//!
//! Sends the board photo to Gemini with a prompt that pins the answer to the
//! line protocol (`ORIGIN:`/`TYPE:`/`TIMES:`/`ROUTES:`/`END`), so the reply
//! can be parsed deterministically instead of scraped from prose.
//!
//! Requires `gemini.enabled = true` and an API key (`GEMINI_API_KEY`).
//!
//! Rate limiting:
//! - Set GEMINI_DELAY_MS to configure delay between requests (default: none)
//! - Automatically retries on 429 with exponential backoff
//! - Respects Retry-After header from API

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::api_backend::{
    apply_rate_delay, encode_image_base64, error_body, http_client, retry_on_rate_limit,
};
use super::backend::{
    BackendRequest, BackendType, ExtractionBackend, OcrError, OcrResult, TextFormat,
};
use crate::config::GeminiConfig;

/// Prompt establishing the reply format.
pub const TIMING_BOARD_PROMPT: &str = "\
You are reading a photo of a bus timing board from Tamil Nadu, India. \
Text may be Tamil, English or both. Always answer in English.

Reply with ONLY these lines, no markdown and no commentary:

ORIGIN:<station the board is posted at, or ->
TYPE:departure_board|route_schedule
TIMES:<comma-separated HH:MM departures when the board is a flat time list, else empty>
ROUTES:
<route number>|<destination>|<via stops comma-separated, or ->|<departure times HH:MM comma-separated, or ->|<bus type, or ->
END

Rules:
- Use 24-hour HH:MM (6:00 PM is 18:00). Drop seconds.
- காலை means morning, மாலை evening, இரவு night.
- Translate Tamil place names to English (மதுரை is MADURAI, சென்னை is CHENNAI).
- Use - for any field that is missing or unreadable.
- Extract every row you can see.";

/// Gemini vision backend using Google's Generative AI API.
pub struct GeminiBackend {
    config: GeminiConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    InlineData { inline_data: GeminiInlineData },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

impl GeminiBackend {
    /// Create a backend from config; `timeout` bounds each HTTP call.
    pub fn from_config(config: GeminiConfig, timeout: Duration) -> Result<Self, OcrError> {
        Ok(Self {
            client: http_client(BackendType::Gemini, timeout)?,
            config,
        })
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    /// Set the model (e.g., "gemini-1.5-flash", "gemini-1.5-pro").
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(&self, request: &BackendRequest<'_>) -> GeminiRequest {
        let (data, mime_type) = encode_image_base64(request.image);
        GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![
                    GeminiPart::Text {
                        text: build_prompt(request.origin_hint),
                    },
                    GeminiPart::InlineData {
                        inline_data: GeminiInlineData { mime_type, data },
                    },
                ],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.1,
                max_output_tokens: 8192,
            },
        }
    }
}

/// The fixed prompt, prefixed with the caller's origin hint when there is one.
pub fn build_prompt(origin_hint: Option<&str>) -> String {
    match origin_hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => format!(
            "Context from the person who took the photo: the board is at {}. \
             Use this as ORIGIN unless the board clearly says otherwise.\n\n{}",
            hint, TIMING_BOARD_PROMPT
        ),
        None => TIMING_BOARD_PROMPT.to_string(),
    }
}

/// Concatenate the text parts of the first candidate.
fn response_text(response: GeminiResponse) -> Result<String, OcrError> {
    if let Some(error) = response.error {
        return Err(OcrError::OcrFailed(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    let text: String = response
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(OcrError::OcrFailed("Gemini returned no text".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl ExtractionBackend for GeminiBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Gemini
    }

    fn is_available(&self) -> bool {
        self.config.enabled && self.api_key().is_some()
    }

    fn availability_hint(&self) -> String {
        if !self.config.enabled {
            "Gemini disabled. Set GEMINI_ENABLED=true or [gemini] enabled = true".to_string()
        } else if self.api_key().is_none() {
            "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string()
        } else {
            format!("Gemini Vision is available (model: {})", self.config.model)
        }
    }

    fn model(&self) -> Option<String> {
        Some(self.config.model.clone())
    }

    async fn extract(&self, request: BackendRequest<'_>) -> Result<OcrResult, OcrError> {
        let api_key = self.api_key().ok_or_else(|| {
            OcrError::BackendNotAvailable(
                "GEMINI_API_KEY not set. Get an API key from https://ai.google.dev/".to_string(),
            )
        })?;

        let start = Instant::now();
        let body = self.build_request(&request);
        let url = self.url();

        apply_rate_delay(self.config.delay_ms, BackendType::Gemini).await;

        let response = retry_on_rate_limit(BackendType::Gemini, self.config.max_retries, || {
            self.client
                .post(&url)
                .query(&[("key", api_key)])
                .json(&body)
                .send()
        })
        .await?;

        if !response.status().is_success() {
            return Err(OcrError::OcrFailed(format!(
                "Gemini API error ({})",
                error_body(response).await
            )));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("Failed to parse response: {}", e)))?;
        let text = response_text(parsed)?;

        let elapsed = start.elapsed();
        debug!(
            "Gemini returned {} chars in {}ms",
            text.len(),
            elapsed.as_millis()
        );

        Ok(OcrResult {
            text,
            format: TextFormat::Protocol,
            confidence: None,
            backend: BackendType::Gemini,
            model: Some(self.config.model.clone()),
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_source::LoadedImage;

    fn backend(config: GeminiConfig) -> GeminiBackend {
        GeminiBackend::from_config(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_availability_is_config_only() {
        let disabled = backend(GeminiConfig::default()).with_api_key("k");
        assert!(!disabled.is_available());

        let enabled_no_key = backend(GeminiConfig {
            enabled: true,
            ..Default::default()
        });
        assert!(!enabled_no_key.is_available());
        assert!(enabled_no_key.availability_hint().contains("GEMINI_API_KEY"));

        let blank_key = backend(GeminiConfig {
            enabled: true,
            ..Default::default()
        })
        .with_api_key("   ");
        assert!(!blank_key.is_available());

        let ready = backend(GeminiConfig {
            enabled: true,
            ..Default::default()
        })
        .with_api_key("k");
        assert!(ready.is_available());
        assert_eq!(ready.model().as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn test_url() {
        let b = backend(GeminiConfig::default()).with_model("gemini-1.5-pro");
        assert_eq!(
            b.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let image = LoadedImage::from_gray(image::GrayImage::new(2, 2)).unwrap();
        let b = backend(GeminiConfig::default());
        let request = b.build_request(&BackendRequest {
            image: &image,
            origin_hint: Some("Madurai"),
        });

        let json = serde_json::to_value(&request).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert!(parts[0]["text"].as_str().unwrap().contains("board is at Madurai"));
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        assert!(json["generationConfig"]["maxOutputTokens"].is_number());
    }

    #[test]
    fn test_prompt_without_hint() {
        assert_eq!(build_prompt(None), TIMING_BOARD_PROMPT);
        assert_eq!(build_prompt(Some("  ")), TIMING_BOARD_PROMPT);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GeminiResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"ORIGIN:SALEM\n"},{"text":"END"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "ORIGIN:SALEM\nEND");
    }

    #[test]
    fn test_response_error_and_empty() {
        let response: GeminiResponse =
            serde_json::from_str(r#"{"error":{"message":"quota exceeded"}}"#).unwrap();
        assert!(response_text(response)
            .unwrap_err()
            .to_string()
            .contains("quota exceeded"));

        let response: GeminiResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(response_text(response).is_err());
    }
}
