//! Remote OCR microservice backend.
//!
//! Talks to a standalone OCR service (PaddleOCR with Tamil and English
//! models) over HTTP:
//! - `POST {url}/extract`, multipart field `file`, returns recognised text
//! - `GET {url}/health`, liveness probe used by `timingboard check`
//!
//! The service returns plain OCR text, so its output goes through the
//! raw-text board parser like tesseract's does.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use super::api_backend::{error_body, http_client};
use super::backend::{
    BackendRequest, BackendType, ExtractionBackend, OcrError, OcrResult, TextFormat,
};
use crate::config::OcrServiceConfig;

/// Body of `POST /extract`.
#[derive(Debug, Deserialize)]
struct ExtractResponse {
    success: bool,
    #[serde(default)]
    extracted_text: String,
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    error: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy") || self.status.eq_ignore_ascii_case("ok")
    }

    /// One-line status such as `paddleocr: healthy (ta, en)`.
    pub fn summary(&self) -> String {
        let mut line = match &self.service {
            Some(service) => format!("{}: {}", service, self.status),
            None => self.status.clone(),
        };
        if !self.languages.is_empty() {
            line.push_str(&format!(" ({})", self.languages.join(", ")));
        }
        line
    }
}

/// Remote OCR microservice backend.
pub struct OcrServiceBackend {
    config: OcrServiceConfig,
    client: reqwest::Client,
}

impl OcrServiceBackend {
    /// Create a backend from config; `timeout` bounds each HTTP call.
    pub fn from_config(config: OcrServiceConfig, timeout: Duration) -> Result<Self, OcrError> {
        Ok(Self {
            client: http_client(BackendType::OcrService, timeout)?,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    /// Probe the service. Network call; not used for fallback decisions.
    pub async fn health_check(&self) -> Result<ServiceHealth, OcrError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .send()
            .await
            .map_err(|e| OcrError::BackendNotAvailable(format!("OCR service unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(OcrError::BackendNotAvailable(format!(
                "OCR service unhealthy ({})",
                error_body(response).await
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("Failed to parse health response: {}", e)))
    }
}

/// Turn a service reply into text, treating `success: false` as a failure.
fn response_text(response: ExtractResponse) -> Result<(String, Option<f32>), OcrError> {
    if !response.success {
        return Err(OcrError::OcrFailed(format!(
            "OCR service error: {}",
            response.error.as_deref().unwrap_or("unknown error")
        )));
    }

    let text = if response.extracted_text.trim().is_empty() {
        response.lines.join("\n")
    } else {
        response.extracted_text
    };
    Ok((text, response.confidence))
}

#[async_trait]
impl ExtractionBackend for OcrServiceBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::OcrService
    }

    fn is_available(&self) -> bool {
        self.config.enabled && !self.config.url.trim().is_empty()
    }

    fn availability_hint(&self) -> String {
        if !self.config.enabled {
            "OCR service disabled. Set OCR_SERVICE_ENABLED=true".to_string()
        } else if self.config.url.trim().is_empty() {
            "OCR_SERVICE_URL not set".to_string()
        } else {
            format!("OCR service configured at {}", self.config.url)
        }
    }

    async fn extract(&self, request: BackendRequest<'_>) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let image = request.image;

        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("board.{}", image.extension()))
            .mime_str(&image.mime_type)
            .map_err(|e| OcrError::ImageError(format!("invalid MIME type: {}", e)))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("extract"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("OCR service request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(OcrError::OcrFailed(format!(
                "OCR service error ({})",
                error_body(response).await
            )));
        }

        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| OcrError::OcrFailed(format!("Failed to parse response: {}", e)))?;
        let (text, confidence) = response_text(parsed)?;

        let elapsed = start.elapsed();
        debug!(
            "OCR service returned {} lines in {}ms",
            text.lines().count(),
            elapsed.as_millis()
        );

        Ok(OcrResult {
            text,
            format: TextFormat::RawText,
            confidence,
            backend: BackendType::OcrService,
            model: None,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(enabled: bool, url: &str) -> OcrServiceBackend {
        OcrServiceBackend::from_config(
            OcrServiceConfig {
                enabled,
                url: url.to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_availability() {
        assert!(!backend(false, "http://localhost:8081").is_available());
        assert!(!backend(true, " ").is_available());
        assert!(backend(true, "http://localhost:8081").is_available());
    }

    #[test]
    fn test_endpoint_joins_cleanly() {
        let b = backend(true, "http://ocr:8081/");
        assert_eq!(b.endpoint("extract"), "http://ocr:8081/extract");
    }

    #[test]
    fn test_response_text() {
        let ok: ExtractResponse = serde_json::from_str(
            r#"{"success":true,"extracted_text":"MADURAI 06:00","lines":["MADURAI 06:00"],"confidence":0.91,"details":[]}"#,
        )
        .unwrap();
        let (text, confidence) = response_text(ok).unwrap();
        assert_eq!(text, "MADURAI 06:00");
        assert_eq!(confidence, Some(0.91));

        let lines_only: ExtractResponse =
            serde_json::from_str(r#"{"success":true,"lines":["SALEM","07:00"]}"#).unwrap();
        assert_eq!(response_text(lines_only).unwrap().0, "SALEM\n07:00");
    }

    #[test]
    fn test_unsuccessful_response_is_error() {
        let failed: ExtractResponse =
            serde_json::from_str(r#"{"success":false,"error":"model not loaded"}"#).unwrap();
        let err = response_text(failed).unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[test]
    fn test_health_status() {
        let health: ServiceHealth =
            serde_json::from_str(r#"{"status":"healthy","service":"paddleocr","languages":["ta","en"]}"#)
                .unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.languages, vec!["ta", "en"]);
        assert_eq!(health.summary(), "paddleocr: healthy (ta, en)");
    }

    #[test]
    fn test_health_summary_without_service_name() {
        let health: ServiceHealth = serde_json::from_str(r#"{"status":"loading"}"#).unwrap();
        assert!(!health.is_healthy());
        assert_eq!(health.service, None);
        assert_eq!(health.summary(), "loading");
    }
}
