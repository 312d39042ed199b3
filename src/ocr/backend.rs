//! Capability abstraction over text-recognition engines.
//!
//! Three engines sit behind one trait:
//! - Tesseract: local OCR via command-line, returns raw text
//! - OCR service: remote OCR microservice over HTTP, returns raw text
//! - Gemini: remote vision model, returns the structured line protocol

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::image_source::LoadedImage;

/// Errors from extraction backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Rate limited by {backend}, retry after {retry_after_secs:?}s")]
    RateLimited {
        backend: BackendType,
        retry_after_secs: Option<u64>,
    },

    #[error("{backend} timed out after {secs}s")]
    Timeout { backend: BackendType, secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(String),
}

/// Shape of the text a backend returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Unstructured OCR output, one board line per text line.
    RawText,
    /// The `ORIGIN:`/`TYPE:`/`ROUTES:` line protocol.
    Protocol,
}

/// Result of running a backend on one image.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content.
    pub text: String,
    pub format: TextFormat,
    /// Confidence score (0.0 - 1.0), if the engine reports one.
    pub confidence: Option<f32>,
    /// Which backend produced this result.
    pub backend: BackendType,
    /// Which model was used (e.g., "gemini-1.5-flash").
    pub model: Option<String>,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Available backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendType {
    /// Tesseract OCR via command-line.
    Tesseract,
    /// Remote OCR microservice.
    OcrService,
    /// Google Gemini vision API.
    Gemini,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Tesseract => "tesseract",
            BackendType::OcrService => "ocr-service",
            BackendType::Gemini => "gemini",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tesseract" => Some(BackendType::Tesseract),
            "ocr-service" | "ocr_service" | "paddle" | "paddleocr" => Some(BackendType::OcrService),
            "gemini" => Some(BackendType::Gemini),
            _ => None,
        }
    }

    /// Whether this backend runs on another machine.
    pub fn is_remote(&self) -> bool {
        !matches!(self, BackendType::Tesseract)
    }

    /// `"remote"` or `"local"`, for reports.
    pub fn placement(&self) -> &'static str {
        if self.is_remote() {
            "remote"
        } else {
            "local"
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One image handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    pub image: &'a LoadedImage,
    /// Caller's guess at the board's origin, forwarded to models that take context.
    pub origin_hint: Option<&'a str>,
}

/// Trait for extraction backends.
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Get the backend type.
    fn backend_type(&self) -> BackendType;

    /// Check if this backend can be used.
    ///
    /// Must be cheap: configuration and local binaries only, never a network
    /// probe. The orchestrator calls this on every request.
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Model or engine identifier, if the backend has one.
    fn model(&self) -> Option<String> {
        None
    }

    /// Extract text from an image. Failures are returned, never retried here
    /// except for rate limiting inside remote backends.
    async fn extract(&self, request: BackendRequest<'_>) -> Result<OcrResult, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_names() {
        for backend in [BackendType::Tesseract, BackendType::OcrService, BackendType::Gemini] {
            assert_eq!(BackendType::from_str(backend.as_str()), Some(backend));
        }
        assert_eq!(BackendType::from_str("PaddleOCR"), Some(BackendType::OcrService));
        assert_eq!(BackendType::from_str("groq"), None);
    }

    #[test]
    fn test_remote_flag() {
        assert!(!BackendType::Tesseract.is_remote());
        assert!(BackendType::Gemini.is_remote());
        assert!(BackendType::OcrService.is_remote());
        assert_eq!(BackendType::Tesseract.placement(), "local");
        assert_eq!(BackendType::Gemini.placement(), "remote");
    }

    #[test]
    fn test_serialized_name() {
        let json = serde_json::to_string(&BackendType::OcrService).unwrap();
        assert_eq!(json, "\"ocr-service\"");
    }
}
