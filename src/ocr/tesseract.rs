//! Tesseract OCR backend implementation.
//!
//! Uses Tesseract OCR via command-line. Configured for boards printed in
//! English and Tamil, with a character whitelist that keeps the recogniser
//! away from look-alike glyphs outside those scripts.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::backend::{
    BackendRequest, BackendType, ExtractionBackend, OcrError, OcrResult, TextFormat,
};
use crate::config::TesseractConfig;

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Tesseract OCR backend.
#[derive(Debug, Clone)]
pub struct TesseractBackend {
    config: TesseractConfig,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self::with_config(TesseractConfig::default())
    }

    pub fn with_config(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Language packs missing from the configured tessdata directory.
    fn missing_languages(&self) -> Vec<String> {
        let dir = &self.config.tessdata_dir;
        if !dir.is_dir() {
            return Vec::new();
        }
        self.config
            .languages
            .split('+')
            .filter(|lang| !dir.join(format!("{}.traineddata", lang)).exists())
            .map(str::to_string)
            .collect()
    }

    /// Arguments after the input path.
    fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "stdout".to_string(),
            "-l".to_string(),
            self.config.languages.clone(),
            "--psm".to_string(),
            self.config.page_seg_mode.to_string(),
            "--oem".to_string(),
            self.config.engine_mode.to_string(),
        ];

        if self.config.tessdata_dir.is_dir() {
            args.push("--tessdata-dir".to_string());
            args.push(self.config.tessdata_dir.display().to_string());
        } else {
            debug!(
                "tessdata dir {} not found, using tesseract's default",
                self.config.tessdata_dir.display()
            );
        }

        if !self.config.char_whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!(
                "tessedit_char_whitelist={}",
                self.config.char_whitelist
            ));
        }

        args
    }

    /// Run Tesseract on an image file.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .args(self.arguments())
            .output();

        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr.trim())))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OcrError::BackendNotAvailable(
                    "tesseract not found (install tesseract-ocr)".to_string(),
                ))
            }
            Err(e) => Err(OcrError::Io(e)),
        }
    }

    /// Write the image to a temp file and run tesseract on it.
    fn recognize_bytes(&self, bytes: &[u8], extension: &str) -> Result<String, OcrError> {
        let file = tempfile::Builder::new()
            .prefix("timingboard-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        std::fs::write(file.path(), bytes)?;
        self.run_tesseract(file.path())
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExtractionBackend for TesseractBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Tesseract
    }

    fn is_available(&self) -> bool {
        self.config.enabled && check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        let missing = self.missing_languages();
        if !self.config.enabled {
            "Tesseract disabled in config".to_string()
        } else if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr tesseract-ocr-tam"
                .to_string()
        } else if !missing.is_empty() {
            format!(
                "Tesseract language data missing from {}: {}",
                self.config.tessdata_dir.display(),
                missing.join(", ")
            )
        } else {
            format!("Tesseract is available (languages: {})", self.config.languages)
        }
    }

    fn model(&self) -> Option<String> {
        Some(self.config.languages.clone())
    }

    async fn extract(&self, request: BackendRequest<'_>) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let backend = self.clone();
        let bytes = request.image.bytes.clone();
        let extension = request.image.extension();

        let text = tokio::task::spawn_blocking(move || backend.recognize_bytes(&bytes, extension))
            .await
            .map_err(|e| OcrError::OcrFailed(format!("tesseract task failed: {}", e)))??;
        let elapsed = start.elapsed();

        Ok(OcrResult {
            text,
            format: TextFormat::RawText,
            confidence: None,
            backend: BackendType::Tesseract,
            model: self.model(),
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }
}
