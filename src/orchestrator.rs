//! Extraction orchestrator.
//!
//! Tries the remote chain first (vision model, OCR microservice), then falls
//! back to local tesseract on a binarized copy of the image. Whatever text
//! comes back is parsed by the matching parser and scored.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ExtractionConfig;
use crate::image_source::{ImageSource, LoadedImage};
use crate::ocr::{
    BackendRequest, BackendType, ExtractionBackend, GeminiBackend, OcrError, OcrResult,
    OcrServiceBackend, TesseractBackend, TextFormat,
};
use crate::preprocess::Preprocessor;
use crate::timing::board_parser::usable_hint;
use crate::timing::confidence;
use crate::timing::{
    ExtractionSource, LocationNormalizer, ProtocolParser, TimingBoardParser, TimingBoardResult,
};

/// Errors surfaced at the pipeline boundary.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("no OCR engine available: {0}")]
    EngineUnavailable(String),

    #[error("remote extraction failed: {0}")]
    RemoteExtractionFailed(#[source] OcrError),

    /// Converted into an empty result with a warning, never returned.
    #[error("malformed protocol response: {0}")]
    MalformedProtocolResponse(String),

    #[error("image unreadable: {0}")]
    ImageUnreadable(String),

    #[error("local OCR failed: {0}")]
    LocalExtractionFailed(#[source] OcrError),
}

/// One call into the pipeline.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: ImageSource,
    /// Where the caller believes the board is. Blank or "unknown" is ignored.
    pub origin_hint: Option<String>,
}

impl ExtractionRequest {
    pub fn new(image: ImageSource) -> Self {
        Self {
            image,
            origin_hint: None,
        }
    }

    pub fn with_origin_hint(mut self, hint: impl Into<String>) -> Self {
        self.origin_hint = Some(hint.into());
        self
    }
}

/// Runs the remote chain with local fallback.
///
/// Holds no per-request state; share it behind an `Arc` and call it
/// concurrently.
pub struct Orchestrator {
    remote: Vec<Arc<dyn ExtractionBackend>>,
    local: Option<Arc<dyn ExtractionBackend>>,
    preprocessor: Preprocessor,
    board_parser: TimingBoardParser,
    protocol_parser: ProtocolParser,
    normalizer: LocationNormalizer,
    remote_timeout: Duration,
    http: reqwest::Client,
}

impl Orchestrator {
    /// An orchestrator with no capabilities, using the config's parser and
    /// preprocessing settings. Add capabilities with the `with_*` builders.
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            remote: Vec::new(),
            local: None,
            preprocessor: Preprocessor::new(config.preprocess),
            board_parser: TimingBoardParser::new(config.parser.header_scan_lines),
            protocol_parser: ProtocolParser::new(),
            normalizer: LocationNormalizer::new(),
            remote_timeout: Duration::from_secs(config.remote.timeout_secs),
            http: reqwest::Client::new(),
        }
    }

    /// Build the remote chain from `remote.backends` and tesseract as the
    /// local fallback (unless disabled).
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut orchestrator = Self::new(config);

        for name in &config.remote.backends {
            match Self::create_backend(name, config) {
                Some(backend) => {
                    debug!("remote chain: added {} backend", backend.backend_type());
                    orchestrator.remote.push(backend);
                }
                None => warn!("remote chain: unknown or unusable backend '{}'", name),
            }
        }

        if config.tesseract.enabled {
            orchestrator.local = Some(Arc::new(TesseractBackend::with_config(
                config.tesseract.clone(),
            )));
        }

        info!(
            "orchestrator initialized with {} remote backend(s), local fallback {}",
            orchestrator.remote.len(),
            if orchestrator.local.is_some() { "on" } else { "off" }
        );
        orchestrator
    }

    /// Create a remote backend by name.
    fn create_backend(name: &str, config: &ExtractionConfig) -> Option<Arc<dyn ExtractionBackend>> {
        let timeout = Duration::from_secs(config.remote.timeout_secs);
        let backend: Result<Arc<dyn ExtractionBackend>, OcrError> =
            match BackendType::from_str(name)? {
                BackendType::Gemini => GeminiBackend::from_config(config.gemini.clone(), timeout)
                    .map(|b| Arc::new(b) as Arc<dyn ExtractionBackend>),
                BackendType::OcrService => {
                    OcrServiceBackend::from_config(config.ocr_service.clone(), timeout)
                        .map(|b| Arc::new(b) as Arc<dyn ExtractionBackend>)
                }
                BackendType::Tesseract => {
                    warn!("tesseract is the local fallback, not a remote backend");
                    return None;
                }
            };

        match backend {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!("failed to set up {} backend: {}", name, e);
                None
            }
        }
    }

    /// Append a capability to the remote chain.
    pub fn with_remote_backend(mut self, backend: Arc<dyn ExtractionBackend>) -> Self {
        self.remote.push(backend);
        self
    }

    /// Set the local fallback capability.
    pub fn with_local_backend(mut self, backend: Arc<dyn ExtractionBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Whether any capability can currently serve a request. Cheap; suitable
    /// for pre-flighting an upload.
    pub fn is_available(&self) -> bool {
        self.remote.iter().any(|b| b.is_available())
            || self.local.as_ref().is_some_and(|b| b.is_available())
    }

    /// Every configured capability, remote chain first.
    pub fn backends(&self) -> impl Iterator<Item = &dyn ExtractionBackend> {
        self.remote
            .iter()
            .chain(self.local.iter())
            .map(|b| b.as_ref())
    }

    /// Load, decode and extract.
    pub async fn extract_timings(
        &self,
        request: &ExtractionRequest,
    ) -> Result<TimingBoardResult, ExtractionError> {
        let bytes = request
            .image
            .read(&self.http)
            .await
            .map_err(|e| ExtractionError::ImageUnreadable(e.to_string()))?;

        let image = tokio::task::spawn_blocking(move || LoadedImage::decode(bytes))
            .await
            .map_err(|e| ExtractionError::ImageUnreadable(e.to_string()))?
            .map_err(|e| ExtractionError::ImageUnreadable(e.to_string()))?;

        let (width, height) = image.dimensions();
        debug!("decoded {}x{} {} image", width, height, image.mime_type);

        self.extract_loaded(&image, request.origin_hint.as_deref())
            .await
    }

    /// Extract from an already decoded image.
    pub async fn extract_loaded(
        &self,
        image: &LoadedImage,
        origin_hint: Option<&str>,
    ) -> Result<TimingBoardResult, ExtractionError> {
        let start = Instant::now();
        let request = BackendRequest { image, origin_hint };
        let mut fallback_warnings = Vec::new();
        let mut last_remote_error = None;

        for backend in &self.remote {
            let backend_type = backend.backend_type();
            if !backend.is_available() {
                debug!(
                    "skipping {}: {}",
                    backend_type,
                    backend.availability_hint()
                );
                continue;
            }

            match self.run_remote(backend.as_ref(), request).await {
                Ok(ocr) => {
                    info!("extracted with {} backend", backend_type);
                    let result = self.interpret(ocr, origin_hint);
                    return Ok(finish(result, fallback_warnings, start));
                }
                Err(e) => {
                    warn!("{} backend failed, falling back: {}", backend_type, e);
                    fallback_warnings.push(format!("{} failed: {}", backend_type, e));
                    last_remote_error = Some(e);
                }
            }
        }

        let Some(local) = &self.local else {
            return Err(match last_remote_error {
                Some(e) => ExtractionError::RemoteExtractionFailed(e),
                None => ExtractionError::EngineUnavailable(
                    "no capability is configured and available".to_string(),
                ),
            });
        };
        if !local.is_available() {
            return Err(ExtractionError::EngineUnavailable(
                local.availability_hint(),
            ));
        }

        let prepared = self.preprocess(image).await?;
        let ocr = local
            .extract(BackendRequest {
                image: &prepared,
                origin_hint,
            })
            .await
            .map_err(ExtractionError::LocalExtractionFailed)?;
        info!("extracted with local {} backend", ocr.backend);

        let result = self.interpret(ocr, origin_hint);
        Ok(finish(result, fallback_warnings, start))
    }

    /// Run one remote call under the configured timeout.
    async fn run_remote(
        &self,
        backend: &dyn ExtractionBackend,
        request: BackendRequest<'_>,
    ) -> Result<OcrResult, OcrError> {
        match tokio::time::timeout(self.remote_timeout, backend.extract(request)).await {
            Ok(result) => result,
            Err(_) => Err(OcrError::Timeout {
                backend: backend.backend_type(),
                secs: self.remote_timeout.as_secs(),
            }),
        }
    }

    /// Binarize off the async runtime and re-encode for the OCR engine.
    async fn preprocess(&self, image: &LoadedImage) -> Result<LoadedImage, ExtractionError> {
        let preprocessor = self.preprocessor;
        let source = image.image.clone();

        let prepared = tokio::task::spawn_blocking(move || {
            let processed = preprocessor.preprocess(&source);
            debug!(
                threshold = processed.threshold,
                resized = ?processed.resized_to,
                "preprocessed image"
            );
            LoadedImage::from_gray(processed.image)
        })
        .await
        .map_err(|e| ExtractionError::LocalExtractionFailed(OcrError::ImageError(e.to_string())))?
        .map_err(|e| ExtractionError::LocalExtractionFailed(OcrError::ImageError(e.to_string())))?;

        Ok(prepared)
    }

    /// Parse backend text with the parser its format calls for.
    fn interpret(&self, ocr: OcrResult, origin_hint: Option<&str>) -> TimingBoardResult {
        let mut result = match ocr.format {
            TextFormat::Protocol => match self.protocol_parser.parse(&ocr.text) {
                Ok(result) => result,
                Err(e) => {
                    let error = ExtractionError::MalformedProtocolResponse(e.to_string());
                    warn!("{} backend: {}", ocr.backend, error);
                    let mut result = TimingBoardResult::new(ocr.text.as_str());
                    result.warn(error.to_string());
                    result.confidence = confidence::score(&result);
                    result
                }
            },
            TextFormat::RawText => self.board_parser.parse(&ocr.text, origin_hint),
        };

        if result.origin.is_none() {
            result.origin = usable_hint(origin_hint).and_then(|h| self.normalizer.normalize(h));
        }

        result.source = Some(ExtractionSource {
            backend: ocr.backend,
            model: ocr.model,
        });
        result
    }
}

/// Put earlier remote failures ahead of the parser's own warnings and stamp
/// the elapsed time.
fn finish(
    mut result: TimingBoardResult,
    mut warnings: Vec<String>,
    start: Instant,
) -> TimingBoardResult {
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    result.processing_time_ms = Some(start.elapsed().as_millis() as u64);
    debug!(
        destinations = result.destination_count(),
        times = result.time_count(),
        confidence = result.confidence,
        "extraction finished"
    );
    result
}
