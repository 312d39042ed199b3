//! Text extraction backends.
//!
//! Reads bus timing boards using:
//! - Gemini vision for structured extraction (remote, answers in the line protocol)
//! - an OCR microservice running PaddleOCR (remote, raw text)
//! - Tesseract OCR on a preprocessed image (local, raw text)
//!
//! All three implement [`ExtractionBackend`]; the orchestrator decides the
//! order they are tried in.

mod api_backend;
mod backend;
mod gemini;
mod ocr_service;
mod tesseract;

pub use backend::{
    BackendRequest, BackendType, ExtractionBackend, OcrError, OcrResult, TextFormat,
};
pub use gemini::{build_prompt, GeminiBackend, TIMING_BOARD_PROMPT};
pub use ocr_service::{OcrServiceBackend, ServiceHealth};
pub use tesseract::{check_binary, TesseractBackend};
