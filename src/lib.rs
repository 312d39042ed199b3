//! Timingboard - bus timing board extraction.
//!
//! Turns a photo of a bus-stand timing board into structured departures:
//! origin, destinations and times bucketed by time of day, or route rows
//! when the board is a route schedule.

pub mod config;
pub mod image_source;
pub mod ocr;
pub mod orchestrator;
pub mod preprocess;
pub mod timing;

pub use config::ExtractionConfig;
pub use image_source::{ImageSource, LoadedImage};
pub use orchestrator::{ExtractionError, ExtractionRequest, Orchestrator};
pub use timing::TimingBoardResult;
