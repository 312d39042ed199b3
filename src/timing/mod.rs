//! Turning recognised text into structured timing-board records.
//!
//! - [`board_parser`]: raw OCR text, classified line by line
//! - [`protocol`]: the vision model's line protocol
//! - [`location`]: place-name canonicalisation shared by both
//! - [`confidence`]: the score attached to every result

pub mod board_parser;
pub mod confidence;
pub mod location;
pub mod protocol;
pub mod time;
pub mod types;

pub use board_parser::{TimingBoardParser, NO_DESTINATIONS_WARNING};
pub use location::LocationNormalizer;
pub use protocol::{MalformedProtocol, ProtocolParser};
pub use time::{normalize_time, TimeOfDay};
pub use types::{BoardType, ExtractedTiming, ExtractionSource, RouteRecord, TimingBoardResult};
