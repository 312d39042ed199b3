//! Result types shared by every extraction path.

use serde::{Deserialize, Serialize};

use super::time::TimeOfDay;
use crate::ocr::BackendType;

/// What kind of board the vision model reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardType {
    /// Single origin, flat list of departure times.
    DepartureBoard,
    /// Numbered routes, each with its own destination and times.
    RouteSchedule,
}

impl BoardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardType::DepartureBoard => "departure_board",
            BoardType::RouteSchedule => "route_schedule",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "departure_board" => Some(BoardType::DepartureBoard),
            "route_schedule" => Some(BoardType::RouteSchedule),
            _ => None,
        }
    }
}

impl std::fmt::Display for BoardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Departure times for one destination, split by time of day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTiming {
    pub destination: String,
    pub morning: Vec<String>,
    pub afternoon: Vec<String>,
    pub night: Vec<String>,
}

impl ExtractedTiming {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, bucket: TimeOfDay, time: String) {
        self.bucket_mut(bucket).push(time);
    }

    pub fn bucket(&self, bucket: TimeOfDay) -> &[String] {
        match bucket {
            TimeOfDay::Morning => &self.morning,
            TimeOfDay::Afternoon => &self.afternoon,
            TimeOfDay::Night => &self.night,
        }
    }

    fn bucket_mut(&mut self, bucket: TimeOfDay) -> &mut Vec<String> {
        match bucket {
            TimeOfDay::Morning => &mut self.morning,
            TimeOfDay::Afternoon => &mut self.afternoon,
            TimeOfDay::Night => &mut self.night,
        }
    }

    pub fn total_times(&self) -> usize {
        self.morning.len() + self.afternoon.len() + self.night.len()
    }
}

/// One numbered route from a route schedule board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub route_number: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<Vec<String>>,
    pub departure_times: Vec<String>,
    /// First of `departure_times`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrival_times: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_type: Option<String>,
}

/// Which capability produced a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSource {
    pub backend: BackendType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Canonical output of every extraction path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingBoardResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub board_type: Option<BoardType>,
    /// One entry per destination, in order of appearance.
    pub timings: Vec<ExtractedTiming>,
    /// Flat time list of a departure board.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub departure_times: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub departure_time: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteRecord>,
    pub confidence: f64,
    pub raw_text: String,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ExtractionSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

impl TimingBoardResult {
    /// Empty result carrying the text it was parsed from.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            origin: None,
            board_type: None,
            timings: Vec::new(),
            departure_times: Vec::new(),
            departure_time: None,
            routes: Vec::new(),
            confidence: 0.0,
            raw_text: raw_text.into(),
            warnings: Vec::new(),
            source: None,
            processing_time_ms: None,
        }
    }

    /// Number of destinations found.
    ///
    /// A departure board's flat time list counts as one implicit destination:
    /// the board's own origin.
    pub fn destination_count(&self) -> usize {
        let implicit = usize::from(!self.departure_times.is_empty());
        self.timings.len() + self.routes.len() + implicit
    }

    /// Number of clock times found across all destinations and routes.
    pub fn time_count(&self) -> usize {
        self.timings.iter().map(ExtractedTiming::total_times).sum::<usize>()
            + self
                .routes
                .iter()
                .map(|r| r.departure_times.len())
                .sum::<usize>()
            + self.departure_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destination_count() == 0
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}
