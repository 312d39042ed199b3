//! Raw OCR text to timing-board records.
//!
//! Boards come in two shapes, often mixed on one photo:
//!
//! ```text
//! CHENNAI 05:30 14:00 21:15        destination and times on one line
//!
//! MADURAI                          destination, then times underneath
//! காலை                             optional time-of-day header
//! 06:00 07:30
//! ```
//!
//! Each line is classified and folded into a [`ScanState`]. Times go to the
//! bucket named by the last header, or are bucketed by hour when no header
//! has been seen.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::confidence;
use super::location::LocationNormalizer;
use super::time::{find_times, has_time_token, strip_times, TimeOfDay};
use super::types::{ExtractedTiming, TimingBoardResult};

/// Warning attached when a board yields nothing usable.
pub const NO_DESTINATIONS_WARNING: &str = "no destinations or timings found";

/// Default number of leading lines searched for the origin.
pub const DEFAULT_HEADER_SCAN_LINES: usize = 10;

/// Origin candidates shorter than this are OCR debris.
const MIN_ORIGIN_LINE_CHARS: usize = 4;

static LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z\x{0B80}-\x{0BFF}]").unwrap());

static NON_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z\x{0B80}-\x{0BFF}\s]").unwrap());

/// Header keywords, checked in this order.
const CATEGORY_HEADERS: &[(TimeOfDay, &str, &str)] = &[
    (TimeOfDay::Morning, "காலை", "morning"),
    (TimeOfDay::Afternoon, "மாலை", "afternoon"),
    (TimeOfDay::Night, "இரவு", "night"),
];

/// What a single line of OCR text carries.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Header(TimeOfDay),
    DestinationWithTimes { destination: String, times: Vec<String> },
    Destination(String),
    Times(Vec<String>),
    Noise,
}

fn classify(line: &str) -> LineKind {
    if let Some(category) = category_header(line) {
        return LineKind::Header(category);
    }

    let has_letters = LETTER.is_match(line);
    let has_times = has_time_token(line);

    match (has_letters, has_times) {
        (true, true) => LineKind::DestinationWithTimes {
            destination: clean_destination(&strip_times(line)),
            times: find_times(line),
        },
        (true, false) => LineKind::Destination(clean_destination(line)),
        (false, true) => LineKind::Times(find_times(line)),
        (false, false) => LineKind::Noise,
    }
}

fn category_header(line: &str) -> Option<TimeOfDay> {
    let lower = line.to_lowercase();
    CATEGORY_HEADERS
        .iter()
        .find(|(_, tamil, english)| line.contains(tamil) || lower.contains(english))
        .map(|(category, _, _)| *category)
}

/// Keep letters, Tamil script and whitespace.
fn clean_destination(text: &str) -> String {
    NON_NAME_CHARS.replace_all(text, "").trim().to_string()
}

/// Mutable scan state, threaded through the fold over lines.
#[derive(Debug, Default)]
struct ScanState {
    current_destination: Option<String>,
    pending: ExtractedTiming,
    current_category: Option<TimeOfDay>,
    completed: Vec<ExtractedTiming>,
}

impl ScanState {
    /// Close out the current destination. Times seen before any destination
    /// stay pending and are attributed to the next one.
    fn flush(&mut self) {
        if let Some(destination) = self.current_destination.take() {
            let mut timing = std::mem::take(&mut self.pending);
            timing.destination = destination;
            self.completed.push(timing);
        }
    }

    fn add_time(&mut self, time: String) {
        let bucket = self
            .current_category
            .unwrap_or_else(|| TimeOfDay::from_time(&time));
        self.pending.push(bucket, time);
    }

    fn step(mut self, kind: LineKind, normalizer: &LocationNormalizer) -> Self {
        match kind {
            LineKind::Header(category) => {
                self.current_category = Some(category);
            }
            LineKind::DestinationWithTimes { destination, times } => {
                self.flush();
                self.current_destination = canonical_destination(&destination, normalizer);
                for time in times {
                    self.add_time(time);
                }
            }
            LineKind::Destination(destination) => {
                self.flush();
                self.current_destination = canonical_destination(&destination, normalizer);
            }
            LineKind::Times(times) => {
                for time in times {
                    self.add_time(time);
                }
            }
            LineKind::Noise => {}
        }
        self
    }

    fn finish(mut self) -> Vec<ExtractedTiming> {
        self.flush();
        self.completed
    }
}

fn canonical_destination(cleaned: &str, normalizer: &LocationNormalizer) -> Option<String> {
    normalizer
        .normalize(cleaned)
        .or_else(|| Some(cleaned.to_string()).filter(|s| !s.is_empty()))
}

/// Parser for raw OCR text of a timing board.
#[derive(Debug, Clone)]
pub struct TimingBoardParser {
    normalizer: LocationNormalizer,
    header_scan_lines: usize,
}

impl Default for TimingBoardParser {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER_SCAN_LINES)
    }
}

impl TimingBoardParser {
    pub fn new(header_scan_lines: usize) -> Self {
        Self {
            normalizer: LocationNormalizer::new(),
            header_scan_lines,
        }
    }

    /// Parse raw OCR text. Never fails: an unreadable board yields an empty
    /// result with a warning so it can go to manual review.
    pub fn parse(&self, raw_text: &str, origin_hint: Option<&str>) -> TimingBoardResult {
        let mut result = TimingBoardResult::new(raw_text);
        let lines: Vec<&str> = raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        result.origin = match usable_hint(origin_hint) {
            Some(hint) => self.normalizer.normalize(hint),
            None => self.detect_origin(&lines),
        };

        let state = lines.iter().fold(ScanState::default(), |state, line| {
            let kind = classify(line);
            debug!(line = %line, kind = ?kind, "classified board line");
            state.step(kind, &self.normalizer)
        });
        result.timings = state.finish();

        if result.timings.is_empty() {
            result.warn(NO_DESTINATIONS_WARNING);
        }

        debug!(
            origin = ?result.origin,
            destinations = result.timings.len(),
            "parsed raw board text"
        );

        result.confidence = confidence::score(&result);
        result
    }

    /// Look for a known place in the board header, English spellings first.
    fn detect_origin(&self, lines: &[&str]) -> Option<String> {
        let header: Vec<&str> = lines
            .iter()
            .take(self.header_scan_lines)
            .filter(|l| l.chars().count() >= MIN_ORIGIN_LINE_CHARS)
            .copied()
            .collect();

        header
            .iter()
            .find_map(|line| self.normalizer.find_english(line))
            .or_else(|| {
                header
                    .iter()
                    .find_map(|line| self.normalizer.find_tamil(line))
            })
            .map(str::to_string)
    }
}

/// The hint, unless it is blank or the literal "unknown".
pub(crate) fn usable_hint(hint: Option<&str>) -> Option<&str> {
    hint.map(str::trim)
        .filter(|h| !h.is_empty() && !h.eq_ignore_ascii_case("unknown"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TimingBoardResult {
        TimingBoardParser::default().parse(text, None)
    }

    #[test]
    fn test_single_line_destination_with_time() {
        let result = parse("CHENNAI TRICHY 17:00");
        assert_eq!(result.timings.len(), 1);
        let timing = &result.timings[0];
        assert_eq!(timing.destination, "CHENNAI TRICHY");
        assert_eq!(timing.afternoon, vec!["17:00"]);
        assert!(timing.morning.is_empty());
        assert!(timing.night.is_empty());
    }

    #[test]
    fn test_header_overrides_hour_inference() {
        let result = parse("இரவு\n18:00,20:30\nMADURAI");
        assert_eq!(result.timings.len(), 1);
        let timing = &result.timings[0];
        assert_eq!(timing.destination, "MADURAI");
        assert_eq!(timing.night, vec!["18:00", "20:30"]);
        assert!(timing.afternoon.is_empty());
    }

    #[test]
    fn test_english_header_applies_to_following_times() {
        let text = "SALEM\nMorning\n11:30 13:00\nNight\n04:00";
        let result = parse(text);
        let timing = &result.timings[0];
        assert_eq!(timing.morning, vec!["11:30", "13:00"]);
        assert_eq!(timing.night, vec!["04:00"]);
    }

    #[test]
    fn test_times_follow_destination_lines() {
        let text = "MADURAI\n05:30 09:15\n13:00\nKOVAI\n22:45";
        let result = parse(text);
        assert_eq!(result.timings.len(), 2);

        assert_eq!(result.timings[0].destination, "MADURAI");
        assert_eq!(result.timings[0].morning, vec!["05:30", "09:15"]);
        assert_eq!(result.timings[0].afternoon, vec!["13:00"]);

        assert_eq!(result.timings[1].destination, "COIMBATORE");
        assert_eq!(result.timings[1].night, vec!["22:45"]);
    }

    #[test]
    fn test_destination_without_times_is_kept() {
        let result = parse("THENI\nSALEM 06:00");
        assert_eq!(result.timings.len(), 2);
        assert_eq!(result.timings[0].destination, "THENI");
        assert_eq!(result.timings[0].total_times(), 0);
    }

    #[test]
    fn test_noise_lines_ignored() {
        let result = parse("---\n***\nERODE 07:10\n!!");
        assert_eq!(result.timings.len(), 1);
        assert_eq!(result.timings[0].morning, vec!["07:10"]);
    }

    #[test]
    fn test_empty_board_warns() {
        let result = parse("~~ ..\n\n");
        assert!(result.timings.is_empty());
        assert_eq!(result.warnings, vec![NO_DESTINATIONS_WARNING]);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_origin_from_header() {
        let text = "ARUPPUKKOTTAI BUS STAND\nTIMINGS\nMADURAI 19:41";
        let result = parse(text);
        assert_eq!(result.origin.as_deref(), Some("ARUPPUKKOTTAI"));
    }

    #[test]
    fn test_origin_from_run_together_header() {
        let result = parse("ARUPPUKKOTTAIBUSSTAND\nSALEM 06:00");
        assert_eq!(result.origin.as_deref(), Some("ARUPPUKKOTTAI"));
        assert_eq!(result.timings.len(), 1);
        assert_eq!(result.timings[0].destination, "SALEM");
    }

    #[test]
    fn test_origin_from_tamil_header() {
        let text = "மதுரை பேருந்து நிலையம்\n06:00 07:30";
        let result = parse(text);
        assert_eq!(result.origin.as_deref(), Some("MADURAI"));
    }

    #[test]
    fn test_origin_hint_wins() {
        let parser = TimingBoardParser::default();
        let result = parser.parse("MADURAI 06:00", Some("bangalore"));
        assert_eq!(result.origin.as_deref(), Some("BENGALURU"));

        let result = parser.parse("MADURAI 06:00", Some("Unknown"));
        assert_eq!(result.origin.as_deref(), Some("MADURAI"));
    }

    #[test]
    fn test_origin_scan_respects_window() {
        let parser = TimingBoardParser::new(1);
        let result = parser.parse("TIMINGS\nMADURAI 06:00", None);
        assert_eq!(result.origin, None);
    }

    #[test]
    fn test_confidence_for_parsed_board() {
        let result = parse("MADURAI 05:30 06:00 07:00 08:00 09:00 10:00");
        assert_eq!(result.confidence, 1.0);
    }
}
