//! Parser for the line protocol the vision model is prompted to answer in.
//!
//! ```text
//! ORIGIN:MADURAI
//! TYPE:route_schedule
//! TIMES:05:30,09:15
//! ROUTES:
//! 166UD|CHENNAI|Dindigul,Trichy|06:00,14:30|EXPRESS
//! END
//! ```
//!
//! Route rows come in two widths. The five-field form is
//! `route|destination|via|times|bus_type`; models also answer with the wider
//! `route|from|to|via|departures|arrivals|bus_type`. A `-` field is absent.

use thiserror::Error;
use tracing::{debug, warn};

use super::confidence;
use super::location::LocationNormalizer;
use super::time::{looks_like_time, normalize_time, TimeOfDay};
use super::types::{BoardType, ExtractedTiming, RouteRecord, TimingBoardResult};

/// The response did not contain a single protocol key line.
#[derive(Debug, Error)]
#[error("no protocol keys found in response ({preview})")]
pub struct MalformedProtocol {
    pub preview: String,
}

impl MalformedProtocol {
    fn from_text(text: &str) -> Self {
        let preview: String = text.trim().chars().take(60).collect();
        Self { preview }
    }
}

/// Keyword the wide row format uses for "the board's own origin".
const ORIGIN_KEYWORD: &str = "ORIGIN";

/// Parser for vision-model protocol responses.
#[derive(Debug, Clone, Default)]
pub struct ProtocolParser {
    normalizer: LocationNormalizer,
}

impl ProtocolParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a protocol response.
    ///
    /// Recoverable anomalies (missing `END`, bad times, unusable rows) become
    /// warnings on the result. Only text with no protocol keys at all is an
    /// error.
    pub fn parse(&self, text: &str) -> Result<TimingBoardResult, MalformedProtocol> {
        let mut result = TimingBoardResult::new(text);
        let mut in_routes = false;
        let mut recognized = false;
        let mut terminated = false;

        for (index, raw_line) in strip_code_fence(text).lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            if line == "END" {
                terminated = true;
                break;
            }

            if let Some(value) = line.strip_prefix("ORIGIN:") {
                recognized = true;
                result.origin = self.normalizer.normalize(value);
            } else if let Some(value) = line.strip_prefix("TYPE:") {
                recognized = true;
                match BoardType::from_str(value) {
                    Some(board_type) => result.board_type = Some(board_type),
                    None => result.warn(format!("unknown board type '{}'", value.trim())),
                }
            } else if let Some(value) = line.strip_prefix("TIMES:") {
                recognized = true;
                let times = parse_times(value, &mut result.warnings);
                result.departure_times.extend(times);
            } else if line.starts_with("ROUTES:") {
                recognized = true;
                in_routes = true;
            } else if in_routes && line.contains('|') {
                self.parse_route_row(line, index + 1, &mut result);
            } else {
                debug!(line = %line, "ignoring non-protocol line");
            }
        }

        if !recognized {
            return Err(MalformedProtocol::from_text(text));
        }
        if !terminated {
            warn!("protocol response missing END terminator");
            result.warn("protocol response missing END terminator");
        }

        let origin = result.origin.clone();
        for route in &mut result.routes {
            if route.from_location.is_none() {
                route.from_location = origin.clone();
            }
        }

        result.departure_time = result
            .departure_times
            .first()
            .cloned()
            .or_else(|| result.routes.iter().find_map(|r| r.departure_time.clone()));

        debug!(
            origin = ?result.origin,
            board_type = ?result.board_type,
            times = result.departure_times.len(),
            routes = result.routes.len(),
            "parsed protocol response"
        );

        result.confidence = confidence::score(&result);
        Ok(result)
    }

    fn parse_route_row(&self, line: &str, line_no: usize, result: &mut TimingBoardResult) {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        let row = RouteRow::from_fields(&fields);

        let Some(destination) = row.destination.and_then(|d| self.normalizer.normalize(d)) else {
            result.warn(format!("route row on line {} skipped: no destination", line_no));
            return;
        };

        let departure_times = row
            .departures
            .map(|t| parse_times(t, &mut result.warnings))
            .unwrap_or_default();

        let Some(route_number) = row.route_number else {
            // Boards without route numbers still list destinations and times.
            let existing = result
                .timings
                .iter()
                .position(|t| t.destination == destination);
            let index = match existing {
                Some(index) => index,
                None => {
                    result.timings.push(ExtractedTiming::new(destination));
                    result.timings.len() - 1
                }
            };
            let timing = &mut result.timings[index];
            for time in departure_times {
                timing.push(TimeOfDay::from_time(&time), time);
            }
            return;
        };

        let via = row.via.map(|v| {
            v.split(',')
                .filter_map(|stop| self.normalizer.normalize(stop))
                .collect::<Vec<_>>()
        });
        let arrival_times = row
            .arrivals
            .map(|t| parse_times(t, &mut result.warnings))
            .filter(|t| !t.is_empty());
        let from_location = row
            .from
            .filter(|f| !f.eq_ignore_ascii_case(ORIGIN_KEYWORD))
            .and_then(|f| self.normalizer.normalize(f));

        result.routes.push(RouteRecord {
            route_number: route_number.to_string(),
            destination,
            from_location,
            via: via.filter(|v| !v.is_empty()),
            departure_time: departure_times.first().cloned(),
            departure_times,
            arrival_times,
            bus_type: row.bus_type.map(str::to_uppercase),
        });
    }
}

/// Positional fields of a route row, `-` and blanks already mapped to `None`.
#[derive(Debug, Default)]
struct RouteRow<'a> {
    route_number: Option<&'a str>,
    from: Option<&'a str>,
    destination: Option<&'a str>,
    via: Option<&'a str>,
    departures: Option<&'a str>,
    arrivals: Option<&'a str>,
    bus_type: Option<&'a str>,
}

impl<'a> RouteRow<'a> {
    fn from_fields(fields: &[&'a str]) -> Self {
        let field = |i: usize| {
            fields
                .get(i)
                .copied()
                .filter(|v| !v.is_empty() && *v != "-")
        };

        if fields.len() >= 6 {
            Self {
                route_number: field(0),
                from: field(1),
                destination: field(2),
                via: field(3),
                departures: field(4),
                arrivals: field(5),
                bus_type: field(6),
            }
        } else {
            Self {
                route_number: field(0),
                destination: field(1),
                via: field(2),
                departures: field(3),
                bus_type: field(4).filter(|v| !looks_like_time(v)),
                ..Default::default()
            }
        }
    }
}

/// Parse a comma-separated time list, warning about tokens that are not times.
fn parse_times(csv: &str, warnings: &mut Vec<String>) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "-")
        .filter_map(|t| {
            let normalized = normalize_time(t);
            if normalized.is_none() {
                warnings.push(format!("ignored malformed time '{}'", t));
            }
            normalized
        })
        .collect()
}

/// Drop a surrounding Markdown code fence, if the model added one.
fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if body.starts_with("```") {
        body = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
    }
    if let Some(stripped) = body.trim_end().strip_suffix("```") {
        body = stripped;
    }
    body.trim()
}
