//! Clock times as they appear on timing boards.
//!
//! Two flavours of parsing live here:
//! - [`find_times`] scans free OCR text for `HH:MM`-shaped tokens.
//! - [`normalize_time`] accepts the looser forms a vision model tends to
//!   emit (`19.41`, `1941`, `6:00 PM`, `19:41:00`) and canonicalises them.
//!
//! Both produce zero-padded 24-hour `HH:MM` strings.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Time token in OCR text: 1-2 digit hour (0-29), optional colon, 2-digit minute.
static TIME_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-2]?[0-9]):?([0-5][0-9])\b").unwrap());

/// Colon-separated time, used when stripping times out of a destination line.
static COLON_TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}:\d{2}").unwrap());

static LEADING_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(at|@|time[:\s]*)\s*").unwrap());

static TRAILING_HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(hrs?|hours?)$").unwrap());

static MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*(a\.m\.|p\.m\.|am|pm)\s*").unwrap());

static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})(?::\d{2})?$").unwrap());

/// Time-of-day bucket a departure is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Night,
}

impl TimeOfDay {
    /// Bucket for an hour when the board gives no explicit header.
    ///
    /// `[5,12)` is morning, `[12,18)` afternoon, everything else night.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Night,
        }
    }

    /// Bucket for an `HH:MM` string. Unparseable input lands in night,
    /// matching the catch-all branch of [`TimeOfDay::from_hour`].
    pub fn from_time(time: &str) -> Self {
        hour_of(time).map(Self::from_hour).unwrap_or(TimeOfDay::Night)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Night => "night",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hour component of an `HH:MM` string.
pub fn hour_of(time: &str) -> Option<u32> {
    time.split(':').next()?.parse().ok()
}

/// Whether a line contains anything shaped like a time token.
pub fn has_time_token(line: &str) -> bool {
    TIME_TOKEN.is_match(line)
}

/// Extract every time token from a line of OCR text, in order.
///
/// Hours are zero-padded. Tokens the pattern accepts but that are not valid
/// clock times (hour 24-29) are dropped.
pub fn find_times(line: &str) -> Vec<String> {
    TIME_TOKEN
        .captures_iter(line)
        .filter_map(|caps| {
            let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
            let minute = caps.get(2)?.as_str();
            (hour < 24).then(|| format!("{:02}:{}", hour, minute))
        })
        .collect()
}

/// Remove `H:MM`/`HH:MM` tokens from a line.
pub fn strip_times(line: &str) -> String {
    COLON_TIME.replace_all(line, "").into_owned()
}

/// Whether a protocol field value looks like a time rather than, say, a bus type.
pub fn looks_like_time(value: &str) -> bool {
    normalize_time(value).is_some()
}

/// Normalise a loosely formatted time into `HH:MM`.
///
/// Accepts `H:MM`, `HH.MM`, `HHMM`, `HMM`, `HH:MM:SS` and 12-hour forms with
/// `AM`/`PM`. Returns `None` for anything that is not a valid clock time.
pub fn normalize_time(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let stripped = LEADING_NOISE.replace(trimmed, "");
    let stripped = TRAILING_HOURS.replace(&stripped, "");

    let meridiem = MERIDIEM
        .captures(&stripped)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase().starts_with('p'));
    let mut time = MERIDIEM
        .replace_all(&stripped, "")
        .trim()
        .replace(['.', '。'], ":");

    if time.chars().all(|c| c.is_ascii_digit()) {
        time = match time.len() {
            4 => format!("{}:{}", &time[..2], &time[2..]),
            3 => format!("{}:{}", &time[..1], &time[1..]),
            1 | 2 if meridiem.is_some() => format!("{}:00", time),
            _ => return None,
        };
    }

    let caps = CLOCK.captures(&time)?;
    let mut hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;

    match meridiem {
        Some(true) if hour < 12 => hour += 12,
        Some(false) if hour == 12 => hour = 0,
        Some(_) if hour > 12 => return None,
        _ => {}
    }

    if hour > 23 || minute > 59 {
        return None;
    }

    Some(format!("{:02}:{:02}", hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
    }

    #[test]
    fn test_find_times_pads_hours() {
        assert_eq!(
            find_times("MADURAI 5:30 9:15 17:00"),
            vec!["05:30", "09:15", "17:00"]
        );
    }

    #[test]
    fn test_find_times_colonless_and_commas() {
        assert_eq!(find_times("18:00,20:30"), vec!["18:00", "20:30"]);
        assert_eq!(find_times("0530"), vec!["05:30"]);
    }

    #[test]
    fn test_find_times_drops_impossible_hours() {
        assert_eq!(find_times("25:10 23:59"), vec!["23:59"]);
    }

    #[test]
    fn test_strip_times() {
        assert_eq!(strip_times("CHENNAI TRICHY 17:00").trim(), "CHENNAI TRICHY");
    }

    #[test]
    fn test_normalize_time_forms() {
        assert_eq!(normalize_time("5:30").as_deref(), Some("05:30"));
        assert_eq!(normalize_time("19.41").as_deref(), Some("19:41"));
        assert_eq!(normalize_time("1941").as_deref(), Some("19:41"));
        assert_eq!(normalize_time("941").as_deref(), Some("09:41"));
        assert_eq!(normalize_time("19:41:00").as_deref(), Some("19:41"));
        assert_eq!(normalize_time("6:00 PM").as_deref(), Some("18:00"));
        assert_eq!(normalize_time("12:15 am").as_deref(), Some("00:15"));
        assert_eq!(normalize_time("7 pm").as_deref(), Some("19:00"));
        assert_eq!(normalize_time("at 8:05 hrs").as_deref(), Some("08:05"));
    }

    #[test]
    fn test_normalize_time_rejects_garbage() {
        assert_eq!(normalize_time(""), None);
        assert_eq!(normalize_time("EXPRESS"), None);
        assert_eq!(normalize_time("24:10"), None);
        assert_eq!(normalize_time("12"), None);
        assert!(!looks_like_time("DELUXE"));
    }
}
