//! Heuristic confidence score for an extraction.
//!
//! Downstream duplicate detection and the manual-review queue threshold on
//! these exact values, so the increments are fixed:
//!
//! | Condition | Bonus |
//! |---|---|
//! | base | 0.5 |
//! | at least one destination | +0.2 |
//! | more than 5 times (else at least one) | +0.2 (+0.1) |
//! | any Latin or Tamil letter in the source text | +0.1 |
//!
//! Capped at 1.0. A result with no destinations scores the bare base.

use std::sync::LazyLock;

use regex::Regex;

use super::types::TimingBoardResult;

static SCRIPT_CHAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-zA-Z\x{0B80}-\x{0BFF}]").unwrap());

/// Score a result. Computed in tenths so the output is exact.
pub fn score(result: &TimingBoardResult) -> f64 {
    if result.is_empty() {
        return 0.5;
    }

    let mut tenths: u32 = 5 + 2;

    let times = result.time_count();
    if times > 5 {
        tenths += 2;
    } else if times > 0 {
        tenths += 1;
    }

    if SCRIPT_CHAR.is_match(&result.raw_text) {
        tenths += 1;
    }

    f64::from(tenths.min(10)) / 10.0
}
