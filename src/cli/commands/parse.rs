//! Offline parsing of OCR text and model responses.

use std::path::Path;

use anyhow::Context;

use crate::cli::helpers::{print_result, read_input};
use timingboard::timing::{ProtocolParser, TimingBoardParser};
use timingboard::ExtractionConfig;

/// Parse raw OCR text.
pub fn cmd_parse_text(
    config: &ExtractionConfig,
    file: &Path,
    origin: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let text = read_input(file)?;
    let parser = TimingBoardParser::new(config.parser.header_scan_lines);
    let result = parser.parse(&text, origin);
    print_result(&result, json)
}

/// Parse a line-protocol response.
pub fn cmd_parse_protocol(file: &Path, json: bool) -> anyhow::Result<()> {
    let text = read_input(file)?;
    let result = ProtocolParser::new()
        .parse(&text)
        .context("input is not a timing-board protocol response")?;
    print_result(&result, json)
}
