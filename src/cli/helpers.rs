//! Shared helper functions for CLI commands.

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use console::style;

use super::icons::{dim_arrow, success, warn};
use timingboard::timing::{ExtractedTiming, TimeOfDay, TimingBoardResult};

/// Read text from a file, or from stdin when the path is `-`.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Print a result as pretty JSON or as a styled summary.
pub fn print_result(result: &TimingBoardResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!(
        "{} {}",
        success(),
        style(result.origin.as_deref().unwrap_or("unknown origin")).bold()
    );
    if let Some(board_type) = result.board_type {
        println!("  {} type: {}", dim_arrow(), board_type);
    }
    if let Some(source) = &result.source {
        let model = source
            .model
            .as_deref()
            .map(|m| format!(" ({})", m))
            .unwrap_or_default();
        println!("  {} via: {}{}", dim_arrow(), source.backend, model);
    }
    println!(
        "  {} confidence: {:.1}",
        dim_arrow(),
        result.confidence
    );

    if !result.departure_times.is_empty() {
        println!();
        println!("{}", style("Departures").underlined());
        println!("  {}", result.departure_times.join(", "));
    }

    if !result.timings.is_empty() {
        println!();
        println!("{}", style("Destinations").underlined());
        for timing in &result.timings {
            print_timing(timing);
        }
    }

    if !result.routes.is_empty() {
        println!();
        println!("{}", style("Routes").underlined());
        for route in &result.routes {
            println!(
                "  {:<8} {:<20} {}",
                style(&route.route_number).cyan(),
                route.destination,
                route.departure_times.join(", ")
            );
            if let Some(via) = &route.via {
                println!("  {:<8} {}", "", style(format!("via {}", via.join(", "))).dim());
            }
        }
    }

    for warning in &result.warnings {
        eprintln!("{} {}", warn(), warning);
    }

    Ok(())
}

fn print_timing(timing: &ExtractedTiming) {
    println!("  {}", style(&timing.destination).bold());
    for bucket in [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Night] {
        let times = timing.bucket(bucket);
        if !times.is_empty() {
            println!("    {:<10} {}", style(bucket.as_str()).dim(), times.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_input_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.txt");
        std::fs::write(&path, "MADURAI 06:00").unwrap();
        assert_eq!(read_input(&path).unwrap(), "MADURAI 06:00");
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input(Path::new("/nonexistent/board.txt")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
