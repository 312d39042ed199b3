//! Engine availability report.

use std::time::Duration;

use console::style;

use crate::cli::icons::{error, success, warn};
use timingboard::ocr::OcrServiceBackend;
use timingboard::{ExtractionConfig, Orchestrator};

pub async fn cmd_check(config: &ExtractionConfig, show_config: bool) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config);

    println!("{}", style("Extraction engines").bold());
    for backend in orchestrator.backends() {
        let status = if backend.is_available() {
            style("✓ available").green()
        } else {
            style("✗ not available").red()
        };
        let backend_type = backend.backend_type();
        println!(
            "  {:<15} {:<7} {}",
            backend_type.as_str(),
            style(backend_type.placement()).dim(),
            status
        );
        println!("  {:<15} {}", "", style(backend.availability_hint()).dim());
    }
    if orchestrator.backends().next().is_none() {
        println!("  {} nothing configured", warn());
    }

    if config.ocr_service.enabled {
        println!();
        println!("{}", style("OCR service health").bold());
        let service = OcrServiceBackend::from_config(
            config.ocr_service.clone(),
            Duration::from_secs(config.remote.timeout_secs),
        )?;
        match service.health_check().await {
            Ok(health) if health.is_healthy() => println!("  {} {}", success(), health.summary()),
            Ok(health) => println!("  {} {}", warn(), health.summary()),
            Err(e) => println!("  {} {}", error(), e),
        }
    }

    if show_config {
        println!();
        println!("{}", style("Configuration").bold());
        print!("{}", toml::to_string_pretty(&config.redacted())?);
    }

    println!();
    if orchestrator.is_available() {
        println!("{} Ready to extract", success());
    } else {
        println!("{} No engine available", error());
    }

    Ok(())
}
