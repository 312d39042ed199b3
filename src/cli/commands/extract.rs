//! Full extraction from a board photo.

use console::style;

use crate::cli::helpers::print_result;
use crate::cli::icons::error;
use timingboard::{ExtractionConfig, ExtractionRequest, ImageSource, Orchestrator};

/// Run the orchestrator on one image.
pub async fn cmd_extract(
    config: &ExtractionConfig,
    image: &str,
    origin: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config);

    if !orchestrator.is_available() {
        eprintln!("{} No extraction engine is available", error());
        for backend in orchestrator.backends() {
            eprintln!(
                "  {:<15} {}",
                backend.backend_type().as_str(),
                style(backend.availability_hint()).dim()
            );
        }
        anyhow::bail!("run 'timingboard check' for setup hints");
    }

    let mut request = ExtractionRequest::new(ImageSource::parse(image));
    if let Some(origin) = origin {
        request = request.with_origin_hint(origin);
    }

    let result = orchestrator.extract_timings(&request).await?;
    print_result(&result, json)
}
