//! Write out the binarized image local OCR would see.

use std::path::Path;

use anyhow::Context;
use console::style;

use crate::cli::icons::{dim_arrow, success};
use timingboard::preprocess::Preprocessor;
use timingboard::{ExtractionConfig, ImageSource, LoadedImage};

pub async fn cmd_preprocess(
    config: &ExtractionConfig,
    image: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let bytes = ImageSource::parse(image)
        .read(&client)
        .await
        .with_context(|| format!("failed to load {}", image))?;
    let loaded = LoadedImage::decode(bytes)?;
    let (width, height) = loaded.dimensions();

    let processed = Preprocessor::new(config.preprocess).preprocess(&loaded.image);
    processed
        .image
        .save(output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("{} Wrote {}", success(), output.display());
    println!(
        "  {} Otsu threshold: {}",
        dim_arrow(),
        style(processed.threshold).cyan()
    );
    match processed.resized_to {
        Some((w, h)) => println!("  {} Resized: {}x{} -> {}x{}", dim_arrow(), width, height, w, h),
        None => println!("  {} Size: {}x{} (unchanged)", dim_arrow(), width, height),
    }

    Ok(())
}
