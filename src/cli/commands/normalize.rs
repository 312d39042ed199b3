//! Place-name lookup.

use console::style;

use crate::cli::icons::dim_arrow;
use timingboard::timing::LocationNormalizer;

pub fn cmd_normalize(names: &[String]) -> anyhow::Result<()> {
    let normalizer = LocationNormalizer::new();
    for name in names {
        match normalizer.normalize(name) {
            Some(canonical) if normalizer.is_canonical(&canonical) => {
                println!("{} {} {}", name, dim_arrow(), style(canonical).green());
            }
            Some(unknown) => {
                println!(
                    "{} {} {} {}",
                    name,
                    dim_arrow(),
                    unknown,
                    style("(not a known place)").dim()
                );
            }
            None => println!("{} {}", name, style("(empty)").dim()),
        }
    }
    Ok(())
}
