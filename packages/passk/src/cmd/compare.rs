//! Compare pass@k before and after refinement.

use std::io::stdout;
use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;
use color_print::cformat;

use passk::report::DEFAULT_COMPARISON_FILE;
use passk::{Summary, compare};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Summary CSV of the original run.
    original: PathBuf,

    /// Summary CSV of the refined run.
    refined: PathBuf,

    /// Where the comparison CSV is written.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn main(config: Config) -> Result<()> {
    let original = Summary::read(&config.original)?;
    let refined = Summary::read(&config.refined)?;
    if original.k_label != refined.k_label {
        tracing::warn!(
            original = original.k_label,
            refined = refined.k_label,
            "summaries use different k labels; the original's is used"
        );
    }

    let comparison = compare(&original, &refined);
    let output = config.output.unwrap_or_else(|| {
        config
            .original
            .with_file_name(DEFAULT_COMPARISON_FILE)
    });
    comparison.write(&output)?;

    comparison.print_markdown(stdout().lock())?;
    println!();
    println!("{} {output:?}", cformat!("<green,bold>Wrote</>"));
    Ok(())
}
