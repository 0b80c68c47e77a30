//! Rebuild the summary from existing results.

use std::io::stdout;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use color_eyre::eyre::{Context, Result};

use passk::report::{DEFAULT_RESULTS_FILE, read_results};
use passk::{Report, Summary};

use crate::cmd::{DEFAULT_OUTPUT_DIR, SettingsArgs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Markdown,
    Csv,
    Json,
}

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// A results CSV, or a JSON report written by `passk run`.
    #[arg(short, long, default_value_t = default_input())]
    input: String,

    /// Output format.
    #[arg(short, long, default_value = "markdown")]
    format: Format,

    /// Write the summary CSV here as well.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,
}

fn default_input() -> String {
    format!("{DEFAULT_OUTPUT_DIR}/{DEFAULT_RESULTS_FILE}")
}

pub fn main(config: Config) -> Result<()> {
    let settings = config.settings.resolve()?;
    let input = PathBuf::from(&config.input);

    // A JSON report carries the detailed outcomes; a results CSV only has
    // pass/fail per candidate, so the summary is recomputed from it.
    let report = if input.extension().is_some_and(|ext| ext == "json") {
        Some(Report::load(&input)?)
    } else {
        None
    };
    let summary = match &report {
        Some(report) => Summary {
            k_label: config.settings.k_label.unwrap_or(report.settings.k_label),
            ..report.summary()
        },
        None => Summary::from_results(
            settings.k_label,
            &settings.aggregator(),
            read_results(&input)?,
        ),
    };

    if let Some(path) = &config.output {
        summary.write(path)?;
    }

    let out = stdout().lock();
    match (config.format, &report) {
        (Format::Markdown, Some(report)) => report.print_markdown(out),
        (Format::Markdown, None) => summary.print_markdown(out),
        (Format::Csv, _) => summary.write_csv(out),
        (Format::Json, _) => {
            serde_json::to_writer_pretty(out, &summary).context("write summary as JSON")
        }
    }
}
