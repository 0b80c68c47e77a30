//! Generate candidates by prompting models.

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;
use color_print::cformat;

use passk::candidate::DEFAULT_SENTINEL;
use passk::{Model, ProblemSet, Strategy, generate, save_candidates};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Problem set: a `.jsonl` file or a `.json` array of problems.
    #[arg(short, long, env = "PASSK_PROBLEMS")]
    problems: PathBuf,

    /// Generate for only the first N problems.
    #[arg(short, long)]
    limit: Option<usize>,

    /// Models to prompt (repeatable).
    ///
    /// Format: `claude-code:<model>` where model is `sonnet`, `haiku`, `opus`,
    /// or a full model ID; or `command:<name>=<program>` for any program that
    /// reads a prompt on stdin and writes its reply to stdout.
    ///
    /// Example: `-m claude-code:sonnet -m command:gpt=./ask-gpt.sh`
    #[arg(short, long = "model", required = true)]
    models: Vec<Model>,

    /// Strategies to prompt with (repeatable). Defaults to all of them.
    #[arg(short, long = "strategy", value_enum)]
    strategies: Vec<Strategy>,

    /// Where the candidates are written, as JSON Lines.
    #[arg(short, long, default_value = "candidates.jsonl")]
    output: PathBuf,
}

pub fn main(config: Config) -> Result<()> {
    let mut problems = ProblemSet::load(&config.problems)?;
    if let Some(limit) = config.limit {
        problems = problems.limit(limit);
    }

    let strategies = if config.strategies.is_empty() {
        Strategy::ALL.to_vec()
    } else {
        config.strategies
    };

    println!(
        "{} {} problems × {} models × {} strategies",
        cformat!("<green,bold>Generating</>"),
        problems.len(),
        config.models.len(),
        strategies.len()
    );

    let candidates = generate(&problems, &config.models, &strategies);
    let failed = candidates
        .iter()
        .filter(|c| c.code == DEFAULT_SENTINEL)
        .count();
    save_candidates(&config.output, &candidates)?;

    println!(
        "{} {} candidates to {:?} ({failed} failed model calls)",
        cformat!("<green,bold>Wrote</>"),
        candidates.len(),
        config.output
    );
    Ok(())
}
