//! List the problems in a problem set.

use std::path::PathBuf;

use clap::Args;
use color_eyre::Result;
use color_print::cformat;

use passk::ProblemSet;

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Problem set: a `.jsonl` file or a `.json` array of problems.
    #[arg(short, long, env = "PASSK_PROBLEMS")]
    problems: PathBuf,

    /// List only the first N problems.
    #[arg(short, long)]
    limit: Option<usize>,
}

pub fn main(config: Config) -> Result<()> {
    let mut problems = ProblemSet::load(&config.problems)?;
    if let Some(limit) = config.limit {
        problems = problems.limit(limit);
    }

    if problems.is_empty() {
        println!("No problems in {:?}", config.problems);
        return Ok(());
    }

    println!("Problems in {:?}:\n", config.problems);
    for problem in problems.iter() {
        match &problem.entry_point {
            Some(entry_point) => println!(
                "  {} {}",
                problem.task_id,
                cformat!("<dim>(entry point: {entry_point})</>")
            ),
            None => println!("  {}", problem.task_id),
        }
    }
    Ok(())
}
