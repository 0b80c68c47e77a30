//! Evaluate candidates and write the result files.

use std::fs::create_dir_all;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Args;
use color_eyre::{
    Result, Section,
    eyre::{Context, bail, eyre},
};
use color_print::cformat;

use passk::report::{DEFAULT_REPORT_FILE, DEFAULT_RESULTS_FILE, DEFAULT_SUMMARY_FILE, write_results};
use passk::{Candidate, Evaluation, ProblemSet, Report, Settings, Verdict, load_candidates};

use crate::cmd::{DEFAULT_OUTPUT_DIR, ExecutionArgs, SettingsArgs};

#[derive(Args, Clone, Debug)]
pub struct Config {
    /// Problem set: a `.jsonl` file or a `.json` array of problems.
    #[arg(short, long, env = "PASSK_PROBLEMS")]
    problems: PathBuf,

    /// Candidates: a `.jsonl` file, or a directory of per-problem `.json`
    /// entry files.
    #[arg(short, long, env = "PASSK_CANDIDATES")]
    candidates: PathBuf,

    /// Evaluate only the first N problems; candidates for other problems are
    /// skipped.
    #[arg(short, long)]
    limit: Option<usize>,

    /// Evaluate only candidates from this model (repeatable).
    #[arg(short, long = "model")]
    models: Vec<String>,

    /// Evaluate only candidates using this strategy (repeatable).
    #[arg(short, long = "strategy")]
    strategies: Vec<String>,

    /// Directory the result files are written to.
    #[arg(short, long, env = "PASSK_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    execution: ExecutionArgs,
}

/// Fully resolved run configuration with defaults applied.
struct ResolvedConfig {
    problems: ProblemSet,
    candidates: Vec<Candidate>,
    settings: Settings,
    output_dir: PathBuf,
}

impl ResolvedConfig {
    fn print_summary(&self) {
        println!("{}", cformat!("<bold,underline>Evaluation Configuration</>"));
        println!("  {} {}", cformat!("<cyan>Problems:</>"), self.problems.len());
        println!("  {} {}", cformat!("<cyan>Candidates:</>"), self.candidates.len());
        println!(
            "  {} {} {}",
            cformat!("<cyan>Interpreter:</>"),
            self.settings.interpreter,
            self.settings.interpreter_args.join(" ")
        );
        println!(
            "  {} {}s per candidate",
            cformat!("<cyan>Timeout:</>"),
            self.settings.timeout_secs
        );
        println!("  {} {}", cformat!("<cyan>Jobs:</>"), self.settings.jobs.max(1));
        println!("  {} {:?}", cformat!("<cyan>Output:</>"), self.output_dir);
        println!();
    }
}

pub fn main(config: Config) -> Result<()> {
    let resolved = ResolvedConfig::try_from(config)?;
    resolved.print_summary();

    let harness = resolved.settings.harness()?;
    let total = resolved.candidates.len();
    let done = AtomicUsize::new(0);
    let evaluations = harness.evaluate_all(
        &resolved.problems,
        &resolved.candidates,
        resolved.settings.jobs,
        |evaluation| {
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            println!("[{n}/{total}] {}", progress(evaluation));
        },
    )?;

    let report = Report::new(resolved.settings, evaluations);
    write_reports(&report, &resolved.output_dir)?;

    println!();
    report.print_markdown(stdout().lock())?;

    let errors = report.errors().count();
    if errors > 0 {
        let path = resolved.output_dir.join(DEFAULT_REPORT_FILE);
        return Err(eyre!("{errors} of {total} evaluations could not be completed"))
            .with_note(|| format!("details are in {path:?}"))
            .suggestion("harness errors are not counted as failures; fix them and run again");
    }

    Ok(())
}

fn progress(evaluation: &Evaluation) -> String {
    let label = format!(
        "{} {}_{}",
        evaluation.task_id, evaluation.model, evaluation.strategy
    );
    match &evaluation.verdict {
        Verdict::Outcome(outcome) => match outcome.failure() {
            None => cformat!("{label} <green>✓</>"),
            Some(failure) => cformat!("{label} <red>✗</> <dim>{}</>", failure.label()),
        },
        Verdict::Error(message) => cformat!("{label} <yellow,bold>error:</> {message}"),
    }
}

fn write_reports(report: &Report, dir: &Path) -> Result<()> {
    create_dir_all(dir).with_context(|| format!("create output directory {dir:?}"))?;

    let results = dir.join(DEFAULT_RESULTS_FILE);
    let summary = dir.join(DEFAULT_SUMMARY_FILE);
    let json = dir.join(DEFAULT_REPORT_FILE);

    write_results(&results, &report.result_rows())?;
    report.summary().write(&summary)?;
    report.save(&json)?;

    for path in [results, summary, json] {
        println!("{} {path:?}", cformat!("<green,bold>Wrote</>"));
    }
    Ok(())
}

impl TryFrom<Config> for ResolvedConfig {
    type Error = color_eyre::eyre::Error;

    fn try_from(config: Config) -> Result<Self> {
        let mut settings = config.settings.resolve()?;
        config.execution.apply(&mut settings);
        settings.validate()?;

        let mut problems = ProblemSet::load(&config.problems)?;
        if let Some(limit) = config.limit {
            problems = problems.limit(limit);
        }
        if problems.is_empty() {
            bail!("no problems in {:?}", config.problems);
        }

        let all = load_candidates(&config.candidates)?;
        let loaded = all.len();
        let candidates = all
            .into_iter()
            .filter(|c| config.models.is_empty() || config.models.contains(&c.model))
            .filter(|c| config.strategies.is_empty() || config.strategies.contains(&c.strategy))
            .filter(|c| config.limit.is_none() || problems.contains(&c.task_id))
            .collect::<Vec<_>>();
        if candidates.len() < loaded {
            tracing::info!(
                skipped = loaded - candidates.len(),
                "skipping candidates outside the selected problems, models, or strategies"
            );
        }
        if candidates.is_empty() {
            bail!("no candidates to evaluate in {:?}", config.candidates);
        }

        Ok(Self {
            problems,
            candidates,
            settings,
            output_dir: config.output_dir,
        })
    }
}
