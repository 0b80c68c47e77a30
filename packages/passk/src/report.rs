//! Result files and summaries.
//!
//! A run produces three files: the per-candidate results CSV, the pass@k
//! summary CSV, and a JSON report holding everything including detailed
//! outcomes and harness errors. The CSV layouts are kept compatible with
//! existing spreadsheets built from earlier evaluations.

use std::collections::BTreeMap;
use std::fs::{File, read_to_string, write};
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::{
    Result,
    eyre::{Context, bail, eyre},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{AggregateKey, AggregateResult, Aggregator, Attempt};
use crate::config::Settings;
use crate::harness::Evaluation;
use crate::outcome::Failure;
use crate::problem::TaskId;

pub const DEFAULT_RESULTS_FILE: &str = "evaluation_results.csv";
pub const DEFAULT_SUMMARY_FILE: &str = "pass_at_k_results.csv";
pub const DEFAULT_REPORT_FILE: &str = "report.json";
pub const DEFAULT_COMPARISON_FILE: &str = "refined_pass_at_k_comparison.csv";

const KEY_HEADER: &str = "Model_Strategy";
const FAILURES_HEADER: &str = "Example Failures";

/// The percentage column header for a given `k`, e.g. `pass@10 (%)`.
pub fn pass_at_k_header(k_label: usize) -> String {
    format!("pass@{k_label} (%)")
}

/// One row of the results CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(rename = "Problem")]
    pub problem: TaskId,

    #[serde(rename = "Model")]
    pub model: String,

    #[serde(rename = "Strategy")]
    pub strategy: String,

    #[serde(rename = "Pass", with = "capitalized_bool")]
    pub pass: bool,
}

impl From<Attempt> for ResultRow {
    fn from(attempt: Attempt) -> Self {
        Self {
            problem: attempt.task_id,
            model: attempt.model,
            strategy: attempt.strategy,
            pass: attempt.passed,
        }
    }
}

impl From<ResultRow> for Attempt {
    fn from(row: ResultRow) -> Self {
        Attempt::builder()
            .task_id(row.problem)
            .model(row.model)
            .strategy(row.strategy)
            .passed(row.pass)
            .build()
    }
}

/// Write the results CSV.
#[tracing::instrument(skip(rows), fields(count = rows.len()))]
pub fn write_results(path: &Path, rows: &[ResultRow]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create results file: {path:?}"))?;
    for row in rows {
        writer.serialize(row).context("write result row")?;
    }
    writer.flush().with_context(|| format!("flush results file: {path:?}"))
}

/// Read a results CSV.
#[tracing::instrument]
pub fn read_results(path: &Path) -> Result<Vec<ResultRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open results file: {path:?}"))?;
    reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("parse results file {path:?} row {}", i + 1)))
        .collect()
}

/// One row of the summary CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// `model_strategy`, or a free-form label for rows read from a file.
    pub key: String,

    /// Percentage of attempted problems that passed.
    pub pass_at_k: f64,

    /// Sampled failing task ids.
    pub failures: Vec<String>,
}

impl SummaryRow {
    pub fn new(key: &AggregateKey, result: &AggregateResult) -> Self {
        Self {
            key: key.to_string(),
            pass_at_k: result.pass_at_k(),
            failures: result.failures.iter().map(ToString::to_string).collect(),
        }
    }
}

/// The pass@k summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// The `k` shown in the header.
    pub k_label: usize,

    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn new(k_label: usize, results: &BTreeMap<AggregateKey, AggregateResult>) -> Self {
        Self {
            k_label,
            rows: results
                .iter()
                .map(|(key, result)| SummaryRow::new(key, result))
                .collect(),
        }
    }

    /// Rebuild the summary from the rows of a results CSV.
    pub fn from_results(
        k_label: usize,
        aggregator: &Aggregator,
        rows: impl IntoIterator<Item = ResultRow>,
    ) -> Self {
        Self::new(k_label, &aggregator.aggregate(rows.into_iter().map(Attempt::from)))
    }

    #[tracing::instrument(skip(self), fields(rows = self.rows.len()))]
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("create summary file: {path:?}"))?;
        self.write_csv(file)
            .with_context(|| format!("write summary file: {path:?}"))
    }

    /// Write the summary CSV to any writer.
    pub fn write_csv<W: Write>(&self, w: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(w);
        writer
            .write_record([KEY_HEADER, pass_at_k_header(self.k_label).as_str(), FAILURES_HEADER])
            .context("write summary header")?;
        for row in &self.rows {
            writer
                .write_record([
                    row.key.as_str(),
                    format!("{:.1}", row.pass_at_k).as_str(),
                    row.failures.join(", ").as_str(),
                ])
                .context("write summary row")?;
        }
        writer.flush().context("flush summary")
    }

    /// Read a summary CSV.
    ///
    /// The `k` is recovered from the percentage column's header. A failures
    /// cell of `None` is read as no failures.
    #[tracing::instrument]
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("open summary file: {path:?}"))?;

        let headers = reader.headers().context("read summary header")?.clone();
        let k_label = match headers.iter().collect::<Vec<_>>().as_slice() {
            [KEY_HEADER, percent, ..] => parse_k_label(percent)
                .ok_or_else(|| eyre!("unexpected percentage header {percent:?} in {path:?}"))?,
            _ => bail!("summary file {path:?} does not start with a {KEY_HEADER} column"),
        };

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("read summary file {path:?} row {}", i + 1))?;
            let key = record.get(0).unwrap_or_default().to_string();
            let pass_at_k = record
                .get(1)
                .unwrap_or_default()
                .trim()
                .parse::<f64>()
                .with_context(|| format!("parse percentage for {key:?} in {path:?}"))?;
            let failures = parse_failures(record.get(2).unwrap_or_default());
            rows.push(SummaryRow {
                key,
                pass_at_k,
                failures,
            });
        }

        Ok(Self { k_label, rows })
    }

    pub fn print_markdown<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "| Model_Strategy | {} | Example Failures |", pass_at_k_header(self.k_label))?;
        writeln!(w, "|---|---:|---|")?;
        for row in &self.rows {
            writeln!(
                w,
                "| {} | {:.1} | {} |",
                row.key,
                row.pass_at_k,
                row.failures.join(", ")
            )?;
        }
        Ok(())
    }
}

fn parse_k_label(header: &str) -> Option<usize> {
    header
        .strip_prefix("pass@")?
        .strip_suffix(" (%)")?
        .parse()
        .ok()
}

fn parse_failures(cell: &str) -> Vec<String> {
    match cell.trim() {
        "" | "None" => Vec::new(),
        cell => cell.split(',').map(|id| id.trim().to_string()).collect(),
    }
}

/// How a refined pass@k moved relative to the original.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Change {
    Up(f64),
    Down(f64),
    Unchanged,

    /// One side has no value for this key.
    Unavailable,
}

impl Change {
    /// Compare at the one-decimal precision the summary files carry.
    pub fn between(original: Option<f64>, refined: Option<f64>) -> Self {
        let (Some(original), Some(refined)) = (original, refined) else {
            return Change::Unavailable;
        };

        let diff = ((refined - original) * 10.0).round() / 10.0;
        if diff > 0.0 {
            Change::Up(diff)
        } else if diff < 0.0 {
            Change::Down(diff)
        } else {
            Change::Unchanged
        }
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Up(diff) => write!(f, "↑ +{diff:.1}"),
            Change::Down(diff) => write!(f, "↓ {diff:.1}"),
            Change::Unchanged => write!(f, "No change"),
            Change::Unavailable => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRow {
    pub key: String,
    pub original: Option<SummaryRow>,
    pub refined: Option<SummaryRow>,
    pub change: Change,
}

/// Original and refined summaries joined on their keys.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub k_label: usize,
    pub rows: Vec<ComparisonRow>,
}

/// Join two summaries on their keys, keeping keys present on either side.
pub fn compare(original: &Summary, refined: &Summary) -> Comparison {
    let mut joined = BTreeMap::<&str, (Option<&SummaryRow>, Option<&SummaryRow>)>::new();
    for row in &original.rows {
        joined.entry(&row.key).or_default().0 = Some(row);
    }
    for row in &refined.rows {
        joined.entry(&row.key).or_default().1 = Some(row);
    }

    let rows = joined
        .into_iter()
        .map(|(key, (original, refined))| ComparisonRow {
            key: key.to_string(),
            change: Change::between(
                original.map(|row| row.pass_at_k),
                refined.map(|row| row.pass_at_k),
            ),
            original: original.cloned(),
            refined: refined.cloned(),
        })
        .collect();

    Comparison {
        k_label: original.k_label,
        rows,
    }
}

impl Comparison {
    fn headers(&self) -> [String; 6] {
        let percent = pass_at_k_header(self.k_label);
        [
            KEY_HEADER.to_string(),
            percent.clone(),
            format!("Refined {percent}"),
            FAILURES_HEADER.to_string(),
            format!("{FAILURES_HEADER} (Refined)"),
            String::from("Change"),
        ]
    }

    fn cells(row: &ComparisonRow) -> [String; 6] {
        let percent = |side: &Option<SummaryRow>| {
            side.as_ref()
                .map(|row| format!("{:.1}", row.pass_at_k))
                .unwrap_or_default()
        };
        let failures = |side: &Option<SummaryRow>| {
            side.as_ref()
                .map(|row| row.failures.join(", "))
                .unwrap_or_default()
        };
        [
            row.key.clone(),
            percent(&row.original),
            percent(&row.refined),
            failures(&row.original),
            failures(&row.refined),
            row.change.to_string(),
        ]
    }

    #[tracing::instrument(skip(self), fields(rows = self.rows.len()))]
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("create comparison file: {path:?}"))?;
        writer
            .write_record(self.headers())
            .context("write comparison header")?;
        for row in &self.rows {
            writer
                .write_record(Self::cells(row))
                .context("write comparison row")?;
        }
        writer.flush().with_context(|| format!("flush comparison file: {path:?}"))
    }

    pub fn print_markdown<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "| {} |", self.headers().join(" | "))?;
        writeln!(w, "|---|---:|---:|---|---|---|")?;
        for row in &self.rows {
            writeln!(w, "| {} |", Self::cells(row).join(" | "))?;
        }
        Ok(())
    }
}

/// Per-key counts of how candidates failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub passed: usize,
    pub rejected: usize,
    pub exited: usize,
    pub timed_out: usize,
    pub errors: usize,
}

impl Breakdown {
    fn record(&mut self, evaluation: &Evaluation) {
        match evaluation.outcome() {
            None => self.errors += 1,
            Some(outcome) => match outcome.failure() {
                None => self.passed += 1,
                Some(Failure::Rejected { .. }) => self.rejected += 1,
                Some(Failure::Exited { .. }) => self.exited += 1,
                Some(Failure::TimedOut { .. }) => self.timed_out += 1,
            },
        }
    }
}

/// One (model, strategy) entry of the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub model: String,
    pub strategy: String,
    pub pass_at_k: f64,
    pub result: AggregateResult,
    pub breakdown: Breakdown,
}

/// Full record of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,

    /// Seconds since the Unix epoch.
    pub generated_at: u64,

    pub settings: Settings,
    pub evaluations: Vec<Evaluation>,
    pub summary: Vec<ReportEntry>,

    /// Any-strategy-passes result over every key.
    pub ensemble: AggregateResult,
}

impl Report {
    /// Aggregate `evaluations` under `settings`.
    ///
    /// Harness errors are kept in the evaluations and breakdowns but never
    /// reach the aggregates.
    pub fn new(settings: Settings, evaluations: Vec<Evaluation>) -> Self {
        let aggregator = settings.aggregator();
        let attempts = evaluations.iter().filter_map(Evaluation::attempt).collect::<Vec<_>>();
        let results = aggregator.aggregate(attempts.iter().cloned());
        let ensemble = aggregator.ensemble(attempts, None);

        let mut breakdowns = BTreeMap::<AggregateKey, Breakdown>::new();
        for evaluation in &evaluations {
            breakdowns
                .entry(AggregateKey::new(&evaluation.model, &evaluation.strategy))
                .or_default()
                .record(evaluation);
        }

        // Keys whose every evaluation was a harness error still get an entry.
        let summary = breakdowns
            .into_iter()
            .map(|(key, breakdown)| {
                let result = results.get(&key).cloned().unwrap_or(AggregateResult {
                    passed: 0,
                    attempted: 0,
                    failures: Vec::new(),
                });
                ReportEntry {
                    pass_at_k: result.pass_at_k(),
                    model: key.model,
                    strategy: key.strategy,
                    result,
                    breakdown,
                }
            })
            .collect();

        Self {
            run_id: Uuid::new_v4(),
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            settings,
            evaluations,
            summary,
            ensemble,
        }
    }

    /// Rows for the results CSV; harness errors have no row.
    pub fn result_rows(&self) -> Vec<ResultRow> {
        self.evaluations
            .iter()
            .filter_map(Evaluation::attempt)
            .map(ResultRow::from)
            .collect()
    }

    /// The summary CSV table; keys with nothing attempted are left out.
    pub fn summary(&self) -> Summary {
        Summary {
            k_label: self.settings.k_label,
            rows: self
                .summary
                .iter()
                .filter(|entry| entry.result.attempted > 0)
                .map(|entry| {
                    SummaryRow::new(&AggregateKey::new(&entry.model, &entry.strategy), &entry.result)
                })
                .collect(),
        }
    }

    /// Evaluations the harness could not complete.
    pub fn errors(&self) -> impl Iterator<Item = &Evaluation> {
        self.evaluations.iter().filter(|e| e.error().is_some())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            read_to_string(path).with_context(|| format!("read report: {path:?}"))?;
        serde_json::from_str(&content).with_context(|| format!("parse report: {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("serialize report")?;
        write(path, content).with_context(|| format!("write report: {path:?}"))
    }

    /// Print the summary, ensemble, and failure breakdown as Markdown.
    pub fn print_markdown<W: Write>(&self, mut w: W) -> Result<()> {
        writeln!(w, "# pass@k Results")?;
        writeln!(w)?;
        writeln!(w, "Run: {}", self.run_id)?;
        writeln!(w, "Generated: {}", self.generated_at)?;
        writeln!(w)?;

        self.summary().print_markdown(&mut w)?;
        writeln!(w)?;

        writeln!(w, "## Ensemble")?;
        writeln!(w)?;
        writeln!(
            w,
            "Any strategy: {:.1}% ({}/{})",
            self.ensemble.pass_at_k(),
            self.ensemble.passed,
            self.ensemble.attempted
        )?;
        writeln!(w)?;

        writeln!(w, "## Outcomes")?;
        writeln!(w)?;
        writeln!(
            w,
            "| Model_Strategy | Passed | Rejected | Exited | Timed out | Harness errors |"
        )?;
        writeln!(w, "|---|---:|---:|---:|---:|---:|")?;
        for entry in &self.summary {
            let b = &entry.breakdown;
            writeln!(
                w,
                "| {}_{} | {} | {} | {} | {} | {} |",
                entry.model, entry.strategy, b.passed, b.rejected, b.exited, b.timed_out, b.errors
            )?;
        }

        let errors = self.errors().collect_vec();
        if !errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "## Harness errors")?;
            writeln!(w)?;
            for evaluation in errors {
                writeln!(
                    w,
                    "- {} ({}_{}): {}",
                    evaluation.task_id,
                    evaluation.model,
                    evaluation.strategy,
                    evaluation.error().unwrap_or_default()
                )?;
            }
        }

        Ok(())
    }
}

/// `True`/`False`, as spreadsheet tools and pandas write booleans.
mod capitalized_bool {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "True" } else { "False" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let text = String::deserialize(deserializer)?;
        match text.trim() {
            "True" | "true" | "1" => Ok(true),
            "False" | "false" | "0" => Ok(false),
            other => Err(D::Error::custom(format!("invalid pass value {other:?}"))),
        }
    }
}
