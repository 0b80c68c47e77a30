//! Candidate solutions produced by the generation stage.
//!
//! Candidates are consumed read-only. Before a candidate is executed its code
//! is classified: empty code and error markers left behind by a failed model
//! call are rejected outright, and replies that wrap the program in a fenced
//! Markdown block are reduced to the block's contents.

use std::borrow::Cow;
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use bon::Builder;
use color_eyre::{
    Result,
    eyre::{Context, bail, eyre},
};
use glob::glob;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::problem::TaskId;

/// The error marker written in place of code when a model call failed.
pub const DEFAULT_SENTINEL: &str = "API error";

/// One generated solution, attributed to a model and prompting strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[non_exhaustive]
pub struct Candidate {
    /// The problem this candidate solves.
    #[builder(into)]
    pub task_id: TaskId,

    /// The model that produced the candidate, e.g. `gpt` or `claude`.
    #[builder(into)]
    pub model: String,

    /// The prompting strategy used, e.g. `cot` or `selfdebug`.
    #[builder(into)]
    pub strategy: String,

    /// The generated code, exactly as the model returned it.
    #[builder(into, default)]
    #[serde(default)]
    pub code: String,
}

/// Candidate code after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateCode<'a> {
    /// No code at all.
    Missing,

    /// The code is one of the configured error markers.
    Sentinel(&'a str),

    /// Source code to execute.
    Source(Cow<'a, str>),
}

impl Candidate {
    /// Classify this candidate's code.
    ///
    /// Code equal to one of `sentinels` (ignoring surrounding whitespace) is a
    /// [`CandidateCode::Sentinel`]. When `extract_fenced` is set, a reply that
    /// contains a fenced code block is reduced to the first block.
    pub fn classify<'a>(
        &'a self,
        sentinels: &'a [String],
        extract_fenced: bool,
    ) -> CandidateCode<'a> {
        let trimmed = self.code.trim();
        if trimmed.is_empty() {
            return CandidateCode::Missing;
        }

        if let Some(marker) = sentinels.iter().find(|marker| marker.trim() == trimmed) {
            return CandidateCode::Sentinel(marker.as_str());
        }

        let source = if extract_fenced {
            extract_code(&self.code)
        } else {
            Cow::Borrowed(self.code.as_str())
        };

        if source.trim().is_empty() {
            CandidateCode::Missing
        } else {
            CandidateCode::Source(source)
        }
    }
}

/// Return the body of the first fenced code block in `text`, or `text` itself
/// if it contains no fenced block.
pub fn extract_code(text: &str) -> Cow<'_, str> {
    static FENCE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n(.*?)```").expect("compile fence regex")
    });

    match FENCE.captures(text).and_then(|caps| caps.get(1)) {
        Some(body) => Cow::Owned(body.as_str().to_string()),
        None => Cow::Borrowed(text),
    }
}

/// Load candidates from a path.
///
/// The path is either a `.jsonl` file of candidate records, or a directory of
/// `*.json` entry files. An entry file holds one problem's candidates:
///
/// ```json
/// { "task_id": "HumanEval/2", "gpt_cot": "def f(): ...", "qwen_selfdebug": "API error" }
/// ```
///
/// Every field other than `task_id` is named `<model>_<strategy>`. Fields that
/// are not strings (for example `null` when generation never ran) become
/// candidates with no code, so they are still counted as attempts.
#[tracing::instrument]
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>> {
    let candidates = if path.is_dir() {
        load_entry_dir(path)?
    } else {
        load_jsonl(path)?
    };

    tracing::info!(count = candidates.len(), "loaded candidates");
    Ok(candidates)
}

/// Write candidates as JSON Lines, one record per line.
#[tracing::instrument(skip(candidates), fields(count = candidates.len()))]
pub fn save_candidates(path: &Path, candidates: &[Candidate]) -> Result<()> {
    let mut content = String::new();
    for candidate in candidates {
        content.push_str(&serde_json::to_string(candidate).context("serialize candidate")?);
        content.push('\n');
    }
    std::fs::write(path, content).with_context(|| format!("write candidate file: {path:?}"))
}

fn load_jsonl(path: &Path) -> Result<Vec<Candidate>> {
    let content =
        read_to_string(path).with_context(|| format!("read candidate file: {path:?}"))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str::<Candidate>(line)
                .with_context(|| format!("parse candidate at {path:?} line {}", i + 1))
        })
        .collect()
}

fn load_entry_dir(dir: &Path) -> Result<Vec<Candidate>> {
    let pattern = dir.join("*.json");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| eyre!("invalid candidate directory: {dir:?}"))?;

    let mut files = glob(pattern)
        .with_context(|| format!("parse glob pattern {pattern:?}"))?
        .collect::<Result<Vec<PathBuf>, _>>()
        .context("read glob entry")?;
    files.sort();

    let mut candidates = Vec::new();
    for file in files {
        let content =
            read_to_string(&file).with_context(|| format!("read entry file: {file:?}"))?;
        let entry = serde_json::from_str::<Map<String, Value>>(&content)
            .with_context(|| format!("parse entry file: {file:?}"))?;
        let entry = parse_entry(entry).with_context(|| format!("read entry file: {file:?}"))?;
        candidates.extend(entry);
    }

    Ok(candidates)
}

fn parse_entry(mut entry: Map<String, Value>) -> Result<Vec<Candidate>> {
    let task_id = match entry.remove("task_id") {
        Some(Value::String(task_id)) => TaskId::from(task_id),
        Some(other) => bail!("task_id is not a string: {other}"),
        None => bail!("entry has no task_id"),
    };

    let mut candidates = Vec::new();
    for (key, value) in entry {
        let Some((model, strategy)) = key.split_once('_') else {
            tracing::debug!(%key, "skipping entry field that is not <model>_<strategy>");
            continue;
        };

        let code = match value {
            Value::String(code) => code,
            _ => String::new(),
        };

        candidates.push(
            Candidate::builder()
                .task_id(task_id.clone())
                .model(model)
                .strategy(strategy)
                .code(code)
                .build(),
        );
    }

    Ok(candidates)
}
