//! Models that generate candidates, and the generation stage itself.
//!
//! Every backend is an external program: the harness never speaks an LLM API
//! directly. A failed call does not stop generation; the candidate's code is
//! set to the error marker instead, which evaluation later rejects.

use std::fmt::{self, Display, Formatter};
use std::io::{ErrorKind, Write as _};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::str::FromStr;
use std::thread;

use color_eyre::{
    Result, Section, SectionExt,
    eyre::{Context, bail, eyre},
};
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};
use tap::Tap;

use crate::candidate::{Candidate, DEFAULT_SENTINEL};
use crate::problem::{Problem, ProblemSet};
use crate::strategy::{
    COT_TEMPLATE, DRAFT, FEEDBACK, PROBLEM_TEXT, RCOTD_CODER_TEMPLATE, RCOTD_REFINER_TEMPLATE,
    RCOTD_REVIEWER_TEMPLATE, SELF_DEBUG_TEMPLATE, Strategy, render,
};

/// Specifies the model used to generate candidates.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Model {
    /// Claude Code in print mode: https://www.claude.com/product/claude-code
    ClaudeCode { model: ModelClaudeCode },

    /// Any program that reads a prompt on stdin and writes the reply to stdout.
    ///
    /// This is how API clients for other model families (GPT, Gemini, Qwen)
    /// are plugged in.
    Command {
        /// The name candidates are attributed to.
        name: String,

        /// The program to run, or its name if it is in `$PATH`.
        program: String,
    },
}

impl Model {
    /// The name candidates from this model are attributed to.
    pub fn name(&self) -> String {
        match self {
            Model::ClaudeCode { model } => format!("claude-{model}"),
            Model::Command { name, .. } => name.clone(),
        }
    }

    /// Send `prompt` to the model and return its reply.
    #[tracing::instrument(skip(prompt), fields(model = %self))]
    pub fn call(&self, prompt: &str) -> Result<String> {
        let output = match self {
            Model::ClaudeCode { model } => Command::new("claude")
                .arg("--model")
                .arg(model.to_string())
                .arg("--print")
                .arg(prompt)
                .stdin(Stdio::null())
                .output()
                .with_context(|| format!("run {self}"))?,
            Model::Command { program, .. } => run_with_stdin(program, prompt)?,
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(eyre!("run {self}: exited with {}", output.status))
                .section(stdout.to_string().header("Stdout:"))
                .section(stderr.to_string().header("Stderr:"))
        }
    }

    /// Generate a candidate for `problem` using `strategy`.
    ///
    /// If any model call fails the candidate's code is the error marker.
    #[tracing::instrument(skip(problem), fields(task_id = %problem.task_id))]
    pub fn generate(&self, problem: &Problem, strategy: Strategy) -> Candidate {
        let code = match self.solve(&problem.prompt, strategy) {
            Ok(code) => code,
            Err(error) => {
                tracing::warn!(?error, "model call failed");
                DEFAULT_SENTINEL.to_string()
            }
        };

        Candidate::builder()
            .task_id(problem.task_id.clone())
            .model(self.name())
            .strategy(strategy.to_string())
            .code(code)
            .build()
    }

    fn solve(&self, problem_text: &str, strategy: Strategy) -> Result<String> {
        match strategy {
            Strategy::Cot => self.call(&render(COT_TEMPLATE, &[(PROBLEM_TEXT, problem_text)])),
            Strategy::SelfDebug => {
                self.call(&render(SELF_DEBUG_TEMPLATE, &[(PROBLEM_TEXT, problem_text)]))
            }
            Strategy::Rcotd => {
                let draft = self
                    .call(&render(RCOTD_CODER_TEMPLATE, &[(PROBLEM_TEXT, problem_text)]))
                    .context("coder draft")?;
                let feedback = self
                    .call(&render(
                        RCOTD_REVIEWER_TEMPLATE,
                        &[(PROBLEM_TEXT, problem_text), (DRAFT, &draft)],
                    ))
                    .context("reviewer feedback")?;
                self.call(&render(
                    RCOTD_REFINER_TEMPLATE,
                    &[
                        (PROBLEM_TEXT, problem_text),
                        (DRAFT, &draft),
                        (FEEDBACK, &feedback),
                    ],
                ))
                .context("refined solution")
            }
        }
    }
}

/// Generate a candidate for every problem, model, and strategy.
///
/// Candidates are produced problem by problem, so a partial run still covers
/// a prefix of the problem set for every combination.
pub fn generate(problems: &ProblemSet, models: &[Model], strategies: &[Strategy]) -> Vec<Candidate> {
    problems
        .iter()
        .flat_map(|problem| {
            models.iter().flat_map(move |model| {
                strategies
                    .iter()
                    .map(move |strategy| model.generate(problem, *strategy))
            })
        })
        .collect::<Vec<_>>()
        .tap(|candidates| tracing::info!(count = candidates.len(), "generated candidates"))
}

fn run_with_stdin(program: &str, input: &str) -> Result<Output> {
    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn model program {program:?}"))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| eyre!("no stdin for model program {program:?}"))?;

    // The prompt is written while the output is drained. A program that stops
    // reading early is judged by its exit status alone.
    thread::scope(|scope| -> Result<Output> {
        let writer = scope.spawn(move || {
            let mut stdin = stdin;
            match stdin.write_all(input.as_bytes()) {
                Err(error) if error.kind() == ErrorKind::BrokenPipe => Ok(()),
                written => written,
            }
        });

        let output = child
            .wait_with_output()
            .with_context(|| format!("wait for model program {program:?}"))?;
        writer
            .join()
            .map_err(|_| eyre!("prompt writer for model program {program:?} panicked"))?
            .with_context(|| format!("write prompt to model program {program:?}"))?;
        Ok(output)
    })
}

impl Display for Model {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Model::ClaudeCode { model } => write!(f, "claude-code:{model}"),
            Model::Command { name, program } => write!(f, "command:{name}={program}"),
        }
    }
}

/// Parses `claude-code:<model>`, `command:<name>=<program>`, or
/// `command:<program>` (named after the program's file stem).
impl FromStr for Model {
    type Err = color_eyre::eyre::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some((backend, spec)) = s.split_once(':') else {
            bail!("model must be `<backend>:<spec>`, got {s:?}");
        };

        match backend {
            "claude-code" => Ok(Model::ClaudeCode {
                model: spec.parse().context("parse Claude Code model")?,
            }),
            "command" => {
                let (name, program) = match spec.split_once('=') {
                    Some((name, program)) => (name.to_string(), program.to_string()),
                    None => {
                        let name = Path::new(spec)
                            .file_stem()
                            .map(|stem| stem.to_string_lossy().to_string())
                            .ok_or_else(|| eyre!("cannot name model program {spec:?}"))?;
                        (name, spec.to_string())
                    }
                };
                if name.is_empty() || program.is_empty() {
                    bail!("model command needs a name and a program, got {spec:?}");
                }
                Ok(Model::Command { name, program })
            }
            other => Err(eyre!("unknown model backend {other:?}"))
                .suggestion("use `claude-code:<model>` or `command:<name>=<program>`"),
        }
    }
}

/// Specifies the model to use for the Claude Code backend.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelClaudeCode {
    /// Alias for the latest Sonnet model.
    Sonnet,

    /// Alias for the latest Haiku model.
    Haiku,

    /// Alias for the latest Opus model.
    Opus,

    /// A custom full name for a model, e.g. "claude-sonnet-4-5-20250929"
    #[serde(untagged)]
    Custom(String),
}

derive_fromstr_from_deserialize!(ModelClaudeCode);
derive_display_from_serialize!(ModelClaudeCode);
