//! Prompting strategies and their templates.

use std::sync::LazyLock;

use clap::ValueEnum;
use indoc::indoc;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_plain::{derive_display_from_serialize, derive_fromstr_from_deserialize};

/// How a model is prompted to produce a solution.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Chain-of-thought: reason step by step, then give the code.
    Cot,

    /// Self-debug: silently test and fix, then give only the final code.
    #[serde(rename = "selfdebug")]
    #[value(name = "selfdebug")]
    SelfDebug,

    /// Multi-role refinement: a coder drafts, a reviewer critiques, and a
    /// refiner produces the final code from both.
    Rcotd,
}

derive_fromstr_from_deserialize!(Strategy);
derive_display_from_serialize!(Strategy);

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Cot, Strategy::SelfDebug, Strategy::Rcotd];
}

/// Placeholder for the problem's prompt.
pub const PROBLEM_TEXT: &str = "problem_text";

/// Placeholder for the coder's draft in the RCOTD review and refine steps.
pub const DRAFT: &str = "draft";

/// Placeholder for the reviewer's feedback in the RCOTD refine step.
pub const FEEDBACK: &str = "feedback";

pub const COT_TEMPLATE: &str = indoc! {r#"
    You are an expert Python programmer. Solve the following problem.

    Think through the problem step by step and explain your reasoning. Then
    give the complete solution, including the function signature and any
    imports, in a single ```python code block.

    {{problem_text}}
"#};

pub const SELF_DEBUG_TEMPLATE: &str = indoc! {r#"
    You are an expert Python programmer. Solve the following problem.

    Write a solution, test it against the examples in the docstring, and fix
    any bugs you find. Reply with only the final, corrected code in a single
    ```python code block.

    {{problem_text}}
"#};

pub const RCOTD_CODER_TEMPLATE: &str = indoc! {r#"
    You are the coder. Write a first implementation of the following problem,
    reasoning step by step before the code. Put the code in a single ```python
    code block.

    {{problem_text}}
"#};

pub const RCOTD_REVIEWER_TEMPLATE: &str = indoc! {r#"
    You are the reviewer. Below is a problem and a draft solution. List every
    bug, missed edge case, or mismatch with the docstring that you can find in
    the draft. Do not rewrite the code.

    Problem:
    {{problem_text}}

    Draft:
    {{draft}}
"#};

pub const RCOTD_REFINER_TEMPLATE: &str = indoc! {r#"
    You are the refiner. Below is a problem, a draft solution, and a review of
    the draft. Produce the final, corrected solution, addressing every point in
    the review. Reply with only the code in a single ```python code block.

    Problem:
    {{problem_text}}

    Draft:
    {{draft}}

    Review:
    {{feedback}}
"#};

/// Substitute `{{name}}` placeholders in `template`.
///
/// Substitution is a single pass over the template: placeholders that appear
/// inside substituted values are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\{\{(\w+)\}\}").expect("compile placeholder regex")
    });

    PLACEHOLDER
        .replace_all(template, |captures: &Captures<'_>| {
            values
                .iter()
                .find(|(name, _)| *name == &captures[1])
                .map_or_else(|| captures[0].to_string(), |(_, value)| value.to_string())
        })
        .into_owned()
}
