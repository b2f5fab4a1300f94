//! Step lines and step blocks
//!
//! A block is Gherkin-style text, one step per line. `And` and `But` take
//! the keyword of the step before them; blank lines and `#` comments are
//! skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

use super::table::DataTable;

/// Kind of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKeyword {
    Given,
    When,
    Then,
}

impl fmt::Display for StepKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKeyword::Given => write!(f, "Given"),
            StepKeyword::When => write!(f, "When"),
            StepKeyword::Then => write!(f, "Then"),
        }
    }
}

/// One step ready for dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
    pub table: Option<DataTable>,
}

impl Step {
    pub fn new(keyword: StepKeyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            table: None,
        }
    }

    pub fn with_table(mut self, table: Option<DataTable>) -> Self {
        self.table = table;
        self
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword, self.text)
    }
}

/// Parse a single line. Returns `None` for blank and comment lines.
///
/// `previous` is the keyword `And`/`But` continue from.
pub fn parse_line(line: &str, previous: Option<StepKeyword>) -> Result<Option<Step>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let keyword = match word.to_lowercase().as_str() {
        "given" => StepKeyword::Given,
        "when" => StepKeyword::When,
        "then" => StepKeyword::Then,
        "and" | "but" | "*" => previous.unwrap_or(StepKeyword::Given),
        _ => return Err(Error::MalformedStep(line.to_string())),
    };

    let text = rest.trim();
    if text.is_empty() {
        return Err(Error::MalformedStep(line.to_string()));
    }
    Ok(Some(Step::new(keyword, text)))
}

/// Parse a block of step lines
pub fn parse_block(block: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    let mut previous = None;
    for line in block.lines() {
        if let Some(step) = parse_line(line, previous)? {
            previous = Some(step.keyword);
            steps.push(step);
        }
    }
    Ok(steps)
}
