//! Feature file types
//!
//! Defines the data structures for deserializing YAML feature files and
//! expanding them into runnable scenarios.

use std::path::Path;

use serde::Deserialize;

use crate::common::{Error, Result};
use crate::steps::{parse_line, DataTable, Step, StepKeyword};

/// A feature file
#[derive(Deserialize, Debug)]
pub struct Feature {
    /// Name of the feature
    pub name: String,
    /// Optional description of what the feature covers
    pub description: Option<String>,
    /// Tags inherited by every scenario
    #[serde(default)]
    pub tags: Vec<String>,
    /// Steps run before every scenario
    #[serde(default)]
    pub background: Vec<StepEntry>,
    pub scenarios: Vec<ScenarioDef>,
}

/// A scenario or scenario outline as written
#[derive(Deserialize, Debug)]
pub struct ScenarioDef {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepEntry>,
    /// Outline rows; the first row is the header and each further row
    /// produces one scenario with `<column>` placeholders filled in
    pub examples: Option<Vec<Vec<String>>>,
}

/// A step line, optionally carrying a data table
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum StepEntry {
    Text(String),
    WithTable {
        step: String,
        /// Rows of cells, the first being the header
        table: Vec<Vec<String>>,
    },
}

impl StepEntry {
    fn parts(&self) -> (&str, Option<&Vec<Vec<String>>>) {
        match self {
            StepEntry::Text(step) => (step, None),
            StepEntry::WithTable { step, table } => (step, Some(table)),
        }
    }
}

/// A concrete scenario ready to run
#[derive(Debug, Clone)]
pub struct ScenarioRun {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
}

impl ScenarioRun {
    /// Whether the scenario passes a tag filter
    ///
    /// An empty filter accepts everything. `~tag` entries exclude; plain
    /// entries require at least one of them to be present.
    pub fn matches_tags(&self, filter: &[String]) -> bool {
        let has = |tag: &str| {
            let tag = tag.trim_start_matches('@');
            self.tags.iter().any(|t| t.trim_start_matches('@') == tag)
        };

        let (excluded, wanted): (Vec<&String>, Vec<&String>) =
            filter.iter().partition(|t| t.starts_with('~'));
        if excluded.iter().any(|t| has(&t[1..])) {
            return false;
        }
        wanted.is_empty() || wanted.iter().any(|t| has(t))
    }
}

impl Feature {
    /// Load a feature from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse feature file: {}", e)))
    }

    /// Expand outlines and prepend the background to every scenario
    pub fn scenarios(&self) -> Result<Vec<ScenarioRun>> {
        let mut runs = Vec::new();
        for def in &self.scenarios {
            let mut tags = self.tags.clone();
            tags.extend(def.tags.iter().cloned());

            let Some(examples) = &def.examples else {
                runs.push(self.build(&def.name, tags, &def.steps, &[])?);
                continue;
            };

            let table = DataTable::from_rows(examples.clone())?;
            for (i, row) in table.rows().enumerate() {
                let values: Vec<(&str, &str)> = table
                    .headers()
                    .iter()
                    .filter_map(|h| row.opt(h).map(|v| (h.as_str(), v)))
                    .collect();
                let name = format!("{} (example {})", substitute(&def.name, &values), i + 1);
                runs.push(self.build(&name, tags.clone(), &def.steps, &values)?);
            }
        }
        Ok(runs)
    }

    fn build(
        &self,
        name: &str,
        tags: Vec<String>,
        steps: &[StepEntry],
        values: &[(&str, &str)],
    ) -> Result<ScenarioRun> {
        let mut parsed = parse_entries(&self.background, &[])?;
        parsed.extend(parse_entries(steps, values)?);
        Ok(ScenarioRun {
            feature: self.name.clone(),
            name: name.to_string(),
            tags,
            steps: parsed,
        })
    }
}

fn substitute(text: &str, values: &[(&str, &str)]) -> String {
    values.iter().fold(text.to_string(), |acc, (column, value)| {
        acc.replace(&format!("<{column}>"), value)
    })
}

fn parse_entries(entries: &[StepEntry], values: &[(&str, &str)]) -> Result<Vec<Step>> {
    let mut steps = Vec::with_capacity(entries.len());
    let mut previous: Option<StepKeyword> = None;
    for entry in entries {
        let (line, table) = entry.parts();
        let line = substitute(line, values);
        let step = parse_line(&line, previous)?.ok_or_else(|| Error::MalformedStep(line.clone()))?;
        let table = table
            .map(|rows| {
                let rows = rows
                    .iter()
                    .map(|row| row.iter().map(|cell| substitute(cell, values)).collect())
                    .collect();
                DataTable::from_rows(rows)
            })
            .transpose()?;
        previous = Some(step.keyword);
        steps.push(step.with_table(table));
    }
    Ok(steps)
}
