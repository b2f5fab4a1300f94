//! Step definition registry
//!
//! Definitions are registered once at startup. A pattern is plain step text
//! with `{name}` placeholders; it compiles to an anchored regex whose
//! placeholders match lazily.

use std::fmt;

use futures_util::future::BoxFuture;
use regex::Regex;

use crate::common::{Error, Result};
use crate::context::ScenarioContext;

use super::composer::StepComposer;
use super::table::DataTable;
use super::text::StepKeyword;

/// Future returned by a step handler
pub type StepFuture<'a> = BoxFuture<'a, Result<()>>;

/// A primitive step implementation
pub type StepHandler =
    for<'a> fn(&'a StepComposer, &'a mut ScenarioContext, StepInput) -> StepFuture<'a>;

pub const GIVEN: &[StepKeyword] = &[StepKeyword::Given];
pub const WHEN: &[StepKeyword] = &[StepKeyword::When];
pub const THEN: &[StepKeyword] = &[StepKeyword::Then];
pub const GIVEN_WHEN: &[StepKeyword] = &[StepKeyword::Given, StepKeyword::When];
pub const WHEN_THEN: &[StepKeyword] = &[StepKeyword::When, StepKeyword::Then];
pub const ANY: &[StepKeyword] = &[StepKeyword::Given, StepKeyword::When, StepKeyword::Then];

/// One line of a composite step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildStep {
    /// Step line, keyword included, with `{name}` references to the
    /// parent's captures
    pub line: &'static str,
    /// Whether the child receives the parent's data table
    pub inherit_table: bool,
}

/// A child line that runs without a table
pub const fn child(line: &'static str) -> ChildStep {
    ChildStep {
        line,
        inherit_table: false,
    }
}

/// A child line that receives the parent's data table
pub const fn child_with_table(line: &'static str) -> ChildStep {
    ChildStep {
        line,
        inherit_table: true,
    }
}

/// What a matched step does
#[derive(Clone, Copy)]
pub enum StepAction {
    Run(StepHandler),
    Expand(&'static [ChildStep]),
}

impl fmt::Debug for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepAction::Run(_) => write!(f, "Run(..)"),
            StepAction::Expand(children) => f.debug_tuple("Expand").field(children).finish(),
        }
    }
}

/// Parameters handed to a primitive step
#[derive(Debug, Clone, Default)]
pub struct StepInput {
    /// The step as written, keyword included
    pub step: String,
    pub captures: Vec<(String, String)>,
    pub table: Option<DataTable>,
}

impl StepInput {
    /// Captured placeholder value
    pub fn arg(&self, name: &str) -> Result<&str> {
        self.opt(name).ok_or_else(|| Error::MissingParameter {
            step: self.step.clone(),
            name: name.to_string(),
        })
    }

    /// Captured placeholder value, if the matched pattern has it
    pub fn opt(&self, name: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The attached data table
    pub fn table(&self) -> Result<&DataTable> {
        self.table
            .as_ref()
            .ok_or_else(|| Error::MissingTable(self.step.clone()))
    }
}

/// A registered step
#[derive(Debug)]
pub struct StepDefinition {
    pub keywords: &'static [StepKeyword],
    pub pattern: &'static str,
    pub action: StepAction,
    regex: Regex,
    params: Vec<String>,
    literal_len: usize,
}

impl StepDefinition {
    pub fn new(
        keywords: &'static [StepKeyword],
        pattern: &'static str,
        action: StepAction,
    ) -> Result<Self> {
        let compiled = compile_pattern(pattern)?;
        Ok(Self {
            keywords,
            pattern,
            action,
            regex: compiled.regex,
            params: compiled.params,
            literal_len: compiled.literal_len,
        })
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.action, StepAction::Expand(_))
    }

    /// Captures for `text` if this definition accepts it
    fn captures(&self, keyword: StepKeyword, text: &str) -> Option<Vec<(String, String)>> {
        if !self.keywords.contains(&keyword) {
            return None;
        }
        let caps = self.regex.captures(text)?;
        Some(
            self.params
                .iter()
                .map(|name| {
                    let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                    (name.clone(), value.to_string())
                })
                .collect(),
        )
    }
}

/// A definition selected for a step
#[derive(Debug)]
pub struct StepMatch<'r> {
    pub definition: &'r StepDefinition,
    pub captures: Vec<(String, String)>,
}

/// Ordered table of step definitions
#[derive(Debug, Default)]
pub struct StepRegistry {
    definitions: Vec<StepDefinition>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        keywords: &'static [StepKeyword],
        pattern: &'static str,
        action: StepAction,
    ) -> Result<&mut Self> {
        self.definitions
            .push(StepDefinition::new(keywords, pattern, action)?);
        Ok(self)
    }

    /// Register a primitive step
    pub fn run(
        &mut self,
        keywords: &'static [StepKeyword],
        pattern: &'static str,
        handler: StepHandler,
    ) -> Result<&mut Self> {
        self.register(keywords, pattern, StepAction::Run(handler))
    }

    /// Register a composite step
    pub fn expand(
        &mut self,
        keywords: &'static [StepKeyword],
        pattern: &'static str,
        children: &'static [ChildStep],
    ) -> Result<&mut Self> {
        self.register(keywords, pattern, StepAction::Expand(children))
    }

    pub fn definitions(&self) -> &[StepDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Pick the definition for a step
    ///
    /// The match with the most literal text wins; ties go to the earliest
    /// registered definition.
    pub fn find(&self, keyword: StepKeyword, text: &str) -> Result<StepMatch<'_>> {
        let mut best: Option<StepMatch<'_>> = None;
        for definition in &self.definitions {
            let Some(captures) = definition.captures(keyword, text) else {
                continue;
            };
            let better = match &best {
                Some(current) => definition.literal_len > current.definition.literal_len,
                None => true,
            };
            if better {
                best = Some(StepMatch {
                    definition,
                    captures,
                });
            }
        }

        best.ok_or_else(|| Error::UndefinedStep {
            keyword: keyword.to_string(),
            text: text.to_string(),
        })
    }
}

/// Piece of a `{name}` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'p> {
    Literal(&'p str),
    Param(&'p str),
}

/// Split a template into literal text and `{name}` references
pub(crate) fn segments(pattern: &str) -> Result<Vec<Segment<'_>>> {
    let invalid = |reason: &str| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let mut out = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            out.push(Segment::Literal(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
        let name = &after[..close];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("placeholder names must be letters, digits or '_'"));
        }
        out.push(Segment::Param(name));
        rest = &after[close + 1..];
    }
    if rest.contains('}') {
        return Err(invalid("unmatched '}'"));
    }
    if !rest.is_empty() {
        out.push(Segment::Literal(rest));
    }
    Ok(out)
}

struct CompiledPattern {
    regex: Regex,
    params: Vec<String>,
    literal_len: usize,
}

fn compile_pattern(pattern: &str) -> Result<CompiledPattern> {
    let mut source = String::from("^");
    let mut params: Vec<String> = Vec::new();
    let mut literal_len = 0;

    for segment in segments(pattern)? {
        match segment {
            Segment::Literal(text) => {
                literal_len += text.len();
                source.push_str(&regex::escape(text));
            }
            Segment::Param(name) => {
                if params.iter().any(|p| p == name) {
                    return Err(Error::InvalidPattern {
                        pattern: pattern.to_string(),
                        reason: format!("placeholder '{name}' appears twice"),
                    });
                }
                source.push_str(&format!("(?P<{name}>.+?)"));
                params.push(name.to_string());
            }
        }
    }
    source.push('$');

    let regex = Regex::new(&source).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    Ok(CompiledPattern {
        regex,
        params,
        literal_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn noop<'a>(
        _composer: &'a StepComposer,
        _ctx: &'a mut ScenarioContext,
        _input: StepInput,
    ) -> StepFuture<'a> {
        async move { Ok(()) }.boxed()
    }

    #[test]
    fn test_captures_placeholders() {
        let mut registry = StepRegistry::new();
        registry
            .run(ANY, "the user has a proof request for {proof}", noop)
            .unwrap();

        let found = registry
            .find(StepKeyword::Given, "the user has a proof request for citizenship")
            .unwrap();
        assert_eq!(
            found.captures,
            vec![("proof".to_string(), "citizenship".to_string())]
        );
    }

    #[test]
    fn test_most_literal_text_wins() {
        let mut registry = StepRegistry::new();
        registry
            .run(GIVEN, "the user has a proof request for {proof}", noop)
            .unwrap()
            .run(
                GIVEN,
                "the user has a proof request for {proof} including proof of non-revocation at {interval}",
                noop,
            )
            .unwrap();

        let found = registry
            .find(
                StepKeyword::Given,
                "the user has a proof request for citizenship including proof of non-revocation at -86400:now",
            )
            .unwrap();
        assert_eq!(found.definition.params(), ["proof", "interval"]);
        assert_eq!(found.captures[0].1, "citizenship");
        assert_eq!(found.captures[1].1, "-86400:now");
    }

    #[test]
    fn test_ties_go_to_first_registered() {
        let mut registry = StepRegistry::new();
        registry
            .run(WHEN, "they select {a}", noop)
            .unwrap()
            .expand(WHEN, "they select {b}", &[])
            .unwrap();

        let found = registry.find(StepKeyword::When, "they select Share").unwrap();
        assert!(!found.definition.is_composite());
    }

    #[test]
    fn test_keyword_must_be_accepted() {
        let mut registry = StepRegistry::new();
        registry.run(THEN, "they are brought Home", noop).unwrap();

        let err = registry
            .find(StepKeyword::Given, "they are brought Home")
            .unwrap_err();
        assert!(matches!(err, Error::UndefinedStep { .. }));
        assert!(registry.find(StepKeyword::Then, "they are brought Home").is_ok());
    }

    #[test]
    fn test_literal_text_is_escaped_and_anchored() {
        let mut registry = StepRegistry::new();
        registry
            .run(WHEN, "the Holder scans the QR code sent by the \"{agent}\"", noop)
            .unwrap()
            .run(THEN, "they select Share (1)", noop)
            .unwrap();

        let found = registry
            .find(
                StepKeyword::When,
                "the Holder scans the QR code sent by the \"verifier\"",
            )
            .unwrap();
        assert_eq!(found.captures[0].1, "verifier");
        assert!(registry.find(StepKeyword::Then, "they select Share (1)").is_ok());
        assert!(registry.find(StepKeyword::Then, "they select Share 1").is_err());
        assert!(registry
            .find(StepKeyword::Then, "then they select Share (1)")
            .is_err());
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["open {brace", "bad {na me}", "twice {a} {a}", "stray }"] {
            let err = StepDefinition::new(ANY, pattern, StepAction::Expand(&[])).unwrap_err();
            assert!(matches!(err, Error::InvalidPattern { .. }), "{pattern}");
        }
    }

    #[test]
    fn test_missing_parameter_and_table() {
        let input = StepInput {
            step: "Given x".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            input.arg("proof"),
            Err(Error::MissingParameter { .. })
        ));
        assert!(matches!(input.table(), Err(Error::MissingTable(_))));
    }
}
