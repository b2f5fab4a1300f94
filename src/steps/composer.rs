//! Step composition
//!
//! The composer dispatches a step to its definition. Primitive steps run
//! their handler; composite steps run their child lines in order against
//! the same context, recursing through the composer. Every running step
//! sits on the context's expansion chain, which bounds the recursion.

use futures_util::FutureExt;
use tracing::Instrument;

use crate::common::{Error, Result};
use crate::context::ScenarioContext;

use super::registry::{segments, Segment, StepAction, StepFuture, StepInput, StepMatch, StepRegistry};
use super::table::DataTable;
use super::text::{parse_block, parse_line, Step};

/// Runs steps against a registry
#[derive(Debug)]
pub struct StepComposer {
    registry: StepRegistry,
    max_depth: usize,
}

impl StepComposer {
    pub const DEFAULT_MAX_DEPTH: usize = 50;

    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Run one step, expanding composites
    pub fn run_step<'a>(&'a self, ctx: &'a mut ScenarioContext, step: Step) -> StepFuture<'a> {
        async move {
            let label = step.to_string();
            if ctx.expansion.len() >= self.max_depth {
                let mut chain = ctx.expansion.clone();
                chain.push(label);
                tracing::error!(limit = self.max_depth, "Step expansion too deep");
                return Err(Error::ExpansionDepthExceeded {
                    limit: self.max_depth,
                    chain,
                });
            }

            let found = self.registry.find(step.keyword, &step.text)?;
            let span = tracing::debug_span!("step", depth = ctx.expansion.len(), step = %label);
            ctx.expansion.push(label);
            let result = self.dispatch(ctx, found, step).instrument(span).await;
            ctx.expansion.pop();
            result
        }
        .boxed()
    }

    /// Run a block of step lines in order
    pub async fn execute_steps(&self, ctx: &mut ScenarioContext, block: &str) -> Result<()> {
        self.execute_steps_with_table(ctx, block, None).await
    }

    /// Run a block of step lines, attaching `table` to the last step
    pub async fn execute_steps_with_table(
        &self,
        ctx: &mut ScenarioContext,
        block: &str,
        table: Option<DataTable>,
    ) -> Result<()> {
        let mut steps = parse_block(block)?;
        if let Some(last) = steps.last_mut() {
            last.table = table;
        }
        for step in steps {
            self.run_step(ctx, step).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        ctx: &mut ScenarioContext,
        found: StepMatch<'_>,
        step: Step,
    ) -> Result<()> {
        let label = step.to_string();
        match found.definition.action {
            StepAction::Run(handler) => {
                tracing::debug!("Running step");
                let input = StepInput {
                    step: label,
                    captures: found.captures,
                    table: step.table,
                };
                handler(self, ctx, input).await
            }
            StepAction::Expand(children) => {
                tracing::debug!(children = children.len(), "Expanding step");
                let mut previous = Some(step.keyword);
                for child in children {
                    let line = interpolate(child.line, &found.captures, &label)?;
                    let Some(mut next) = parse_line(&line, previous)? else {
                        continue;
                    };
                    previous = Some(next.keyword);
                    if child.inherit_table {
                        next.table = step.table.clone();
                    }
                    self.run_step(ctx, next).await?;
                }
                Ok(())
            }
        }
    }
}

/// Substitute `{name}` references with captured values
fn interpolate(template: &str, captures: &[(String, String)], step: &str) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    for segment in segments(template)? {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Param(name) => {
                let value = captures
                    .iter()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| Error::MissingParameter {
                        step: step.to_string(),
                        name: name.to_string(),
                    })?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::CredentialFixture;
    use crate::steps::registry::{child, child_with_table, ChildStep, ANY, GIVEN, THEN, WHEN};
    use crate::testing::mock::MockNetwork;
    use pretty_assertions::assert_eq;

    /// Records the `name` capture in the credential collection
    fn record<'a>(
        _steps: &'a StepComposer,
        ctx: &'a mut ScenarioContext,
        input: StepInput,
    ) -> StepFuture<'a> {
        async move {
            let name = input.arg("name")?.to_string();
            let rows = input.table.as_ref().map(DataTable::len).unwrap_or_default();
            let fixture = CredentialFixture::new(&format!("rows_{rows}"), Vec::<String>::new());
            ctx.add_credential(name, fixture);
            Ok(())
        }
        .boxed()
    }

    /// Records every row of its table, branching on the data
    fn record_rows<'a>(
        steps: &'a StepComposer,
        ctx: &'a mut ScenarioContext,
        input: StepInput,
    ) -> StepFuture<'a> {
        async move {
            let table = input.table()?;
            for row in table.rows() {
                let name = row.get("name")?;
                if name.is_empty() {
                    continue;
                }
                steps
                    .execute_steps(ctx, &format!("Given I record {name}"))
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    const RECORD_BOTH: &[ChildStep] = &[
        child("Given I record {first}"),
        child("And I record {second}"),
    ];
    const RECORD_WITH_TABLE: &[ChildStep] = &[child_with_table("Then I record {name}")];
    const LOOP: &[ChildStep] = &[child("Given I loop")];
    const UNKNOWN_PARAMETER: &[ChildStep] = &[child("Then I record {nothing}")];

    fn composer(max_depth: usize) -> StepComposer {
        let mut registry = StepRegistry::new();
        registry
            .run(ANY, "I record {name}", record)
            .unwrap()
            .run(GIVEN, "I record the rows", record_rows)
            .unwrap()
            .expand(GIVEN, "I record {first} then {second}", RECORD_BOTH)
            .unwrap()
            .expand(WHEN, "I record {name} with the table", RECORD_WITH_TABLE)
            .unwrap()
            .expand(GIVEN, "I loop", LOOP)
            .unwrap()
            .expand(THEN, "I use {missing}", UNKNOWN_PARAMETER)
            .unwrap();
        StepComposer::new(registry).with_max_depth(max_depth)
    }

    fn recorded(ctx: &ScenarioContext) -> Vec<String> {
        ctx.credentials().iter().map(|(k, _)| k.to_string()).collect()
    }

    #[tokio::test]
    async fn test_composite_matches_running_children_by_hand() {
        let steps = composer(50);

        let network = MockNetwork::new();
        let mut composed = network.context("composed");
        steps
            .execute_steps(&mut composed, "Given I record alpha then beta")
            .await
            .unwrap();

        let mut by_hand = network.context("by hand");
        steps
            .execute_steps(&mut by_hand, "Given I record alpha\nAnd I record beta")
            .await
            .unwrap();

        assert_eq!(recorded(&composed), vec!["alpha", "beta"]);
        assert_eq!(recorded(&composed), recorded(&by_hand));
        assert!(composed.expansion_chain().is_empty());
    }

    #[tokio::test]
    async fn test_child_inherits_table() {
        let steps = composer(50);
        let mut ctx = MockNetwork::new().context("table");
        let table = DataTable::from_strs(&["name"], &[&["a"], &["b"]]).unwrap();

        steps
            .execute_steps_with_table(&mut ctx, "When I record gamma with the table", Some(table))
            .await
            .unwrap();

        let fixture = ctx.credentials().get("gamma").unwrap();
        assert_eq!(fixture.schema_name, "rows_2");
    }

    #[tokio::test]
    async fn test_handler_branches_on_table_data() {
        let steps = composer(50);
        let mut ctx = MockNetwork::new().context("rows");
        let table = DataTable::from_strs(&["name"], &[&["x"], &[""], &["y"]]).unwrap();

        steps
            .execute_steps_with_table(&mut ctx, "Given I record the rows", Some(table))
            .await
            .unwrap();

        assert_eq!(recorded(&ctx), vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_self_referencing_composite_hits_depth_guard() {
        let steps = composer(8);
        let mut ctx = MockNetwork::new().context("loop");

        let err = steps
            .execute_steps(&mut ctx, "Given I loop")
            .await
            .unwrap_err();

        match err {
            Error::ExpansionDepthExceeded { limit, chain } => {
                assert_eq!(limit, 8);
                assert_eq!(chain.len(), 9);
                assert!(chain.iter().all(|s| s == "Given I loop"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(ctx.expansion_chain().is_empty());
    }

    #[tokio::test]
    async fn test_undefined_step_and_missing_reference() {
        let steps = composer(50);
        let mut ctx = MockNetwork::new().context("errors");

        let err = steps
            .execute_steps(&mut ctx, "When nobody defined this")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UndefinedStep { .. }));

        let err = steps
            .execute_steps(&mut ctx, "Then I use something")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingParameter { .. }));
    }

    #[tokio::test]
    async fn test_first_failure_stops_the_block() {
        let steps = composer(50);
        let mut ctx = MockNetwork::new().context("stop");

        let result = steps
            .execute_steps(
                &mut ctx,
                "Given I record one\nWhen nobody defined this\nThen I record two",
            )
            .await;

        assert!(result.is_err());
        assert_eq!(recorded(&ctx), vec!["one"]);
    }

    #[test]
    fn test_interpolate() {
        let captures = vec![("proof".to_string(), "citizenship".to_string())];
        assert_eq!(
            interpolate("When the Holder receives a proof request of {proof}", &captures, "s")
                .unwrap(),
            "When the Holder receives a proof request of citizenship"
        );
    }
}
