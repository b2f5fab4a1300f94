//! Step engine and the wallet step library
//!
//! Scenario steps are matched against a [`StepRegistry`] and executed by a
//! [`StepComposer`]. The library modules register the wallet's steps; most
//! of the proof presentation steps are composites built from the
//! onboarding, connection and credential offer primitives.

mod composer;
mod connection;
mod credential;
mod onboarding;
mod proof;
mod registry;
mod table;
mod text;

pub use composer::StepComposer;
pub use registry::{
    child, child_with_table, ChildStep, StepAction, StepDefinition, StepFuture, StepHandler,
    StepInput, StepMatch, StepRegistry,
};
pub use table::{DataTable, TableRow};
pub use text::{parse_block, parse_line, Step, StepKeyword};

use crate::common::Result;
use crate::context::ScenarioContext;
use crate::pages::{Element, Page, PageKind};

/// Registry holding every wallet step
pub fn wallet_steps() -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    onboarding::register(&mut registry)?;
    connection::register(&mut registry)?;
    credential::register(&mut registry)?;
    proof::register(&mut registry)?;
    tracing::debug!(definitions = registry.len(), "Step library registered");
    Ok(registry)
}

/// Open a fresh handle for `kind` and wait for the screen to show
pub(crate) async fn arrive(ctx: &mut ScenarioContext, kind: PageKind) -> Result<Page> {
    let page = ctx.open_page(kind);
    page.wait_until_present(ctx.waits().screen).await?;
    Ok(page)
}

/// Tap `element` on the current `kind` handle and track the screen it leads to
pub(crate) async fn advance(
    ctx: &mut ScenarioContext,
    kind: PageKind,
    element: Element,
) -> Result<Page> {
    let page = ctx.page(kind)?.clone();
    let next = page.select(element).await?;
    ctx.set_page(next.clone());
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_registers() {
        let registry = wallet_steps().unwrap();
        assert!(registry.len() > 40);
        assert!(registry.definitions().iter().any(StepDefinition::is_composite));
    }

    #[test]
    fn test_overlapping_proof_request_steps_resolve() {
        let registry = wallet_steps().unwrap();
        let found = registry
            .find(
                StepKeyword::When,
                "the user has a proof request for citizenship including proof of non-revocation at last 10 minutes",
            )
            .unwrap();
        assert_eq!(found.captures[1].1, "last 10 minutes");

        let found = registry
            .find(StepKeyword::Given, "the holder has another credential of photo_id")
            .unwrap();
        assert_eq!(found.definition.params(), ["credential_2"]);
    }
}
