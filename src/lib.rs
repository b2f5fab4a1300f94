//! wallet-bdd - behavioural end-to-end tests for mobile identity wallets
//!
//! Scenarios are Gherkin-style steps dispatched through a [`steps::StepComposer`].
//! Steps drive the wallet through page objects, ask issuer and verifier
//! agents to act, and check what the wallet shows against fixtures.

pub mod agents;
pub mod assertions;
pub mod cli;
pub mod commands;
pub mod common;
pub mod context;
pub mod fixtures;
pub mod pages;
pub mod reconcile;
pub mod steps;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use context::ScenarioContext;
pub use steps::{StepComposer, StepRegistry};
