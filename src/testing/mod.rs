//! Feature runner
//!
//! Loads YAML feature files, expands them into scenarios and runs each one
//! through the step library, against a live device or a simulated wallet.

mod config;
pub mod mock;
mod runner;

pub use config::*;
pub use runner::{print_summary, LiveSessions, MockSessions, Runner, SessionFactory, TestResult};
