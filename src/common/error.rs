//! Error types for the wallet test runner
//!
//! Every failure is scenario-fatal. Messages name the step, fixture or
//! screen involved so a failed run can be diagnosed from the report alone.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the wallet test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Step Dispatch Errors ===
    #[error("No step definition matches '{keyword} {text}'")]
    UndefinedStep { keyword: String, text: String },

    #[error("Step expansion exceeded {limit} levels: {}", chain.join(" -> "))]
    ExpansionDepthExceeded { limit: usize, chain: Vec<String> },

    #[error("Invalid step pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Malformed step line '{0}'. Steps must start with Given, When, Then, And or But")]
    MalformedStep(String),

    #[error("Step '{step}' has no parameter named '{name}'")]
    MissingParameter { step: String, name: String },

    #[error("Step '{0}' requires a data table")]
    MissingTable(String),

    #[error("Data table has no column '{0}'")]
    MissingColumn(String),

    // === Context Errors ===
    #[error("Scenario context has no {0}. An earlier step must set it")]
    MissingContext(String),

    // === Lookup Errors ===
    #[error("No credential details in table data for {agent_type}")]
    NoExpectationRow { agent_type: String },

    // === Fixture Errors ===
    #[error("Fixture not found: {path}")]
    FixtureMissing { path: String },

    #[error("Fixture '{path}' is malformed: {reason}")]
    FixtureMalformed { path: String, reason: String },

    #[error("Invalid revocation interval '{0}'. Use '<from>:<to>' offsets or 'last N minutes'")]
    InvalidInterval(String),

    // === Assertion Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),

    // === UI Errors ===
    #[error("Element {element} not found on {page}")]
    ElementNotFound { page: String, element: String },

    #[error("Timed out after {secs:.1}s waiting for {page} to {condition}")]
    PollTimeout {
        page: String,
        condition: String,
        secs: f64,
    },

    #[error("Driver error: {0}")]
    Driver(String),

    // === Agent Errors ===
    #[error("{role} agent error: {message}")]
    Agent { role: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::TestAssertion(message.into())
    }

    /// Create a missing context error for the named slot
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingContext(what.into())
    }

    /// Create an agent error for a role
    pub fn agent(role: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Agent {
            role: role.to_string(),
            message: message.into(),
        }
    }

    /// Create a fixture malformed error
    pub fn fixture_malformed(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        Self::FixtureMalformed {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable code used in run summaries
    pub fn code(&self) -> &'static str {
        match self {
            Error::UndefinedStep { .. } => "UNDEFINED_STEP",
            Error::ExpansionDepthExceeded { .. } => "RUNAWAY_EXPANSION",
            Error::MissingContext(_) => "PRECONDITION",
            Error::NoExpectationRow { .. } => "LOOKUP",
            Error::FixtureMissing { .. }
            | Error::FixtureMalformed { .. }
            | Error::InvalidInterval(_) => "FIXTURE",
            Error::TestAssertion(_) => "ASSERTION",
            Error::PollTimeout { .. } => "TIMEOUT",
            Error::ElementNotFound { .. } | Error::Driver(_) => "DRIVER",
            Error::Agent { .. } | Error::Http(_) => "AGENT",
            _ => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_error_shows_chain() {
        let err = Error::ExpansionDepthExceeded {
            limit: 2,
            chain: vec!["Given a".to_string(), "Given b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Step expansion exceeded 2 levels: Given a -> Given b"
        );
        assert_eq!(err.code(), "RUNAWAY_EXPANSION");
    }

    #[test]
    fn test_lookup_error_names_agent_type() {
        let err = Error::NoExpectationRow {
            agent_type: "acapy".to_string(),
        };
        assert!(err.to_string().contains("acapy"));
        assert_eq!(err.code(), "LOOKUP");
    }
}
