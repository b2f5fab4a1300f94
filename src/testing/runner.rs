//! Scenario runner
//!
//! Runs expanded scenarios step by step against a fresh session each, and
//! reports progress the same way for live devices and simulated runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use colored::Colorize;
use tracing::Instrument;

use crate::agents::{BackchannelClient, Role};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::context::{ScenarioContext, Session, Waits};
use crate::fixtures::FixtureStore;
use crate::pages::AppiumDriver;
use crate::steps::StepComposer;

use super::config::{Feature, ScenarioRun};
use super::mock::{MockNetwork, MockSettings};

/// Result of a scenario run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub steps_run: usize,
    pub steps_total: usize,
    pub error: Option<String>,
}

/// Opens the collaborators one scenario runs against
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, scenario: &ScenarioRun) -> Result<Session>;
}

/// Appium plus both agent backchannels, as configured
pub struct LiveSessions<'a> {
    config: &'a Config,
}

impl<'a> LiveSessions<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for LiveSessions<'_> {
    async fn open(&self, scenario: &ScenarioRun) -> Result<Session> {
        let http_timeout = Duration::from_secs(self.config.timeouts.http_secs);
        tracing::debug!(scenario = %scenario.name, url = %self.config.driver.url, "Opening Appium session");
        let driver = AppiumDriver::connect(&self.config.driver, http_timeout).await?;
        let issuer = BackchannelClient::new(
            Role::Issuer,
            self.config.agents.issuer.clone(),
            http_timeout,
        )?;
        let verifier = BackchannelClient::new(
            Role::Verifier,
            self.config.agents.verifier.clone(),
            http_timeout,
        )?;
        Ok(Session {
            driver: Arc::new(driver),
            issuer: Some(Arc::new(issuer)),
            verifier: Some(Arc::new(verifier)),
        })
    }
}

/// A fresh simulated wallet and agents per scenario
#[derive(Default)]
pub struct MockSessions {
    settings: MockSettings,
}

impl MockSessions {
    pub fn new(settings: MockSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for MockSessions {
    async fn open(&self, _scenario: &ScenarioRun) -> Result<Session> {
        Ok(MockNetwork::with_settings(self.settings.clone()).session())
    }
}

/// Runs scenarios with one step library and one session factory
pub struct Runner<F> {
    composer: StepComposer,
    sessions: F,
    fixtures: FixtureStore,
    waits: Waits,
    tags: Vec<String>,
    verbose: bool,
}

impl<F: SessionFactory> Runner<F> {
    pub fn new(composer: StepComposer, sessions: F, fixtures: FixtureStore, waits: Waits) -> Self {
        Self {
            composer,
            sessions,
            fixtures,
            waits,
            tags: Vec::new(),
            verbose: false,
        }
    }

    /// Only run scenarios passing this tag filter
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Load a feature file and run every scenario that passes the tag filter
    pub async fn run_feature(&self, path: &Path) -> Result<Vec<TestResult>> {
        let feature = Feature::load(path)?;
        println!(
            "\n{} {}",
            "Feature:".blue().bold(),
            feature.name.white().bold()
        );
        if let Some(desc) = &feature.description {
            println!("  {}", desc.trim().dimmed());
        }

        let mut results = Vec::new();
        for scenario in feature.scenarios()? {
            if !scenario.matches_tags(&self.tags) {
                tracing::debug!(scenario = %scenario.name, "Skipped by tag filter");
                continue;
            }
            results.push(self.run_scenario(&scenario).await);
        }
        Ok(results)
    }

    /// Run one scenario, stopping at the first failing step
    ///
    /// The session is always closed, whether the scenario passed or not.
    pub async fn run_scenario(&self, scenario: &ScenarioRun) -> TestResult {
        let steps_total = scenario.steps.len();
        println!(
            "\n{} {}",
            "Scenario:".cyan().bold(),
            scenario.name.white().bold()
        );
        if self.verbose && !scenario.tags.is_empty() {
            println!("  {}", scenario.tags.join(" ").dimmed());
        }

        let session = match self.sessions.open(scenario).await {
            Ok(session) => session,
            Err(e) => {
                println!("  {} Session: {}", "✗".red(), e);
                return TestResult {
                    name: scenario.name.clone(),
                    passed: false,
                    steps_run: 0,
                    steps_total,
                    error: Some(e.to_string()),
                };
            }
        };

        let mut ctx = ScenarioContext::new(
            scenario.name.clone(),
            scenario.tags.clone(),
            session,
            self.fixtures.clone(),
            self.waits,
        );

        let span = tracing::info_span!("scenario", name = %scenario.name);
        let outcome = self.run_steps(&mut ctx, scenario).instrument(span).await;

        if let Err(e) = ctx.driver().close().await {
            tracing::warn!(error = %e, "Failed to close wallet session");
        }

        match outcome {
            Ok(()) => {
                println!("  {} {}", "✓".green().bold(), "Passed".green().bold());
                TestResult {
                    name: scenario.name.clone(),
                    passed: true,
                    steps_run: steps_total,
                    steps_total,
                    error: None,
                }
            }
            Err((steps_run, e)) => TestResult {
                name: scenario.name.clone(),
                passed: false,
                steps_run,
                steps_total,
                error: Some(e.to_string()),
            },
        }
    }

    async fn run_steps(
        &self,
        ctx: &mut ScenarioContext,
        scenario: &ScenarioRun,
    ) -> std::result::Result<(), (usize, Error)> {
        for (i, step) in scenario.steps.iter().enumerate() {
            let step_num = i + 1;
            let text = step.to_string();
            match self.composer.run_step(ctx, step.clone()).await {
                Ok(()) => {
                    println!("  {} Step {}: {}", "✓".green(), step_num, text.dimmed());
                }
                Err(e) => {
                    println!("  {} Step {}: {}", "✗".red(), step_num, text);
                    println!("      {} {}", format!("[{}]", e.code()).red(), e);
                    if let Error::ExpansionDepthExceeded { chain, .. } = &e {
                        if self.verbose {
                            for (depth, line) in chain.iter().enumerate() {
                                println!("      {:>3} {}", depth, line.dimmed());
                            }
                        }
                    }
                    tracing::error!(step = %text, error = %e, "Step failed");
                    return Err((step_num, e));
                }
            }
        }
        Ok(())
    }
}

/// Print a pass/fail tally and return whether everything passed
pub fn print_summary(results: &[TestResult]) -> bool {
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;

    if failed > 0 {
        println!("\n{}", "Failures:".red().bold());
        for result in results.iter().filter(|r| !r.passed) {
            println!(
                "  {} {} (step {}/{}): {}",
                "✗".red(),
                result.name,
                result.steps_run,
                result.steps_total,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let tally = format!("{} passed, {} failed", passed, failed);
    if failed == 0 {
        println!("\n{} {}\n", "✓".green().bold(), tally.green().bold());
    } else {
        println!("\n{} {}\n", "✗".red().bold(), tally.red().bold());
    }
    failed == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{wallet_steps, Step, StepKeyword};

    fn runner() -> Runner<MockSessions> {
        let composer = StepComposer::new(wallet_steps().unwrap());
        Runner::new(
            composer,
            MockSessions::default(),
            FixtureStore::new("features/data"),
            MockNetwork::WAITS,
        )
    }

    fn scenario(steps: Vec<Step>) -> ScenarioRun {
        ScenarioRun {
            feature: "runner".to_string(),
            name: "runner scenario".to_string(),
            tags: Vec::new(),
            steps,
        }
    }

    #[tokio::test]
    async fn test_setup_scenario_passes() {
        let run = scenario(vec![Step::new(
            StepKeyword::Given,
            "the Holder has setup thier Wallet",
        )]);
        let result = runner().run_scenario(&run).await;
        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.steps_run, 1);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let run = scenario(vec![
            Step::new(StepKeyword::Given, "the Holder has setup thier Wallet"),
            Step::new(StepKeyword::Then, "nothing knows this step"),
            Step::new(StepKeyword::Then, "they are brought Home"),
        ]);
        let result = runner().run_scenario(&run).await;
        assert!(!result.passed);
        assert_eq!(result.steps_run, 2);
        assert_eq!(result.steps_total, 3);
        assert!(result.error.unwrap().contains("nothing knows this step"));
    }

    #[test]
    fn test_summary() {
        let ok = TestResult {
            name: "a".to_string(),
            passed: true,
            steps_run: 1,
            steps_total: 1,
            error: None,
        };
        assert!(print_summary(&[ok]));
        let bad = TestResult {
            name: "b".to_string(),
            passed: false,
            steps_run: 1,
            steps_total: 2,
            error: Some("boom".to_string()),
        };
        assert!(!print_summary(&[bad]));
    }
}
