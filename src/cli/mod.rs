//! CLI command handling
//!
//! Dispatches CLI commands and formats their output.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::context::Waits;
use crate::fixtures::{CredentialCollection, FixtureStore};
use crate::reconcile::reconcile;
use crate::steps::{wallet_steps, StepAction, StepComposer, StepDefinition};
use crate::testing::{print_summary, LiveSessions, MockSessions, Runner, TestResult};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path)?;
    let fixtures = FixtureStore::new(&config.fixtures.data_dir);

    match command {
        Commands::Run {
            paths,
            tags,
            mock,
            verbose,
            log_file: _,
        } => {
            let features = collect_features(&paths)?;
            if features.is_empty() {
                return Err(Error::Config("No feature files found".to_string()));
            }

            let composer = StepComposer::new(wallet_steps()?)
                .with_max_depth(config.steps.max_expansion_depth);
            let waits = Waits::from(&config.timeouts);

            let results = if mock {
                let runner = Runner::new(composer, MockSessions::default(), fixtures, waits)
                    .with_tags(tags)
                    .verbose(verbose);
                run_features(&runner, &features).await
            } else {
                let runner = Runner::new(composer, LiveSessions::new(&config), fixtures, waits)
                    .with_tags(tags)
                    .verbose(verbose);
                run_features(&runner, &features).await
            };

            if print_summary(&results) {
                Ok(())
            } else {
                let failed = results.iter().filter(|r| !r.passed).count();
                Err(Error::assertion(format!("{} scenario(s) failed", failed)))
            }
        }

        Commands::Steps { filter, json } => {
            let registry = wallet_steps()?;
            let definitions: Vec<&StepDefinition> = registry
                .definitions()
                .iter()
                .filter(|d| filter.as_deref().map_or(true, |f| d.pattern.contains(f)))
                .collect();

            if json {
                let listing: Vec<serde_json::Value> = definitions
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "keywords": d.keywords,
                            "pattern": d.pattern,
                            "parameters": d.params(),
                            "composite": d.is_composite(),
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&listing)?);
                return Ok(());
            }

            for definition in &definitions {
                print_definition(definition);
            }
            println!("\n{} step definitions", definitions.len());
            Ok(())
        }

        Commands::ProofRequest { name, interval } => {
            let request = fixtures.proof_request_with_interval(&name, interval.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&request)?);
            Ok(())
        }

        Commands::Reconcile {
            proof,
            credentials,
            json,
        } => {
            let request = fixtures.proof_request(&proof)?;
            let mut held = CredentialCollection::new();
            for name in &credentials {
                held.insert(name.clone(), fixtures.credential(name)?);
            }

            let sources = reconcile(&request, &held);
            if json {
                println!("{}", serde_json::to_string_pretty(&sources)?);
                return Ok(());
            }

            if sources.is_empty() {
                println!("No requested attribute is held by these credentials");
            }
            for source in &sources {
                println!("  {} <- {}", source.attribute, source.credential_name.bold());
            }
            Ok(())
        }
    }
}

async fn run_features<F: crate::testing::SessionFactory>(
    runner: &Runner<F>,
    features: &[PathBuf],
) -> Vec<TestResult> {
    let mut results = Vec::new();
    for path in features {
        match runner.run_feature(path).await {
            Ok(mut feature_results) => results.append(&mut feature_results),
            Err(e) => {
                println!("  {} {}: {}", "✗".red(), path.display(), e);
                results.push(TestResult {
                    name: path.display().to_string(),
                    passed: false,
                    steps_run: 0,
                    steps_total: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    results
}

/// Expand directories into the feature files they contain, sorted by name
fn collect_features(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut features = Vec::new();
    for path in paths {
        if !path.is_dir() {
            features.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        found.sort();
        features.extend(found);
    }
    Ok(features)
}

fn print_definition(definition: &StepDefinition) {
    let keywords = definition
        .keywords
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join("/");

    match &definition.action {
        StepAction::Run(_) => {
            println!("  {:<16} {}", keywords.dimmed(), definition.pattern);
        }
        StepAction::Expand(children) => {
            println!(
                "  {:<16} {} {}",
                keywords.dimmed(),
                definition.pattern,
                "(composite)".cyan()
            );
            for child in children.iter() {
                println!("  {:<16}   {}", "", child.line.dimmed());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_features_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "").unwrap();
        std::fs::write(dir.path().join("a.yml"), "").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let single = dir.path().join("b.yaml");
        let found = collect_features(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(found, vec![dir.path().join("a.yml"), single.clone(), single]);
    }
}
