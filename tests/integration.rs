//! End-to-end integration tests for wallet-bdd
//!
//! Scenarios run against the simulated wallet and agents, so these tests
//! need no device, Appium server or agent backchannel. They cover:
//! 1. Composite steps behaving exactly like their children run by hand
//! 2. The sample feature files passing end to end
//! 3. Failure reporting for timeouts and missing fixtures
//! 4. The CLI binary

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use wallet_bdd::context::{ScenarioContext, Waits};
use wallet_bdd::fixtures::FixtureStore;
use wallet_bdd::pages::{Capabilities, PageKind, PollSettings};
use wallet_bdd::steps::{wallet_steps, DataTable, StepComposer};
use wallet_bdd::testing::mock::{MockNetwork, MockSettings, ProofOutcome};
use wallet_bdd::testing::{MockSessions, Runner};
use wallet_bdd::Error;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn fixtures() -> FixtureStore {
    FixtureStore::new(manifest_dir().join("tests").join("fixtures").join("data"))
}

fn composer() -> StepComposer {
    StepComposer::new(wallet_steps().expect("step library registers"))
}

fn context(network: &MockNetwork, name: &str) -> ScenarioContext {
    network.context_with(name, Vec::new(), fixtures())
}

fn on_home() -> MockNetwork {
    MockNetwork::with_settings(MockSettings {
        start_page: PageKind::Home,
        ..Default::default()
    })
}

fn permanent_resident_table() -> DataTable {
    DataTable::from_strs(
        &["credential", "revocable", "credential_name"],
        &[&["permanent_resident", "false", "Permanent Resident"]],
    )
    .unwrap()
}

fn credential_ids(ctx: &ScenarioContext) -> Vec<String> {
    ctx.credentials().iter().map(|(id, _)| id.to_string()).collect()
}

// ============== Decomposition ==============

#[tokio::test]
async fn test_setup_composite_matches_children() {
    let steps = composer();

    let composite = MockNetwork::new();
    let mut ctx = context(&composite, "composite");
    steps
        .execute_steps(&mut ctx, "Given the Holder has setup thier Wallet")
        .await
        .unwrap();

    let by_hand = MockNetwork::new();
    let mut manual = context(&by_hand, "by hand");
    steps
        .execute_steps(
            &mut manual,
            r#"
            Given the User has skipped on-boarding
            And the User has accepted the Terms and Conditions
            And a PIN has been set up with "369369"
            And the Holder has chosen not to use biometrics
            "#,
        )
        .await
        .unwrap();

    assert_eq!(composite.calls(), by_hand.calls());
    assert_eq!(composite.current_page(), PageKind::Home);
    assert_eq!(by_hand.current_page(), PageKind::Home);
    assert_eq!(ctx.page_kinds(), manual.page_kinds());
}

#[tokio::test]
async fn test_credential_composite_matches_children() {
    let steps = composer();
    let table = permanent_resident_table();

    let composite = on_home();
    let mut ctx = context(&composite, "composite");
    steps
        .execute_steps_with_table(
            &mut ctx,
            "Given the holder has a Non-Revocable credential",
            Some(table.clone()),
        )
        .await
        .unwrap();

    let by_hand = on_home();
    let mut manual = context(&by_hand, "by hand");
    steps
        .execute_steps_with_table(
            &mut manual,
            "Given the user has a credential offer",
            Some(table.clone()),
        )
        .await
        .unwrap();
    steps
        .execute_steps(
            &mut manual,
            "
            When they select Accept
            And the holder is informed that their credential is on the way with an indication of loading
            And once the credential arrives they are informed that the Credential is added to your wallet
            And they select Done
            Then they are brought to the list of credentials
            ",
        )
        .await
        .unwrap();
    steps
        .execute_steps_with_table(
            &mut manual,
            "Then the credential accepted is at the top of the list",
            Some(table),
        )
        .await
        .unwrap();

    assert_eq!(composite.calls(), by_hand.calls());
    assert_eq!(credential_ids(&ctx), credential_ids(&manual));
    assert_eq!(credential_ids(&ctx), vec!["permanent_resident"]);
    assert_eq!(composite.credential_list(), vec!["Permanent Resident"]);
    assert!(ctx.expansion_chain().is_empty());
}

// ============== Feature files ==============

#[tokio::test]
async fn test_sample_features_pass() {
    let runner = Runner::new(
        composer(),
        MockSessions::default(),
        FixtureStore::new(manifest_dir().join("features").join("data")),
        MockNetwork::WAITS,
    );

    let mut total = 0;
    for name in ["present_proof.yaml", "receive_credential.yaml", "pctf_chat.yaml"] {
        let results = runner
            .run_feature(&manifest_dir().join("features").join(name))
            .await
            .unwrap();
        for result in &results {
            assert!(result.passed, "{}: {:?}", result.name, result.error);
        }
        total += results.len();
    }
    assert_eq!(total, 8);
}

#[tokio::test]
async fn test_tag_filter_skips_scenarios() {
    let runner = Runner::new(
        composer(),
        MockSessions::default(),
        FixtureStore::new(manifest_dir().join("features").join("data")),
        MockNetwork::WAITS,
    )
    .with_tags(vec!["@T002-Proof".to_string()]);

    let results = runner
        .run_feature(&manifest_dir().join("features").join("present_proof.yaml"))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "Holder declines the proof request");
}

// ============== Flows ==============

#[tokio::test]
async fn test_second_offer_on_credential_list_is_opened_from_notification() {
    let steps = composer();
    let network = on_home();
    let mut ctx = context(&network, "notification");

    steps
        .execute_steps_with_table(
            &mut ctx,
            "Given the holder has a Non-Revocable credential",
            Some(permanent_resident_table()),
        )
        .await
        .unwrap();
    assert_eq!(network.current_page(), PageKind::Credentials);

    steps
        .execute_steps(
            &mut ctx,
            "Given the holder has a credential of photo_id
             Then the credential Photo Id is accepted is at the top of the list",
        )
        .await
        .unwrap();

    assert!(network
        .calls()
        .contains(&"tap CredentialOfferNotification on Home".to_string()));
    assert_eq!(network.credential_list(), vec!["Photo Id", "Permanent Resident"]);
    assert_eq!(credential_ids(&ctx), vec!["permanent_resident", "photo_id"]);
}

#[tokio::test]
async fn test_camera_policy_is_dismissed_once() {
    let network = MockNetwork::with_settings(MockSettings {
        start_page: PageKind::Home,
        capabilities: Capabilities {
            platform_name: "iOS".to_string(),
            auto_grant_permissions: None,
        },
        ..Default::default()
    });
    let mut ctx = context(&network, "camera");

    composer()
        .execute_steps(
            &mut ctx,
            r#"
            Given a connection has been successfully made
            When the Holder scans the QR code sent by the "verifier"
            Then the Connecting completes successfully
            And there is a connection between "verifier" and Holder
            "#,
        )
        .await
        .unwrap();

    let consents = network
        .calls()
        .iter()
        .filter(|c| c.as_str() == "tap Okay on CameraPrivacyPolicy")
        .count();
    assert_eq!(consents, 1);
}

#[tokio::test]
async fn test_proof_request_carries_interval() {
    let network = on_home();
    let mut ctx = context(&network, "interval");

    composer()
        .execute_steps(
            &mut ctx,
            "When the user has a proof request for citizenship including proof of non-revocation at last 10 minutes",
        )
        .await
        .unwrap();

    let interval = ctx.proof_request().unwrap().non_revoked.unwrap();
    assert_eq!(interval.to - interval.from, 600);
    assert_eq!(network.current_page(), PageKind::ProofRequest);
}

// ============== Failures ==============

#[tokio::test]
async fn test_unverified_proof_times_out() {
    let network = MockNetwork::with_settings(MockSettings {
        start_page: PageKind::Home,
        outcome: ProofOutcome::SentOnly,
        ..Default::default()
    });
    let waits = Waits {
        screen: PollSettings {
            timeout: Duration::from_millis(100),
            interval: Duration::from_millis(1),
        },
        notification: PollSettings {
            timeout: Duration::from_millis(10),
            interval: Duration::from_millis(1),
        },
    };
    let mut ctx = ScenarioContext::new("timeout", Vec::new(), network.session(), fixtures(), waits);
    let steps = composer();

    steps
        .execute_steps(
            &mut ctx,
            "
            Given the user has a proof request
            When they select Share
            And the holder is informed that they are sending information securely
            And they are informed that the information sent successfully
            ",
        )
        .await
        .unwrap();

    let err = steps
        .execute_steps(&mut ctx, "Then once the proof is verified they are informed of such")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PollTimeout { .. }), "{err}");
    assert_eq!(err.code(), "TIMEOUT");
    assert!(ctx.expansion_chain().is_empty());

    steps
        .execute_steps(
            &mut ctx,
            "When they select Done on information sent successfully\nThen they are brought Home",
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_missing_fixture_fails_the_step() {
    let network = on_home();
    let mut ctx = context(&network, "missing fixture");

    let err = composer()
        .execute_steps(
            &mut ctx,
            "Given a connection has been successfully made
             When the Holder receives a credential offer of no_such_credential",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FixtureMissing { .. }), "{err}");
    assert!(err.to_string().contains("no_such_credential.json"));
    assert!(!network
        .calls()
        .iter()
        .any(|c| c.starts_with("issuer.send_credential")));
}

#[tokio::test]
async fn test_wrong_credential_on_top_is_reported() {
    let network = on_home();
    let mut ctx = context(&network, "wrong credential");

    let err = composer()
        .execute_steps(
            &mut ctx,
            "Given a connection has been successfully made
             When the Holder receives a credential offer of photo_id
             Then holder is brought to the credential offer screen
             When they select Accept
             And the holder is informed that their credential is on the way with an indication of loading
             And once the credential arrives they are informed that the Credential is added to your wallet
             And they select Done
             Then the credential Permanent Resident is accepted is at the top of the list",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TestAssertion(_)), "{err}");
    assert!(err.to_string().contains("Photo Id"));
}

// ============== CLI ==============

fn wallet_bdd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_wallet-bdd"))
}

/// Config pointing at the sample fixtures with fast polling
fn write_config(dir: &Path) -> PathBuf {
    let data_dir = manifest_dir().join("features").join("data");
    let config = format!(
        "[fixtures]\ndata_dir = '{}'\n\n[timeouts]\nscreen_secs = 5\npoll_interval_ms = 1\nnotification_secs = 1\n",
        data_dir.display()
    );
    let path = dir.join("config.toml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_cli_runs_features_with_mock() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = wallet_bdd()
        .arg("--config")
        .arg(&config)
        .args(["run", "--mock"])
        .arg(manifest_dir().join("features"))
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}\n{}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("8 passed, 0 failed"), "{stdout}");
}

#[test]
fn test_cli_reports_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let feature = dir.path().join("broken.yaml");
    fs::write(
        &feature,
        "name: Broken\nscenarios:\n  - name: Unknown step\n    steps:\n      - Given nothing knows this step\n",
    )
    .unwrap();

    let output = wallet_bdd()
        .arg("--config")
        .arg(&config)
        .args(["run", "--mock"])
        .arg(&feature)
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("UNDEFINED_STEP"), "{stdout}");
    assert!(stdout.contains("0 passed, 1 failed"), "{stdout}");
}

#[test]
fn test_cli_proof_request_with_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = wallet_bdd()
        .arg("--config")
        .arg(&config)
        .args(["proof-request", "citizenship", "--interval", "last 10 minutes"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let request: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let from = request["non_revoked"]["from"].as_i64().unwrap();
    let to = request["non_revoked"]["to"].as_i64().unwrap();
    assert_eq!(to - from, 600);
    assert_eq!(request["name"], "citizenship");
}

#[test]
fn test_cli_reconcile_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let output = wallet_bdd()
        .arg("--config")
        .arg(&config)
        .args(["reconcile", "age", "photo_id", "permanent_resident", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let sources: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        sources,
        serde_json::json!([
            {"credential_name": "Photo Id", "attribute": "photo"},
            {"credential_name": "Permanent Resident", "attribute": "age"}
        ])
    );
}

#[test]
fn test_cli_lists_steps() {
    let output = wallet_bdd()
        .args(["steps", "proof request", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let steps: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(!steps.is_empty());
    assert!(steps
        .iter()
        .all(|s| s["pattern"].as_str().unwrap().contains("proof request")));
}
