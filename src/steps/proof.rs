//! Proof presentation steps
//!
//! A proof scenario connects the holder to the verifier, has the verifier
//! send a request built from a fixture, then walks the wallet's proof
//! request screens: inspect, share or decline, and the confirmation
//! screens that follow.

use futures_util::FutureExt;

use crate::agents::Role;
use crate::assertions::{assert_presence, assert_proof_request_details, expected_for_agent};
use crate::common::{Error, Result};
use crate::context::ScenarioContext;
use crate::pages::{Element, PageKind};
use crate::reconcile::reconcile;

use super::connection::scan;
use super::credential::{open_offer_from_notification, ACCEPT_OFFER};
use super::registry::{
    child, child_with_table, ChildStep, StepFuture, StepInput, StepRegistry, GIVEN, GIVEN_WHEN,
    THEN, WHEN, WHEN_THEN,
};
use super::{advance, arrive, StepComposer};

const NON_REVOCABLE_CREDENTIAL: &[ChildStep] = &[
    child_with_table("Given the user has a credential offer"),
    child("When they select Accept"),
    child("And the holder is informed that their credential is on the way with an indication of loading"),
    child("And once the credential arrives they are informed that the Credential is added to your wallet"),
    child("And they select Done"),
    child("Then they are brought to the list of credentials"),
    child_with_table("And the credential accepted is at the top of the list"),
];

const ANOTHER_CREDENTIAL: &[ChildStep] = &[
    child("Given a connection has been successfully made"),
    child("Given the holder has a credential of {credential_2}"),
];

const CONNECT_TO_VERIFIER: &str = r#"
    When the Holder scans the QR code sent by the "verifier"
    And the Holder is taken to the Connecting Screen/modal
    And the Connecting completes successfully
"#;

const DEFAULT_PROOF_REQUEST: &str = r#"
    When the Holder scans the QR code sent by the "verifier"
    And the Holder is taken to the Connecting Screen/modal
    And the Connecting completes successfully
    And the Holder receives a proof request
    Then holder is brought to the proof request
"#;

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    registry
        .expand(GIVEN, "the holder has a Non-Revocable credential", NON_REVOCABLE_CREDENTIAL)?
        .run(GIVEN, "the holder has credentials", holder_has_credentials)?
        .run(GIVEN, "the holder has a credential of {credential}", holder_has_credential)?
        .expand(
            GIVEN,
            "the holder has another credential of {credential_2}",
            ANOTHER_CREDENTIAL,
        )?
        .run(
            WHEN,
            "the Holder receives a proof of non-revocation with {proof} at {interval}",
            receive_proof_request,
        )?
        .run(WHEN, "the Holder receives a proof request of {proof}", receive_proof_request)?
        .run(WHEN, "the Holder receives a proof request", receive_proof_request)?
        .run(THEN, "holder is brought to the proof request", brought_to_proof_request)?
        .run(THEN, "they can only select Decline", select_decline)?
        .run(WHEN, "they select Decline", select_decline)?
        .run(
            THEN,
            "they are asked if they are sure they want to decline the Proof",
            asked_to_confirm_decline,
        )?
        .run(THEN, "they Confirm the decline", confirm_decline)?
        .run(THEN, "they can view the contents of the proof request", view_contents)?
        .run(
            WHEN_THEN,
            "the request informs them of the attributes and credentials they came from",
            informs_of_sources,
        )?
        .run(GIVEN_WHEN, "the user has a proof request", user_has_proof_request)?
        .run(
            WHEN,
            "the user has a connectionless proof request for {proof}",
            user_has_proof_request_for,
        )?
        .run(
            GIVEN_WHEN,
            "the user has a proof request for {proof}",
            user_has_proof_request_for,
        )?
        .run(
            GIVEN_WHEN,
            "the user has a proof request for {proof} including proof of non-revocation at {interval}",
            user_has_proof_request_for,
        )?
        .run(
            THEN,
            "{credential_name} is selected as the credential to verify the proof",
            credential_selected,
        )?
        .run(WHEN_THEN, "they select Share", select_share)?
        .run(
            WHEN_THEN,
            "the holder is informed that they are sending information securely",
            sending_securely,
        )?
        .run(
            WHEN_THEN,
            "they are informed that the information sent successfully",
            sent_successfully,
        )?
        .run(
            WHEN_THEN,
            "once the proof is verified they are informed of such",
            proof_verified,
        )?
        .run(
            WHEN_THEN,
            "they select Go back to home on information sent successfully",
            back_to_home_after_sent,
        )?
        .run(
            WHEN_THEN,
            "they select Done on information sent successfully",
            done_after_sent,
        )?
        .run(THEN, "they are brought Home", brought_home)?
        .run(GIVEN, "the credential has been revoked by the issuer", revoke_credential)?
        .run(
            GIVEN,
            "the PCTF member has an Unverified Person {credential}",
            unverified_person,
        )?
        .run(
            GIVEN,
            "the user has a connectionless proof request for access to PCTF Chat",
            chat_proof_request,
        )?
        .run(THEN, "the PCTF member has access to chat", has_chat_access)?;

    for pattern in [
        "they select Done on the verfified information",
        "they select Done on the verified information",
    ] {
        registry.run(WHEN_THEN, pattern, done_after_verified)?;
    }
    Ok(())
}

fn holder_has_credentials<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let table = input.table()?;
        for row in table.rows() {
            let credential = row.get("credential")?;
            let revocable = row.get("revocable")?;
            let name = row.get("credential_name")?;
            let block = format!(
                "Given a connection has been successfully made
                Given the user has a credential offer of {credential} with revocable set as {revocable}
                {ACCEPT_OFFER}
                And the credential {name} is accepted is at the top of the list"
            );
            steps.execute_steps(ctx, &block).await?;
        }
        Ok(())
    }
    .boxed()
}

/// A second offer to a holder already looking at the credential list only
/// raises a notification, so follow it from Home before accepting.
fn holder_has_credential<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let credential = input.arg("credential")?;
        steps
            .execute_steps(ctx, &format!("Given the user has a credential offer of {credential}"))
            .await?;

        let list = ctx.page_or_open(PageKind::Credentials);
        if list.on_this_page().await? {
            open_offer_from_notification(ctx).await?;
        }
        steps.execute_steps(ctx, ACCEPT_OFFER).await
    }
    .boxed()
}

fn receive_proof_request<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        steps
            .execute_steps(ctx, "Then there is a connection between \"verifier\" and Holder")
            .await?;

        let verifier = ctx.verifier()?;
        match input.opt("proof") {
            Some(proof) => {
                let request = ctx
                    .fixtures()
                    .proof_request_with_interval(proof, input.opt("interval"))?;
                tracing::info!(proof, non_revoked = ?request.non_revoked, "Sending proof request");
                verifier.send_proof_request(Some(&request)).await?;
                ctx.set_proof_request(request);
            }
            None => {
                tracing::info!("Sending default proof request");
                verifier.send_proof_request(None).await?;
            }
        }
        Ok(())
    }
    .boxed()
}

fn brought_to_proof_request<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::ProofRequest).await?;
        Ok(())
    }
    .boxed()
}

fn select_decline<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::ProofRequest, Element::Decline).await?;
        Ok(())
    }
    .boxed()
}

fn asked_to_confirm_decline<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let confirm = ctx.page(PageKind::DeclineProofRequest)?;
        confirm.wait_until_present(ctx.waits().screen).await
    }
    .boxed()
}

fn confirm_decline<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::DeclineProofRequest, Element::Confirm).await?;
        Ok(())
    }
    .boxed()
}

fn view_contents<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let table = input.table()?;
        let agent_type = ctx.verifier()?.get_issuer_type().await?;
        let expected = expected_for_agent(table, &agent_type)?;
        let actual = ctx.page(PageKind::ProofRequest)?.proof_request_details().await?;
        tracing::debug!(?expected, ?actual, "Comparing proof request details");
        assert_proof_request_details(&expected, &actual)
    }
    .boxed()
}

fn informs_of_sources<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let sources = reconcile(ctx.proof_request()?, ctx.credentials());
        tracing::debug!(?sources, "Expected credential sources");
        let page_source = ctx.driver().page_source().await?;
        assert_presence(&sources, &page_source)
    }
    .boxed()
}

/// The table, when given, names the proof fixture and an optional
/// revocation interval; without one the default request is used.
fn user_has_proof_request<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let Some(table) = &input.table else {
            return steps.execute_steps(ctx, DEFAULT_PROOF_REQUEST).await;
        };
        let row = table
            .first()
            .ok_or_else(|| Error::MissingTable(input.step.clone()))?;
        let proof = row.get("proof")?;
        let line = match row.opt("interval").map(str::trim) {
            Some(interval) if !interval.is_empty() => format!(
                "When the user has a proof request for {proof} including proof of non-revocation at {interval}"
            ),
            _ => format!("When the user has a proof request for {proof}"),
        };
        steps.execute_steps(ctx, &line).await
    }
    .boxed()
}

fn user_has_proof_request_for<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let proof = input.arg("proof")?;
        let connectionless = input.step.contains("connectionless")
            || ctx.scenario_name().to_lowercase().contains("connectionless");

        if connectionless {
            // The connecting screen is too brief to observe without a
            // connection to complete.
            steps
                .execute_steps(ctx, "When the Holder scans the QR code sent by the \"verifier\"")
                .await?;
        } else {
            steps.execute_steps(ctx, CONNECT_TO_VERIFIER).await?;
        }

        let receive = match input.opt("interval") {
            Some(interval) => format!(
                "When the Holder receives a proof of non-revocation with {proof} at {interval}"
            ),
            None => format!("When the Holder receives a proof request of {proof}"),
        };
        steps.execute_steps(ctx, &receive).await?;
        steps
            .execute_steps(ctx, "Then holder is brought to the proof request")
            .await
    }
    .boxed()
}

fn credential_selected<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let expected = input.arg("credential_name")?;
        let details = advance(ctx, PageKind::ProofRequest, Element::Details).await?;
        let names = details.texts(Element::CredentialName).await?;
        let first = names.first().map(String::as_str).unwrap_or_default();
        if !first.contains(expected) {
            return Err(Error::assertion(format!(
                "Proof request uses '{first}', expected '{expected}'"
            )));
        }
        advance(ctx, PageKind::ProofRequestDetails, Element::Back).await?;
        Ok(())
    }
    .boxed()
}

fn select_share<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::ProofRequest, Element::Share).await?;
        Ok(())
    }
    .boxed()
}

/// Often gone before the step runs; only its disappearance matters.
fn sending_securely<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let sending = ctx.page_or_open(PageKind::SendingInformationSecurely);
        sending.wait_until_gone(ctx.waits().screen).await
    }
    .boxed()
}

fn sent_successfully<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::InformationSentSuccessfully).await?;
        Ok(())
    }
    .boxed()
}

fn proof_verified<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::InformationApproved).await?;
        Ok(())
    }
    .boxed()
}

fn back_to_home_after_sent<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::InformationSentSuccessfully, Element::BackToHome).await?;
        Ok(())
    }
    .boxed()
}

fn done_after_verified<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::InformationApproved, Element::Done).await?;
        Ok(())
    }
    .boxed()
}

fn done_after_sent<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::InformationSentSuccessfully, Element::Done).await?;
        Ok(())
    }
    .boxed()
}

fn brought_home<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::Home).await?;
        Ok(())
    }
    .boxed()
}

fn revoke_credential<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move { ctx.issuer()?.revoke_credential(true).await }.boxed()
}

/// Performance runs reuse one issuer across iterations, so issuance state
/// is reset before each offer.
fn unverified_person<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        if ctx.has_tag("PerformanceTest") {
            ctx.issuer()?.restart_issue_credential().await?;
        }

        let credential = input.arg("credential")?;
        let block = format!(
            "Given the Holder receives a credential offer of {credential}
            And they Scan the credential offer QR Code
            And the Connecting completes successfully
            Then holder is brought to the credential offer screen
            {ACCEPT_OFFER}"
        );
        steps.execute_steps(ctx, &block).await?;
        steps
            .execute_steps_with_table(
                ctx,
                "Then the credential accepted is at the top of the list",
                input.table.clone(),
            )
            .await
    }
    .boxed()
}

fn chat_proof_request<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let qrcode = ctx
            .verifier()?
            .send_proof_request(None)
            .await?
            .ok_or_else(|| Error::agent(Role::Verifier, "connectionless proof request returned no QR code"))?;
        ctx.driver().inject_qrcode(&qrcode).await?;
        scan(ctx).await?;
        arrive(ctx, PageKind::ProofRequest).await?;
        Ok(())
    }
    .boxed()
}

fn has_chat_access<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move { ctx.verifier()?.proof_request_verified().await }.boxed()
}
