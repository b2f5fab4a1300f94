//! Credential offer steps

use futures_util::FutureExt;

use crate::common::{Error, Result};
use crate::context::ScenarioContext;
use crate::pages::{Element, PageKind};
use crate::reconcile::display_name;

use super::registry::{
    child, child_with_table, ChildStep, StepFuture, StepInput, StepRegistry, ANY, GIVEN_WHEN,
    THEN, WHEN,
};
use super::{advance, arrive, StepComposer};

const OFFER_OVER_NEW_CONNECTION: &[ChildStep] = &[
    child("Given a connection has been successfully made"),
    child_with_table("When the Holder receives a Non-Revocable credential offer"),
    child("Then holder is brought to the credential offer screen"),
];

/// From an open offer to the credential list
pub(super) const ACCEPT_OFFER: &str = "
    When they select Accept
    And the holder is informed that their credential is on the way with an indication of loading
    And once the credential arrives they are informed that the Credential is added to your wallet
    And they select Done
    Then they are brought to the list of credentials
";

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    registry
        .expand(GIVEN_WHEN, "the user has a credential offer", OFFER_OVER_NEW_CONNECTION)?
        .run(GIVEN_WHEN, "the user has a credential offer of {credential}", user_has_offer)?
        .run(
            GIVEN_WHEN,
            "the user has a credential offer of {credential} with revocable set as {revocable}",
            user_has_offer,
        )?
        .run(
            GIVEN_WHEN,
            "the Holder receives a Non-Revocable credential offer",
            receive_offer,
        )?
        .run(
            GIVEN_WHEN,
            "the Holder receives a credential offer of {credential}",
            receive_offer,
        )?
        .run(
            GIVEN_WHEN,
            "the Holder receives a credential offer of {credential} with revocable set as {revocable}",
            receive_offer,
        )?
        .run(THEN, "holder is brought to the credential offer screen", brought_to_offer)?
        .run(WHEN, "they select Accept", select_accept)?
        .run(
            ANY,
            "the holder is informed that their credential is on the way with an indication of loading",
            on_the_way,
        )?
        .run(
            ANY,
            "once the credential arrives they are informed that the Credential is added to your wallet",
            credential_added,
        )?
        .run(ANY, "they select Done", select_done)?
        .run(THEN, "they are brought to the list of credentials", brought_to_list)?
        .run(THEN, "the credential accepted is at the top of the list", accepted_at_top)?
        .run(
            THEN,
            "the credential {credential_name} is accepted is at the top of the list",
            accepted_at_top,
        )?;
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        other => Err(Error::Config(format!(
            "Expected true or false for revocable, got '{other}'"
        ))),
    }
}

/// Ask the issuer for an offer and remember which fixture it carries
///
/// Without a connection the offer travels with a fresh invitation, which
/// is handed to the camera for the holder to scan.
async fn offer(ctx: &mut ScenarioContext, credential: Option<&str>, revocable: bool) -> Result<()> {
    let issuer = ctx.issuer()?;
    let fixture = credential
        .map(|name| ctx.fixtures().credential(name))
        .transpose()?;

    if !issuer.is_connected().await? {
        let invitation = issuer.create_invitation().await?;
        ctx.driver().inject_qrcode(&invitation).await?;
    }

    tracing::info!(credential = credential.unwrap_or("<default>"), revocable, "Requesting credential offer");
    issuer.send_credential(fixture.as_ref(), revocable).await?;

    if let (Some(name), Some(fixture)) = (credential, fixture) {
        ctx.set_pending_offer(name, fixture);
    }
    Ok(())
}

fn receive_offer<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let from_table = input
            .table
            .as_ref()
            .and_then(|t| t.first())
            .and_then(|row| row.opt("credential"));
        let credential = input.opt("credential").or(from_table);
        let revocable = match input.opt("revocable") {
            Some(flag) => parse_flag(flag)?,
            None => false,
        };
        offer(ctx, credential, revocable).await
    }
    .boxed()
}

/// An offer arriving while the credential list is open only raises a
/// notification, so the offer screen is awaited only otherwise.
fn user_has_offer<'a>(
    steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let credential = input.arg("credential")?;
        let receive = match input.opt("revocable") {
            Some(flag) => format!(
                "When the Holder receives a credential offer of {credential} with revocable set as {flag}"
            ),
            None => format!("When the Holder receives a credential offer of {credential}"),
        };
        steps.execute_steps(ctx, &receive).await?;

        let list = ctx.page_or_open(PageKind::Credentials);
        if !list.on_this_page().await? {
            steps
                .execute_steps(ctx, "Then holder is brought to the credential offer screen")
                .await?;
        }
        Ok(())
    }
    .boxed()
}

/// Follow the notification badge to a pending offer, if one shows up
pub(super) async fn open_offer_from_notification(ctx: &mut ScenarioContext) -> Result<()> {
    let nav = ctx.open_page(PageKind::NavBar);
    let notified = nav
        .wait_for_element(Element::NotificationBadge, ctx.waits().notification)
        .await?;
    if !notified {
        tracing::debug!("No offer notification");
        return Ok(());
    }

    let home = nav.select(Element::HomeTab).await?;
    ctx.set_page(home.clone());
    let offer = home.select(Element::CredentialOfferNotification).await?;
    ctx.set_page(offer);
    Ok(())
}

fn brought_to_offer<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::CredentialOffer).await?;
        Ok(())
    }
    .boxed()
}

fn select_accept<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::CredentialOffer, Element::Accept).await?;
        Ok(())
    }
    .boxed()
}

fn on_the_way<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let loading = ctx.page_or_open(PageKind::CredentialOnTheWay);
        loading.wait_until_gone(ctx.waits().screen).await
    }
    .boxed()
}

fn credential_added<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::CredentialAdded).await?;
        if let Some(id) = ctx.accept_pending_offer() {
            tracing::info!(credential = %id, "Credential added to wallet");
        }
        Ok(())
    }
    .boxed()
}

fn select_done<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        advance(ctx, PageKind::CredentialAdded, Element::Done).await?;
        Ok(())
    }
    .boxed()
}

fn brought_to_list<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::Credentials).await?;
        Ok(())
    }
    .boxed()
}

/// Expected name comes from the step, then the table, then the last
/// credential accepted in this scenario.
fn accepted_at_top<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let from_table = input
            .table
            .as_ref()
            .and_then(|t| t.first())
            .and_then(|row| row.opt("credential_name"))
            .map(str::to_string);
        let expected = match input.opt("credential_name").map(str::to_string).or(from_table) {
            Some(name) => name,
            None => ctx
                .credentials()
                .values()
                .last()
                .map(|c| display_name(&c.schema_name))
                .ok_or_else(|| Error::missing("accepted credential"))?,
        };

        let list = ctx.page_or_open(PageKind::Credentials);
        let names = list.texts(Element::CredentialName).await?;
        match names.first() {
            Some(top) if top.contains(&expected) => Ok(()),
            Some(top) => Err(Error::assertion(format!(
                "Top of the credential list is '{top}', expected '{expected}'"
            ))),
            None => Err(Error::assertion(format!(
                "Credential list is empty, expected '{expected}' at the top"
            ))),
        }
    }
    .boxed()
}
