//! Connecting the holder to an issuer or verifier

use futures_util::FutureExt;

use crate::agents::Role;
use crate::common::{Error, Result};
use crate::context::ScenarioContext;
use crate::pages::{Element, PageKind};

use super::registry::{child, ChildStep, StepFuture, StepInput, StepRegistry, ANY, GIVEN, GIVEN_WHEN};
use super::StepComposer;

const CONNECT_TO_ISSUER: &[ChildStep] = &[
    child("When the Holder scans the QR code sent by the \"issuer\""),
    child("And the Holder is taken to the Connecting Screen/modal"),
    child("And the Connecting completes successfully"),
    child("Then there is a connection between \"issuer\" and Holder"),
];

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    registry
        .run(
            GIVEN_WHEN,
            "the Holder scans the QR code sent by the \"{agent}\"",
            scan_invitation,
        )?
        .run(GIVEN_WHEN, "they Scan the credential offer QR Code", scan_offer)?
        .run(ANY, "the Holder is taken to the Connecting Screen/modal", taken_to_connecting)?
        .run(ANY, "the Connecting completes successfully", connecting_completes)?
        .run(
            ANY,
            "there is a connection between \"{agent}\" and Holder",
            connection_exists,
        )?
        .expand(GIVEN, "a connection has been successfully made", CONNECT_TO_ISSUER)?;
    Ok(())
}

/// Tap Scan on the navigation bar and get past the camera disclosure
///
/// The disclosure only shows on the first scan, and only when the session
/// does not auto-grant the camera permission.
pub(super) async fn scan(ctx: &mut ScenarioContext) -> Result<()> {
    let nav = ctx.open_page(PageKind::NavBar);
    let mut next = nav.select(Element::Scan).await?;

    if ctx.driver().capabilities().needs_camera_consent() {
        let policy = ctx.open_page(PageKind::CameraPrivacyPolicy);
        if policy.on_this_page().await? {
            tracing::debug!("Dismissing camera privacy policy");
            next = policy.select(Element::Okay).await?;
        }
    }
    ctx.set_page(next);
    Ok(())
}

fn scan_invitation<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let role: Role = input.arg("agent")?.parse()?;
        let invitation = ctx.agent(role)?.create_invitation().await?;
        tracing::info!(%role, "Scanning invitation");
        ctx.driver().inject_qrcode(&invitation).await?;
        scan(ctx).await
    }
    .boxed()
}

fn scan_offer<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move { scan(ctx).await }.boxed()
}

fn taken_to_connecting<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let connecting = ctx.page_or_open(PageKind::Connecting);
        if !connecting.on_this_page().await? {
            return Err(Error::assertion("Holder was not taken to the Connecting screen"));
        }
        Ok(())
    }
    .boxed()
}

fn connecting_completes<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let connecting = ctx.page_or_open(PageKind::Connecting);
        connecting.wait_until_gone(ctx.waits().screen).await
    }
    .boxed()
}

/// The agent completes its side of the connection asynchronously, so the
/// check polls within the screen timeout.
fn connection_exists<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let role: Role = input.arg("agent")?.parse()?;
        let agent = ctx.agent(role)?;
        let poll = ctx.waits().screen;
        let deadline = tokio::time::Instant::now() + poll.timeout;
        loop {
            if agent.is_connected().await? {
                tracing::debug!(%role, "Connection confirmed");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::assertion(format!(
                    "No connection between \"{role}\" and Holder"
                )));
            }
            tokio::time::sleep(poll.interval).await;
        }
    }
    .boxed()
}
