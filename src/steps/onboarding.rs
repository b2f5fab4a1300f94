//! First-run wallet setup

use futures_util::FutureExt;

use crate::common::Result;
use crate::context::ScenarioContext;
use crate::pages::{Element, PageKind};

use super::registry::{child, ChildStep, StepFuture, StepInput, StepRegistry, GIVEN};
use super::{advance, arrive, StepComposer};

const SETUP_WITH_BIOMETRICS: &[ChildStep] = &[
    child("Given the User has skipped on-boarding"),
    child("And the User has accepted the Terms and Conditions"),
    child("And a PIN has been set up with \"369369\""),
    child("And the Holder has selected to use biometrics to unlock BC Wallet"),
];

const SETUP: &[ChildStep] = &[
    child("Given the User has skipped on-boarding"),
    child("And the User has accepted the Terms and Conditions"),
    child("And a PIN has been set up with \"369369\""),
    child("And the Holder has chosen not to use biometrics"),
];

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    registry
        .run(GIVEN, "the User has skipped on-boarding", skip_onboarding)?
        .run(GIVEN, "the User has accepted the Terms and Conditions", accept_terms)?
        .run(GIVEN, "a PIN has been set up with \"{pin}\"", set_pin)?
        .run(
            GIVEN,
            "the Holder has selected to use biometrics to unlock BC Wallet",
            use_biometrics,
        )?
        .run(GIVEN, "the Holder has chosen not to use biometrics", skip_biometrics)?;

    // Feature files in the wild spell it both ways.
    for pattern in [
        "the BCSC holder has setup thier Wallet",
        "the BCSC holder has setup their Wallet",
        "the PCTF Member has setup thier Wallet",
        "the PCTF Member has setup their Wallet",
    ] {
        registry.expand(GIVEN, pattern, SETUP_WITH_BIOMETRICS)?;
    }
    for pattern in [
        "the Holder has setup thier Wallet",
        "the Holder has setup their Wallet",
    ] {
        registry.expand(GIVEN, pattern, SETUP)?;
    }
    Ok(())
}

fn skip_onboarding<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::Onboarding).await?;
        advance(ctx, PageKind::Onboarding, Element::Skip).await?;
        Ok(())
    }
    .boxed()
}

fn accept_terms<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let terms = arrive(ctx, PageKind::TermsAndConditions).await?;
        terms.select(Element::AcceptTerms).await?;
        advance(ctx, PageKind::TermsAndConditions, Element::Continue).await?;
        Ok(())
    }
    .boxed()
}

fn set_pin<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    input: StepInput,
) -> StepFuture<'a> {
    async move {
        let pin = input.arg("pin")?;
        let page = arrive(ctx, PageKind::PinSetup).await?;
        page.enter_text(Element::PinInput, pin).await?;
        page.enter_text(Element::PinConfirmInput, pin).await?;
        advance(ctx, PageKind::PinSetup, Element::CreatePin).await?;
        Ok(())
    }
    .boxed()
}

fn use_biometrics<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        let page = arrive(ctx, PageKind::Biometrics).await?;
        page.select(Element::UseBiometrics).await?;
        advance(ctx, PageKind::Biometrics, Element::Continue).await?;
        Ok(())
    }
    .boxed()
}

fn skip_biometrics<'a>(
    _steps: &'a StepComposer,
    ctx: &'a mut ScenarioContext,
    _input: StepInput,
) -> StepFuture<'a> {
    async move {
        arrive(ctx, PageKind::Biometrics).await?;
        advance(ctx, PageKind::Biometrics, Element::Continue).await?;
        Ok(())
    }
    .boxed()
}
