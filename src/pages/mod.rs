//! Page objects for the wallet application
//!
//! Each screen is a [`PageKind`]; each thing on a screen a step can tap or
//! read is an [`Element`]. A [`Page`] handle pairs a kind with the driver
//! and knows which screen a tap leads to, so steps can keep the context's
//! current page handles in sync with the app.

mod appium;
mod driver;

pub use appium::AppiumDriver;
pub use driver::{Capabilities, WalletDriver};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};

/// Wallet screens the steps know about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PageKind {
    Onboarding,
    TermsAndConditions,
    PinSetup,
    Biometrics,
    Home,
    NavBar,
    Credentials,
    CredentialOffer,
    CredentialOnTheWay,
    CredentialAdded,
    Connecting,
    CameraPrivacyPolicy,
    ProofRequest,
    ProofRequestDetails,
    DeclineProofRequest,
    SendingInformationSecurely,
    InformationSentSuccessfully,
    InformationApproved,
}

impl PageKind {
    /// Accessibility id of the element that identifies the screen
    pub fn anchor_id(self) -> &'static str {
        match self {
            PageKind::Onboarding => "com.ariesbifold:id/Onboarding",
            PageKind::TermsAndConditions => "com.ariesbifold:id/TermsAndConditions",
            PageKind::PinSetup => "com.ariesbifold:id/PinCreate",
            PageKind::Biometrics => "com.ariesbifold:id/Biometrics",
            PageKind::Home => "com.ariesbifold:id/HomeView",
            PageKind::NavBar => "com.ariesbifold:id/TabBar",
            PageKind::Credentials => "com.ariesbifold:id/CredentialList",
            PageKind::CredentialOffer => "com.ariesbifold:id/CredentialOffer",
            PageKind::CredentialOnTheWay => "com.ariesbifold:id/CredentialOnTheWay",
            PageKind::CredentialAdded => "com.ariesbifold:id/CredentialAdded",
            PageKind::Connecting => "com.ariesbifold:id/Connecting",
            PageKind::CameraPrivacyPolicy => "com.ariesbifold:id/CameraDisclosure",
            PageKind::ProofRequest => "com.ariesbifold:id/ProofRequest",
            PageKind::ProofRequestDetails => "com.ariesbifold:id/ProofRequestDetails",
            PageKind::DeclineProofRequest => "com.ariesbifold:id/ConfirmDecline",
            PageKind::SendingInformationSecurely => "com.ariesbifold:id/SendingProofRequest",
            PageKind::InformationSentSuccessfully => "com.ariesbifold:id/SentProofRequest",
            PageKind::InformationApproved => "com.ariesbifold:id/ProofRequestAccepted",
        }
    }

    /// Screens that show the bottom navigation bar
    pub fn has_nav_bar(self) -> bool {
        matches!(self, PageKind::Home | PageKind::Credentials)
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} page", self)
    }
}

/// Tappable or readable things on a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// The element identifying the screen itself
    Anchor,
    Skip,
    AcceptTerms,
    Continue,
    PinInput,
    PinConfirmInput,
    CreatePin,
    UseBiometrics,
    Accept,
    Decline,
    Confirm,
    Share,
    Details,
    Back,
    Done,
    BackToHome,
    Okay,
    Scan,
    HomeTab,
    CredentialsTab,
    NotificationBadge,
    CredentialOfferNotification,
    CredentialName,
    Who,
    AttributeName,
    AttributeValue,
}

impl Element {
    fn test_id(self) -> &'static str {
        match self {
            Element::Anchor => "",
            Element::Skip => "com.ariesbifold:id/Skip",
            Element::AcceptTerms => "com.ariesbifold:id/IAgree",
            Element::Continue => "com.ariesbifold:id/Continue",
            Element::PinInput => "com.ariesbifold:id/EnterPIN",
            Element::PinConfirmInput => "com.ariesbifold:id/ReenterPIN",
            Element::CreatePin => "com.ariesbifold:id/CreatePIN",
            Element::UseBiometrics => "com.ariesbifold:id/ToggleBiometrics",
            Element::Accept => "com.ariesbifold:id/AcceptCredentialOffer",
            Element::Decline => "com.ariesbifold:id/Decline",
            Element::Confirm => "com.ariesbifold:id/ConfirmDeclineButton",
            Element::Share => "com.ariesbifold:id/Share",
            Element::Details => "com.ariesbifold:id/Details",
            Element::Back => "com.ariesbifold:id/Back",
            Element::Done => "com.ariesbifold:id/Done",
            Element::BackToHome => "com.ariesbifold:id/BackToHome",
            Element::Okay => "com.ariesbifold:id/Okay",
            Element::Scan => "com.ariesbifold:id/Scan",
            Element::HomeTab => "com.ariesbifold:id/Home",
            Element::CredentialsTab => "com.ariesbifold:id/Credentials",
            Element::NotificationBadge => "com.ariesbifold:id/NotificationBadge",
            Element::CredentialOfferNotification => "com.ariesbifold:id/ViewOffer",
            Element::CredentialName => "com.ariesbifold:id/CredentialName",
            Element::Who => "com.ariesbifold:id/ConnectionLabel",
            Element::AttributeName => "com.ariesbifold:id/AttributeName",
            Element::AttributeValue => "com.ariesbifold:id/AttributeValue",
        }
    }
}

/// Where an element lives and how the driver finds it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub page: PageKind,
    pub element: Element,
    /// Accessibility id (testID in the app source)
    pub id: &'static str,
}

impl Locator {
    pub fn new(page: PageKind, element: Element) -> Self {
        let id = match element {
            Element::Anchor => page.anchor_id(),
            other => other.test_id(),
        };
        Self { page, element, id }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} on {}", self.element, self.page)
    }
}

/// Screen reached by tapping `element` on `page`, if the tap navigates
pub fn navigate(page: PageKind, element: Element) -> Option<PageKind> {
    use Element as E;
    use PageKind as P;
    let next = match (page, element) {
        (P::Onboarding, E::Skip) => P::TermsAndConditions,
        (P::TermsAndConditions, E::Continue) => P::PinSetup,
        (P::PinSetup, E::CreatePin) => P::Biometrics,
        (P::Biometrics, E::Continue) => P::Home,
        (P::NavBar, E::Scan) => P::Connecting,
        (P::NavBar, E::HomeTab) => P::Home,
        (P::NavBar, E::CredentialsTab) => P::Credentials,
        (P::Home, E::CredentialOfferNotification) => P::CredentialOffer,
        (P::CredentialOffer, E::Accept) => P::CredentialOnTheWay,
        (P::CredentialOffer, E::Decline) => P::Home,
        (P::CredentialAdded, E::Done) => P::Credentials,
        (P::CameraPrivacyPolicy, E::Okay) => P::Connecting,
        (P::ProofRequest, E::Share) => P::SendingInformationSecurely,
        (P::ProofRequest, E::Decline) => P::DeclineProofRequest,
        (P::ProofRequest, E::Details) => P::ProofRequestDetails,
        (P::ProofRequestDetails, E::Back) => P::ProofRequest,
        (P::DeclineProofRequest, E::Confirm) => P::Home,
        (P::InformationSentSuccessfully, E::BackToHome) => P::Home,
        (P::InformationSentSuccessfully, E::Done) => P::Home,
        (P::InformationApproved, E::Done) => P::Home,
        _ => return None,
    };
    Some(next)
}

/// Bounds for polling a screen transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_millis(500),
        }
    }
}

/// What a proof request screen shows about the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProofRequestDetails {
    pub who: String,
    pub attributes: Vec<String>,
    pub values: Vec<String>,
}

/// Handle on one screen of the wallet
#[derive(Clone)]
pub struct Page {
    kind: PageKind,
    driver: Arc<dyn WalletDriver>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page").field("kind", &self.kind).finish()
    }
}

impl Page {
    pub fn new(kind: PageKind, driver: Arc<dyn WalletDriver>) -> Self {
        Self { kind, driver }
    }

    pub fn kind(&self) -> PageKind {
        self.kind
    }

    pub fn locator(&self, element: Element) -> Locator {
        Locator::new(self.kind, element)
    }

    /// Whether this screen is showing
    pub async fn on_this_page(&self) -> Result<bool> {
        self.driver.is_displayed(&self.locator(Element::Anchor)).await
    }

    /// Tap an element and return the screen it leads to
    pub async fn select(&self, element: Element) -> Result<Page> {
        let locator = self.locator(element);
        tracing::debug!(%locator, "Tap");
        self.driver.tap(&locator).await?;
        let next = navigate(self.kind, element).unwrap_or(self.kind);
        Ok(Page::new(next, Arc::clone(&self.driver)))
    }

    pub async fn enter_text(&self, element: Element, text: &str) -> Result<()> {
        self.driver.send_keys(&self.locator(element), text).await
    }

    pub async fn texts(&self, element: Element) -> Result<Vec<String>> {
        self.driver.texts(&self.locator(element)).await
    }

    /// Read the requester and requested attributes off a proof request
    pub async fn proof_request_details(&self) -> Result<ProofRequestDetails> {
        Ok(ProofRequestDetails {
            who: self.texts(Element::Who).await?.join(" "),
            attributes: self.texts(Element::AttributeName).await?,
            values: self.texts(Element::AttributeValue).await?,
        })
    }

    /// Poll until this screen shows, failing after `poll.timeout`
    pub async fn wait_until_present(&self, poll: PollSettings) -> Result<()> {
        let anchor = self.locator(Element::Anchor);
        if self.poll(&anchor, true, poll).await? {
            Ok(())
        } else {
            Err(self.timeout_error("appear", poll))
        }
    }

    /// Poll until this screen is gone, failing after `poll.timeout`
    ///
    /// A screen that is already gone passes immediately.
    pub async fn wait_until_gone(&self, poll: PollSettings) -> Result<()> {
        let anchor = self.locator(Element::Anchor);
        if self.poll(&anchor, false, poll).await? {
            Ok(())
        } else {
            Err(self.timeout_error("disappear", poll))
        }
    }

    /// Poll for an element, returning whether it showed before the timeout
    pub async fn wait_for_element(&self, element: Element, poll: PollSettings) -> Result<bool> {
        self.poll(&self.locator(element), true, poll).await
    }

    async fn poll(&self, locator: &Locator, want: bool, poll: PollSettings) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + poll.timeout;
        loop {
            if self.driver.is_displayed(locator).await? == want {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(poll.interval).await;
        }
    }

    fn timeout_error(&self, condition: &str, poll: PollSettings) -> Error {
        Error::PollTimeout {
            page: self.kind.to_string(),
            condition: condition.to_string(),
            secs: poll.timeout.as_secs_f64(),
        }
    }
}
