//! In-memory wallet and agents
//!
//! A [`MockNetwork`] simulates the wallet app and both agents over shared
//! state, so scenarios run without a device or agent services. Time only
//! passes when someone looks: each presence check (or connection check)
//! moves a transient screen one observation closer to being replaced.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::agents::{AgentClient, Role};
use crate::common::{Error, Result};
use crate::context::{ScenarioContext, Session, Waits};
use crate::fixtures::{CredentialFixture, FixtureStore, ProofRequest};
use crate::pages::{navigate, Capabilities, Element, Locator, PageKind, PollSettings, WalletDriver};
use crate::reconcile::display_name;

/// Observations a transient screen survives before it moves on
const TRANSIENT_OBSERVATIONS: u32 = 2;

/// How the verifier treats a shared proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProofOutcome {
    /// The wallet moves on to the approved screen
    #[default]
    Approved,
    /// The wallet stays on the sent screen
    SentOnly,
}

/// Knobs for a simulated run
#[derive(Debug, Clone)]
pub struct MockSettings {
    pub start_page: PageKind,
    pub capabilities: Capabilities,
    pub outcome: ProofOutcome,
    pub verifier_label: String,
    pub issuer_type: String,
    pub verifier_type: String,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            start_page: PageKind::Onboarding,
            capabilities: Capabilities {
                platform_name: "Android".to_string(),
                auto_grant_permissions: Some(true),
            },
            outcome: ProofOutcome::Approved,
            verifier_label: "aca-py.Verifier".to_string(),
            issuer_type: "acapy".to_string(),
            verifier_type: "acapy".to_string(),
        }
    }
}

#[derive(Debug)]
struct NetworkState {
    settings: MockSettings,
    page: PageKind,
    observations_left: u32,
    camera_consented: bool,
    scanned: Option<Role>,
    invited: Vec<Role>,
    connected: Vec<Role>,
    offer: Option<CredentialFixture>,
    incoming: Option<CredentialFixture>,
    notification: bool,
    wallet: Vec<CredentialFixture>,
    proof: Option<ProofRequest>,
    shared: bool,
    issued: bool,
    sequence: u32,
    calls: Vec<String>,
}

impl NetworkState {
    fn new(settings: MockSettings) -> Self {
        Self {
            page: settings.start_page,
            settings,
            observations_left: TRANSIENT_OBSERVATIONS,
            camera_consented: false,
            scanned: None,
            invited: Vec::new(),
            connected: Vec::new(),
            offer: None,
            incoming: None,
            notification: false,
            wallet: Vec::new(),
            proof: None,
            shared: false,
            issued: false,
            sequence: 0,
            calls: Vec::new(),
        }
    }

    fn show(&mut self, page: PageKind) {
        self.page = page;
        self.observations_left = TRANSIENT_OBSERVATIONS;
    }

    fn is_transient(&self) -> bool {
        match self.page {
            PageKind::Connecting
            | PageKind::CredentialOnTheWay
            | PageKind::SendingInformationSecurely => true,
            PageKind::InformationSentSuccessfully => {
                self.settings.outcome == ProofOutcome::Approved
            }
            _ => false,
        }
    }

    /// One unit of time passes
    fn observe(&mut self) {
        if !self.is_transient() {
            return;
        }
        if self.observations_left > 0 {
            self.observations_left -= 1;
            return;
        }
        self.resolve_transient();
    }

    fn resolve_transient(&mut self) {
        let next = match self.page {
            PageKind::Connecting => {
                if let Some(role) = self.scanned.take() {
                    if !self.connected.contains(&role) {
                        self.connected.push(role);
                    }
                }
                if self.proof.is_some() && !self.shared {
                    PageKind::ProofRequest
                } else if self.offer.is_some() {
                    PageKind::CredentialOffer
                } else {
                    PageKind::Home
                }
            }
            PageKind::CredentialOnTheWay => {
                if let Some(credential) = self.incoming.take() {
                    self.wallet.push(credential);
                    self.issued = true;
                }
                PageKind::CredentialAdded
            }
            PageKind::SendingInformationSecurely => PageKind::InformationSentSuccessfully,
            PageKind::InformationSentSuccessfully => PageKind::InformationApproved,
            other => other,
        };
        self.show(next);
    }

    fn shows(&self, locator: &Locator) -> bool {
        let on_page = if locator.page == PageKind::NavBar {
            self.page.has_nav_bar()
        } else {
            self.page == locator.page
        };
        if !on_page {
            return false;
        }
        match locator.element {
            Element::NotificationBadge => self.notification,
            Element::CredentialOfferNotification => self.offer.is_some(),
            _ => true,
        }
    }

    fn require(&self, locator: &Locator) -> Result<()> {
        if self.shows(locator) {
            Ok(())
        } else {
            Err(Error::ElementNotFound {
                page: locator.page.to_string(),
                element: format!("{:?} (wallet is on {})", locator.element, self.page),
            })
        }
    }

    fn tap(&mut self, locator: &Locator) -> Result<()> {
        self.require(locator)?;
        self.calls
            .push(format!("tap {:?} on {:?}", locator.element, locator.page));

        use Element as E;
        use PageKind as P;
        match (locator.page, locator.element) {
            (P::NavBar, E::Scan) => {
                if self.settings.capabilities.needs_camera_consent() && !self.camera_consented {
                    self.show(P::CameraPrivacyPolicy);
                } else {
                    self.show(P::Connecting);
                }
            }
            (P::CameraPrivacyPolicy, E::Okay) => {
                self.camera_consented = true;
                self.show(P::Connecting);
            }
            (P::Home, E::CredentialOfferNotification) => {
                self.notification = false;
                self.show(P::CredentialOffer);
            }
            (P::CredentialOffer, E::Accept) => {
                self.incoming = self.offer.take();
                self.show(P::CredentialOnTheWay);
            }
            (P::CredentialOffer, E::Decline) => {
                self.offer = None;
                self.show(P::Home);
            }
            (P::ProofRequest, E::Share) => {
                self.shared = true;
                self.show(P::SendingInformationSecurely);
            }
            (P::DeclineProofRequest, E::Confirm)
            | (P::InformationSentSuccessfully, E::Done | E::BackToHome)
            | (P::InformationApproved, E::Done) => {
                self.proof = None;
                self.show(P::Home);
            }
            (page, element) => {
                if let Some(next) = navigate(page, element) {
                    self.show(next);
                }
            }
        }
        Ok(())
    }

    /// Display names of accepted credentials, newest first
    fn credential_list(&self) -> Vec<String> {
        self.wallet
            .iter()
            .rev()
            .map(|c| display_name(&c.schema_name))
            .collect()
    }

    fn requested_names(&self) -> Vec<String> {
        self.proof
            .as_ref()
            .map(|p| p.all_requested_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Accepted credentials able to answer the current request
    fn candidates(&self) -> Vec<&CredentialFixture> {
        let names = self.requested_names();
        self.wallet
            .iter()
            .filter(|c| names.iter().any(|n| c.has_attribute(n)))
            .collect()
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.require(locator)?;
        let texts = match (locator.page, locator.element) {
            (PageKind::Credentials, Element::CredentialName) => self.credential_list(),
            (PageKind::ProofRequestDetails, Element::CredentialName) => self
                .candidates()
                .into_iter()
                .map(|c| display_name(&c.schema_name))
                .collect(),
            (PageKind::ProofRequest, Element::Who) => vec![self.settings.verifier_label.clone()],
            (PageKind::ProofRequest, Element::AttributeName) => self.requested_names(),
            (PageKind::ProofRequest, Element::AttributeValue) => self
                .requested_names()
                .iter()
                .filter_map(|name| {
                    self.wallet
                        .iter()
                        .find_map(|c| c.value_of(name))
                        .map(str::to_string)
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(texts)
    }

    fn page_source(&self) -> String {
        let mut source = format!("<Screen id=\"{}\">", self.page.anchor_id());
        if self.page == PageKind::ProofRequest {
            for name in self.requested_names() {
                if let Some(holder) = self.wallet.iter().find(|c| c.has_attribute(&name)) {
                    source.push_str(&format!(
                        "<Text>{}</Text><Text>{}</Text>",
                        display_name(&holder.schema_name),
                        name
                    ));
                } else {
                    source.push_str(&format!("<Text>{}</Text><Text>missing</Text>", name));
                }
            }
        }
        source.push_str("</Screen>");
        source
    }

    fn next_id(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    /// A message from `role` reaches the holder
    fn deliver(&mut self, arrival: PageKind) {
        match self.page {
            PageKind::Connecting => {}
            PageKind::Credentials if arrival == PageKind::CredentialOffer => {
                self.notification = true;
            }
            _ => self.show(arrival),
        }
    }
}

/// Shared state of one simulated wallet and its agents
#[derive(Clone)]
pub struct MockNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNetwork {
    /// Polling bounds for simulated runs; nothing waits on real time
    pub const WAITS: Waits = Waits {
        screen: PollSettings {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(1),
        },
        notification: PollSettings {
            timeout: Duration::from_millis(50),
            interval: Duration::from_millis(1),
        },
    };

    pub fn new() -> Self {
        Self::with_settings(MockSettings::default())
    }

    pub fn with_settings(settings: MockSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState::new(settings))),
        }
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wallet(&self) -> Arc<MockWallet> {
        let capabilities = self.state().settings.capabilities.clone();
        Arc::new(MockWallet {
            network: self.clone(),
            capabilities,
        })
    }

    pub fn agent(&self, role: Role) -> Arc<MockAgent> {
        Arc::new(MockAgent {
            role,
            network: self.clone(),
        })
    }

    /// Wallet plus both agents
    pub fn session(&self) -> Session {
        Session {
            driver: self.wallet(),
            issuer: Some(self.agent(Role::Issuer)),
            verifier: Some(self.agent(Role::Verifier)),
        }
    }

    /// Fresh scenario context over this network
    pub fn context(&self, name: &str) -> ScenarioContext {
        self.context_with(name, Vec::new(), FixtureStore::new("features/data"))
    }

    pub fn context_with(
        &self,
        name: &str,
        tags: Vec<String>,
        fixtures: FixtureStore,
    ) -> ScenarioContext {
        ScenarioContext::new(name, tags, self.session(), fixtures, Self::WAITS)
    }

    /// Every action taken against the wallet or the agents, in order
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn current_page(&self) -> PageKind {
        self.state().page
    }

    /// Display names of accepted credentials, newest first
    pub fn credential_list(&self) -> Vec<String> {
        self.state().credential_list()
    }

    pub fn is_connected(&self, role: Role) -> bool {
        self.state().connected.contains(&role)
    }
}

/// Simulated wallet app
pub struct MockWallet {
    network: MockNetwork,
    capabilities: Capabilities,
}

#[async_trait]
impl WalletDriver for MockWallet {
    async fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        let mut state = self.network.state();
        state.observe();
        Ok(state.shows(locator))
    }

    async fn tap(&self, locator: &Locator) -> Result<()> {
        self.network.state().tap(locator)
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
        let mut state = self.network.state();
        state.require(locator)?;
        state
            .calls
            .push(format!("type {:?} into {:?} on {:?}", text, locator.element, locator.page));
        Ok(())
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.network.state().texts(locator)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.network.state().page_source())
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn inject_qrcode(&self, payload: &str) -> Result<()> {
        let role = payload
            .strip_prefix("mock://")
            .and_then(|rest| rest.split('/').next())
            .ok_or_else(|| Error::Driver(format!("Unrecognised QR code payload '{payload}'")))?
            .parse::<Role>()?;
        let mut state = self.network.state();
        state.scanned = Some(role);
        state.calls.push(format!("inject_qrcode {payload}"));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.network.state().calls.push("close".to_string());
        Ok(())
    }
}

/// Simulated issuer or verifier
pub struct MockAgent {
    role: Role,
    network: MockNetwork,
}

#[async_trait]
impl AgentClient for MockAgent {
    fn role(&self) -> Role {
        self.role
    }

    async fn create_invitation(&self) -> Result<String> {
        let mut state = self.network.state();
        let id = state.next_id();
        if !state.invited.contains(&self.role) {
            state.invited.push(self.role);
        }
        state.calls.push(format!("{}.create_invitation", self.role));
        Ok(format!("mock://{}/invitation/{}", self.role, id))
    }

    async fn is_connected(&self) -> Result<bool> {
        let mut state = self.network.state();
        state.observe();
        Ok(state.connected.contains(&self.role))
    }

    async fn send_credential(
        &self,
        credential: Option<&CredentialFixture>,
        revocable: bool,
    ) -> Result<()> {
        let mut state = self.network.state();
        let connected = state.connected.contains(&self.role);
        if !connected && !state.invited.contains(&self.role) {
            return Err(Error::agent(self.role, "no connection; create an invitation first"));
        }

        let credential = credential
            .cloned()
            .unwrap_or_else(|| CredentialFixture::new("mock_credential", ["name"]));
        state.calls.push(format!(
            "{}.send_credential {} revocable={}",
            self.role, credential.schema_name, revocable
        ));
        state.offer = Some(credential);
        if connected {
            state.deliver(PageKind::CredentialOffer);
        }
        Ok(())
    }

    async fn send_proof_request(&self, request: Option<&ProofRequest>) -> Result<Option<String>> {
        let mut state = self.network.state();
        let name = request
            .and_then(|r| r.name.clone())
            .unwrap_or_else(|| "default".to_string());
        state
            .calls
            .push(format!("{}.send_proof_request {}", self.role, name));
        state.proof = Some(request.cloned().unwrap_or_default());
        state.shared = false;

        if state.connected.contains(&self.role) {
            state.deliver(PageKind::ProofRequest);
            return Ok(None);
        }
        let id = state.next_id();
        Ok(Some(format!("mock://{}/proof/{}", self.role, id)))
    }

    async fn revoke_credential(&self, notify_holder: bool) -> Result<()> {
        let mut state = self.network.state();
        if !state.issued {
            return Err(Error::agent(self.role, "no credential has been issued"));
        }
        state.calls.push(format!(
            "{}.revoke_credential notify_holder={}",
            self.role, notify_holder
        ));
        Ok(())
    }

    async fn get_issuer_type(&self) -> Result<String> {
        let state = self.network.state();
        Ok(match self.role {
            Role::Issuer => state.settings.issuer_type.clone(),
            Role::Verifier => state.settings.verifier_type.clone(),
        })
    }

    async fn proof_request_verified(&self) -> Result<()> {
        let state = self.network.state();
        if state.shared && state.settings.outcome == ProofOutcome::Approved {
            Ok(())
        } else {
            Err(Error::assertion("Proof request was not verified"))
        }
    }

    async fn restart_issue_credential(&self) -> Result<()> {
        let mut state = self.network.state();
        state.offer = None;
        state
            .calls
            .push(format!("{}.restart_issue_credential", self.role));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::Page;

    fn page(network: &MockNetwork, kind: PageKind) -> Page {
        Page::new(kind, network.wallet())
    }

    #[tokio::test]
    async fn test_transient_screen_moves_on_when_observed() {
        let network = MockNetwork::with_settings(MockSettings {
            start_page: PageKind::Home,
            ..Default::default()
        });
        let verifier = network.agent(Role::Verifier);
        let qr = verifier.create_invitation().await.unwrap();
        network.wallet().inject_qrcode(&qr).await.unwrap();

        let connecting = page(&network, PageKind::NavBar)
            .select(Element::Scan)
            .await
            .unwrap();
        assert_eq!(connecting.kind(), PageKind::Connecting);
        assert!(connecting.on_this_page().await.unwrap());

        connecting
            .wait_until_gone(MockNetwork::WAITS.screen)
            .await
            .unwrap();
        assert_eq!(network.current_page(), PageKind::Home);
        assert!(network.is_connected(Role::Verifier));
        assert!(!network.is_connected(Role::Issuer));
    }

    #[tokio::test]
    async fn test_offer_on_credential_list_raises_notification() {
        let network = MockNetwork::with_settings(MockSettings {
            start_page: PageKind::Credentials,
            ..Default::default()
        });
        network.state().connected.push(Role::Issuer);

        network
            .agent(Role::Issuer)
            .send_credential(None, false)
            .await
            .unwrap();

        assert_eq!(network.current_page(), PageKind::Credentials);
        let badge = Locator::new(PageKind::NavBar, Element::NotificationBadge);
        assert!(network.wallet().is_displayed(&badge).await.unwrap());
    }

    #[tokio::test]
    async fn test_tap_off_screen_fails() {
        let network = MockNetwork::new();
        let err = page(&network, PageKind::ProofRequest)
            .select(Element::Share)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_agent_requires_invitation() {
        let network = MockNetwork::new();
        let issuer = network.agent(Role::Issuer);
        assert!(issuer.send_credential(None, false).await.is_err());
        assert!(issuer.revoke_credential(true).await.is_err());

        issuer.create_invitation().await.unwrap();
        issuer.send_credential(None, true).await.unwrap();
        assert_eq!(
            network.calls(),
            vec![
                "issuer.create_invitation",
                "issuer.send_credential mock_credential revocable=true"
            ]
        );
    }

    #[tokio::test]
    async fn test_connectionless_proof_request_returns_qr_code() {
        let network = MockNetwork::new();
        let verifier = network.agent(Role::Verifier);
        let qr = verifier.send_proof_request(None).await.unwrap();
        assert!(qr.unwrap().starts_with("mock://verifier/proof/"));
        assert!(verifier.proof_request_verified().await.is_err());
    }
}
