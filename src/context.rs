//! Scenario context
//!
//! Everything steps share during one scenario. Every slot is typed and
//! every accessor fails with [`Error::MissingContext`] when an earlier step
//! has not filled it, so a mis-ordered scenario stops at the step that
//! needed the state instead of somewhere downstream.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agents::{AgentClient, Role};
use crate::common::config::Timeouts;
use crate::common::{Error, Result};
use crate::fixtures::{CredentialCollection, CredentialFixture, FixtureStore, ProofRequest};
use crate::pages::{Page, PageKind, PollSettings, WalletDriver};

/// Collaborators a scenario runs against
#[derive(Clone)]
pub struct Session {
    pub driver: Arc<dyn WalletDriver>,
    pub issuer: Option<Arc<dyn AgentClient>>,
    pub verifier: Option<Arc<dyn AgentClient>>,
}

/// Polling bounds used by steps that wait on the UI
#[derive(Debug, Clone, Copy, Default)]
pub struct Waits {
    pub screen: PollSettings,
    pub notification: PollSettings,
}

impl From<&Timeouts> for Waits {
    fn from(timeouts: &Timeouts) -> Self {
        Self {
            screen: timeouts.screen_poll(),
            notification: timeouts.notification_poll(),
        }
    }
}

/// Mutable state of one running scenario
pub struct ScenarioContext {
    scenario_name: String,
    tags: Vec<String>,
    session: Session,
    fixtures: FixtureStore,
    waits: Waits,
    pages: BTreeMap<PageKind, Page>,
    proof_request: Option<ProofRequest>,
    credentials: CredentialCollection,
    pending_offer: Option<(String, CredentialFixture)>,
    pub(crate) expansion: Vec<String>,
}

impl ScenarioContext {
    pub fn new(
        scenario_name: impl Into<String>,
        tags: Vec<String>,
        session: Session,
        fixtures: FixtureStore,
        waits: Waits,
    ) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            tags,
            session,
            fixtures,
            waits,
            pages: BTreeMap::new(),
            proof_request: None,
            credentials: CredentialCollection::new(),
            pending_offer: None,
            expansion: Vec::new(),
        }
    }

    pub fn scenario_name(&self) -> &str {
        &self.scenario_name
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim_start_matches('@');
        self.tags.iter().any(|t| t.trim_start_matches('@') == tag)
    }

    pub fn driver(&self) -> &Arc<dyn WalletDriver> {
        &self.session.driver
    }

    pub fn fixtures(&self) -> &FixtureStore {
        &self.fixtures
    }

    pub fn waits(&self) -> Waits {
        self.waits
    }

    /// The issuer or verifier client
    pub fn agent(&self, role: Role) -> Result<Arc<dyn AgentClient>> {
        let agent = match role {
            Role::Issuer => &self.session.issuer,
            Role::Verifier => &self.session.verifier,
        };
        agent
            .clone()
            .ok_or_else(|| Error::missing(format!("{role} agent")))
    }

    pub fn issuer(&self) -> Result<Arc<dyn AgentClient>> {
        self.agent(Role::Issuer)
    }

    pub fn verifier(&self) -> Result<Arc<dyn AgentClient>> {
        self.agent(Role::Verifier)
    }

    /// Current handle for a screen
    pub fn page(&self, kind: PageKind) -> Result<&Page> {
        self.pages
            .get(&kind)
            .ok_or_else(|| Error::missing(kind.to_string()))
    }

    /// Make `page` the current handle for its kind, replacing any older one
    pub fn set_page(&mut self, page: Page) -> &Page {
        let kind = page.kind();
        tracing::trace!(%kind, "Page handle set");
        self.pages.insert(kind, page);
        &self.pages[&kind]
    }

    /// Create a fresh handle for a screen and make it current
    pub fn open_page(&mut self, kind: PageKind) -> Page {
        let page = Page::new(kind, Arc::clone(&self.session.driver));
        self.set_page(page.clone());
        page
    }

    /// Current handle for a screen, creating one if none exists yet
    pub fn page_or_open(&mut self, kind: PageKind) -> Page {
        match self.pages.get(&kind) {
            Some(page) => page.clone(),
            None => self.open_page(kind),
        }
    }

    /// Page kinds that currently have a handle
    pub fn page_kinds(&self) -> Vec<PageKind> {
        self.pages.keys().copied().collect()
    }

    /// The proof request sent in this scenario
    pub fn proof_request(&self) -> Result<&ProofRequest> {
        self.proof_request
            .as_ref()
            .ok_or_else(|| Error::missing("proof request"))
    }

    pub fn set_proof_request(&mut self, request: ProofRequest) {
        self.proof_request = Some(request);
    }

    /// Credentials the holder has accepted, in acceptance order
    pub fn credentials(&self) -> &CredentialCollection {
        &self.credentials
    }

    /// Record a credential the holder has accepted
    pub fn add_credential(&mut self, id: impl Into<String>, credential: CredentialFixture) {
        let id = id.into();
        tracing::debug!(credential = %id, schema = %credential.schema_name, "Credential recorded");
        self.credentials.insert(id, credential);
    }

    /// Remember the credential the issuer has just offered
    pub fn set_pending_offer(&mut self, id: impl Into<String>, credential: CredentialFixture) {
        self.pending_offer = Some((id.into(), credential));
    }

    /// Move the offered credential into the accepted collection
    ///
    /// Returns the credential id, or `None` when the offer carried no
    /// fixture.
    pub fn accept_pending_offer(&mut self) -> Option<String> {
        let (id, credential) = self.pending_offer.take()?;
        self.add_credential(id.clone(), credential);
        Some(id)
    }

    /// Steps currently executing, outermost first
    pub fn expansion_chain(&self) -> &[String] {
        &self.expansion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock::MockNetwork;

    #[test]
    fn test_unset_slots_report_missing_context() {
        let ctx = MockNetwork::new().context("empty");
        assert!(matches!(ctx.proof_request(), Err(Error::MissingContext(_))));
        assert!(matches!(ctx.page(PageKind::Home), Err(Error::MissingContext(_))));
        assert!(ctx.credentials().is_empty());
        assert!(ctx.expansion_chain().is_empty());
    }

    #[test]
    fn test_page_handles_are_replaced_per_kind() {
        let mut ctx = MockNetwork::new().context("pages");
        ctx.open_page(PageKind::Home);
        ctx.open_page(PageKind::Credentials);
        ctx.page_or_open(PageKind::Home);
        assert_eq!(ctx.page_kinds(), vec![PageKind::Home, PageKind::Credentials]);
        assert_eq!(ctx.page(PageKind::Credentials).unwrap().kind(), PageKind::Credentials);
    }

    #[test]
    fn test_pending_offer_moves_into_credentials() {
        let mut ctx = MockNetwork::new().context("offer");
        assert_eq!(ctx.accept_pending_offer(), None);

        ctx.set_pending_offer("pr", CredentialFixture::new("permanent_resident", ["given_name"]));
        ctx.add_credential("photo", CredentialFixture::new("photo_id", ["photo"]));
        assert_eq!(ctx.accept_pending_offer().as_deref(), Some("pr"));

        let ids: Vec<&str> = ctx.credentials().iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["photo", "pr"]);
        assert_eq!(ctx.accept_pending_offer(), None);
    }

    #[test]
    fn test_tags_ignore_at_sign() {
        let network = MockNetwork::new();
        let ctx = network.context_with(
            "tagged",
            vec!["@PerformanceTest".to_string()],
            FixtureStore::new("features/data"),
        );
        assert!(ctx.has_tag("PerformanceTest"));
        assert!(ctx.has_tag("@PerformanceTest"));
        assert!(!ctx.has_tag("Proof"));
    }

    #[test]
    fn test_missing_agent() {
        let network = MockNetwork::new();
        let session = Session {
            driver: network.wallet(),
            issuer: None,
            verifier: None,
        };
        let ctx = ScenarioContext::new(
            "no agents",
            Vec::new(),
            session,
            FixtureStore::new("features/data"),
            MockNetwork::WAITS,
        );
        assert!(matches!(ctx.issuer(), Err(Error::MissingContext(_))));
    }
}
