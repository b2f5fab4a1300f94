//! Issuer and verifier agents
//!
//! The runner never speaks the credential protocol itself. It asks an
//! external agent to act (offer, request a proof, revoke) and then checks
//! what the wallet shows.

mod backchannel;

pub use backchannel::BackchannelClient;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::fixtures::{CredentialFixture, ProofRequest};

/// The external roles a scenario talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Issuer,
    Verifier,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Issuer => write!(f, "issuer"),
            Role::Verifier => write!(f, "verifier"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_matches('"').to_lowercase().as_str() {
            "issuer" => Ok(Role::Issuer),
            "verifier" => Ok(Role::Verifier),
            other => Err(Error::Config(format!(
                "Unknown agent role '{}'. Expected \"issuer\" or \"verifier\"",
                other
            ))),
        }
    }
}

/// Client for one external agent
#[async_trait]
pub trait AgentClient: Send + Sync {
    fn role(&self) -> Role;

    /// Create a connection invitation and return the QR code payload
    async fn create_invitation(&self) -> Result<String>;

    /// Whether the connection made from the last invitation is complete
    async fn is_connected(&self) -> Result<bool>;

    /// Offer a credential over the current connection
    async fn send_credential(
        &self,
        credential: Option<&CredentialFixture>,
        revocable: bool,
    ) -> Result<()>;

    /// Send a proof request; connectionless requests return a QR payload
    async fn send_proof_request(&self, request: Option<&ProofRequest>) -> Result<Option<String>>;

    /// Revoke the last issued credential
    async fn revoke_credential(&self, notify_holder: bool) -> Result<()>;

    /// Agent implementation type, e.g. `acapy`
    async fn get_issuer_type(&self) -> Result<String>;

    /// Fail unless the last proof request was verified
    async fn proof_request_verified(&self) -> Result<()>;

    /// Forget issuance state so the next offer starts a new exchange
    async fn restart_issue_credential(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_quoted_names() {
        assert_eq!("\"verifier\"".parse::<Role>().unwrap(), Role::Verifier);
        assert_eq!("Issuer".parse::<Role>().unwrap(), Role::Issuer);
        assert!("holder".parse::<Role>().is_err());
    }
}
