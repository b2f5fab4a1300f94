//! HTTP client for the agent test-harness backchannel
//!
//! Backchannels expose `/agent/command/{topic}/{operation}` and take
//! `{"data": ...}` bodies. Thread and connection ids returned by
//! one call are remembered for the next.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::common::config::AgentConfig;
use crate::common::{Error, Result};
use crate::fixtures::{CredentialFixture, ProofRequest};

use super::{AgentClient, Role};

#[derive(Debug, Default)]
struct ExchangeState {
    connection_id: Option<String>,
    issue_thread_id: Option<String>,
    proof_thread_id: Option<String>,
}

/// Backchannel client for one agent
pub struct BackchannelClient {
    role: Role,
    http: reqwest::Client,
    config: AgentConfig,
    state: Mutex<ExchangeState>,
}

impl BackchannelClient {
    pub fn new(role: Role, config: AgentConfig, http_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            role,
            http,
            config,
            state: Mutex::new(ExchangeState::default()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/agent/command/{}",
            self.config.url.trim_end_matches('/'),
            path
        )
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ExchangeState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Internal("backchannel state lock poisoned".to_string()))?;
        Ok(f(&mut state))
    }

    async fn post(&self, path: &str, data: Value) -> Result<Value> {
        let body = json!({ "data": data });
        tracing::debug!(role = %self.role, path, "POST backchannel");
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        self.read(path, response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        tracing::debug!(role = %self.role, path, "GET backchannel");
        let response = self.http.get(self.url(path)).send().await?;
        self.read(path, response).await
    }

    async fn read(&self, path: &str, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::agent(
                self.role,
                format!("{path} returned {status}: {text}"),
            ));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn connection_id(&self) -> Result<String> {
        self.with_state(|s| s.connection_id.clone())?
            .ok_or_else(|| Error::agent(self.role, "no connection; create an invitation first"))
    }

    fn string_field(&self, value: &Value, field: &str) -> Result<String> {
        value[field]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::agent(self.role, format!("response has no '{field}'")))
    }
}

#[async_trait]
impl AgentClient for BackchannelClient {
    fn role(&self) -> Role {
        self.role
    }

    async fn create_invitation(&self) -> Result<String> {
        let response = self
            .post(
                "out-of-band/send-invitation-message",
                json!({ "use_public_did": false }),
            )
            .await?;

        let connection_id = self.string_field(&response, "connection_id")?;
        self.with_state(|s| s.connection_id = Some(connection_id))?;

        match response["invitation_url"].as_str() {
            Some(url) => Ok(url.to_string()),
            None => Ok(response["invitation"].to_string()),
        }
    }

    async fn is_connected(&self) -> Result<bool> {
        let connection_id = match self.with_state(|s| s.connection_id.clone())? {
            Some(id) => id,
            None => return Ok(false),
        };
        let response = self.get(&format!("connection/{connection_id}")).await?;
        let state = response["state"].as_str().unwrap_or_default();
        Ok(matches!(state, "complete" | "completed" | "active" | "responded"))
    }

    async fn send_credential(
        &self,
        credential: Option<&CredentialFixture>,
        revocable: bool,
    ) -> Result<()> {
        let connection_id = self.connection_id()?;
        let cred_def_id = if revocable {
            self.config.revocable_cred_def_id.as_ref()
        } else {
            self.config.cred_def_id.as_ref()
        };

        let attributes: Vec<Value> = credential
            .map(|c| {
                c.attributes
                    .iter()
                    .map(|a| json!({ "name": a.name(), "value": a.value().unwrap_or_default() }))
                    .collect()
            })
            .unwrap_or_default();

        let response = self
            .post(
                "issue-credential/send-offer",
                json!({
                    "connection_id": connection_id,
                    "cred_def_id": cred_def_id,
                    "credential_preview": {
                        "@type": "https://didcomm.org/issue-credential/1.0/credential-preview",
                        "attributes": attributes,
                    },
                }),
            )
            .await?;

        let thread_id = response["thread_id"].as_str().map(str::to_string);
        self.with_state(|s| s.issue_thread_id = thread_id)?;
        Ok(())
    }

    async fn send_proof_request(&self, request: Option<&ProofRequest>) -> Result<Option<String>> {
        let mut presentation = json!({ "comment": "proof request from wallet-bdd" });
        if let Some(request) = request {
            presentation["proof_request"] = json!({ "data": request });
        }

        let connection_id = self.with_state(|s| s.connection_id.clone())?;
        let response = match &connection_id {
            Some(id) => {
                self.post(
                    "proof/send-request",
                    json!({ "connection_id": id, "presentation_request": presentation }),
                )
                .await?
            }
            None => {
                self.post(
                    "proof/create-request",
                    json!({ "presentation_request": presentation }),
                )
                .await?
            }
        };

        let thread_id = response["thread_id"].as_str().map(str::to_string);
        self.with_state(|s| s.proof_thread_id = thread_id)?;

        if connection_id.is_some() {
            return Ok(None);
        }
        Ok(response["invitation_url"]
            .as_str()
            .or_else(|| response["qrcode"].as_str())
            .map(str::to_string))
    }

    async fn revoke_credential(&self, notify_holder: bool) -> Result<()> {
        let thread_id = self
            .with_state(|s| s.issue_thread_id.clone())?
            .ok_or_else(|| Error::agent(self.role, "no credential has been issued"))?;
        let record = self.get(&format!("issue-credential/{thread_id}")).await?;

        let mut data = json!({
            "cred_rev_id": self.string_field(&record, "cred_rev_id")?,
            "rev_registry_id": self.string_field(&record, "rev_reg_id")?,
            "publish_immediately": true,
        });
        if notify_holder {
            data["notify_connection_id"] = json!(self.connection_id()?);
        }

        self.post("revocation/revoke", data).await?;
        tracing::info!(role = %self.role, thread_id = %thread_id, notify_holder, "Credential revoked");
        Ok(())
    }

    async fn get_issuer_type(&self) -> Result<String> {
        Ok(self.config.agent_type.clone())
    }

    async fn proof_request_verified(&self) -> Result<()> {
        let thread_id = self
            .with_state(|s| s.proof_thread_id.clone())?
            .ok_or_else(|| Error::agent(self.role, "no proof request has been sent"))?;
        let record = self.get(&format!("proof/{thread_id}")).await?;
        let state = record["state"].as_str().unwrap_or_default();
        let verified = record["verified"]
            .as_bool()
            .or_else(|| record["verified"].as_str().map(|v| v == "true"))
            .unwrap_or(state == "done");

        if verified {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "Proof request {thread_id} not verified (state '{state}')"
            )))
        }
    }

    async fn restart_issue_credential(&self) -> Result<()> {
        self.with_state(|s| s.issue_thread_id = None)
    }
}
