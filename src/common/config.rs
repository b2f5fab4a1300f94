//! Configuration file handling

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Fixture locations
    #[serde(default)]
    pub fixtures: FixtureConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Step engine settings
    #[serde(default)]
    pub steps: StepConfig,

    /// Appium session settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Issuer and verifier backchannels
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Fixture locations
#[derive(Debug, Deserialize)]
pub struct FixtureConfig {
    /// Directory holding proof request and credential JSON documents
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("features/data")
}

/// Timeout settings
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// How long a screen may take to appear or a transient screen to clear
    #[serde(default = "default_screen")]
    pub screen_secs: u64,

    /// Delay between two presence checks while polling
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// How long to wait for a notification badge before moving on
    #[serde(default = "default_notification")]
    pub notification_secs: u64,

    /// Timeout for a single HTTP request to Appium or an agent
    #[serde(default = "default_http")]
    pub http_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            screen_secs: default_screen(),
            poll_interval_ms: default_poll_interval(),
            notification_secs: default_notification(),
            http_secs: default_http(),
        }
    }
}

fn default_screen() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    500
}
fn default_notification() -> u64 {
    5
}
fn default_http() -> u64 {
    60
}

impl Timeouts {
    /// Polling settings for screen transitions
    pub fn screen_poll(&self) -> crate::pages::PollSettings {
        crate::pages::PollSettings {
            timeout: Duration::from_secs(self.screen_secs),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    /// Polling settings for the notification badge check
    pub fn notification_poll(&self) -> crate::pages::PollSettings {
        crate::pages::PollSettings {
            timeout: Duration::from_secs(self.notification_secs),
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

/// Step engine settings
#[derive(Debug, Deserialize)]
pub struct StepConfig {
    /// Maximum nesting of composite steps before the scenario fails
    #[serde(default = "default_max_depth")]
    pub max_expansion_depth: usize,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            max_expansion_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    50
}

/// Appium session settings
#[derive(Debug, Deserialize)]
pub struct DriverConfig {
    /// Appium server URL
    #[serde(default = "default_appium_url")]
    pub url: String,

    /// `platformName` capability
    #[serde(default = "default_platform")]
    pub platform_name: String,

    /// `autoGrantPermissions` capability, if set
    #[serde(default)]
    pub auto_grant_permissions: Option<bool>,

    /// Extra capabilities passed through verbatim
    #[serde(default)]
    pub capabilities: BTreeMap<String, serde_json::Value>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            url: default_appium_url(),
            platform_name: default_platform(),
            auto_grant_permissions: None,
            capabilities: BTreeMap::new(),
        }
    }
}

fn default_appium_url() -> String {
    "http://127.0.0.1:4723".to_string()
}

fn default_platform() -> String {
    "Android".to_string()
}

/// Issuer and verifier backchannels
#[derive(Debug, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_issuer")]
    pub issuer: AgentConfig,

    #[serde(default = "default_verifier")]
    pub verifier: AgentConfig,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            issuer: default_issuer(),
            verifier: default_verifier(),
        }
    }
}

/// One agent backchannel
#[derive(Debug, Deserialize, Clone)]
pub struct AgentConfig {
    /// Backchannel base URL, e.g. `http://localhost:9020`
    pub url: String,

    /// Agent type reported to steps, e.g. `acapy` or `aries-vcx`
    #[serde(default = "default_agent_type")]
    pub agent_type: String,

    /// Credential definition used for offers (issuer only)
    #[serde(default)]
    pub cred_def_id: Option<String>,

    /// Revocable credential definition (issuer only)
    #[serde(default)]
    pub revocable_cred_def_id: Option<String>,
}

fn default_issuer() -> AgentConfig {
    AgentConfig {
        url: "http://127.0.0.1:9020".to_string(),
        agent_type: default_agent_type(),
        cred_def_id: None,
        revocable_cred_def_id: None,
    }
}

fn default_verifier() -> AgentConfig {
    AgentConfig {
        url: "http://127.0.0.1:9030".to_string(),
        agent_type: default_agent_type(),
        cred_def_id: None,
        revocable_cred_def_id: None,
    }
}

fn default_agent_type() -> String {
    "acapy".to_string()
}

impl Config {
    /// Load configuration from `path`, or from the default config file
    ///
    /// Returns default configuration if no file exists
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => config_path().filter(|p| p.exists()),
        };

        if let Some(path) = path {
            let content =
                std::fs::read_to_string(&path).map_err(|e| super::Error::FileRead {
                    path: path.display().to_string(),
                    error: e.to_string(),
                })?;
            return Self::parse(&content);
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.steps.max_expansion_depth, 50);
        assert_eq!(config.fixtures.data_dir, PathBuf::from("features/data"));
        assert_eq!(config.agents.verifier.agent_type, "acapy");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::parse(
            r#"
[timeouts]
screen_secs = 5

[agents.verifier]
url = "http://verifier:9030"
agent_type = "aca-py-old"
"#,
        )
        .unwrap();
        assert_eq!(config.timeouts.screen_secs, 5);
        assert_eq!(config.timeouts.poll_interval_ms, 500);
        assert_eq!(config.agents.verifier.agent_type, "aca-py-old");
        assert_eq!(config.agents.issuer.url, "http://127.0.0.1:9020");
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = Config::parse("[steps\nmax_expansion_depth = ").unwrap_err();
        assert!(matches!(err, super::super::Error::ConfigParse(_)));
    }
}
