//! The automation driver the page objects sit on

use async_trait::async_trait;

use crate::common::Result;

use super::Locator;

/// Session capabilities the steps branch on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `platformName`, e.g. `Android` or `iOS`
    pub platform_name: String,
    /// `autoGrantPermissions`, when the session set it
    pub auto_grant_permissions: Option<bool>,
}

impl Capabilities {
    /// Whether the first scan shows the camera privacy policy
    ///
    /// Android sessions that auto-grant permissions skip it.
    pub fn needs_camera_consent(&self) -> bool {
        self.auto_grant_permissions == Some(false) || self.platform_name.eq_ignore_ascii_case("ios")
    }
}

/// Drives the wallet application under test
///
/// Presence checks are idempotent and never change what is on screen.
#[async_trait]
pub trait WalletDriver: Send + Sync {
    /// Whether the element is currently displayed
    async fn is_displayed(&self, locator: &Locator) -> Result<bool>;

    /// Tap an element
    async fn tap(&self, locator: &Locator) -> Result<()>;

    /// Type into an input element
    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<()>;

    /// Text of every element matching the locator, in screen order
    async fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Full rendered source of the current screen
    async fn page_source(&self) -> Result<String>;

    fn capabilities(&self) -> &Capabilities;

    /// Feed a QR code image to the device camera
    async fn inject_qrcode(&self, payload: &str) -> Result<()>;

    /// End the automation session
    async fn close(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_consent_rules() {
        let android = |grant| Capabilities {
            platform_name: "Android".to_string(),
            auto_grant_permissions: grant,
        };
        assert!(!android(Some(true)).needs_camera_consent());
        assert!(!android(None).needs_camera_consent());
        assert!(android(Some(false)).needs_camera_consent());

        let ios = Capabilities {
            platform_name: "iOS".to_string(),
            auto_grant_permissions: Some(true),
        };
        assert!(ios.needs_camera_consent());
    }
}
