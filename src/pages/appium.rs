//! Appium driver over the W3C WebDriver HTTP protocol
//!
//! Elements are found by accessibility id. Each call is a fresh lookup, so
//! no element reference outlives a screen transition.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::{ImageFormat, Luma};
use qrcode::QrCode;
use serde_json::{json, Value};

use crate::common::config::DriverConfig;
use crate::common::{Error, Result};

use super::{Capabilities, Locator, WalletDriver};

/// W3C key under which element references are returned
const ELEMENT_KEY: &str = "element-6066-11e4-a5c6-4b0f7d62c9d6";

/// Smallest rendered QR side in pixels, large enough for the camera to decode
const QR_MIN_SIZE: u32 = 300;

/// Live Appium session against a device or emulator
pub struct AppiumDriver {
    http: reqwest::Client,
    base: String,
    session_id: String,
    capabilities: Capabilities,
}

impl AppiumDriver {
    /// Open a new session on the Appium server
    pub async fn connect(config: &DriverConfig, http_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(http_timeout).build()?;
        let base = config.url.trim_end_matches('/').to_string();

        let mut always_match = serde_json::Map::new();
        always_match.insert("platformName".to_string(), json!(config.platform_name));
        if let Some(grant) = config.auto_grant_permissions {
            always_match.insert("appium:autoGrantPermissions".to_string(), json!(grant));
        }
        for (key, value) in &config.capabilities {
            always_match.insert(key.clone(), value.clone());
        }

        tracing::info!(url = %base, platform = %config.platform_name, "Opening Appium session");
        let response = http
            .post(format!("{base}/session"))
            .json(&json!({ "capabilities": { "alwaysMatch": always_match } }))
            .send()
            .await?;
        let value = unwrap_value(response).await?;

        let session_id = value["sessionId"]
            .as_str()
            .ok_or_else(|| Error::Driver("Appium returned no sessionId".to_string()))?
            .to_string();

        Ok(Self {
            http,
            base,
            session_id,
            capabilities: Capabilities {
                platform_name: config.platform_name.clone(),
                auto_grant_permissions: config.auto_grant_permissions,
            },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base, self.session_id, path)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self.http.post(self.url(path)).json(&body).send().await?;
        unwrap_value(response).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self.http.get(self.url(path)).send().await?;
        unwrap_value(response).await
    }

    /// References of every element matching the locator
    async fn find_all(&self, locator: &Locator) -> Result<Vec<String>> {
        let found = self
            .post(
                "/elements",
                json!({ "using": "accessibility id", "value": locator.id }),
            )
            .await?;
        Ok(found
            .as_array()
            .map(|elements| {
                elements
                    .iter()
                    .filter_map(|e| e[ELEMENT_KEY].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(&self, locator: &Locator) -> Result<String> {
        self.find_all(locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ElementNotFound {
                page: locator.page.to_string(),
                element: format!("{:?}", locator.element),
            })
    }
}

/// Take the `value` member of a WebDriver response, mapping W3C errors
async fn unwrap_value(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response.json().await?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value["error"].as_str().unwrap_or("unknown error");
        let message = value["message"].as_str().unwrap_or("");
        return Err(Error::Driver(format!("{error}: {message}")));
    }
    Ok(value)
}

#[async_trait]
impl WalletDriver for AppiumDriver {
    async fn is_displayed(&self, locator: &Locator) -> Result<bool> {
        for element in self.find_all(locator).await? {
            let shown = self.get(&format!("/element/{element}/displayed")).await?;
            if shown.as_bool().unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn tap(&self, locator: &Locator) -> Result<()> {
        let element = self.find_one(locator).await?;
        self.post(&format!("/element/{element}/click"), json!({}))
            .await?;
        Ok(())
    }

    async fn send_keys(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.find_one(locator).await?;
        self.post(&format!("/element/{element}/value"), json!({ "text": text }))
            .await?;
        Ok(())
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for element in self.find_all(locator).await? {
            let text = self.get(&format!("/element/{element}/text")).await?;
            texts.push(text.as_str().unwrap_or_default().to_string());
        }
        Ok(texts)
    }

    async fn page_source(&self) -> Result<String> {
        let source = self.get("/source").await?;
        Ok(source.as_str().unwrap_or_default().to_string())
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn inject_qrcode(&self, payload: &str) -> Result<()> {
        tracing::debug!(%payload, "Injecting QR code into emulator camera");
        self.post("/execute/sync", inject_camera_image(payload)?).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        tracing::info!(session = %self.session_id, "Closing Appium session");
        self.http.delete(self.url("")).send().await?;
        Ok(())
    }
}

/// Script call that shows `payload` to the emulator camera as a QR code
///
/// The camera only accepts an image, so the payload is rendered to a PNG
/// and sent base64 encoded.
fn inject_camera_image(payload: &str) -> Result<Value> {
    let image = qr_png_base64(payload)?;
    Ok(json!({
        "script": "mobile: injectEmulatorCameraImage",
        "args": [{ "payload": image }],
    }))
}

fn qr_png_base64(payload: &str) -> Result<String> {
    let code = QrCode::new(payload.as_bytes()).map_err(|e| {
        Error::Driver(format!("Cannot encode {} bytes as a QR code: {e}", payload.len()))
    })?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();

    let mut png = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| Error::Driver(format!("Cannot write QR image: {e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    #[test]
    fn test_camera_payload_is_base64_png_qr_code() {
        let invitation = "http://issuer.example:9020?oob=eyJAdHlwZSI6ICJodHRwczovL2RpZGNvbW0ub3JnIn0=";
        let body = inject_camera_image(invitation).unwrap();

        assert_eq!(body["script"], "mobile: injectEmulatorCameraImage");
        let encoded = body["args"][0]["payload"].as_str().unwrap();
        assert_ne!(encoded, invitation);

        let png = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert!(png.starts_with(PNG_SIGNATURE));

        let image = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
        assert!(image.width() >= QR_MIN_SIZE);
        assert_eq!(image.width(), image.height());
    }

    #[test]
    fn test_oversized_payload_is_a_driver_error() {
        let payload = "x".repeat(8000);
        let err = inject_camera_image(&payload).unwrap_err();
        assert!(matches!(err, Error::Driver(_)));
    }
}
