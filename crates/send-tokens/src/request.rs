use std::path::Path;

use eyre::{Result, WrapErr};
use semver::Version;
use serde::Deserialize;

use send_tokens_adapters::WalletFixture;
use send_tokens_core::SubFormData;

/// One send, as the shell would collect it from the screen.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub wallet: WalletFixture,
    /// Custom tokens to add after the primary token, by uid.
    #[serde(default)]
    pub tokens: Vec<String>,
    /// One entry per selected token; `null` marks an invalid sub-form.
    pub forms: Vec<Option<SubFormData>>,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub device: DeviceSetup,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSetup {
    pub firmware: Version,
    pub token_key: String,
    /// Tokens whose signatures the wallet already verified out-of-band.
    #[serde(default)]
    pub verified_tokens: Vec<String>,
    #[serde(default)]
    pub reject_outline: Option<String>,
    #[serde(default)]
    pub unresponsive: bool,
}

impl Default for DeviceSetup {
    fn default() -> Self {
        Self {
            firmware: Version::new(1, 1, 0),
            token_key: "ledger-token-verification-key".to_owned(),
            verified_tokens: Vec::new(),
            reject_outline: None,
            unresponsive: false,
        }
    }
}

impl SendRequest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read send request {}", path.display()))?;
        serde_json::from_str(&raw).wrap_err("Failed to parse send request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_request() {
        let raw = r#"{
            "wallet": {
                "kind": "software",
                "pin": "123456",
                "addresses": ["WZ7pDnkPnxbs14GHdUFivFzPbzitwNtvZo"]
            },
            "forms": [
                { "outputs": [{ "address": "WPynsVhyU6nP7RSZAkqfijEutC88KgAyFc", "value": 5, "token": "00" }] },
                null
            ],
            "pin": "123456"
        }"#;
        let request: SendRequest = serde_json::from_str(raw).expect("parse");
        assert_eq!(request.forms.len(), 2);
        assert!(request.forms[1].is_none());
        assert_eq!(request.device.firmware, Version::new(1, 1, 0));
        assert!(request.wallet.network_ready);
    }
}
