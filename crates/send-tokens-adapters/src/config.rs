use semver::Version;

use send_tokens_core::{DeploymentMode, SendSettings, LEDGER_TX_CUSTOM_TOKEN_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl RuntimeProfile {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SendAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub custom_token_limit: usize,
    pub min_custom_token_firmware: Version,
    pub device_timeout_ms: u64,
    pub use_wallet_service: bool,
    pub tx_mining_url: Option<String>,
    pub tx_mining_timeout_ms: u64,
    pub pin_kdf_iterations: u32,
}

impl Default for SendAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            custom_token_limit: LEDGER_TX_CUSTOM_TOKEN_LIMIT,
            min_custom_token_firmware: Version::new(1, 1, 0),
            device_timeout_ms: 120_000,
            use_wallet_service: false,
            tx_mining_url: None,
            tx_mining_timeout_ms: 15_000,
            pin_kdf_iterations: 20_000,
        }
    }
}

impl SendAdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unparseable values keep their
    /// default and are logged.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(raw) = lookup("SEND_TOKENS_RUNTIME_PROFILE") {
            match RuntimeProfile::parse(&raw) {
                Some(profile) => cfg.runtime_profile = profile,
                None => tracing::warn!(value = %raw, "unknown runtime profile, using default"),
            }
        }
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_CUSTOM_TOKEN_LIMIT") {
            cfg.custom_token_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_MIN_CUSTOM_TOKEN_FIRMWARE") {
            cfg.min_custom_token_firmware = v;
        }
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_DEVICE_TIMEOUT_MS") {
            cfg.device_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_USE_WALLET_SERVICE") {
            cfg.use_wallet_service = v;
        }
        cfg.tx_mining_url = lookup("SEND_TOKENS_TX_MINING_URL")
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_TX_MINING_TIMEOUT_MS") {
            cfg.tx_mining_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "SEND_TOKENS_PIN_KDF_ITERATIONS") {
            cfg.pin_kdf_iterations = v;
        }
        cfg
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn deployment(&self) -> DeploymentMode {
        if self.use_wallet_service {
            DeploymentMode::WalletService
        } else {
            DeploymentMode::Direct
        }
    }

    pub fn send_settings(&self) -> SendSettings {
        SendSettings {
            custom_token_limit: self.custom_token_limit,
            min_custom_token_firmware: self.min_custom_token_firmware.clone(),
            deployment: self.deployment(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid config value");
            None
        }
    }
}
