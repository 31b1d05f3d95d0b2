use std::collections::HashMap;

use alloy::primitives::{Bytes, B256};
use semver::Version;
use thiserror::Error;

use crate::device::DeviceRequest;
use crate::domain::{
    AggregatedTxData, AttemptId, ChangeInfo, PreparedTx, SignedTx, SigningKey, SubFormData,
    TokenConfig, WalletKind,
};
use crate::error::SendError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("policy error: {0}")]
    Policy(String),
}

pub trait ClockPort {
    fn now_ms(&self) -> Result<u64, PortError>;
}

/// One per-token input/output form. `None` means the form is locally invalid.
pub trait SubForm {
    fn get_data(&self) -> Option<SubFormData>;
}

impl SubForm for SubFormData {
    fn get_data(&self) -> Option<SubFormData> {
        Some(self.clone())
    }
}

impl SubForm for Option<SubFormData> {
    fn get_data(&self) -> Option<SubFormData> {
        self.clone()
    }
}

/// The wallet library: keys, PIN, UTXO selection, serialization and signing.
pub trait WalletPort {
    fn wallet_kind(&self) -> WalletKind;
    fn tokens(&self) -> Result<Vec<TokenConfig>, PortError>;
    fn is_pin_correct(&self, pin: &str) -> Result<bool, PortError>;

    /// Builds and signs locally with the PIN-unlocked keys.
    fn sign_with_pin(&self, data: &AggregatedTxData, pin: &str) -> Result<SignedTx, SendError>;
    /// Builds and signs through the remote wallet service.
    fn sign_with_wallet_service(
        &self,
        data: &AggregatedTxData,
        pin: &str,
    ) -> Result<SignedTx, SendError>;

    /// Selects inputs, adds change and stamps the timestamp. The result is
    /// what gets signed.
    fn prepare_tx(&self, data: &AggregatedTxData) -> Result<PreparedTx, SendError>;
    /// Fills the fields outside the signed payload (nonce, parents).
    fn complete_tx(&self, tx: &mut PreparedTx) -> Result<(), SendError>;
    /// `change_info` is the change bookkeeping the signer saw.
    fn attach_signatures(
        &self,
        tx: PreparedTx,
        signatures: Vec<Bytes>,
        change_info: &[ChangeInfo],
    ) -> Result<SignedTx, SendError>;

    fn key_index(&self, address: &str) -> Result<Option<u32>, PortError>;
    fn signing_keys(&self) -> Result<Vec<SigningKey>, PortError>;
    /// Token signatures verified out-of-band, keyed by token uid.
    fn token_signatures(&self) -> Result<HashMap<String, Bytes>, PortError>;
    fn advance_address_pool(&self, consumed: usize) -> Result<(), PortError>;
}

/// Asynchronous request/response channel to the signing device. Replies are
/// not returned here; they arrive later as `DeviceMessage`s on the
/// subscribed channels.
pub trait DevicePort {
    type Subscription;

    fn subscribe(&self, channels: &[&'static str]) -> Result<Self::Subscription, PortError>;
    fn unsubscribe(&self, subscription: Self::Subscription) -> Result<(), PortError>;
    fn send_request(&self, attempt: AttemptId, request: &DeviceRequest) -> Result<(), PortError>;
    fn firmware_version(&self) -> Result<Version, PortError>;
}

pub trait SubmitPort {
    fn submit(&self, tx: &SignedTx) -> Result<B256, SendError>;
}
