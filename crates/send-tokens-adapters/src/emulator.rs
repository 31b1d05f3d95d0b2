use std::collections::HashSet;

use alloy::primitives::Bytes;
use semver::Version;
use serde_json::json;

use send_tokens_core::{
    DeviceFailure, DeviceReply, DeviceRequest, PortError, PreparedTx, SignedTx, TokenConfig,
    TokenSignature, CHANNEL_SIGNATURES, CHANNEL_TOKEN_DATA_SENT, CHANNEL_TX_SENT,
};

use crate::crypto;

const DEVICE_DIGEST_KEY: &[u8] = b"send-tokens/ledger-digest/v1";

/// Deterministic stand-in for the signing device. Answers each request with
/// the wire reply the real device would put on the matching channel.
#[derive(Debug, Clone)]
pub struct LedgerEmulator {
    firmware: Version,
    token_key: Vec<u8>,
    signing_key: Vec<u8>,
    reject_outline: Option<String>,
    unresponsive: bool,
    registered: HashSet<String>,
    confirmed: Option<PreparedTx>,
    cancelled: usize,
}

impl LedgerEmulator {
    pub fn new(firmware: Version, token_key: impl Into<Vec<u8>>) -> Self {
        Self {
            firmware,
            token_key: token_key.into(),
            signing_key: b"ledger-emulator-signing-key".to_vec(),
            reject_outline: None,
            unresponsive: false,
            registered: HashSet::new(),
            confirmed: None,
            cancelled: 0,
        }
    }

    /// The user presses "reject" when shown the outputs.
    pub fn rejecting_outline(mut self, message: impl Into<String>) -> Self {
        self.reject_outline = Some(message.into());
        self
    }

    /// Never answers, as if the device were unplugged mid-request.
    pub fn unresponsive(mut self) -> Self {
        self.unresponsive = true;
        self
    }

    pub fn firmware(&self) -> &Version {
        &self.firmware
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Signature the device will accept for `token`.
    pub fn sign_token(&self, token: &TokenConfig) -> Result<Bytes, PortError> {
        crypto::sign_token(&self.token_key, token)
    }

    /// Whether every input signature of `signed` is one this device produces
    /// for the transaction as broadcast.
    pub fn verify_signatures(&self, signed: &SignedTx) -> Result<bool, PortError> {
        Ok(self.input_signatures(&signed.tx)? == signed.input_signatures)
    }

    fn input_signatures(&self, tx: &PreparedTx) -> Result<Vec<Bytes>, PortError> {
        let digest = crypto::sighash(DEVICE_DIGEST_KEY, tx)?;
        tx.inputs
            .iter()
            .map(|input| crypto::sign_input(&self.signing_key, &digest, input))
            .collect()
    }

    pub fn handle(
        &mut self,
        request: &DeviceRequest,
    ) -> Result<Option<(&'static str, DeviceReply)>, PortError> {
        if let DeviceRequest::Cancel = request {
            self.cancelled += 1;
            self.confirmed = None;
            return Ok(None);
        }
        if self.unresponsive {
            return Ok(None);
        }

        let reply = match request {
            DeviceRequest::SendTokenData { tokens } => {
                (CHANNEL_TOKEN_DATA_SENT, self.register_tokens(tokens)?)
            }
            DeviceRequest::SendTx {
                tx,
                use_old_protocol,
                ..
            } => (CHANNEL_TX_SENT, self.show_outline(tx, *use_old_protocol)),
            DeviceRequest::GetSignatures { tx, .. } => {
                (CHANNEL_SIGNATURES, self.sign_inputs(tx)?)
            }
            DeviceRequest::Cancel => return Ok(None),
        };
        Ok(Some(reply))
    }

    fn register_tokens(&mut self, tokens: &[TokenSignature]) -> Result<DeviceReply, PortError> {
        let mut refused = Vec::new();
        for token in tokens {
            let config = TokenConfig::new(&token.uid, &token.symbol, &token.name);
            if crypto::verify_token(&self.token_key, &config, &token.signature)? {
                self.registered.insert(token.uid.clone());
            } else {
                refused.push(token.uid.clone());
            }
        }
        Ok(success(json!(refused)))
    }

    fn show_outline(&mut self, tx: &PreparedTx, use_old_protocol: bool) -> DeviceReply {
        if use_old_protocol && !tx.tokens.is_empty() {
            return failure("This firmware version cannot sign custom tokens");
        }
        if let Some(uid) = tx.tokens.iter().find(|uid| !self.registered.contains(*uid)) {
            return failure(&format!("Token {uid} was not registered on the device"));
        }
        if let Some(message) = &self.reject_outline {
            return failure(message);
        }
        self.confirmed = Some(tx.clone());
        success(serde_json::Value::Null)
    }

    fn sign_inputs(&mut self, tx: &PreparedTx) -> Result<DeviceReply, PortError> {
        if self.confirmed.as_ref() != Some(tx) {
            return Ok(failure(
                "Transaction differs from the outline confirmed on the device",
            ));
        }
        let signatures = self.input_signatures(tx)?;
        self.confirmed = None;
        let data = serde_json::to_value(&signatures)
            .map_err(|e| PortError::Validation(format!("signature encoding failed: {e}")))?;
        Ok(success(data))
    }
}

fn success(data: serde_json::Value) -> DeviceReply {
    DeviceReply {
        success: true,
        data: Some(data),
        error: None,
    }
}

fn failure(message: &str) -> DeviceReply {
    DeviceReply {
        success: false,
        data: None,
        error: Some(DeviceFailure::new(message)),
    }
}
