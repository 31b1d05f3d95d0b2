#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use alloy::primitives::{Bytes, B256};

use send_tokens_core::{
    AggregatedTxData, AttemptId, ChangeInfo, InputRef, OutputSpec, PendingSendContext, PortError,
    PreparedTx, SendError, SignedTx, SignerPath, SigningKey, TimestampMs, TokenConfig, WalletKind,
    WalletPort,
};

pub const OWN_ADDRESS: &str = "WZ7pDnkPnxbs14GHdUFivFzPbzitwNtvZo";
pub const CHANGE_ADDRESS: &str = "WewDeXWyvHP7jJTs7tjLoQfoB72LLxJQqN";
pub const DEST_ADDRESS: &str = "WPynsVhyU6nP7RSZAkqfijEutC88KgAyFc";

pub fn custom_token(uid: &str) -> TokenConfig {
    TokenConfig::new(uid, uid.to_uppercase(), format!("Token {uid}"))
}

pub fn input(seed: u8, index: u32, token: &str) -> InputRef {
    InputRef {
        tx_id: B256::repeat_byte(seed),
        index,
        token: token.to_owned(),
    }
}

pub fn output(address: &str, value: u64, token: &str) -> OutputSpec {
    OutputSpec {
        address: address.to_owned(),
        value,
        token: token.to_owned(),
        is_change: false,
    }
}

pub fn signature(seed: u8) -> Bytes {
    Bytes::from(vec![seed; 64])
}

pub fn hardware_context(data: AggregatedTxData) -> PendingSendContext {
    PendingSendContext::new(
        AttemptId(1),
        SignerPath::Hardware,
        data,
        false,
        TimestampMs(1_739_750_400_000),
    )
}

/// Wallet double that copies the aggregated data into the skeleton and
/// optionally appends one change output.
#[derive(Debug, Default)]
pub struct StubWallet {
    pub token_signatures: HashMap<String, Bytes>,
    pub prepare_error: Option<SendError>,
    pub change_value: Option<u64>,
    pub pool_advanced: Cell<usize>,
    pub completed: Cell<usize>,
    pub attached: RefCell<Vec<Vec<Bytes>>>,
}

impl StubWallet {
    pub fn with_signature(mut self, uid: &str, sig: Bytes) -> Self {
        self.token_signatures.insert(uid.to_owned(), sig);
        self
    }
}

impl WalletPort for StubWallet {
    fn wallet_kind(&self) -> WalletKind {
        WalletKind::Hardware
    }

    fn tokens(&self) -> Result<Vec<TokenConfig>, PortError> {
        Ok(vec![TokenConfig::primary()])
    }

    fn is_pin_correct(&self, pin: &str) -> Result<bool, PortError> {
        Ok(pin == "123456")
    }

    fn sign_with_pin(&self, data: &AggregatedTxData, _pin: &str) -> Result<SignedTx, SendError> {
        let tx = self.prepare_tx(data)?;
        let sigs = (0..tx.inputs.len()).map(|i| signature(i as u8)).collect();
        self.attach_signatures(tx, sigs, &[])
    }

    fn sign_with_wallet_service(
        &self,
        data: &AggregatedTxData,
        pin: &str,
    ) -> Result<SignedTx, SendError> {
        self.sign_with_pin(data, pin)
    }

    fn prepare_tx(&self, data: &AggregatedTxData) -> Result<PreparedTx, SendError> {
        if let Some(err) = &self.prepare_error {
            return Err(err.clone());
        }
        let mut outputs = data.outputs.clone();
        if let Some(value) = self.change_value {
            outputs.push(OutputSpec {
                address: CHANGE_ADDRESS.to_owned(),
                value,
                token: "00".to_owned(),
                is_change: true,
            });
        }
        Ok(PreparedTx {
            inputs: data.inputs.clone(),
            outputs,
            tokens: data.custom_tokens().iter().map(|t| t.uid.clone()).collect(),
            timestamp: Some(TimestampMs(1_739_750_400_500)),
            nonce: None,
            parents: Vec::new(),
        })
    }

    fn complete_tx(&self, tx: &mut PreparedTx) -> Result<(), SendError> {
        self.completed.set(self.completed.get() + 1);
        tx.nonce = Some(0);
        tx.parents = vec![B256::repeat_byte(0xaa), B256::repeat_byte(0xbb)];
        Ok(())
    }

    fn attach_signatures(
        &self,
        tx: PreparedTx,
        signatures: Vec<Bytes>,
        change_info: &[ChangeInfo],
    ) -> Result<SignedTx, SendError> {
        self.attached.borrow_mut().push(signatures.clone());
        Ok(SignedTx {
            tx,
            input_signatures: signatures,
            change_key_indices: change_info.iter().map(|c| c.key_index).collect(),
        })
    }

    fn key_index(&self, address: &str) -> Result<Option<u32>, PortError> {
        Ok(match address {
            OWN_ADDRESS => Some(0),
            CHANGE_ADDRESS => Some(7),
            _ => None,
        })
    }

    fn signing_keys(&self) -> Result<Vec<SigningKey>, PortError> {
        Ok(vec![
            SigningKey {
                address: OWN_ADDRESS.to_owned(),
                index: 0,
            },
            SigningKey {
                address: CHANGE_ADDRESS.to_owned(),
                index: 7,
            },
        ])
    }

    fn token_signatures(&self) -> Result<HashMap<String, Bytes>, PortError> {
        Ok(self.token_signatures.clone())
    }

    fn advance_address_pool(&self, consumed: usize) -> Result<(), PortError> {
        self.pool_advanced.set(self.pool_advanced.get() + consumed);
        Ok(())
    }
}
