use std::fmt;

use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::error::SendError;

/// Uid of the network's native token. The signing device knows it natively.
pub const PRIMARY_TOKEN_UID: &str = "00";

pub fn is_primary_token(uid: &str) -> bool {
    uid == PRIMARY_TOKEN_UID
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimestampMs(pub u64);

/// Identity of one send attempt. Device events carry it back so stale replies
/// can be told apart from the live attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignerPath {
    Software,
    Hardware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentMode {
    #[default]
    Direct,
    WalletService,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenConfig {
    pub uid: String,
    pub symbol: String,
    pub name: String,
}

impl TokenConfig {
    pub fn new(uid: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    pub fn primary() -> Self {
        Self::new(PRIMARY_TOKEN_UID, "HTR", "Hathor")
    }

    pub fn is_primary(&self) -> bool {
        is_primary_token(&self.uid)
    }
}

/// Ordered tokens chosen for one transaction, one per sub-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTokenSelection {
    tokens: Vec<TokenConfig>,
}

impl Default for TxTokenSelection {
    fn default() -> Self {
        Self {
            tokens: vec![TokenConfig::primary()],
        }
    }
}

impl TxTokenSelection {
    pub fn from_tokens(tokens: Vec<TokenConfig>) -> Result<Self, SendError> {
        let mut selection = Self { tokens: Vec::new() };
        for token in tokens {
            selection.push(token)?;
        }
        Ok(selection)
    }

    pub fn tokens(&self) -> &[TokenConfig] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.tokens.iter().any(|t| t.uid == uid)
    }

    pub fn custom_tokens(&self) -> impl Iterator<Item = &TokenConfig> {
        self.tokens.iter().filter(|t| !t.is_primary())
    }

    pub fn custom_count(&self) -> usize {
        self.custom_tokens().count()
    }

    pub fn push(&mut self, token: TokenConfig) -> Result<(), SendError> {
        if self.contains(&token.uid) {
            return Err(SendError::Validation(format!(
                "token {} is already selected",
                token.symbol
            )));
        }
        self.tokens.push(token);
        Ok(())
    }

    pub fn replace(&mut self, index: usize, token: TokenConfig) -> Result<(), SendError> {
        if index >= self.tokens.len() {
            return Err(SendError::Validation(format!(
                "no token selected at position {index}"
            )));
        }
        if self
            .tokens
            .iter()
            .enumerate()
            .any(|(i, t)| i != index && t.uid == token.uid)
        {
            return Err(SendError::Validation(format!(
                "token {} is already selected",
                token.symbol
            )));
        }
        self.tokens[index] = token;
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<TokenConfig, SendError> {
        if index >= self.tokens.len() {
            return Err(SendError::Validation(format!(
                "no token selected at position {index}"
            )));
        }
        Ok(self.tokens.remove(index))
    }
}

/// A previously received unspent output being spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRef {
    pub tx_id: B256,
    pub index: u32,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub address: String,
    pub value: u64,
    pub token: String,
    #[serde(default)]
    pub is_change: bool,
}

/// What one per-token sub-form contributes when it is locally valid.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SubFormData {
    #[serde(default)]
    pub inputs: Vec<InputRef>,
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregatedTxData {
    pub inputs: Vec<InputRef>,
    pub outputs: Vec<OutputSpec>,
    pub tokens: Vec<TokenConfig>,
}

impl AggregatedTxData {
    /// Distinct non-primary tokens, in selection order.
    pub fn custom_tokens(&self) -> Vec<&TokenConfig> {
        let mut out: Vec<&TokenConfig> = Vec::new();
        for token in self.tokens.iter().filter(|t| !t.is_primary()) {
            if !out.iter().any(|x| x.uid == token.uid) {
                out.push(token);
            }
        }
        out
    }
}

/// Token data registered on the device before the outline is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSignature {
    pub uid: String,
    pub symbol: String,
    pub name: String,
    pub signature: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVerificationFailure {
    pub uid: String,
    pub symbol: String,
    pub name: String,
}

impl From<&TokenConfig> for TokenVerificationFailure {
    fn from(token: &TokenConfig) -> Self {
        Self {
            uid: token.uid.clone(),
            symbol: token.symbol.clone(),
            name: token.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeInfo {
    pub output_index: usize,
    pub key_index: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    pub address: String,
    pub index: u32,
}

/// Unsigned transaction skeleton. Left untouched between the outline and
/// signature steps so signatures keep lining up with `inputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedTx {
    pub inputs: Vec<InputRef>,
    pub outputs: Vec<OutputSpec>,
    /// Custom token uids referenced by outputs, in token-index order.
    pub tokens: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<TimestampMs>,
    #[serde(default)]
    pub nonce: Option<u32>,
    #[serde(default)]
    pub parents: Vec<B256>,
}

impl PreparedTx {
    pub fn change_outputs(&self) -> impl Iterator<Item = (usize, &OutputSpec)> {
        self.outputs.iter().enumerate().filter(|(_, o)| o.is_change)
    }

    pub fn is_complete(&self) -> bool {
        self.timestamp.is_some() && self.nonce.is_some() && !self.parents.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub tx: PreparedTx,
    pub input_signatures: Vec<Bytes>,
    /// Key index of each change output, for address-pool bookkeeping.
    pub change_key_indices: Vec<u32>,
}

impl SignedTx {
    pub fn change_output_count(&self) -> usize {
        self.tx.change_outputs().count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTx {
    pub tx_id: B256,
    pub change_outputs: usize,
}
