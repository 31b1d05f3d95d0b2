use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::B256;
use serde::Deserialize;
use serde_json::json;

use send_tokens_core::{PortError, SendError, SignedTx, SubmitPort};

use crate::crypto;
use crate::SendAdapterConfig;

const TX_ID_KEY: &[u8] = b"send-tokens/tx-id/v1";

/// Pushes signed transactions to the mining service, which solves the proof
/// of work and broadcasts them.
#[derive(Debug, Clone)]
pub struct TxMiningAdapter {
    mode: MiningMode,
    submitted: Arc<Mutex<Vec<SignedTx>>>,
}

#[derive(Debug, Clone)]
enum MiningMode {
    Disabled(String),
    InMemory { reject: Option<String> },
    Http(HttpRuntime),
}

#[derive(Debug, Clone)]
struct HttpRuntime {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushTxResponse {
    success: bool,
    #[serde(default)]
    tx_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl Default for TxMiningAdapter {
    fn default() -> Self {
        Self::with_config(&SendAdapterConfig::from_env())
    }
}

impl TxMiningAdapter {
    pub fn in_memory() -> Self {
        Self::with_mode(MiningMode::InMemory { reject: None })
    }

    /// Accepts nothing; every push fails with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_mode(MiningMode::InMemory {
            reject: Some(message.into()),
        })
    }

    pub fn with_config(config: &SendAdapterConfig) -> Self {
        let mode = if let Some(base_url) = &config.tx_mining_url {
            let timeout = std::time::Duration::from_millis(config.tx_mining_timeout_ms);
            match reqwest::blocking::Client::builder().timeout(timeout).build() {
                Ok(client) => MiningMode::Http(HttpRuntime {
                    base_url: base_url.trim_end_matches('/').to_owned(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        MiningMode::Disabled(format!(
                            "failed to initialize tx-mining client in production profile: {e}"
                        ))
                    } else {
                        MiningMode::InMemory { reject: None }
                    }
                }
            }
        } else if config.strict_runtime_required() {
            MiningMode::Disabled(
                "tx-mining URL not configured in production runtime profile".to_owned(),
            )
        } else {
            MiningMode::InMemory { reject: None }
        };
        Self::with_mode(mode)
    }

    fn with_mode(mode: MiningMode) -> Self {
        Self {
            mode,
            submitted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Transactions accepted so far, oldest first.
    pub fn submitted(&self) -> Result<Vec<SignedTx>, PortError> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<SignedTx>>, PortError> {
        self.submitted
            .lock()
            .map_err(|e| PortError::Transport(format!("tx-mining lock poisoned: {e}")))
    }

    fn push_http(&self, runtime: &HttpRuntime, tx: &SignedTx) -> Result<B256, SendError> {
        let url = format!("{}/push-tx", runtime.base_url);
        let response = runtime
            .client
            .post(&url)
            .json(&json!({ "tx": tx }))
            .send()
            .map_err(|e| SendError::Submission(format!("tx-mining service unreachable: {e}")))?;
        let status = response.status();
        let body: PushTxResponse = response.json().map_err(|e| {
            SendError::Submission(format!("tx-mining service returned status {status}: {e}"))
        })?;

        if !status.is_success() || !body.success {
            let message = body
                .message
                .unwrap_or_else(|| format!("tx-mining service returned status {status}"));
            return Err(SendError::Submission(message));
        }
        let raw = body.tx_id.ok_or_else(|| {
            PortError::Validation("tx-mining response is missing txId".to_owned())
        })?;
        let tx_id = raw
            .parse::<B256>()
            .map_err(|e| PortError::Validation(format!("invalid tx id {raw}: {e}")))?;
        Ok(tx_id)
    }
}

impl SubmitPort for TxMiningAdapter {
    fn submit(&self, tx: &SignedTx) -> Result<B256, SendError> {
        let tx_id = match &self.mode {
            MiningMode::Disabled(reason) => {
                return Err(PortError::Policy(reason.clone()).into());
            }
            MiningMode::InMemory {
                reject: Some(message),
            } => {
                tracing::warn!(message = %message, "transaction rejected");
                return Err(SendError::Submission(message.clone()));
            }
            MiningMode::InMemory { reject: None } => crypto::canonical_digest(TX_ID_KEY, tx)?,
            MiningMode::Http(runtime) => self.push_http(runtime, tx)?,
        };
        self.lock()?.push(tx.clone());
        tracing::info!(%tx_id, inputs = tx.tx.inputs.len(), "transaction pushed to tx-mining");
        Ok(tx_id)
    }
}
