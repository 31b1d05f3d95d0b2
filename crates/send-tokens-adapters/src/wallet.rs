use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};

use send_tokens_core::software::validate_pin_format;
use send_tokens_core::{
    AggregatedTxData, ChangeInfo, ClockPort, InputRef, OutputSpec, PortError, PreparedTx,
    SendError, SignedTx, SigningKey, TimestampMs, TokenConfig, WalletKind, WalletPort,
};

use crate::clock::SystemClockAdapter;
use crate::crypto;

pub const MAX_INPUTS: usize = 255;
pub const MAX_OUTPUTS: usize = 255;

const ADDRESS_LENGTH: usize = 34;
const ADDRESS_PREFIXES: [char; 4] = ['H', 'h', 'W', 'w'];
const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const TX_DIGEST_KEY: &[u8] = b"send-tokens/tx-digest/v1";
const INPUT_KEY_LABEL: &[u8] = b"send-tokens/input-key/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: B256,
    pub index: u32,
    pub token: String,
    pub value: u64,
    pub address: String,
}

/// Serialized wallet the in-memory adapter is loaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletFixture {
    pub kind: WalletKind,
    pub pin: String,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Address pool; position is the key index.
    pub addresses: Vec<String>,
    #[serde(default)]
    pub current_address_index: usize,
    #[serde(default)]
    pub utxos: Vec<Utxo>,
    #[serde(default)]
    pub token_signatures: HashMap<String, Bytes>,
    #[serde(default)]
    pub parents: Vec<B256>,
    #[serde(default = "default_network_ready")]
    pub network_ready: bool,
}

fn default_network_ready() -> bool {
    true
}

#[derive(Debug)]
struct WalletState {
    tokens: Vec<TokenConfig>,
    addresses: Vec<String>,
    current_address_index: usize,
    utxos: Vec<Utxo>,
    token_signatures: HashMap<String, Bytes>,
    parents: Vec<B256>,
    network_ready: bool,
}

impl WalletState {
    fn symbol(&self, uid: &str) -> String {
        self.tokens
            .iter()
            .find(|t| t.uid == uid)
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| uid.to_owned())
    }

    fn utxo(&self, input: &InputRef) -> Option<&Utxo> {
        self.utxos
            .iter()
            .find(|u| u.tx_id == input.tx_id && u.index == input.index && u.token == input.token)
    }

    fn key_index(&self, address: &str) -> Option<u32> {
        self.addresses
            .iter()
            .position(|a| a == address)
            .map(|i| i as u32)
    }
}

/// Wallet library backed by an in-memory fixture. Shared state sits behind a
/// mutex so clones observe the same address pool.
#[derive(Clone)]
pub struct MemoryWalletAdapter {
    kind: WalletKind,
    iterations: u32,
    salt: Vec<u8>,
    pin_hash: B256,
    clock: Arc<dyn ClockPort + Send + Sync>,
    state: Arc<Mutex<WalletState>>,
}

impl fmt::Debug for MemoryWalletAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWalletAdapter")
            .field("kind", &self.kind)
            .field("iterations", &self.iterations)
            .finish_non_exhaustive()
    }
}

impl MemoryWalletAdapter {
    pub fn from_fixture(fixture: WalletFixture, iterations: u32) -> Result<Self, PortError> {
        validate_pin_format(&fixture.pin)
            .map_err(|_| PortError::Validation("wallet PIN must be 6 digits".to_owned()))?;
        let first = fixture
            .addresses
            .first()
            .ok_or_else(|| PortError::Validation("wallet fixture has no addresses".to_owned()))?;
        if fixture.current_address_index > fixture.addresses.len() {
            return Err(PortError::Validation(format!(
                "current address index {} is outside a pool of {}",
                fixture.current_address_index,
                fixture.addresses.len()
            )));
        }

        let salt = first.as_bytes().to_vec();
        let pin_hash = crypto::hash_pin(&fixture.pin, &salt, iterations);

        let mut tokens = fixture.tokens;
        tokens.retain(|t| !t.is_primary());
        tokens.insert(0, TokenConfig::primary());

        Ok(Self {
            kind: fixture.kind,
            iterations,
            salt,
            pin_hash,
            clock: Arc::new(SystemClockAdapter),
            state: Arc::new(Mutex::new(WalletState {
                tokens,
                addresses: fixture.addresses,
                current_address_index: fixture.current_address_index,
                utxos: fixture.utxos,
                token_signatures: fixture.token_signatures,
                parents: fixture.parents,
                network_ready: fixture.network_ready,
            })),
        })
    }

    pub fn with_clock<C>(mut self, clock: C) -> Self
    where
        C: ClockPort + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn current_address_index(&self) -> Result<usize, PortError> {
        Ok(self.lock()?.current_address_index)
    }

    pub fn insert_token_signature(&self, uid: &str, signature: Bytes) -> Result<(), PortError> {
        self.lock()?
            .token_signatures
            .insert(uid.to_owned(), signature);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, WalletState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("wallet lock poisoned: {e}")))
    }

    fn sign_locally(&self, data: &AggregatedTxData, pin: &str) -> Result<SignedTx, SendError> {
        if !self.is_pin_correct(pin)? {
            return Err(SendError::InvalidPin);
        }
        let tx = self.prepare_tx(data)?;
        let change_info = {
            let state = self.lock()?;
            tx.change_outputs()
                .map(|(output_index, o)| {
                    let key_index = state.key_index(&o.address).ok_or_else(|| {
                        SendError::Protocol(format!(
                            "change output {output_index} is not a wallet address"
                        ))
                    })?;
                    Ok(ChangeInfo {
                        output_index,
                        key_index,
                    })
                })
                .collect::<Result<Vec<_>, SendError>>()?
        };

        let digest = crypto::sighash(TX_DIGEST_KEY, &tx)?;
        let key = crypto::hmac_sha256_b256(self.pin_hash.as_slice(), INPUT_KEY_LABEL)?;
        let signatures = tx
            .inputs
            .iter()
            .map(|input| crypto::sign_input(key.as_slice(), &digest, input))
            .collect::<Result<Vec<_>, _>>()?;
        let mut signed = self.attach_signatures(tx, signatures, &change_info)?;
        self.complete_tx(&mut signed.tx)?;
        Ok(signed)
    }
}

impl WalletPort for MemoryWalletAdapter {
    fn wallet_kind(&self) -> WalletKind {
        self.kind
    }

    fn tokens(&self) -> Result<Vec<TokenConfig>, PortError> {
        Ok(self.lock()?.tokens.clone())
    }

    fn is_pin_correct(&self, pin: &str) -> Result<bool, PortError> {
        crypto::verify_pin(pin, &self.salt, self.iterations, &self.pin_hash)
    }

    fn sign_with_pin(&self, data: &AggregatedTxData, pin: &str) -> Result<SignedTx, SendError> {
        self.sign_locally(data, pin)
    }

    fn sign_with_wallet_service(
        &self,
        data: &AggregatedTxData,
        pin: &str,
    ) -> Result<SignedTx, SendError> {
        if self.kind == WalletKind::Hardware {
            return Err(SendError::Validation(
                "The wallet service does not sign for hardware wallets".to_owned(),
            ));
        }
        tracing::debug!("signing through the wallet service");
        self.sign_locally(data, pin)
    }

    fn prepare_tx(&self, data: &AggregatedTxData) -> Result<PreparedTx, SendError> {
        let state = self.lock()?;
        if !state.network_ready {
            return Err(SendError::ConstantNotSet(
                "Network constants are not loaded yet".to_owned(),
            ));
        }
        if data.outputs.is_empty() {
            return Err(SendError::Validation(
                "Transaction must have at least one output".to_owned(),
            ));
        }

        let mut token_order: Vec<&str> = Vec::new();
        for output in &data.outputs {
            validate_address(&output.address)?;
            if output.value == 0 {
                return Err(SendError::OutputValue(format!(
                    "Output value must be positive (address {})",
                    output.address
                )));
            }
            if !token_order.contains(&output.token.as_str()) {
                token_order.push(&output.token);
            }
        }
        if let Some(stray) = data
            .inputs
            .iter()
            .find(|i| !token_order.contains(&i.token.as_str()))
        {
            return Err(SendError::Preparation(format!(
                "Input {}:{} spends token {} but no output sends it",
                stray.tx_id, stray.index, stray.token
            )));
        }

        let mut inputs = Vec::new();
        let mut outputs: Vec<OutputSpec> = data
            .outputs
            .iter()
            .cloned()
            .map(|o| OutputSpec {
                is_change: false,
                ..o
            })
            .collect();
        let mut next_change = state.current_address_index;

        for token in &token_order {
            let needed = data
                .outputs
                .iter()
                .filter(|o| o.token == *token)
                .try_fold(0u64, |acc, o| acc.checked_add(o.value))
                .ok_or_else(|| {
                    SendError::OutputValue(format!("Output total overflows for token {token}"))
                })?;

            let chosen: Vec<InputRef> = data
                .inputs
                .iter()
                .filter(|i| i.token == *token)
                .cloned()
                .collect();
            let (picked, available) = if chosen.is_empty() {
                select_utxos(&state.utxos, token, needed)
            } else {
                let mut total = 0u64;
                for input in &chosen {
                    let utxo = state.utxo(input).ok_or_else(|| {
                        SendError::Preparation(format!(
                            "Input {}:{} is not an unspent output of this wallet",
                            input.tx_id, input.index
                        ))
                    })?;
                    total = total.saturating_add(utxo.value);
                }
                (chosen, total)
            };

            if available < needed {
                return Err(SendError::Preparation(format!(
                    "Insufficient amount of {}: available {available}, needed {needed}",
                    state.symbol(token)
                )));
            }
            inputs.extend(picked);

            let change = available - needed;
            if change > 0 {
                let address = state.addresses.get(next_change).ok_or_else(|| {
                    SendError::Preparation("No unused address left for change".to_owned())
                })?;
                outputs.push(OutputSpec {
                    address: address.clone(),
                    value: change,
                    token: (*token).to_owned(),
                    is_change: true,
                });
                next_change += 1;
            }
        }

        if inputs.len() > MAX_INPUTS {
            return Err(SendError::MaximumInputs(format!(
                "Transaction has {} inputs; the maximum is {MAX_INPUTS}",
                inputs.len()
            )));
        }
        if outputs.len() > MAX_OUTPUTS {
            return Err(SendError::MaximumOutputs(format!(
                "Transaction has {} outputs; the maximum is {MAX_OUTPUTS}",
                outputs.len()
            )));
        }

        let tokens = token_order
            .iter()
            .filter(|uid| !send_tokens_core::is_primary_token(uid))
            .map(|uid| (*uid).to_owned())
            .collect();
        tracing::debug!(
            inputs = inputs.len(),
            outputs = outputs.len(),
            change = next_change - state.current_address_index,
            "transaction prepared"
        );
        Ok(PreparedTx {
            inputs,
            outputs,
            tokens,
            timestamp: Some(TimestampMs(self.clock.now_ms()?)),
            nonce: None,
            parents: Vec::new(),
        })
    }

    fn complete_tx(&self, tx: &mut PreparedTx) -> Result<(), SendError> {
        let parents = self.lock()?.parents.clone();
        if parents.is_empty() {
            return Err(SendError::Preparation(
                "No parent transactions available to confirm".to_owned(),
            ));
        }
        tx.nonce = Some(0);
        tx.parents = parents;
        Ok(())
    }

    fn attach_signatures(
        &self,
        tx: PreparedTx,
        signatures: Vec<Bytes>,
        change_info: &[ChangeInfo],
    ) -> Result<SignedTx, SendError> {
        if signatures.len() != tx.inputs.len() {
            return Err(SendError::Protocol(format!(
                "{} signatures for {} inputs",
                signatures.len(),
                tx.inputs.len()
            )));
        }
        let change_outputs: Vec<usize> = tx.change_outputs().map(|(i, _)| i).collect();
        let described: Vec<usize> = change_info.iter().map(|c| c.output_index).collect();
        if change_outputs != described {
            return Err(SendError::Protocol(format!(
                "change info covers outputs {described:?}, change sits at {change_outputs:?}"
            )));
        }
        Ok(SignedTx {
            tx,
            input_signatures: signatures,
            change_key_indices: change_info.iter().map(|c| c.key_index).collect(),
        })
    }

    fn key_index(&self, address: &str) -> Result<Option<u32>, PortError> {
        Ok(self.lock()?.key_index(address))
    }

    fn signing_keys(&self) -> Result<Vec<SigningKey>, PortError> {
        let state = self.lock()?;
        let mut keys: Vec<SigningKey> = Vec::new();
        for utxo in &state.utxos {
            if keys.iter().any(|k| k.address == utxo.address) {
                continue;
            }
            let index = state.key_index(&utxo.address).ok_or_else(|| {
                PortError::NotFound(format!("no key for utxo address {}", utxo.address))
            })?;
            keys.push(SigningKey {
                address: utxo.address.clone(),
                index,
            });
        }
        keys.sort_by_key(|k| k.index);
        Ok(keys)
    }

    fn token_signatures(&self) -> Result<HashMap<String, Bytes>, PortError> {
        Ok(self.lock()?.token_signatures.clone())
    }

    fn advance_address_pool(&self, consumed: usize) -> Result<(), PortError> {
        let mut state = self.lock()?;
        let next = state.current_address_index + consumed;
        if next > state.addresses.len() {
            return Err(PortError::Validation(format!(
                "address pool exhausted: {next} of {}",
                state.addresses.len()
            )));
        }
        state.current_address_index = next;
        tracing::info!(current = next, consumed, "address pool advanced");
        Ok(())
    }
}

fn select_utxos(utxos: &[Utxo], token: &str, needed: u64) -> (Vec<InputRef>, u64) {
    let mut picked = Vec::new();
    let mut total = 0u64;
    for utxo in utxos.iter().filter(|u| u.token == token) {
        if total >= needed {
            break;
        }
        total = total.saturating_add(utxo.value);
        picked.push(InputRef {
            tx_id: utxo.tx_id,
            index: utxo.index,
            token: utxo.token.clone(),
        });
    }
    (picked, total)
}

fn validate_address(address: &str) -> Result<(), SendError> {
    let valid = address.len() == ADDRESS_LENGTH
        && address.starts_with(&ADDRESS_PREFIXES[..])
        && address.chars().all(|c| BASE58_ALPHABET.contains(c));
    if valid {
        Ok(())
    } else {
        Err(SendError::Address(format!("Invalid address: {address}")))
    }
}
