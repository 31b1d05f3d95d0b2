use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

use alloy::primitives::{Bytes, B256};
use serde::Serialize;

use send_tokens_core::{InputRef, OutputSpec, PortError, PreparedTx, TimestampMs, TokenConfig};

type HmacSha256 = Hmac<Sha256>;

pub fn hash_pin(pin: &str, salt: &[u8], iterations: u32) -> B256 {
    let mut out = [0u8; 32];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, iterations, &mut out);
    B256::from(out)
}

/// Compares through the MAC so the check does not short-circuit on the first
/// differing byte.
pub fn verify_pin(
    pin: &str,
    salt: &[u8],
    iterations: u32,
    expected: &B256,
) -> Result<bool, PortError> {
    let candidate = hash_pin(pin, salt, iterations);
    let mut mac = <HmacSha256 as Mac>::new_from_slice(salt)
        .map_err(|e| PortError::Validation(format!("hmac init failed: {e}")))?;
    mac.update(candidate.as_slice());
    let tag = mac.finalize().into_bytes();

    let mut check = <HmacSha256 as Mac>::new_from_slice(salt)
        .map_err(|e| PortError::Validation(format!("hmac init failed: {e}")))?;
    check.update(expected.as_slice());
    Ok(check.verify_slice(&tag).is_ok())
}

pub fn hmac_sha256_b256(key: &[u8], payload: &[u8]) -> Result<B256, PortError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| PortError::Validation(format!("hmac init failed: {e}")))?;
    mac.update(payload);
    let out = mac.finalize().into_bytes();
    Ok(B256::from_slice(&out))
}

fn token_payload(token: &TokenConfig) -> Vec<u8> {
    let mut payload = Vec::new();
    for part in [&token.uid, &token.symbol, &token.name] {
        payload.extend_from_slice(&(part.len() as u32).to_be_bytes());
        payload.extend_from_slice(part.as_bytes());
    }
    payload
}

/// Signature the device accepts when registering a custom token.
pub fn sign_token(key: &[u8], token: &TokenConfig) -> Result<Bytes, PortError> {
    Ok(Bytes::copy_from_slice(
        hmac_sha256_b256(key, &token_payload(token))?.as_slice(),
    ))
}

pub fn verify_token(key: &[u8], token: &TokenConfig, signature: &[u8]) -> Result<bool, PortError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| PortError::Validation(format!("hmac init failed: {e}")))?;
    mac.update(&token_payload(token));
    Ok(mac.verify_slice(signature).is_ok())
}

/// Deterministic 64-byte signature over one input, bound to the signing key
/// and the transaction digest.
pub fn sign_input(key: &[u8], digest: &B256, input: &InputRef) -> Result<Bytes, PortError> {
    let mut payload = Vec::with_capacity(32 + 32 + 4);
    payload.extend_from_slice(digest.as_slice());
    payload.extend_from_slice(input.tx_id.as_slice());
    payload.extend_from_slice(&input.index.to_be_bytes());
    let r = hmac_sha256_b256(key, &payload)?;
    payload.push(0x01);
    let s = hmac_sha256_b256(key, &payload)?;

    let mut sig = Vec::with_capacity(64);
    sig.extend_from_slice(r.as_slice());
    sig.extend_from_slice(s.as_slice());
    Ok(Bytes::from(sig))
}

pub fn canonical_digest<T: Serialize>(key: &[u8], value: &T) -> Result<B256, PortError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| PortError::Validation(format!("canonical json serialization failed: {e}")))?;
    hmac_sha256_b256(key, &bytes)
}

#[derive(Serialize)]
struct SignedFields<'a> {
    inputs: &'a [InputRef],
    outputs: &'a [OutputSpec],
    tokens: &'a [String],
    timestamp: &'a Option<TimestampMs>,
}

/// Digest every input signature commits to. Nonce and parents are filled in
/// after signing and stay outside it.
pub fn sighash(key: &[u8], tx: &PreparedTx) -> Result<B256, PortError> {
    canonical_digest(
        key,
        &SignedFields {
            inputs: &tx.inputs,
            outputs: &tx.outputs,
            tokens: &tx.tokens,
            timestamp: &tx.timestamp,
        },
    )
}
