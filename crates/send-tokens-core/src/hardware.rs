//! Ledger signing protocol driver.
//!
//! Each function consumes the attempt's context and returns the next one,
//! together with at most one device request to dispatch. Recoverable problems
//! end in a `Failed` context; an `Err` is always fatal.

use std::collections::HashSet;

use alloy::primitives::Bytes;

use crate::classify::recover;
use crate::context::{AttemptFailure, PendingSendContext};
use crate::device::{DeviceEvent, DeviceRequest};
use crate::domain::{ChangeInfo, TokenConfig, TokenSignature, TokenVerificationFailure};
use crate::error::SendError;
use crate::ports::WalletPort;
use crate::state_machine::LedgerAction;

pub const TITLE_UNVERIFIED_TOKENS: &str = "Unverified custom tokens";
pub const TITLE_INVALID_TOKENS: &str = "Invalid custom tokens";
pub const TITLE_TOKEN_LIMIT: &str = "Token limit reached";
pub const DEVICE_TIMEOUT_MESSAGE: &str = "Timed out waiting for the Ledger device";

pub fn token_limit_message(limit: usize) -> String {
    format!("Ledger has a limit of {limit} different tokens per transaction.")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareStep {
    pub context: PendingSendContext,
    pub request: Option<DeviceRequest>,
}

impl HardwareStep {
    fn settled(context: PendingSendContext) -> Self {
        Self {
            context,
            request: None,
        }
    }
}

/// Starts a hardware attempt: enforces the custom token limit, checks every
/// custom token has a verified signature, then either registers the tokens on
/// the device or goes straight to the transaction outline.
pub fn begin<W: WalletPort>(
    context: PendingSendContext,
    wallet: &W,
    custom_token_limit: usize,
) -> Result<HardwareStep, SendError> {
    let custom: Vec<TokenConfig> = context.data.custom_tokens().into_iter().cloned().collect();

    if custom.len() > custom_token_limit {
        return halt(
            context,
            AttemptFailure::alert(TITLE_TOKEN_LIMIT, token_limit_message(custom_token_limit)),
        );
    }
    if custom.is_empty() {
        return send_outline(context, wallet);
    }

    let context = context.advance(LedgerAction::VerifyTokens)?;
    let known = wallet.token_signatures()?;
    let mut tokens = Vec::with_capacity(custom.len());
    let mut missing = Vec::new();
    for token in &custom {
        match known.get(&token.uid) {
            Some(signature) => tokens.push(TokenSignature {
                uid: token.uid.clone(),
                symbol: token.symbol.clone(),
                name: token.name.clone(),
                signature: signature.clone(),
            }),
            None => missing.push(TokenVerificationFailure::from(token)),
        }
    }
    if !missing.is_empty() {
        return halt(
            context,
            AttemptFailure::token_list(TITLE_UNVERIFIED_TOKENS, missing),
        );
    }

    issue(context, DeviceRequest::SendTokenData { tokens })
}

/// Reacts to the reply for the outstanding request. The caller checks the
/// reply belongs to this attempt before calling.
pub fn on_device_event<W: WalletPort>(
    mut context: PendingSendContext,
    event: DeviceEvent,
    wallet: &W,
) -> Result<HardwareStep, SendError> {
    if !context.awaits(event.answers()) {
        return Err(SendError::Protocol(format!(
            "{} reply while {:?} awaits {:?}",
            event.channel(),
            context.step,
            context.outstanding
        )));
    }
    context.outstanding = None;

    match event {
        DeviceEvent::TokenDataSent(Ok(failed)) if failed.is_empty() => {
            send_outline(context, wallet)
        }
        DeviceEvent::TokenDataSent(Ok(failed)) => {
            let failed: HashSet<&str> = failed.iter().map(String::as_str).collect();
            let rejected = context
                .data
                .custom_tokens()
                .into_iter()
                .filter(|t| failed.contains(t.uid.as_str()))
                .map(TokenVerificationFailure::from)
                .collect();
            halt(
                context,
                AttemptFailure::token_list(TITLE_INVALID_TOKENS, rejected),
            )
        }
        DeviceEvent::TxSent(Ok(())) => {
            let tx = context.prepared.clone().ok_or_else(|| {
                SendError::Protocol("outline accepted without a prepared transaction".to_owned())
            })?;
            let keys = wallet.signing_keys()?;
            let context = context.advance(LedgerAction::DeviceAccepted)?;
            issue(context, DeviceRequest::GetSignatures { tx, keys })
        }
        DeviceEvent::Signatures(Ok(signatures)) => finalize(context, signatures, wallet),
        DeviceEvent::TokenDataSent(Err(failure))
        | DeviceEvent::TxSent(Err(failure))
        | DeviceEvent::Signatures(Err(failure)) => {
            halt(context, AttemptFailure::message(failure.message))
        }
    }
}

/// Bounded wait expired on the outstanding request.
pub fn on_timeout(context: PendingSendContext) -> Result<HardwareStep, SendError> {
    if context.is_settled() || context.outstanding.is_none() {
        return Ok(HardwareStep::settled(context));
    }
    tracing::warn!(attempt = %context.attempt, outstanding = ?context.outstanding, "device request timed out");
    let context = context.fail(AttemptFailure::message(DEVICE_TIMEOUT_MESSAGE))?;
    Ok(HardwareStep {
        context,
        request: Some(DeviceRequest::Cancel),
    })
}

/// User dismissed the device dialog. Any later reply for this attempt is stale.
pub fn cancel(context: PendingSendContext) -> Result<HardwareStep, SendError> {
    if context.is_settled() {
        return Ok(HardwareStep::settled(context));
    }
    let had_outstanding = context.outstanding.is_some();
    let context = context.fail(AttemptFailure::cancelled())?;
    Ok(HardwareStep {
        context,
        request: had_outstanding.then_some(DeviceRequest::Cancel),
    })
}

fn send_outline<W: WalletPort>(
    mut context: PendingSendContext,
    wallet: &W,
) -> Result<HardwareStep, SendError> {
    let prepared = match wallet.prepare_tx(&context.data) {
        Ok(tx) => tx,
        Err(err) => return halt_on(context, err),
    };

    let mut change_info = Vec::new();
    for (output_index, output) in prepared.change_outputs() {
        let key_index = wallet.key_index(&output.address)?.ok_or_else(|| {
            SendError::Protocol(format!(
                "change output {output_index} pays to an address outside the wallet"
            ))
        })?;
        change_info.push(ChangeInfo {
            output_index,
            key_index,
        });
    }

    let request = DeviceRequest::SendTx {
        tx: prepared.clone(),
        change_info: change_info.clone(),
        use_old_protocol: context.use_legacy_protocol,
    };
    context.prepared = Some(prepared);
    context.change_info = change_info;
    let context = context.advance(LedgerAction::SendOutline)?;
    issue(context, request)
}

fn finalize<W: WalletPort>(
    context: PendingSendContext,
    signatures: Vec<Bytes>,
    wallet: &W,
) -> Result<HardwareStep, SendError> {
    let mut context = context.advance(LedgerAction::SignaturesReceived)?;
    let prepared = context.prepared.clone().ok_or_else(|| {
        SendError::Protocol("signatures received without a prepared transaction".to_owned())
    })?;
    if signatures.len() != prepared.inputs.len() {
        return Err(SendError::Protocol(format!(
            "device returned {} signatures for {} inputs",
            signatures.len(),
            prepared.inputs.len()
        )));
    }

    let mut signed = wallet.attach_signatures(prepared, signatures, &context.change_info)?;
    wallet.complete_tx(&mut signed.tx)?;
    context.signed = Some(signed);
    Ok(HardwareStep::settled(context))
}

fn issue(
    mut context: PendingSendContext,
    request: DeviceRequest,
) -> Result<HardwareStep, SendError> {
    tracing::debug!(attempt = %context.attempt, kind = ?request.kind(), "device request queued");
    context.outstanding = Some(request.kind());
    Ok(HardwareStep {
        context,
        request: Some(request),
    })
}

fn halt(
    context: PendingSendContext,
    failure: AttemptFailure,
) -> Result<HardwareStep, SendError> {
    tracing::info!(
        attempt = %context.attempt,
        step = ?context.step,
        title = failure.title.as_deref().unwrap_or_default(),
        "hardware attempt halted"
    );
    Ok(HardwareStep::settled(context.fail(failure)?))
}

fn halt_on(context: PendingSendContext, err: SendError) -> Result<HardwareStep, SendError> {
    let message = recover(err)?;
    halt(context, AttemptFailure::message(message))
}
