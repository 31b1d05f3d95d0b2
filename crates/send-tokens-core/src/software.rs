use crate::domain::{AggregatedTxData, DeploymentMode, SubmittedTx};
use crate::error::SendError;
use crate::ports::{SubmitPort, WalletPort};

pub const PIN_LENGTH: usize = 6;

pub fn validate_pin_format(pin: &str) -> Result<(), SendError> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(SendError::InvalidPin);
    }
    Ok(())
}

/// PIN-unlocked signing: check the PIN, build and sign with the signer the
/// deployment mode calls for, then hand the result to the submitter.
pub fn sign_and_send<W, S>(
    wallet: &W,
    submitter: &S,
    data: &AggregatedTxData,
    pin: &str,
    mode: DeploymentMode,
) -> Result<SubmittedTx, SendError>
where
    W: WalletPort,
    S: SubmitPort,
{
    validate_pin_format(pin)?;
    if !wallet.is_pin_correct(pin)? {
        return Err(SendError::InvalidPin);
    }

    let signed = match mode {
        DeploymentMode::Direct => wallet.sign_with_pin(data, pin)?,
        DeploymentMode::WalletService => wallet.sign_with_wallet_service(data, pin)?,
    };
    let tx_id = submitter.submit(&signed)?;
    tracing::info!(%tx_id, ?mode, "software-signed transaction submitted");
    Ok(SubmittedTx {
        tx_id,
        change_outputs: signed.change_output_count(),
    })
}
