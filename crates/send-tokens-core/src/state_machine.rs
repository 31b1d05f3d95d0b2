use serde::{Deserialize, Serialize};

use crate::error::SendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerStep {
    Idle,
    VerifyingTokens,
    AwaitingDeviceConfirmation,
    CollectingSignatures,
    Finalizing,
    Submitted,
    Failed,
}

impl LedgerStep {
    pub fn is_terminal(self) -> bool {
        matches!(self, LedgerStep::Submitted | LedgerStep::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerAction {
    VerifyTokens,
    SendOutline,
    DeviceAccepted,
    SignaturesReceived,
    Submit,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: LedgerStep,
    pub to: LedgerStep,
    pub reason: &'static str,
}

pub fn ledger_transition(
    step: LedgerStep,
    action: LedgerAction,
) -> Result<(LedgerStep, StateTransition), SendError> {
    use LedgerAction as A;
    use LedgerStep as S;

    let (to, reason) = match (step, action) {
        (S::Idle, A::VerifyTokens) => (S::VerifyingTokens, "verify_custom_tokens"),
        (S::Idle, A::SendOutline) => (S::AwaitingDeviceConfirmation, "send_outline"),
        (S::VerifyingTokens, A::SendOutline) => {
            (S::AwaitingDeviceConfirmation, "tokens_verified")
        }
        (S::AwaitingDeviceConfirmation, A::DeviceAccepted) => {
            (S::CollectingSignatures, "outline_accepted")
        }
        (S::CollectingSignatures, A::SignaturesReceived) => (S::Finalizing, "signatures_received"),
        (S::Finalizing, A::Submit) => (S::Submitted, "submitted"),
        (from, A::Fail) if !from.is_terminal() => (S::Failed, "failed"),
        (from, action) => return Err(SendError::IllegalTransition { from, action }),
    };

    Ok((
        to,
        StateTransition {
            from: step,
            to,
            reason,
        },
    ))
}
