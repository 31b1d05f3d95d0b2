use thiserror::Error;

use crate::ports::PortError;
use crate::state_machine::{LedgerAction, LedgerStep};

/// Every way a send attempt can go wrong. The set is closed so the
/// classifier can match it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("{0}")]
    Address(String),
    #[error("{0}")]
    OutputValue(String),
    #[error("{0}")]
    ConstantNotSet(String),
    #[error("{0}")]
    MaximumOutputs(String),
    #[error("{0}")]
    MaximumInputs(String),
    /// Reported by the hardware device, message kept verbatim.
    #[error("{0}")]
    Device(String),
    /// The wallet could not build the transaction (e.g. insufficient funds).
    #[error("{0}")]
    Preparation(String),
    /// Broadcast rejected by the network or the mining service.
    #[error("{0}")]
    Submission(String),
    #[error("Invalid PIN")]
    InvalidPin,
    #[error("{0}")]
    Validation(String),
    #[error("illegal ledger transition: {from:?} -> {action:?}")]
    IllegalTransition {
        from: LedgerStep,
        action: LedgerAction,
    },
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error(transparent)]
    Port(#[from] PortError),
}
