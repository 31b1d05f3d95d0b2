pub mod aggregate;
pub mod classify;
pub mod context;
pub mod device;
pub mod domain;
pub mod error;
pub mod hardware;
pub mod orchestrator;
pub mod ports;
pub mod result;
pub mod screen;
pub mod signer;
pub mod software;
pub mod state_machine;

pub use aggregate::{aggregate, FormInvalid};
pub use classify::{classify, recover, ErrorClass};
pub use context::{AttemptFailure, PendingSendContext};
pub use device::{
    DeviceEvent, DeviceFailure, DeviceMessage, DeviceReply, DeviceRequest, DeviceRequestKind,
    CHANNEL_SIGNATURES, CHANNEL_TOKEN_DATA_SENT, CHANNEL_TX_SENT, DEVICE_CHANNELS,
};
pub use domain::{
    is_primary_token, AggregatedTxData, AttemptId, ChangeInfo, DeploymentMode, InputRef,
    OutputSpec, PreparedTx, SignedTx, SignerPath, SigningKey, SubFormData, SubmittedTx,
    TimestampMs, TokenConfig, TokenSignature, TokenVerificationFailure, TxTokenSelection,
    WalletKind, PRIMARY_TOKEN_UID,
};
pub use error::SendError;
pub use hardware::HardwareStep;
pub use orchestrator::{Orchestrator, SendOutcome, SendSettings, LEDGER_TX_CUSTOM_TOKEN_LIMIT};
pub use ports::{ClockPort, DevicePort, PortError, SubForm, SubmitPort, WalletPort};
pub use screen::{AlertBody, Modal, Route, SendScreen};
pub use signer::select_path;
pub use state_machine::{ledger_transition, LedgerAction, LedgerStep, StateTransition};
