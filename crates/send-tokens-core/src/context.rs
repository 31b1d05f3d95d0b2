use crate::device::DeviceRequestKind;
use crate::domain::{
    AggregatedTxData, AttemptId, ChangeInfo, PreparedTx, SignedTx, SignerPath, TimestampMs,
    TokenVerificationFailure,
};
use crate::error::SendError;
use crate::state_machine::{ledger_transition, LedgerAction, LedgerStep, StateTransition};

/// Why an attempt stopped short of submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttemptFailure {
    pub title: Option<String>,
    pub message: Option<String>,
    pub tokens: Vec<TokenVerificationFailure>,
    pub cancelled: bool,
}

impl AttemptFailure {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn alert(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn token_list(title: impl Into<String>, tokens: Vec<TokenVerificationFailure>) -> Self {
        Self {
            title: Some(title.into()),
            tokens,
            ..Self::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}

/// Everything one send attempt owns while it is in flight. Transitions consume
/// the context and hand back the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSendContext {
    pub attempt: AttemptId,
    pub path: SignerPath,
    pub step: LedgerStep,
    pub data: AggregatedTxData,
    pub prepared: Option<PreparedTx>,
    pub change_info: Vec<ChangeInfo>,
    pub signed: Option<SignedTx>,
    pub token_failures: Vec<TokenVerificationFailure>,
    pub failure: Option<AttemptFailure>,
    /// Chosen once when the attempt starts, never re-evaluated.
    pub use_legacy_protocol: bool,
    pub outstanding: Option<DeviceRequestKind>,
    pub started_at_ms: TimestampMs,
    pub transitions: Vec<StateTransition>,
}

impl PendingSendContext {
    pub fn new(
        attempt: AttemptId,
        path: SignerPath,
        data: AggregatedTxData,
        use_legacy_protocol: bool,
        started_at_ms: TimestampMs,
    ) -> Self {
        Self {
            attempt,
            path,
            step: LedgerStep::Idle,
            data,
            prepared: None,
            change_info: Vec::new(),
            signed: None,
            token_failures: Vec::new(),
            failure: None,
            use_legacy_protocol,
            outstanding: None,
            started_at_ms,
            transitions: Vec::new(),
        }
    }

    pub fn advance(mut self, action: LedgerAction) -> Result<Self, SendError> {
        let (step, transition) = ledger_transition(self.step, action)?;
        tracing::debug!(
            attempt = %self.attempt,
            from = ?transition.from,
            to = ?transition.to,
            reason = transition.reason,
            "ledger transition"
        );
        self.step = step;
        self.transitions.push(transition);
        Ok(self)
    }

    pub fn fail(mut self, failure: AttemptFailure) -> Result<Self, SendError> {
        self.outstanding = None;
        self.token_failures = failure.tokens.clone();
        self.failure = Some(failure);
        self.advance(LedgerAction::Fail)
    }

    pub fn awaits(&self, kind: DeviceRequestKind) -> bool {
        !self.step.is_terminal() && self.outstanding == Some(kind)
    }

    pub fn is_settled(&self) -> bool {
        self.step.is_terminal()
    }
}
