use semver::Version;

use crate::aggregate::{aggregate, FormInvalid};
use crate::classify::recover;
use crate::context::{AttemptFailure, PendingSendContext};
use crate::device::{DeviceMessage, DeviceRequest, DEVICE_CHANNELS};
use crate::domain::{
    AttemptId, DeploymentMode, SignerPath, SubmittedTx, TimestampMs, TokenConfig, WalletKind,
};
use crate::error::SendError;
use crate::hardware::{self, token_limit_message, HardwareStep, TITLE_TOKEN_LIMIT};
use crate::ports::{ClockPort, DevicePort, SubForm, SubmitPort, WalletPort};
use crate::result::{on_send_error, on_send_success};
use crate::screen::{
    AlertBody, Modal, SendScreen, ALL_TOKENS_ADDED, DEVICE_MODAL_SENDING, DEVICE_MODAL_VALIDATE,
};
use crate::signer::select_path;
use crate::software;
use crate::state_machine::{LedgerAction, LedgerStep};

pub const LEDGER_TX_CUSTOM_TOKEN_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendSettings {
    pub custom_token_limit: usize,
    pub min_custom_token_firmware: Version,
    pub deployment: DeploymentMode,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            custom_token_limit: LEDGER_TX_CUSTOM_TOKEN_LIMIT,
            min_custom_token_firmware: Version::new(1, 1, 0),
            deployment: DeploymentMode::Direct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A sub-form was invalid; nothing was built and no signer was entered.
    Aborted(FormInvalid),
    AwaitingPin,
    AwaitingDevice(LedgerStep),
    Halted(AttemptFailure),
    Submitted(SubmittedTx),
    /// Stale or out-of-turn input, dropped without effect.
    Ignored,
}

pub struct Orchestrator<W, D, S, C>
where
    W: WalletPort,
    D: DevicePort,
    S: SubmitPort,
    C: ClockPort,
{
    pub wallet: W,
    pub device: D,
    pub submitter: S,
    pub clock: C,
    pub settings: SendSettings,
    screen: SendScreen,
    pending: Option<PendingSendContext>,
    subscription: Option<D::Subscription>,
    next_attempt: u64,
}

impl<W, D, S, C> Orchestrator<W, D, S, C>
where
    W: WalletPort,
    D: DevicePort,
    S: SubmitPort,
    C: ClockPort,
{
    pub fn new(wallet: W, device: D, submitter: S, clock: C, settings: SendSettings) -> Self {
        Self {
            wallet,
            device,
            submitter,
            clock,
            settings,
            screen: SendScreen::default(),
            pending: None,
            subscription: None,
            next_attempt: 1,
        }
    }

    pub fn screen(&self) -> &SendScreen {
        &self.screen
    }

    pub fn pending(&self) -> Option<&PendingSendContext> {
        self.pending.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.screen.active
    }

    /// Called by the shell when the send screen becomes visible.
    pub fn activate(&mut self) -> Result<(), SendError> {
        if self.screen.active {
            return Ok(());
        }
        self.subscription = Some(self.device.subscribe(&DEVICE_CHANNELS)?);
        self.screen.active = true;
        self.screen.navigate_to = None;
        tracing::info!("send screen activated");
        Ok(())
    }

    /// Called by the shell when the send screen goes away. Drops any attempt
    /// still in flight.
    pub fn deactivate(&mut self) -> Result<(), SendError> {
        if let Some(context) = self.pending.take() {
            if context.path == SignerPath::Hardware {
                let step = hardware::cancel(context)?;
                if let Some(request) = step.request {
                    self.dispatch_best_effort(step.context.attempt, &request);
                }
            }
        }
        self.screen.active = false;
        self.screen.in_progress = false;
        self.screen.modal = None;

        if let Some(subscription) = self.subscription.take() {
            self.device.unsubscribe(subscription)?;
        }
        tracing::info!("send screen deactivated");
        Ok(())
    }

    pub fn custom_tokens_allowed(&self) -> Result<bool, SendError> {
        Ok(self.device.firmware_version()? >= self.settings.min_custom_token_firmware)
    }

    /// Adds the first wallet token not selected yet. Returns whether a token
    /// was added.
    pub fn add_token(&mut self) -> Result<bool, SendError> {
        if self.wallet.wallet_kind() == WalletKind::Hardware {
            if !self.custom_tokens_allowed()? {
                self.screen.show_modal(Modal::NotSupported);
                return Ok(false);
            }
            let limit = self.settings.custom_token_limit;
            if self.screen.selection.custom_count() >= limit {
                self.screen
                    .show_alert(TITLE_TOKEN_LIMIT, AlertBody::Text(token_limit_message(limit)));
                return Ok(false);
            }
        }

        let available = self.wallet.tokens()?;
        if self.screen.selection.len() >= available.len() {
            self.screen.set_error(ALL_TOKENS_ADDED);
            return Ok(false);
        }
        let next = available
            .into_iter()
            .find(|t| !self.screen.selection.contains(&t.uid));
        match next {
            Some(token) => {
                self.screen.selection.push(token)?;
                Ok(true)
            }
            None => {
                self.screen.set_error(ALL_TOKENS_ADDED);
                Ok(false)
            }
        }
    }

    pub fn select_token(&mut self, index: usize, token: TokenConfig) -> Result<(), SendError> {
        self.screen.selection.replace(index, token)
    }

    pub fn remove_token(&mut self, index: usize) -> Result<TokenConfig, SendError> {
        self.screen.selection.remove(index)
    }

    /// The user pressed send. `forms` holds one sub-form per selected token.
    pub fn send<F>(&mut self, forms: &[&F]) -> Result<SendOutcome, SendError>
    where
        F: SubForm + ?Sized,
    {
        if let Some(context) = &self.pending {
            if !context.is_settled() {
                tracing::warn!(attempt = %context.attempt, "send ignored while an attempt is in flight");
                return Ok(SendOutcome::Ignored);
            }
        }

        let data = match aggregate(forms, &self.screen.selection) {
            Ok(data) => data,
            Err(invalid) => {
                tracing::debug!(form = invalid.form_index, "send aborted: invalid form");
                return Ok(SendOutcome::Aborted(invalid));
            }
        };
        self.screen.clear_error();

        let attempt = AttemptId(self.next_attempt);
        self.next_attempt += 1;
        let started_at = TimestampMs(self.clock.now_ms()?);

        match select_path(self.wallet.wallet_kind()) {
            SignerPath::Software => {
                self.pending = Some(PendingSendContext::new(
                    attempt,
                    SignerPath::Software,
                    data,
                    false,
                    started_at,
                ));
                self.screen.pin_error = None;
                self.screen.show_modal(Modal::Pin);
                Ok(SendOutcome::AwaitingPin)
            }
            SignerPath::Hardware => {
                let use_legacy_protocol = !self.custom_tokens_allowed()?;
                tracing::info!(%attempt, use_legacy_protocol, "hardware send attempt started");
                let context = PendingSendContext::new(
                    attempt,
                    SignerPath::Hardware,
                    data,
                    use_legacy_protocol,
                    started_at,
                );
                let step =
                    hardware::begin(context, &self.wallet, self.settings.custom_token_limit)?;
                self.apply(step)
            }
        }
    }

    pub fn submit_pin(&mut self, pin: &str) -> Result<SendOutcome, SendError> {
        let Some(context) = self.pending.take() else {
            return Ok(SendOutcome::Ignored);
        };
        if context.path != SignerPath::Software || context.is_settled() {
            self.pending = Some(context);
            return Ok(SendOutcome::Ignored);
        }

        match software::sign_and_send(
            &self.wallet,
            &self.submitter,
            &context.data,
            pin,
            self.settings.deployment,
        ) {
            Ok(submitted) => {
                on_send_success(&mut self.screen, &self.wallet, context.attempt, &submitted)?;
                Ok(SendOutcome::Submitted(submitted))
            }
            Err(SendError::InvalidPin) => {
                self.screen.pin_error = Some(SendError::InvalidPin.to_string());
                self.pending = Some(context);
                Ok(SendOutcome::AwaitingPin)
            }
            Err(err) => {
                let failure = AttemptFailure::message(recover(err)?);
                on_send_error(&mut self.screen, &failure);
                Ok(SendOutcome::Halted(failure))
            }
        }
    }

    pub fn cancel_pin(&mut self) {
        if matches!(&self.pending, Some(c) if c.path == SignerPath::Software) {
            self.pending = None;
        }
        if self.screen.modal == Some(Modal::Pin) {
            self.screen.close_modal();
        }
    }

    pub fn on_device_message(&mut self, message: DeviceMessage) -> Result<SendOutcome, SendError> {
        if !self.screen.active {
            tracing::debug!(attempt = %message.attempt, "device event ignored: screen inactive");
            return Ok(SendOutcome::Ignored);
        }
        let Some(context) = self.pending.take() else {
            tracing::debug!(attempt = %message.attempt, "device event ignored: no attempt");
            return Ok(SendOutcome::Ignored);
        };
        if context.attempt != message.attempt || !context.awaits(message.event.answers()) {
            tracing::debug!(
                live = %context.attempt,
                received = %message.attempt,
                channel = message.event.channel(),
                "stale device event ignored"
            );
            self.pending = Some(context);
            return Ok(SendOutcome::Ignored);
        }

        let step = hardware::on_device_event(context, message.event, &self.wallet)?;
        self.apply(step)
    }

    pub fn on_device_timeout(&mut self, attempt: AttemptId) -> Result<SendOutcome, SendError> {
        let Some(context) = self.pending.take() else {
            return Ok(SendOutcome::Ignored);
        };
        if context.attempt != attempt || context.is_settled() || context.outstanding.is_none() {
            self.pending = Some(context);
            return Ok(SendOutcome::Ignored);
        }
        let step = hardware::on_timeout(context)?;
        self.apply(step)
    }

    pub fn dismiss_device_dialog(&mut self) -> Result<SendOutcome, SendError> {
        if self.screen.device_modal_title().is_some() {
            self.screen.close_modal();
        }
        self.screen.in_progress = false;
        let Some(context) = self.pending.take() else {
            return Ok(SendOutcome::Ignored);
        };
        if context.path != SignerPath::Hardware || context.is_settled() {
            self.pending = Some(context);
            return Ok(SendOutcome::Ignored);
        }
        let step = hardware::cancel(context)?;
        self.apply(step)
    }

    pub fn close_alert(&mut self) {
        if matches!(
            self.screen.modal,
            Some(Modal::LedgerAlert { .. }) | Some(Modal::NotSupported)
        ) {
            self.screen.close_modal();
        }
    }

    fn apply(&mut self, step: HardwareStep) -> Result<SendOutcome, SendError> {
        let HardwareStep {
            mut context,
            request,
        } = step;

        if let Some(request) = request {
            if context.is_settled() {
                self.dispatch_best_effort(context.attempt, &request);
            } else if let Err(err) = self.device.send_request(context.attempt, &request) {
                tracing::warn!(attempt = %context.attempt, error = %err, "device request failed");
                context = context.fail(AttemptFailure::message(err.to_string()))?;
            }
        }

        match context.step {
            LedgerStep::Failed => {
                let failure = context.failure.clone().unwrap_or_default();
                on_send_error(&mut self.screen, &failure);
                self.pending = Some(context);
                Ok(SendOutcome::Halted(failure))
            }
            LedgerStep::Finalizing => self.submit_signed(context),
            LedgerStep::VerifyingTokens => {
                self.screen.in_progress = true;
                let step = context.step;
                self.pending = Some(context);
                Ok(SendOutcome::AwaitingDevice(step))
            }
            LedgerStep::AwaitingDeviceConfirmation | LedgerStep::CollectingSignatures => {
                self.screen.in_progress = true;
                self.screen.show_modal(Modal::DeviceConfirmation {
                    title: DEVICE_MODAL_VALIDATE.to_owned(),
                });
                let step = context.step;
                self.pending = Some(context);
                Ok(SendOutcome::AwaitingDevice(step))
            }
            LedgerStep::Idle | LedgerStep::Submitted => Err(SendError::Protocol(format!(
                "hardware driver returned an attempt in {:?}",
                context.step
            ))),
        }
    }

    fn submit_signed(&mut self, context: PendingSendContext) -> Result<SendOutcome, SendError> {
        self.screen.show_modal(Modal::DeviceConfirmation {
            title: DEVICE_MODAL_SENDING.to_owned(),
        });
        let signed = context.signed.clone().ok_or_else(|| {
            SendError::Protocol("finalized attempt carries no signed transaction".to_owned())
        })?;

        match self.submitter.submit(&signed) {
            Ok(tx_id) => {
                let context = context.advance(LedgerAction::Submit)?;
                let submitted = SubmittedTx {
                    tx_id,
                    change_outputs: signed.change_output_count(),
                };
                on_send_success(&mut self.screen, &self.wallet, context.attempt, &submitted)?;
                Ok(SendOutcome::Submitted(submitted))
            }
            Err(err) => {
                let failure = AttemptFailure::message(recover(err)?);
                let context = context.fail(failure.clone())?;
                on_send_error(&mut self.screen, &failure);
                self.pending = Some(context);
                Ok(SendOutcome::Halted(failure))
            }
        }
    }

    fn dispatch_best_effort(&self, attempt: AttemptId, request: &DeviceRequest) {
        if let Err(err) = self.device.send_request(attempt, request) {
            tracing::warn!(%attempt, error = %err, "best-effort device request failed");
        }
    }
}
