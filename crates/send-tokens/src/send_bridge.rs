//! Bridge between the headless shell and the send workspace crates.
//! Everything the shell does to a send attempt goes through here.

use std::time::Duration;

use alloy::primitives::B256;
use eyre::{eyre, Result};
use serde::Serialize;
use tokio::runtime::Runtime;

use send_tokens_adapters::{
    DeviceEvents, LedgerChannelAdapter, LedgerEmulator, MemoryWalletAdapter, SendAdapterConfig,
    SystemClockAdapter, TxMiningAdapter,
};
use send_tokens_core::{
    Modal, Orchestrator, Route, SendOutcome, SubFormData, TokenConfig, WalletPort,
};

use crate::request::{DeviceSetup, SendRequest};

type SendOrchestrator =
    Orchestrator<MemoryWalletAdapter, LedgerChannelAdapter, TxMiningAdapter, SystemClockAdapter>;

/// What the shell prints once the attempt settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReport {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    pub navigate_home: bool,
}

pub struct SendBridge {
    orchestrator: SendOrchestrator,
    events: DeviceEvents,
    device_timeout: Duration,
}

impl SendBridge {
    pub fn new(request: &SendRequest, config: &SendAdapterConfig) -> Result<Self> {
        let wallet =
            MemoryWalletAdapter::from_fixture(request.wallet.clone(), config.pin_kdf_iterations)?;
        let emulator = build_emulator(&request.device);
        for uid in &request.device.verified_tokens {
            let token = find_token(&wallet, uid)?;
            wallet.insert_token_signature(uid, emulator.sign_token(&token)?)?;
        }
        let (device, events) = LedgerChannelAdapter::emulated(emulator);

        Ok(Self {
            orchestrator: SendOrchestrator::new(
                wallet,
                device,
                TxMiningAdapter::with_config(config),
                SystemClockAdapter,
                config.send_settings(),
            ),
            events,
            device_timeout: Duration::from_millis(config.device_timeout_ms),
        })
    }

    /// Drives one attempt from the send button to a settled screen.
    pub fn run(&mut self, runtime: &Runtime, request: &SendRequest) -> Result<SendReport> {
        self.orchestrator.activate()?;
        let report = self.drive(runtime, request);
        self.orchestrator.deactivate()?;
        report
    }

    fn drive(&mut self, runtime: &Runtime, request: &SendRequest) -> Result<SendReport> {
        for uid in &request.tokens {
            self.select(uid)?;
        }

        let forms: Vec<&Option<SubFormData>> = request.forms.iter().collect();
        let mut outcome = self.orchestrator.send(&forms)?;

        if outcome == SendOutcome::AwaitingPin {
            let pin = request
                .pin
                .as_deref()
                .ok_or_else(|| eyre!("software wallet needs a PIN"))?;
            outcome = self.orchestrator.submit_pin(pin)?;
            if outcome == SendOutcome::AwaitingPin {
                self.orchestrator.cancel_pin();
                return Ok(self.report("invalidPin", None));
            }
        }

        while let SendOutcome::AwaitingDevice(_) | SendOutcome::Ignored = outcome {
            let Some(attempt) = self
                .orchestrator
                .pending()
                .filter(|c| !c.is_settled())
                .map(|c| c.attempt)
            else {
                break;
            };
            let next = runtime.block_on(self.events.next(self.device_timeout))?;
            outcome = match next {
                Some(message) => self.orchestrator.on_device_message(message)?,
                None => {
                    tracing::warn!(%attempt, "no device reply before the deadline");
                    self.orchestrator.on_device_timeout(attempt)?
                }
            };
        }

        Ok(match outcome {
            SendOutcome::Submitted(submitted) => self.report("submitted", Some(submitted.tx_id)),
            SendOutcome::Aborted(invalid) => SendReport {
                error: Some(format!("sub-form {} is invalid", invalid.form_index)),
                ..self.report("aborted", None)
            },
            SendOutcome::Halted(_) => self.report("halted", None),
            SendOutcome::AwaitingPin | SendOutcome::AwaitingDevice(_) | SendOutcome::Ignored => {
                self.report("ignored", None)
            }
        })
    }

    fn select(&mut self, uid: &str) -> Result<()> {
        let token = find_token(&self.orchestrator.wallet, uid)?;
        if self.orchestrator.screen().selection.contains(uid) {
            return Ok(());
        }
        if !self.orchestrator.add_token()? {
            return Err(eyre!(
                "token {uid} could not be added: {}",
                self.orchestrator
                    .screen()
                    .error_message
                    .as_deref()
                    .unwrap_or("not allowed on this device")
            ));
        }
        let last = self.orchestrator.screen().selection.len() - 1;
        if self.orchestrator.screen().selection.tokens()[last].uid != uid {
            self.orchestrator.select_token(last, token)?;
        }
        Ok(())
    }

    fn report(&self, outcome: &'static str, tx_id: Option<B256>) -> SendReport {
        let screen = self.orchestrator.screen();
        let alert = match &screen.modal {
            Some(Modal::LedgerAlert { title, .. }) => Some(title.clone()),
            Some(Modal::NotSupported) => Some("Ledger firmware not supported".to_owned()),
            _ => None,
        };
        SendReport {
            outcome,
            tx_id,
            error: screen.error_message.clone().or_else(|| screen.pin_error.clone()),
            alert,
            navigate_home: screen.navigate_to == Some(Route::WalletHome),
        }
    }
}

fn build_emulator(setup: &DeviceSetup) -> LedgerEmulator {
    let mut emulator = LedgerEmulator::new(setup.firmware.clone(), setup.token_key.as_bytes());
    if let Some(message) = &setup.reject_outline {
        emulator = emulator.rejecting_outline(message.clone());
    }
    if setup.unresponsive {
        emulator = emulator.unresponsive();
    }
    emulator
}

fn find_token(wallet: &MemoryWalletAdapter, uid: &str) -> Result<TokenConfig> {
    wallet
        .tokens()?
        .into_iter()
        .find(|t| t.uid == uid)
        .ok_or_else(|| eyre!("token {uid} is not in the wallet"))
}
