use crate::domain::{AttemptId, TokenVerificationFailure, TxTokenSelection};

pub const DEVICE_MODAL_VALIDATE: &str = "Validate outputs on Ledger";
pub const DEVICE_MODAL_SENDING: &str = "Sending transaction";
pub const ALL_TOKENS_ADDED: &str = "All your tokens were already added";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    WalletHome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertBody {
    Tokens(Vec<TokenVerificationFailure>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    Pin,
    DeviceConfirmation { title: String },
    LedgerAlert { title: String, body: AlertBody },
    NotSupported,
}

/// What the surrounding UI shell renders for the send screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendScreen {
    pub active: bool,
    pub selection: TxTokenSelection,
    pub error_message: Option<String>,
    pub pin_error: Option<String>,
    pub in_progress: bool,
    pub modal: Option<Modal>,
    pub navigate_to: Option<Route>,
    pub(crate) settled_attempt: Option<AttemptId>,
}

impl SendScreen {
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn show_modal(&mut self, modal: Modal) {
        self.modal = Some(modal);
    }

    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    pub fn show_alert(&mut self, title: impl Into<String>, body: AlertBody) {
        self.modal = Some(Modal::LedgerAlert {
            title: title.into(),
            body,
        });
    }

    pub fn device_modal_title(&self) -> Option<&str> {
        match &self.modal {
            Some(Modal::DeviceConfirmation { title }) => Some(title),
            _ => None,
        }
    }
}
