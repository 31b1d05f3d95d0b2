//! Messages exchanged with the hardware signing device.
//!
//! Requests go out through `DevicePort::send_request`; replies come back
//! asynchronously on one of three named channels and are correlated with the
//! attempt that issued the request.

use alloy::primitives::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{AttemptId, ChangeInfo, PreparedTx, SigningKey, TokenSignature};
use crate::ports::PortError;

pub const CHANNEL_TOKEN_DATA_SENT: &str = "ledger:tokenDataSent";
pub const CHANNEL_TX_SENT: &str = "ledger:txSent";
pub const CHANNEL_SIGNATURES: &str = "ledger:signatures";

pub const DEVICE_CHANNELS: [&str; 3] = [CHANNEL_TOKEN_DATA_SENT, CHANNEL_TX_SENT, CHANNEL_SIGNATURES];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum DeviceRequest {
    SendTokenData {
        tokens: Vec<TokenSignature>,
    },
    #[serde(rename_all = "camelCase")]
    SendTx {
        tx: PreparedTx,
        change_info: Vec<ChangeInfo>,
        use_old_protocol: bool,
    },
    GetSignatures {
        tx: PreparedTx,
        keys: Vec<SigningKey>,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRequestKind {
    SendTokenData,
    SendTx,
    GetSignatures,
    Cancel,
}

impl DeviceRequest {
    pub fn kind(&self) -> DeviceRequestKind {
        match self {
            DeviceRequest::SendTokenData { .. } => DeviceRequestKind::SendTokenData,
            DeviceRequest::SendTx { .. } => DeviceRequestKind::SendTx,
            DeviceRequest::GetSignatures { .. } => DeviceRequestKind::GetSignatures,
            DeviceRequest::Cancel => DeviceRequestKind::Cancel,
        }
    }

    /// Channel the reply will arrive on. Cancel is fire-and-forget.
    pub fn reply_channel(&self) -> Option<&'static str> {
        match self.kind() {
            DeviceRequestKind::SendTokenData => Some(CHANNEL_TOKEN_DATA_SENT),
            DeviceRequestKind::SendTx => Some(CHANNEL_TX_SENT),
            DeviceRequestKind::GetSignatures => Some(CHANNEL_SIGNATURES),
            DeviceRequestKind::Cancel => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFailure {
    pub message: String,
}

impl DeviceFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceEvent {
    /// Ok carries the uids the device refused.
    TokenDataSent(Result<Vec<String>, DeviceFailure>),
    TxSent(Result<(), DeviceFailure>),
    /// Ok carries one signature per input, in input order.
    Signatures(Result<Vec<Bytes>, DeviceFailure>),
}

impl DeviceEvent {
    pub fn channel(&self) -> &'static str {
        match self {
            DeviceEvent::TokenDataSent(_) => CHANNEL_TOKEN_DATA_SENT,
            DeviceEvent::TxSent(_) => CHANNEL_TX_SENT,
            DeviceEvent::Signatures(_) => CHANNEL_SIGNATURES,
        }
    }

    pub fn answers(&self) -> DeviceRequestKind {
        match self {
            DeviceEvent::TokenDataSent(_) => DeviceRequestKind::SendTokenData,
            DeviceEvent::TxSent(_) => DeviceRequestKind::SendTx,
            DeviceEvent::Signatures(_) => DeviceRequestKind::GetSignatures,
        }
    }

    /// Decodes the raw `{success, data | error}` reply seen on `channel`.
    pub fn from_reply(channel: &str, reply: DeviceReply) -> Result<Self, PortError> {
        if !reply.success {
            let failure = reply
                .error
                .unwrap_or_else(|| DeviceFailure::new("unknown device error"));
            return match channel {
                CHANNEL_TOKEN_DATA_SENT => Ok(DeviceEvent::TokenDataSent(Err(failure))),
                CHANNEL_TX_SENT => Ok(DeviceEvent::TxSent(Err(failure))),
                CHANNEL_SIGNATURES => Ok(DeviceEvent::Signatures(Err(failure))),
                other => Err(PortError::Validation(format!(
                    "unknown device channel: {other}"
                ))),
            };
        }

        match channel {
            CHANNEL_TOKEN_DATA_SENT => {
                let failed: Vec<String> = decode_data(reply.data, channel)?;
                Ok(DeviceEvent::TokenDataSent(Ok(failed)))
            }
            CHANNEL_TX_SENT => Ok(DeviceEvent::TxSent(Ok(()))),
            CHANNEL_SIGNATURES => {
                let signatures: Vec<Bytes> = decode_data(reply.data, channel)?;
                Ok(DeviceEvent::Signatures(Ok(signatures)))
            }
            other => Err(PortError::Validation(format!(
                "unknown device channel: {other}"
            ))),
        }
    }
}

fn decode_data<T: serde::de::DeserializeOwned>(
    data: Option<Value>,
    channel: &str,
) -> Result<T, PortError> {
    let data = data.ok_or_else(|| {
        PortError::Validation(format!("{channel} reply is missing its data field"))
    })?;
    serde_json::from_value(data)
        .map_err(|e| PortError::Validation(format!("{channel} reply data is malformed: {e}")))
}

/// Raw reply as the device transport delivers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReply {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<DeviceFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMessage {
    pub attempt: AttemptId,
    pub event: DeviceEvent,
}
