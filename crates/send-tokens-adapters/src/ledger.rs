use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use semver::Version;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use send_tokens_core::{
    AttemptId, DeviceEvent, DeviceMessage, DevicePort, DeviceReply, DeviceRequest, PortError,
    DEVICE_CHANNELS,
};

use crate::emulator::LedgerEmulator;

/// Handle returned by `subscribe`. Giving it back to `unsubscribe` removes
/// the listener; it cannot be cloned, so a listener is removed exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceSubscription {
    id: u64,
    channels: Vec<&'static str>,
}

impl DeviceSubscription {
    pub fn channels(&self) -> &[&'static str] {
        &self.channels
    }
}

/// Receiving end of the device channel. The shell awaits it between
/// orchestrator calls.
#[derive(Debug)]
pub struct DeviceEvents {
    receiver: UnboundedReceiver<DeviceMessage>,
}

impl DeviceEvents {
    /// `Ok(None)` when nothing arrived within `timeout`.
    pub async fn next(&mut self, timeout: Duration) -> Result<Option<DeviceMessage>, PortError> {
        match tokio::time::timeout(timeout, self.receiver.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(PortError::Transport("device channel closed".to_owned())),
            Err(_) => Ok(None),
        }
    }

    pub fn try_next(&mut self) -> Option<DeviceMessage> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Debug)]
enum DeviceMode {
    Emulated(LedgerEmulator),
    External { firmware: Version },
}

#[derive(Debug)]
struct ChannelState {
    mode: DeviceMode,
    next_subscription: u64,
    listeners: HashMap<u64, Vec<&'static str>>,
    sender: UnboundedSender<DeviceMessage>,
    sent: Vec<(AttemptId, DeviceRequest)>,
}

impl ChannelState {
    fn is_listening(&self, channel: &str) -> bool {
        self.listeners
            .values()
            .any(|channels| channels.iter().any(|c| *c == channel))
    }

    fn route(&self, message: DeviceMessage) -> Result<bool, PortError> {
        let channel = message.event.channel();
        if !self.is_listening(channel) {
            tracing::debug!(attempt = %message.attempt, channel, "device event dropped: no listener");
            return Ok(false);
        }
        self.sender
            .send(message)
            .map_err(|_| PortError::Transport("device event receiver dropped".to_owned()))?;
        Ok(true)
    }
}

/// Named-channel bridge to the signing device. Requests go to the emulator
/// or to an outbox drained by an external transport; replies are routed to
/// the `DeviceEvents` receiver while someone listens on their channel.
#[derive(Debug, Clone)]
pub struct LedgerChannelAdapter {
    state: Arc<Mutex<ChannelState>>,
}

impl LedgerChannelAdapter {
    pub fn emulated(emulator: LedgerEmulator) -> (Self, DeviceEvents) {
        Self::with_mode(DeviceMode::Emulated(emulator))
    }

    pub fn external(firmware: Version) -> (Self, DeviceEvents) {
        Self::with_mode(DeviceMode::External { firmware })
    }

    fn with_mode(mode: DeviceMode) -> (Self, DeviceEvents) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let adapter = Self {
            state: Arc::new(Mutex::new(ChannelState {
                mode,
                next_subscription: 0,
                listeners: HashMap::new(),
                sender,
                sent: Vec::new(),
            })),
        };
        (adapter, DeviceEvents { receiver })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelState>, PortError> {
        self.state
            .lock()
            .map_err(|e| PortError::Transport(format!("device lock poisoned: {e}")))
    }

    /// Pushes a decoded event as if the device had emitted it. Returns whether
    /// a listener received it.
    pub fn deliver(&self, attempt: AttemptId, event: DeviceEvent) -> Result<bool, PortError> {
        self.lock()?.route(DeviceMessage { attempt, event })
    }

    /// Decodes a raw reply seen on `channel` and routes it.
    pub fn deliver_reply(
        &self,
        attempt: AttemptId,
        channel: &str,
        reply: DeviceReply,
    ) -> Result<bool, PortError> {
        let event = DeviceEvent::from_reply(channel, reply)?;
        self.deliver(attempt, event)
    }

    /// Every request sent so far, oldest first. Clears the outbox.
    pub fn drain_requests(&self) -> Result<Vec<(AttemptId, DeviceRequest)>, PortError> {
        Ok(std::mem::take(&mut self.lock()?.sent))
    }

    /// Transport reset: every listener is dropped, so outstanding
    /// subscription handles no longer resolve.
    pub fn disconnect(&self) -> Result<(), PortError> {
        let mut g = self.lock()?;
        let dropped = g.listeners.len();
        g.listeners.clear();
        tracing::warn!(dropped, "device channel reset");
        Ok(())
    }

    pub fn listener_count(&self) -> Result<usize, PortError> {
        Ok(self.lock()?.listeners.len())
    }

    pub fn cancelled_requests(&self) -> Result<usize, PortError> {
        Ok(match &self.lock()?.mode {
            DeviceMode::Emulated(emulator) => emulator.cancelled(),
            DeviceMode::External { .. } => 0,
        })
    }
}

impl DevicePort for LedgerChannelAdapter {
    type Subscription = DeviceSubscription;

    fn subscribe(&self, channels: &[&'static str]) -> Result<DeviceSubscription, PortError> {
        if let Some(unknown) = channels.iter().find(|c| !DEVICE_CHANNELS.contains(*c)) {
            return Err(PortError::Validation(format!(
                "unknown device channel: {unknown}"
            )));
        }
        let mut g = self.lock()?;
        g.next_subscription += 1;
        let id = g.next_subscription;
        g.listeners.insert(id, channels.to_vec());
        tracing::info!(subscription = id, ?channels, "device listeners registered");
        Ok(DeviceSubscription {
            id,
            channels: channels.to_vec(),
        })
    }

    fn unsubscribe(&self, subscription: DeviceSubscription) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.listeners.remove(&subscription.id).ok_or_else(|| {
            PortError::NotFound(format!("device subscription {}", subscription.id))
        })?;
        tracing::info!(subscription = subscription.id, "device listeners removed");
        Ok(())
    }

    fn send_request(&self, attempt: AttemptId, request: &DeviceRequest) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.sent.push((attempt, request.clone()));
        tracing::debug!(%attempt, kind = ?request.kind(), "device request sent");

        let reply = match &mut g.mode {
            DeviceMode::Emulated(emulator) => emulator.handle(request)?,
            DeviceMode::External { .. } => None,
        };
        if let Some((channel, reply)) = reply {
            let event = DeviceEvent::from_reply(channel, reply)?;
            g.route(DeviceMessage { attempt, event })?;
        }
        Ok(())
    }

    fn firmware_version(&self) -> Result<Version, PortError> {
        Ok(match &self.lock()?.mode {
            DeviceMode::Emulated(emulator) => emulator.firmware().clone(),
            DeviceMode::External { firmware } => firmware.clone(),
        })
    }
}
