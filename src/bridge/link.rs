//! Device link abstraction.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DispatchError;

use super::wire::{DeviceMessage, OutboundMessage};

/// Outbound half of a device connection.
///
/// Inbound traffic arrives separately as [`LinkEvent`]s so that the runner
/// can select over it together with control requests and timers.
#[async_trait]
pub trait DeviceLink: Send {
    /// Send one message.
    ///
    /// # Errors
    ///
    /// [`DispatchError::NotConnected`] when no connection exists,
    /// [`DispatchError::Link`] on transport failure.
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), DispatchError>;
}

/// Inbound link traffic.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Connection established.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Message from the device.
    Message(DeviceMessage),
}

/// In-process link backed by an unbounded channel.
///
/// The receiving side plays the device; drop it to simulate a broken link.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelLink {
    /// Create a link and the receiver that observes what it sends.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl DeviceLink for ChannelLink {
    async fn send(&mut self, message: &OutboundMessage) -> Result<(), DispatchError> {
        self.tx
            .send(message.clone())
            .map_err(|_| DispatchError::Link("device channel closed".into()))
    }
}
