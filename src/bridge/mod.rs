//! Protocol bridge between the command queue and a device.
//!
//! A [`ProtocolBridge`] owns one [`CommandQueue`](crate::queue::CommandQueue)
//! and one [`DeviceLink`]. It dispatches a single command at a time, waits for
//! the device to report `IDLE`, and arms a watchdog for every dispatch.
//! Observers follow along through a broadcast channel of [`BridgeEvent`]s.
//!
//! [`run`] drives a bridge from link events, controller requests, the
//! watchdog and the periodic queue optimizer on one task.

mod control;
mod dispatcher;
mod event;
mod link;
mod runner;
mod serialize;
mod state;
#[cfg(feature = "tcp")]
mod tcp;
mod wire;

pub use dispatcher::ProtocolBridge;
pub use control::ControlVerb;
pub use event::BridgeEvent;
pub use link::{ChannelLink, DeviceLink, LinkEvent};
pub use runner::{run, BridgeRequest};
pub use serialize::{CommandSerializer, SerializedCommand, SerializedStep};
pub use state::{ConnectionState, DeviceState, StatusSnapshot};
#[cfg(feature = "tcp")]
pub use tcp::{spawn_tcp_link, TcpLink};
pub use wire::{DeviceMessage, DeviceStatus, OutboundMessage, WireCommand};
