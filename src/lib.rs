//! # palletizer-motion
//!
//! Motion scripting, planning and dispatch for multi-axis palletizing robots.
//!
//! ## Features
//!
//! - **MSL compiler**: Function definitions, unrolled loops and two surface
//!   syntaxes compiled into a flat command list with line-accurate errors
//! - **Trapezoidal planner**: Speed and acceleration resolution, synchronised
//!   group timing and post-`SYNC` move folding
//! - **Priority queue**: Emergency/high/normal/low ordering with retries and
//!   periodic optimization
//! - **Protocol bridge**: One command in flight per device, watchdog timeouts,
//!   automatic re-queue on disconnect and an observer event stream
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use palletizer_motion::{bridge, ProtocolBridge, SystemConfig};
//!
//! let config: SystemConfig = palletizer_motion::load_config("palletizer.toml")?;
//!
//! let (link, link_events, _supervisor) =
//!     bridge::spawn_tcp_link(config.bridge.address.clone(), config.bridge.reconnect_interval());
//! let bridge = ProtocolBridge::new(link, &config);
//!
//! let (requests, rx) = tokio::sync::mpsc::channel(16);
//! tokio::spawn(bridge::run(bridge, link_events, rx));
//! ```
//!
//! ## Feature Flags
//!
//! - `tcp` (default): TCP device link with automatic reconnection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

// Core modules
pub mod bridge;
pub mod config;
pub mod error;
pub mod motion;
pub mod queue;
pub mod script;

// Re-exports for ergonomic API
pub use bridge::{BridgeEvent, ControlVerb, ProtocolBridge, StatusSnapshot};
pub use config::{load_config, parse_config, validate_config, SystemConfig};
pub use error::{Error, Result};
pub use motion::{plan, Axis, MotionProfile, Planner, Position};
pub use queue::{CommandId, CommandQueue, Priority};
pub use script::{compile, Command, Compiler};
