//! Queue entries and dispatch outcomes.

use core::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DeviceError, TimeoutError};
use crate::script::Command;

use super::priority::Priority;

/// Identifier assigned at enqueue time, unique per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(pub u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A command waiting in, or dispatched from, a [`CommandQueue`](super::CommandQueue).
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    /// Queue-assigned id.
    pub id: CommandId,
    /// The command itself.
    pub command: Command,
    /// Ordering class; kept across retries.
    pub priority: Priority,
    /// Wall-clock enqueue time.
    pub enqueued_at: Instant,
    /// Monotonic tie-breaker within a priority; kept across retries.
    pub sequence: u64,
    /// Failures so far.
    pub retry_count: u32,
    /// Failures tolerated before the command is dropped.
    pub max_retries: u32,
}

impl QueuedCommand {
    /// Sort key: priority rank, then enqueue order.
    #[inline]
    pub fn key(&self) -> (Priority, u64) {
        (self.priority, self.sequence)
    }

    /// Whether another failure would still be retried.
    #[inline]
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Why a dispatched command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureCause {
    /// Device sent an error message.
    #[error("device error: {0}")]
    Device(DeviceError),
    /// Watchdog fired.
    #[error(transparent)]
    Timeout(TimeoutError),
}

/// Result of one dispatch, as observed by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Device reported idle after the command.
    Completed {
        /// Dispatched command.
        id: CommandId,
    },
    /// Device error or timeout.
    Failed {
        /// Dispatched command.
        id: CommandId,
        /// What went wrong.
        cause: FailureCause,
    },
}

impl DispatchOutcome {
    /// Command the outcome refers to.
    pub fn id(&self) -> CommandId {
        match self {
            DispatchOutcome::Completed { id } | DispatchOutcome::Failed { id, .. } => *id,
        }
    }
}

/// What the queue did with the current command.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Finished and removed.
    Completed(QueuedCommand),
    /// Failed and re-inserted at its original position in the order.
    Retrying {
        /// Command id.
        id: CommandId,
        /// Retry number, starting at 1.
        attempt: u32,
        /// Retry budget.
        max_retries: u32,
        /// Priority it was re-inserted with.
        priority: Priority,
    },
    /// Failed with no retries left; removed.
    Dropped(QueuedCommand),
}
