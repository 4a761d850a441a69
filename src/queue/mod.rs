//! Priority command queue.
//!
//! One queue feeds one device. Items dispatch strictly by priority rank and
//! FIFO within a rank; failed items are retried in place until their budget
//! runs out, and an emergency stop purges everything below emergency.

mod command_queue;
mod optimize;
mod priority;
mod queued;

pub use command_queue::CommandQueue;
pub use optimize::OptimizeReport;
pub use priority::Priority;
pub use queued::{CommandId, DispatchOutcome, FailureCause, QueuedCommand, Resolution};
