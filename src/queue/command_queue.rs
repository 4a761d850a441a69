//! Priority command queue with retry and emergency preemption.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::QueueConfig;
use crate::script::Command;

use super::optimize::{optimize_pending, OptimizeReport};
use super::priority::Priority;
use super::queued::{CommandId, DispatchOutcome, QueuedCommand, Resolution};

/// Priority-ordered buffer feeding one device dispatcher.
///
/// Pending items are kept sorted by `(priority, sequence)`. At most one item
/// is current (in flight) at a time; it is not part of the pending order
/// until it is retried or re-queued.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    pending: VecDeque<QueuedCommand>,
    current: Option<QueuedCommand>,
    next_id: u64,
    next_sequence: u64,
    max_retries: u32,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl CommandQueue {
    /// Create an empty queue.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            next_id: 1,
            next_sequence: 0,
            max_retries: config.max_retries,
        }
    }

    /// Retry budget given to new non-emergency commands.
    #[inline]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Enqueue commands at one priority, preserving their order.
    pub fn enqueue<I>(&mut self, commands: I, priority: Priority) -> Vec<CommandId>
    where
        I: IntoIterator<Item = Command>,
    {
        commands
            .into_iter()
            .map(|command| self.push(command, priority))
            .collect()
    }

    /// Enqueue a single command.
    pub fn push(&mut self, command: Command, priority: Priority) -> CommandId {
        let id = CommandId(self.next_id);
        self.next_id += 1;
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let max_retries = match priority {
            Priority::Emergency => 0,
            _ => self.max_retries,
        };

        self.insert_sorted(QueuedCommand {
            id,
            command,
            priority,
            enqueued_at: Instant::now(),
            sequence,
            retry_count: 0,
            max_retries,
        });
        id
    }

    /// Move the highest-priority, oldest pending item to current.
    ///
    /// Calling this while a command is current is a caller error.
    pub fn dequeue(&mut self) -> Option<&QueuedCommand> {
        debug_assert!(
            self.current.is_none(),
            "dequeue while command {:?} is in flight",
            self.current.as_ref().map(|c| c.id)
        );
        let next = self.pending.pop_front()?;
        self.current = Some(next);
        self.current.as_ref()
    }

    /// Make a specific pending item current, skipping the normal order.
    pub fn take(&mut self, id: CommandId) -> Option<&QueuedCommand> {
        debug_assert!(self.current.is_none(), "take while a command is in flight");
        let index = self.pending.iter().position(|q| q.id == id)?;
        self.current = self.pending.remove(index);
        self.current.as_ref()
    }

    /// The in-flight command.
    #[inline]
    pub fn current(&self) -> Option<&QueuedCommand> {
        self.current.as_ref()
    }

    /// Finish the in-flight command.
    pub fn mark_current_complete(&mut self) -> Option<QueuedCommand> {
        self.current.take()
    }

    /// Fail the in-flight command: retry it if its budget allows, else drop it.
    pub fn mark_current_failed(&mut self) -> Option<Resolution> {
        let mut item = self.current.take()?;

        if item.can_retry() {
            item.retry_count += 1;
            let resolution = Resolution::Retrying {
                id: item.id,
                attempt: item.retry_count,
                max_retries: item.max_retries,
                priority: item.priority,
            };
            warn!(
                id = %item.id,
                attempt = item.retry_count,
                max_retries = item.max_retries,
                "command failed, retrying"
            );
            self.insert_sorted(item);
            Some(resolution)
        } else {
            warn!(id = %item.id, priority = %item.priority, "command failed, retries exhausted");
            Some(Resolution::Dropped(item))
        }
    }

    /// Apply a dispatch outcome to the in-flight command.
    ///
    /// Outcomes for any other id are stale and ignored.
    pub fn resolve(&mut self, outcome: &DispatchOutcome) -> Option<Resolution> {
        if self.current.as_ref().map(|c| c.id) != Some(outcome.id()) {
            debug!(id = %outcome.id(), "ignoring stale dispatch outcome");
            return None;
        }

        match outcome {
            DispatchOutcome::Completed { .. } => {
                self.mark_current_complete().map(Resolution::Completed)
            }
            DispatchOutcome::Failed { .. } => self.mark_current_failed(),
        }
    }

    /// Put the in-flight command back without counting a retry.
    pub fn requeue_current(&mut self) -> Option<CommandId> {
        let item = self.current.take()?;
        let id = item.id;
        self.insert_sorted(item);
        Some(id)
    }

    /// Forget the in-flight command.
    pub fn abandon_current(&mut self) -> Option<QueuedCommand> {
        self.current.take()
    }

    /// Drop every pending non-emergency item and enqueue `STOP` at emergency.
    ///
    /// The in-flight command is not touched.
    pub fn insert_emergency_stop(&mut self) -> CommandId {
        let before = self.pending.len();
        self.pending.retain(|q| q.priority == Priority::Emergency);
        let dropped = before - self.pending.len();

        let id = self.push(Command::Stop { line: 0 }, Priority::Emergency);
        warn!(%id, dropped, "emergency stop queued");
        id
    }

    /// Remove every pending item; returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        removed
    }

    /// Merge, de-duplicate and re-sort pending items.
    pub fn optimize(&mut self) -> OptimizeReport {
        optimize_pending(&mut self.pending)
    }

    /// Number of pending items (the in-flight command is not counted).
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending items in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.pending.iter()
    }

    fn insert_sorted(&mut self, item: QueuedCommand) {
        let key = item.key();
        let index = self.pending.partition_point(|q| q.key() <= key);
        self.pending.insert(index, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DeviceError, TimeoutError};
    use crate::motion::Axis;
    use crate::queue::FailureCause;
    use crate::script::MoveCommand;

    fn mv(axis: Axis, target: i32) -> Command {
        Command::Move(MoveCommand::single(axis, target, 1))
    }

    #[test]
    fn test_emergency_jumps_ahead() {
        let mut queue = CommandQueue::default();
        queue.enqueue(vec![mv(Axis::X, 1), mv(Axis::X, 2), mv(Axis::X, 3)], Priority::Normal);
        let stop = queue.push(Command::Stop { line: 0 }, Priority::Emergency);

        assert_eq!(queue.dequeue().unwrap().id, stop);
    }

    #[test]
    fn test_fifo_within_priority() {
        let mut queue = CommandQueue::default();
        let ids = queue.enqueue(vec![mv(Axis::X, 1), mv(Axis::Y, 2)], Priority::High);
        queue.push(mv(Axis::Z, 3), Priority::Low);

        assert_eq!(queue.dequeue().unwrap().id, ids[0]);
        queue.mark_current_complete();
        assert_eq!(queue.dequeue().unwrap().id, ids[1]);
    }

    #[test]
    fn test_retry_keeps_position() {
        let mut queue = CommandQueue::default();
        let ids = queue.enqueue(vec![mv(Axis::X, 1), mv(Axis::Y, 2)], Priority::Normal);

        queue.dequeue();
        let resolution = queue.mark_current_failed().unwrap();
        assert!(matches!(resolution, Resolution::Retrying { attempt: 1, .. }));

        // Retried item still precedes the later one
        let next = queue.dequeue().unwrap();
        assert_eq!(next.id, ids[0]);
        assert_eq!(next.retry_count, 1);
    }

    #[test]
    fn test_retries_exhausted() {
        let mut queue = CommandQueue::new(QueueConfig { max_retries: 2 });
        queue.push(mv(Axis::X, 1), Priority::Normal);

        for attempt in 1..=2 {
            queue.dequeue();
            assert!(matches!(
                queue.mark_current_failed(),
                Some(Resolution::Retrying { attempt: a, .. }) if a == attempt
            ));
        }
        queue.dequeue();
        match queue.mark_current_failed() {
            Some(Resolution::Dropped(item)) => assert_eq!(item.retry_count, 2),
            other => panic!("expected drop, got {:?}", other),
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_emergency_never_retried() {
        let mut queue = CommandQueue::default();
        queue.push(Command::Stop { line: 0 }, Priority::Emergency);
        queue.dequeue();
        assert!(matches!(queue.mark_current_failed(), Some(Resolution::Dropped(_))));
    }

    #[test]
    fn test_insert_emergency_stop() {
        let mut queue = CommandQueue::default();
        queue.enqueue(vec![mv(Axis::X, 1), mv(Axis::Y, 2)], Priority::Normal);
        queue.push(mv(Axis::Z, 3), Priority::High);
        queue.dequeue();

        let stop = queue.insert_emergency_stop();
        assert_eq!(queue.len(), 1);
        let item = queue.iter().next().unwrap();
        assert_eq!(item.id, stop);
        assert_eq!(item.priority, Priority::Emergency);
        assert_eq!(item.command, Command::Stop { line: 0 });
        // In-flight command untouched
        assert!(queue.current().is_some());
    }

    #[test]
    fn test_resolve_ignores_stale_outcome() {
        let mut queue = CommandQueue::default();
        let ids = queue.enqueue(vec![mv(Axis::X, 1), mv(Axis::Y, 1)], Priority::Normal);
        queue.dequeue();

        assert!(queue.resolve(&DispatchOutcome::Completed { id: ids[1] }).is_none());
        assert!(queue.current().is_some());

        let failed = DispatchOutcome::Failed {
            id: ids[0],
            cause: FailureCause::Device(DeviceError {
                message: "stall".into(),
                code: None,
            }),
        };
        assert!(matches!(queue.resolve(&failed), Some(Resolution::Retrying { .. })));

        queue.dequeue();
        let timeout = DispatchOutcome::Failed {
            id: ids[0],
            cause: FailureCause::Timeout(TimeoutError {
                command: ids[0].0,
                timeout_ms: 10,
            }),
        };
        assert!(matches!(queue.resolve(&timeout), Some(Resolution::Retrying { attempt: 2, .. })));
    }

    #[test]
    fn test_requeue_does_not_count_retry() {
        let mut queue = CommandQueue::default();
        let id = queue.push(mv(Axis::X, 1), Priority::Normal);
        queue.dequeue();

        assert_eq!(queue.requeue_current(), Some(id));
        assert_eq!(queue.dequeue().unwrap().retry_count, 0);
    }

    #[test]
    fn test_take_specific_item() {
        let mut queue = CommandQueue::default();
        queue.push(mv(Axis::X, 1), Priority::Emergency);
        let stop = queue.push(Command::Stop { line: 0 }, Priority::Emergency);

        assert_eq!(queue.take(stop).unwrap().id, stop);
        assert_eq!(queue.len(), 1);

        queue.abandon_current();
        assert!(queue.take(CommandId(999)).is_none());
        assert!(queue.current().is_none());
    }
}
