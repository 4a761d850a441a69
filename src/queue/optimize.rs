//! Periodic queue optimization.

use std::collections::VecDeque;

use tracing::debug;

use crate::motion::MotionProfile;
use crate::script::{Command, GroupCommand, MoveCommand};

use super::queued::{CommandId, QueuedCommand};

/// What one [`optimize`](super::CommandQueue::optimize) call changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizeReport {
    /// Move pairs folded into a group.
    pub merged: usize,
    /// Adjacent duplicates removed.
    pub duplicates_removed: usize,
    /// Ids that no longer exist because they were merged or removed.
    pub absorbed: Vec<CommandId>,
}

impl OptimizeReport {
    /// True when the queue was left unchanged.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.merged == 0 && self.duplicates_removed == 0
    }
}

/// Sort, then merge and de-duplicate until nothing changes.
pub(super) fn optimize_pending(pending: &mut VecDeque<QueuedCommand>) -> OptimizeReport {
    pending
        .make_contiguous()
        .sort_by_key(QueuedCommand::key);

    let mut report = OptimizeReport::default();
    loop {
        let merged = merge_pass(pending, &mut report.absorbed);
        let removed = dedupe_pass(pending, &mut report.absorbed);
        report.merged += merged;
        report.duplicates_removed += removed;
        if merged == 0 && removed == 0 {
            break;
        }
    }

    if !report.is_noop() {
        debug!(
            merged = report.merged,
            duplicates = report.duplicates_removed,
            pending = pending.len(),
            "queue optimized"
        );
    }
    report
}

/// Fold adjacent same-priority simple moves on disjoint axes into a group.
fn merge_pass(pending: &mut VecDeque<QueuedCommand>, absorbed: &mut Vec<CommandId>) -> usize {
    let mut merged = 0;
    let mut out: VecDeque<QueuedCommand> = VecDeque::with_capacity(pending.len());

    for item in pending.drain(..) {
        if let Some(last) = out.back_mut() {
            if last.priority == item.priority {
                if let Some(group) = merge_moves(&last.command, &item.command) {
                    last.command = Command::Group(group);
                    last.retry_count = last.retry_count.max(item.retry_count);
                    absorbed.push(item.id);
                    merged += 1;
                    continue;
                }
            }
        }
        out.push_back(item);
    }

    *pending = out;
    merged
}

fn merge_moves(first: &Command, second: &Command) -> Option<GroupCommand> {
    let (a, b) = (first.as_simple_move()?, second.as_simple_move()?);
    if !a.targets.is_disjoint(&b.targets) {
        return None;
    }

    let mut targets = a.targets.clone();
    targets.extend_from(&b.targets);

    let mut group = GroupCommand::new(targets, false, a.line);
    group.profile = longer_profile(a, b);
    Some(group)
}

/// Profile of the slower move; both run concurrently once grouped.
fn longer_profile(a: &MoveCommand, b: &MoveCommand) -> Option<MotionProfile> {
    match (a.profile, b.profile) {
        (Some(pa), Some(pb)) => Some(if pb.duration > pa.duration { pb } else { pa }),
        (pa, pb) => pa.or(pb),
    }
}

/// Remove a command that repeats its predecessor when repeating has no effect.
fn dedupe_pass(pending: &mut VecDeque<QueuedCommand>, absorbed: &mut Vec<CommandId>) -> usize {
    let before = pending.len();
    let mut out: VecDeque<QueuedCommand> = VecDeque::with_capacity(before);

    for item in pending.drain(..) {
        let duplicate = out.back().map_or(false, |last| {
            last.priority == item.priority
                && item.command.is_idempotent()
                && last.command.structurally_eq(&item.command)
        });
        if duplicate {
            absorbed.push(item.id);
        } else {
            out.push_back(item);
        }
    }

    *pending = out;
    before - pending.len()
}

#[cfg(test)]
mod tests {
    use crate::motion::Axis;
    use crate::queue::{CommandQueue, Priority};
    use crate::script::{Command, MoveCommand};

    fn mv(axis: Axis, target: i32) -> Command {
        Command::Move(MoveCommand::single(axis, target, 1))
    }

    #[test]
    fn test_merges_disjoint_pair() {
        let mut queue = CommandQueue::default();
        let ids = queue.enqueue(vec![mv(Axis::X, 10), mv(Axis::Y, 20), mv(Axis::X, 30)], Priority::Normal);

        let report = queue.optimize();
        assert_eq!(report.merged, 1);
        assert_eq!(report.absorbed, vec![ids[1]]);
        assert_eq!(queue.len(), 2);

        let first = queue.iter().next().unwrap();
        assert_eq!(first.id, ids[0]);
        match &first.command {
            Command::Group(g) => {
                assert!(!g.sync);
                assert_eq!(g.targets.len(), 2);
            }
            other => panic!("expected group, got {:?}", other),
        }
    }

    #[test]
    fn test_does_not_merge_across_priorities() {
        let mut queue = CommandQueue::default();
        queue.push(mv(Axis::X, 10), Priority::High);
        queue.push(mv(Axis::Y, 20), Priority::Normal);

        assert!(queue.optimize().is_noop());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_removes_adjacent_duplicates() {
        let mut queue = CommandQueue::default();
        queue.enqueue(
            vec![
                Command::Home { axes: vec![], line: 1 },
                Command::Home { axes: vec![], line: 2 },
                Command::Delay { ms: 100, line: 3 },
                Command::Delay { ms: 100, line: 4 },
            ],
            Priority::Normal,
        );

        let report = queue.optimize();
        assert_eq!(report.duplicates_removed, 1);
        // Repeated delays are meaningful
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let mut queue = CommandQueue::default();
        queue.enqueue(
            vec![
                mv(Axis::X, 1),
                mv(Axis::X, 1),
                mv(Axis::Y, 2),
                mv(Axis::Z, 3),
                mv(Axis::T, 4),
                Command::Sync { line: 1 },
                Command::Sync { line: 2 },
            ],
            Priority::Normal,
        );

        queue.optimize();
        let snapshot: Vec<_> = queue.iter().map(|q| (q.id, q.command.clone())).collect();
        assert!(queue.optimize().is_noop());
        let again: Vec<_> = queue.iter().map(|q| (q.id, q.command.clone())).collect();
        assert_eq!(snapshot, again);
    }
}
