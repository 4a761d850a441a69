//! Property tests over the compile / plan / queue pipeline.

use proptest::prelude::*;

use palletizer_motion::config::QueueConfig;
use palletizer_motion::queue::Resolution;
use palletizer_motion::script::render;
use palletizer_motion::{compile, plan, Command, CommandQueue, Priority};

fn axis() -> impl Strategy<Value = char> {
    prop::sample::select(vec!['X', 'Y', 'Z', 'T', 'G'])
}

fn priority() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

fn statement() -> impl Strategy<Value = String> {
    prop_oneof![
        (axis(), -5000i32..5000).prop_map(|(a, p)| format!("{}({})", a, p)),
        (axis(), -5000i32..5000, 1u32..3000).prop_map(|(a, p, s)| format!("{}({},s{})", a, p, s)),
        (axis(), 0i32..100, 0u32..500).prop_map(|(a, p, d)| format!("{}({},d{})", a, p, d)),
        (-900i32..900, -900i32..900).prop_map(|(x, y)| format!("X{} Y{}", x, y)),
        (0i32..2000, 0i32..2000).prop_map(|(z, t)| format!("GROUP(Z({}), T({}))", z, t)),
        (1u32..1000).prop_map(|ms| format!("DELAY({})", ms)),
        (100u32..3000).prop_map(|v| format!("SPEED({})", v)),
        Just("SYNC".to_string()),
        Just("HOME".to_string()),
    ]
}

fn script() -> impl Strategy<Value = String> {
    prop::collection::vec(statement(), 1..24).prop_map(|lines| lines.join("\n"))
}

#[derive(Debug, Clone)]
enum QueueOp {
    Enqueue(Priority),
    Dispatch,
    Complete,
    Fail,
}

fn queue_op() -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        priority().prop_map(QueueOp::Enqueue),
        Just(QueueOp::Dispatch),
        Just(QueueOp::Complete),
        Just(QueueOp::Fail),
    ]
}

proptest! {
    #[test]
    fn rendered_scripts_recompile(source in script()) {
        let first = compile(&source).unwrap().commands;
        let second = compile(&render(&first)).unwrap().commands;

        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            prop_assert!(a.structurally_eq(b), "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn planning_is_idempotent(source in script()) {
        let once = plan(&compile(&source).unwrap().commands);
        let twice = plan(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn higher_priority_always_dequeues_first(ops in prop::collection::vec(queue_op(), 1..64)) {
        let mut queue = CommandQueue::default();
        for op in ops {
            match op {
                QueueOp::Enqueue(p) => {
                    queue.push(Command::Delay { ms: 1, line: 0 }, p);
                }
                _ => {
                    let best = queue.iter().map(|q| q.priority).min();
                    if let Some((priority, id)) = queue.dequeue().map(|item| (item.priority, item.id)) {
                        prop_assert_eq!(Some(priority), best);
                        prop_assert!(queue.iter().all(|q| q.priority > priority
                            || (q.priority == priority && q.id > id)));
                    }
                    queue.mark_current_complete();
                }
            }
        }
    }

    #[test]
    fn retries_never_exceed_budget(
        max_retries in 0u32..5,
        ops in prop::collection::vec(queue_op(), 1..96),
    ) {
        let mut queue = CommandQueue::new(QueueConfig { max_retries });
        for op in ops {
            match op {
                QueueOp::Enqueue(p) => {
                    queue.push(Command::Home { axes: vec![], line: 0 }, p);
                }
                QueueOp::Dispatch => {
                    if queue.current().is_none() {
                        queue.dequeue();
                    }
                }
                QueueOp::Complete => {
                    queue.mark_current_complete();
                }
                QueueOp::Fail => match queue.mark_current_failed() {
                    Some(Resolution::Retrying { attempt, priority, .. }) => {
                        prop_assert!(attempt <= max_retries);
                        prop_assert_ne!(priority, Priority::Emergency);
                    }
                    Some(Resolution::Dropped(item)) => {
                        prop_assert_eq!(item.retry_count, item.max_retries);
                    }
                    _ => {}
                },
            }

            for item in queue.iter().chain(queue.current()) {
                prop_assert!(item.retry_count <= item.max_retries);
                if item.priority == Priority::Emergency {
                    prop_assert_eq!(item.retry_count, 0);
                }
            }
        }
    }

    #[test]
    fn emergency_stop_leaves_one_item(ops in prop::collection::vec(priority(), 0..32)) {
        let mut queue = CommandQueue::default();
        for p in ops.into_iter().filter(|p| *p != Priority::Emergency) {
            queue.push(Command::Sync { line: 0 }, p);
        }
        queue.insert_emergency_stop();

        prop_assert_eq!(queue.len(), 1);
        let item = queue.iter().next().unwrap();
        prop_assert_eq!(item.priority, Priority::Emergency);
        prop_assert_eq!(&item.command, &Command::Stop { line: 0 });
    }
}
