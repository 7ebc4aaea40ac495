//! Priority queue bounding how many git processes run at once.
//!
//! Entries wait in one FIFO lane per [`Priority`]. Whenever a slot frees up
//! the highest non-empty lane is served first. With a background skip limit
//! configured, a waiting background entry is let through after that many
//! consecutive grants went to higher lanes.

use super::invocation::Priority;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Decides the priority class of a command that has no explicit override.
pub trait PriorityClassifier: Send + Sync {
    fn classify(&self, args: &[String]) -> Priority;
}

/// Read-only history and listing commands run in the background lane; every
/// other command is normal. Interactive is reserved for explicit overrides.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPriorityClassifier;

const BACKGROUND_COMMANDS: &[&str] = &[
    "log",
    "status",
    "rev-list",
    "shortlog",
    "for-each-ref",
    "reflog",
    "ls-files",
    "ls-tree",
];

impl PriorityClassifier for DefaultPriorityClassifier {
    fn classify(&self, args: &[String]) -> Priority {
        let command = args.iter().find(|arg| !arg.starts_with('-'));
        match command {
            Some(command) if BACKGROUND_COMMANDS.contains(&command.as_str()) => {
                Priority::Background
            }
            _ => Priority::Normal,
        }
    }
}

struct Waiter {
    tx: oneshot::Sender<Permit>,
}

struct QueueState {
    running: usize,
    lanes: [VecDeque<Waiter>; 3],
    /// Consecutive grants to higher lanes while background work waited.
    skipped_background: usize,
}

impl QueueState {
    fn next_waiter(&mut self, skip_limit: Option<usize>) -> Option<Waiter> {
        let background = Priority::Background.index();

        if let Some(limit) = skip_limit {
            if !self.lanes[background].is_empty() && self.skipped_background >= limit {
                self.skipped_background = 0;
                return self.lanes[background].pop_front();
            }
        }

        for priority in Priority::ALL {
            let lane = priority.index();
            if let Some(waiter) = self.lanes[lane].pop_front() {
                if lane == background {
                    self.skipped_background = 0;
                } else if !self.lanes[background].is_empty() {
                    self.skipped_background += 1;
                }
                return Some(waiter);
            }
        }
        None
    }
}

struct QueueShared {
    state: Mutex<QueueState>,
    max_concurrent: usize,
    background_skip_limit: Option<usize>,
}

impl QueueShared {
    /// Grant slots to waiters while capacity allows.
    ///
    /// Permits that bounce off a vanished waiter are returned to the caller so
    /// they can be dropped after the lock is released.
    fn pump(self: &Arc<Self>, state: &mut QueueState, bounced: &mut Vec<Permit>) {
        while state.running < self.max_concurrent {
            let Some(waiter) = state.next_waiter(self.background_skip_limit) else {
                break;
            };
            if waiter.tx.is_closed() {
                continue;
            }
            state.running += 1;
            if let Err(permit) = waiter.tx.send(Permit {
                shared: Arc::clone(self),
            }) {
                bounced.push(permit);
            }
        }
    }

    fn release(self: &Arc<Self>) {
        let mut bounced = Vec::new();
        {
            let mut state = self.state.lock();
            state.running = state.running.saturating_sub(1);
            self.pump(&mut state, &mut bounced);
        }
        drop(bounced);
    }
}

/// Bounded, priority-ordered admission for git processes.
#[derive(Clone)]
pub struct CommandQueue {
    shared: Arc<QueueShared>,
}

impl CommandQueue {
    /// A zero `max_concurrent` is treated as one.
    pub fn new(max_concurrent: usize, background_skip_limit: Option<usize>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState {
                    running: 0,
                    lanes: Default::default(),
                    skipped_background: 0,
                }),
                max_concurrent: max_concurrent.max(1),
                background_skip_limit,
            }),
        }
    }

    /// Join the queue. Position is fixed at call time, so submission order is
    /// preserved even if tickets are awaited out of order.
    pub fn enqueue(&self, priority: Priority) -> Ticket {
        let (tx, rx) = oneshot::channel();
        let mut bounced = Vec::new();
        {
            let mut state = self.shared.state.lock();
            state.lanes[priority.index()].push_back(Waiter { tx });
            self.shared.pump(&mut state, &mut bounced);
        }
        drop(bounced);
        Ticket { rx }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.shared.state.lock();
        QueueStats {
            running: state.running,
            waiting_interactive: state.lanes[Priority::Interactive.index()].len(),
            waiting_normal: state.lanes[Priority::Normal.index()].len(),
            waiting_background: state.lanes[Priority::Background.index()].len(),
        }
    }
}

/// A place in the queue.
pub struct Ticket {
    rx: oneshot::Receiver<Permit>,
}

impl Ticket {
    /// Wait for a slot. `None` if the queue went away first.
    ///
    /// Dropping the ticket (or this future) gives up the place.
    pub async fn wait(self) -> Option<Permit> {
        self.rx.await.ok()
    }
}

/// A running slot, released on drop.
pub struct Permit {
    shared: Arc<QueueShared>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.shared.release();
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

/// Queue occupancy snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub running: usize,
    pub waiting_interactive: usize,
    pub waiting_normal: usize,
    pub waiting_background: usize,
}

impl QueueStats {
    pub fn waiting(&self) -> usize {
        self.waiting_interactive + self.waiting_normal + self.waiting_background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Hold one slot, submit `order`, release, and record grant order.
    async fn grant_order(queue: CommandQueue, order: &[(Priority, &'static str)]) -> Vec<&'static str> {
        let blocker = queue.enqueue(Priority::Normal).wait().await.unwrap();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for &(priority, label) in order {
            let ticket = queue.enqueue(priority);
            let log = Arc::clone(&log);
            handles.push(tokio::spawn(async move {
                let permit = ticket.wait().await.unwrap();
                log.lock().push(label);
                drop(permit);
            }));
        }

        drop(blocker);
        for handle in handles {
            handle.await.unwrap();
        }
        let result = log.lock().clone();
        result
    }

    #[test]
    fn test_default_classifier() {
        let classifier = DefaultPriorityClassifier;
        assert_eq!(classifier.classify(&args(&["log", "-n1"])), Priority::Background);
        assert_eq!(
            classifier.classify(&args(&["--no-pager", "status"])),
            Priority::Background
        );
        assert_eq!(classifier.classify(&args(&["show", "HEAD"])), Priority::Normal);
        assert_eq!(classifier.classify(&args(&["push"])), Priority::Normal);
        assert_eq!(classifier.classify(&[]), Priority::Normal);
    }

    #[tokio::test]
    async fn test_strict_priority_and_fifo_within_class() {
        let queue = CommandQueue::new(1, None);
        let order = grant_order(
            queue,
            &[
                (Priority::Background, "bg1"),
                (Priority::Normal, "n1"),
                (Priority::Interactive, "i1"),
                (Priority::Background, "bg2"),
                (Priority::Interactive, "i2"),
                (Priority::Normal, "n2"),
            ],
        )
        .await;
        assert_eq!(order, vec!["i1", "i2", "n1", "n2", "bg1", "bg2"]);
    }

    #[tokio::test]
    async fn test_background_skip_limit() {
        let queue = CommandQueue::new(1, Some(2));
        let order = grant_order(
            queue,
            &[
                (Priority::Background, "bg1"),
                (Priority::Normal, "n1"),
                (Priority::Normal, "n2"),
                (Priority::Normal, "n3"),
                (Priority::Normal, "n4"),
            ],
        )
        .await;
        assert_eq!(order, vec!["n1", "n2", "bg1", "n3", "n4"]);
    }

    #[tokio::test]
    async fn test_dropped_ticket_is_skipped() {
        let queue = CommandQueue::new(1, None);
        let blocker = queue.enqueue(Priority::Normal).wait().await.unwrap();
        let abandoned = queue.enqueue(Priority::Interactive);
        let kept = queue.enqueue(Priority::Background);
        drop(abandoned);
        drop(blocker);
        let permit = kept.wait().await;
        assert!(permit.is_some());
        assert_eq!(queue.stats().running, 1);
        drop(permit);
        assert_eq!(queue.stats().running, 0);
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let queue = CommandQueue::new(2, None);
        let a = queue.enqueue(Priority::Normal).wait().await.unwrap();
        let _b = queue.enqueue(Priority::Normal).wait().await.unwrap();
        let _c = queue.enqueue(Priority::Normal);
        let stats = queue.stats();
        assert_eq!(stats.running, 2);
        assert_eq!(stats.waiting_normal, 1);
        drop(a);
        let stats = queue.stats();
        assert_eq!(stats.running, 2);
        assert_eq!(stats.waiting(), 0);
    }
}
