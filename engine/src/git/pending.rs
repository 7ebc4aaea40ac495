//! In-flight invocations, keyed by identity.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// A settled result shared by every attached caller.
pub(crate) type Shared<T> = watch::Receiver<Option<T>>;

struct PendingEntry<T> {
    generation: u64,
    scope: PathBuf,
    rx: Shared<T>,
}

/// Outcome of [`PendingTable::join`].
pub(crate) enum Joined<T> {
    /// Another caller already started this invocation.
    Attached(Shared<T>),
    /// The caller must start it and settle through the returned sender.
    Started {
        rx: Shared<T>,
        settle: Settle<T>,
    },
}

/// Settles an invocation and removes its table entry.
///
/// The entry is removed even when this is dropped without settling (e.g. the
/// task panicked), in which case attached callers see the sender go away.
pub(crate) struct Settle<T> {
    tx: watch::Sender<Option<T>>,
    guard: PendingGuard<T>,
}

impl<T> Settle<T> {
    pub(crate) fn settle(self, value: T) {
        let Settle { tx, guard } = self;
        // Detach first so nobody attaches to an already settled entry
        drop(guard);
        tx.send_replace(Some(value));
    }
}

struct PendingGuard<T> {
    entries: Arc<DashMap<String, PendingEntry<T>>>,
    identity: String,
    generation: u64,
}

impl<T> Drop for PendingGuard<T> {
    fn drop(&mut self) {
        // A reset may have let a newer invocation reuse this identity
        self.entries
            .remove_if(&self.identity, |_, entry| entry.generation == self.generation);
    }
}

/// Deduplication table: at most one in-flight invocation per identity.
pub(crate) struct PendingTable<T> {
    entries: Arc<DashMap<String, PendingEntry<T>>>,
    generation: AtomicU64,
}

impl<T> PendingTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// `scope` is the working directory, used by [`clear_scope`](Self::clear_scope).
    pub(crate) fn join(&self, identity: &str, scope: &Path) -> Joined<T> {
        match self.entries.entry(identity.to_string()) {
            Entry::Occupied(entry) => Joined::Attached(entry.get().rx.clone()),
            Entry::Vacant(entry) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                entry.insert(PendingEntry {
                    generation,
                    scope: scope.to_path_buf(),
                    rx: rx.clone(),
                });
                Joined::Started {
                    rx,
                    settle: Settle {
                        tx,
                        guard: PendingGuard {
                            entries: Arc::clone(&self.entries),
                            identity: identity.to_string(),
                            generation,
                        },
                    },
                }
            }
        }
    }

    /// Detach every entry; running processes finish but new callers spawn.
    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    /// Detach entries running in or below `scope`.
    pub(crate) fn clear_scope(&self, scope: &Path) {
        self.entries.retain(|_, entry| !entry.scope.starts_with(scope));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Wait for a shared result. `None` if the producer vanished without one.
pub(crate) async fn wait_shared<T: Clone>(mut rx: Shared<T>) -> Option<T> {
    match rx.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_join_attaches() {
        let table: PendingTable<u32> = PendingTable::new();
        let Joined::Started { rx, settle } = table.join("git log", Path::new("/repo")) else {
            panic!("first join must start");
        };
        let Joined::Attached(other) = table.join("git log", Path::new("/repo")) else {
            panic!("second join must attach");
        };
        assert_eq!(table.len(), 1);

        settle.settle(7);
        assert_eq!(table.len(), 0);
        assert_eq!(wait_shared(rx).await, Some(7));
        assert_eq!(wait_shared(other).await, Some(7));
    }

    #[tokio::test]
    async fn test_dropped_settle_removes_entry() {
        let table: PendingTable<u32> = PendingTable::new();
        let Joined::Started { rx, settle } = table.join("x", Path::new("/repo")) else {
            panic!("first join must start");
        };
        drop(settle);
        assert_eq!(table.len(), 0);
        assert_eq!(wait_shared(rx).await, None);
    }

    #[tokio::test]
    async fn test_stale_guard_keeps_newer_entry() {
        let table: PendingTable<u32> = PendingTable::new();
        let Joined::Started { settle: old, .. } = table.join("x", Path::new("/repo")) else {
            panic!("first join must start");
        };
        table.clear();
        let Joined::Started { settle: new, .. } = table.join("x", Path::new("/repo")) else {
            panic!("join after clear must start");
        };

        old.settle(1);
        assert_eq!(table.len(), 1);
        new.settle(2);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_clear_scope() {
        let table: PendingTable<u32> = PendingTable::new();
        let _a = table.join("a$git status", Path::new("/repo/a"));
        let _b = table.join("b$git status", Path::new("/repo/b"));
        let _c = table.join("a/sub$git status", Path::new("/repo/a/sub"));
        table.clear_scope(Path::new("/repo/a"));
        assert_eq!(table.len(), 1);
    }
}
