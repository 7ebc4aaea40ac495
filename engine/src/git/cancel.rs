//! Cancellation handles for git invocations.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// A cancellation token with a stable id.
///
/// The id is part of an invocation's identity, so callers that pass distinct
/// handles never share a process. Clones share both the id and the token.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    id: u64,
    token: CancellationToken,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        }
    }

    /// A handle that is cancelled whenever `self` is, with its own id.
    pub fn child(&self) -> Self {
        Self {
            id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            token: self.token.child_token(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Resolves once the handle is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = CancellationHandle::new();
        let b = CancellationHandle::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = CancellationHandle::new();
        let child = parent.child();
        assert_ne!(parent.id(), child.id());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let handle = CancellationHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        handle.cancel();
        task.await.unwrap();
    }
}
