// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pgfork contributors

//! Rollback journal: a LIFO stack of inverse actions registered during an
//! orchestration. Held in memory only — a crash mid-orchestration
//! leaves orphans that `detectOrphans`/`cleanup` reconciles later.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

type BoxedUndo = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Accumulates inverse actions during a multi-resource mutation and runs
/// them in reverse order on failure. Cleared (without running) on success.
#[derive(Default)]
pub struct RollbackJournal {
    actions: Vec<(&'static str, BoxedUndo)>,
}

impl RollbackJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inverse action, described by `label` for logging.
    pub fn push<F>(&mut self, label: &'static str, undo: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.actions.push((label, Box::pin(undo)));
    }

    /// Discard the journal on success; no undo actions run.
    pub fn commit(mut self) {
        self.actions.clear();
    }

    /// Run every registered undo in LIFO order. Each is best-effort: a
    /// panic-free future that logs its own failure rather than propagating
    /// one, so a single bad undo never masks the rest.
    pub async fn rollback(mut self) {
        while let Some((label, undo)) = self.actions.pop() {
            warn!(action = label, "rolling back");
            undo.await;
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn rollback_runs_in_lifo_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut journal = RollbackJournal::new();

        let o1 = order.clone();
        journal.push("first", async move { o1.lock().push(1) });
        let o2 = order.clone();
        journal.push("second", async move { o2.lock().push(2) });

        journal.rollback().await;
        assert_eq!(*order.lock(), vec![2, 1]);
    }

    #[tokio::test]
    async fn commit_skips_all_undos() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut journal = RollbackJournal::new();
        let o1 = order.clone();
        journal.push("first", async move { o1.lock().push(1) });
        journal.commit();
        assert!(order.lock().is_empty());
    }

    #[tokio::test]
    async fn one_failing_undo_does_not_block_the_rest() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut journal = RollbackJournal::new();
        journal.push("bad", async move {
            // Simulates a logged-and-swallowed failure.
            warn!("undo failed: simulated");
        });
        let o2 = order.clone();
        journal.push("good", async move { o2.lock().push(1) });
        journal.rollback().await;
        assert_eq!(*order.lock(), vec![1]);
    }
}
