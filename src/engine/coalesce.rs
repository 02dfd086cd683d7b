// src/engine/coalesce.rs

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, trace};

/// Paths that changed since the last dispatched cycle.
///
/// Semantics:
/// - Each changed path is recorded once, in first-seen order, no matter how
///   many events the watcher delivers for it (editors often emit several
///   writes per save).
/// - Changes that arrive while a cycle is running land in the same batch and
///   are drained into the *next* cycle; they never interrupt the current one.
/// - `drain` empties the batch and hands back everything that was recorded,
///   so N events within one debounce window become one cycle.
#[derive(Debug, Default)]
pub struct ChangeBatch {
    paths: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Record a change. Returns `false` if the path was already pending.
    pub fn record(&mut self, path: PathBuf) -> bool {
        if self.seen.insert(path.clone()) {
            trace!(path = ?path, "recorded change");
            self.paths.push(path);
            true
        } else {
            trace!(path = ?path, "change already pending; coalesced");
            false
        }
    }

    /// Forget pending changes to any of `paths`.
    pub fn discard(&mut self, paths: &[PathBuf]) {
        for path in paths {
            if self.seen.remove(path) {
                self.paths.retain(|p| p != path);
                trace!(path = ?path, "discarded pending change");
            }
        }
    }

    /// Take every pending change, in first-seen order.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        self.seen.clear();
        let paths = std::mem::take(&mut self.paths);
        debug!(drained = paths.len(), "drained change batch");
        paths
    }
}
