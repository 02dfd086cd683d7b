// src/watch/watcher.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::engine::DispatchEvent;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchProfile;

/// Owns the `notify` watcher; events stop when it is dropped.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WatcherHandle")
    }
}

/// Whether a notify event can change what a binding sees.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Translate one changed path into a dispatcher event, if any binding
/// cares about it.
pub fn to_dispatch_event(
    root: &Path,
    path: &Path,
    profiles: &[WatchProfile],
) -> Option<DispatchEvent> {
    let rel = relative_str(root, path)?;
    if !profiles.iter().any(|p| p.matches(&rel)) {
        trace!(path = %rel, "change matches no binding; ignored");
        return None;
    }
    Some(DispatchEvent::FileChanged(PathBuf::from(rel)))
}

/// Spawn a filesystem watcher that observes `root` recursively and sends
/// `DispatchEvent::FileChanged` for paths matched by any binding.
///
/// - `root` is the project root against which all globs are evaluated.
/// - `profiles` are the compiled watch bindings.
/// - `dispatch_tx` is the channel into the dispatch loop.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    profiles: Vec<WatchProfile>,
    dispatch_tx: mpsc::Sender<DispatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    // notify reports canonical paths on most platforms.
    let root = root.canonicalize().unwrap_or(root);
    let profiles = Arc::new(profiles);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Only fails once the forwarder task is gone.
                if event_tx.send(event).is_err() {
                    trace!("notify event dropped; forwarder stopped");
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .context("creating filesystem watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;

    info!(root = ?root, "watching project for changes");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if !is_relevant(&event.kind) {
                continue;
            }
            trace!(kind = ?event.kind, paths = event.paths.len(), "notify event");

            for path in &event.paths {
                if let Some(change) = to_dispatch_event(&root, path, &profiles) {
                    if dispatch_tx.send(change).await.is_err() {
                        debug!("dispatch loop gone; stopping watcher forwarder");
                        return;
                    }
                }
            }
        }
        debug!("notify forwarder stopped");
    });

    Ok(WatcherHandle { _watcher: watcher })
}
