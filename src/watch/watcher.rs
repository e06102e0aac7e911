// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::errors::Result;
use crate::types::{EventKind, WatchEvent};
use crate::watch::ignore::IgnoreSpec;
use crate::watch::path_utils::relative_str;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and the forwarding task.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    forward: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.forward.abort();
    }
}

/// Spawn a recursive filesystem watcher on `root`.
///
/// Raw notify events are translated into [`WatchEvent`]s, paths excluded by
/// `ignore` are dropped, and the rest are sent to `raw_tx` (normally the
/// debouncer).
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    ignore: IgnoreSpec,
    raw_tx: mpsc::Sender<WatchEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    warn!(error = %err, "failed to forward notify event");
                }
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    let ignore = Arc::new(ignore);
    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            trace!(?event, "received notify event");

            for watch_event in classify(&event) {
                if !should_forward(&root, &ignore, &watch_event) {
                    continue;
                }
                debug!(kind = %watch_event.kind, path = ?watch_event.path, "file event");
                if raw_tx.send(watch_event).await.is_err() {
                    warn!("debouncer channel closed; stopping watcher forwarding");
                    return;
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        forward,
    })
}

/// Returns false if `event` is excluded by `ignore`.
///
/// The root itself is never forwarded.
pub fn should_forward(root: &Path, ignore: &IgnoreSpec, event: &WatchEvent) -> bool {
    let rel = relative_str(root, &event.path);
    if rel.as_deref() == Some("") {
        return false;
    }
    if ignore.matches(&event.path, rel.as_deref()) {
        trace!(path = ?event.path, "path ignored");
        return false;
    }
    true
}

/// Translate a notify event into zero or more add/change/unlink events.
///
/// Access and metadata-only notifications are dropped, as are add/change
/// notifications for directories.
pub fn classify(event: &Event) -> Vec<WatchEvent> {
    use notify::EventKind as N;

    let kind_for_all = match &event.kind {
        N::Create(_) => Some(EventKind::Add),
        N::Remove(_) => Some(EventKind::Unlink),
        N::Modify(ModifyKind::Metadata(_)) => None,
        N::Modify(ModifyKind::Name(RenameMode::From)) => Some(EventKind::Unlink),
        N::Modify(ModifyKind::Name(RenameMode::To)) => Some(EventKind::Add),
        N::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                out.push(WatchEvent::unlink(from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                if !to.is_dir() {
                    out.push(WatchEvent::add(to.clone()));
                }
            }
            return out;
        }
        N::Modify(ModifyKind::Name(_)) => {
            return event
                .paths
                .iter()
                .filter(|p| !p.is_dir())
                .map(|p| {
                    if p.exists() {
                        WatchEvent::add(p.clone())
                    } else {
                        WatchEvent::unlink(p.clone())
                    }
                })
                .collect();
        }
        N::Modify(_) => Some(EventKind::Change),
        N::Access(_) | N::Any | N::Other => None,
    };

    let Some(kind) = kind_for_all else {
        return Vec::new();
    };

    event
        .paths
        .iter()
        .filter(|p| kind == EventKind::Unlink || !p.is_dir())
        .map(|p| WatchEvent::new(kind, p.clone()))
        .collect()
}
