// src/watch/watcher.rs

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace};

use crate::bus::EventBus;
use crate::types::TriggerSource;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchPatterns;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("root", &self.root)
            .finish()
    }
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Spawn a filesystem watcher that observes `root` recursively and feeds a
/// save event into `bus` for every change whose relative path matches
/// `patterns`.
///
/// The notify callback runs on notify's own thread and calls straight into
/// the bus, which only enqueues; all decisions happen on the runtime task.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    patterns: WatchPatterns,
    bus: EventBus,
) -> Result<WatcherHandle> {
    let root = root.into();
    // Canonicalize once so we have a stable base path.
    let root = root.canonicalize().unwrap_or(root);

    let callback_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => forward_event(&callback_root, &patterns, &bus, event),
            Err(err) => {
                tracing::warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {:?}", root))?;

    info!("file watcher started on {:?}", root);

    Ok(WatcherHandle {
        _inner: watcher,
        root,
    })
}

/// Turn one notify event into at most one save event.
///
/// An editor save often shows up as several paths or several events (write,
/// rename, metadata); the controller coalesces them, so we only need one
/// trigger per notify event.
fn forward_event(root: &Path, patterns: &WatchPatterns, bus: &EventBus, event: Event) {
    if !is_content_change(&event.kind) {
        trace!(kind = ?event.kind, "ignoring non-content event");
        return;
    }

    let matched = event.paths.into_iter().find(|path| {
        match relative_str(root, path) {
            Some(rel) => {
                let hit = patterns.matches(&rel);
                trace!(rel = %rel, hit, "checked changed path");
                hit
            }
            None => {
                debug!(?path, ?root, "could not relativize changed path");
                false
            }
        }
    });

    if let Some(path) = matched {
        debug!(?path, "watched file changed");
        bus.feed_save_event_from(TriggerSource::FileWatch, path);
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
