// SPDX-License-Identifier: AGPL-3.0-or-later
//! Polling change tracker
//!
//! Remembers the last fingerprint seen for each watched path and reports the
//! difference on every [`ChangeTracker::poll`]. Fingerprints are always taken
//! fresh from the backend, so a poll sees changes made since the previous one.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use strata_core::{Fingerprint, Path};
use tracing::{debug, warn};

use crate::Vfs;

/// Identifies one [`ChangeTracker::watch`] registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WatchHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeEvent {
    Created,
    Changed,
    Deleted,
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeEvent::Created => "created",
            ChangeEvent::Changed => "changed",
            ChangeEvent::Deleted => "deleted",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub handle: WatchHandle,
    pub path: Path,
    pub event: ChangeEvent,
}

#[derive(Debug)]
struct Watched {
    path: Path,
    last: Option<Fingerprint>,
}

impl Watched {
    fn current(&mut self, vfs: &Vfs) -> Option<Option<Fingerprint>> {
        if self.path.domain().is_empty() {
            let resolved = vfs.make_canonical(&self.path)?;
            debug!(from = %self.path, to = %resolved, "watched path resolved");
            self.path = resolved;
        }
        current_fingerprint(vfs, &self.path)
    }
}

#[derive(Debug, Default)]
pub struct ChangeTracker {
    next_id: u64,
    watched: BTreeMap<WatchHandle, Watched>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts watching `path`. Its current state is the baseline, so a path
    /// that does not exist yet reports `Created` once it appears.
    ///
    /// A domain-less path is bound to the first domain that has it. Until one
    /// does, every poll tries again.
    pub fn watch(&mut self, vfs: &Vfs, path: impl Into<Path>) -> WatchHandle {
        let handle = WatchHandle(self.next_id);
        self.next_id += 1;

        let mut watched = Watched { path: path.into(), last: None };
        watched.last = watched.current(vfs).flatten();
        debug!(path = %watched.path, handle = handle.0, exists = watched.last.is_some(), "watching");
        self.watched.insert(handle, watched);
        handle
    }

    pub fn unwatch(&mut self, handle: WatchHandle) -> bool {
        self.watched.remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.watched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watched.is_empty()
    }

    pub fn path(&self, handle: WatchHandle) -> Option<&Path> {
        self.watched.get(&handle).map(|w| &w.path)
    }

    /// Changes since the previous poll, in registration order.
    pub fn poll(&mut self, vfs: &Vfs) -> Vec<Change> {
        let mut changes = Vec::new();
        for (handle, watched) in &mut self.watched {
            let Some(current) = watched.current(vfs) else {
                continue;
            };
            let event = match (watched.last, current) {
                (None, Some(_)) => ChangeEvent::Created,
                (Some(_), None) => ChangeEvent::Deleted,
                (Some(old), Some(new)) if old != new => ChangeEvent::Changed,
                _ => continue,
            };
            watched.last = current;
            debug!(path = %watched.path, %event, "change detected");
            changes.push(Change { handle: *handle, path: watched.path.clone(), event });
        }
        changes
    }
}

/// `Some(None)` when the path is absent, `None` when its state is unknown.
fn current_fingerprint(vfs: &Vfs, path: &Path) -> Option<Option<Fingerprint>> {
    match vfs.get_fingerprint(path, false) {
        Ok(fingerprint) => Some(Some(fingerprint)),
        Err(e) if e.is_not_found() => Some(None),
        Err(e) => {
            warn!(path = %path, error = %e, "cannot fingerprint watched path");
            None
        }
    }
}
