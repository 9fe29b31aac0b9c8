use brain_types::{EntryId, Session};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;

/// Per-file bookkeeping the watcher keeps between events (§4.6): when a
/// file was first observed, when it last changed, its last known size,
/// and a fingerprint of the parent-pointer chain leading to its leaf.
/// The fingerprint changes whenever new entries extend or rewrite that
/// chain, independent of unrelated file growth.
#[derive(Debug, Clone)]
pub struct FileState {
    pub first_seen: DateTime<Utc>,
    pub last_event: DateTime<Utc>,
    pub last_size: u64,
    pub fingerprint: Option<String>,
    pub last_analyzed_leaf: Option<EntryId>,
}

impl FileState {
    pub fn observed(now: DateTime<Utc>, size: u64) -> Self {
        Self {
            first_seen: now,
            last_event: now,
            last_size: size,
            fingerprint: None,
            last_analyzed_leaf: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>, size: u64) {
        self.last_event = now;
        self.last_size = size;
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout: chrono::Duration) -> bool {
        now - self.last_event >= idle_timeout
    }
}

/// Deterministic fingerprint of the ancestor chain from the session's
/// tree root to its current leaf (§4.6). Two sessions with the same
/// leaf and the same ancestor ids hash identically regardless of
/// unrelated file content, so a rewrite of the chain (a fork, a
/// rewritten branch) is detected even when the leaf id happens to
/// repeat across files.
pub fn fingerprint_leaf_chain(session: &Session) -> Option<String> {
    let leaf = session.leaf()?;
    let path = session.ancestor_path(leaf);
    let mut hasher = Sha256::new();
    for id in &path {
        hasher.update(id.as_str().as_bytes());
        hasher.update(b"\0");
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// In-memory table of [`FileState`] keyed by session file path, shared
/// between the filesystem-event thread and the idle sweep (§4.6).
pub type StateTable = HashMap<PathBuf, FileState>;
