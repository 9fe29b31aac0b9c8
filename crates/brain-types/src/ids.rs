use crate::entry::EntryId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// A node's identity, deterministically derived from its originating
/// segment. Stable across reanalysis (§3 invariant: "node id is stable
/// across reanalysis").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Derive the deterministic node id for a segment.
///
/// Pure function of `(session_file, start, end)`: re-deriving an id for
/// the same inputs always yields the same output (§8, "Determinism of
/// segment identity"). The session file path is canonicalized to a
/// plain string (not resolved against the filesystem) so the id does
/// not depend on the current working directory or symlink state at
/// call time.
pub fn derive_node_id(session_file: &Path, start: &EntryId, end: &EntryId) -> NodeId {
    let mut hasher = Sha256::new();
    hasher.update(session_file.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(start.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(end.as_str().as_bytes());
    let digest = hasher.finalize();
    NodeId(format!("{:x}", digest)[..32].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_inputs() {
        let path = Path::new("/home/me/.pi/agent/sessions/2026-01-01.jsonl");
        let start = EntryId::from("e1");
        let end = EntryId::from("e9");

        let a = derive_node_id(path, &start, &end);
        let b = derive_node_id(path, &start, &end);
        assert_eq!(a, b);
    }

    #[test]
    fn differs_when_any_input_differs() {
        let path = Path::new("/sessions/a.jsonl");
        let other_path = Path::new("/sessions/b.jsonl");
        let start = EntryId::from("e1");
        let end = EntryId::from("e9");

        assert_ne!(
            derive_node_id(path, &start, &end),
            derive_node_id(other_path, &start, &end)
        );
        assert_ne!(
            derive_node_id(path, &start, &end),
            derive_node_id(path, &EntryId::from("e2"), &end)
        );
        assert_ne!(
            derive_node_id(path, &start, &end),
            derive_node_id(path, &start, &EntryId::from("e8"))
        );
    }
}
