use brain_types::{BoundaryKind, EntryId, EntryKind, Segment, SegmentTriple, Session};
use std::time::Duration;

/// Tunables for boundary detection (§4.2).
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Time gap between consecutive messages, in minutes, that opens a
    /// `resume` boundary. Must be positive. Default 10.
    pub resume_gap_minutes: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            resume_gap_minutes: 10,
        }
    }
}

/// A point in the root-to-leaf walk where a new segment begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub kind: BoundaryKind,
    pub at: EntryId,
}

/// Walk a session from its roots toward the leaf in deterministic
/// traversal order (depth-first, children ordered as the session
/// already sorts them: timestamp then id) and report every boundary
/// encountered (§4.2).
///
/// The walk visits every entry exactly once, so the boundaries it
/// reports partition that sequence into segments that together cover
/// every message entry exactly once (§8).
pub fn detect_boundaries(session: &Session, config: &DetectorConfig) -> Vec<Boundary> {
    let order = traversal_order(session);
    let mut boundaries = Vec::new();
    let mut running_session_id: Option<String> = None;
    let mut prev_id: Option<EntryId> = None;
    let mut prev_message_ts = None;

    for (i, id) in order.iter().enumerate() {
        let entry = match session.entry(id) {
            Some(e) => e,
            None => continue,
        };

        if i == 0 {
            boundaries.push(Boundary {
                kind: BoundaryKind::Start,
                at: id.clone(),
            });
        } else if let EntryKind::BranchSummary = entry.kind {
            boundaries.push(Boundary {
                kind: BoundaryKind::BranchSummary,
                at: id.clone(),
            });
        } else if let EntryKind::Compaction = entry.kind {
            boundaries.push(Boundary {
                kind: BoundaryKind::Compaction,
                at: id.clone(),
            });
        } else if let EntryKind::SessionInfo = entry.kind {
            let declared_parent = entry.fields.parent_session_id.clone();
            let declared_self = entry.fields.session_id.clone();
            if running_session_id.is_none() {
                running_session_id = declared_self.clone();
            }
            let is_fork = declared_parent
                .as_ref()
                .map(|p| Some(p) != running_session_id.as_ref())
                .unwrap_or(false);
            if is_fork {
                boundaries.push(Boundary {
                    kind: BoundaryKind::Fork,
                    at: id.clone(),
                });
                running_session_id = declared_self.or(running_session_id);
            }
        } else if prev_id.as_ref() != entry.parent_id.as_ref() {
            boundaries.push(Boundary {
                kind: BoundaryKind::TreeJump,
                at: id.clone(),
            });
        } else if matches!(entry.kind, EntryKind::Message) {
            if let Some(prev_ts) = prev_message_ts {
                let gap = entry.timestamp.signed_duration_since(prev_ts);
                let threshold = Duration::from_secs(config.resume_gap_minutes as u64 * 60);
                if gap.to_std().map(|g| g > threshold).unwrap_or(false) {
                    boundaries.push(Boundary {
                        kind: BoundaryKind::Resume,
                        at: id.clone(),
                    });
                }
            }
        }

        if matches!(entry.kind, EntryKind::Message) {
            prev_message_ts = Some(entry.timestamp);
        }
        prev_id = Some(id.clone());
    }

    boundaries
}

/// `handoff` detection is not specified upstream (§9 open question);
/// this always returns `false`. Kept as a named seam so a future
/// detector can be slotted in without touching the walk above.
pub fn detect_handoff(_session: &Session, _at: &EntryId) -> bool {
    false
}

/// Depth-first pre-order traversal visiting every entry in `session`
/// exactly once. Roots and each node's children are already sorted by
/// `(timestamp, id)` in `Session`, so this order is deterministic.
fn traversal_order(session: &Session) -> Vec<EntryId> {
    let mut result = Vec::with_capacity(session.len());
    let mut work: Vec<EntryId> = session.roots().to_vec();
    work.reverse();

    while let Some(id) = work.pop() {
        result.push(id.clone());
        let mut children = session.children_of(Some(&id)).to_vec();
        children.reverse();
        work.extend(children);
    }

    result
}

/// Turn a boundary sequence into the segments it partitions the
/// session into (§4.2): maximal ranges between successive boundaries,
/// ordered root-to-leaf.
pub fn segments_from_boundaries(session: &Session, boundaries: &[Boundary]) -> Vec<Segment> {
    let order = traversal_order(session);
    if order.is_empty() || boundaries.is_empty() {
        return Vec::new();
    }

    let boundary_positions: Vec<usize> = boundaries
        .iter()
        .filter_map(|b| order.iter().position(|id| id == &b.at))
        .collect();

    let mut segments = Vec::with_capacity(boundaries.len());
    for (i, &start_pos) in boundary_positions.iter().enumerate() {
        let end_pos = boundary_positions
            .get(i + 1)
            .map(|&next| next - 1)
            .unwrap_or(order.len() - 1);

        if end_pos < start_pos {
            continue;
        }

        segments.push(Segment {
            triple: SegmentTriple {
                session_file: session.file.clone(),
                start: order[start_pos].clone(),
                end: order[end_pos].clone(),
            },
            entry_count: end_pos - start_pos + 1,
            opened_by: boundaries[i].kind,
        });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_types::{EntryFields, EntryKind, TranscriptEntry};
    use chrono::{TimeZone, Utc};

    fn entry(id: &str, parent: Option<&str>, ts_secs: i64, kind: EntryKind) -> TranscriptEntry {
        TranscriptEntry {
            id: EntryId::new(id),
            parent_id: parent.map(EntryId::new),
            timestamp: Utc.timestamp_opt(ts_secs, 0).unwrap(),
            kind,
            fields: EntryFields::default(),
            passthrough: serde_json::Value::Null,
        }
    }

    #[test]
    fn linear_session_is_a_single_segment() {
        let session = Session::new(
            "/s.jsonl".into(),
            None,
            vec![
                entry("e1", None, 0, EntryKind::Message),
                entry("e2", Some("e1"), 1, EntryKind::Message),
                entry("e3", Some("e2"), 2, EntryKind::Message),
            ],
        );
        let boundaries = detect_boundaries(&session, &DetectorConfig::default());
        assert_eq!(boundaries.len(), 1);
        assert_eq!(boundaries[0].kind, BoundaryKind::Start);

        let segments = segments_from_boundaries(&session, &boundaries);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].entry_count, 3);
        assert_eq!(segments[0].end().as_str(), "e3");
    }

    #[test]
    fn compaction_and_branch_summary_open_new_segments() {
        let session = Session::new(
            "/s.jsonl".into(),
            None,
            vec![
                entry("e1", None, 0, EntryKind::Message),
                entry("e2", Some("e1"), 1, EntryKind::Message),
                entry("e3", Some("e2"), 2, EntryKind::BranchSummary),
                entry("e4", Some("e3"), 3, EntryKind::Message),
                entry("e5", Some("e4"), 4, EntryKind::Compaction),
                entry("e6", Some("e5"), 5, EntryKind::Message),
            ],
        );
        let boundaries = detect_boundaries(&session, &DetectorConfig::default());
        assert_eq!(boundaries.len(), 3);

        let segments = segments_from_boundaries(&session, &boundaries);
        assert_eq!(segments.len(), 3);

        let total: usize = segments.iter().map(|s| s.entry_count).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn resume_gap_opens_a_segment() {
        let session = Session::new(
            "/s.jsonl".into(),
            None,
            vec![
                entry("e1", None, 0, EntryKind::Message),
                entry("e2", Some("e1"), 20 * 60, EntryKind::Message),
            ],
        );
        let boundaries = detect_boundaries(&session, &DetectorConfig::default());
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[1].kind, BoundaryKind::Resume);
    }

    #[test]
    fn tree_jump_detected_on_branch() {
        let session = Session::new(
            "/s.jsonl".into(),
            None,
            vec![
                entry("e1", None, 0, EntryKind::Message),
                entry("e2", Some("e1"), 1, EntryKind::Message),
                entry("e3", Some("e1"), 2, EntryKind::Message),
            ],
        );
        let boundaries = detect_boundaries(&session, &DetectorConfig::default());
        // e2 continues the chain from e1; e3 also parents e1, so from
        // e2's perspective e3's parent isn't the traversal's previous
        // position (e2) -> tree_jump.
        assert!(boundaries.iter().any(|b| b.kind == BoundaryKind::TreeJump));
    }

    #[test]
    fn segments_cover_every_entry_exactly_once() {
        let session = Session::new(
            "/s.jsonl".into(),
            None,
            vec![
                entry("e1", None, 0, EntryKind::Message),
                entry("e2", Some("e1"), 1, EntryKind::Message),
                entry("e3", Some("e2"), 2, EntryKind::BranchSummary),
                entry("e4", Some("e3"), 3, EntryKind::Message),
            ],
        );
        let boundaries = detect_boundaries(&session, &DetectorConfig::default());
        let segments = segments_from_boundaries(&session, &boundaries);

        let mut seen = std::collections::HashSet::new();
        for seg in &segments {
            let order = traversal_order(&session);
            let start = order.iter().position(|i| i == seg.start()).unwrap();
            let end = order.iter().position(|i| i == seg.end()).unwrap();
            for id in &order[start..=end] {
                assert!(seen.insert(id.clone()), "entry {:?} covered twice", id);
            }
        }
        assert_eq!(seen.len(), session.len());
    }
}
