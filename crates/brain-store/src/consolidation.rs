//! Read/write primitives the consolidation scheduler (C8) needs beyond
//! the core node/edge/queue operations in [`crate::store`].

use crate::db::Store;
use crate::error::Result;
use brain_types::{Edge, EdgeType, NodeId, SegmentTriple};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

/// One node due for reanalysis, with the segment its node was derived
/// from (§4.8, "Reanalysis").
#[derive(Debug, Clone)]
pub struct ReanalysisCandidate {
    pub node_id: NodeId,
    pub segment: SegmentTriple,
}

/// The inputs the relevance-decay formula (§4.8) needs for one node.
#[derive(Debug, Clone)]
pub struct DecayInputs {
    pub analyzed_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub edge_count: u32,
}

impl Store {
    /// Up to `limit` non-archived nodes, oldest `analyzed_at` first
    /// (§4.8, "Reanalysis").
    pub fn reanalysis_candidates(&self, limit: usize) -> Result<Vec<ReanalysisCandidate>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, session_file, start_entry_id, end_entry_id FROM nodes
             WHERE archived = 0 ORDER BY analyzed_at ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ReanalysisCandidate {
                    node_id: NodeId::from(row.get::<_, String>(0)?),
                    segment: SegmentTriple {
                        session_file: row.get::<_, String>(1)?.into(),
                        start: brain_types::EntryId::new(row.get::<_, String>(2)?),
                        end: brain_types::EntryId::new(row.get::<_, String>(3)?),
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Up to `limit` non-archived nodes most recently written, newest
    /// first (§4.8, "Connection discovery": "recently created or
    /// touched nodes").
    pub fn recently_touched_nodes(&self, limit: usize) -> Result<Vec<NodeId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM nodes WHERE archived = 0 ORDER BY updated_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(NodeId::from).collect())
    }

    /// Every non-archived node id (§4.8's pattern-aggregation and
    /// reference-detection passes scan the whole active set; fine at
    /// the scale this daemon runs at — a single user's history).
    pub fn all_active_node_ids(&self) -> Result<Vec<NodeId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM nodes WHERE archived = 0")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(NodeId::from).collect())
    }

    /// Non-archived nodes with relevance at least `min_relevance`, for
    /// the creative-association sample pool (§4.8).
    pub fn nodes_with_min_relevance(&self, min_relevance: f64, limit: usize) -> Result<Vec<NodeId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM nodes WHERE archived = 0 AND relevance >= ?1
             ORDER BY RANDOM() LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![min_relevance, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(NodeId::from).collect())
    }

    pub fn decay_inputs(&self, id: &NodeId) -> Result<DecayInputs> {
        let conn = self.conn.lock().unwrap();
        let (analyzed_at, last_accessed_at): (String, String) = conn.query_row(
            "SELECT analyzed_at, last_accessed_at FROM nodes WHERE id = ?1",
            params![id.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let edge_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE source = ?1 OR target = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        Ok(DecayInputs {
            analyzed_at: parse_ts(&analyzed_at),
            last_accessed_at: parse_ts(&last_accessed_at),
            edge_count: edge_count as u32,
        })
    }

    /// Update a node's relevance score and archival flag, in both the
    /// relational row and its blob (the blob is authoritative and
    /// `rebuild_index` reconstructs the row from it, so the two must
    /// stay in agreement even for a field the analyzer never sets).
    pub fn set_relevance(&self, id: &NodeId, score: f64, archived: bool) -> Result<()> {
        let blob_path: String = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT blob_path FROM nodes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )?
        };
        let path = std::path::Path::new(&blob_path);
        let mut node = crate::blobs::read_blob(path)?;
        node.relevance.score = score;
        node.relevance.archived = archived;
        crate::blobs::write_blob(path, &node)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE nodes SET relevance = ?1, archived = ?2 WHERE id = ?3",
            params![score, archived as i64, id.as_str()],
        )?;
        Ok(())
    }

    /// Fetch a node's embedding vector for `model`, if one exists.
    pub fn embedding_for(&self, id: &NodeId, model: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM node_embeddings WHERE node_id = ?1 AND model = ?2",
                params![id.as_str(), model],
                |row| row.get(0),
            )
            .optional()?;
        Ok(bytes.map(|b| b.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()))
    }

    pub fn has_edge(&self, source: &NodeId, target: &NodeId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM edges WHERE (source = ?1 AND target = ?2) OR (source = ?2 AND target = ?1)",
            params![source.as_str(), target.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert an edge only if `(source, target, type)` is new. Returns
    /// whether a row was inserted (§4.8: "deduplicated by (src,tgt,type)").
    pub fn insert_edge_if_absent(&self, edge: &Edge) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO edges (source, target, edge_type, creator, confidence, similarity, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                edge.source.as_str(),
                edge.target.as_str(),
                edge_type_str(edge.edge_type),
                edge_creator_str(edge.creator),
                edge.confidence,
                edge.similarity,
                edge.metadata.to_string(),
                edge.created_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    }

    /// Whether `cooldown` has elapsed since the last connection-discovery
    /// run for `id` (§4.8: "a per-node cooldown throttles rediscovery").
    pub fn connection_cooldown_elapsed(&self, id: &NodeId, cooldown: Duration) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let last_run: Option<String> = conn
            .query_row(
                "SELECT last_run_at FROM connection_cooldown WHERE node_id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(match last_run {
            Some(ts) => Utc::now() - parse_ts(&ts) >= cooldown,
            None => true,
        })
    }

    pub fn mark_connection_discovery_run(&self, id: &NodeId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO connection_cooldown (node_id, last_run_at) VALUES (?1, ?2)
             ON CONFLICT(node_id) DO UPDATE SET last_run_at = ?2",
            params![id.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Upsert one aggregated pattern row, bumping frequency and
    /// averaging confidence (§4.8, "Pattern aggregation").
    pub fn upsert_insight(
        &self,
        kind: &str,
        model: Option<&str>,
        tool: Option<&str>,
        pattern: &str,
        confidence: f64,
        severity: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<(i64, f64)> = conn
            .query_row(
                "SELECT frequency, mean_confidence FROM insights WHERE kind IS ?1 AND model IS ?2 AND tool IS ?3 AND pattern = ?4",
                params![kind, model, tool, pattern],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (frequency, mean_confidence) = match existing {
            Some((freq, mean)) => (freq + 1, (mean * freq as f64 + confidence) / (freq + 1) as f64),
            None => (1, confidence),
        };

        conn.execute(
            r#"
            INSERT INTO insights (kind, model, tool, pattern, frequency, mean_confidence, severity, prompt_included)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
            ON CONFLICT(kind, model, tool, pattern) DO UPDATE SET
                frequency = ?5, mean_confidence = ?6, severity = ?7
            "#,
            params![kind, model, tool, pattern, frequency, mean_confidence, severity],
        )?;
        Ok(())
    }

    pub fn record_failure_pattern(&self, pattern: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM failure_patterns WHERE pattern = ?1",
                params![pattern],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE failure_patterns SET frequency = frequency + 1, last_seen_at = ?1 WHERE id = ?2",
                    params![Utc::now().to_rfc3339(), id],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO failure_patterns (pattern, frequency, last_seen_at) VALUES (?1, 1, ?2)",
                    params![pattern, Utc::now().to_rfc3339()],
                )?;
            }
        }
        Ok(())
    }

    pub fn bump_model_stats(&self, model: &str, success: bool, tokens: u64, cost_usd: f64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO model_stats (model, total_segments, success_count, failure_count, total_tokens, total_cost_usd)
            VALUES (?1, 1, ?2, ?3, ?4, ?5)
            ON CONFLICT(model) DO UPDATE SET
                total_segments = total_segments + 1,
                success_count = success_count + ?2,
                failure_count = failure_count + ?3,
                total_tokens = total_tokens + ?4,
                total_cost_usd = total_cost_usd + ?5
            "#,
            params![model, success as i64, (!success) as i64, tokens as i64, cost_usd],
        )?;
        Ok(())
    }

    pub fn record_decision(&self, node_id: Option<&str>, decision: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO decisions (node_id, decision, created_at) VALUES (?1, ?2, ?3)",
            params![node_id, decision, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn edge_type_str(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::RelatesTo => "RELATES_TO",
        EdgeType::References => "REFERENCES",
        EdgeType::Reinforces => "REINFORCES",
        EdgeType::UserDrawn => "USER_DRAWN",
    }
}

fn edge_creator_str(creator: brain_types::EdgeCreator) -> &'static str {
    match creator {
        brain_types::EdgeCreator::Analyzer => "analyzer",
        brain_types::EdgeCreator::Daemon => "daemon",
        brain_types::EdgeCreator::User => "user",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_types::EdgeCreator;

    #[test]
    fn reanalysis_candidates_orders_oldest_first() {
        let store = Store::open_in_memory().unwrap();
        let candidates = store.reanalysis_candidates(10).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn insight_upsert_accumulates_frequency() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_insight("tool-error", None, Some("grep"), "timeout", 0.8, "medium").unwrap();
        store.upsert_insight("tool-error", None, Some("grep"), "timeout", 0.6, "medium").unwrap();

        let conn = store.conn.lock().unwrap();
        let (frequency, mean): (i64, f64) = conn
            .query_row(
                "SELECT frequency, mean_confidence FROM insights WHERE pattern = 'timeout'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(frequency, 2);
        assert!((mean - 0.7).abs() < 1e-9);
    }

    #[test]
    fn connection_cooldown_starts_elapsed() {
        let store = Store::open_in_memory().unwrap();
        let id = NodeId::from("n1".to_string());
        assert!(store.connection_cooldown_elapsed(&id, Duration::hours(24)).unwrap());
        store.mark_connection_discovery_run(&id).unwrap();
        assert!(!store.connection_cooldown_elapsed(&id, Duration::hours(24)).unwrap());
    }

    #[test]
    fn edge_dedup_ignores_second_insert() {
        let store = Store::open_in_memory().unwrap();
        let edge = Edge {
            source: NodeId::from("a".to_string()),
            target: NodeId::from("b".to_string()),
            edge_type: EdgeType::RelatesTo,
            creator: EdgeCreator::Daemon,
            confidence: 0.9,
            similarity: Some(0.9),
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        };
        assert!(store.insert_edge_if_absent(&edge).unwrap());
        assert!(!store.insert_edge_if_absent(&edge).unwrap());
    }
}
