use crate::blobs;
use crate::db::Store;
use crate::error::{Error, Result};
use crate::records::{FtsMatch, NodeFilter, Page, SemanticMatch, Subgraph};
use crate::schema::CAPABILITY_FTS;
use brain_types::{cosine_similarity, Edge, EdgeType, Embedding, Node, NodeId};
use rusqlite::params;
use std::collections::{HashSet, VecDeque};

fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

impl Store {
    /// Atomically write a node, its edges and (optionally) its
    /// embedding (§4.3, "atomic segment upsert"). The blob is written
    /// before the transaction opens; it is removed if the transaction
    /// fails.
    pub fn upsert_segment(
        &self,
        node: &Node,
        edges: &[Edge],
        embedding: Option<&Embedding>,
    ) -> Result<()> {
        let blob_path = blobs::blob_path(&self.data_dir, node);
        blobs::write_blob(&blob_path, node)?;

        let result = self.upsert_segment_tx(node, edges, embedding, &blob_path);
        if result.is_err() {
            let _ = blobs::remove_blob(&blob_path);
        }
        result
    }

    fn upsert_segment_tx(
        &self,
        node: &Node,
        edges: &[Edge],
        embedding: Option<&Embedding>,
        blob_path: &std::path::Path,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let outcome = node.content.outcome.map(|o| o.as_str().to_string());
        let session_file = node.source.session_file.to_string_lossy().into_owned();
        let blob_path_str = blob_path.to_string_lossy().into_owned();
        let now = chrono::Utc::now().to_rfc3339();

        tx.execute(
            r#"
            INSERT INTO nodes (
                id, version, project, task_type, outcome, observed_at, analyzed_at,
                relevance, archived, last_accessed_at, computer, session_file,
                start_entry_id, end_entry_id, blob_path, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            ON CONFLICT(id) DO UPDATE SET
                version = ?2,
                project = ?3,
                task_type = ?4,
                outcome = ?5,
                observed_at = ?6,
                analyzed_at = ?7,
                relevance = ?8,
                archived = ?9,
                last_accessed_at = ?10,
                computer = ?11,
                session_file = ?12,
                start_entry_id = ?13,
                end_entry_id = ?14,
                blob_path = ?15,
                updated_at = ?16
            "#,
            params![
                node.id.as_str(),
                node.version,
                node.classification.project,
                node.classification.task_type,
                outcome,
                node.metadata.observed_at.to_rfc3339(),
                node.metadata.analyzed_at.to_rfc3339(),
                node.relevance.score,
                node.relevance.archived as i64,
                node.relevance.last_accessed_at.to_rfc3339(),
                node.computer,
                session_file,
                node.source.start.as_str(),
                node.source.end.as_str(),
                blob_path_str,
                now,
            ],
        )?;

        for edge in edges {
            tx.execute(
                r#"
                INSERT INTO edges (source, target, edge_type, creator, confidence, similarity, metadata, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(source, target, edge_type) DO UPDATE SET
                    creator = ?4,
                    confidence = ?5,
                    similarity = ?6,
                    metadata = ?7
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
        }

        if let Some(embedding) = embedding {
            tx.execute(
                "INSERT OR REPLACE INTO node_embeddings (node_id, model, input_text, schema_version, dimensions, vector)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    embedding.node_id.as_str(),
                    embedding.model,
                    embedding.input_text,
                    embedding.schema_version,
                    embedding.dimensions() as i64,
                    vector_to_blob(&embedding.vector),
                ],
            )?;
        }

        if crate::schema::capability_available(&tx, CAPABILITY_FTS)? {
            tx.execute("DELETE FROM node_fts WHERE node_id = ?1", params![node.id.as_str()])?;
            tx.execute(
                "INSERT INTO node_fts (node_id, summary, tags) VALUES (?1, ?2, ?3)",
                params![
                    node.id.as_str(),
                    node.content.summary,
                    node.semantic.tags.join(" "),
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    pub fn get_node(&self, id: &NodeId) -> Result<Node> {
        let blob_path: String = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT blob_path FROM nodes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .map_err(|_| Error::NotFound(format!("node {id}")))?
        };
        blobs::read_blob(std::path::Path::new(&blob_path))
    }

    pub fn search_by_filter(&self, filter: &NodeFilter, limit: usize, offset: usize) -> Result<Page<NodeId>> {
        let conn = self.conn.lock().unwrap();
        let mut clauses = vec!["1=1".to_string()];
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !filter.include_archived {
            clauses.push("archived = 0".to_string());
        }
        if let Some(project) = &filter.project {
            clauses.push("project = ?".to_string());
            values.push(Box::new(project.clone()));
        }
        if let Some(task_type) = &filter.task_type {
            clauses.push("task_type = ?".to_string());
            values.push(Box::new(task_type.clone()));
        }
        if let Some(outcome) = filter.outcome {
            clauses.push("outcome = ?".to_string());
            values.push(Box::new(outcome.as_str().to_string()));
        }
        if let Some(since) = filter.since {
            clauses.push("analyzed_at >= ?".to_string());
            values.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = filter.until {
            clauses.push("analyzed_at <= ?".to_string());
            values.push(Box::new(until.to_rfc3339()));
        }

        let sql = format!(
            "SELECT id FROM nodes WHERE {} ORDER BY analyzed_at DESC LIMIT ? OFFSET ?",
            clauses.join(" AND ")
        );
        values.push(Box::new((limit + 1) as i64));
        values.push(Box::new(offset as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let mut ids: Vec<NodeId> = stmt
            .query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?
            .into_iter()
            .map(NodeId::from)
            .collect();

        let next_offset = if ids.len() > limit {
            ids.truncate(limit);
            Some(offset + limit)
        } else {
            None
        };

        Ok(Page { items: ids, next_offset })
    }

    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<FtsMatch>> {
        let conn = self.conn.lock().unwrap();
        if !crate::schema::capability_available(&conn, CAPABILITY_FTS)? {
            return Err(Error::Unavailable("full-text index not present".into()));
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT node_id, snippet(node_fts, 1, '[', ']', '...', 10), bm25(node_fts)
            FROM node_fts
            WHERE node_fts MATCH ?1
            ORDER BY bm25(node_fts)
            LIMIT ?2
            "#,
        )?;
        let rows = stmt
            .query_map(params![query, limit as i64], |row| {
                Ok(FtsMatch {
                    node_id: NodeId::from(row.get::<_, String>(0)?),
                    snippet: row.get(1)?,
                    rank: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Semantic k-NN over `node_embeddings` (§4.3): a brute-force
    /// cosine-similarity scan, not an index. This table is small enough
    /// (one row per node per model) that a full scan is the honest
    /// choice over a SQLite vector extension this daemon never loads.
    pub fn search_semantic(
        &self,
        query_vector: &[f32],
        model: &str,
        k: usize,
        excluded: &HashSet<NodeId>,
        min_similarity: f64,
    ) -> Result<Vec<SemanticMatch>> {
        let conn = self.conn.lock().unwrap();

        let mut matches: Vec<SemanticMatch> = Vec::new();
        let mut stmt = conn.prepare("SELECT node_id, vector FROM node_embeddings WHERE model = ?1")?;
        let rows = stmt.query_map(params![model], |row| {
            let node_id: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok((node_id, bytes))
        })?;
        for row in rows {
            let (node_id, bytes) = row?;
            let node_id = NodeId::from(node_id);
            if excluded.contains(&node_id) {
                continue;
            }
            let vector = blob_to_vector(&bytes);
            let similarity = cosine_similarity(query_vector, &vector);
            if similarity >= min_similarity {
                matches.push(SemanticMatch { node_id, similarity });
            }
        }

        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(k);
        Ok(matches)
    }

    /// Breadth-first expansion from `seed`, bounded by `max_depth` and
    /// `max_nodes` (§4.3).
    pub fn graph_traversal(&self, seed: &NodeId, max_depth: usize, max_nodes: usize) -> Result<Subgraph> {
        let conn = self.conn.lock().unwrap();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut edges_seen: Vec<Edge> = Vec::new();
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
        queue.push_back((seed.clone(), 0));
        visited.insert(seed.clone());

        while let Some((current, depth)) = queue.pop_front() {
            if visited.len() >= max_nodes || depth >= max_depth {
                continue;
            }

            let mut stmt = conn.prepare(
                "SELECT source, target, edge_type, creator, confidence, similarity, metadata, created_at
                 FROM edges WHERE source = ?1 OR target = ?1",
            )?;
            let rows = stmt.query_map(params![current.as_str()], |row| {
                row_to_edge(row)
            })?;
            for row in rows {
                let edge = row?;
                let neighbor = if edge.source == current { edge.target.clone() } else { edge.source.clone() };
                edges_seen.push(edge);
                if visited.len() < max_nodes && !visited.contains(&neighbor) {
                    visited.insert(neighbor.clone());
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        Ok(Subgraph {
            nodes: visited.into_iter().collect(),
            edges: edges_seen,
        })
    }

    /// Drop and repopulate all relational data from the blobs on disk
    /// (§4.3, "rebuild-index"). The blob is the source of truth.
    pub fn rebuild_index(&self) -> Result<usize> {
        let paths = blobs::walk_blobs(&self.data_dir)?;
        {
            let conn = self.conn.lock().unwrap();
            conn.execute_batch(
                "DELETE FROM nodes; DELETE FROM edges; DELETE FROM node_embeddings;",
            )?;
            if crate::schema::capability_available(&conn, CAPABILITY_FTS)? {
                conn.execute("DELETE FROM node_fts", [])?;
            }
        }

        let mut count = 0;
        for path in paths {
            let node = blobs::read_blob(&path)?;
            self.upsert_segment_tx(&node, &[], None, &path)?;
            count += 1;
        }
        Ok(count)
    }
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    let edge_type: String = row.get(2)?;
    let creator: String = row.get(3)?;
    let metadata: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    Ok(Edge {
        source: NodeId::from(row.get::<_, String>(0)?),
        target: NodeId::from(row.get::<_, String>(1)?),
        edge_type: parse_edge_type(&edge_type),
        creator: parse_edge_creator(&creator),
        confidence: row.get(4)?,
        similarity: row.get(5)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}

fn edge_type_str(edge_type: EdgeType) -> &'static str {
    match edge_type {
        EdgeType::RelatesTo => "RELATES_TO",
        EdgeType::References => "REFERENCES",
        EdgeType::Reinforces => "REINFORCES",
        EdgeType::UserDrawn => "USER_DRAWN",
    }
}

fn parse_edge_type(s: &str) -> EdgeType {
    match s {
        "RELATES_TO" => EdgeType::RelatesTo,
        "REFERENCES" => EdgeType::References,
        "REINFORCES" => EdgeType::Reinforces,
        _ => EdgeType::UserDrawn,
    }
}

fn edge_creator_str(creator: brain_types::EdgeCreator) -> &'static str {
    match creator {
        brain_types::EdgeCreator::Analyzer => "analyzer",
        brain_types::EdgeCreator::Daemon => "daemon",
        brain_types::EdgeCreator::User => "user",
    }
}

fn parse_edge_creator(s: &str) -> brain_types::EdgeCreator {
    match s {
        "analyzer" => brain_types::EdgeCreator::Analyzer,
        "user" => brain_types::EdgeCreator::User,
        _ => brain_types::EdgeCreator::Daemon,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brain_types::{
        Classification, Content, DaemonMeta, EntryId, LessonBuckets, Node, NodeMetadata as Metadata,
        Observations, Relevance, Semantic, SegmentTriple,
    };
    use chrono::Utc;

    fn sample_node(id: &str, project: &str) -> Node {
        let now = Utc::now();
        Node {
            id: NodeId::from(id.to_string()),
            version: 1,
            source: SegmentTriple {
                session_file: "/s.jsonl".into(),
                start: EntryId::new("e1"),
                end: EntryId::new("e2"),
            },
            computer: "laptop".into(),
            classification: Classification { project: Some(project.into()), ..Default::default() },
            content: Content { summary: "did a thing".into(), ..Default::default() },
            lessons: LessonBuckets::default(),
            observations: Observations::default(),
            metadata: Metadata {
                tokens: 100,
                cost_usd: 0.01,
                wall_duration_secs: 1.0,
                observed_at: now,
                analyzed_at: now,
                analyzer_version: "v1".into(),
            },
            semantic: Semantic::default(),
            daemon: DaemonMeta::default(),
            signals: None,
            relevance: Relevance::fresh(now),
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let node = sample_node("n1", "proj-a");
        store.upsert_segment(&node, &[], None).unwrap();

        let fetched = store.get_node(&NodeId::from("n1".to_string())).unwrap();
        assert_eq!(fetched.content.summary, "did a thing");
    }

    #[test]
    fn reupsert_increments_version_without_duplicating() {
        let store = Store::open_in_memory().unwrap();
        let mut node = sample_node("n1", "proj-a");
        store.upsert_segment(&node, &[], None).unwrap();
        node.version = 2;
        node.content.summary = "did a thing, v2".into();
        store.upsert_segment(&node, &[], None).unwrap();

        let page = store.search_by_filter(&NodeFilter::default(), 10, 0).unwrap();
        assert_eq!(page.items.len(), 1);
        let fetched = store.get_node(&NodeId::from("n1".to_string())).unwrap();
        assert_eq!(fetched.version, 2);
    }

    #[test]
    fn filter_by_project() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_segment(&sample_node("n1", "proj-a"), &[], None).unwrap();
        store.upsert_segment(&sample_node("n2", "proj-b"), &[], None).unwrap();

        let filter = NodeFilter { project: Some("proj-a".into()), ..Default::default() };
        let page = store.search_by_filter(&filter, 10, 0).unwrap();
        assert_eq!(page.items, vec![NodeId::from("n1".to_string())]);
    }

    #[test]
    fn missing_node_is_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = store.get_node(&NodeId::from("missing".to_string())).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
