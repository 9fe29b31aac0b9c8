//! The five consolidation jobs (§4.8), each a pure function of a
//! [`Store`] and a [`ConsolidationConfig`] returning a [`JobResult`].
//! None of them touch the clock except to read `Utc::now()` for
//! bookkeeping timestamps; [`crate::scheduler::Scheduler::tick`] is
//! what decides whether a job is due.

use crate::decay::{compute_relevance, RelevanceInputs, DEFAULT_DECAY_K};
use brain_store::{JobInput, Store};
use brain_types::{Edge, EdgeCreator, EdgeType, JobType, NodeId, Outcome};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Structured outcome of one consolidation job run (§4.8: "All jobs
/// take a cancellable context and report a structured result (start,
/// end, items-processed, details, optional error)").
#[derive(Debug, Clone)]
pub struct JobResult {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub items_processed: usize,
    pub details: String,
    pub error: Option<String>,
}

impl JobResult {
    fn ok(start: DateTime<Utc>, items_processed: usize, details: impl Into<String>) -> Self {
        Self { start, end: Utc::now(), items_processed, details: details.into(), error: None }
    }

    fn err(start: DateTime<Utc>, items_processed: usize, details: impl Into<String>, error: impl Into<String>) -> Self {
        Self { start, end: Utc::now(), items_processed, details: details.into(), error: Some(error.into()) }
    }
}

/// Tunables for the consolidation jobs (§6, daemon config section).
#[derive(Debug, Clone)]
pub struct ConsolidationConfig {
    pub reanalysis_limit: usize,
    pub connection_discovery_limit: usize,
    pub connection_discovery_cooldown_hours: i64,
    pub neighbors_per_node: usize,
    pub semantic_similarity_threshold: f64,
    pub embedding_model: String,
    pub archive_threshold: f64,
    pub decay_k: f64,
    pub creative_association_sample_size: usize,
    pub creative_association_min_relevance: f64,
    pub max_edges_per_node: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        Self {
            reanalysis_limit: 100,
            connection_discovery_limit: 100,
            connection_discovery_cooldown_hours: 24,
            neighbors_per_node: 5,
            semantic_similarity_threshold: 0.75,
            embedding_model: "default".to_string(),
            archive_threshold: 0.2,
            decay_k: DEFAULT_DECAY_K,
            creative_association_sample_size: 50,
            creative_association_min_relevance: 0.3,
            max_edges_per_node: 3,
        }
    }
}

/// Enqueue `reanalysis` jobs for the oldest-analyzed non-archived nodes.
pub fn run_reanalysis(store: &Store, config: &ConsolidationConfig) -> JobResult {
    let start = Utc::now();
    let candidates = match store.reanalysis_candidates(config.reanalysis_limit) {
        Ok(c) => c,
        Err(err) => return JobResult::err(start, 0, "could not load reanalysis candidates", err.to_string()),
    };

    let queue = store.queue();
    let mut enqueued = 0;
    for candidate in &candidates {
        let already_queued = queue
            .has_existing_job(
                &candidate.segment.session_file,
                Some(candidate.segment.start.as_str()),
                Some(candidate.segment.end.as_str()),
            )
            .unwrap_or(false);
        if already_queued {
            continue;
        }
        let enqueued_job = queue.enqueue(JobInput {
            job_type: JobType::Reanalysis,
            session_file: candidate.segment.session_file.clone(),
            segment: Some(candidate.segment.clone()),
            context: serde_json::Value::Null,
            max_retries: 3,
        });
        if enqueued_job.is_ok() {
            enqueued += 1;
        }
    }

    JobResult::ok(start, enqueued, format!("enqueued {enqueued} of {} candidates", candidates.len()))
}

/// For each recently touched node, discover up to `neighbors_per_node`
/// edges via semantic similarity, explicit id references in text, and
/// shared lessons (§4.8, "Connection discovery").
pub fn run_connection_discovery(store: &Store, config: &ConsolidationConfig) -> JobResult {
    let start = Utc::now();
    let candidates = match store.recently_touched_nodes(config.connection_discovery_limit) {
        Ok(c) => c,
        Err(err) => return JobResult::err(start, 0, "could not load connection-discovery candidates", err.to_string()),
    };
    let pool: HashSet<NodeId> = match store.all_active_node_ids() {
        Ok(ids) => ids.into_iter().collect(),
        Err(err) => return JobResult::err(start, 0, "could not load active node set", err.to_string()),
    };

    let cooldown = Duration::hours(config.connection_discovery_cooldown_hours);
    let mut edges_created = 0usize;
    let mut semantic_degraded = false;

    for node_id in &candidates {
        if !store.connection_cooldown_elapsed(node_id, cooldown).unwrap_or(true) {
            continue;
        }
        let Ok(node) = store.get_node(node_id) else { continue };

        let mut neighbors: Vec<(NodeId, EdgeType, f64)> = Vec::new();

        match store.embedding_for(node_id, &config.embedding_model) {
            Ok(Some(vector)) => {
                let mut excluded = HashSet::new();
                excluded.insert(node_id.clone());
                match store.search_semantic(
                    &vector,
                    &config.embedding_model,
                    config.neighbors_per_node,
                    &excluded,
                    config.semantic_similarity_threshold,
                ) {
                    Ok(matches) => {
                        neighbors.extend(matches.into_iter().map(|m| (m.node_id, EdgeType::RelatesTo, m.similarity)));
                    }
                    Err(_) => semantic_degraded = true,
                }
            }
            Ok(None) => {}
            Err(_) => semantic_degraded = true,
        }

        for other_id in &pool {
            if other_id == node_id {
                continue;
            }
            if node.content.summary.contains(other_id.as_str()) {
                neighbors.push((other_id.clone(), EdgeType::References, 1.0));
            }
        }

        for other_id in &pool {
            if other_id == node_id {
                continue;
            }
            let Ok(other) = store.get_node(other_id) else { continue };
            let shares_lesson = node
                .lessons
                .iter_named()
                .any(|pair| other.lessons.iter_named().any(|other_pair| other_pair == pair));
            if shares_lesson {
                neighbors.push((other_id.clone(), EdgeType::Reinforces, 1.0));
            }
        }

        neighbors.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(config.neighbors_per_node);

        for (target, edge_type, similarity) in neighbors {
            let edge = Edge {
                source: node_id.clone(),
                target,
                edge_type,
                creator: EdgeCreator::Daemon,
                confidence: similarity,
                similarity: Some(similarity),
                metadata: serde_json::Value::Null,
                created_at: Utc::now(),
            };
            if store.insert_edge_if_absent(&edge).unwrap_or(false) {
                edges_created += 1;
            }
        }

        let _ = store.mark_connection_discovery_run(node_id);
    }

    let mut details = format!("created {edges_created} edges across {} candidates", candidates.len());
    if semantic_degraded {
        details.push_str("; semantic similarity degraded, vector index unavailable");
    }
    JobResult::ok(start, edges_created, details)
}

/// Walk observations and lessons, updating `insights`,
/// `failure_patterns` and `model_stats` (§4.8, "Pattern aggregation").
pub fn run_pattern_aggregation(store: &Store) -> JobResult {
    let start = Utc::now();
    let ids = match store.all_active_node_ids() {
        Ok(ids) => ids,
        Err(err) => return JobResult::err(start, 0, "could not load active node set", err.to_string()),
    };

    let mut updated = 0usize;
    for id in &ids {
        let Ok(node) = store.get_node(id) else { continue };

        for (bucket, lesson) in node.lessons.iter_named() {
            if store.upsert_insight("lesson", None, None, &format!("{bucket}:{lesson}"), 1.0, "info").is_ok() {
                updated += 1;
            }
        }

        for error in &node.observations.tool_use_errors {
            if store.record_failure_pattern(error).is_ok() {
                updated += 1;
            }
        }

        let success = !matches!(node.content.outcome, Some(Outcome::Failed) | Some(Outcome::Abandoned));
        for model in &node.observations.models_used {
            if store
                .bump_model_stats(model, success, node.metadata.tokens, node.metadata.cost_usd)
                .is_ok()
            {
                updated += 1;
            }
        }

        for decision in &node.daemon.decisions {
            if store.record_decision(Some(id.as_str()), decision).is_ok() {
                updated += 1;
            }
        }
    }

    JobResult::ok(start, updated, format!("updated {updated} aggregate rows across {} nodes", ids.len()))
}

/// Recompute `relevance` for every non-archived node and archive those
/// that fall below `archive_threshold` (§4.8, "Relevance decay + archive").
pub fn run_relevance_decay(store: &Store, config: &ConsolidationConfig) -> JobResult {
    let start = Utc::now();
    let ids = match store.all_active_node_ids() {
        Ok(ids) => ids,
        Err(err) => return JobResult::err(start, 0, "could not load active node set", err.to_string()),
    };

    let mut processed = 0usize;
    let mut archived = 0usize;
    for id in &ids {
        let Ok(inputs) = store.decay_inputs(id) else { continue };
        let Ok(node) = store.get_node(id) else { continue };

        let now = Utc::now();
        let age_days = ((now - inputs.analyzed_at).num_seconds() as f64 / 86_400.0).max(0.0);
        let access_days = ((now - inputs.last_accessed_at).num_seconds() as f64 / 86_400.0).max(0.0);
        let (importance, confidence) = importance_and_confidence(&node.extra);

        let relevance = compute_relevance(
            RelevanceInputs {
                age_days,
                access_days,
                edge_count: inputs.edge_count,
                importance,
                confidence,
            },
            config.decay_k,
        );

        let should_archive = relevance < config.archive_threshold;
        if store.set_relevance(id, relevance, should_archive).is_ok() {
            processed += 1;
            if should_archive {
                archived += 1;
            }
        }
    }

    JobResult::ok(start, processed, format!("recomputed relevance for {processed} nodes, archived {archived}"))
}

/// Nodes with no first-class `importance`/`confidence` fields default
/// to neutral values (§9: fields the schema accretes but this daemon
/// doesn't model explicitly live in `extra`).
fn importance_and_confidence(extra: &serde_json::Value) -> (f64, f64) {
    let importance = extra.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.0);
    let confidence = extra.get("confidence").and_then(|v| v.as_f64()).unwrap_or(0.5);
    (importance, confidence)
}

/// Sample relevant nodes and draw unconnected `RELATES_TO` edges from
/// semantic neighbors (§4.8, "Creative association"). Nodes without an
/// embedding for `config.embedding_model` are skipped rather than
/// failing the whole run.
pub fn run_creative_association(store: &Store, config: &ConsolidationConfig) -> JobResult {
    let start = Utc::now();
    let pool = match store.nodes_with_min_relevance(
        config.creative_association_min_relevance,
        config.creative_association_sample_size,
    ) {
        Ok(p) => p,
        Err(err) => return JobResult::err(start, 0, "could not sample relevance pool", err.to_string()),
    };

    let mut edges_created = 0usize;
    for id in &pool {
        let embedding = match store.embedding_for(id, &config.embedding_model) {
            Ok(Some(vector)) => vector,
            Ok(None) => continue,
            Err(_) => continue,
        };

        let mut excluded = HashSet::new();
        excluded.insert(id.clone());
        let matches = match store.search_semantic(&embedding, &config.embedding_model, config.neighbors_per_node, &excluded, 0.0) {
            Ok(m) => m,
            Err(err) => return JobResult::err(start, edges_created, "semantic search failed", err.to_string()),
        };

        let mut created_for_node = 0usize;
        for candidate in matches {
            if created_for_node >= config.max_edges_per_node {
                break;
            }
            if store.has_edge(id, &candidate.node_id).unwrap_or(true) {
                continue;
            }
            let edge = Edge {
                source: id.clone(),
                target: candidate.node_id,
                edge_type: EdgeType::RelatesTo,
                creator: EdgeCreator::Daemon,
                confidence: candidate.similarity,
                similarity: Some(candidate.similarity),
                metadata: serde_json::Value::Null,
                created_at: Utc::now(),
            };
            if store.insert_edge_if_absent(&edge).unwrap_or(false) {
                edges_created += 1;
                created_for_node += 1;
            }
        }
    }

    JobResult::ok(
        start,
        edges_created,
        format!("created {edges_created} creative-association edges across {} sampled nodes", pool.len()),
    )
}
