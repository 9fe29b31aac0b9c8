//! Consolidation scheduler (C8): cron-driven reanalysis, connection
//! discovery, pattern aggregation, relevance decay and creative
//! association over the graph [`brain_store::Store`] builds.

mod cron;
mod decay;
mod error;
mod jobs;
mod scheduler;

pub use cron::CronSchedule;
pub use decay::{compute_relevance, RelevanceInputs, DEFAULT_DECAY_K};
pub use error::{Error, Result};
pub use jobs::{
    run_connection_discovery, run_creative_association, run_pattern_aggregation, run_reanalysis,
    run_relevance_decay, ConsolidationConfig, JobResult,
};
pub use scheduler::{ScheduleSet, Scheduler};

#[cfg(test)]
mod tests {
    use super::*;
    use brain_store::Store;
    use brain_types::{
        Classification, Content, DaemonMeta, EntryId, LessonBuckets, Node, NodeId,
        NodeMetadata as Metadata, Observations, Relevance, Semantic, SegmentTriple,
    };
    use chrono::{Duration, Utc};

    fn sample_node(id: &str, analyzed_at: chrono::DateTime<Utc>) -> Node {
        Node {
            id: NodeId::from(id.to_string()),
            version: 1,
            source: SegmentTriple {
                session_file: format!("/s-{id}.jsonl").into(),
                start: EntryId::new("e1"),
                end: EntryId::new("e2"),
            },
            computer: "laptop".into(),
            classification: Classification::default(),
            content: Content { summary: format!("segment {id}"), ..Default::default() },
            lessons: LessonBuckets::default(),
            observations: Observations::default(),
            metadata: Metadata {
                tokens: 100,
                cost_usd: 0.01,
                wall_duration_secs: 1.0,
                observed_at: analyzed_at,
                analyzed_at,
                analyzer_version: "v1".into(),
            },
            semantic: Semantic::default(),
            daemon: DaemonMeta::default(),
            signals: None,
            relevance: Relevance::fresh(analyzed_at),
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn reanalysis_enqueues_oldest_nodes_first() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        store.upsert_segment(&sample_node("old", now - Duration::days(90)), &[], None).unwrap();
        store.upsert_segment(&sample_node("new", now - Duration::days(1)), &[], None).unwrap();

        let result = run_reanalysis(&store, &ConsolidationConfig::default());
        assert_eq!(result.items_processed, 2);
        assert!(result.error.is_none());

        let first = store.queue().dequeue("w1", 30).unwrap().unwrap();
        assert_eq!(first.session_file.to_string_lossy(), "/s-old.jsonl");
    }

    #[test]
    fn reanalysis_does_not_duplicate_an_already_queued_job() {
        let store = Store::open_in_memory().unwrap();
        let node = sample_node("n1", Utc::now() - Duration::days(30));
        store.upsert_segment(&node, &[], None).unwrap();

        run_reanalysis(&store, &ConsolidationConfig::default());
        let result = run_reanalysis(&store, &ConsolidationConfig::default());
        assert_eq!(result.items_processed, 0);
    }

    #[test]
    fn connection_discovery_skips_nodes_still_in_cooldown() {
        let store = Store::open_in_memory().unwrap();
        let now = Utc::now();
        let mut a = sample_node("a", now);
        let mut b = sample_node("b", now);
        a.lessons.tool.push("grep times out on huge repos".into());
        b.lessons.tool.push("grep times out on huge repos".into());
        store.upsert_segment(&a, &[], None).unwrap();
        store.upsert_segment(&b, &[], None).unwrap();

        let config = ConsolidationConfig::default();
        let first_run = run_connection_discovery(&store, &config);
        assert!(first_run.items_processed > 0, "expected a lesson-reinforcement edge");

        let second_run = run_connection_discovery(&store, &config);
        assert_eq!(second_run.items_processed, 0, "cooldown should suppress rediscovery");
    }

    #[test]
    fn relevance_decay_archives_old_untouched_nodes() {
        let store = Store::open_in_memory().unwrap();
        let mut node = sample_node("old", Utc::now() - Duration::days(90));
        node.relevance.last_accessed_at = Utc::now() - Duration::days(90);
        store.upsert_segment(&node, &[], None).unwrap();

        let result = run_relevance_decay(&store, &ConsolidationConfig::default());
        assert_eq!(result.items_processed, 1);

        let fetched = store.get_node(&NodeId::from("old".to_string())).unwrap();
        assert!(fetched.relevance.score < 0.2);
    }

    #[test]
    fn creative_association_skips_nodes_without_an_embedding() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_segment(&sample_node("a", Utc::now()), &[], None).unwrap();
        store.set_relevance(&NodeId::from("a".to_string()), 0.9, false).unwrap();

        let result = run_creative_association(&store, &ConsolidationConfig::default());
        assert_eq!(result.items_processed, 0);
        assert!(result.error.is_none());
    }
}
