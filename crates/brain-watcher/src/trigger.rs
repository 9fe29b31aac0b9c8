use crate::error::Result;
use crate::state::FileState;
use brain_core::{detect_boundaries, parse_session_file, segments_from_boundaries, DetectorConfig};
use brain_store::{JobInput, JobQueue};
use brain_types::{EntryId, JobType, SegmentTriple};
use std::path::Path;

/// Parse `session_file`, locate the range from `state.last_analyzed_leaf`
/// (exclusive) to the current leaf, and enqueue an `initial` job for it
/// if the range is non-empty and no equivalent job is already queued
/// (§4.6, §4.7 dedup). Returns the segment enqueued, if any.
///
/// "Unanalyzed range" is approximated as the final segment of the
/// current boundary partition: the one opened by the boundary closest
/// to the leaf. This matches the common case (a session idles once,
/// at its leaf) without tracking exactly which prior segments were
/// already analyzed, which is the job queue's job, not the watcher's.
pub fn trigger_initial_job(
    session_file: &Path,
    state: &mut FileState,
    queue: &JobQueue,
    config: &DetectorConfig,
) -> Result<Option<SegmentTriple>> {
    let session = parse_session_file(session_file)?;
    let Some(leaf) = session.leaf() else {
        return Ok(None);
    };

    if state.last_analyzed_leaf.as_ref() == Some(leaf) {
        return Ok(None);
    }

    let boundaries = detect_boundaries(&session, config);
    let segments = segments_from_boundaries(&session, &boundaries);
    let Some(segment) = segments.last() else {
        return Ok(None);
    };

    if segment.end() != leaf {
        return Ok(None);
    }

    if queue.has_existing_job(session_file, Some(segment.start().as_str()), Some(segment.end().as_str()))? {
        return Ok(None);
    }

    queue.enqueue(JobInput {
        job_type: JobType::Initial,
        session_file: session_file.to_path_buf(),
        segment: Some(segment.triple.clone()),
        context: serde_json::Value::Null,
        max_retries: 3,
    })?;

    state.last_analyzed_leaf = Some(leaf.clone());
    Ok(Some(segment.triple.clone()))
}

pub fn current_leaf(session_file: &Path) -> Result<Option<EntryId>> {
    let session = parse_session_file(session_file)?;
    Ok(session.leaf().cloned())
}
