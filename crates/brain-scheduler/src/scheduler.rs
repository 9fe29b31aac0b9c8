use crate::cron::CronSchedule;
use crate::jobs::{
    run_connection_discovery, run_creative_association, run_pattern_aggregation, run_reanalysis,
    run_relevance_decay, ConsolidationConfig, JobResult,
};
use brain_store::Store;
use chrono::{DateTime, Utc};

/// One cron expression per consolidation job (§4.8: "Runs four jobs,
/// each on its own cron expression"). Decay shares pattern
/// aggregation's schedule since §6 names no separate key for it; see
/// the grounding ledger for the full reasoning.
#[derive(Debug, Clone)]
pub struct ScheduleSet {
    pub reanalysis: CronSchedule,
    pub connection_discovery: CronSchedule,
    pub pattern_aggregation: CronSchedule,
    pub relevance_decay: CronSchedule,
    pub creative_association: CronSchedule,
}

/// Drives the five consolidation jobs off their cron schedules. Holds
/// no clock of its own: callers pass `now` to [`Scheduler::tick`] so
/// tests can drive arbitrary instants instead of depending on
/// wall-clock progression (§9, "testable tick").
pub struct Scheduler {
    schedules: ScheduleSet,
    store: Store,
    config: ConsolidationConfig,
}

impl Scheduler {
    pub fn new(schedules: ScheduleSet, store: Store, config: ConsolidationConfig) -> Self {
        Self { schedules, store, config }
    }

    /// Run every job whose schedule matches `now`'s minute, in a fixed
    /// order (reanalysis, connection discovery, pattern aggregation,
    /// decay, creative association). Returns one entry per job that
    /// fired this minute.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<(&'static str, JobResult)> {
        let mut results = Vec::new();

        if self.schedules.reanalysis.matches(now) {
            results.push(("reanalysis", run_reanalysis(&self.store, &self.config)));
        }
        if self.schedules.connection_discovery.matches(now) {
            results.push(("connection_discovery", run_connection_discovery(&self.store, &self.config)));
        }
        if self.schedules.pattern_aggregation.matches(now) {
            results.push(("pattern_aggregation", run_pattern_aggregation(&self.store)));
        }
        if self.schedules.relevance_decay.matches(now) {
            results.push(("relevance_decay", run_relevance_decay(&self.store, &self.config)));
        }
        if self.schedules.creative_association.matches(now) {
            results.push(("creative_association", run_creative_association(&self.store, &self.config)));
        }

        for (name, result) in &results {
            if let Some(error) = &result.error {
                log::warn!("consolidation job {name} degraded: {error}");
            } else {
                log::info!("consolidation job {name} processed {} items: {}", result.items_processed, result.details);
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedules(minute_hour: &str) -> ScheduleSet {
        let schedule = CronSchedule::parse(minute_hour).unwrap();
        ScheduleSet {
            reanalysis: schedule.clone(),
            connection_discovery: schedule.clone(),
            pattern_aggregation: schedule.clone(),
            relevance_decay: schedule.clone(),
            creative_association: schedule,
        }
    }

    #[test]
    fn tick_runs_only_due_jobs() {
        let store = Store::open_in_memory().unwrap();
        let scheduler = Scheduler::new(schedules("0 2 * * *"), store, ConsolidationConfig::default());

        let due = Utc.with_ymd_and_hms(2026, 1, 1, 2, 0, 0).unwrap();
        let not_due = Utc.with_ymd_and_hms(2026, 1, 1, 2, 1, 0).unwrap();

        assert_eq!(scheduler.tick(due).len(), 5);
        assert_eq!(scheduler.tick(not_due).len(), 0);
    }
}
