use crate::config::{Config, EmbeddingProvider};
use crate::error::Result;
use crate::pidfile::PidFile;
use brain_analyzer::{AnalyzerAdapter, AnalyzerRequest, EmbeddingClient, EmbeddingConfig, EmbeddingProviderKind};
use brain_scheduler::{ConsolidationConfig, CronSchedule, ScheduleSet, Scheduler};
use brain_store::Store;
use brain_watcher::{SessionWatcher, SpokeDir, WatcherConfig};
use brain_worker::{RequestBuilder, WorkerPool, WorkerPoolConfig};
use brain_types::Job;
use chrono::Duration as ChronoDuration;
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::Duration;

/// Translates `DaemonConfig`'s analyzer fields into a request per job
/// (§4.4's input contract is daemon config, not worker logic, mirroring
/// [`brain_worker::RequestBuilder`]'s own doc comment).
struct ConfigRequestBuilder {
    prompt_file: PathBuf,
    provider: String,
    model: String,
    credentials_env: Vec<(String, String)>,
    timeout: Duration,
}

impl RequestBuilder for ConfigRequestBuilder {
    fn build(&self, job: &Job, computer: &str) -> AnalyzerRequest {
        let segment = job.segment.clone().expect("worker pool only builds requests for segment jobs");
        AnalyzerRequest {
            segment,
            computer: computer.to_string(),
            prompt_file: self.prompt_file.clone(),
            skills_dir: None,
            provider: self.provider.clone(),
            model: self.model.clone(),
            credentials_env: self.credentials_env.clone(),
            timeout: self.timeout,
        }
    }
}

/// Credential environment variable names for each embedding/analysis
/// provider, passed through to the analyzer subprocess untouched.
fn credentials_env(config: &Config) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    if let Some(key) = &config.daemon.embedding_api_key {
        let var_name = match config.daemon.embedding_provider {
            EmbeddingProvider::Openai => "OPENAI_API_KEY",
            EmbeddingProvider::Openrouter => "OPENROUTER_API_KEY",
            EmbeddingProvider::Ollama | EmbeddingProvider::Mock => "EMBEDDING_API_KEY",
        };
        vars.push((var_name.to_string(), key.clone()));
    }
    vars
}

fn embedding_config(config: &Config) -> EmbeddingConfig {
    let provider = match config.daemon.embedding_provider {
        EmbeddingProvider::Ollama => EmbeddingProviderKind::Ollama,
        EmbeddingProvider::Openai => EmbeddingProviderKind::Openai,
        EmbeddingProvider::Openrouter => EmbeddingProviderKind::Openrouter,
        EmbeddingProvider::Mock => EmbeddingProviderKind::Mock,
    };
    EmbeddingConfig {
        provider,
        model: config.daemon.embedding_model.clone(),
        api_key: config.daemon.embedding_api_key.clone(),
        base_url: config.daemon.embedding_base_url.clone(),
    }
}

fn spoke_dirs(config: &Config) -> Vec<SpokeDir> {
    config
        .spokes
        .iter()
        .map(|spoke| SpokeDir {
            name: spoke.name.clone(),
            path: spoke.path_buf(),
            enabled: spoke.enabled,
        })
        .collect()
}

/// Process-wide state, initialized once at daemon start and torn down
/// at stop; every component is handed what it needs explicitly rather
/// than reaching for a global (§5).
pub struct Daemon {
    _pidfile: PidFile,
    store: Store,
    watcher: Option<SessionWatcher>,
    pool: Option<WorkerPool>,
    scheduler: Scheduler,
}

impl Daemon {
    pub fn start(config: Config, pidfile_path: &std::path::Path, analyzer_binary: PathBuf, logs_dir: PathBuf) -> Result<Self> {
        config.validate()?;
        let pidfile = PidFile::acquire(pidfile_path)?;

        let db_path = config.hub.database_path().join("brain.sqlite3");
        let blobs_dir = config.hub.database_path().join("blobs");
        let store = Store::open(&db_path, &blobs_dir)?;

        let watcher_config = WatcherConfig {
            hub: config.hub.sessions_path(),
            spokes: spoke_dirs(&config),
            local_hostname: hostname(),
            idle_timeout: ChronoDuration::minutes(config.daemon.idle_timeout_minutes as i64),
            sweep_interval: Duration::from_secs(5),
            detector: brain_core::DetectorConfig::default(),
        };
        let watcher = SessionWatcher::start(watcher_config, store.queue())?;

        let analyzer = Arc::new(AnalyzerAdapter::new(
            analyzer_binary,
            logs_dir,
            config.daemon.max_retries,
            Duration::from_secs(config.daemon.retry_delay_seconds as u64),
            Duration::from_secs(300),
        ));
        let requests: Arc<dyn RequestBuilder> = Arc::new(ConfigRequestBuilder {
            prompt_file: PathBuf::from(&config.daemon.prompt_file),
            provider: config.daemon.provider.clone(),
            model: config.daemon.model.clone(),
            credentials_env: credentials_env(&config),
            timeout: Duration::from_secs(config.daemon.analysis_timeout_minutes as u64 * 60),
        });
        let pool_config = WorkerPoolConfig {
            worker_count: config.daemon.parallel_workers as usize,
            poll_interval: Duration::from_millis(500),
            lease_minutes: brain_store::DEFAULT_LEASE_MINUTES,
            job_backoff_base: Duration::from_secs(config.daemon.retry_delay_seconds as u64),
            job_backoff_max: Duration::from_secs(300),
            local_hostname: hostname(),
        };
        let embeddings = Arc::new(EmbeddingClient::new(embedding_config(&config)));
        let (events_tx, _events_rx) = channel();
        let pool = WorkerPool::start(pool_config, store.clone(), analyzer, embeddings, requests, events_tx)?;

        let schedules = ScheduleSet {
            reanalysis: CronSchedule::parse(&config.daemon.reanalysis_schedule)?,
            connection_discovery: CronSchedule::parse(&config.daemon.connection_discovery_schedule)?,
            pattern_aggregation: CronSchedule::parse(&config.daemon.pattern_aggregation_schedule)?,
            relevance_decay: CronSchedule::parse(&config.daemon.pattern_aggregation_schedule)?,
            creative_association: CronSchedule::parse(&config.daemon.clustering_schedule)?,
        };
        let consolidation_config = ConsolidationConfig {
            reanalysis_limit: config.daemon.reanalysis_limit as usize,
            connection_discovery_limit: config.daemon.connection_discovery_limit as usize,
            connection_discovery_cooldown_hours: config.daemon.connection_discovery_cooldown_hours as i64,
            embedding_model: config.daemon.embedding_model.clone(),
            ..ConsolidationConfig::default()
        };
        let scheduler = Scheduler::new(schedules, store.clone(), consolidation_config);

        Ok(Self {
            _pidfile: pidfile,
            store,
            watcher: Some(watcher),
            pool: Some(pool),
            scheduler,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Runs any consolidation jobs due at `now` (§9, "testable tick").
    pub fn tick(&self, now: chrono::DateTime<chrono::Utc>) -> Vec<(&'static str, brain_scheduler::JobResult)> {
        self.scheduler.tick(now)
    }

    /// Stops the watcher thread and joins every worker (§5: "torn down
    /// at stop"). The PID file is released when `self` drops.
    pub fn stop(mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(pool) = self.pool.take() {
            pool.stop();
        }
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DaemonConfig, HubConfig};

    fn base_config(dir: &std::path::Path) -> Config {
        Config {
            hub: HubConfig {
                sessions_dir: dir.join("sessions").to_string_lossy().to_string(),
                database_dir: dir.join("data").to_string_lossy().to_string(),
                web_ui_port: 8765,
            },
            spokes: Vec::new(),
            daemon: DaemonConfig::default(),
            query: None,
        }
    }

    #[test]
    fn starts_and_stops_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
        let config = base_config(dir.path());
        let pidfile_path = dir.path().join("daemon.pid");
        let logs_dir = dir.path().join("logs");

        let daemon = Daemon::start(config, &pidfile_path, PathBuf::from("/bin/true"), logs_dir).unwrap();
        assert!(pidfile_path.exists());
        let results = daemon.tick(chrono::Utc::now());
        assert!(results.len() <= 5);
        daemon.stop();
        assert!(!pidfile_path.exists());
    }
}
