use crate::error::{Error, Result};
use brain_scheduler::CronSchedule;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Resolve a configured path, expanding a leading `~/` against `HOME`
/// (§6 defaults are all given as `~/...` paths).
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

fn default_sessions_dir() -> String {
    "~/.pi/agent/sessions".to_string()
}

fn default_database_dir() -> String {
    "~/.pi-brain/data".to_string()
}

fn default_web_ui_port() -> u16 {
    8765
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HubConfig {
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,
    #[serde(default = "default_database_dir")]
    pub database_dir: String,
    #[serde(default = "default_web_ui_port")]
    pub web_ui_port: u16,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
            database_dir: default_database_dir(),
            web_ui_port: default_web_ui_port(),
        }
    }
}

impl HubConfig {
    pub fn sessions_path(&self) -> PathBuf {
        expand_tilde(&self.sessions_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        expand_tilde(&self.database_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    Syncthing,
    Rsync,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RsyncOptions {
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpokeConfig {
    pub name: String,
    pub sync_method: SyncMethod,
    pub path: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub rsync_options: Option<RsyncOptions>,
}

impl SpokeConfig {
    pub fn path_buf(&self) -> PathBuf {
        expand_tilde(&self.path)
    }
}

macro_rules! daemon_defaults {
    ($($fn_name:ident -> $ty:ty = $value:expr;)*) => {
        $(fn $fn_name() -> $ty { $value })*
    };
}

daemon_defaults! {
    default_idle_timeout_minutes -> u32 = 10;
    default_parallel_workers -> u32 = 1;
    default_max_retries -> u32 = 3;
    default_retry_delay_seconds -> u32 = 60;
    default_analysis_timeout_minutes -> u32 = 30;
    default_max_concurrent_analysis -> u32 = 1;
    default_max_queue_size -> u32 = 1000;
    default_reanalysis_schedule -> String = "0 2 * * *".to_string();
    default_connection_discovery_schedule -> String = "0 3 * * *".to_string();
    default_pattern_aggregation_schedule -> String = "0 3 * * *".to_string();
    default_clustering_schedule -> String = "0 4 * * *".to_string();
    default_reanalysis_limit -> u32 = 100;
    default_connection_discovery_limit -> u32 = 100;
    default_connection_discovery_lookback_days -> u32 = 7;
    default_connection_discovery_cooldown_hours -> u32 = 24;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Ollama,
    Openai,
    Openrouter,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u32,
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u32,
    #[serde(default = "default_analysis_timeout_minutes")]
    pub analysis_timeout_minutes: u32,
    #[serde(default = "default_max_concurrent_analysis")]
    pub max_concurrent_analysis: u32,
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: u32,
    #[serde(default = "default_reanalysis_schedule")]
    pub reanalysis_schedule: String,
    #[serde(default = "default_connection_discovery_schedule")]
    pub connection_discovery_schedule: String,
    #[serde(default = "default_pattern_aggregation_schedule")]
    pub pattern_aggregation_schedule: String,
    #[serde(default = "default_clustering_schedule")]
    pub clustering_schedule: String,
    #[serde(default = "default_reanalysis_limit")]
    pub reanalysis_limit: u32,
    #[serde(default = "default_connection_discovery_limit")]
    pub connection_discovery_limit: u32,
    #[serde(default = "default_connection_discovery_lookback_days")]
    pub connection_discovery_lookback_days: u32,
    #[serde(default = "default_connection_discovery_cooldown_hours")]
    pub connection_discovery_cooldown_hours: u32,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    #[serde(default)]
    pub embedding_base_url: Option<String>,
    #[serde(default)]
    pub embedding_dimensions: Option<u32>,
    pub provider: String,
    pub model: String,
    pub prompt_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub spokes: Vec<SpokeConfig>,
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub query: Option<QueryConfig>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            idle_timeout_minutes: default_idle_timeout_minutes(),
            parallel_workers: default_parallel_workers(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            analysis_timeout_minutes: default_analysis_timeout_minutes(),
            max_concurrent_analysis: default_max_concurrent_analysis(),
            max_queue_size: default_max_queue_size(),
            reanalysis_schedule: default_reanalysis_schedule(),
            connection_discovery_schedule: default_connection_discovery_schedule(),
            pattern_aggregation_schedule: default_pattern_aggregation_schedule(),
            clustering_schedule: default_clustering_schedule(),
            reanalysis_limit: default_reanalysis_limit(),
            connection_discovery_limit: default_connection_discovery_limit(),
            connection_discovery_lookback_days: default_connection_discovery_lookback_days(),
            connection_discovery_cooldown_hours: default_connection_discovery_cooldown_hours(),
            embedding_provider: EmbeddingProvider::Mock,
            embedding_model: "mock".to_string(),
            embedding_api_key: None,
            embedding_base_url: None,
            embedding_dimensions: None,
            provider: "mock".to_string(),
            model: "mock".to_string(),
            prompt_file: "prompt.md".to_string(),
        }
    }
}

impl Config {
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;
        Ok(base.join("pi-brain").join("config.toml"))
    }

    /// §6: "Validators: ports in [1,65535]; positive-integer checks
    /// where noted; cron expressions are exactly 5 whitespace-separated
    /// fields; no duplicate spoke names; rsync spokes require `source`;
    /// `rsyncOptions.extraArgs` rejects entries equal to or prefixed by
    /// `--rsh` / `-e` (code-execution hazard)."
    pub fn validate(&self) -> Result<()> {
        if self.hub.web_ui_port == 0 {
            return Err(Error::Config("hub.webUiPort must be in [1,65535]".to_string()));
        }

        let mut seen_names = HashSet::new();
        for spoke in &self.spokes {
            if !seen_names.insert(spoke.name.clone()) {
                return Err(Error::Config(format!("duplicate spoke name: {}", spoke.name)));
            }
            if spoke.sync_method == SyncMethod::Rsync && spoke.source.is_none() {
                return Err(Error::Config(format!("rsync spoke '{}' requires a source", spoke.name)));
            }
            if let Some(options) = &spoke.rsync_options {
                for arg in &options.extra_args {
                    if arg == "--rsh" || arg.starts_with("--rsh=") || arg == "-e" || arg.starts_with("-e") {
                        return Err(Error::Config(format!(
                            "spoke '{}' rsyncOptions.extraArgs contains a forbidden --rsh/-e override: {arg}",
                            spoke.name
                        )));
                    }
                }
            }
        }

        for (label, value) in [
            ("daemon.idleTimeoutMinutes", self.daemon.idle_timeout_minutes),
            ("daemon.parallelWorkers", self.daemon.parallel_workers),
            ("daemon.maxRetries", self.daemon.max_retries),
            ("daemon.analysisTimeoutMinutes", self.daemon.analysis_timeout_minutes),
            ("daemon.maxConcurrentAnalysis", self.daemon.max_concurrent_analysis),
            ("daemon.maxQueueSize", self.daemon.max_queue_size),
            ("daemon.reanalysisLimit", self.daemon.reanalysis_limit),
            ("daemon.connectionDiscoveryLimit", self.daemon.connection_discovery_limit),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{label} must be a positive integer")));
            }
        }

        for (label, expr) in [
            ("daemon.reanalysisSchedule", &self.daemon.reanalysis_schedule),
            ("daemon.connectionDiscoverySchedule", &self.daemon.connection_discovery_schedule),
            ("daemon.patternAggregationSchedule", &self.daemon.pattern_aggregation_schedule),
            ("daemon.clusteringSchedule", &self.daemon.clustering_schedule),
        ] {
            CronSchedule::parse(expr).map_err(|err| Error::Config(format!("{label}: {err}")))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        [daemon]
        embeddingProvider = "mock"
        embeddingModel = "mock"
        provider = "mock"
        model = "mock"
        promptFile = "prompt.md"
        "#
    }

    #[test]
    fn defaults_validate() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.hub.web_ui_port, 8765);
    }

    #[test]
    fn rejects_bad_cron() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.daemon.reanalysis_schedule = "not a cron".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_spoke_names() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.spokes.push(SpokeConfig {
            name: "laptop".to_string(),
            sync_method: SyncMethod::Syncthing,
            path: "~/spokes/laptop".to_string(),
            source: None,
            enabled: true,
            schedule: None,
            rsync_options: None,
        });
        config.spokes.push(SpokeConfig {
            name: "laptop".to_string(),
            sync_method: SyncMethod::Syncthing,
            path: "~/spokes/laptop2".to_string(),
            source: None,
            enabled: true,
            schedule: None,
            rsync_options: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rsync_spoke_without_source_is_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.spokes.push(SpokeConfig {
            name: "desktop".to_string(),
            sync_method: SyncMethod::Rsync,
            path: "~/spokes/desktop".to_string(),
            source: None,
            enabled: true,
            schedule: None,
            rsync_options: None,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn rsync_extra_args_reject_rsh_override() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.spokes.push(SpokeConfig {
            name: "desktop".to_string(),
            sync_method: SyncMethod::Rsync,
            path: "~/spokes/desktop".to_string(),
            source: Some("user@desktop:~/.pi/agent/sessions".to_string()),
            enabled: true,
            schedule: None,
            rsync_options: Some(RsyncOptions { extra_args: vec!["--rsh=nc".to_string()] }),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let toml_src = format!("{}\nnotAField = true\n", minimal_toml());
        let result: std::result::Result<Config, _> = toml::from_str(&toml_src);
        assert!(result.is_err());
    }
}
