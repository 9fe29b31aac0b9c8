use crate::error::Result;
use crate::recognition::{computer_for_path, JsonlSessionRecognizer, PathRecognizer, SpokeDir};
use crate::state::{fingerprint_leaf_chain, FileState, StateTable};
use crate::trigger::trigger_initial_job;
use brain_core::{parse_session_file, DetectorConfig};
use brain_store::JobQueue;
use chrono::{Duration as ChronoDuration, Utc};
use notify::{Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// A directory to watch: the hub itself, or one enabled spoke (§4.6).
#[derive(Debug, Clone)]
pub struct WatchRoot {
    pub path: PathBuf,
    pub computer: String,
}

/// Tunables for the watcher (§4.6).
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub hub: PathBuf,
    pub spokes: Vec<SpokeDir>,
    pub local_hostname: String,
    pub idle_timeout: ChronoDuration,
    /// How often the background thread wakes to check for idle
    /// sessions even with no filesystem events. Always clamped to at
    /// most 5 seconds so `stop()` returns promptly (§5).
    pub sweep_interval: Duration,
    pub detector: DetectorConfig,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            hub: PathBuf::new(),
            spokes: Vec::new(),
            local_hostname: "localhost".to_string(),
            idle_timeout: ChronoDuration::minutes(10),
            sweep_interval: Duration::from_secs(5),
            detector: DetectorConfig::default(),
        }
    }
}

/// A running watcher: owns the `PollWatcher` and its dedicated thread.
/// Dropping or calling `stop` signals the thread to exit after at most
/// one `sweep_interval` tick (§5: "cancels within ≤ 5 s").
pub struct SessionWatcher {
    _watcher: PollWatcher,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SessionWatcher {
    pub fn start(config: WatcherConfig, queue: JobQueue) -> Result<Self> {
        let (tx_fs, rx_fs) = channel::<Event>();
        let notify_config = notify::Config::default().with_poll_interval(Duration::from_millis(1000));
        let mut watcher = PollWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    let _ = tx_fs.send(event);
                }
            },
            notify_config,
        )?;

        if config.hub.exists() {
            watcher.watch(&config.hub, RecursiveMode::Recursive)?;
        }
        for spoke in config.spokes.iter().filter(|s| s.enabled) {
            if spoke.path.exists() {
                watcher.watch(&spoke.path, RecursiveMode::Recursive)?;
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let sweep_interval = config.sweep_interval.min(Duration::from_secs(5));
        let states: Arc<Mutex<StateTable>> = Arc::new(Mutex::new(StateTable::new()));
        let recognizer: Arc<dyn PathRecognizer> = Arc::new(JsonlSessionRecognizer);

        let handle = std::thread::Builder::new()
            .name("session-watcher".to_string())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loop {
                    if stop_thread.load(Ordering::SeqCst) {
                        return;
                    }
                    match rx_fs.recv_timeout(sweep_interval) {
                        Ok(event) => handle_fs_event(&event, &recognizer, &states),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                    sweep_idle(&config, &states, &queue);
                }));
                if result.is_err() {
                    log::error!("session watcher thread panicked");
                }
            })?;

        Ok(Self {
            _watcher: watcher,
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the watcher thread to exit. Blocks until it does, which
    /// per `sweep_interval` is bounded to at most 5 seconds (§5).
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SessionWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_fs_event(event: &Event, recognizer: &Arc<dyn PathRecognizer>, states: &Arc<Mutex<StateTable>>) {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return;
    }
    for path in &event.paths {
        if !recognizer.is_transcript_path(path) {
            continue;
        }
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let now = Utc::now();
        let mut states = states.lock().unwrap();
        states
            .entry(path.clone())
            .and_modify(|s| s.touch(now, size))
            .or_insert_with(|| FileState::observed(now, size));
    }
}

fn sweep_idle(config: &WatcherConfig, states: &Arc<Mutex<StateTable>>, queue: &JobQueue) {
    let idle_paths: Vec<PathBuf> = {
        let states = states.lock().unwrap();
        states
            .iter()
            .filter(|(_, state)| state.is_idle(Utc::now(), config.idle_timeout))
            .map(|(path, _)| path.clone())
            .collect()
    };

    for path in idle_paths {
        let mut state = {
            let states = states.lock().unwrap();
            match states.get(&path) {
                Some(s) => s.clone(),
                None => continue,
            }
        };

        let session = match parse_session_file(&path) {
            Ok(session) => session,
            Err(err) => {
                log::warn!("idle sweep could not parse {}: {err}", path.display());
                continue;
            }
        };
        state.fingerprint = fingerprint_leaf_chain(&session);
        let _ = computer_for_path(&path, &config.spokes, &config.local_hostname);

        match trigger_initial_job(&path, &mut state, queue, &config.detector) {
            Ok(Some(segment)) => {
                log::info!(
                    "enqueued initial job for {} [{}..{}]",
                    path.display(),
                    segment.start.as_str(),
                    segment.end.as_str()
                );
            }
            Ok(None) => {}
            Err(err) => log::warn!("idle sweep trigger failed for {}: {err}", path.display()),
        }

        let mut states = states.lock().unwrap();
        states.insert(path, state);
    }
}
