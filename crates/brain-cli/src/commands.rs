use crate::args::{Cli, Commands, DaemonCommand, IndexCommand, OutputFormat, QueueCommand};
use anyhow::{anyhow, Context, Result};
use brain_daemon::{Config, Daemon};
use brain_store::{JobInput, NodeFilter, Store};
use brain_types::{EntryId, JobType, SegmentTriple};
use std::io::Write;
use std::path::PathBuf;

pub fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => brain_daemon::Config::default_path().context("resolving default config path")?,
    };

    match cli.command {
        Commands::Daemon { command } => handle_daemon(command, &config_path),
        Commands::Queue { command } => handle_queue(command, &config_path, cli.format),
        Commands::Index { command } => handle_index(command, &config_path, cli.format),
        Commands::Export { project, include_archived, output } => {
            handle_export(&config_path, project, include_archived, output)
        }
    }
}

fn open_store(config_path: &PathBuf) -> Result<Store> {
    let config = Config::load_from(config_path).with_context(|| format!("loading config from {}", config_path.display()))?;
    let db_path = config.hub.database_path().join("brain.sqlite3");
    let blobs_dir = config.hub.database_path().join("blobs");
    Store::open(&db_path, &blobs_dir).context("opening graph store")
}

fn handle_daemon(command: DaemonCommand, config_path: &PathBuf) -> Result<()> {
    match command {
        DaemonCommand::Start => {
            let config = Config::load_from(config_path)
                .with_context(|| format!("loading config from {}", config_path.display()))?;
            let pidfile_path = config.hub.database_path().join("daemon.pid");
            let logs_dir = config.hub.database_path().join("analyzer-logs");
            // §6 names no explicit analyzer-binary config key; resolved
            // via PATH like the rsync/syncthing binaries spoke sync
            // already assumes, rather than inventing an unlisted field.
            let analyzer_binary = PathBuf::from("brain-analyze");

            let daemon = Daemon::start(config, &pidfile_path, analyzer_binary, logs_dir)?;
            log::info!("daemon started, pid file at {}", pidfile_path.display());

            let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
            #[cfg(unix)]
            {
                let running = std::sync::Arc::clone(&running);
                ctrlc::set_handler(move || {
                    running.store(false, std::sync::atomic::Ordering::SeqCst);
                })
                .context("installing signal handler")?;
            }

            while running.load(std::sync::atomic::Ordering::SeqCst) {
                daemon.tick(chrono::Utc::now());
                std::thread::sleep(std::time::Duration::from_secs(30));
            }

            log::info!("shutting down");
            daemon.stop();
            Ok(())
        }
        DaemonCommand::Stop => {
            let config = Config::load_from(config_path)
                .with_context(|| format!("loading config from {}", config_path.display()))?;
            let pidfile_path = config.hub.database_path().join("daemon.pid");
            let pid: u32 = std::fs::read_to_string(&pidfile_path)
                .with_context(|| format!("reading {}", pidfile_path.display()))?
                .trim()
                .parse()
                .context("parsing pid file contents")?;

            #[cfg(unix)]
            {
                let res = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
                if res != 0 {
                    return Err(anyhow!("failed to signal pid {pid}"));
                }
            }
            println!("sent SIGTERM to pid {pid}");
            Ok(())
        }
    }
}

fn handle_queue(command: QueueCommand, config_path: &PathBuf, format: OutputFormat) -> Result<()> {
    let store = open_store(config_path)?;
    let queue = store.queue();

    match command {
        QueueCommand::Status => {
            let counts = queue.counts_by_status()?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "pending": counts.pending,
                        "running": counts.running,
                        "completed": counts.completed,
                        "failed": counts.failed,
                    })
                ),
                OutputFormat::Plain => {
                    println!("pending:   {}", counts.pending);
                    println!("running:   {}", counts.running);
                    println!("completed: {}", counts.completed);
                    println!("failed:    {}", counts.failed);
                }
            }
            Ok(())
        }
        QueueCommand::Enqueue { session_file, start, end } => {
            let job = queue.enqueue(JobInput {
                job_type: JobType::UserTriggered,
                session_file: session_file.clone(),
                segment: Some(SegmentTriple {
                    session_file,
                    start: EntryId::from(start),
                    end: EntryId::from(end),
                }),
                context: serde_json::Value::Null,
                max_retries: 3,
            })?;
            println!("enqueued job {}", job.id);
            Ok(())
        }
        QueueCommand::Cancel { job_id } => {
            queue.cancel_job(&job_id)?;
            println!("cancelled {job_id}");
            Ok(())
        }
        QueueCommand::Retry { job_id } => {
            queue.retry_job(&job_id)?;
            println!("requeued {job_id}");
            Ok(())
        }
    }
}

fn handle_index(command: IndexCommand, config_path: &PathBuf, format: OutputFormat) -> Result<()> {
    let store = open_store(config_path)?;
    match command {
        IndexCommand::Rebuild => {
            let count = store.rebuild_index()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "rebuilt": count })),
                OutputFormat::Plain => println!("rebuilt {count} nodes from blob store"),
            }
            Ok(())
        }
    }
}

fn handle_export(
    config_path: &PathBuf,
    project: Option<String>,
    include_archived: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(config_path)?;
    let filter = NodeFilter {
        project,
        include_archived,
        ..NodeFilter::default()
    };

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?),
        None => Box::new(std::io::stdout()),
    };

    let mut offset = 0;
    let mut total = 0usize;
    loop {
        let page = store.search_by_filter(&filter, 200, offset)?;
        for id in &page.items {
            let node = store.get_node(id)?;
            writeln!(writer, "{}", serde_json::to_string(&node)?)?;
            total += 1;
        }
        match page.next_offset {
            Some(next) => offset = next,
            None => break,
        }
    }

    log::info!("exported {total} nodes");
    Ok(())
}
