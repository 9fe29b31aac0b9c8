use crate::error::Result;
use crate::queue::JobQueue;
use crate::schema;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The open database handle and blob directory, shared by the graph
/// store and the job queue (§5: "the open database handle... initialized
/// at daemon start and torn down at stop; both are passed explicitly to
/// components"). Cloning a `Store` clones the `Arc`, not the connection.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
    pub(crate) data_dir: PathBuf,
}

impl Store {
    pub fn open(db_path: &Path, data_dir: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: std::env::temp_dir().join(format!("brain-store-{:x}", rand::random::<u64>())),
        })
    }

    /// A job queue backed by the same connection (§4.5: "persisted in
    /// the same relational database as the graph store").
    pub fn queue(&self) -> JobQueue {
        JobQueue {
            conn: Arc::clone(&self.conn),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub(crate) fn capability(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        schema::capability_available(&conn, name)
    }
}
