use crate::error::Result;
use rusqlite::Connection;

/// One numbered schema change (§4.3: "migrations are idempotent,
/// numbered, and applied in strict ascending order at open time").
struct Migration {
    id: i64,
    name: &'static str,
    sql: &'static str,
    /// A migration whose capability may not be present in this SQLite
    /// build (FTS5). Its failure is recorded and does not block later
    /// migrations.
    skippable: bool,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        name: "core tables",
        sql: r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            version INTEGER NOT NULL,
            project TEXT,
            task_type TEXT,
            outcome TEXT,
            observed_at TEXT,
            analyzed_at TEXT NOT NULL,
            relevance REAL NOT NULL DEFAULT 1.0,
            archived INTEGER NOT NULL DEFAULT 0,
            last_accessed_at TEXT NOT NULL,
            computer TEXT,
            session_file TEXT NOT NULL,
            start_entry_id TEXT NOT NULL,
            end_entry_id TEXT NOT NULL,
            blob_path TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_nodes_project ON nodes(project);
        CREATE INDEX IF NOT EXISTS idx_nodes_outcome ON nodes(outcome);
        CREATE INDEX IF NOT EXISTS idx_nodes_archived ON nodes(archived);
        CREATE INDEX IF NOT EXISTS idx_nodes_analyzed_at ON nodes(analyzed_at);
        CREATE INDEX IF NOT EXISTS idx_nodes_relevance ON nodes(relevance);

        CREATE TABLE IF NOT EXISTS edges (
            source TEXT NOT NULL,
            target TEXT NOT NULL,
            edge_type TEXT NOT NULL,
            creator TEXT NOT NULL,
            confidence REAL NOT NULL,
            similarity REAL,
            metadata TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(source, target, edge_type)
        );
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);

        CREATE TABLE IF NOT EXISTS node_embeddings (
            node_id TEXT NOT NULL,
            model TEXT NOT NULL,
            input_text TEXT NOT NULL,
            schema_version INTEGER NOT NULL,
            dimensions INTEGER NOT NULL,
            vector BLOB NOT NULL,
            PRIMARY KEY (node_id, model)
        );

        CREATE TABLE IF NOT EXISTS analysis_queue (
            id TEXT PRIMARY KEY,
            job_type TEXT NOT NULL,
            priority INTEGER NOT NULL,
            session_file TEXT NOT NULL,
            start_entry_id TEXT,
            end_entry_id TEXT,
            context TEXT,
            status TEXT NOT NULL,
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL,
            worker_id TEXT,
            lease_expires_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_error TEXT,
            result_node_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_queue_dispatch ON analysis_queue(status, priority, created_at, id);
        CREATE INDEX IF NOT EXISTS idx_queue_dedup ON analysis_queue(session_file, start_entry_id, end_entry_id, status);

        CREATE TABLE IF NOT EXISTS insights (
            kind TEXT NOT NULL,
            model TEXT,
            tool TEXT,
            pattern TEXT NOT NULL,
            frequency INTEGER NOT NULL,
            mean_confidence REAL NOT NULL,
            severity TEXT NOT NULL,
            workaround_hint TEXT,
            prompt_text TEXT,
            prompt_included INTEGER NOT NULL DEFAULT 0,
            prompt_version TEXT,
            PRIMARY KEY (kind, model, tool, pattern)
        );

        CREATE TABLE IF NOT EXISTS failure_patterns (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern TEXT NOT NULL,
            frequency INTEGER NOT NULL,
            last_seen_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS model_stats (
            model TEXT PRIMARY KEY,
            total_segments INTEGER NOT NULL DEFAULT 0,
            success_count INTEGER NOT NULL DEFAULT 0,
            failure_count INTEGER NOT NULL DEFAULT 0,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            total_cost_usd REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS cluster (
            id TEXT PRIMARY KEY,
            label TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS cluster_member (
            cluster_id TEXT NOT NULL,
            node_id TEXT NOT NULL,
            PRIMARY KEY (cluster_id, node_id)
        );

        CREATE TABLE IF NOT EXISTS decisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            node_id TEXT,
            decision TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS capabilities (
            name TEXT PRIMARY KEY,
            available INTEGER NOT NULL
        );
        "#,
        skippable: false,
    },
    Migration {
        id: 2,
        name: "full-text search over node summaries",
        sql: r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS node_fts USING fts5(
            node_id UNINDEXED,
            summary,
            tags,
            content=''
        );
        "#,
        skippable: true,
    },
    Migration {
        id: 4,
        name: "connection discovery cooldown",
        sql: r#"
        CREATE TABLE IF NOT EXISTS connection_cooldown (
            node_id TEXT PRIMARY KEY,
            last_run_at TEXT NOT NULL
        );
        "#,
        skippable: false,
    },
];

/// Capability names a migration may gate. Checked at runtime by
/// operations that need them (full-text search) rather than assumed
/// present. Semantic search needs no capability gate: it scans
/// `node_embeddings` directly, a table migration 1 always creates.
pub const CAPABILITY_FTS: &str = "fts";

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            skipped INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )?;

    for migration in MIGRATIONS {
        let already: i64 = conn.query_row(
            "SELECT COUNT(*) FROM migrations WHERE id = ?1",
            [migration.id],
            |row| row.get(0),
        )?;
        if already > 0 {
            continue;
        }

        let now = chrono::Utc::now().to_rfc3339();
        match conn.execute_batch(migration.sql) {
            Ok(()) => {
                conn.execute(
                    "INSERT INTO migrations (id, name, applied_at, skipped) VALUES (?1, ?2, ?3, 0)",
                    rusqlite::params![migration.id, migration.name, now],
                )?;
                record_capability_for(conn, migration.id, true)?;
            }
            Err(err) if migration.skippable => {
                log::warn!(
                    "migration {} ({}) skipped: required capability unavailable: {}",
                    migration.id,
                    migration.name,
                    err
                );
                conn.execute(
                    "INSERT INTO migrations (id, name, applied_at, skipped) VALUES (?1, ?2, ?3, 1)",
                    rusqlite::params![migration.id, migration.name, now],
                )?;
                record_capability_for(conn, migration.id, false)?;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

fn record_capability_for(conn: &Connection, migration_id: i64, available: bool) -> Result<()> {
    let name = match migration_id {
        2 => CAPABILITY_FTS,
        _ => return Ok(()),
    };
    conn.execute(
        "INSERT INTO capabilities (name, available) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET available = ?2",
        rusqlite::params![name, available as i64],
    )?;
    Ok(())
}

pub fn capability_available(conn: &Connection, name: &str) -> Result<bool> {
    let available: Option<i64> = conn
        .query_row(
            "SELECT available FROM capabilities WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .ok();
    Ok(available.unwrap_or(0) != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[test]
    fn core_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
