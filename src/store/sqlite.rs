//! Durable `FingerprintStore` backed by SQLite (via `rusqlite`, bundled).
//!
//! All access is serialized behind a single `Mutex<Connection>`. SQLite's
//! own WAL mode permits concurrent readers across separate connections, but
//! one shared `rusqlite::Connection` cannot be driven concurrently from
//! multiple threads without a connection pool; at this engine's scale
//! (≤10^4 tracks) a mutex is the simplest correct choice, not a bottleneck.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, instrument};

use super::{FingerprintStore, Posting, TrackId};
use crate::error::{EngineError, EngineResult};
use crate::hashing::{Fingerprint, HashToken};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file at `path` and ensures
    /// the schema exists.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    /// An in-memory SQLite database, useful for tests that want the real
    /// backend's SQL semantics without a file on disk.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&conn)?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    fn init_schema(conn: &Connection) -> EngineResult<()> {
        conn.execute_batch(
            "BEGIN;
             CREATE TABLE IF NOT EXISTS tracks (
                 id INTEGER PRIMARY KEY,
                 name TEXT UNIQUE NOT NULL,
                 created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE IF NOT EXISTS fingerprints (
                 id INTEGER PRIMARY KEY,
                 hash_token INTEGER NOT NULL,
                 track_id INTEGER NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                 anchor_time REAL NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints (hash_token);
             CREATE INDEX IF NOT EXISTS idx_fingerprints_track_id ON fingerprints (track_id);
             COMMIT;",
        )?;
        Ok(())
    }

    fn find_track(conn: &Connection, name: &str) -> EngineResult<Option<TrackId>> {
        conn.query_row("SELECT id FROM tracks WHERE name = ?1", params![name], |row| row.get(0))
            .optional()
            .map_err(EngineError::from)
    }
}

impl FingerprintStore for SqliteStore {
    #[instrument(skip(self, fingerprints), fields(count = fingerprints.len()))]
    fn add_track(&self, name: &str, fingerprints: &[Fingerprint]) -> EngineResult<u64> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute("INSERT OR IGNORE INTO tracks (name) VALUES (?1)", params![name])?;
        let track_id: TrackId = tx.query_row("SELECT id FROM tracks WHERE name = ?1", params![name], |row| row.get(0))?;

        let mut inserted: u64 = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprints (hash_token, track_id, anchor_time) VALUES (?1, ?2, ?3)",
            )?;
            for fp in fingerprints {
                let hash_i64 = fp.hash as i64;
                stmt.execute(params![hash_i64, track_id, fp.anchor_frame as f64])?;
                inserted += 1;
            }
        }

        tx.commit()?;
        debug!(track_id, inserted, "track postings committed");
        Ok(inserted)
    }

    fn lookup(&self, token: HashToken) -> EngineResult<Vec<(String, Posting)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT s.name, s.id, f.anchor_time
             FROM fingerprints f JOIN tracks s ON f.track_id = s.id
             WHERE f.hash_token = ?1",
        )?;
        let hash_i64 = token as i64;
        let rows = stmt.query_map(params![hash_i64], |row| {
            let name: String = row.get(0)?;
            let track_id: TrackId = row.get(1)?;
            let anchor_time: f64 = row.get(2)?;
            Ok((name, Posting { track_id, anchor_frame: anchor_time as u32 }))
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn delete_track(&self, name: &str) -> EngineResult<(bool, u64)> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let track_id = match Self::find_track(&tx, name)? {
            Some(id) => id,
            None => return Ok((false, 0)),
        };

        let deleted: u64 = tx.query_row(
            "SELECT COUNT(*) FROM fingerprints WHERE track_id = ?1",
            params![track_id],
            |row| row.get::<_, i64>(0),
        )? as u64;

        tx.execute("DELETE FROM tracks WHERE id = ?1", params![track_id])?;
        tx.commit()?;
        info!(track = name, deleted, "track deleted");
        Ok((true, deleted))
    }

    fn clear(&self) -> EngineResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM fingerprints; DELETE FROM tracks;")?;
        info!("store cleared");
        Ok(())
    }

    fn track_count(&self) -> EngineResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn posting_count(&self) -> EngineResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM fingerprints", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn list_tracks(&self) -> EngineResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT name FROM tracks ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
