//! The fingerprint store: a persistent multiset of postings indexed by hash
//! token, polymorphic over a durable SQLite backend and an in-memory one.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::EngineResult;
use crate::hashing::{Fingerprint, HashToken};

pub type TrackId = i64;

/// One row of the `tracks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
}

/// One posting returned by a lookup: the track it belongs to and the
/// anchor's frame index at ingest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub track_id: TrackId,
    pub anchor_frame: u32,
}

/// The capability set every backend (durable or in-memory) must provide.
///
/// Implementations must make `add_track` and `delete_track` atomic: on any
/// failure partway through, none of that call's postings become visible.
pub trait FingerprintStore: Send + Sync {
    /// Inserts (or reuses) a track by name and appends its fingerprints as
    /// postings. Returns the number of postings inserted. Re-using an
    /// existing name is not an error — its postings are appended, never
    /// deduplicated.
    fn add_track(&self, name: &str, fingerprints: &[Fingerprint]) -> EngineResult<u64>;

    /// Returns every posting stored under `token`, across all tracks.
    fn lookup(&self, token: HashToken) -> EngineResult<Vec<(String, Posting)>>;

    /// Deletes a track and all of its postings. Returns whether the track
    /// existed and how many postings were removed with it.
    fn delete_track(&self, name: &str) -> EngineResult<(bool, u64)>;

    /// Removes every track and posting.
    fn clear(&self) -> EngineResult<()>;

    fn track_count(&self) -> EngineResult<u64>;

    fn posting_count(&self) -> EngineResult<u64>;

    /// Track names, sorted ascending.
    fn list_tracks(&self) -> EngineResult<Vec<String>>;
}
