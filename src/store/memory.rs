//! In-memory `FingerprintStore`, for tests and filesystem-free embedding.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{FingerprintStore, Posting, Track, TrackId};
use crate::error::EngineResult;
use crate::hashing::{Fingerprint, HashToken};

#[derive(Default)]
struct Inner {
    tracks: Vec<Track>,
    next_id: TrackId,
    // hash -> postings, secondary index by track for deletion/counting.
    by_hash: HashMap<HashToken, Vec<Posting>>,
    by_track: HashMap<TrackId, Vec<HashToken>>,
}

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore { inner: RwLock::new(Inner { next_id: 1, ..Default::default() }) }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FingerprintStore for MemoryStore {
    fn add_track(&self, name: &str, fingerprints: &[Fingerprint]) -> EngineResult<u64> {
        let mut inner = self.inner.write().unwrap();

        let track_id = match inner.tracks.iter().find(|t| t.name == name) {
            Some(t) => t.id,
            None => {
                let id = inner.next_id;
                inner.next_id += 1;
                inner.tracks.push(Track { id, name: name.to_string() });
                id
            }
        };

        let mut inserted: u64 = 0;
        for fp in fingerprints {
            let posting = Posting { track_id, anchor_frame: fp.anchor_frame };
            inner.by_hash.entry(fp.hash).or_default().push(posting);
            inner.by_track.entry(track_id).or_default().push(fp.hash);
            inserted += 1;
        }

        Ok(inserted)
    }

    fn lookup(&self, token: HashToken) -> EngineResult<Vec<(String, Posting)>> {
        let inner = self.inner.read().unwrap();
        let postings = match inner.by_hash.get(&token) {
            Some(p) => p.clone(),
            None => return Ok(Vec::new()),
        };
        let mut out = Vec::with_capacity(postings.len());
        for posting in postings {
            if let Some(track) = inner.tracks.iter().find(|t| t.id == posting.track_id) {
                out.push((track.name.clone(), posting));
            }
        }
        Ok(out)
    }

    fn delete_track(&self, name: &str) -> EngineResult<(bool, u64)> {
        let mut inner = self.inner.write().unwrap();

        let track_id = match inner.tracks.iter().position(|t| t.name == name) {
            Some(idx) => inner.tracks.remove(idx).id,
            None => return Ok((false, 0)),
        };

        let hashes = inner.by_track.remove(&track_id).unwrap_or_default();
        let mut deleted: u64 = 0;
        for hash in &hashes {
            if let Some(postings) = inner.by_hash.get_mut(hash) {
                let before = postings.len();
                postings.retain(|p| p.track_id != track_id);
                deleted += (before - postings.len()) as u64;
                if postings.is_empty() {
                    inner.by_hash.remove(hash);
                }
            }
        }

        Ok((true, deleted))
    }

    fn clear(&self) -> EngineResult<()> {
        let mut inner = self.inner.write().unwrap();
        inner.tracks.clear();
        inner.by_hash.clear();
        inner.by_track.clear();
        Ok(())
    }

    fn track_count(&self) -> EngineResult<u64> {
        Ok(self.inner.read().unwrap().tracks.len() as u64)
    }

    fn posting_count(&self) -> EngineResult<u64> {
        Ok(self.inner.read().unwrap().by_hash.values().map(|v| v.len() as u64).sum())
    }

    fn list_tracks(&self) -> EngineResult<Vec<String>> {
        let mut names: Vec<String> = self.inner.read().unwrap().tracks.iter().map(|t| t.name.clone()).collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(hash: u64, anchor_frame: u32) -> Fingerprint {
        Fingerprint { hash, anchor_frame }
    }

    #[test]
    fn add_track_increases_posting_count() {
        let store = MemoryStore::new();
        let inserted = store.add_track("A", &[fp(1, 0), fp(2, 5)]).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.posting_count().unwrap(), 2);
    }

    #[test]
    fn reinserting_same_name_appends_not_duplicates_track_row() {
        let store = MemoryStore::new();
        store.add_track("X", &[fp(1, 0)]).unwrap();
        store.add_track("X", &[fp(1, 0)]).unwrap();
        assert_eq!(store.track_count().unwrap(), 1);
        assert_eq!(store.posting_count().unwrap(), 2);
    }

    #[test]
    fn empty_fingerprints_insert_nothing() {
        let store = MemoryStore::new();
        let inserted = store.add_track("Silent", &[]).unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(store.track_count().unwrap(), 1);
        assert_eq!(store.posting_count().unwrap(), 0);
    }

    #[test]
    fn delete_isolates_other_tracks() {
        let store = MemoryStore::new();
        store.add_track("A", &[fp(1, 0), fp(2, 1)]).unwrap();
        store.add_track("B", &[fp(1, 0)]).unwrap();

        let (found, deleted) = store.delete_track("A").unwrap();
        assert!(found);
        assert_eq!(deleted, 2);

        let remaining = store.lookup(1).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, "B");

        assert!(store.lookup(2).unwrap().is_empty());
    }

    #[test]
    fn delete_missing_track_reports_not_found() {
        let store = MemoryStore::new();
        let (found, deleted) = store.delete_track("nope").unwrap();
        assert!(!found);
        assert_eq!(deleted, 0);
    }

    #[test]
    fn clear_resets_everything() {
        let store = MemoryStore::new();
        store.add_track("A", &[fp(1, 0)]).unwrap();
        store.clear().unwrap();
        assert_eq!(store.track_count().unwrap(), 0);
        assert_eq!(store.posting_count().unwrap(), 0);
        assert!(store.list_tracks().unwrap().is_empty());
    }

    #[test]
    fn list_tracks_sorted_ascending() {
        let store = MemoryStore::new();
        store.add_track("zebra", &[]).unwrap();
        store.add_track("apple", &[]).unwrap();
        assert_eq!(store.list_tracks().unwrap(), vec!["apple", "zebra"]);
    }
}
