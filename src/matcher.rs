//! Time-coherent offset-histogram matching against the fingerprint store.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::error::EngineResult;
use crate::hashing::Fingerprint;
use crate::store::FingerprintStore;

/// The outcome of a successful recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizeMatch {
    pub track_name: String,
    pub match_count: u64,
    pub confidence: f64,
}

/// Looks up every query fingerprint, accumulates a per-track histogram of
/// `db_anchor_frame - query_anchor_frame` offsets, and returns the track
/// whose histogram mode is largest and at least `min_matches` — or `None`
/// if no candidate clears that bar. Ties are broken by track name
/// ascending.
///
/// Offsets are frame deltas (exact integers), not seconds: identical in
/// spirit to the spec's `db_anchor_time - query_anchor_time` seconds
/// computation, but exact by construction instead of relying on
/// floating-point quantization lining up.
#[instrument(skip(store, query_fps), fields(query_len = query_fps.len()))]
pub fn recognize(
    store: &dyn FingerprintStore,
    query_fps: &[Fingerprint],
    min_matches: u32,
) -> EngineResult<Option<RecognizeMatch>> {
    if query_fps.is_empty() {
        return Ok(None);
    }

    // track_name -> offset -> count
    let mut histograms: HashMap<String, HashMap<i64, u64>> = HashMap::new();

    for fp in query_fps {
        for (track_name, posting) in store.lookup(fp.hash)? {
            let offset = posting.anchor_frame as i64 - fp.anchor_frame as i64;
            *histograms.entry(track_name).or_default().entry(offset).or_insert(0) += 1;
        }
    }

    if histograms.is_empty() {
        debug!("no postings matched any query hash");
        return Ok(None);
    }

    let mut best: Option<(String, u64)> = None;
    for (track_name, histogram) in histograms {
        let Some((_, &count)) = histogram.iter().max_by_key(|(&offset, &count)| (count, -offset)) else {
            continue;
        };
        if count < min_matches as u64 {
            continue;
        }
        best = match best {
            None => Some((track_name, count)),
            Some((best_name, best_count)) => {
                if count > best_count || (count == best_count && track_name < best_name) {
                    Some((track_name, count))
                } else {
                    Some((best_name, best_count))
                }
            }
        };
    }

    Ok(best.map(|(track_name, match_count)| RecognizeMatch {
        track_name,
        match_count,
        confidence: match_count as f64 / query_fps.len() as f64,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn fp(hash: u64, anchor_frame: u32) -> Fingerprint {
        Fingerprint { hash, anchor_frame }
    }

    #[test]
    fn empty_query_yields_no_match() {
        let store = MemoryStore::new();
        assert_eq!(recognize(&store, &[], 5).unwrap(), None);
    }

    #[test]
    fn empty_store_yields_no_match() {
        let store = MemoryStore::new();
        let query = vec![fp(1, 0); 10];
        assert_eq!(recognize(&store, &query, 5).unwrap(), None);
    }

    #[test]
    fn exact_match_has_confidence_one() {
        let store = MemoryStore::new();
        let fps: Vec<Fingerprint> = (0..20).map(|i| fp(i, i as u32)).collect();
        store.add_track("A", &fps).unwrap();

        let result = recognize(&store, &fps, 5).unwrap().unwrap();
        assert_eq!(result.track_name, "A");
        assert_eq!(result.match_count, 20);
        assert!((result.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn below_threshold_is_not_viable() {
        let store = MemoryStore::new();
        let fps: Vec<Fingerprint> = (0..3).map(|i| fp(i, i as u32)).collect();
        store.add_track("A", &fps).unwrap();

        assert_eq!(recognize(&store, &fps, 5).unwrap(), None);
    }

    #[test]
    fn picks_highest_scoring_track() {
        let store = MemoryStore::new();
        let a_fps: Vec<Fingerprint> = (0..10).map(|i| fp(i, i as u32)).collect();
        let b_fps: Vec<Fingerprint> = (0..10).map(|i| fp(i, i as u32 + 100)).collect();
        store.add_track("A", &a_fps).unwrap();
        store.add_track("B", &b_fps).unwrap();

        // Query aligned with A: offsets to A are all 0, to B all -100.
        let query = a_fps.clone();
        let result = recognize(&store, &query, 5).unwrap().unwrap();
        assert_eq!(result.track_name, "A");
        assert_eq!(result.match_count, 10);
    }

    #[test]
    fn deterministic_tie_break_by_name() {
        let store = MemoryStore::new();
        let fps: Vec<Fingerprint> = (0..10).map(|i| fp(i, i as u32)).collect();
        store.add_track("beta", &fps).unwrap();
        store.add_track("alpha", &fps).unwrap();

        let result = recognize(&store, &fps, 5).unwrap().unwrap();
        assert_eq!(result.track_name, "alpha");
    }
}
