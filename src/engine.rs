//! The explicit engine context: config + store, passed by reference to every
//! operation. No process-wide singletons — construct one per process (or one
//! per test, over a `MemoryStore`).

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::Config;
use crate::error::EngineResult;
use crate::hashing::create_hashes;
use crate::matcher::{self, RecognizeMatch};
use crate::peaks::find_peaks;
use crate::spectrogram::create_spectrogram;
use crate::store::{FingerprintStore, MemoryStore, SqliteStore};

/// Snapshot of store-wide counts, exposed to administrative callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub tracks: u64,
    pub postings: u64,
}

pub struct Engine {
    config: Config,
    store: Arc<dyn FingerprintStore>,
}

impl Engine {
    pub fn new(config: Config, store: Arc<dyn FingerprintStore>) -> Self {
        Engine { config, store }
    }

    /// An engine over a durable SQLite-backed store at `path`.
    pub fn open_sqlite(config: Config, path: &Path) -> EngineResult<Self> {
        let store = Arc::new(SqliteStore::open(path)?);
        Ok(Engine::new(config, store))
    }

    /// An engine over a fresh in-memory store — handy for tests and
    /// filesystem-free embedding.
    pub fn in_memory(config: Config) -> Self {
        Engine::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fingerprints `pcm` and appends the postings to `name`'s track,
    /// creating the track if it doesn't already exist. Returns the number of
    /// postings inserted — zero for PCM shorter than the FFT window, which
    /// is a normal outcome, not an error.
    #[instrument(skip(self, pcm), fields(track = name, samples = pcm.len()))]
    pub fn ingest(&self, name: &str, pcm: &[f32]) -> EngineResult<u64> {
        let fingerprints = self.fingerprint(pcm);
        let inserted = self.store.add_track(name, &fingerprints)?;
        info!(track = name, inserted, "ingest complete");
        Ok(inserted)
    }

    /// Fingerprints `pcm` and resolves the best-matching track, if any meets
    /// `min_matches`.
    #[instrument(skip(self, pcm), fields(samples = pcm.len(), min_matches))]
    pub fn recognize(&self, pcm: &[f32], min_matches: u32) -> EngineResult<Option<RecognizeMatch>> {
        if self.store.track_count()? == 0 {
            return Ok(None);
        }

        let fingerprints = self.fingerprint(pcm);
        if fingerprints.is_empty() {
            return Ok(None);
        }

        matcher::recognize(self.store.as_ref(), &fingerprints, min_matches)
    }

    /// Recognizes using the engine's configured default `min_matches`.
    pub fn recognize_default(&self, pcm: &[f32]) -> EngineResult<Option<RecognizeMatch>> {
        self.recognize(pcm, self.config.min_matches)
    }

    pub fn stats(&self) -> EngineResult<Stats> {
        Ok(Stats { tracks: self.store.track_count()?, postings: self.store.posting_count()? })
    }

    pub fn list(&self) -> EngineResult<Vec<String>> {
        self.store.list_tracks()
    }

    pub fn delete(&self, name: &str) -> EngineResult<(bool, u64)> {
        self.store.delete_track(name)
    }

    pub fn clear(&self) -> EngineResult<()> {
        self.store.clear()
    }

    fn fingerprint(&self, pcm: &[f32]) -> Vec<crate::hashing::Fingerprint> {
        let spectrogram = create_spectrogram(pcm, self.config.sample_rate, self.config.window_size, self.config.hop_size);
        if spectrogram.is_empty() {
            return Vec::new();
        }
        let peaks = find_peaks(&spectrogram, self.config.peak_neighborhood, self.config.peak_percentile);
        create_hashes(
            &peaks,
            &spectrogram.bin_freqs,
            self.config.target_zone_min_frames(),
            self.config.target_zone_max_frames(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as u32;
        (0..n).map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin()).collect()
    }

    fn chord(freqs: &[f32], seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        let mut out = vec![0.0_f32; n];
        for &freq in freqs {
            for (i, s) in sine(freq, seconds, sample_rate).into_iter().enumerate() {
                out[i] += s;
            }
        }
        out
    }

    #[test]
    fn self_recognition_has_high_confidence() {
        let engine = Engine::in_memory(Config::default());
        let pcm = sine(440.0, 10.0, engine.config().sample_rate);

        let inserted = engine.ingest("A", &pcm).unwrap();
        assert!(inserted > 0);

        let result = engine.recognize_default(&pcm).unwrap().unwrap();
        assert_eq!(result.track_name, "A");
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.match_count, inserted);
    }

    #[test]
    fn sub_segment_recognizes_the_source_track() {
        let engine = Engine::in_memory(Config::default());
        let sr = engine.config().sample_rate;
        let pcm = chord(&[261.63, 329.63, 392.0], 12.0, sr);
        engine.ingest("full", &pcm).unwrap();

        let start = (sr as f32 * 3.0) as usize;
        let end = start + (sr as f32 * 5.0) as usize;
        let snippet = &pcm[start..end];

        let result = engine.recognize_default(snippet).unwrap();
        assert!(result.is_some());
        assert_eq!(result.unwrap().track_name, "full");
    }

    #[test]
    fn chord_ordering_does_not_cross_match() {
        let engine = Engine::in_memory(Config::default());
        let sr = engine.config().sample_rate;
        let c = chord(&[261.63, 329.63, 392.00], 6.0, sr);
        let d = chord(&[293.66, 369.99, 440.00], 6.0, sr);

        engine.ingest("C", &c).unwrap();
        engine.ingest("D", &d).unwrap();

        let result = engine.recognize_default(&c).unwrap().unwrap();
        assert_eq!(result.track_name, "C");
    }

    #[test]
    fn deletion_isolates_tracks() {
        let engine = Engine::in_memory(Config::default());
        let sr = engine.config().sample_rate;
        let a = sine(440.0, 8.0, sr);
        let b = sine(660.0, 8.0, sr);
        engine.ingest("A", &a).unwrap();
        engine.ingest("B", &b).unwrap();

        let (found, _) = engine.delete("A").unwrap();
        assert!(found);

        assert!(engine.recognize_default(&a).unwrap().is_none());
        assert_eq!(engine.recognize_default(&b).unwrap().unwrap().track_name, "B");
    }

    #[test]
    fn clear_wipes_the_store() {
        let engine = Engine::in_memory(Config::default());
        engine.ingest("A", &sine(440.0, 5.0, engine.config().sample_rate)).unwrap();
        engine.clear().unwrap();

        let stats = engine.stats().unwrap();
        assert_eq!(stats.tracks, 0);
        assert_eq!(stats.postings, 0);
        assert!(engine.list().unwrap().is_empty());
    }

    #[test]
    fn duplicate_ingest_doubles_postings() {
        let engine = Engine::in_memory(Config::default());
        let pcm = sine(440.0, 5.0, engine.config().sample_rate);
        let first = engine.ingest("X", &pcm).unwrap();
        let second = engine.ingest("X", &pcm).unwrap();
        assert_eq!(first, second);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.postings, first + second);

        let (found, deleted) = engine.delete("X").unwrap();
        assert!(found);
        assert_eq!(deleted, first + second);
    }

    #[test]
    fn silent_ingest_yields_few_or_no_postings() {
        let engine = Engine::in_memory(Config::default());
        let silence = vec![0.0_f32; engine.config().sample_rate as usize * 10];
        let inserted = engine.ingest("silent", &silence).unwrap();
        assert_eq!(inserted, 0);

        let stats = engine.stats().unwrap();
        assert_eq!(stats.tracks, 1);
        assert_eq!(stats.postings, inserted);
    }

    #[test]
    fn recognize_against_empty_store_is_no_match_without_fingerprinting_failure() {
        let engine = Engine::in_memory(Config::default());
        let pcm = sine(440.0, 5.0, engine.config().sample_rate);
        assert!(engine.recognize_default(&pcm).unwrap().is_none());
    }
}
