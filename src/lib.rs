//! Shazam-style audio fingerprinting and matching core.
//!
//! Ingest ("learn") turns a full reference track's PCM into fingerprints
//! persisted in a [`store::FingerprintStore`]; recognize ("query") turns a
//! short sample's PCM into fingerprints and resolves the best-matching
//! track via [`matcher::recognize`]. [`Engine`] wires both paths over one
//! store handle.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod matcher;
pub mod peaks;
pub mod spectrogram;
pub mod store;

pub use config::Config;
pub use engine::{Engine, Stats};
pub use error::{EngineError, EngineResult};
pub use matcher::RecognizeMatch;
