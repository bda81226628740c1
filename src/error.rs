//! Crate-wide error type.

use thiserror::Error;

/// Errors that can surface from the fingerprinting engine.
///
/// DSP on well-formed PCM never produces an `Err`: short or silent input is a
/// normal outcome (zero fingerprints, "no match"), not a failure. Only the
/// store and the audio adapter can actually fail.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}
