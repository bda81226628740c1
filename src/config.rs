//! Tunable engine parameters and the TOML config file that can supply them.
//!
//! Changing any field except `min_matches` and `db_path` invalidates
//! previously stored fingerprints — they were hashed under the old
//! parameters and will not compare equal to fingerprints produced under
//! the new ones.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Engine-wide DSP and matching parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Working sample rate, in Hz. Audio is resampled to this rate before
    /// fingerprinting.
    pub sample_rate: u32,
    /// FFT window length, in samples.
    pub window_size: usize,
    /// Hop length between successive STFT frames, in samples.
    pub hop_size: usize,
    /// Side length, in pixels, of the square neighbourhood used by the peak
    /// picker's 2-D maximum filter.
    pub peak_neighborhood: usize,
    /// Magnitude percentile (0-100) used to threshold peak candidates.
    pub peak_percentile: f32,
    /// Target-zone lower bound, in seconds.
    pub target_zone_min_secs: f32,
    /// Target-zone upper bound, in seconds.
    pub target_zone_max_secs: f32,
    /// Default viability threshold for the matcher.
    pub min_matches: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate: 22050,
            window_size: 4096,
            hop_size: 1024,
            peak_neighborhood: 20,
            peak_percentile: 75.0,
            target_zone_min_secs: 1.0,
            target_zone_max_secs: 5.0,
            min_matches: 5,
        }
    }
}

impl Config {
    /// Frame-offset lower bound of the target zone, derived from
    /// `target_zone_min_secs` at this config's hop size and sample rate.
    pub fn target_zone_min_frames(&self) -> u32 {
        ((self.target_zone_min_secs * self.sample_rate as f32) / self.hop_size as f32) as u32
    }

    /// Frame-offset upper bound (exclusive) of the target zone.
    pub fn target_zone_max_frames(&self) -> u32 {
        ((self.target_zone_max_secs * self.sample_rate as f32) / self.hop_size as f32) as u32
    }

    /// Loads a config from a TOML file, falling back to defaults for any
    /// field the file does not set. Missing file is not an error — callers
    /// that want "file or defaults" should check existence themselves and
    /// call `Config::default()` instead of this, or treat a read error as
    /// "use defaults" depending on the caller's tolerance.
    pub fn from_toml_file(path: &Path) -> EngineResult<Config> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read config file {}: {}", path.display(), e)))?;
        toml::from_str(&text)
            .map_err(|e| EngineError::Config(format!("failed to parse config file {}: {}", path.display(), e)))
    }
}
