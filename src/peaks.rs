//! 2-D local-maximum peak picking over a spectrogram.

use crate::spectrogram::Spectrogram;
use tracing::debug;

/// A local maximum of the spectrogram: `(frame_idx, bin_idx)`. This ordering
/// is canonical and must never be swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peak {
    pub frame_idx: u32,
    pub bin_idx: u16,
}

/// Finds peak candidates via a square 2-D maximum filter (border treated as
/// `-inf`, i.e. "constant" fill), then keeps only those at or above the 75th
/// percentile of the positive candidates' magnitudes.
///
/// Equality with the neighbourhood maximum is the rule, not strict
/// inequality: flat plateaus in the spectrogram legitimately produce more
/// than one peak at the same magnitude. This is accepted, not a bug.
pub fn find_peaks(spectrogram: &Spectrogram, neighborhood: usize, percentile: f32) -> Vec<Peak> {
    if spectrogram.is_empty() || spectrogram.num_bins() == 0 {
        return Vec::new();
    }

    let num_frames = spectrogram.num_frames();
    let num_bins = spectrogram.num_bins();
    let radius = neighborhood / 2;

    let mut candidates: Vec<(u32, u16, f32)> = Vec::new();

    for t in 0..num_frames {
        for b in 0..num_bins {
            let mag = spectrogram.magnitudes[t][b];
            if mag <= 0.0 {
                continue;
            }

            let t_start = t.saturating_sub(radius);
            let t_end = (t + radius).min(num_frames);
            let b_start = b.saturating_sub(radius);
            let b_end = (b + radius).min(num_bins);

            let mut neighborhood_max = f32::NEG_INFINITY;
            for nt in t_start..t_end {
                for nb in b_start..b_end {
                    let v = spectrogram.magnitudes[nt][nb];
                    if v > neighborhood_max {
                        neighborhood_max = v;
                    }
                }
            }

            if mag == neighborhood_max {
                candidates.push((t as u32, b as u16, mag));
            }
        }
    }

    if candidates.is_empty() {
        debug!("no positive peak candidates");
        return Vec::new();
    }

    let threshold = percentile_of(&candidates, percentile);

    let peaks: Vec<Peak> = candidates
        .into_iter()
        .filter(|(_, _, mag)| *mag >= threshold)
        .map(|(t, b, _)| Peak { frame_idx: t, bin_idx: b })
        .collect();

    debug!(count = peaks.len(), threshold, "peaks picked");
    peaks
}

/// Linear-interpolated percentile (matching `numpy.percentile`'s default)
/// over the candidates' magnitudes.
fn percentile_of(candidates: &[(u32, u16, f32)], percentile: f32) -> f32 {
    let mut mags: Vec<f32> = candidates.iter().map(|(_, _, m)| *m).collect();
    mags.sort_by(|a, b| a.partial_cmp(b).unwrap());

    if mags.len() == 1 {
        return mags[0];
    }

    let rank = (percentile / 100.0) * (mags.len() - 1) as f32;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        mags[lo]
    } else {
        let frac = rank - lo as f32;
        mags[lo] + (mags[hi] - mags[lo]) * frac
    }
}
