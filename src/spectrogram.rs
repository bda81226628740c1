//! Short-time Fourier transform magnitude spectrogram.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::f32::consts::PI;
use tracing::debug;

/// Magnitude spectrogram: `magnitudes[frame][bin]`, plus the frame centre
/// times (seconds) and bin centre frequencies (Hz) that index it.
pub struct Spectrogram {
    pub magnitudes: Vec<Vec<f32>>,
    pub frame_times: Vec<f64>,
    pub bin_freqs: Vec<f32>,
}

impl Spectrogram {
    pub fn num_frames(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn num_bins(&self) -> usize {
        self.bin_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

fn hann_window(window_size: usize) -> Vec<f32> {
    let mut window = Vec::with_capacity(window_size);
    if window_size == 0 {
        return window;
    }
    if window_size == 1 {
        window.push(1.0);
        return window;
    }
    for i in 0..window_size {
        window.push(0.5 * (1.0 - (2.0 * PI * i as f32 / (window_size - 1) as f32).cos()));
    }
    window
}

/// Computes the magnitude STFT of `samples` at `sample_rate` with the given
/// window/hop length. Returns a spectrogram with zero frames (not an error)
/// if `samples` is shorter than `window_size`.
pub fn create_spectrogram(
    samples: &[f32],
    sample_rate: u32,
    window_size: usize,
    hop_size: usize,
) -> Spectrogram {
    if samples.len() < window_size || window_size == 0 || hop_size == 0 {
        debug!(samples = samples.len(), window_size, "input too short for a full FFT window");
        return Spectrogram {
            magnitudes: Vec::new(),
            frame_times: Vec::new(),
            bin_freqs: Vec::new(),
        };
    }

    let num_frames = (samples.len() - window_size) / hop_size + 1;
    let num_bins = window_size / 2 + 1;

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_size);
    let window_values = hann_window(window_size);
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); window_size];

    let mut magnitudes: Vec<Vec<f32>> = Vec::with_capacity(num_frames);
    let mut frame_times: Vec<f64> = Vec::with_capacity(num_frames);

    for i in 0..num_frames {
        let start = i * hop_size;
        let chunk = &samples[start..start + window_size];
        for (j, sample) in chunk.iter().enumerate() {
            buffer[j] = Complex::new(*sample * window_values[j], 0.0);
        }

        fft.process(&mut buffer);

        let mut frame_mags = Vec::with_capacity(num_bins);
        for k in 0..num_bins {
            frame_mags.push(buffer[k].norm());
        }
        magnitudes.push(frame_mags);
        frame_times.push(i as f64 * hop_size as f64 / sample_rate as f64);
    }

    let bin_freqs: Vec<f32> = (0..num_bins)
        .map(|k| k as f32 * sample_rate as f32 / window_size as f32)
        .collect();

    debug!(num_frames, num_bins, "spectrogram computed");

    Spectrogram {
        magnitudes,
        frame_times,
        bin_freqs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_frames() {
        let spec = create_spectrogram(&[], 22050, 4096, 1024);
        assert!(spec.is_empty());
    }

    #[test]
    fn short_input_yields_zero_frames() {
        let samples = vec![0.0_f32; 100];
        let spec = create_spectrogram(&samples, 22050, 4096, 1024);
        assert!(spec.is_empty());
    }

    #[test]
    fn bin_count_is_window_half_plus_one() {
        let samples = vec![0.0_f32; 4096 * 3];
        let spec = create_spectrogram(&samples, 22050, 4096, 1024);
        assert_eq!(spec.num_bins(), 4096 / 2 + 1);
    }

    #[test]
    fn sine_tone_peaks_near_expected_bin() {
        let sample_rate = 22050_u32;
        let window_size = 4096;
        let hop_size = 1024;
        let freq = 440.0_f32;
        let samples: Vec<f32> = (0..sample_rate * 2)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        let spec = create_spectrogram(&samples, sample_rate, window_size, hop_size);
        assert!(!spec.is_empty());

        let frame = &spec.magnitudes[spec.num_frames() / 2];
        let (peak_bin, _) = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();
        let peak_freq = spec.bin_freqs[peak_bin];
        assert!((peak_freq - freq).abs() < sample_rate as f32 / window_size as f32 * 2.0);
    }
}
