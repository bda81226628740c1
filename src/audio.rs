//! Audio adapter: decodes a container file to mono PCM at the engine's
//! working sample rate.
//!
//! This is the external "decoder collaborator" the core specification treats
//! as out of scope, implemented here so the crate is runnable end to end.
//! Grounded on the teacher's `audio_loader.rs` for the symphonia decode loop,
//! extended to actually resample (the teacher only warned and passed
//! mismatched-rate samples through unchanged).

use std::fs::File;
use std::path::Path;

use rubato::{Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult};

/// Decodes `path`, downmixes to mono, and resamples to `target_sample_rate`.
pub fn decode_and_resample(path: &Path, target_sample_rate: u32) -> EngineResult<Vec<f32>> {
    let (samples, source_rate) = decode_to_mono(path)?;

    if source_rate == target_sample_rate || samples.is_empty() {
        return Ok(samples);
    }

    debug!(source_rate, target_sample_rate, "resampling");
    resample(&samples, source_rate, target_sample_rate)
}

fn decode_to_mono(path: &Path) -> EngineResult<(Vec<f32>, u32)> {
    let src = File::open(path).map_err(|e| EngineError::Decode(format!("failed to open {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| EngineError::Decode(format!("unsupported format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL && t.codec_params.sample_rate.is_some())
        .ok_or_else(|| EngineError::Decode("no compatible audio track found".to_string()))?;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| EngineError::Decode(format!("failed to make decoder: {}", e)))?;

    let track_id = track.id;
    let mut mono: Vec<f32> = Vec::new();
    let mut source_rate = track.codec_params.sample_rate.unwrap_or(0);

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => {
                return Err(EngineError::Decode("track reset mid-stream is not supported".to_string()));
            }
            Err(err) => return Err(EngineError::Decode(format!("error reading packet: {}", err))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                source_rate = decoded.spec().rate;
                mono.extend(downmix_to_mono(&decoded));
            }
            Err(SymphoniaError::DecodeError(err)) => {
                warn!(error = %err, "decode error on packet, skipping");
            }
            Err(err) => return Err(EngineError::Decode(format!("fatal decoding error: {}", err))),
        }
    }

    Ok((mono, source_rate))
}

fn downmix_to_mono(buffer: &AudioBufferRef) -> Vec<f32> {
    let channels = buffer.spec().channels.count().max(1);
    let frames = buffer.frames();
    let mut mono = Vec::with_capacity(frames);

    macro_rules! mix {
        ($buf:expr) => {{
            for frame_idx in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += f32::from_sample($buf.chan(ch)[frame_idx]);
                }
                mono.push(sum / channels as f32);
            }
        }};
    }

    match buffer {
        AudioBufferRef::U8(buf) => mix!(buf),
        AudioBufferRef::U16(buf) => mix!(buf),
        AudioBufferRef::U24(buf) => mix!(buf),
        AudioBufferRef::U32(buf) => mix!(buf),
        AudioBufferRef::S8(buf) => mix!(buf),
        AudioBufferRef::S16(buf) => mix!(buf),
        AudioBufferRef::S24(buf) => mix!(buf),
        AudioBufferRef::S32(buf) => mix!(buf),
        AudioBufferRef::F32(buf) => mix!(buf),
        AudioBufferRef::F64(buf) => mix!(buf),
    }

    mono
}

fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> EngineResult<Vec<f32>> {
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| EngineError::Decode(format!("failed to build resampler: {}", e)))?;

    let waves_in = vec![samples.to_vec()];
    let waves_out = resampler
        .process(&waves_in, None)
        .map_err(|e| EngineError::Decode(format!("resampling failed: {}", e)))?;

    Ok(waves_out.into_iter().next().unwrap_or_default())
}
