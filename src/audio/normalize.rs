// Audio Processing - Sample-format normalization
//
// The model collaborators all expect 16 kHz mono f32; this module converts
// whatever the caller ingested into that format and cuts sub-spans for the
// separation pass.

use anyhow::Result;
use log::debug;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::AudioChunk;

/// Sinc resampling between arbitrary rates, mono input.
pub fn resample(input: &[f32], from_sample_rate: u32, to_sample_rate: u32) -> Result<Vec<f32>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    if from_sample_rate == to_sample_rate {
        return Ok(input.to_vec());
    }

    let ratio = to_sample_rate as f64 / from_sample_rate as f64;

    let (sinc_len, interpolation_type, oversampling) = if ratio >= 1.5 || ratio <= 0.5 {
        (512, SincInterpolationType::Cubic, 512)
    } else {
        (256, SincInterpolationType::Linear, 256)
    };
    debug!(
        "Resampling {}Hz -> {}Hz (ratio: {:.2}x)",
        from_sample_rate, to_sample_rate, ratio
    );

    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: 0.95,
        interpolation: interpolation_type,
        oversampling_factor: oversampling,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input.len(), 1)?;

    let waves_in = vec![input.to_vec()];
    let waves_out = resampler.process(&waves_in, None)?;

    Ok(waves_out.into_iter().next().unwrap_or_default())
}

/// Average interleaved channels down to mono. Mono input is passed through.
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert a chunk into the fixed sample format the model collaborators
/// require. Resampler failure falls back to the unresampled audio rather
/// than losing the chunk.
pub fn normalize_for_models(chunk: &AudioChunk, target_sample_rate: u32) -> Vec<f32> {
    let mono = downmix_to_mono(&chunk.samples, chunk.channels);

    if chunk.sample_rate == target_sample_rate {
        return mono;
    }

    match resample(&mono, chunk.sample_rate, target_sample_rate) {
        Ok(resampled) => resampled,
        Err(e) => {
            debug!(
                "Resampling chunk {} failed: {}, keeping original rate",
                chunk.chunk_index, e
            );
            mono
        }
    }
}

/// Cut the samples covering `[start, end)` seconds out of a mono buffer.
/// Bounds are clamped to the buffer.
pub fn slice_span(samples: &[f32], sample_rate: u32, start: f64, end: f64) -> Vec<f32> {
    if end <= start || samples.is_empty() {
        return Vec::new();
    }

    let first = ((start.max(0.0) * sample_rate as f64) as usize).min(samples.len());
    let last = ((end.max(0.0) * sample_rate as f64) as usize).min(samples.len());
    samples[first..last].to_vec()
}
