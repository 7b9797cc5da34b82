// src/audio/mod.rs
//
// Audio chunk type and sample-format normalization for the model
// collaborators.

pub mod normalize;

pub use normalize::{downmix_to_mono, normalize_for_models, resample, slice_span};

use serde::{Deserialize, Serialize};

/// A fixed-duration slice of the live session, submitted independently for
/// processing. The index is used only for global-time arithmetic; the
/// pipeline never resequences by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioChunk {
    pub chunk_index: u64,
    /// Interleaved samples when `channels > 1`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    /// Convenience constructor for already-mono audio.
    pub fn mono(chunk_index: u64, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            chunk_index,
            samples,
            sample_rate,
            channels: 1,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.channels as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::mono(0, vec![0.0; 16000], 16000);
        assert!((chunk.duration_secs() - 1.0).abs() < 1e-9);

        let stereo = AudioChunk {
            chunk_index: 1,
            samples: vec![0.0; 32000],
            sample_rate: 16000,
            channels: 2,
        };
        assert!((stereo.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_chunk_duration_is_zero() {
        let chunk = AudioChunk {
            chunk_index: 0,
            samples: vec![0.0; 100],
            sample_rate: 0,
            channels: 1,
        };
        assert_eq!(chunk.duration_secs(), 0.0);
    }
}
