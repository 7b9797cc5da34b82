// Speech separation module
//
// Optional collaborator that splits an overlapping-speech slice into
// per-speaker audio tracks for re-transcription. Modeled as an explicit
// capability: the pipeline holds an `Option` of this trait and skips the
// overlap re-transcription pass when no separator is configured.

use anyhow::Result;
use async_trait::async_trait;

/// One single-speaker track cut out of an overlap region.
#[derive(Debug, Clone)]
pub struct SeparatedTrack {
    pub label: String,
    pub samples: Vec<f32>,
}

/// Contract for the source-separation model collaborator.
#[async_trait]
pub trait SpeechSeparator: Send + Sync {
    /// Split `samples` (one overlap region, 16 kHz mono) into per-speaker
    /// tracks. Track count and ordering are model-defined.
    async fn separate(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<SeparatedTrack>>;

    fn provider_name(&self) -> &str;
}
