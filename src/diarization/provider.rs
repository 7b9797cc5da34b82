// diarization/provider.rs
//
// Diarization collaborator contract and the speaker-turn segment type.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A speaker turn reported by the diarization collaborator.
///
/// `local_speaker` is stable only within the call that produced it;
/// `global_speaker` is filled in once the embedding has been resolved
/// against the session registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizationSegment {
    /// Start time in seconds, chunk-local.
    pub start: f64,
    /// End time in seconds, chunk-local.
    pub end: f64,
    /// Chunk-local speaker tag (e.g. "SPEAKER_00").
    pub local_speaker: String,
    /// Voice embedding for the turn; consumed by the registry and not
    /// serialized.
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    /// Session-stable id once resolved (e.g. "SPK_2").
    pub global_speaker: Option<String>,
}

impl DiarizationSegment {
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Identifier used downstream: the resolved global id when available,
    /// the chunk-local tag otherwise.
    pub fn speaker_id(&self) -> &str {
        self.global_speaker.as_deref().unwrap_or(&self.local_speaker)
    }
}

/// Contract for the diarization model collaborator.
#[async_trait]
pub trait DiarizationProvider: Send + Sync {
    /// Segment `samples` into speaker turns with voice embeddings.
    /// Times are seconds relative to the start of `samples`.
    async fn diarize(&self, samples: &[f32], sample_rate: u32)
        -> Result<Vec<DiarizationSegment>>;

    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_id_prefers_global() {
        let mut segment = DiarizationSegment {
            start: 0.0,
            end: 1.0,
            local_speaker: "SPEAKER_00".to_string(),
            embedding: vec![1.0, 0.0],
            global_speaker: None,
        };
        assert_eq!(segment.speaker_id(), "SPEAKER_00");

        segment.global_speaker = Some("SPK_3".to_string());
        assert_eq!(segment.speaker_id(), "SPK_3");
    }

    #[test]
    fn test_duration_never_negative() {
        let segment = DiarizationSegment {
            start: 2.0,
            end: 1.0,
            local_speaker: "SPEAKER_00".to_string(),
            embedding: Vec::new(),
            global_speaker: None,
        };
        assert_eq!(segment.duration(), 0.0);
    }
}
