// transcription/provider.rs
//
// Transcription collaborator contract and error types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A transcribed span in chunk-local seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Set on spans produced by the secondary separated-track pass over an
    /// overlap region.
    #[serde(default)]
    pub refined: bool,
}

impl TranscriptSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            refined: false,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Errors a transcription provider can report. Callers distinguish
/// too-short input (expected, quiet) from engine failures (logged loudly).
#[derive(Debug)]
pub enum TranscriptionError {
    AudioTooShort { samples: usize, minimum: usize },
    ModelNotLoaded,
    EngineFailed(String),
}

impl std::fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioTooShort { samples, minimum } => write!(
                f,
                "Audio too short to transcribe: {} samples (minimum {})",
                samples, minimum
            ),
            Self::ModelNotLoaded => write!(f, "No transcription model loaded"),
            Self::EngineFailed(message) => write!(f, "Transcription engine failed: {}", message),
        }
    }
}

impl std::error::Error for TranscriptionError {}

/// Contract for the speech-to-text model collaborator.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transcribe `samples` (16 kHz mono) into timed spans.
    /// Times are seconds relative to the start of `samples`.
    async fn transcribe(
        &self,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError>;

    fn provider_name(&self) -> &str;
}
