// Pipeline configuration
//
// One config struct covers the whole session: registry thresholds, overlap
// policy, refinement timeout, and output locations. Loadable from a JSON
// file; every field has a default so partial files work.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tunable parameters for a transcription session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal duration of every ingested chunk in seconds. Global time is
    /// `chunk_index * chunk_duration_secs + local_time`, so all chunks must
    /// share this duration.
    pub chunk_duration_secs: f64,
    /// Diarization segments shorter than this are discarded; their
    /// embeddings are too unstable to trust.
    pub min_segment_duration: f64,
    /// Cosine similarity floor for matching an embedding against a stored
    /// speaker centroid.
    pub similarity_threshold: f32,
    /// Weight kept on the historical centroid when blending in a new
    /// embedding observation.
    pub ema_alpha: f32,
    /// Minimum overlap ratio for attributing a transcript span to a single
    /// speaker.
    pub min_overlap_ratio: f64,
    /// Absolute intersection (seconds) at which an overlap region claims a
    /// transcript span as simultaneous speech.
    pub overlap_claim_secs: f64,
    /// Fractional intersection at which an overlap region claims a span.
    pub overlap_claim_ratio: f64,
    /// Overlap regions at least this long are re-transcribed through the
    /// separation collaborator when one is available.
    pub separation_min_secs: f64,
    /// Upper bound on the text refinement call before falling back to the
    /// unrefined texts.
    pub refine_timeout_secs: u64,
    /// Sample rate every chunk is converted to before any model call.
    pub model_sample_rate: u32,
    /// Forced transcription language; `None` means autodetect.
    pub language: Option<String>,
    /// Directory holding the partial JSONL log and the final artifact.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_duration_secs: 30.0,
            min_segment_duration: 0.3,
            similarity_threshold: 0.75,
            ema_alpha: 0.8,
            min_overlap_ratio: 0.5,
            overlap_claim_secs: 2.0,
            overlap_claim_ratio: 0.5,
            separation_min_secs: 2.0,
            refine_timeout_secs: 10,
            model_sample_rate: 16000,
            language: None,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.chunk_duration_secs, 30.0);
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.ema_alpha, 0.8);
        assert_eq!(config.min_overlap_ratio, 0.5);
        assert_eq!(config.refine_timeout_secs, 10);
        assert_eq!(config.model_sample_rate, 16000);
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"chunk_duration_secs": 10.0, "language": "en"}}"#).unwrap();

        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.chunk_duration_secs, 10.0);
        assert_eq!(config.language.as_deref(), Some("en"));
        // untouched fields keep their defaults
        assert_eq!(config.similarity_threshold, 0.75);
        assert_eq!(config.min_segment_duration, 0.3);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(PipelineConfig::from_file(Path::new("/nonexistent/config.json")).is_err());
    }
}
