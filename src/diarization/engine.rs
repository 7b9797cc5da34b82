// Diarization engine using pyannote-rs
// Wraps segmentation and speaker embedding extraction

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use pyannote_rs::{get_segments, EmbeddingExtractor, EmbeddingManager};
use serde::{Deserialize, Serialize};

use super::provider::{DiarizationProvider, DiarizationSegment};

/// Configuration for the pyannote-rs backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PyannoteConfig {
    /// Path to segmentation model (segmentation-3.0.onnx)
    pub segmentation_model_path: PathBuf,
    /// Path to speaker embedding model (wespeaker_en_voxceleb_CAM++.onnx)
    pub embedding_model_path: PathBuf,
    /// Maximum number of distinct chunk-local labels per call
    pub max_local_speakers: usize,
    /// Similarity threshold for chunk-local label clustering (0.0 to 1.0)
    pub local_label_threshold: f32,
}

impl Default for PyannoteConfig {
    fn default() -> Self {
        Self {
            segmentation_model_path: PathBuf::new(),
            embedding_model_path: PathBuf::new(),
            max_local_speakers: 10,
            local_label_threshold: 0.85, // Higher threshold = fewer false speaker splits
        }
    }
}

/// Diarization collaborator backed by pyannote-rs segmentation and speaker
/// embeddings. Labels are clustered per call only - cross-chunk identity is
/// the registry's job, not this engine's.
pub struct PyannoteDiarizer {
    config: PyannoteConfig,
    embedding_extractor: Mutex<EmbeddingExtractor>,
}

impl PyannoteDiarizer {
    pub fn new(config: PyannoteConfig) -> Result<Self> {
        info!("Initializing pyannote diarizer");
        debug!("Segmentation model: {:?}", config.segmentation_model_path);
        debug!("Embedding model: {:?}", config.embedding_model_path);

        if !config.segmentation_model_path.exists() {
            return Err(anyhow!(
                "Segmentation model not found: {:?}",
                config.segmentation_model_path
            ));
        }
        if !config.embedding_model_path.exists() {
            return Err(anyhow!(
                "Embedding model not found: {:?}",
                config.embedding_model_path
            ));
        }

        // pyannote-rs uses eyre, convert to anyhow
        let embedding_extractor = EmbeddingExtractor::new(&config.embedding_model_path)
            .map_err(|e| anyhow!("Failed to create embedding extractor: {}", e))?;

        info!("Pyannote diarizer initialized successfully");

        Ok(Self {
            config,
            embedding_extractor: Mutex::new(embedding_extractor),
        })
    }
}

#[async_trait]
impl DiarizationProvider for PyannoteDiarizer {
    /// Run diarization on audio samples.
    ///
    /// Takes f32 samples, converts to i16 internally for pyannote-rs, and
    /// returns speaker turns with chunk-local labels and embeddings.
    async fn diarize(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<DiarizationSegment>> {
        info!(
            "Running diarization on {} samples at {} Hz",
            samples.len(),
            sample_rate
        );

        let samples_i16: Vec<i16> = samples
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect();

        let segments_iter = get_segments(
            &samples_i16,
            sample_rate,
            &self.config.segmentation_model_path,
        )
        .map_err(|e| anyhow!("Failed to run segmentation: {}", e))?;

        // Fresh per call: local labels are only meaningful within this call
        let mut label_manager = EmbeddingManager::new(self.config.max_local_speakers);

        let mut extractor = self
            .embedding_extractor
            .lock()
            .map_err(|e| anyhow!("Embedding extractor lock poisoned: {}", e))?;

        let mut results = Vec::new();

        for segment_result in segments_iter {
            let segment = match segment_result {
                Ok(segment) => segment,
                Err(e) => {
                    warn!("Failed to process segment: {}", e);
                    continue;
                }
            };

            let embedding: Vec<f32> = match extractor.compute(&segment.samples) {
                Ok(iter) => iter.collect(),
                Err(e) => {
                    warn!("Failed to compute embedding for segment: {}", e);
                    continue;
                }
            };

            let local_speaker = match label_manager
                .search_speaker(embedding.clone(), self.config.local_label_threshold)
            {
                Some(index) => format!("SPEAKER_{:02}", index),
                None => "SPEAKER_UNK".to_string(),
            };

            results.push(DiarizationSegment {
                start: segment.start,
                end: segment.end,
                local_speaker,
                embedding,
                global_speaker: None,
            });
        }

        info!("Diarization complete: {} segments", results.len());

        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "pyannote"
    }
}
