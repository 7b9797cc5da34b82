// transcription/whisper_provider.rs
//
// Whisper-based transcription provider.

use std::path::Path;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::provider::{TranscriptSegment, TranscriptionError, TranscriptionProvider};
use super::text_cleaner::clean_transcript_text;
use crate::perf_debug;

/// Minimum usable input: 100ms at 16kHz
const MIN_SAMPLES: usize = 1600;

/// Transcription collaborator backed by whisper-rs. The context is loaded
/// once; a fresh decoding state is created per call so `&self` suffices.
pub struct WhisperTranscriber {
    context: WhisperContext,
    beam_size: i32,
}

impl WhisperTranscriber {
    pub fn new(model_path: &Path) -> Result<Self> {
        Self::with_beam_size(model_path, 5)
    }

    pub fn with_beam_size(model_path: &Path, beam_size: i32) -> Result<Self> {
        // Suppress verbose whisper.cpp logs
        std::env::set_var("WHISPER_LOG_LEVEL", "1");

        let context_param = WhisperContextParameters::default();
        let context =
            WhisperContext::new_with_params(&model_path.to_string_lossy(), context_param)
                .map_err(|e| {
                    anyhow!("Failed to load whisper model {}: {}", model_path.display(), e)
                })?;

        info!("Whisper model loaded from {}", model_path.display());

        Ok(Self { context, beam_size })
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperTranscriber {
    async fn transcribe(
        &self,
        samples: &[f32],
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        if samples.len() < MIN_SAMPLES {
            return Err(TranscriptionError::AudioTooShort {
                samples: samples.len(),
                minimum: MIN_SAMPLES,
            });
        }

        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: self.beam_size,
            patience: 1.0,
        });

        let language_code = match language {
            Some("auto") | None => None,
            other => other,
        };
        params.set_language(language_code);
        params.set_translate(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);
        params.set_temperature(0.3);
        params.set_no_context(true);

        let mut state = self
            .context
            .create_state()
            .map_err(|e| TranscriptionError::EngineFailed(e.to_string()))?;
        state
            .full(params, samples)
            .map_err(|e| TranscriptionError::EngineFailed(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| TranscriptionError::EngineFailed(e.to_string()))?;

        let mut segments = Vec::new();

        for i in 0..num_segments {
            let text = match state.full_get_segment_text_lossy(i) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to read whisper segment {}: {}", i, e);
                    continue;
                }
            };

            // whisper reports timestamps in centiseconds
            let start = state.full_get_segment_t0(i).unwrap_or(0) as f64 / 100.0;
            let end = state.full_get_segment_t1(i).unwrap_or(0) as f64 / 100.0;

            let cleaned = clean_transcript_text(&text);
            if cleaned.is_empty() {
                perf_debug!(
                    "Dropping whisper segment {} ({:.2}s-{:.2}s): no usable text",
                    i,
                    start,
                    end
                );
                continue;
            }

            segments.push(TranscriptSegment {
                start,
                end,
                text: cleaned,
                refined: false,
            });
        }

        Ok(segments)
    }

    fn provider_name(&self) -> &str {
        "whisper"
    }
}
