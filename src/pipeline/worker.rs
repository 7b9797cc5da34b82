// pipeline/worker.rs
//
// The single session worker: serializes chunk processing, owns the speaker
// registry and the timeline log, and drives every collaborator. Being the
// only writer of both structures is what makes the pipeline lock-free -
// ingestion and broadcast touch nothing but the queue and the result
// channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Duration};

use crate::assignment::{assign_speakers, AssignerConfig, AttributedSegment};
use crate::audio::{normalize_for_models, slice_span, AudioChunk};
use crate::config::PipelineConfig;
use crate::diarization::{
    detect_overlaps, processing_regions, DiarizationProvider, DiarizationSegment, OverlapRegion,
    ProcessingRegion, SpeakerRegistry,
};
use crate::refinement::{RefinementItem, TextRefiner};
use crate::separation::SpeechSeparator;
use crate::transcription::{TranscriptSegment, TranscriptionError, TranscriptionProvider};

use super::timeline::{stitch_records, TimelineLog};
use super::types::{ChunkResult, PipelineTask};

/// The model collaborators the pipeline drives. Separation and refinement
/// are optional capabilities, represented explicitly: absence skips the
/// corresponding step, never a hard failure.
#[derive(Clone)]
pub struct Engines {
    pub diarizer: Arc<dyn DiarizationProvider>,
    pub transcriber: Arc<dyn TranscriptionProvider>,
    pub separator: Option<Arc<dyn SpeechSeparator>>,
    pub refiner: Option<Arc<dyn TextRefiner>>,
}

impl Engines {
    pub fn new(
        diarizer: Arc<dyn DiarizationProvider>,
        transcriber: Arc<dyn TranscriptionProvider>,
    ) -> Self {
        Self {
            diarizer,
            transcriber,
            separator: None,
            refiner: None,
        }
    }

    pub fn with_separator(mut self, separator: Arc<dyn SpeechSeparator>) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_refiner(mut self, refiner: Arc<dyn TextRefiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    pub fn has_separation(&self) -> bool {
        self.separator.is_some()
    }

    pub fn has_refinement(&self) -> bool {
        self.refiner.is_some()
    }
}

/// Worker state: everything only the worker task may touch.
pub(super) struct SessionWorker {
    engines: Engines,
    config: PipelineConfig,
    assigner: AssignerConfig,
    registry: SpeakerRegistry,
    log: TimelineLog,
    results: broadcast::Sender<ChunkResult>,
    speaker_count: Arc<AtomicUsize>,
}

impl SessionWorker {
    pub(super) fn new(
        engines: Engines,
        config: PipelineConfig,
        log: TimelineLog,
        results: broadcast::Sender<ChunkResult>,
        speaker_count: Arc<AtomicUsize>,
    ) -> Self {
        let assigner = AssignerConfig {
            min_overlap_ratio: config.min_overlap_ratio,
            overlap_claim_secs: config.overlap_claim_secs,
            overlap_claim_ratio: config.overlap_claim_ratio,
        };
        let registry = SpeakerRegistry::new(config.similarity_threshold, config.ema_alpha);

        Self {
            engines,
            config,
            assigner,
            registry,
            log,
            results,
            speaker_count,
        }
    }

    /// Main task loop. One chunk is fully processed before the next begins;
    /// tasks arrive in enqueue order and are never resequenced by index.
    pub(super) async fn run(mut self, mut tasks: mpsc::UnboundedReceiver<PipelineTask>) {
        info!(
            "Session worker started, appending records to {}",
            self.log.path().display()
        );

        while let Some(task) = tasks.recv().await {
            match task {
                PipelineTask::Chunk(chunk) => {
                    let chunk_index = chunk.chunk_index;
                    if let Err(e) = self.process_chunk(chunk).await {
                        // Core pipeline failure: this chunk's results are
                        // permanently lost, the worker moves on.
                        error!("Chunk {} aborted: {:#}", chunk_index, e);
                    }
                }
                PipelineTask::Reset => self.reset(),
                PipelineTask::Shutdown => break,
            }
        }

        for speaker in self.registry.snapshot() {
            debug!(
                "Speaker {}: {} observation(s)",
                speaker.id, speaker.observation_count
            );
        }
        info!("Session worker finished");
    }

    /// Discard accumulated session state: fresh registry, empty log.
    fn reset(&mut self) {
        self.registry =
            SpeakerRegistry::new(self.config.similarity_threshold, self.config.ema_alpha);
        if let Err(e) = self.log.truncate() {
            error!("Failed to truncate timeline log on reset: {:#}", e);
        }
        self.speaker_count.store(0, Ordering::SeqCst);
        info!("Session state reset");
    }

    async fn process_chunk(&mut self, chunk: AudioChunk) -> Result<()> {
        let chunk_index = chunk.chunk_index;
        info!(
            "Processing chunk {} ({:.1}s of audio)",
            chunk_index,
            chunk.duration_secs()
        );

        // 1. Fixed sample format for every model collaborator.
        let samples = normalize_for_models(&chunk, self.config.model_sample_rate);
        let sample_rate = self.config.model_sample_rate;
        let audio_duration = samples.len() as f64 / sample_rate as f64;

        // 2. Speaker turns; sub-floor segments carry unstable embeddings
        // and are discarded.
        let mut turns = match self.engines.diarizer.diarize(&samples, sample_rate).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(
                    "Diarization failed for chunk {}: {:#}; transcript spans will be UNKNOWN",
                    chunk_index, e
                );
                Vec::new()
            }
        };
        let before = turns.len();
        turns.retain(|turn| turn.duration() >= self.config.min_segment_duration);
        if turns.len() < before {
            debug!(
                "Chunk {}: dropped {} diarization segments under {:.1}s",
                chunk_index,
                before - turns.len(),
                self.config.min_segment_duration
            );
        }

        // 3. Resolve global speaker identities before overlap detection so
        // regions and attribution share one id space.
        let turns = self.resolve_speakers(turns);

        // 4. Simultaneous-speech regions over the resolved turns.
        let overlaps = detect_overlaps(&turns);
        if !overlaps.is_empty() {
            info!("Chunk {}: {} overlap region(s)", chunk_index, overlaps.len());
        }

        // 5. Baseline transcript.
        let mut transcript = self.transcribe(&samples, chunk_index).await;

        // 6. Re-transcribe long overlap regions through the separator.
        if self.engines.has_separation() && !overlaps.is_empty() {
            self.refine_overlap_transcripts(
                &samples,
                sample_rate,
                audio_duration,
                &overlaps,
                &mut transcript,
            )
            .await;
        }

        // 7. Attribution (pure).
        let attributed = assign_speakers(&transcript, &turns, &overlaps, &self.assigner);

        // 8. Time-boxed text refinement with fallback.
        let attributed = self.refine_texts(attributed, chunk_index).await;

        // 9. Stitch to the global timeline, persist, broadcast.
        let records = stitch_records(chunk_index, self.config.chunk_duration_secs, &attributed);
        self.log
            .append(&records)
            .with_context(|| format!("Failed to persist chunk {} records", chunk_index))?;
        self.speaker_count
            .store(self.registry.speaker_count(), Ordering::SeqCst);

        if !records.is_empty() {
            let _ = self.results.send(ChunkResult {
                chunk_index,
                records,
            });
        }

        info!("Chunk {} finished", chunk_index);
        Ok(())
    }

    /// Map every turn's embedding to a stable global id. Turns whose
    /// embedding the registry rejects are dropped, never misfiled as a new
    /// speaker. Embeddings are cleared once consumed.
    fn resolve_speakers(&mut self, turns: Vec<DiarizationSegment>) -> Vec<DiarizationSegment> {
        let mut resolved = Vec::with_capacity(turns.len());

        for mut turn in turns {
            match self.registry.match_or_create(&turn.embedding, true) {
                Ok((id, score)) => {
                    match score {
                        Some(score) => debug!(
                            "{} [{:.2}-{:.2}] -> {} (score {:.3})",
                            turn.local_speaker, turn.start, turn.end, id, score
                        ),
                        None => debug!(
                            "{} [{:.2}-{:.2}] -> {} (new speaker)",
                            turn.local_speaker, turn.start, turn.end, id
                        ),
                    }
                    turn.global_speaker = Some(id);
                    turn.embedding.clear();
                    resolved.push(turn);
                }
                Err(e) => warn!(
                    "Rejected diarization segment [{:.2}-{:.2}]: {:#}",
                    turn.start, turn.end, e
                ),
            }
        }

        resolved
    }

    async fn transcribe(&self, samples: &[f32], chunk_index: u64) -> Vec<TranscriptSegment> {
        match self
            .engines
            .transcriber
            .transcribe(samples, self.config.language.as_deref())
            .await
        {
            Ok(segments) => segments,
            Err(TranscriptionError::AudioTooShort { samples, minimum }) => {
                info!(
                    "Chunk {} too short to transcribe ({} < {} samples)",
                    chunk_index, samples, minimum
                );
                Vec::new()
            }
            Err(e) => {
                warn!("Transcription failed for chunk {}: {}", chunk_index, e);
                Vec::new()
            }
        }
    }

    /// Cut each long overlap region out of the chunk, separate it into
    /// per-speaker tracks, and transcribe each track. Resulting spans are
    /// shifted back to chunk-local time, marked refined, and appended
    /// alongside the baseline; duplicates across the two passes are not
    /// removed.
    async fn refine_overlap_transcripts(
        &self,
        samples: &[f32],
        sample_rate: u32,
        audio_duration: f64,
        overlaps: &[OverlapRegion],
        transcript: &mut Vec<TranscriptSegment>,
    ) {
        let Some(separator) = &self.engines.separator else {
            return;
        };

        for region in processing_regions(audio_duration, overlaps) {
            let ProcessingRegion::Overlap(region) = region else {
                continue;
            };
            if region.duration() < self.config.separation_min_secs {
                continue;
            }

            info!(
                "Separating overlap region {:.2}s-{:.2}s ({} speakers)",
                region.start,
                region.end,
                region.speakers.len()
            );

            let slice = slice_span(samples, sample_rate, region.start, region.end);
            let tracks = match separator.separate(&slice, sample_rate).await {
                Ok(tracks) => tracks,
                Err(e) => {
                    warn!(
                        "Separation failed for region {:.2}s-{:.2}s: {:#}",
                        region.start, region.end, e
                    );
                    continue;
                }
            };

            for track in tracks {
                match self
                    .engines
                    .transcriber
                    .transcribe(&track.samples, self.config.language.as_deref())
                    .await
                {
                    Ok(spans) => {
                        for mut span in spans {
                            span.start += region.start;
                            span.end += region.start;
                            span.refined = true;
                            transcript.push(span);
                        }
                    }
                    Err(e) => warn!("Re-transcription of track '{}' failed: {}", track.label, e),
                }
            }
        }
    }

    /// Batch text refinement, bounded by the configured timeout. On any
    /// failure the unrefined texts are kept; segments are never dropped.
    async fn refine_texts(
        &self,
        attributed: Vec<AttributedSegment>,
        chunk_index: u64,
    ) -> Vec<AttributedSegment> {
        let Some(refiner) = &self.engines.refiner else {
            return attributed;
        };
        if attributed.is_empty() {
            return attributed;
        }

        let items: Vec<RefinementItem> = attributed
            .iter()
            .map(|segment| RefinementItem {
                speaker: segment.speaker.clone(),
                text: segment.text.clone(),
            })
            .collect();

        let deadline = Duration::from_secs(self.config.refine_timeout_secs);
        match timeout(deadline, refiner.refine(&items, chunk_index)).await {
            Ok(Ok(refined)) if refined.len() == attributed.len() => attributed
                .into_iter()
                .zip(refined)
                .map(|(mut segment, item)| {
                    segment.text = item.text;
                    segment
                })
                .collect(),
            Ok(Ok(refined)) => {
                warn!(
                    "Refiner returned {} items for {} segments; keeping unrefined text",
                    refined.len(),
                    attributed.len()
                );
                attributed
            }
            Ok(Err(e)) => {
                warn!("Text refinement failed for chunk {}: {:#}", chunk_index, e);
                attributed
            }
            Err(_) => {
                warn!(
                    "Text refinement timed out after {}s for chunk {}",
                    self.config.refine_timeout_secs, chunk_index
                );
                attributed
            }
        }
    }
}
