// Scripted end-to-end run of the session pipeline.
//
// Stands in for a live meeting: three chunks of pre-scripted diarization
// and transcript intervals flow through the full pipeline - registry
// resolution, overlap sweep, attribution, global-time stitching - without
// loading any model. Chunks are enqueued out of index order on purpose;
// the final artifact comes out chronological anyway.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use meeting_scribe::{
    AudioChunk, DiarizationProvider, DiarizationSegment, Engines, PipelineConfig,
    SessionPipeline, TranscriptSegment, TranscriptionError, TranscriptionProvider,
};

/// Diarizer that replays a canned script, one entry per call.
struct ScriptedDiarizer {
    script: Mutex<VecDeque<Vec<DiarizationSegment>>>,
}

#[async_trait]
impl DiarizationProvider for ScriptedDiarizer {
    async fn diarize(&self, _samples: &[f32], _sample_rate: u32) -> Result<Vec<DiarizationSegment>> {
        let mut script = self.script.lock().expect("diarizer script lock");
        Ok(script.pop_front().unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "scripted-diarizer"
    }
}

/// Transcriber that replays a canned script, one entry per call.
struct ScriptedTranscriber {
    script: Mutex<VecDeque<Vec<TranscriptSegment>>>,
}

#[async_trait]
impl TranscriptionProvider for ScriptedTranscriber {
    async fn transcribe(
        &self,
        _samples: &[f32],
        _language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        let mut script = self.script.lock().expect("transcriber script lock");
        Ok(script.pop_front().unwrap_or_default())
    }

    fn provider_name(&self) -> &str {
        "scripted-transcriber"
    }
}

fn turn(start: f64, end: f64, local: &str, embedding: &[f32]) -> DiarizationSegment {
    DiarizationSegment {
        start,
        end,
        local_speaker: local.to_string(),
        embedding: embedding.to_vec(),
        global_speaker: None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // Two meeting voices; per-chunk jitter keeps the registry honest.
    let alice = [0.9f32, 0.1, 0.05, 0.0];
    let bob = [0.05f32, 0.1, 0.9, 0.1];

    // Scripts are keyed by processing order: chunks are enqueued 0, 2, 1.
    let diarizer = ScriptedDiarizer {
        script: Mutex::new(VecDeque::from(vec![
            // chunk 0: two clean turns
            vec![
                turn(0.5, 4.5, "SPEAKER_00", &alice),
                turn(5.0, 9.5, "SPEAKER_01", &bob),
            ],
            // chunk 2: cross-talk between 3.0 and 6.0
            vec![
                turn(0.0, 6.0, "SPEAKER_00", &[0.88, 0.12, 0.06, 0.01]),
                turn(3.0, 9.0, "SPEAKER_01", &[0.06, 0.09, 0.91, 0.08]),
            ],
            // chunk 1: one long turn
            vec![turn(0.2, 9.0, "SPEAKER_00", &[0.91, 0.09, 0.04, 0.02])],
        ])),
    };

    let transcriber = ScriptedTranscriber {
        script: Mutex::new(VecDeque::from(vec![
            vec![
                TranscriptSegment::new(0.5, 4.2, "good morning everyone"),
                TranscriptSegment::new(5.1, 9.3, "morning, let's get started"),
            ],
            vec![
                TranscriptSegment::new(0.2, 2.8, "i think we should postpone"),
                TranscriptSegment::new(3.2, 5.8, "no wait, listen to this first"),
                TranscriptSegment::new(6.5, 8.9, "okay, go ahead"),
            ],
            vec![TranscriptSegment::new(
                0.3,
                8.8,
                "first item on the agenda is the quarterly report",
            )],
        ])),
    };

    let config = PipelineConfig {
        chunk_duration_secs: 10.0,
        ..PipelineConfig::default()
    };

    let engines = Engines::new(Arc::new(diarizer), Arc::new(transcriber));
    let pipeline = SessionPipeline::new(engines, config)?;
    pipeline.start().await?;

    let mut results = pipeline.subscribe();

    // 10s of silence per chunk; the scripted collaborators ignore it.
    let samples = vec![0.0f32; 160_000];
    for chunk_index in [0u64, 2, 1] {
        pipeline
            .enqueue_chunk(AudioChunk::mono(chunk_index, samples.clone(), 16_000))
            .await?;
    }

    let artifact = pipeline.end().await?;

    println!("--- live batches (processing order) ---");
    while let Ok(batch) = results.try_recv() {
        for record in &batch.records {
            println!(
                "chunk {} [{:7.2} - {:7.2}] {}: {}",
                batch.chunk_index, record.start, record.end, record.speaker, record.text
            );
        }
    }

    println!("--- final artifact (chronological) ---");
    println!("{}", serde_json::to_string_pretty(&artifact)?);

    Ok(())
}
