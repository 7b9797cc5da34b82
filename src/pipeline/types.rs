// pipeline/types.rs
//
// Record and session types shared across the pipeline.

use serde::{Deserialize, Serialize};

use crate::audio::AudioChunk;

/// One persisted line of the session log. Times are global seconds
/// (`chunk * chunk_duration + local`). Serialized as
/// `{chunk, speaker, start, end, text}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineRecord {
    pub chunk: u64,
    pub speaker: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Broadcast unit: every record produced by one chunk, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_index: u64,
    pub records: Vec<TimelineRecord>,
}

/// Lifecycle of a session pipeline. `Running -> Ended` is irreversible for
/// a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Ended,
}

/// Final session artifact: the whole log sorted into chronological order,
/// plus session metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub session_id: String,
    pub created_at: String,
    pub chunk_duration_secs: f64,
    pub speaker_count: usize,
    pub segments: Vec<TimelineRecord>,
}

/// Work items consumed by the session worker. `Shutdown` is the drain
/// sentinel enqueued at session end; `Reset` discards accumulated state
/// in-queue so it is serialized with chunk processing and can never race an
/// in-flight chunk.
#[derive(Debug)]
pub enum PipelineTask {
    Chunk(AudioChunk),
    Reset,
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_wire_format() {
        let record = TimelineRecord {
            chunk: 2,
            speaker: "SPK_0".to_string(),
            start: 61.5,
            end: 64.25,
            text: "hello".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["chunk"], 2);
        assert_eq!(json["speaker"], "SPK_0");
        assert_eq!(json["start"], 61.5);
        assert_eq!(json["end"], 64.25);
        assert_eq!(json["text"], "hello");
    }
}
