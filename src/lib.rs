// Meeting-Scribe - Streaming speaker-attributed transcription
//
// Fuses two chunked interval streams produced for the same live session -
// speaker turns (diarization + voice embeddings) and transcript spans
// (speech-to-text) - into one speaker-attributed global timeline, while
// chunks are still arriving. Each chunk is finalized online: speaker
// identities are reconciled across chunks from noisy embeddings without a
// global clustering pass.

// Performance logging macros - exported for use by other modules
#[macro_use]
pub mod macros;

// Core modules
pub mod config;
pub mod audio;
pub mod diarization;
pub mod transcription;
pub mod separation;
pub mod refinement;
pub mod assignment;
pub mod pipeline;

// Re-export the public surface
pub use config::PipelineConfig;

pub use audio::AudioChunk;

pub use diarization::{
    cosine_similarity, detect_overlaps, processing_regions, DiarizationProvider,
    DiarizationSegment, OverlapRegion, ProcessingRegion, PyannoteConfig, PyannoteDiarizer,
    SpeakerRegistry, SpeakerSummary,
};

pub use transcription::{
    TranscriptSegment, TranscriptionError, TranscriptionProvider, WhisperTranscriber,
};

pub use separation::{SeparatedTrack, SpeechSeparator};

pub use refinement::{OllamaRefiner, OllamaRefinerConfig, RefinementItem, TextRefiner};

pub use assignment::{assign_speakers, AssignerConfig, AttributedSegment, UNKNOWN_SPEAKER};

pub use pipeline::{
    ChunkResult, Engines, SessionArtifact, SessionPipeline, SessionState, TimelineRecord,
};
