// Speaker diarization module
// Speaker turns, voice-embedding identity tracking, and simultaneous-speech
// detection.
//
// Module structure:
// - provider.rs: DiarizationProvider trait and segment type
// - engine.rs: pyannote-rs backed provider (segmentation + embeddings)
// - speaker_registry.rs: session-scoped embedding -> global id resolution
// - overlap.rs: sweep-line overlap regions and chunk partitioning

pub mod engine;
pub mod overlap;
pub mod provider;
pub mod speaker_registry;

// Re-export the diarization contract
pub use provider::{DiarizationProvider, DiarizationSegment};

// Re-export the pyannote-rs based engine (default backend)
pub use engine::{PyannoteConfig, PyannoteDiarizer};

// Re-export the speaker registry
pub use speaker_registry::{cosine_similarity, SpeakerRegistry, SpeakerSummary};

// Re-export overlap detection
pub use overlap::{detect_overlaps, processing_regions, OverlapRegion, ProcessingRegion};
