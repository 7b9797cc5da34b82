// Text refinement module
//
// LLM-backed post-pass over attributed segment texts: fixes obvious
// transcription errors without rewriting meaning. The pipeline always
// time-boxes the call and falls back to the unrefined texts, so a slow or
// broken refiner can never stall the worker or drop segments.
//
// Module structure:
// - ollama.rs: Ollama HTTP implementation with chunk-context history

pub mod ollama;

pub use ollama::{OllamaRefiner, OllamaRefinerConfig};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One attributed text handed to the refiner. Text-only transform: the
/// speaker label is context, never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementItem {
    pub speaker: String,
    pub text: String,
}

/// Contract for the text refinement collaborator.
#[async_trait]
pub trait TextRefiner: Send + Sync {
    /// Refine the batch for one chunk. Implementations return items in the
    /// same order and count as the input; the caller keeps the originals
    /// whenever that contract is broken.
    async fn refine(
        &self,
        items: &[RefinementItem],
        chunk_index: u64,
    ) -> Result<Vec<RefinementItem>>;

    fn provider_name(&self) -> &str;
}
