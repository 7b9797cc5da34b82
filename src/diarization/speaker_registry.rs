// diarization/speaker_registry.rs
//
// Session-scoped speaker identity store. Maps voice embeddings to stable
// global ids across chunks without a global clustering pass: each lookup is
// O(number of distinct speakers), and centroids are EMA-blended so memory
// stays O(1) per speaker regardless of how many turns are observed.

use anyhow::{anyhow, Result};
use log::debug;
use serde::Serialize;

/// Guard against division by zero on near-zero vectors.
const NORM_EPSILON: f32 = 1e-8;

/// Cosine similarity between two equal-length vectors, in [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + NORM_EPSILON)
}

/// A stable speaker identity. Ids are never reused or merged; once created
/// an identity persists for the lifetime of the registry.
#[derive(Debug, Clone)]
struct SpeakerIdentity {
    id: String,
    /// EMA centroid of every embedding observed for this speaker.
    centroid: Vec<f32>,
    observation_count: u64,
}

/// Summary row exposed for artifact metadata; raw embeddings never leave
/// the registry.
#[derive(Debug, Clone, Serialize)]
pub struct SpeakerSummary {
    pub id: String,
    pub observation_count: u64,
}

/// Mutable store mapping embeddings to stable identities for one session.
pub struct SpeakerRegistry {
    speakers: Vec<SpeakerIdentity>,
    similarity_threshold: f32,
    ema_alpha: f32,
    next_id: u64,
    embedding_dim: Option<usize>,
}

impl Default for SpeakerRegistry {
    fn default() -> Self {
        Self::new(0.75, 0.8)
    }
}

impl SpeakerRegistry {
    pub fn new(similarity_threshold: f32, ema_alpha: f32) -> Self {
        Self {
            speakers: Vec::new(),
            similarity_threshold,
            ema_alpha,
            next_id: 0,
            embedding_dim: None,
        }
    }

    /// Find the stored identity most similar to `embedding`. Returns the id
    /// only when the best score clears the similarity threshold; the score
    /// is returned either way so callers can tell "no speakers yet" from
    /// "best match too weak".
    pub fn match_speaker(&self, embedding: &[f32]) -> Result<(Option<String>, f32)> {
        self.validate_embedding(embedding)?;

        let mut best_id: Option<&str> = None;
        let mut best_score = 0.0f32;

        for speaker in &self.speakers {
            let score = cosine_similarity(embedding, &speaker.centroid);
            if score > best_score {
                best_score = score;
                best_id = Some(&speaker.id);
            }
        }

        if best_score >= self.similarity_threshold {
            Ok((best_id.map(str::to_string), best_score))
        } else {
            Ok((None, best_score))
        }
    }

    /// Create a new identity seeded with `embedding` as its centroid.
    pub fn register(&mut self, embedding: &[f32]) -> Result<String> {
        self.validate_embedding(embedding)?;

        let id = format!("SPK_{}", self.next_id);
        self.next_id += 1;
        self.embedding_dim.get_or_insert(embedding.len());

        self.speakers.push(SpeakerIdentity {
            id: id.clone(),
            centroid: embedding.to_vec(),
            observation_count: 1,
        });

        debug!("Registered new speaker {}", id);
        Ok(id)
    }

    /// Blend a new observation into a stored centroid:
    /// `centroid <- alpha * centroid + (1 - alpha) * embedding`.
    /// One noisy turn cannot drag an identity far, but the centroid still
    /// tracks the voice slowly.
    pub fn update(&mut self, speaker_id: &str, embedding: &[f32]) -> Result<()> {
        self.validate_embedding(embedding)?;

        let alpha = self.ema_alpha;
        let speaker = self
            .speakers
            .iter_mut()
            .find(|s| s.id == speaker_id)
            .ok_or_else(|| anyhow!("Unknown speaker id: {}", speaker_id))?;

        speaker.centroid = speaker
            .centroid
            .iter()
            .zip(embedding.iter())
            .map(|(old, new)| alpha * old + (1.0 - alpha) * new)
            .collect();
        speaker.observation_count += 1;

        Ok(())
    }

    /// Match against the stored identities, creating a new one on a miss.
    /// Returns the id and the match score (`None` when freshly created).
    /// When `update_on_match` is set, a hit also blends the embedding into
    /// the matched centroid.
    pub fn match_or_create(
        &mut self,
        embedding: &[f32],
        update_on_match: bool,
    ) -> Result<(String, Option<f32>)> {
        let (matched, score) = self.match_speaker(embedding)?;

        if let Some(id) = matched {
            if update_on_match {
                self.update(&id, embedding)?;
            }
            return Ok((id, Some(score)));
        }

        let id = self.register(embedding)?;
        Ok((id, None))
    }

    pub fn speaker_count(&self) -> usize {
        self.speakers.len()
    }

    /// Id and observation count for every tracked speaker, in creation order.
    pub fn snapshot(&self) -> Vec<SpeakerSummary> {
        self.speakers
            .iter()
            .map(|s| SpeakerSummary {
                id: s.id.clone(),
                observation_count: s.observation_count,
            })
            .collect()
    }

    /// Reject malformed identity input at the boundary so a degenerate
    /// embedding is never miscategorized as a brand-new speaker.
    fn validate_embedding(&self, embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(anyhow!("Embedding is empty"));
        }
        if let Some(dim) = self.embedding_dim {
            if embedding.len() != dim {
                return Err(anyhow!(
                    "Embedding dimension mismatch: expected {}, got {}",
                    dim,
                    embedding.len()
                ));
            }
        }
        let norm_sq: f32 = embedding.iter().map(|x| x * x).sum();
        if norm_sq < NORM_EPSILON {
            return Err(anyhow!("Embedding has near-zero norm"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_properties() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let c = vec![-1.0, 0.0, 0.0];

        // self-similarity of a non-zero vector is ~1
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-4);
        // symmetric
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
        // orthogonal -> ~0, opposite -> ~-1
        assert!(cosine_similarity(&a, &b).abs() < 1e-4);
        assert!((cosine_similarity(&a, &c) + 1.0).abs() < 1e-4);
        // bounded
        let d = vec![0.3, -0.7, 0.2];
        let sim = cosine_similarity(&a, &d);
        assert!((-1.0..=1.0).contains(&sim));
    }

    #[test]
    fn test_near_identical_embeddings_share_one_identity() {
        let mut registry = SpeakerRegistry::default();
        let base = vec![0.6, 0.8, 0.0, 0.0];

        let (first_id, first_score) = registry.match_or_create(&base, true).unwrap();
        assert_eq!(first_id, "SPK_0");
        assert!(first_score.is_none());

        for i in 0..5 {
            let jittered: Vec<f32> =
                base.iter().map(|v| v + 0.01 * (i as f32 + 1.0)).collect();
            let (id, score) = registry.match_or_create(&jittered, true).unwrap();
            assert_eq!(id, first_id);
            assert!(score.unwrap() >= 0.75);
        }

        assert_eq!(registry.speaker_count(), 1);
    }

    #[test]
    fn test_dissimilar_embeddings_create_distinct_identities() {
        let mut registry = SpeakerRegistry::default();

        let (id_a, _) = registry.match_or_create(&[1.0, 0.0, 0.0], true).unwrap();
        let (id_b, _) = registry.match_or_create(&[0.0, 1.0, 0.0], true).unwrap();

        assert_eq!(id_a, "SPK_0");
        assert_eq!(id_b, "SPK_1");
        assert_eq!(registry.speaker_count(), 2);
    }

    #[test]
    fn test_below_threshold_match_reports_score() {
        let mut registry = SpeakerRegistry::default();
        registry.register(&[1.0, 0.0]).unwrap();

        // ~45 degrees apart: similarity ~0.707, below the 0.75 threshold
        let (matched, score) = registry.match_speaker(&[1.0, 1.0]).unwrap();
        assert!(matched.is_none());
        assert!(score > 0.5 && score < 0.75);
    }

    #[test]
    fn test_ema_update_blends_centroid() {
        let mut registry = SpeakerRegistry::new(0.75, 0.8);
        let id = registry.register(&[1.0, 0.0]).unwrap();

        registry.update(&id, &[0.0, 1.0]).unwrap();

        // centroid = 0.8 * [1, 0] + 0.2 * [0, 1]
        let summary = registry.snapshot();
        assert_eq!(summary[0].observation_count, 2);
        let centroid = &registry.speakers[0].centroid;
        assert!((centroid[0] - 0.8).abs() < 1e-6);
        assert!((centroid[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_embeddings_rejected() {
        let mut registry = SpeakerRegistry::default();

        assert!(registry.register(&[]).is_err());
        assert!(registry.register(&[0.0, 0.0, 0.0]).is_err());
        assert!(registry.match_speaker(&[0.0; 4]).is_err());

        registry.register(&[1.0, 0.0, 0.0]).unwrap();
        // dimension mismatch against the established dimension
        assert!(registry.match_or_create(&[1.0, 0.0], true).is_err());
        assert_eq!(registry.speaker_count(), 1);
    }

    #[test]
    fn test_update_unknown_id_fails() {
        let mut registry = SpeakerRegistry::default();
        assert!(registry.update("SPK_9", &[1.0, 0.0]).is_err());
    }
}
