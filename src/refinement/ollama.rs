//! Ollama-backed transcript refiner
//!
//! Connects to a running Ollama server (default: localhost:11434) and asks
//! the model for minimal corrections to each segment text. Keeps a bounded
//! history of prior chunk texts so corrections stay consistent across the
//! session.

use std::collections::VecDeque;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{RefinementItem, TextRefiner};

/// Chunk summaries kept for prompt context.
const MAX_HISTORY: usize = 5;
/// Summaries actually injected into the prompt.
const CONTEXT_WINDOW: usize = 2;

/// Ollama refiner configuration
#[derive(Debug, Clone)]
pub struct OllamaRefinerConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for OllamaRefinerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.3,
            timeout_secs: 120,
        }
    }
}

/// Ollama API message format
#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat response
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Transcript refiner talking to a local Ollama server.
pub struct OllamaRefiner {
    config: OllamaRefinerConfig,
    client: Client,
    history: Mutex<VecDeque<String>>,
}

impl OllamaRefiner {
    pub fn new(config: OllamaRefinerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client for refiner")?;

        Ok(Self {
            config,
            client,
            history: Mutex::new(VecDeque::new()),
        })
    }

    fn system_prompt(context: &str) -> String {
        format!(
            "You are a professional meeting stenographer. Refine the transcript \
             segments you are given.\n\
             Rules:\n\
             1. Minimal edits: fix only clearly wrong terms, proper nouns, and spelling.\n\
             2. Never touch sentences that already read correctly.\n\
             3. Never add words, flourishes, or reorder phrases.\n\
             4. Reply with nothing but a JSON array of {{\"speaker\", \"text\"}} objects, \
             one per input segment, in input order.\n\n\
             Recent conversation context:\n{}",
            context
        )
    }

    /// Pull the refined item list out of whatever JSON shape the model
    /// returned: a bare array, `{"segments": [...]}`, or a single-key
    /// object wrapping an array.
    fn parse_refined(content: &str) -> Result<Vec<RefinementItem>> {
        if let Ok(items) = serde_json::from_str::<Vec<RefinementItem>>(content) {
            return Ok(items);
        }

        let value: serde_json::Value =
            serde_json::from_str(content).context("Refiner returned non-JSON content")?;

        if let Some(segments) = value.get("segments") {
            return serde_json::from_value(segments.clone())
                .context("Refiner 'segments' field has unexpected shape");
        }

        if let Some(object) = value.as_object() {
            for field in object.values() {
                if field.is_array() {
                    return serde_json::from_value(field.clone())
                        .context("Refiner array field has unexpected shape");
                }
            }
        }

        Err(anyhow!("Refiner response contains no segment array"))
    }

    /// Overlay refined texts onto the originals. A missing or blank refined
    /// entry keeps the original; speakers are never rewritten.
    fn merge_refined(items: &[RefinementItem], refined: &[RefinementItem]) -> Vec<RefinementItem> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let text = match refined.get(i) {
                    Some(r) if !r.text.trim().is_empty() => r.text.clone(),
                    _ => item.text.clone(),
                };
                RefinementItem {
                    speaker: item.speaker.clone(),
                    text,
                }
            })
            .collect()
    }
}

#[async_trait]
impl TextRefiner for OllamaRefiner {
    async fn refine(
        &self,
        items: &[RefinementItem],
        chunk_index: u64,
    ) -> Result<Vec<RefinementItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let context = {
            let history = self.history.lock().await;
            history
                .iter()
                .rev()
                .take(CONTEXT_WINDOW)
                .rev()
                .cloned()
                .collect::<Vec<_>>()
                .join("\n")
        };

        let request = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                OllamaMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt(&context),
                },
                OllamaMessage {
                    role: "user".to_string(),
                    content: serde_json::to_string(items)?,
                },
            ],
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.config.base_url))
            .json(&request)
            .send()
            .await
            .context("Refiner request failed")?
            .error_for_status()
            .context("Refiner returned an error status")?
            .json::<OllamaChatResponse>()
            .await
            .context("Refiner response was not valid JSON")?;

        let refined = Self::parse_refined(&response.message.content)?;
        let merged = Self::merge_refined(items, &refined);

        let summary = merged
            .iter()
            .map(|item| item.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mut history = self.history.lock().await;
        history.push_back(summary);
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }

        debug!("Refined chunk {} ({} segments)", chunk_index, merged.len());
        Ok(merged)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}
