// pipeline/session.rs
//
// Public session handle: ingestion entry point, live result stream, and
// session lifecycle. All registry/log mutation happens inside the worker
// task; this handle only enqueues work, subscribes to results, and reads
// the append-only log.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::info;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::AudioChunk;
use crate::config::PipelineConfig;

use super::timeline::{sort_chronological, TimelineLog};
use super::types::{ChunkResult, PipelineTask, SessionArtifact, SessionState, TimelineRecord};
use super::worker::{Engines, SessionWorker};

const RESULT_CHANNEL_CAPACITY: usize = 256;

/// One live session: a queue, a single worker, a broadcast channel, and an
/// append-only log.
pub struct SessionPipeline {
    session_id: String,
    config: PipelineConfig,
    engines: Engines,
    state: RwLock<SessionState>,
    tasks: Mutex<Option<mpsc::UnboundedSender<PipelineTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    results: broadcast::Sender<ChunkResult>,
    log_path: PathBuf,
    artifact_path: PathBuf,
    speaker_count: Arc<AtomicUsize>,
}

impl SessionPipeline {
    pub fn new(engines: Engines, config: PipelineConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!(
                "Failed to create output directory {}",
                config.output_dir.display()
            )
        })?;

        let log_path = config.output_dir.join("partial_result.jsonl");
        let artifact_path = config.output_dir.join("final_result.json");
        let (results, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);

        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            config,
            engines,
            state: RwLock::new(SessionState::Idle),
            tasks: Mutex::new(None),
            worker: Mutex::new(None),
            results,
            log_path,
            artifact_path,
            speaker_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Spawn the worker and start accepting chunks.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != SessionState::Idle {
            return Err(anyhow!("Session already started"));
        }

        let (task_sender, task_receiver) = mpsc::unbounded_channel();
        let log = TimelineLog::new(self.log_path.clone())?;
        // a fresh session never inherits a previous run's records
        log.truncate()?;
        let worker = SessionWorker::new(
            self.engines.clone(),
            self.config.clone(),
            log,
            self.results.clone(),
            self.speaker_count.clone(),
        );

        *self.worker.lock().await = Some(tokio::spawn(worker.run(task_receiver)));
        *self.tasks.lock().await = Some(task_sender);
        *state = SessionState::Running;

        info!("Session {} running", self.session_id);
        Ok(())
    }

    /// Queue one chunk for processing. Never blocks and never validates
    /// ordering: supplying a contiguous, equal-duration chunk sequence is
    /// the caller's responsibility.
    pub async fn enqueue_chunk(&self, chunk: AudioChunk) -> Result<()> {
        if *self.state.read().await != SessionState::Running {
            return Err(anyhow!("Session is not running"));
        }

        let tasks = self.tasks.lock().await;
        let sender = tasks
            .as_ref()
            .ok_or_else(|| anyhow!("Session worker not started"))?;
        sender
            .send(PipelineTask::Chunk(chunk))
            .map_err(|_| anyhow!("Session worker is gone"))?;
        Ok(())
    }

    /// Discard accumulated session state (speaker registry and log).
    /// Routed through the worker queue, so it is serialized with chunk
    /// processing and cannot race an in-flight chunk.
    pub async fn reset(&self) -> Result<()> {
        if *self.state.read().await != SessionState::Running {
            return Err(anyhow!("Session is not running"));
        }

        let tasks = self.tasks.lock().await;
        let sender = tasks
            .as_ref()
            .ok_or_else(|| anyhow!("Session worker not started"))?;
        sender
            .send(PipelineTask::Reset)
            .map_err(|_| anyhow!("Session worker is gone"))?;
        Ok(())
    }

    /// Subscribe to per-chunk result batches. The stream is in processing
    /// order, not global-time order.
    pub fn subscribe(&self) -> broadcast::Receiver<ChunkResult> {
        self.results.subscribe()
    }

    /// Every record persisted so far, in processing order.
    pub fn records_so_far(&self) -> Result<Vec<TimelineRecord>> {
        TimelineLog::new(self.log_path.clone())?.read_all()
    }

    /// Distinct speakers the registry has identified so far.
    pub fn speaker_count(&self) -> usize {
        self.speaker_count.load(Ordering::SeqCst)
    }

    /// End the session: stop accepting chunks, drain the queue via a
    /// sentinel, join the worker, and emit the chronologically sorted
    /// artifact. Irreversible for this pipeline instance.
    pub async fn end(&self) -> Result<SessionArtifact> {
        {
            let mut state = self.state.write().await;
            match *state {
                SessionState::Ended => return Err(anyhow!("Session already ended")),
                SessionState::Idle => return Err(anyhow!("Session was never started")),
                SessionState::Running => *state = SessionState::Ended,
            }
        }

        // The sentinel lets the worker finish the in-flight chunk and every
        // chunk queued before it, then exit.
        if let Some(sender) = self.tasks.lock().await.take() {
            let _ = sender.send(PipelineTask::Shutdown);
        }
        if let Some(handle) = self.worker.lock().await.take() {
            handle.await.context("Session worker panicked")?;
        }

        let mut segments = self.records_so_far()?;
        sort_chronological(&mut segments);

        let artifact = SessionArtifact {
            session_id: self.session_id.clone(),
            created_at: Utc::now().to_rfc3339(),
            chunk_duration_secs: self.config.chunk_duration_secs,
            speaker_count: self.speaker_count(),
            segments,
        };

        let json = serde_json::to_string_pretty(&artifact)?;
        std::fs::write(&self.artifact_path, json).with_context(|| {
            format!(
                "Failed to write session artifact {}",
                self.artifact_path.display()
            )
        })?;

        info!(
            "Session {} ended: {} segments from {} speaker(s)",
            self.session_id,
            artifact.segments.len(),
            artifact.speaker_count
        );
        Ok(artifact)
    }
}
