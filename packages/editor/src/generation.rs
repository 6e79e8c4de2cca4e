//! # Generation Stream Client
//!
//! Drives one request against the external generation service and turns its
//! event stream into throttled proposal updates.
//!
//! ```text
//! GenerationService ──► BoxStream<GenerationEvent>
//!                              │
//!                     pump task (select! on stream / throttle deadline)
//!                              │  mpsc
//!                              ▼
//!                      GenerationHandle ──► StreamUpdate
//! ```
//!
//! The pump task is owned by its handle. Dropping or cancelling the handle
//! aborts the task and drains its channel, so no update from a cancelled
//! request can reach a later proposal.

use crate::errors::EditorError;
use crate::proposal::{EditOrigin, ProposalId};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prior_context: String,
    pub instruction: String,
    pub original_text: String,
    pub target: EditOrigin,
}

/// Events emitted by the generation service
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationEvent {
    /// Incremental UTF-8 text
    Chunk(String),

    /// Short explanation of the change
    Rationale(String),

    /// Normal end of stream
    Complete,

    /// Typed failure; ends the stream
    Failed(GenerationFailure),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationEvent::Complete | GenerationEvent::Failed(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("stream ended before completion")]
    Truncated,
}

/// External text generation collaborator
pub trait GenerationService: Send + Sync {
    fn generate(&self, request: GenerationRequest) -> BoxStream<'static, GenerationEvent>;
}

/// What the host sees from a running generation
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Accumulated text so far
    Progress(String),

    Rationale(String),

    /// Final trimmed text, never empty
    Completed(String),

    Failed(EditorError),
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamUpdate::Completed(_) | StreamUpdate::Failed(_))
    }
}

/// Chunk accumulator that rate-limits visible updates
///
/// The first chunk is released immediately. After that, text is released at
/// most once per `interval`; anything held back is released when the
/// deadline passes.
#[derive(Debug)]
pub struct ChunkThrottle {
    interval: Duration,
    buffer: String,
    last_flush: Option<Instant>,
    dirty: bool,
}

impl ChunkThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            buffer: String::new(),
            last_flush: None,
            dirty: false,
        }
    }

    pub fn push(&mut self, chunk: &str, now: Instant) -> Option<String> {
        self.buffer.push_str(chunk);
        self.dirty = true;

        match self.last_flush {
            Some(last) if now.duration_since(last) < self.interval => None,
            _ => Some(self.release(now)),
        }
    }

    /// When held-back text is due
    pub fn deadline(&self) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        self.last_flush.map(|last| last + self.interval)
    }

    pub fn flush(&mut self, now: Instant) -> Option<String> {
        self.dirty.then(|| self.release(now))
    }

    /// Take the whole buffer, trimmed
    pub fn finish(&mut self) -> String {
        self.dirty = false;
        std::mem::take(&mut self.buffer).trim().to_string()
    }

    fn release(&mut self, now: Instant) -> String {
        self.last_flush = Some(now);
        self.dirty = false;
        self.buffer.clone()
    }
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One live generation request
pub struct GenerationHandle {
    proposal: ProposalId,
    updates: mpsc::UnboundedReceiver<StreamUpdate>,
    task: AbortOnDrop,
    cancelled: bool,
}

impl GenerationHandle {
    pub fn spawn(
        proposal: ProposalId,
        stream: BoxStream<'static, GenerationEvent>,
        throttle: Duration,
    ) -> Self {
        let (tx, updates) = mpsc::unbounded_channel();
        let task = tokio::spawn(pump(proposal, stream, ChunkThrottle::new(throttle), tx));

        Self {
            proposal,
            updates,
            task: AbortOnDrop(task.abort_handle()),
            cancelled: false,
        }
    }

    pub fn proposal(&self) -> ProposalId {
        self.proposal
    }

    /// Next update, or `None` once the stream is over or cancelled
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        if self.cancelled {
            return None;
        }
        self.updates.recv().await
    }

    /// Stop the request. Safe to call more than once, and after completion.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        self.task.0.abort();
        self.updates.close();
        while self.updates.try_recv().is_ok() {}
        debug!(proposal = %self.proposal, "Generation cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for GenerationHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn pump(
    proposal: ProposalId,
    mut stream: BoxStream<'static, GenerationEvent>,
    mut throttle: ChunkThrottle,
    tx: mpsc::UnboundedSender<StreamUpdate>,
) {
    loop {
        let deadline = throttle.deadline();
        let wake = deadline.unwrap_or_else(Instant::now);

        tokio::select! {
            event = stream.next() => {
                let update = match event {
                    Some(GenerationEvent::Chunk(text)) => {
                        match throttle.push(&text, Instant::now()) {
                            Some(accumulated) => StreamUpdate::Progress(accumulated),
                            None => continue,
                        }
                    }
                    Some(GenerationEvent::Rationale(text)) => StreamUpdate::Rationale(text),
                    Some(GenerationEvent::Complete) => {
                        let text = throttle.finish();
                        if text.is_empty() {
                            warn!(proposal = %proposal, "Generation completed with empty text");
                            StreamUpdate::Failed(EditorError::EmptyProposal)
                        } else {
                            StreamUpdate::Completed(text)
                        }
                    }
                    Some(GenerationEvent::Failed(failure)) => {
                        warn!(proposal = %proposal, error = %failure, "Generation failed");
                        StreamUpdate::Failed(failure.into())
                    }
                    None => {
                        warn!(proposal = %proposal, "Generation stream ended without completion");
                        StreamUpdate::Failed(GenerationFailure::Truncated.into())
                    }
                };

                let terminal = update.is_terminal();
                if tx.send(update).is_err() || terminal {
                    return;
                }
            }
            _ = sleep_until(wake), if deadline.is_some() => {
                if let Some(accumulated) = throttle.flush(Instant::now()) {
                    if tx.send(StreamUpdate::Progress(accumulated)).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Keeps at most one generation live
pub struct GenerationClient {
    service: Arc<dyn GenerationService>,
    throttle: Duration,
    live: Option<GenerationHandle>,
}

impl GenerationClient {
    pub fn new(service: Arc<dyn GenerationService>, throttle: Duration) -> Self {
        Self {
            service,
            throttle,
            live: None,
        }
    }

    /// Start a request for `proposal`, cancelling whatever was live
    pub fn start(&mut self, proposal: ProposalId, request: GenerationRequest) {
        self.cancel();
        info!(proposal = %proposal, target = request.target.kind(), "Starting generation");

        let stream = self.service.generate(request);
        self.live = Some(GenerationHandle::spawn(proposal, stream, self.throttle));
    }

    pub fn cancel(&mut self) {
        if let Some(mut handle) = self.live.take() {
            handle.cancel();
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn live_proposal(&self) -> Option<ProposalId> {
        self.live.as_ref().map(|h| h.proposal())
    }

    /// Wait for the next update of the live request
    ///
    /// The handle is released once it yields a terminal update.
    pub async fn next_update(&mut self) -> Option<(ProposalId, StreamUpdate)> {
        let handle = self.live.as_mut()?;
        let proposal = handle.proposal();

        match handle.next_update().await {
            Some(update) => {
                if update.is_terminal() {
                    self.live = None;
                }
                Some((proposal, update))
            }
            None => {
                self.live = None;
                None
            }
        }
    }
}
