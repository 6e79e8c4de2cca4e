//! File-backed collaborators for the review command.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use redline_common::{Document, SectionContent, SectionId};
use redline_editor::{
    GenerationEvent, GenerationRequest, GenerationService, PersistError, PersistenceService,
};
use std::path::PathBuf;
use tracing::debug;

/// Streams a prepared suggestion back in fixed-size chunks
pub struct ReplayGeneration {
    text: String,
    rationale: Option<String>,
    chunk_size: usize,
}

impl ReplayGeneration {
    pub fn new(text: String, chunk_size: usize) -> Self {
        Self {
            text,
            rationale: None,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    fn chunks(&self) -> Vec<String> {
        let chars: Vec<char> = self.text.chars().collect();
        chars
            .chunks(self.chunk_size)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }
}

impl GenerationService for ReplayGeneration {
    fn generate(&self, request: GenerationRequest) -> BoxStream<'static, GenerationEvent> {
        debug!(
            target_kind = request.target.kind(),
            instruction = %request.instruction,
            "Replaying suggestion"
        );

        let mut events: Vec<GenerationEvent> =
            self.chunks().into_iter().map(GenerationEvent::Chunk).collect();
        if let Some(rationale) = &self.rationale {
            events.push(GenerationEvent::Rationale(rationale.clone()));
        }
        events.push(GenerationEvent::Complete);

        stream::iter(events).boxed()
    }
}

/// Writes saved sections back into the document JSON file
pub struct DocumentFileStore {
    path: PathBuf,
}

impl DocumentFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PersistenceService for DocumentFileStore {
    async fn save(&self, section_id: &SectionId, content: &SectionContent) -> Result<(), PersistError> {
        let storage = |e: redline_common::CommonError| PersistError::Storage(e.to_string());

        let mut doc = Document::load(&self.path).map_err(storage)?;
        let section = doc
            .section_mut(section_id)
            .ok_or_else(|| PersistError::Rejected(section_id.clone()))?;

        section.content = content.clone();
        doc.version += 1;
        doc.save(&self.path).map_err(storage)
    }
}
