//! # Revision Session
//!
//! Host-facing surface of the engine. A session owns one document and
//! wires the pieces together:
//!
//! ```text
//! trigger ─► ProposalMachine::open ─► GenerationClient::start
//!                                          │ drive()
//!                                          ▼
//!                              proposal updates ─► SessionEvent
//! accept  ─► DocumentMutator ─► RevisionHistory + DebouncedSaver
//! ```
//!
//! The session is driven from one task. Nothing in it is shared; the only
//! suspension point is [`RevisionSession::drive`], which waits on the live
//! generation.

use crate::config::EngineConfig;
use crate::errors::EditorError;
use crate::generation::{GenerationClient, GenerationRequest, GenerationService, StreamUpdate};
use crate::history::RevisionHistory;
use crate::mutator::{DocumentMutator, Revision, RevisionConflict};
use crate::persistence::{DebouncedSaver, PersistenceService};
use crate::proposal::{EditOrigin, EditProposal, Instruction, OpenOutcome, ProposalId, ProposalMachine};
use crate::selection::{EditorSurface, Locator, RawSelection, SelectionCapture};
use redline_common::{Document, SectionId};
use redline_diff::DiffResult;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Notifications for the host UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ProposalChanged(Option<EditProposal>),
    GeneratingChanged(bool),
    Failed(EditorError),
    Applied { section_id: SectionId, version: u64 },
}

pub struct RevisionSession {
    document: Document,
    proposals: ProposalMachine,
    generation: GenerationClient,
    capture: SelectionCapture,
    saver: DebouncedSaver,
    history: RevisionHistory,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

impl RevisionSession {
    pub fn new(
        document: Document,
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn PersistenceService>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            document,
            proposals: ProposalMachine::new(),
            generation: GenerationClient::new(generator, config.throttle()),
            capture: SelectionCapture::new(config.context_budget),
            saver: DebouncedSaver::new(store, config.save_debounce()),
            history: RevisionHistory::with_max_levels(config.history_levels),
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn proposal(&self) -> Option<&EditProposal> {
        self.proposals.active()
    }

    pub fn is_generating(&self) -> bool {
        self.generation.is_live()
    }

    pub fn history(&self) -> &RevisionHistory {
        &self.history
    }

    pub fn capture(&self) -> &SelectionCapture {
        &self.capture
    }

    /// Start a new generation session (e.g. a new chat turn)
    pub fn begin_session(&mut self) {
        self.proposals.begin_session();
    }

    /// Open a proposal for `origin` and start generating it
    ///
    /// Returns `Ok(None)` when the same trigger was already handled in this
    /// session.
    pub fn trigger(&mut self, origin: EditOrigin, instruction: &Instruction) -> Result<Option<ProposalId>, EditorError> {
        if self.proposals.is_duplicate(&origin, &instruction.id) {
            debug!(instruction = %instruction.id, "Trigger already handled");
            return Ok(None);
        }

        let original_text = match DocumentMutator::read_target(&self.document, &origin) {
            Ok(text) => text,
            Err(conflict) => return Err(self.fail(conflict.into())),
        };
        let prior_context = self.prior_context(&origin);

        let id = match self.proposals.open(origin.clone(), &instruction.id, original_text.clone()) {
            OpenOutcome::Opened { id, superseded } => {
                if let Some(old) = superseded {
                    info!(superseded = %old, proposal = %id, "Superseding active proposal");
                }
                id
            }
            OpenOutcome::Duplicate => return Ok(None),
        };

        self.generation.start(
            id,
            GenerationRequest {
                prior_context,
                instruction: instruction.text.clone(),
                original_text,
                target: origin,
            },
        );

        self.emit_proposal();
        self.emit(SessionEvent::GeneratingChanged(true));
        Ok(Some(id))
    }

    /// Trigger from the editor selection
    ///
    /// An unaddressable selection falls back to rewriting its section, or
    /// `fallback` when the selection names no known section.
    pub fn trigger_selection(
        &mut self,
        selection: Option<&RawSelection>,
        fallback: Option<&SectionId>,
        instruction: &Instruction,
    ) -> Result<Option<ProposalId>, EditorError> {
        if let Some(ctx) = selection.and_then(|raw| self.capture.capture(&self.document, raw)) {
            let origin = EditOrigin::RangeEdit {
                section_id: ctx.section_id,
                locator: ctx.range,
            };
            return self.trigger(origin, instruction);
        }

        let section_id = selection
            .map(|raw| &raw.section_id)
            .into_iter()
            .chain(fallback)
            .find(|id| self.document.section(id).is_some())
            .cloned();

        match section_id {
            Some(section_id) => {
                debug!(section = %section_id, "Selection unaddressable, rewriting whole section");
                self.trigger(EditOrigin::FullSectionRewrite { section_id }, instruction)
            }
            None => Err(self.fail(EditorError::UnsupportedSelection)),
        }
    }

    /// Open a proposal whose replacement is already written (reviewer
    /// suggestions). It goes straight to READY.
    pub fn propose_direct(
        &mut self,
        origin: EditOrigin,
        instruction: &Instruction,
        suggested: &str,
        rationale: &str,
    ) -> Result<Option<ProposalId>, EditorError> {
        if self.proposals.is_duplicate(&origin, &instruction.id) {
            return Ok(None);
        }

        let suggested = suggested.trim();
        if suggested.is_empty() {
            return Err(self.fail(EditorError::EmptyProposal));
        }

        let original_text = match DocumentMutator::read_target(&self.document, &origin) {
            Ok(text) => text,
            Err(conflict) => return Err(self.fail(conflict.into())),
        };

        let id = match self.proposals.open(origin, &instruction.id, original_text) {
            OpenOutcome::Opened { id, .. } => id,
            OpenOutcome::Duplicate => return Ok(None),
        };
        self.stop_generation();

        self.proposals.mark_ready(id, suggested.to_string())?;
        self.proposals.set_rationale(id, rationale)?;

        self.emit_proposal();
        Ok(Some(id))
    }

    /// Process the next update from the live generation
    ///
    /// Returns `false` when nothing is generating.
    pub async fn drive(&mut self) -> bool {
        match self.generation.next_update().await {
            Some((id, update)) => {
                self.handle_update(id, update);
                true
            }
            None => false,
        }
    }

    /// Drive until the live generation is over
    pub async fn settle(&mut self) {
        while self.drive().await {}
    }

    fn handle_update(&mut self, id: ProposalId, update: StreamUpdate) {
        if !self.proposals.is_active(id) {
            debug!(proposal = %id, "Dropping update for inactive proposal");
            return;
        }

        match update {
            StreamUpdate::Progress(text) => {
                if self.proposals.update_suggestion(id, &text).is_ok() {
                    self.emit_proposal();
                }
            }

            StreamUpdate::Rationale(text) => {
                if self.proposals.set_rationale(id, &text).is_ok() {
                    self.emit_proposal();
                }
            }

            StreamUpdate::Completed(text) => {
                if let Err(e) = self.proposals.mark_ready(id, text) {
                    warn!(proposal = %id, error = %e, "Could not finish proposal");
                }
                info!(proposal = %id, "Proposal ready for review");
                self.emit_proposal();
                self.emit(SessionEvent::GeneratingChanged(false));
            }

            StreamUpdate::Failed(error) => {
                self.proposals.discard(id);
                self.emit(SessionEvent::GeneratingChanged(false));
                self.emit_proposal();
                self.fail(error);
            }
        }
    }

    /// Reviewable diff of the active proposal
    pub fn diff(&self) -> Option<DiffResult> {
        self.proposals
            .active()
            .map(|p| redline_diff::diff(&p.original_text, &p.suggested_text))
    }

    /// Apply the READY proposal to the document
    ///
    /// A conflict discards the proposal and leaves the document untouched.
    pub fn accept(&mut self) -> Result<EditProposal, EditorError> {
        let proposal = self.proposals.ready()?;
        let id = proposal.id;
        let result = DocumentMutator::apply(&self.document, proposal);

        match result {
            Ok(next) => {
                let accepted = self.proposals.finish_accepted()?;
                info!(proposal = %id, origin = accepted.origin.kind(), "Proposal accepted");

                let description = format!("{} edit", accepted.origin.kind());
                self.commit(next, accepted.origin.section_id(), description);
                self.emit_proposal();
                Ok(accepted)
            }
            Err(conflict) => {
                warn!(proposal = %id, error = %conflict, "Proposal no longer applies");
                self.proposals.discard(id);
                self.emit_proposal();
                Err(self.fail(conflict.into()))
            }
        }
    }

    /// Accept and mirror a range replacement into the editor surface
    pub fn accept_into(&mut self, surface: &mut dyn EditorSurface) -> Result<EditProposal, EditorError> {
        let accepted = self.accept()?;

        if let EditOrigin::RangeEdit { section_id, locator } = &accepted.origin {
            surface.replace_range(section_id, locator, &accepted.suggested_text);
        }
        surface.clear_selection();

        Ok(accepted)
    }

    pub fn reject(&mut self) -> Result<EditProposal, EditorError> {
        self.stop_generation();
        let rejected = self.proposals.reject()?;
        self.emit_proposal();
        Ok(rejected)
    }

    /// Escape / click-outside; fine to call with nothing open
    pub fn dismiss(&mut self) -> Option<EditProposal> {
        self.stop_generation();
        let dismissed = self.proposals.dismiss();
        if dismissed.is_some() {
            self.emit_proposal();
        }
        dismissed
    }

    /// Apply independent user typing through the mutator
    pub fn apply_user_edit(&mut self, section_id: &SectionId, locator: Locator, replacement: &str) -> Result<(), EditorError> {
        let origin = EditOrigin::RangeEdit {
            section_id: section_id.clone(),
            locator,
        };
        let expected = DocumentMutator::read_target(&self.document, &origin)?;
        let revision = Revision::ReplaceRange {
            section_id: section_id.clone(),
            locator,
            expected,
            replacement: replacement.to_string(),
        };

        let next = DocumentMutator::apply_revision(&self.document, &revision)?;
        let dropped = self.proposals.rebase_range(section_id, &locator, replacement.len());
        self.commit(next, section_id, "user edit".to_string());
        self.report_lost_target(dropped, section_id);
        Ok(())
    }

    /// Undo the last revision; a pending range proposal on that section is
    /// dropped since its offsets no longer describe the restored text
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        match self.history.undo(&self.document)? {
            Some((next, section_id)) => {
                self.restore(next, &section_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        match self.history.redo(&self.document)? {
            Some((next, section_id)) => {
                self.restore(next, &section_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write pending saves now
    pub async fn flush(&mut self) -> usize {
        self.saver.flush().await
    }

    /// Teardown: stop generation, drop the proposal, cancel pending saves
    pub fn shutdown(&mut self) {
        self.stop_generation();
        self.proposals.dismiss();
        self.saver.cancel();
    }

    fn commit(&mut self, next: Document, section_id: &SectionId, description: String) {
        self.history.record(&self.document, &next, section_id, description);
        self.replace_document(next, section_id);
    }

    fn replace_document(&mut self, next: Document, section_id: &SectionId) {
        self.document = next;

        if let Some(section) = self.document.section(section_id) {
            self.saver.schedule(section_id.clone(), section.content.clone());
        }

        self.emit(SessionEvent::Applied {
            section_id: section_id.clone(),
            version: self.document.version,
        });
    }

    fn restore(&mut self, next: Document, section_id: &SectionId) {
        self.replace_document(next, section_id);
        let dropped = self.proposals.invalidate_section(section_id);
        self.report_lost_target(dropped, section_id);
    }

    fn report_lost_target(&mut self, dropped: Option<EditProposal>, section_id: &SectionId) {
        let Some(proposal) = dropped else {
            return;
        };

        warn!(proposal = %proposal.id, section = %section_id, "Section changed under range proposal");
        self.stop_generation();
        self.emit_proposal();
        self.fail(RevisionConflict::TextChanged(section_id.clone()).into());
    }

    fn stop_generation(&mut self) {
        if self.generation.is_live() {
            self.generation.cancel();
            self.emit(SessionEvent::GeneratingChanged(false));
        }
    }

    fn prior_context(&self, origin: &EditOrigin) -> String {
        let Some(section) = self.document.section(origin.section_id()) else {
            return String::new();
        };

        match origin {
            EditOrigin::FullSectionRewrite { .. } => {
                format!("{}\n{}", self.document.title, section.title)
            }
            EditOrigin::RangeEdit { locator, .. } => section
                .field(locator.path)
                .filter(|field| locator.slice(field).is_some())
                .map(|field| self.capture.window(field, locator.start, locator.end))
                .unwrap_or_default(),
            EditOrigin::HighlightEdit { highlighted_text, .. } => section
                .fields()
                .into_iter()
                .find_map(|(_, field)| {
                    field.find(highlighted_text.as_str()).map(|start| {
                        self.capture.window(field, start, start + highlighted_text.len())
                    })
                })
                .unwrap_or_default(),
        }
    }

    fn emit_proposal(&mut self) {
        let proposal = self.proposals.active().cloned();
        self.emit(SessionEvent::ProposalChanged(proposal));
    }

    fn emit(&mut self, event: SessionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn fail(&mut self, error: EditorError) -> EditorError {
        warn!(error = %error, "Edit failed");
        self.emit(SessionEvent::Failed(error.clone()));
        error
    }
}
