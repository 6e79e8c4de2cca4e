//! # Redline Editor
//!
//! Edit proposal and diff reconciliation engine for structured reports.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ selection: editor surface → SelectionContext│
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: one document, one active proposal  │
//! │  - Dedup and supersede triggers             │
//! │  - Drive a cancellable generation stream    │
//! │  - Accept / reject / dismiss                │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutator: validated writes, no partial state │
//! │ history + debounced persistence             │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **One proposal at a time**: a new trigger supersedes the old one
//! 2. **Only READY is accepted**: streaming text is never applied
//! 3. **Scoped conflicts**: a proposal is checked against its own target,
//!    not the whole section
//! 4. **Torn-down streams stay silent**: a cancelled generation cannot touch
//!    a later proposal
//! 5. **The host owns storage**: the engine only schedules saves
//!
//! ## Usage
//!
//! ```rust,ignore
//! use redline_editor::{EditOrigin, EngineConfig, Instruction, RevisionSession};
//!
//! let mut session = RevisionSession::new(doc, generator, store, &EngineConfig::default());
//!
//! session.trigger(
//!     EditOrigin::FullSectionRewrite { section_id: "summary".into() },
//!     &Instruction::new("msg-42", "fix grammar"),
//! )?;
//! session.settle().await;
//!
//! println!("{}", session.diff().unwrap().stats().change_summary());
//! session.accept()?;
//! session.flush().await;
//! ```

mod config;
mod errors;
mod generation;
mod history;
mod mutator;
mod persistence;
mod proposal;
mod selection;
mod session;

pub use config::EngineConfig;
pub use errors::EditorError;
pub use generation::{
    ChunkThrottle, GenerationClient, GenerationEvent, GenerationFailure, GenerationHandle,
    GenerationRequest, GenerationService, StreamUpdate,
};
pub use history::{HistoryEntry, RevisionHistory};
pub use mutator::{DocumentMutator, Revision, RevisionConflict};
pub use persistence::{DebouncedSaver, PersistError, PersistenceService};
pub use proposal::{
    DedupKey, DedupTarget, EditOrigin, EditProposal, Instruction, OpenOutcome, ProposalError,
    ProposalId, ProposalMachine, ProposalStatus,
};
pub use selection::{
    EditorSurface, Locator, RawSelection, SelectionCapture, SelectionContext, SelectionPoint,
    SelectionTracker,
};
pub use session::{RevisionSession, SessionEvent};

// Re-export common types for convenience
pub use redline_common::{Document, Section, SectionContent, SectionId, TextPath};
pub use redline_diff::{DiffKind, DiffOp, DiffResult, DiffStats};
