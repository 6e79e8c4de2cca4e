//! Error types for the editor

use crate::generation::GenerationFailure;
use crate::mutator::RevisionConflict;
use crate::proposal::ProposalError;
use thiserror::Error;

/// Failures surfaced to the host
///
/// Each one is terminal for the current proposal only. The engine always
/// returns to "no active proposal" after reporting it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Generation failed: {0}")]
    GenerationFailed(#[from] GenerationFailure),

    #[error("Generation produced an empty suggestion")]
    EmptyProposal,

    #[error("Could not apply, please retry: {0}")]
    RevisionConflict(#[from] RevisionConflict),

    #[error("Selection cannot be addressed and no section is available to fall back to")]
    UnsupportedSelection,

    #[error("Proposal error: {0}")]
    Proposal(#[from] ProposalError),
}
