//! # Edit Proposals
//!
//! A proposal is a reviewable candidate edit that has not been applied yet.
//! [`ProposalMachine`] owns the single active proposal and enforces its
//! lifecycle:
//!
//! ```text
//! PENDING ──► STREAMING ──► READY ──► ACCEPTED
//!    │            │           │
//!    └────────────┴───────────┴─────► REJECTED (dismiss / supersede)
//! ```
//!
//! Only a READY proposal can be accepted, so truncated streaming text is
//! never applied.

use crate::selection::Locator;
use chrono::{DateTime, Utc};
use redline_common::SectionId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Where an edit came from and what it targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditOrigin {
    #[serde(rename_all = "camelCase")]
    FullSectionRewrite { section_id: SectionId },

    #[serde(rename_all = "camelCase")]
    RangeEdit { section_id: SectionId, locator: Locator },

    #[serde(rename_all = "camelCase")]
    HighlightEdit {
        section_id: SectionId,
        highlighted_text: String,
    },
}

impl EditOrigin {
    pub fn section_id(&self) -> &SectionId {
        match self {
            EditOrigin::FullSectionRewrite { section_id }
            | EditOrigin::RangeEdit { section_id, .. }
            | EditOrigin::HighlightEdit { section_id, .. } => section_id,
        }
    }

    pub fn dedup_target(&self) -> DedupTarget {
        match self {
            EditOrigin::FullSectionRewrite { section_id } => DedupTarget::Section(section_id.clone()),
            EditOrigin::RangeEdit { section_id, locator } => {
                DedupTarget::Range(section_id.clone(), *locator)
            }
            EditOrigin::HighlightEdit {
                section_id,
                highlighted_text,
            } => DedupTarget::Highlight(section_id.clone(), highlighted_text.clone()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EditOrigin::FullSectionRewrite { .. } => "full_section",
            EditOrigin::RangeEdit { .. } => "range",
            EditOrigin::HighlightEdit { .. } => "highlight",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupTarget {
    Section(SectionId),
    Range(SectionId, Locator),
    Highlight(SectionId, String),
}

/// `(target, instruction)` pair already handled in this session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub target: DedupTarget,
    pub instruction_id: String,
}

/// The request that triggered a proposal
///
/// `id` identifies the upstream event (a chat message, a tool call, a
/// review comment). The same event observed twice carries the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: String,
    pub text: String,
}

impl Instruction {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proposal-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProposalStatus {
    Pending,
    Streaming,
    Ready,
    Accepted,
    Rejected,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Accepted | ProposalStatus::Rejected)
    }

    fn can_become(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        match (self, next) {
            (Pending, Streaming) | (Pending, Ready) => true,
            (Streaming, Streaming) | (Streaming, Ready) => true,
            (Ready, Accepted) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Streaming => "STREAMING",
            ProposalStatus::Ready => "READY",
            ProposalStatus::Accepted => "ACCEPTED",
            ProposalStatus::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProposal {
    pub id: ProposalId,
    pub origin: EditOrigin,
    pub instruction_id: String,
    pub original_text: String,
    pub suggested_text: String,
    pub rationale: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProposalError {
    #[error("No active proposal")]
    NoActiveProposal,

    #[error("{id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ProposalId,
        from: ProposalStatus,
        to: ProposalStatus,
    },

    #[error("{0} is no longer active")]
    Stale(ProposalId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened {
        id: ProposalId,
        superseded: Option<ProposalId>,
    },

    /// Key already handled this session; nothing changed
    Duplicate,
}

/// Owner of the single active proposal
#[derive(Debug, Default)]
pub struct ProposalMachine {
    active: Option<EditProposal>,
    handled: HashSet<DedupKey>,
    next_id: u64,
}

impl ProposalMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation session, forgetting handled trigger keys
    pub fn begin_session(&mut self) {
        self.handled.clear();
    }

    pub fn active(&self) -> Option<&EditProposal> {
        self.active.as_ref()
    }

    pub fn is_active(&self, id: ProposalId) -> bool {
        self.active.as_ref().is_some_and(|p| p.id == id)
    }

    pub fn is_duplicate(&self, origin: &EditOrigin, instruction_id: &str) -> bool {
        self.handled.contains(&DedupKey {
            target: origin.dedup_target(),
            instruction_id: instruction_id.to_string(),
        })
    }

    /// Open a PENDING proposal, superseding any active one
    pub fn open(&mut self, origin: EditOrigin, instruction_id: &str, original_text: String) -> OpenOutcome {
        let key = DedupKey {
            target: origin.dedup_target(),
            instruction_id: instruction_id.to_string(),
        };
        if !self.handled.insert(key) {
            debug!(origin = origin.kind(), instruction = instruction_id, "Duplicate trigger ignored");
            return OpenOutcome::Duplicate;
        }

        let superseded = self.active.take().map(|mut old| {
            old.status = ProposalStatus::Rejected;
            debug!(proposal = %old.id, "Proposal superseded");
            old.id
        });

        self.next_id += 1;
        let id = ProposalId(self.next_id);
        self.active = Some(EditProposal {
            id,
            origin,
            instruction_id: instruction_id.to_string(),
            original_text,
            suggested_text: String::new(),
            rationale: String::new(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        });

        OpenOutcome::Opened { id, superseded }
    }

    /// Shift a pending range target past an edit made earlier in the same
    /// field. `edit` is the replaced range, `inserted` the new byte length.
    ///
    /// An edit that overlaps the target leaves no way to tell where the
    /// target went, so the proposal is dropped and returned.
    pub fn rebase_range(&mut self, section_id: &SectionId, edit: &Locator, inserted: usize) -> Option<EditProposal> {
        let proposal = self.active.as_mut()?;
        let id = proposal.id;

        let EditOrigin::RangeEdit {
            section_id: target,
            locator,
        } = &mut proposal.origin
        else {
            return None;
        };
        if *target != *section_id || locator.path != edit.path {
            return None;
        }

        if edit.end <= locator.start {
            let removed = edit.len();
            locator.start = locator.start - removed + inserted;
            locator.end = locator.end - removed + inserted;
            debug!(proposal = %id, start = locator.start, "Range target rebased");
            None
        } else if edit.start < locator.end {
            debug!(proposal = %id, "Edit overlaps range target");
            self.discard(id)
        } else {
            None
        }
    }

    /// Drop an active range proposal on `section_id` after the section was
    /// rewritten as a whole (undo, redo)
    pub fn invalidate_section(&mut self, section_id: &SectionId) -> Option<EditProposal> {
        let id = match self.active.as_ref() {
            Some(EditProposal {
                id,
                origin: EditOrigin::RangeEdit { section_id: target, .. },
                ..
            }) if target == section_id => *id,
            _ => return None,
        };

        debug!(proposal = %id, section = %section_id, "Range target invalidated");
        self.discard(id)
    }

    /// Replace the visible suggestion with the text streamed so far
    pub fn update_suggestion(&mut self, id: ProposalId, text: &str) -> Result<&EditProposal, ProposalError> {
        let proposal = self.transition(id, ProposalStatus::Streaming)?;
        proposal.suggested_text = text.to_string();
        Ok(proposal)
    }

    pub fn set_rationale(&mut self, id: ProposalId, rationale: &str) -> Result<(), ProposalError> {
        let proposal = self.get_mut(id)?;
        proposal.rationale = rationale.to_string();
        Ok(())
    }

    pub fn mark_ready(&mut self, id: ProposalId, final_text: String) -> Result<&EditProposal, ProposalError> {
        let proposal = self.transition(id, ProposalStatus::Ready)?;
        proposal.suggested_text = final_text;
        Ok(proposal)
    }

    /// The active proposal, if it may be accepted right now
    pub fn ready(&self) -> Result<&EditProposal, ProposalError> {
        let proposal = self.active.as_ref().ok_or(ProposalError::NoActiveProposal)?;
        if proposal.status != ProposalStatus::Ready {
            return Err(ProposalError::InvalidTransition {
                id: proposal.id,
                from: proposal.status,
                to: ProposalStatus::Accepted,
            });
        }
        Ok(proposal)
    }

    /// Close the active proposal as ACCEPTED
    pub fn finish_accepted(&mut self) -> Result<EditProposal, ProposalError> {
        let id = self.ready()?.id;
        self.close(id, ProposalStatus::Accepted)
    }

    /// Close the active proposal as REJECTED
    pub fn reject(&mut self) -> Result<EditProposal, ProposalError> {
        let id = self.active.as_ref().ok_or(ProposalError::NoActiveProposal)?.id;
        self.close(id, ProposalStatus::Rejected)
    }

    /// Reject whatever is active, if anything
    pub fn dismiss(&mut self) -> Option<EditProposal> {
        self.reject().ok()
    }

    /// Drop a proposal after a failure, if it is still the active one
    pub fn discard(&mut self, id: ProposalId) -> Option<EditProposal> {
        self.close(id, ProposalStatus::Rejected).ok()
    }

    fn close(&mut self, id: ProposalId, status: ProposalStatus) -> Result<EditProposal, ProposalError> {
        self.transition(id, status)?;
        let mut proposal = self.active.take().ok_or(ProposalError::NoActiveProposal)?;
        proposal.status = status;
        debug!(proposal = %id, status = %status, "Proposal closed");
        Ok(proposal)
    }

    fn get_mut(&mut self, id: ProposalId) -> Result<&mut EditProposal, ProposalError> {
        match self.active.as_mut() {
            Some(proposal) if proposal.id == id => Ok(proposal),
            _ => Err(ProposalError::Stale(id)),
        }
    }

    fn transition(&mut self, id: ProposalId, to: ProposalStatus) -> Result<&mut EditProposal, ProposalError> {
        let proposal = self.get_mut(id)?;
        if !proposal.status.can_become(to) {
            return Err(ProposalError::InvalidTransition {
                id,
                from: proposal.status,
                to,
            });
        }
        proposal.status = to;
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_common::TextPath;

    fn section_origin(id: &str) -> EditOrigin {
        EditOrigin::FullSectionRewrite {
            section_id: SectionId::new(id),
        }
    }

    fn opened(outcome: OpenOutcome) -> ProposalId {
        match outcome {
            OpenOutcome::Opened { id, .. } => id,
            OpenOutcome::Duplicate => panic!("expected a new proposal"),
        }
    }

    #[test]
    fn test_lifecycle_to_accepted() {
        let mut machine = ProposalMachine::new();
        let id = opened(machine.open(section_origin("summary"), "msg-1", "was".into()));

        assert_eq!(machine.active().unwrap().status, ProposalStatus::Pending);

        machine.update_suggestion(id, "we").unwrap();
        assert_eq!(machine.active().unwrap().status, ProposalStatus::Streaming);

        machine.mark_ready(id, "were".into()).unwrap();
        let accepted = machine.finish_accepted().unwrap();

        assert_eq!(accepted.status, ProposalStatus::Accepted);
        assert_eq!(accepted.suggested_text, "were");
        assert!(machine.active().is_none());
    }

    #[test]
    fn test_streaming_proposal_cannot_be_accepted() {
        let mut machine = ProposalMachine::new();
        let id = opened(machine.open(section_origin("summary"), "msg-1", "a".into()));
        machine.update_suggestion(id, "partial").unwrap();

        let err = machine.finish_accepted().unwrap_err();
        assert_eq!(
            err,
            ProposalError::InvalidTransition {
                id,
                from: ProposalStatus::Streaming,
                to: ProposalStatus::Accepted,
            }
        );
        assert!(machine.active().is_some());
    }

    #[test]
    fn test_duplicate_key_is_noop() {
        let mut machine = ProposalMachine::new();
        let first = opened(machine.open(section_origin("summary"), "msg-1", "a".into()));

        assert_eq!(
            machine.open(section_origin("summary"), "msg-1", "a".into()),
            OpenOutcome::Duplicate
        );
        assert_eq!(machine.active().unwrap().id, first);

        // Same target, different instruction is a new trigger
        assert!(matches!(
            machine.open(section_origin("summary"), "msg-2", "a".into()),
            OpenOutcome::Opened { superseded: Some(old), .. } if old == first
        ));
    }

    #[test]
    fn test_begin_session_forgets_keys() {
        let mut machine = ProposalMachine::new();
        opened(machine.open(section_origin("summary"), "msg-1", "a".into()));
        machine.dismiss();

        machine.begin_session();
        assert!(!machine.is_duplicate(&section_origin("summary"), "msg-1"));
        opened(machine.open(section_origin("summary"), "msg-1", "a".into()));
    }

    #[test]
    fn test_stale_updates_are_refused() {
        let mut machine = ProposalMachine::new();
        let first = opened(machine.open(section_origin("a"), "msg-1", "x".into()));
        let second = opened(machine.open(section_origin("b"), "msg-2", "y".into()));

        assert_eq!(
            machine.update_suggestion(first, "late").unwrap_err(),
            ProposalError::Stale(first)
        );
        assert!(machine.discard(first).is_none());
        assert_eq!(machine.active().unwrap().id, second);
        assert_eq!(machine.active().unwrap().suggested_text, "");
    }

    #[test]
    fn test_reject_without_proposal() {
        let mut machine = ProposalMachine::new();
        assert_eq!(machine.reject().unwrap_err(), ProposalError::NoActiveProposal);
        assert!(machine.dismiss().is_none());
    }

    #[test]
    fn test_dedup_targets_by_origin() {
        let range = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 2, 5),
        };
        let other_range = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 2, 6),
        };

        let mut machine = ProposalMachine::new();
        opened(machine.open(range.clone(), "msg-1", "abc".into()));
        assert!(machine.is_duplicate(&range, "msg-1"));
        assert!(!machine.is_duplicate(&other_range, "msg-1"));
    }

    #[test]
    fn test_rebase_range_only_for_edits_before_target() {
        let mut machine = ProposalMachine::new();
        let origin = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 10, 13),
        };
        opened(machine.open(origin, "msg-1", "was".into()));

        // Two bytes replaced by five, before the target
        machine.rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Body, 0, 2), 5);
        // After the target: no effect
        machine.rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Body, 20, 22), 0);
        // Other section: no effect
        machine.rebase_range(&SectionId::new("t"), &Locator::new(TextPath::Body, 0, 1), 9);

        match &machine.active().unwrap().origin {
            EditOrigin::RangeEdit { locator, .. } => {
                assert_eq!((locator.start, locator.end), (13, 16));
            }
            other => panic!("unexpected origin {:?}", other),
        }
    }

    #[test]
    fn test_overlapping_edit_drops_range_proposal() {
        let mut machine = ProposalMachine::new();
        let origin = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 2, 4),
        };
        let id = opened(machine.open(origin, "msg-1", "aa".into()));

        // Insertion at the end of the target does not touch it
        assert!(machine
            .rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Body, 4, 4), 1)
            .is_none());
        // Same offsets in another field
        assert!(machine
            .rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Description { sub: 0 }, 1, 3), 1)
            .is_none());

        let dropped = machine
            .rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Body, 1, 3), 1)
            .unwrap();
        assert_eq!(dropped.id, id);
        assert_eq!(dropped.status, ProposalStatus::Rejected);
        assert!(machine.active().is_none());
    }

    #[test]
    fn test_insertion_inside_target_drops_range_proposal() {
        let mut machine = ProposalMachine::new();
        let origin = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 2, 6),
        };
        opened(machine.open(origin, "msg-1", "abcd".into()));

        assert!(machine
            .rebase_range(&SectionId::new("s"), &Locator::new(TextPath::Body, 4, 4), 3)
            .is_some());
    }

    #[test]
    fn test_invalidate_section_only_hits_range_targets() {
        let mut machine = ProposalMachine::new();
        opened(machine.open(section_origin("s"), "msg-1", "text".into()));
        assert!(machine.invalidate_section(&SectionId::new("s")).is_none());

        let origin = EditOrigin::RangeEdit {
            section_id: SectionId::new("s"),
            locator: Locator::new(TextPath::Body, 0, 2),
        };
        opened(machine.open(origin, "msg-2", "te".into()));
        assert!(machine.invalidate_section(&SectionId::new("t")).is_none());
        assert!(machine.invalidate_section(&SectionId::new("s")).is_some());
        assert!(machine.active().is_none());
    }

    #[test]
    fn test_origin_serialization_is_tagged() {
        let origin = EditOrigin::HighlightEdit {
            section_id: SectionId::new("summary"),
            highlighted_text: "was".into(),
        };
        let json = serde_json::to_value(&origin).unwrap();

        assert_eq!(json["type"], "highlightEdit");
        assert_eq!(json["sectionId"], "summary");
        assert_eq!(json["highlightedText"], "was");
    }
}
