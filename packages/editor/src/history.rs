//! # Revision History
//!
//! Undo/redo over applied revisions.
//!
//! ## Design
//!
//! - Each applied revision records the section content before and after
//! - Undo restores the before-content and moves the entry to the redo stack
//! - Redo restores the after-content
//! - New revisions clear the redo stack
//! - Restores go through the mutator, so undoing over a section that has
//!   since changed is a conflict rather than a silent overwrite
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut history = RevisionHistory::new();
//! let next = DocumentMutator::apply(&doc, &proposal)?;
//! history.record(&doc, &next, proposal.origin.section_id(), "fix grammar");
//!
//! let restored = history.undo(&next)?;
//! ```

use crate::mutator::{DocumentMutator, Revision, RevisionConflict};
use redline_common::{Document, SectionContent, SectionId};

/// One applied change to a single section
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub section_id: SectionId,
    pub before: SectionContent,
    pub after: SectionContent,
    pub description: Option<String>,
}

impl HistoryEntry {
    fn undo_revision(&self) -> Revision {
        Revision::RestoreSection {
            section_id: self.section_id.clone(),
            expected: self.after.clone(),
            content: self.before.clone(),
        }
    }

    fn redo_revision(&self) -> Revision {
        Revision::RestoreSection {
            section_id: self.section_id.clone(),
            expected: self.before.clone(),
            content: self.after.clone(),
        }
    }
}

#[derive(Debug)]
pub struct RevisionHistory {
    /// Applied entries (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// Undone entries (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl RevisionHistory {
    /// Create a history with default max levels (100)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
        }
    }

    /// Record the change `section_id` went through between two documents
    pub fn record(&mut self, before: &Document, after: &Document, section_id: &SectionId, description: impl Into<String>) {
        let (Some(old), Some(new)) = (before.section(section_id), after.section(section_id)) else {
            return;
        };
        if old.content == new.content {
            return;
        }

        self.push(HistoryEntry {
            section_id: section_id.clone(),
            before: old.content.clone(),
            after: new.content.clone(),
            description: Some(description.into()),
        });
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        self.redo_stack.clear();
    }

    /// Undo the most recent entry
    ///
    /// `Ok(None)` when there is nothing to undo. On conflict the entry stays
    /// where it was.
    pub fn undo(&mut self, doc: &Document) -> Result<Option<(Document, SectionId)>, RevisionConflict> {
        let Some(entry) = self.undo_stack.last() else {
            return Ok(None);
        };

        let next = DocumentMutator::apply_revision(doc, &entry.undo_revision())?;
        let section_id = entry.section_id.clone();
        if let Some(entry) = self.undo_stack.pop() {
            self.redo_stack.push(entry);
        }

        Ok(Some((next, section_id)))
    }

    /// Redo the most recently undone entry
    pub fn redo(&mut self, doc: &Document) -> Result<Option<(Document, SectionId)>, RevisionConflict> {
        let Some(entry) = self.redo_stack.last() else {
            return Ok(None);
        };

        let next = DocumentMutator::apply_revision(doc, &entry.redo_revision())?;
        let section_id = entry.section_id.clone();
        if let Some(entry) = self.redo_stack.pop() {
            self.undo_stack.push(entry);
        }

        Ok(Some((next, section_id)))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }
}

impl Default for RevisionHistory {
    fn default() -> Self {
        Self::new()
    }
}
