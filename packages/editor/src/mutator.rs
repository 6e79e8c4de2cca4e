//! # Document Mutator
//!
//! Validated writes into the report document.
//!
//! ## Revision Semantics
//!
//! ### ReplaceSection
//! - Whole-section replacement
//! - Fails if the section's canonical text is not what the proposal saw
//! - A structured section stays structured when the replacement parses
//!   back into subsections
//!
//! ### ReplaceRange
//! - Byte-range replacement inside one field
//! - Conflict check is scoped to the range: edits elsewhere in the section
//!   do not block it
//!
//! ### ReplaceFirstMatch
//! - Replaces the first exact occurrence, searching fields in canonical order
//! - Never falls back to a near match
//!
//! ### RestoreSection
//! - Used by undo/redo to swap whole section content back

use crate::proposal::{EditOrigin, EditProposal};
use crate::selection::Locator;
use redline_common::markdown;
use redline_common::{Document, Section, SectionContent, SectionId, TextPath};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Revision {
    ReplaceSection {
        section_id: SectionId,
        expected: String,
        replacement: String,
    },

    ReplaceRange {
        section_id: SectionId,
        locator: Locator,
        expected: String,
        replacement: String,
    },

    ReplaceFirstMatch {
        section_id: SectionId,
        needle: String,
        replacement: String,
    },

    RestoreSection {
        section_id: SectionId,
        expected: SectionContent,
        content: SectionContent,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RevisionConflict {
    #[error("Section not found: {0}")]
    SectionMissing(SectionId),

    #[error("Field {path} not found in section {section_id}")]
    FieldMissing { section_id: SectionId, path: TextPath },

    #[error("Range {start}..{end} does not fit a field of {len} bytes")]
    OutOfBounds { start: usize, end: usize, len: usize },

    #[error("Text at the target in section {0} has changed")]
    TextChanged(SectionId),

    #[error("Highlighted text is no longer present in section {0}")]
    HighlightMissing(SectionId),
}

impl Revision {
    /// Revision that writes an accepted proposal
    pub fn from_proposal(proposal: &EditProposal) -> Self {
        let replacement = proposal.suggested_text.clone();

        match &proposal.origin {
            EditOrigin::FullSectionRewrite { section_id } => Revision::ReplaceSection {
                section_id: section_id.clone(),
                expected: proposal.original_text.clone(),
                replacement,
            },
            EditOrigin::RangeEdit { section_id, locator } => Revision::ReplaceRange {
                section_id: section_id.clone(),
                locator: *locator,
                expected: proposal.original_text.clone(),
                replacement,
            },
            EditOrigin::HighlightEdit {
                section_id,
                highlighted_text,
            } => Revision::ReplaceFirstMatch {
                section_id: section_id.clone(),
                needle: highlighted_text.clone(),
                replacement,
            },
        }
    }

    pub fn section_id(&self) -> &SectionId {
        match self {
            Revision::ReplaceSection { section_id, .. }
            | Revision::ReplaceRange { section_id, .. }
            | Revision::ReplaceFirstMatch { section_id, .. }
            | Revision::RestoreSection { section_id, .. } => section_id,
        }
    }

    /// Check the revision against the current document without writing
    pub fn validate(&self, doc: &Document) -> Result<(), RevisionConflict> {
        let section = doc
            .section(self.section_id())
            .ok_or_else(|| RevisionConflict::SectionMissing(self.section_id().clone()))?;

        match self {
            Revision::ReplaceSection { expected, .. } => {
                if &section.canonical_text() != expected {
                    return Err(RevisionConflict::TextChanged(section.id.clone()));
                }
            }

            Revision::ReplaceRange { locator, expected, .. } => {
                let current = Self::range_text(section, locator)?;
                if current != expected {
                    return Err(RevisionConflict::TextChanged(section.id.clone()));
                }
            }

            Revision::ReplaceFirstMatch { needle, .. } => {
                Self::first_match(section, needle)?;
            }

            Revision::RestoreSection { expected, .. } => {
                if &section.content != expected {
                    return Err(RevisionConflict::TextChanged(section.id.clone()));
                }
            }
        }

        Ok(())
    }

    /// Apply revision to the document with validation
    pub fn apply(&self, doc: &mut Document) -> Result<(), RevisionConflict> {
        self.validate(doc)?;

        let section_id = self.section_id().clone();
        let section = doc
            .section_mut(&section_id)
            .ok_or(RevisionConflict::SectionMissing(section_id))?;

        match self {
            Revision::ReplaceSection { replacement, .. } => {
                Self::apply_replace_section(section, replacement);
                Ok(())
            }

            Revision::ReplaceRange {
                locator,
                replacement,
                ..
            } => Self::apply_replace_range(section, locator, replacement),

            Revision::ReplaceFirstMatch {
                needle,
                replacement,
                ..
            } => Self::apply_first_match(section, needle, replacement),

            Revision::RestoreSection { content, .. } => {
                section.content = content.clone();
                Ok(())
            }
        }
    }

    fn apply_replace_section(section: &mut Section, replacement: &str) {
        let parsed = if section.is_tree() {
            markdown::parse_tree(replacement)
        } else {
            None
        };

        section.content = match parsed {
            Some(subs) => SectionContent::Tree(subs),
            None => SectionContent::Text(replacement.to_string()),
        };
    }

    fn apply_replace_range(section: &mut Section, locator: &Locator, replacement: &str) -> Result<(), RevisionConflict> {
        let section_id = section.id.clone();
        let field = section
            .field_mut(locator.path)
            .ok_or(RevisionConflict::FieldMissing {
                section_id,
                path: locator.path,
            })?;

        field.replace_range(locator.start..locator.end, replacement);
        Ok(())
    }

    fn apply_first_match(section: &mut Section, needle: &str, replacement: &str) -> Result<(), RevisionConflict> {
        let (path, offset) = Self::first_match(section, needle)?;
        let section_id = section.id.clone();
        let field = section
            .field_mut(path)
            .ok_or(RevisionConflict::FieldMissing { section_id, path })?;

        field.replace_range(offset..offset + needle.len(), replacement);
        Ok(())
    }

    fn range_text<'a>(section: &'a Section, locator: &Locator) -> Result<&'a str, RevisionConflict> {
        let field = section.field(locator.path).ok_or(RevisionConflict::FieldMissing {
            section_id: section.id.clone(),
            path: locator.path,
        })?;

        locator.slice(field).ok_or(RevisionConflict::OutOfBounds {
            start: locator.start,
            end: locator.end,
            len: field.len(),
        })
    }

    fn first_match(section: &Section, needle: &str) -> Result<(TextPath, usize), RevisionConflict> {
        if needle.is_empty() {
            return Err(RevisionConflict::HighlightMissing(section.id.clone()));
        }

        section
            .fields()
            .into_iter()
            .find_map(|(path, text)| text.find(needle).map(|offset| (path, offset)))
            .ok_or_else(|| RevisionConflict::HighlightMissing(section.id.clone()))
    }
}

/// Writes accepted proposals into a document
pub struct DocumentMutator;

impl DocumentMutator {
    /// Apply an accepted proposal
    ///
    /// Returns the new document; the input is never touched, so a conflict
    /// leaves no partial write behind.
    pub fn apply(doc: &Document, proposal: &EditProposal) -> Result<Document, RevisionConflict> {
        Self::apply_revision(doc, &Revision::from_proposal(proposal))
    }

    /// Current text at an origin's target
    pub fn read_target(doc: &Document, origin: &EditOrigin) -> Result<String, RevisionConflict> {
        let section = doc
            .section(origin.section_id())
            .ok_or_else(|| RevisionConflict::SectionMissing(origin.section_id().clone()))?;

        match origin {
            EditOrigin::FullSectionRewrite { .. } => Ok(section.canonical_text()),
            EditOrigin::RangeEdit { locator, .. } => {
                Revision::range_text(section, locator).map(str::to_string)
            }
            EditOrigin::HighlightEdit { highlighted_text, .. } => {
                Revision::first_match(section, highlighted_text)?;
                Ok(highlighted_text.clone())
            }
        }
    }

    pub fn apply_revision(doc: &Document, revision: &Revision) -> Result<Document, RevisionConflict> {
        revision.validate(doc)?;

        let mut next = doc.clone();
        revision.apply(&mut next)?;
        next.version += 1;

        Ok(next)
    }
}
