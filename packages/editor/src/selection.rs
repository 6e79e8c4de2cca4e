//! # Selection Capture
//!
//! Turns whatever the editor surface reports as selected into an
//! addressable [`SelectionContext`], or nothing when the selection cannot be
//! pinned to a single text field.
//!
//! A [`Locator`] addresses one field of one section by byte offsets. It only
//! stays valid until that section is next written.

use redline_common::{Document, SectionId, TextPath};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Byte range within a single text field of a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub path: TextPath,
    pub start: usize,
    pub end: usize,
}

impl Locator {
    pub fn new(path: TextPath, start: usize, end: usize) -> Self {
        Self { path, start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text addressed by this locator, if it still fits the field
    pub fn slice<'a>(&self, field: &'a str) -> Option<&'a str> {
        if self.start > self.end {
            return None;
        }
        field.get(self.start..self.end)
    }
}

/// One end of a selection as reported by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPoint {
    pub path: TextPath,
    pub offset: usize,
}

/// Selection as the editor surface sees it (anchor may follow focus)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSelection {
    pub section_id: SectionId,
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

impl RawSelection {
    /// Selection within one field
    pub fn within(section_id: impl Into<SectionId>, path: TextPath, start: usize, end: usize) -> Self {
        Self {
            section_id: section_id.into(),
            anchor: SelectionPoint { path, offset: start },
            focus: SelectionPoint { path, offset: end },
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionContext {
    pub selected_text: String,
    pub section_id: SectionId,
    pub range: Locator,
    pub surrounding_context: String,
}

/// Read-only capture of the current selection
#[derive(Debug, Clone)]
pub struct SelectionCapture {
    context_budget: usize,
}

impl SelectionCapture {
    pub fn new(context_budget: usize) -> Self {
        Self { context_budget }
    }

    pub fn capture(&self, doc: &Document, raw: &RawSelection) -> Option<SelectionContext> {
        if raw.anchor.path != raw.focus.path {
            debug!(section = %raw.section_id, "Selection crosses fields, no locator");
            return None;
        }

        let section = doc.section(&raw.section_id)?;
        let path = raw.anchor.path;
        let field = section.field(path)?;

        let start = raw.anchor.offset.min(raw.focus.offset);
        let end = raw.anchor.offset.max(raw.focus.offset);
        let locator = Locator::new(path, start, end);

        let selected = locator.slice(field)?;
        if selected.trim().is_empty() {
            return None;
        }

        Some(SelectionContext {
            selected_text: selected.to_string(),
            section_id: raw.section_id.clone(),
            range: locator,
            surrounding_context: self.window(field, start, end),
        })
    }

    /// `before ++ field[start..end] ++ after`, each side at most
    /// `context_budget` characters.
    pub fn window(&self, field: &str, start: usize, end: usize) -> String {
        let before = &field[..start];
        let after = &field[end..];

        let before_start = before
            .char_indices()
            .rev()
            .nth(self.context_budget.saturating_sub(1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let before = if self.context_budget == 0 { "" } else { &before[before_start..] };

        let after_end = after
            .char_indices()
            .nth(self.context_budget)
            .map(|(idx, _)| idx)
            .unwrap_or(after.len());

        format!("{}{}{}", before, &field[start..end], &after[..after_end])
    }
}

/// Editor surface collaborator
pub trait EditorSurface {
    fn selection(&self) -> Option<RawSelection>;

    fn replace_range(&mut self, section_id: &SectionId, locator: &Locator, text: &str);

    fn clear_selection(&mut self);

    /// Selection changes, latest value only
    fn subscribe(&self) -> watch::Receiver<Option<RawSelection>>;
}

/// Remembers the last real selection across focus changes
///
/// Selecting text and then clicking into an instruction box collapses the
/// live selection; the tracker keeps the earlier one until it is released.
pub struct SelectionTracker {
    updates: watch::Receiver<Option<RawSelection>>,
    pinned: Option<RawSelection>,
}

impl SelectionTracker {
    pub fn attach(surface: &dyn EditorSurface) -> Self {
        let updates = surface.subscribe();
        let pinned = updates.borrow().clone().filter(|s| !s.is_collapsed());

        Self { updates, pinned }
    }

    pub fn current(&mut self) -> Option<RawSelection> {
        if self.updates.has_changed().unwrap_or(false) {
            let latest = self.updates.borrow_and_update().clone();
            if let Some(selection) = latest.filter(|s| !s.is_collapsed()) {
                self.pinned = Some(selection);
            }
        }

        self.pinned.clone()
    }

    /// Drop the pin and deselect on the surface after a trigger
    pub fn release(&mut self, surface: &mut dyn EditorSurface) {
        self.pinned = None;
        surface.clear_selection();
        self.updates.borrow_and_update();
    }
}
