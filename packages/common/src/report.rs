//! # Report Document Model
//!
//! A report is an ordered list of titled sections. A section holds either
//! flat rich text or a tree of subsections, each with a description and a
//! list of point items that may carry image references.
//!
//! Every editable piece of text in a section is addressed by a [`TextPath`].
//! Offsets handed out by the editing engine are byte offsets into the text
//! at one path, never into the section as a whole.

use crate::error::CommonError;
use crate::markdown;
use crate::result::CommonResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable section identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Reference to an uploaded image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub id: String,

    #[serde(default)]
    pub caption: String,
}

/// Single bullet point inside a subsection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointItem {
    pub point: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageRef>,
}

impl PointItem {
    pub fn new(point: impl Into<String>) -> Self {
        Self {
            point: point.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, id: impl Into<String>, caption: impl Into<String>) -> Self {
        self.images.push(ImageRef {
            id: id.into(),
            caption: caption.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubSection {
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub children: Vec<PointItem>,
}

impl SubSection {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            children: Vec::new(),
        }
    }

    pub fn with_point(mut self, point: PointItem) -> Self {
        self.children.push(point);
        self
    }
}

/// Section body: flat text or a nested subsection tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum SectionContent {
    Text(String),
    Tree(Vec<SubSection>),
}

/// Address of one editable text field within a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "camelCase")]
pub enum TextPath {
    /// The whole body of a flat-text section
    Body,

    /// Description of the `sub`-th subsection
    Description { sub: usize },

    /// The `point`-th point of the `sub`-th subsection
    Point { sub: usize, point: usize },
}

impl fmt::Display for TextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextPath::Body => write!(f, "body"),
            TextPath::Description { sub } => write!(f, "desc:{}", sub),
            TextPath::Point { sub, point } => write!(f, "point:{}:{}", sub, point),
        }
    }
}

impl std::str::FromStr for TextPath {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let index = |raw: &str| {
            raw.parse::<usize>()
                .map_err(|_| CommonError::Generic(format!("Invalid index in text path: {}", s)))
        };

        match parts.as_slice() {
            ["body"] => Ok(TextPath::Body),
            ["desc", sub] => Ok(TextPath::Description { sub: index(sub)? }),
            ["point", sub, point] => Ok(TextPath::Point {
                sub: index(sub)?,
                point: index(point)?,
            }),
            _ => Err(CommonError::Generic(format!("Invalid text path: {}", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    pub content: SectionContent,
}

impl Section {
    pub fn text(id: impl Into<SectionId>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: SectionContent::Text(body.into()),
        }
    }

    pub fn tree(id: impl Into<SectionId>, title: impl Into<String>, subs: Vec<SubSection>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: SectionContent::Tree(subs),
        }
    }

    /// Canonical text of the whole section (trees are rendered to markdown)
    pub fn canonical_text(&self) -> String {
        match &self.content {
            SectionContent::Text(text) => text.clone(),
            SectionContent::Tree(subs) => markdown::render_tree(subs),
        }
    }

    /// Text stored at `path`, if the path exists in this section
    pub fn field(&self, path: TextPath) -> Option<&str> {
        match (&self.content, path) {
            (SectionContent::Text(text), TextPath::Body) => Some(text),
            (SectionContent::Tree(subs), TextPath::Description { sub }) => {
                subs.get(sub).map(|s| s.description.as_str())
            }
            (SectionContent::Tree(subs), TextPath::Point { sub, point }) => subs
                .get(sub)
                .and_then(|s| s.children.get(point))
                .map(|p| p.point.as_str()),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, path: TextPath) -> Option<&mut String> {
        match (&mut self.content, path) {
            (SectionContent::Text(text), TextPath::Body) => Some(text),
            (SectionContent::Tree(subs), TextPath::Description { sub }) => {
                subs.get_mut(sub).map(|s| &mut s.description)
            }
            (SectionContent::Tree(subs), TextPath::Point { sub, point }) => subs
                .get_mut(sub)
                .and_then(|s| s.children.get_mut(point))
                .map(|p| &mut p.point),
            _ => None,
        }
    }

    /// All editable fields in canonical order
    pub fn fields(&self) -> Vec<(TextPath, &str)> {
        match &self.content {
            SectionContent::Text(text) => vec![(TextPath::Body, text.as_str())],
            SectionContent::Tree(subs) => {
                let mut fields = Vec::new();
                for (sub, subsection) in subs.iter().enumerate() {
                    fields.push((TextPath::Description { sub }, subsection.description.as_str()));
                    for (point, item) in subsection.children.iter().enumerate() {
                        fields.push((TextPath::Point { sub, point }, item.point.as_str()));
                    }
                }
                fields
            }
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self.content, SectionContent::Tree(_))
    }
}

/// Report document
///
/// `version` increments on every successful write and is what the
/// host compares against when it schedules persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,

    pub sections: Vec<Section>,

    #[serde(default)]
    pub version: u64,
}

impl Document {
    pub fn new(title: impl Into<String>, sections: Vec<Section>) -> Self {
        Self {
            title: title.into(),
            sections,
            version: 0,
        }
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| &s.id == id)
    }

    pub fn section_mut(&mut self, id: &SectionId) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| &s.id == id)
    }

    pub fn require_section(&self, id: &SectionId) -> CommonResult<&Section> {
        self.section(id)
            .ok_or_else(|| CommonError::SectionNotFound(id.clone()))
    }

    /// Load a document from a JSON file
    pub fn load(path: &Path) -> CommonResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&source)?)
    }

    /// Write the document as pretty-printed JSON
    pub fn save(&self, path: &Path) -> CommonResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
