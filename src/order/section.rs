//! Sections: named line groupings within a chapter

use super::line::Line;

/// Compound key addressing a section inside an order's chapter tree.
///
/// Both parts are free-text display names — the wire blob uses them as
/// object keys, so they are the only identity a section has. Whitespace
/// and case variants are distinct keys on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionKey {
    pub chapter: String,
    pub section: String,
}

impl SectionKey {
    pub fn new(chapter: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            chapter: chapter.into(),
            section: section.into(),
        }
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.chapter, self.section)
    }
}

/// A named group of lines within a chapter.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub name: String,
    /// Catalog category scoping product search for this section.
    pub category_id: Option<i64>,
    /// Free-text particular conditions attached to the section.
    pub conditions: Option<String>,
    /// Locked sections reject line mutations client-side; the server
    /// enforces the same rule on its end.
    pub locked: bool,
    pub lines: Vec<Line>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category_id: None,
            conditions: None,
            locked: false,
            lines: Vec::new(),
        }
    }

    /// Sum of the contained line subtotals.
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.subtotal).sum()
    }
}
