//! Chapters and the render-ready chapter tree

use super::line::{Line, LineId};
use super::section::{Section, SectionKey};

/// Top-level named grouping of sections.
///
/// Chapters are derived, not persisted: they exist only inside the
/// serialized blob and are rebuilt from scratch on every normalization
/// pass. `total` is the backend-computed figure when the blob supplied
/// one, otherwise the sum of contained line subtotals.
#[derive(Debug, Clone, PartialEq)]
pub struct Chapter {
    pub name: String,
    pub sections: Vec<Section>,
    pub total: f64,
}

impl Chapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::new(),
            total: 0.0,
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Sum of all contained line subtotals, regardless of what the blob
    /// reported as the chapter total.
    pub fn computed_total(&self) -> f64 {
        self.sections.iter().map(|s| s.total()).sum()
    }
}

/// A line located within the tree, with its enclosing chapter and section.
#[derive(Debug, Clone, Copy)]
pub struct LineLocation<'a> {
    pub chapter: &'a Chapter,
    pub section: &'a Section,
    pub line: &'a Line,
}

impl LineLocation<'_> {
    pub fn key(&self) -> SectionKey {
        SectionKey::new(self.chapter.name.clone(), self.section.name.clone())
    }
}

/// The render-ready tree: chapters in display order.
///
/// Rebuilt wholesale from the blob on every reload; nothing in here has
/// in-memory identity across rebuilds beyond the line ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChapterTree {
    pub chapters: Vec<Chapter>,
}

impl ChapterTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn chapter(&self, name: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.name == name)
    }

    pub fn section(&self, key: &SectionKey) -> Option<&Section> {
        self.chapter(&key.chapter)?.section(&key.section)
    }

    /// Locate a line anywhere in the tree.
    pub fn find_line(&self, id: LineId) -> Option<LineLocation<'_>> {
        for chapter in &self.chapters {
            for section in &chapter.sections {
                if let Some(line) = section.lines.iter().find(|l| l.id == id) {
                    return Some(LineLocation {
                        chapter,
                        section,
                        line,
                    });
                }
            }
        }
        None
    }

    pub fn line_count(&self) -> usize {
        self.chapters
            .iter()
            .flat_map(|c| &c.sections)
            .map(|s| s.lines.len())
            .sum()
    }

    /// Sum of chapter totals.
    pub fn total(&self) -> f64 {
        self.chapters.iter().map(|c| c.total).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ChapterTree {
        let mut section = Section::new("Sec 1");
        section.lines.push(Line::new(LineId::new(10), "Widget", 2.0, 5.0));
        let mut other = Section::new("Sec 2");
        other.lines.push(Line::new(LineId::new(11), "Bolt", 4.0, 0.5));
        let mut chapter = Chapter::new("Cap A");
        chapter.sections.push(section);
        chapter.sections.push(other);
        chapter.total = chapter.computed_total();
        ChapterTree {
            chapters: vec![chapter],
        }
    }

    #[test]
    fn section_lookup_by_compound_key() {
        let tree = sample_tree();
        assert!(tree.section(&SectionKey::new("Cap A", "Sec 1")).is_some());
        assert!(tree.section(&SectionKey::new("Cap A", "Sec 9")).is_none());
        assert!(tree.section(&SectionKey::new("Cap B", "Sec 1")).is_none());
    }

    #[test]
    fn find_line_reports_enclosing_names() {
        let tree = sample_tree();
        let found = tree.find_line(LineId::new(11)).unwrap();
        assert_eq!(found.chapter.name, "Cap A");
        assert_eq!(found.section.name, "Sec 2");
        assert_eq!(found.key(), SectionKey::new("Cap A", "Sec 2"));
        assert!(tree.find_line(LineId::new(99)).is_none());
    }

    #[test]
    fn totals_roll_up_from_lines() {
        let tree = sample_tree();
        assert_eq!(tree.line_count(), 2);
        assert_eq!(tree.total(), 12.0);
        assert_eq!(tree.chapters[0].computed_total(), 12.0);
    }
}
