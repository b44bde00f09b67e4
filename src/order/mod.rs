//! Render-ready order data structures

mod chapter;
mod line;
mod section;

pub use chapter::{Chapter, ChapterTree, LineLocation};
pub use line::{Line, LineId};
pub use section::{Section, SectionKey};
