//! Sync coordination for chapter-grouped order editing

mod coordinator;
mod flight;

pub use coordinator::{AddOutcome, ChapterEditor, DeleteOutcome, EditorError, EditorResult};
pub use flight::{FlightGuard, FlightKey, FlightPermit};
