//! Capitula: chapter-grouped sales order editing engine
//!
//! An order's lines are grouped into chapters and sections and serialized
//! by the backend into a single JSON blob. This crate owns the client
//! side of that arrangement: normalizing the blob into a render-ready
//! tree, overlaying unsaved user input on top of it, and coordinating
//! remote mutations so the tree never drifts from the backend's totals.
//!
//! # Core Concepts
//!
//! - **Chapters/Sections/Lines**: the render-ready tree, rebuilt from
//!   scratch on every reload
//! - **Overlay**: transient input shadowing authoritative values until a
//!   write confirms them
//! - **Editor**: one remote call per user action, full reload after every
//!   confirmed mutation
//!
//! # Example
//!
//! ```
//! use capitula::normalize;
//!
//! let tree = normalize::parse(Some(r#"{"Cap A": {"sections": {}}}"#));
//! assert_eq!(tree.chapters.len(), 1);
//! ```

mod order;

pub mod editor;
pub mod normalize;
pub mod overlay;
pub mod remote;
pub mod selection;

pub use editor::{AddOutcome, ChapterEditor, DeleteOutcome, EditorError, EditorResult, FlightKey};
pub use order::{Chapter, ChapterTree, Line, LineId, LineLocation, Section, SectionKey};
pub use overlay::{LineField, OverlayKey, OverlayStore};
pub use remote::{
    CatalogSearch, Category, LineUpdate, OrderBackend, OrderId, Product, ProductQuery,
    RemoteError, RemoteResult, SqliteBackend,
};
pub use selection::{
    AlwaysConfirm, ConfirmationFlow, FirstMatch, FixedPick, NeverConfirm, NoPick, ProductPick,
    ProductScope, SelectionStrategy,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
