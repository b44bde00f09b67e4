//! ChapterEditor: the sync coordinator
//!
//! One editor per open order. It owns the current render-ready tree and
//! the overlay of unsaved input, and issues exactly one remote call per
//! mutating user action. Every confirmed line mutation is followed by a
//! full reload and re-normalize — the backend is the sole authority for
//! computed totals, so partial client-side patching is never attempted.

use super::flight::{FlightGuard, FlightKey};
use crate::normalize;
use crate::order::{ChapterTree, Line, LineId, SectionKey};
use crate::overlay::{LineField, OverlayKey, OverlayStore};
use crate::remote::{LineUpdate, OrderBackend, OrderId, RemoteError};
use crate::selection::{
    AlwaysConfirm, ConfirmationFlow, NoPick, ProductScope, SelectionStrategy,
};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Quantity given to a freshly added line.
const DEFAULT_QUANTITY: f64 = 1.0;

/// Errors surfaced to the frontend from editor operations
#[derive(Debug, Error)]
pub enum EditorError {
    /// Client-side rejection; raised before any remote call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced line/chapter/section is gone from the current tree.
    #[error("not found: {0}")]
    NotFound(String),

    /// A call for the same logical target is still outstanding.
    #[error("operation already in flight for {0}")]
    Busy(FlightKey),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Result type for editor operations
pub type EditorResult<T> = Result<T, EditorError>;

/// Outcome of an add-product flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(LineId),
    /// The user dismissed the selection flow; nothing was sent.
    Cancelled,
}

/// Outcome of a delete flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The user declined the confirmation; nothing was sent.
    Cancelled,
}

/// The editing coordinator for one order.
pub struct ChapterEditor {
    order: OrderId,
    backend: Arc<dyn OrderBackend>,
    selection: Arc<dyn SelectionStrategy>,
    confirmation: Arc<dyn ConfirmationFlow>,
    overlay: OverlayStore,
    tree: RwLock<ChapterTree>,
    flight: FlightGuard,
}

impl ChapterEditor {
    /// Create an editor with deterministic default capabilities
    /// (selection always cancels, deletes are always confirmed).
    pub fn new(order: OrderId, backend: Arc<dyn OrderBackend>) -> Self {
        Self {
            order,
            backend,
            selection: Arc::new(NoPick),
            confirmation: Arc::new(AlwaysConfirm),
            overlay: OverlayStore::new(),
            tree: RwLock::new(ChapterTree::new()),
            flight: FlightGuard::new(),
        }
    }

    pub fn with_selection(mut self, selection: Arc<dyn SelectionStrategy>) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn ConfirmationFlow>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn order(&self) -> OrderId {
        self.order
    }

    /// Snapshot of the current render-ready tree.
    pub fn tree(&self) -> ChapterTree {
        self.tree.read().unwrap().clone()
    }

    /// The overlay of unsaved input. Test harnesses inspect state through
    /// this accessor; nothing is ever exposed process-globally.
    pub fn overlay(&self) -> &OverlayStore {
        &self.overlay
    }

    /// Explicit full refresh: drops the entire overlay (including cached
    /// section conditions) and reconciles against the backend.
    pub async fn refresh(&self) -> EditorResult<()> {
        self.overlay.clear_all();
        self.reconcile().await
    }

    /// Re-fetch the blob and rebuild the tree from scratch.
    async fn reconcile(&self) -> EditorResult<()> {
        let raw = self.backend.reload(self.order).await?;
        let tree = normalize::parse(Some(&raw));
        debug!(
            order = self.order,
            chapters = tree.chapters.len(),
            lines = tree.line_count(),
            "reconciled order tree"
        );
        *self.tree.write().unwrap() = tree;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Add product
    // ------------------------------------------------------------------

    /// Run the selection flow for a section and add the picked product
    /// with quantity 1. Cancelling the selection resolves to a no-op.
    pub async fn add_line(&self, key: &SectionKey) -> EditorResult<AddOutcome> {
        let scope = {
            let tree = self.tree.read().unwrap();
            let section = tree
                .section(key)
                .ok_or_else(|| EditorError::NotFound(format!("section {}", key)))?;
            if section.locked {
                return Err(EditorError::Validation(format!(
                    "section {} is locked",
                    key
                )));
            }
            ProductScope {
                key: key.clone(),
                category: section.category_id,
            }
        };

        let _permit = self
            .flight
            .try_begin(FlightKey::SectionAdd(key.clone()))
            .ok_or_else(|| EditorError::Busy(FlightKey::SectionAdd(key.clone())))?;

        let pick = match self.selection.pick_product(&scope).await? {
            Some(pick) => pick,
            None => return Ok(AddOutcome::Cancelled),
        };

        debug!(order = self.order, section = %key, product = pick.id, "adding product");
        let line = self
            .backend
            .add_line(self.order, key, pick.id, DEFAULT_QUANTITY)
            .await?;

        self.reconcile().await?;
        Ok(AddOutcome::Added(line))
    }

    // ------------------------------------------------------------------
    // Inline edit
    // ------------------------------------------------------------------

    /// Seed the field overlays from the line's authoritative values so
    /// the frontend can start an inline edit.
    pub fn start_edit(&self, id: LineId) -> EditorResult<()> {
        let tree = self.tree.read().unwrap();
        let located = tree
            .find_line(id)
            .ok_or_else(|| EditorError::NotFound(format!("line {}", id)))?;

        self.overlay
            .set(OverlayKey::Field(id, LineField::Name), located.line.name.clone());
        self.overlay.set(
            OverlayKey::Field(id, LineField::Quantity),
            located.line.quantity.to_string(),
        );
        self.overlay.set(
            OverlayKey::Field(id, LineField::UnitPrice),
            located.line.unit_price.to_string(),
        );
        Ok(())
    }

    /// Stage one field of an in-progress edit. Raw input text; parsing
    /// and validation happen at save time.
    pub fn stage_field(&self, id: LineId, field: LineField, text: impl Into<String>) {
        self.overlay.set(OverlayKey::Field(id, field), text);
    }

    /// Discard an in-progress edit.
    pub fn cancel_edit(&self, id: LineId) {
        self.overlay.clear_line(id);
    }

    /// The line as the frontend should render it: authoritative values
    /// with parseable overlay drafts applied on top.
    pub fn merged_line(&self, id: LineId) -> Option<Line> {
        let tree = self.tree.read().unwrap();
        let mut line = tree.find_line(id)?.line.clone();

        if let Some(name) = self.overlay.get(&OverlayKey::Field(id, LineField::Name)) {
            line.name = name;
        }
        if let Some(qty) = self
            .overlay
            .get(&OverlayKey::Field(id, LineField::Quantity))
            .and_then(|t| parse_amount(&t))
        {
            line.quantity = qty;
        }
        if let Some(price) = self
            .overlay
            .get(&OverlayKey::Field(id, LineField::UnitPrice))
            .and_then(|t| parse_amount(&t))
        {
            line.unit_price = price;
        }
        line.subtotal = line.computed_subtotal();
        Some(line)
    }

    /// Persist the staged edit for a line.
    ///
    /// Sends explicit values for every editable field: staged drafts
    /// where present, the authoritative values otherwise. On failure the
    /// drafts are retained so the user's input is not lost.
    pub async fn edit_line(&self, id: LineId) -> EditorResult<()> {
        let authoritative = {
            let tree = self.tree.read().unwrap();
            let located = tree
                .find_line(id)
                .ok_or_else(|| EditorError::NotFound(format!("line {}", id)))?;
            if located.section.locked {
                return Err(EditorError::Validation(format!(
                    "section {} is locked",
                    located.key()
                )));
            }
            located.line.clone()
        };

        let _permit = self
            .flight
            .try_begin(FlightKey::Line(id))
            .ok_or(EditorError::Busy(FlightKey::Line(id)))?;

        let update = LineUpdate {
            name: self
                .overlay
                .get(&OverlayKey::Field(id, LineField::Name))
                .unwrap_or(authoritative.name),
            quantity: self.staged_amount(id, LineField::Quantity, authoritative.quantity)?,
            unit_price: self.staged_amount(id, LineField::UnitPrice, authoritative.unit_price)?,
        };

        self.backend.update_line(id, &update).await?;

        self.overlay.clear_line(id);
        self.reconcile().await
    }

    /// Resolve a staged numeric draft, validating it before any remote
    /// call is attempted.
    fn staged_amount(&self, id: LineId, field: LineField, fallback: f64) -> EditorResult<f64> {
        let text = match self.overlay.get(&OverlayKey::Field(id, field)) {
            Some(text) => text,
            None => return Ok(fallback),
        };

        let label = match field {
            LineField::Quantity => "quantity",
            LineField::UnitPrice => "unit price",
            LineField::Name => "name",
        };
        let value = parse_amount(&text).ok_or_else(|| {
            EditorError::Validation(format!("{} must be a valid number", label))
        })?;
        if value < 0.0 {
            return Err(EditorError::Validation(format!(
                "{} must be zero or greater",
                label
            )));
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a line after running the confirmation flow. The tree is
    /// not touched locally; the row disappears with the reload that
    /// follows the confirmed remote delete.
    pub async fn delete_line(&self, id: LineId) -> EditorResult<DeleteOutcome> {
        let name = {
            let tree = self.tree.read().unwrap();
            let located = tree
                .find_line(id)
                .ok_or_else(|| EditorError::NotFound(format!("line {}", id)))?;
            if located.section.locked {
                return Err(EditorError::Validation(format!(
                    "section {} is locked",
                    located.key()
                )));
            }
            located.line.name.clone()
        };

        let _permit = self
            .flight
            .try_begin(FlightKey::Line(id))
            .ok_or(EditorError::Busy(FlightKey::Line(id)))?;

        if !self.confirmation.confirm_delete(&name).await {
            return Ok(DeleteOutcome::Cancelled);
        }

        debug!(order = self.order, line = %id, "deleting line");
        self.backend.delete_line(id).await?;

        self.overlay.clear_line(id);
        self.reconcile().await?;
        Ok(DeleteOutcome::Deleted)
    }

    // ------------------------------------------------------------------
    // Section conditions
    // ------------------------------------------------------------------

    /// Read a section's particular conditions: the pending draft when one
    /// exists, else the authoritative text (seeding the overlay cache so
    /// repeated reads stay stable across tree rebuilds).
    pub fn conditions(&self, key: &SectionKey) -> String {
        let authoritative = {
            let tree = self.tree.read().unwrap();
            match tree.section(key) {
                Some(section) => section.conditions.clone().unwrap_or_default(),
                // Unknown section: report any pending draft but do not
                // seed a cache entry for a key the tree doesn't have.
                None => {
                    return self
                        .overlay
                        .get(&OverlayKey::Conditions(key.clone()))
                        .unwrap_or_default()
                }
            }
        };
        self.overlay
            .get_or_seed(OverlayKey::Conditions(key.clone()), &authoritative)
    }

    /// Save a section's particular conditions.
    ///
    /// The overlay entry is written first and retained whatever the
    /// remote outcome: on failure it preserves the user's input, on
    /// success it serves as the authoritative cache until the next full
    /// refresh.
    pub async fn set_conditions(&self, key: &SectionKey, text: impl Into<String>) -> EditorResult<()> {
        {
            let tree = self.tree.read().unwrap();
            if tree.section(key).is_none() {
                return Err(EditorError::NotFound(format!("section {}", key)));
            }
        }

        let text = text.into();
        self.overlay
            .set(OverlayKey::Conditions(key.clone()), text.clone());

        self.backend
            .update_section_text(self.order, key, &text)
            .await?;
        Ok(())
    }
}

/// Parse a user-entered amount. Rejects non-finite values — "inf" in a
/// quantity box is as wrong as "abc".
fn parse_amount(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
