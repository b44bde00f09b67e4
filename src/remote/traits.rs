//! Remote contract definitions
//!
//! The order backend and the product catalog are external collaborators.
//! Everything here is transport-agnostic: the coordinator only ever sees
//! these traits, whether the other side is the reference SQLite backend
//! or a live RPC service.

use crate::order::{LineId, SectionKey};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend identifier of a sales order.
pub type OrderId = i64;

/// Errors that can occur during remote operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Line not found: {0}")]
    LineNotFound(LineId),

    #[error("Section not found: {0}")]
    SectionNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(i64),

    /// The backend refused the operation; the message is user-facing.
    #[error("{0}")]
    Rejected(String),
}

/// Result type for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Explicit field values for a line update.
///
/// Updates always re-send every editable field; there is no partial
/// patch — the caller resolves overlay drafts into concrete values first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineUpdate {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
}

/// A saleable catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Internal reference code, when the catalog has one.
    pub code: Option<String>,
    pub list_price: f64,
    pub category_id: Option<i64>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub product_count: usize,
}

/// Filter criteria for product search
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Substring match against the product name
    pub name: Option<String>,
    /// Restrict to one category
    pub category: Option<i64>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_category(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// The authoritative order/line persistence service.
///
/// Implementations must be thread-safe (Send + Sync). Each method is one
/// remote call; retries, backoff and timeouts belong to the transport,
/// not to callers of this trait.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Create one order line under the given chapter/section, snapshotting
    /// the product's current list price. Returns the new line's id.
    async fn add_line(
        &self,
        order: OrderId,
        key: &SectionKey,
        product: i64,
        quantity: f64,
    ) -> RemoteResult<LineId>;

    /// Overwrite a line's editable fields with explicit values.
    async fn update_line(&self, line: LineId, update: &LineUpdate) -> RemoteResult<()>;

    /// Remove a line.
    async fn delete_line(&self, line: LineId) -> RemoteResult<()>;

    /// Replace a section's particular-conditions text.
    async fn update_section_text(
        &self,
        order: OrderId,
        key: &SectionKey,
        text: &str,
    ) -> RemoteResult<()>;

    /// Fetch the order's chapter-grouped blob, freshly computed.
    async fn reload(&self, order: OrderId) -> RemoteResult<String>;
}

/// Product/category lookup used to drive selection flows.
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search_products(&self, query: &ProductQuery) -> RemoteResult<Vec<Product>>;

    /// List categories, optionally filtered by a name substring.
    async fn search_categories(&self, query: Option<&str>) -> RemoteResult<Vec<Category>>;
}
