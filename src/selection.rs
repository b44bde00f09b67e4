//! Selection and confirmation capabilities
//!
//! The coordinator never presents UI. Picking a product and confirming a
//! delete are capabilities injected at construction time; a frontend
//! wires its dialogs in here, tests wire in deterministic strategies.
//! Returning `None` from a pick means the user cancelled — no remote
//! call was made, so there is nothing to roll back.

use crate::order::SectionKey;
use crate::remote::{CatalogSearch, ProductQuery, RemoteResult};
use async_trait::async_trait;
use std::sync::Arc;

/// Where a product is being added, and the catalog scope that applies.
#[derive(Debug, Clone)]
pub struct ProductScope {
    pub key: SectionKey,
    /// The target section's category filter, when it has one.
    pub category: Option<i64>,
}

/// The outcome of a completed selection flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductPick {
    pub id: i64,
    pub name: String,
}

/// How a product gets chosen for "add to section".
///
/// Frontends have shipped several generations of this flow (inline
/// dialogs, native prompts, nested category pickers); all of them reduce
/// to this seam.
#[async_trait]
pub trait SelectionStrategy: Send + Sync {
    /// Resolve to the chosen product, or `None` on cancel.
    async fn pick_product(&self, scope: &ProductScope) -> RemoteResult<Option<ProductPick>>;
}

/// User confirmation before destructive operations.
#[async_trait]
pub trait ConfirmationFlow: Send + Sync {
    async fn confirm_delete(&self, line_name: &str) -> bool;
}

/// Always picks the same product. Test-harness and scripted use.
#[derive(Debug, Clone)]
pub struct FixedPick {
    pick: ProductPick,
}

impl FixedPick {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            pick: ProductPick {
                id,
                name: name.into(),
            },
        }
    }
}

#[async_trait]
impl SelectionStrategy for FixedPick {
    async fn pick_product(&self, _scope: &ProductScope) -> RemoteResult<Option<ProductPick>> {
        Ok(Some(self.pick.clone()))
    }
}

/// Always cancels.
#[derive(Debug, Clone, Default)]
pub struct NoPick;

#[async_trait]
impl SelectionStrategy for NoPick {
    async fn pick_product(&self, _scope: &ProductScope) -> RemoteResult<Option<ProductPick>> {
        Ok(None)
    }
}

/// Searches the catalog within the section's category scope and takes the
/// first hit. The CLI's strategy; cancels when nothing matches.
pub struct FirstMatch {
    catalog: Arc<dyn CatalogSearch>,
    query: Option<String>,
}

impl FirstMatch {
    pub fn new(catalog: Arc<dyn CatalogSearch>) -> Self {
        Self {
            catalog,
            query: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[async_trait]
impl SelectionStrategy for FirstMatch {
    async fn pick_product(&self, scope: &ProductScope) -> RemoteResult<Option<ProductPick>> {
        let mut query = ProductQuery::new().with_limit(1);
        if let Some(name) = &self.query {
            query = query.with_name(name.clone());
        }
        if let Some(category) = scope.category {
            query = query.with_category(category);
        }

        let products = self.catalog.search_products(&query).await?;
        Ok(products.into_iter().next().map(|p| ProductPick {
            id: p.id,
            name: p.name,
        }))
    }
}

/// Confirms every delete. Non-interactive frontends and tests.
#[derive(Debug, Clone, Default)]
pub struct AlwaysConfirm;

#[async_trait]
impl ConfirmationFlow for AlwaysConfirm {
    async fn confirm_delete(&self, _line_name: &str) -> bool {
        true
    }
}

/// Declines every delete.
#[derive(Debug, Clone, Default)]
pub struct NeverConfirm;

#[async_trait]
impl ConfirmationFlow for NeverConfirm {
    async fn confirm_delete(&self, _line_name: &str) -> bool {
        false
    }
}
