//! Common test utilities for editor integration tests

use async_trait::async_trait;
use capitula::{LineId, LineUpdate, OrderBackend, OrderId, RemoteResult, SectionKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// One chapter, one section, one line — the smallest editable order.
pub const SMALL_BLOB: &str = r#"{"Cap A": {"sections": {"Sec 1": {"lines":
    [{"id": 10, "name": "Widget", "quantity": 2, "price_unit": 5}]}}, "total": 10}}"#;

/// Backend whose `update_line` blocks until released, so a test can hold
/// an operation in flight and observe what happens to a second one.
pub struct GatedBackend {
    blob: String,
    pub update_calls: AtomicUsize,
    /// Signalled when `update_line` has been entered.
    pub entered: Notify,
    /// Lets the gated `update_line` finish.
    pub release: Notify,
}

impl GatedBackend {
    pub fn new(blob: &str) -> Self {
        Self {
            blob: blob.to_string(),
            update_calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl OrderBackend for GatedBackend {
    async fn add_line(
        &self,
        _order: OrderId,
        _key: &SectionKey,
        _product: i64,
        _quantity: f64,
    ) -> RemoteResult<LineId> {
        Ok(LineId::new(0))
    }

    async fn update_line(&self, _line: LineId, _update: &LineUpdate) -> RemoteResult<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn delete_line(&self, _line: LineId) -> RemoteResult<()> {
        Ok(())
    }

    async fn update_section_text(
        &self,
        _order: OrderId,
        _key: &SectionKey,
        _text: &str,
    ) -> RemoteResult<()> {
        Ok(())
    }

    async fn reload(&self, _order: OrderId) -> RemoteResult<String> {
        Ok(self.blob.clone())
    }
}
