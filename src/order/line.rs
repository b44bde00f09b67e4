//! Order line representation

use serde::{Deserialize, Serialize};

/// Round a currency amount to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Backend-assigned identifier for a persisted order line.
///
/// Stable once the line exists on the server; lines are never given
/// client-side ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineId(i64);

impl LineId {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl From<i64> for LineId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted sales-order line.
///
/// `subtotal` is derived — it is recomputed from quantity and unit price
/// whenever the line is rebuilt from authoritative data, so a tree never
/// carries a subtotal that disagrees with its own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub id: LineId,
    /// Description shown to the user (defaults to the product name).
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub subtotal: f64,
}

impl Line {
    /// Build a line, deriving the subtotal from quantity × unit price.
    pub fn new(id: LineId, name: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            id,
            name: name.into(),
            quantity,
            unit_price,
            subtotal: round2(quantity * unit_price),
        }
    }

    /// The subtotal this line's own fields imply.
    pub fn computed_subtotal(&self) -> f64 {
        round2(self.quantity * self.unit_price)
    }
}
