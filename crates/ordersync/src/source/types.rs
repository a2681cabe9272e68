use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::Result;

/// Opaque resume pointer into an order source's pagination sequence.
///
/// Only the source that produced a cursor knows how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A line item as the store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLineItem {
    pub id: u64,
    pub product_id: u64,
    #[serde(default)]
    pub variation_id: Option<u64>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: String,
    pub quantity: i64,
    /// Line subtotal before discounts, as a decimal string.
    pub subtotal: String,
    /// Line total after discounts, as a decimal string.
    pub total: String,
    /// Line item meta, keyed by meta key.
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

/// An order as the store reports it (source-agnostic representation).
///
/// Money amounts are kept as the decimal strings the store returns so that
/// parsing failures surface in the transformer, not in the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOrder {
    pub id: u64,
    #[serde(default)]
    pub number: String,
    pub status: String,
    pub currency: String,
    #[serde(default)]
    pub customer_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
    /// Order subtotal; derived from line items when the store omits it.
    #[serde(default)]
    pub subtotal: Option<String>,
    pub total: String,
    #[serde(default)]
    pub total_tax: String,
    #[serde(default)]
    pub shipping_total: String,
    #[serde(default)]
    pub discount_total: String,
    /// Sum of refunds as a positive decimal string.
    #[serde(default)]
    pub refund_total: String,
    #[serde(default)]
    pub line_items: Vec<RawLineItem>,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
}

/// One page of orders plus the cursor of the following page.
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    pub orders: Vec<RawOrder>,
    /// `None` when this is the last page.
    pub next_cursor: Option<Cursor>,
}

impl OrderPage {
    #[inline]
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none() || self.orders.is_empty()
    }
}

/// Paged access to a store's order history.
///
/// Implementations must return orders in a stable order (e.g. ascending id)
/// so that a cursor taken after page N always yields page N + 1, even across
/// process restarts.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Fetch the page that starts at `cursor` (`None` for the first page).
    async fn list_orders(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<OrderPage>;

    /// Estimate the total number of orders.
    async fn count_orders(&self) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_serializes_transparently() {
        let cursor = Cursor::new("42");
        assert_eq!(serde_json::to_string(&cursor).unwrap(), "\"42\"");
        assert_eq!(cursor.to_string(), "42");
        assert_eq!(cursor.into_inner(), "42");
    }

    #[test]
    fn page_is_last_without_cursor_or_orders() {
        let page = OrderPage::default();
        assert!(page.is_last());

        let page = OrderPage {
            orders: Vec::new(),
            next_cursor: Some(Cursor::new("2")),
        };
        assert!(page.is_last());
    }

    #[test]
    fn raw_order_deserializes_with_defaults() {
        let order: RawOrder = serde_json::from_value(serde_json::json!({
            "id": 7,
            "status": "completed",
            "currency": "EUR",
            "total": "10.00"
        }))
        .unwrap();
        assert_eq!(order.id, 7);
        assert!(order.line_items.is_empty());
        assert!(order.subtotal.is_none());
        assert_eq!(order.refund_total, "");
    }
}
