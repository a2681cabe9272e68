use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::Cursor;

use super::money::Money;

/// Statuses that never leave the store.
pub const DEFAULT_EXCLUDED_STATUSES: &[&str] = &["draft", "auto-draft", "checkout-draft", "trash"];

/// Line item meta key holding the unit cost of goods.
pub const DEFAULT_COGS_META_KEY: &str = "_wc_cog_cost";

/// Transformation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    /// Line item meta key holding a unit cost; `None` disables the lookup.
    pub cogs_meta_key: Option<String>,
    /// Fallback cost as a percentage of the line subtotal.
    pub cogs_default_percentage: Option<f64>,
    pub excluded_statuses: Vec<String>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            cogs_meta_key: Some(DEFAULT_COGS_META_KEY.to_string()),
            cogs_default_percentage: None,
            excluded_statuses: DEFAULT_EXCLUDED_STATUSES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        }
    }
}

/// Where a line item's cost of goods came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CogsSource {
    Meta,
    DefaultPercentage,
    None,
}

/// A normalized line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemEvent {
    pub line_item_id: u64,
    pub product_id: u64,
    pub variation_id: Option<u64>,
    pub sku: Option<String>,
    pub name: String,
    pub quantity: u64,
    pub subtotal: Money,
    pub total: Money,
    pub cogs: Money,
    pub cogs_source: CogsSource,
}

/// A normalized order, the unit the ingestion endpoint receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: u64,
    pub order_number: String,
    pub status: String,
    pub currency: String,
    pub customer_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub shipping_total: Money,
    pub tax_total: Money,
    pub refund_total: Money,
    pub total: Money,
    pub net_total: Money,
    pub cogs_total: Money,
    pub line_items: Vec<LineItemEvent>,
}

/// Events of one page, at most `batch_size` long, sent in one request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBatch {
    /// Cursor the page was fetched with (`None` for the first page).
    pub start_cursor: Option<Cursor>,
    /// Position of this batch within its page.
    pub index: usize,
    pub events: Vec<OrderEvent>,
}

impl OrderBatch {
    /// Split a page's events into batches of at most `batch_size`.
    pub fn split(
        start_cursor: Option<&Cursor>,
        events: Vec<OrderEvent>,
        batch_size: usize,
    ) -> Vec<OrderBatch> {
        let batch_size = batch_size.max(1);
        let mut batches = Vec::with_capacity(events.len().div_ceil(batch_size));
        let mut events = events.into_iter().peekable();
        let mut index = 0;

        while events.peek().is_some() {
            batches.push(OrderBatch {
                start_cursor: start_cursor.cloned(),
                index,
                events: events.by_ref().take(batch_size).collect(),
            });
            index += 1;
        }

        batches
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
