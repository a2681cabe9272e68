use crate::source::RawOrder;

use super::errors::TransformError;
use super::order::transform_order;
use super::types::{OrderEvent, TransformConfig};

/// Result of transforming one page of orders.
#[derive(Debug, Default)]
pub struct PageTransform {
    /// Events in source order.
    pub events: Vec<OrderEvent>,
    /// Orders dropped because of their status.
    pub excluded: u64,
    /// Orders that failed to transform.
    pub skipped: Vec<TransformError>,
}

/// Applies [`transform_order`] to whole pages.
#[derive(Debug, Clone, Default)]
pub struct BatchTransformer {
    config: TransformConfig,
}

impl BatchTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Transform a page. Failing orders are logged and reported in
    /// `skipped`; they never fail the page.
    pub fn transform_page(&self, orders: &[RawOrder]) -> PageTransform {
        let mut page = PageTransform {
            events: Vec::with_capacity(orders.len()),
            ..PageTransform::default()
        };

        for order in orders {
            match transform_order(order, &self.config) {
                Ok(Some(event)) => page.events.push(event),
                Ok(None) => {
                    tracing::trace!(order_id = order.id, status = %order.status, "Excluded order");
                    page.excluded += 1;
                }
                Err(e) => {
                    tracing::warn!(order_id = order.id, error = %e, "Skipping order that failed to transform");
                    page.skipped.push(e);
                }
            }
        }

        page
    }
}
