use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::errors::{Result, SourceError};
use super::types::{Cursor, OrderPage, OrderSource, RawOrder};

/// In-memory order source ordered by ascending order id.
///
/// The cursor is the id of the last order of the previous page, so inserting
/// orders with higher ids mid-run extends the walk without shifting pages.
/// Failures can be queued to exercise retry paths.
#[derive(Default)]
pub struct MemoryOrderSource {
    orders: Vec<RawOrder>,
    failures: Mutex<VecDeque<SourceError>>,
    list_calls: AtomicUsize,
    count_calls: AtomicUsize,
}

impl MemoryOrderSource {
    pub fn new(mut orders: Vec<RawOrder>) -> Self {
        orders.sort_by_key(|o| o.id);
        Self {
            orders,
            ..Self::default()
        }
    }

    /// Make the next call to either operation fail with `error`.
    pub fn push_failure(&self, error: SourceError) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(error);
    }

    /// Number of `list_orders` calls, failed ones included.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of `count_orders` calls, failed ones included.
    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<SourceError> {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl OrderSource for MemoryOrderSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_orders(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<OrderPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let after = match cursor {
            Some(c) => Some(c.as_str().parse::<u64>().map_err(|_| {
                SourceError::InvalidCursor {
                    cursor: c.to_string(),
                }
            })?),
            None => None,
        };

        let start = match after {
            Some(id) => self.orders.partition_point(|o| o.id <= id),
            None => 0,
        };
        let end = (start + page_size.max(1) as usize).min(self.orders.len());
        let orders = self.orders[start..end].to_vec();

        let next_cursor = if end < self.orders.len() {
            orders.last().map(|o| Cursor::new(o.id.to_string()))
        } else {
            None
        };

        Ok(OrderPage {
            orders,
            next_cursor,
        })
    }

    async fn count_orders(&self) -> Result<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(self.orders.len() as u64)
    }
}
