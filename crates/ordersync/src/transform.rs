//! Order normalization.
//!
//! Raw store orders become [`OrderEvent`]s: money parsed into cents, line
//! item cost of goods resolved, net totals derived. Orders in excluded
//! statuses are dropped and orders that cannot be parsed are reported so
//! the caller can count them as skipped.

mod batch;
mod errors;
mod money;
mod order;
mod types;

pub use batch::{BatchTransformer, PageTransform};
pub use errors::TransformError;
pub use money::Money;
pub use order::transform_order;
pub use types::{
    CogsSource, DEFAULT_COGS_META_KEY, DEFAULT_EXCLUDED_STATUSES, LineItemEvent, OrderBatch,
    OrderEvent, TransformConfig,
};
