//! Order source port: paged, cursor-addressed access to a store's order history.
//!
//! The orchestrator only ever sees [`OrderSource`]. Two implementations ship
//! with the crate:
//!
//! - [`MemoryOrderSource`] - a fixed list of orders, ordered by id
//! - [`WooCommerceOrderSource`] - the WooCommerce REST API (`http` feature)
//!
//! # Example
//!
//! ```ignore
//! use ordersync::source::{OrderSource, MemoryOrderSource};
//!
//! let source = MemoryOrderSource::new(orders);
//! let mut cursor = None;
//! loop {
//!     let page = source.list_orders(cursor.as_ref(), 20).await?;
//!     println!("{} orders", page.orders.len());
//!     match page.next_cursor {
//!         Some(next) => cursor = Some(next),
//!         None => break,
//!     }
//! }
//! ```

mod errors;
mod memory;
mod types;
#[cfg(feature = "http")]
mod woocommerce;

pub use errors::{Result, SourceError};
pub use memory::MemoryOrderSource;
pub use types::{Cursor, OrderPage, OrderSource, RawLineItem, RawOrder};
#[cfg(feature = "http")]
pub use woocommerce::{WooCommerceConfig, WooCommerceOrderSource};
