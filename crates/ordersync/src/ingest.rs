//! Delivery of normalized order batches to the aggregation service.
//!
//! The client retries server errors, transport failures and timeouts with
//! exponential backoff and gives up immediately on 4xx responses. It never
//! touches sync progress; the orchestrator decides what a failure means.

mod client;
mod errors;

pub use client::{
    DEFAULT_REQUEST_TIMEOUT, IngestReceipt, IngestionClient, IngestionConfig, OrderIngestor,
};
pub use errors::IngestionError;
