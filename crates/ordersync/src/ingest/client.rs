use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::http::{HttpError, HttpRequest, HttpTransport};
use crate::retry::{RetryConfig, with_retry};
use crate::transform::{OrderBatch, OrderEvent};

use super::errors::IngestionError;

const BATCH_PATH: &str = "v1/orders/batch";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how batches are delivered.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Base URL of the aggregation service.
    pub endpoint: String,
    pub site_id: String,
    pub api_token: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

/// Acknowledgement returned by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub accepted: u64,
}

#[derive(Serialize)]
struct BatchBody<'a> {
    orders: &'a [OrderEvent],
}

/// Delivery port for event batches.
#[async_trait]
pub trait OrderIngestor: Send + Sync {
    /// Deliver one batch, retrying transient failures internally.
    async fn send_batch(&self, batch: &OrderBatch) -> Result<IngestReceipt, IngestionError>;
}

/// HTTP client for `POST {endpoint}/v1/orders/batch`.
#[derive(Clone)]
pub struct IngestionClient {
    transport: Arc<dyn HttpTransport>,
    url: Url,
    site_id: String,
    api_token: String,
    timeout: Duration,
    retry: RetryConfig,
}

impl IngestionClient {
    /// Create a client using a reqwest transport with the configured timeout.
    #[cfg(feature = "http")]
    pub fn new(config: &IngestionConfig) -> Result<Self, IngestionError> {
        let transport =
            crate::http::reqwest_transport::ReqwestTransport::with_timeout(config.timeout)
                .map_err(|e| IngestionError::transport(e.to_string()))?;
        Self::new_with_transport(config, Arc::new(transport))
    }

    pub fn new_with_transport(
        config: &IngestionConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, IngestionError> {
        Ok(Self {
            transport,
            url: batch_url(&config.endpoint)?,
            site_id: config.site_id.clone(),
            api_token: config.api_token.clone(),
            timeout: config.timeout,
            retry: config.retry.clone(),
        })
    }

    /// Resolved batch URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn post_once(&self, body: &[u8]) -> Result<IngestReceipt, IngestionError> {
        let request = HttpRequest {
            method: crate::http::HttpMethod::Post,
            url: self.url.to_string(),
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("site-identifier".to_string(), self.site_id.clone()),
                ("api-token".to_string(), self.api_token.clone()),
            ],
            body: body.to_vec(),
        };

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| IngestionError::Timeout {
                after: self.timeout,
            })?
            .map_err(|e| match e {
                HttpError::Timeout => IngestionError::Timeout {
                    after: self.timeout,
                },
                other => IngestionError::transport(other.to_string()),
            })?;

        if !response.is_success() {
            return Err(IngestionError::from_status(
                response.status,
                response.body_snippet(),
            ));
        }

        response.json().map_err(|e| IngestionError::Decode {
            message: e.to_string(),
        })
    }
}

fn batch_url(endpoint: &str) -> Result<Url, IngestionError> {
    let invalid = |message: String| IngestionError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };

    let mut base = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(BATCH_PATH).map_err(|e| invalid(e.to_string()))
}

#[async_trait]
impl OrderIngestor for IngestionClient {
    async fn send_batch(&self, batch: &OrderBatch) -> Result<IngestReceipt, IngestionError> {
        let body = serde_json::to_vec(&BatchBody {
            orders: &batch.events,
        })?;
        let what = format!("ingest batch {}", batch.index);

        let receipt = with_retry(
            || self.post_once(&body),
            IngestionError::is_transient,
            &self.retry,
            &what,
        )
        .await?;

        if receipt.accepted != batch.len() as u64 {
            tracing::warn!(
                batch = batch.index,
                sent = batch.len(),
                accepted = receipt.accepted,
                "Ingestion endpoint accepted a different number of orders than sent"
            );
        } else {
            tracing::debug!(batch = batch.index, accepted = receipt.accepted, "Batch ingested");
        }

        Ok(receipt)
    }
}
