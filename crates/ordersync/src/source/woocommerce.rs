//! WooCommerce REST API order source.
//!
//! Orders are listed with `orderby=id&order=asc` so page boundaries are
//! stable while the walk is in progress. The cursor is the next page number.
//! Credentials are passed as `consumer_key` / `consumer_secret` query
//! parameters, which WooCommerce accepts over HTTPS.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};
use crate::transform::Money;

use super::errors::{Result, SourceError};
use super::types::{Cursor, OrderPage, OrderSource, RawLineItem, RawOrder};

const ORDERS_PATH: &str = "wp-json/wc/v3/orders";

/// Connection settings for a WooCommerce store.
#[derive(Debug, Clone)]
pub struct WooCommerceConfig {
    /// Store base URL, e.g. `https://shop.example.com`.
    pub store_url: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub timeout: StdDuration,
}

/// [`OrderSource`] backed by the WooCommerce REST API.
#[derive(Clone)]
pub struct WooCommerceOrderSource {
    transport: Arc<dyn HttpTransport>,
    orders_url: Url,
    consumer_key: String,
    consumer_secret: String,
}

impl WooCommerceOrderSource {
    /// Create a source using a reqwest transport with the configured timeout.
    pub fn new(config: &WooCommerceConfig) -> Result<Self> {
        let transport = crate::http::reqwest_transport::ReqwestTransport::with_timeout(
            config.timeout,
        )
        .map_err(|e| SourceError::network(e.to_string()))?;
        Self::new_with_transport(config, Arc::new(transport))
    }

    pub fn new_with_transport(
        config: &WooCommerceConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self> {
        let base = format!("{}/", config.store_url.trim_end_matches('/'));
        let orders_url = Url::parse(&base)
            .and_then(|u| u.join(ORDERS_PATH))
            .map_err(|e| SourceError::Api {
                status: 0,
                message: format!("invalid store URL {:?}: {e}", config.store_url),
            })?;

        Ok(Self {
            transport,
            orders_url,
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
        })
    }

    fn page_url(&self, page: u32, per_page: u32) -> String {
        let mut url = self.orders_url.clone();
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string())
            .append_pair("orderby", "id")
            .append_pair("order", "asc")
            .append_pair("consumer_key", &self.consumer_key)
            .append_pair("consumer_secret", &self.consumer_secret);
        url.into()
    }

    async fn get(&self, url: String) -> Result<HttpResponse> {
        let request = HttpRequest::get(url).with_header("Accept", "application/json");

        let response = self.transport.send(request).await.map_err(|e| match e {
            HttpError::Timeout => SourceError::Timeout,
            other => SourceError::network(other.to_string()),
        })?;

        match response.status {
            200..=299 => Ok(response),
            401 | 403 => Err(SourceError::Unauthorized {
                status: response.status,
            }),
            status => Err(SourceError::Api {
                status,
                message: response.body_snippet(),
            }),
        }
    }
}

fn parse_page_cursor(cursor: Option<&Cursor>) -> Result<u32> {
    match cursor {
        None => Ok(1),
        Some(c) => c
            .as_str()
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| SourceError::InvalidCursor {
                cursor: c.to_string(),
            }),
    }
}

fn header_u64(response: &HttpResponse, name: &str) -> Option<u64> {
    response.header(name)?.trim().parse().ok()
}

#[async_trait]
impl OrderSource for WooCommerceOrderSource {
    fn name(&self) -> &str {
        "woocommerce"
    }

    async fn list_orders(&self, cursor: Option<&Cursor>, page_size: u32) -> Result<OrderPage> {
        let page = parse_page_cursor(cursor)?;
        let per_page = page_size.clamp(1, 100);

        let response = self.get(self.page_url(page, per_page)).await?;
        let wc_orders: Vec<WcOrder> = response
            .json()
            .map_err(|e| SourceError::decode(e.to_string()))?;

        let total_pages = header_u64(&response, "x-wp-totalpages");
        let has_more = match total_pages {
            Some(total) => u64::from(page) < total,
            None => wc_orders.len() as u32 >= per_page,
        };

        tracing::debug!(
            page,
            per_page,
            count = wc_orders.len(),
            total_pages,
            "Fetched WooCommerce orders page"
        );

        let orders = wc_orders.into_iter().map(to_raw_order).collect();
        Ok(OrderPage {
            orders,
            next_cursor: has_more.then(|| Cursor::new((page + 1).to_string())),
        })
    }

    async fn count_orders(&self) -> Result<u64> {
        let response = self.get(self.page_url(1, 1)).await?;
        header_u64(&response, "x-wp-total")
            .ok_or_else(|| SourceError::decode("missing X-WP-Total header"))
    }
}

// ─── WooCommerce wire types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WcMeta {
    key: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WcLineItem {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    product_id: u64,
    #[serde(default)]
    variation_id: u64,
    #[serde(default)]
    quantity: i64,
    #[serde(default)]
    subtotal: String,
    #[serde(default)]
    total: String,
    #[serde(default)]
    sku: Option<String>,
    #[serde(default)]
    meta_data: Vec<WcMeta>,
}

#[derive(Debug, Deserialize)]
struct WcRefund {
    #[serde(default)]
    total: String,
}

#[derive(Debug, Deserialize)]
struct WcOrder {
    id: u64,
    #[serde(default)]
    number: String,
    status: String,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    customer_id: u64,
    #[serde(default)]
    date_created_gmt: Option<String>,
    #[serde(default)]
    date_modified_gmt: Option<String>,
    #[serde(default)]
    date_paid_gmt: Option<String>,
    #[serde(default)]
    date_completed_gmt: Option<String>,
    #[serde(default)]
    discount_total: String,
    #[serde(default)]
    shipping_total: String,
    #[serde(default)]
    total: String,
    #[serde(default)]
    total_tax: String,
    #[serde(default)]
    line_items: Vec<WcLineItem>,
    #[serde(default)]
    refunds: Vec<WcRefund>,
    #[serde(default)]
    meta_data: Vec<WcMeta>,
}

/// WooCommerce `*_gmt` fields are naive UTC timestamps.
fn parse_gmt(value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn meta_map(meta: Vec<WcMeta>) -> BTreeMap<String, serde_json::Value> {
    meta.into_iter().map(|m| (m.key, m.value)).collect()
}

/// Refund totals come back negative ("-5.00"); sum their magnitudes.
///
/// Unparseable entries are passed through verbatim so the transformer
/// reports them instead of silently dropping money.
fn refund_total(refunds: &[WcRefund]) -> String {
    if refunds.is_empty() {
        return String::new();
    }
    let mut sum = Money::ZERO;
    for refund in refunds {
        let added = Money::parse(&refund.total)
            .and_then(|amount| sum.checked_add(Money::from_cents(amount.cents().abs())));
        match added {
            Some(next) => sum = next,
            None => return refund.total.clone(),
        }
    }
    sum.to_string()
}

fn to_raw_order(order: WcOrder) -> RawOrder {
    let refund_total = refund_total(&order.refunds);
    RawOrder {
        id: order.id,
        number: order.number,
        status: order.status,
        currency: order.currency,
        customer_id: (order.customer_id != 0).then_some(order.customer_id),
        created_at: parse_gmt(order.date_created_gmt.as_deref()),
        paid_at: parse_gmt(order.date_paid_gmt.as_deref()),
        completed_at: parse_gmt(order.date_completed_gmt.as_deref()),
        modified_at: parse_gmt(order.date_modified_gmt.as_deref()),
        subtotal: None,
        total: order.total,
        total_tax: order.total_tax,
        shipping_total: order.shipping_total,
        discount_total: order.discount_total,
        refund_total,
        line_items: order
            .line_items
            .into_iter()
            .map(|item| RawLineItem {
                id: item.id,
                product_id: item.product_id,
                variation_id: (item.variation_id != 0).then_some(item.variation_id),
                sku: item.sku.filter(|s| !s.is_empty()),
                name: item.name,
                quantity: item.quantity,
                subtotal: item.subtotal,
                total: item.total,
                meta: meta_map(item.meta_data),
            })
            .collect(),
        meta: meta_map(order.meta_data),
    }
}
