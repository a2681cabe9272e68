use crate::source::{RawLineItem, RawOrder};

use super::errors::TransformError;
use super::money::Money;
use super::types::{CogsSource, LineItemEvent, OrderEvent, TransformConfig};

/// Normalize one order.
///
/// Returns `Ok(None)` for orders whose status is excluded. The function is
/// pure: the same order and config always produce the same event.
pub fn transform_order(
    order: &RawOrder,
    config: &TransformConfig,
) -> Result<Option<OrderEvent>, TransformError> {
    let status = order.status.strip_prefix("wc-").unwrap_or(&order.status);
    if config.excluded_statuses.iter().any(|s| s == status) {
        return Ok(None);
    }

    let created_at = order
        .created_at
        .ok_or(TransformError::MissingCreatedAt { order_id: order.id })?;

    let amount = |field: &str, value: &str| {
        Money::parse(value).ok_or_else(|| TransformError::invalid_amount(order.id, field, value))
    };

    let total = amount("total", &order.total)?;
    let tax_total = amount("total_tax", &order.total_tax)?;
    let shipping_total = amount("shipping_total", &order.shipping_total)?;
    let discount_total = amount("discount_total", &order.discount_total)?;
    let refund_total = amount("refund_total", &order.refund_total)?.cents().abs();
    let refund_total = Money::from_cents(refund_total);

    let line_items = order
        .line_items
        .iter()
        .map(|item| transform_line_item(order.id, item, config))
        .collect::<Result<Vec<_>, _>>()?;

    let sum = |field: &str, pick: fn(&LineItemEvent) -> Money| {
        line_items
            .iter()
            .try_fold(Money::ZERO, |acc, item| acc.checked_add(pick(item)))
            .ok_or_else(|| TransformError::overflow(order.id, field))
    };

    let subtotal = match &order.subtotal {
        Some(value) => amount("subtotal", value)?,
        None => sum("subtotal", |item| item.subtotal)?,
    };
    let cogs_total = sum("cogs_total", |item| item.cogs)?;

    let net_total = total
        .checked_sub(tax_total)
        .and_then(|m| m.checked_sub(shipping_total))
        .and_then(|m| m.checked_sub(refund_total))
        .ok_or_else(|| TransformError::overflow(order.id, "net_total"))?;

    Ok(Some(OrderEvent {
        order_id: order.id,
        order_number: if order.number.is_empty() {
            order.id.to_string()
        } else {
            order.number.clone()
        },
        status: status.to_string(),
        currency: order.currency.to_ascii_uppercase(),
        customer_id: order.customer_id.filter(|id| *id != 0),
        created_at,
        paid_at: order.paid_at,
        completed_at: order.completed_at,
        modified_at: order.modified_at,
        subtotal,
        discount_total,
        shipping_total,
        tax_total,
        refund_total,
        total,
        net_total,
        cogs_total,
        line_items,
    }))
}

fn transform_line_item(
    order_id: u64,
    item: &RawLineItem,
    config: &TransformConfig,
) -> Result<LineItemEvent, TransformError> {
    let quantity = u64::try_from(item.quantity).map_err(|_| TransformError::InvalidQuantity {
        order_id,
        line_item_id: item.id,
        quantity: item.quantity,
    })?;

    let subtotal = Money::parse(&item.subtotal).ok_or_else(|| {
        TransformError::invalid_amount(order_id, &format!("line_items[{}].subtotal", item.id), &item.subtotal)
    })?;
    let total = Money::parse(&item.total).ok_or_else(|| {
        TransformError::invalid_amount(order_id, &format!("line_items[{}].total", item.id), &item.total)
    })?;

    let (cogs, cogs_source) = line_item_cogs(order_id, item, subtotal, config)?;

    Ok(LineItemEvent {
        line_item_id: item.id,
        product_id: item.product_id,
        variation_id: item.variation_id.filter(|id| *id != 0),
        sku: item.sku.clone().filter(|s| !s.is_empty()),
        name: item.name.clone(),
        quantity,
        subtotal,
        total,
        cogs,
        cogs_source,
    })
}

/// Cost of goods for a line: unit cost meta times quantity, else the default
/// percentage of the subtotal, else zero.
fn line_item_cogs(
    order_id: u64,
    item: &RawLineItem,
    subtotal: Money,
    config: &TransformConfig,
) -> Result<(Money, CogsSource), TransformError> {
    let invalid = |value: String| TransformError::InvalidCogs {
        order_id,
        line_item_id: item.id,
        value,
    };

    let unit_cost = match config.cogs_meta_key.as_deref().and_then(|key| item.meta.get(key)) {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => {
            Some(Money::parse(s).ok_or_else(|| invalid(format!("{s:?}")))?)
        }
        Some(serde_json::Value::Number(n)) => {
            let text = n.to_string();
            Some(Money::parse(&text).ok_or_else(|| invalid(text))?)
        }
        Some(other) => return Err(invalid(other.to_string())),
    };

    if let Some(unit_cost) = unit_cost {
        if unit_cost < Money::ZERO {
            return Err(invalid(unit_cost.to_string()));
        }
        let quantity = i64::try_from(item.quantity.max(0)).unwrap_or(i64::MAX);
        let cogs = unit_cost
            .checked_mul(quantity)
            .ok_or_else(|| TransformError::overflow(order_id, "cogs"))?;
        return Ok((cogs, CogsSource::Meta));
    }

    if let Some(pct) = config.cogs_default_percentage {
        let cogs = subtotal
            .percentage(pct)
            .ok_or_else(|| TransformError::overflow(order_id, "cogs"))?;
        return Ok((cogs, CogsSource::DefaultPercentage));
    }

    Ok((Money::ZERO, CogsSource::None))
}
