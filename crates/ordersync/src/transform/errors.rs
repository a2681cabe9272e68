use thiserror::Error;

/// Why a single order could not be normalized.
///
/// These never fail a page: the order is logged and counted as skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("order {order_id}: invalid amount {value:?} in {field}")]
    InvalidAmount {
        order_id: u64,
        field: String,
        value: String,
    },

    #[error("order {order_id}: line item {line_item_id} has negative quantity {quantity}")]
    InvalidQuantity {
        order_id: u64,
        line_item_id: u64,
        quantity: i64,
    },

    #[error("order {order_id}: missing creation date")]
    MissingCreatedAt { order_id: u64 },

    #[error("order {order_id}: line item {line_item_id} has unusable cost {value}")]
    InvalidCogs {
        order_id: u64,
        line_item_id: u64,
        value: String,
    },

    #[error("order {order_id}: amount overflow computing {field}")]
    Overflow { order_id: u64, field: String },
}

impl TransformError {
    pub fn invalid_amount(order_id: u64, field: &str, value: &str) -> Self {
        Self::InvalidAmount {
            order_id,
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn overflow(order_id: u64, field: &str) -> Self {
        Self::Overflow {
            order_id,
            field: field.to_string(),
        }
    }
}
