//! Request and response shapes exchanged with the back-office backend.

use backoffice_core::{
    AddressId, CustomerId, Money, OrderChannel, OrderId, OrderStatus, PaymentMethod,
    PaymentStatus, StaffId, VariantId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::ApiError;

// =============================================================================
// Orders
// =============================================================================

/// Order line as confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A server-confirmed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Human-readable order code (e.g., `HD123456001`).
    pub code: String,
    pub channel: OrderChannel,
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub voucher_codes: Vec<String>,
    pub payment_method: Option<PaymentMethod>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub shipping_fee: Money,
    pub grand_total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// One page of an order listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPage {
    pub content: Vec<Order>,
    pub total_elements: u64,
    pub page: u32,
    pub size: u32,
}

/// Pagination and filter parameters for listing orders.
///
/// Unset filters are omitted from both the request and the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<OrderChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<StaffId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
}

impl OrderListQuery {
    /// Query for a single page.
    #[must_use]
    pub const fn page(page: u32, size: u32) -> Self {
        Self {
            page: Some(page),
            size: Some(size),
            status: None,
            channel: None,
            search: None,
            customer_id: None,
            staff_id: None,
            from: None,
            to: None,
        }
    }

    /// The query as the backend applies it.
    ///
    /// Search text is trimmed and dropped when blank; a date range missing
    /// either end is dropped entirely.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let (from, to) = match (self.from, self.to) {
            (Some(from), Some(to)) => (Some(from), Some(to)),
            _ => (None, None),
        };
        Self {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
            from,
            to,
            ..self.clone()
        }
    }

    /// Query string pairs of the normalized query, in the order the backend
    /// expects them.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let query = self.normalized();
        let mut pairs = Vec::new();
        if let Some(page) = query.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(size) = query.size {
            pairs.push(("size", size.to_string()));
        }
        if let Some(status) = query.status {
            pairs.push(("status", wire_name(&status)));
        }
        if let Some(channel) = query.channel {
            pairs.push(("channel", wire_name(&channel)));
        }
        if let Some(search) = query.search {
            pairs.push(("search", search));
        }
        if let Some(customer_id) = query.customer_id {
            pairs.push(("customer_id", customer_id.to_string()));
        }
        if let Some(staff_id) = query.staff_id {
            pairs.push(("staff_id", staff_id.to_string()));
        }
        if let (Some(from), Some(to)) = (query.from, query.to) {
            pairs.push(("from", from.format("%Y-%m-%d").to_string()));
            pairs.push(("to", to.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

/// Serialized enum name without the surrounding JSON quotes.
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

/// Line of an order-creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderLine {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Order-creation request built from a submitted draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub code: String,
    pub channel: OrderChannel,
    pub customer_id: Option<CustomerId>,
    pub delivery_address_id: Option<AddressId>,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub lines: Vec<CreateOrderLine>,
    pub voucher_codes: Vec<String>,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub shipping_fee: Money,
    pub grand_total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Request to move an order to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub reason: String,
}

/// Request to change an order's payment status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub payment_status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Request to cancel an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

/// Request to record that an order has been paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_method: PaymentMethod,
    /// Gateway or bank reference, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
}

/// Request to refund part or all of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub amount: Money,
    pub reason: String,
}

/// Outcome of cancelling several orders at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCancellation {
    pub cancelled: Vec<Order>,
    pub failed: Vec<(OrderId, ApiError)>,
}

// =============================================================================
// Audit
// =============================================================================

/// One change recorded against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub order_id: OrderId,
    /// Backend action code (e.g., `CREATE`, `UPDATE_STATUS`).
    pub action: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
    /// Value before the change. The backend sends it JSON-encoded.
    #[serde(default, deserialize_with = "embedded_json")]
    pub old_value: Option<Value>,
    /// Value after the change. The backend sends it JSON-encoded.
    #[serde(default, deserialize_with = "embedded_json")]
    pub new_value: Option<Value>,
}

/// Accept a value either inline or as a JSON-encoded string.
///
/// Strings that are not valid JSON are kept as plain strings; blank strings
/// mean no value.
fn embedded_json<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) if raw.trim().is_empty() => None,
        Some(Value::String(raw)) => match serde_json::from_str(&raw) {
            Ok(parsed) => Some(parsed),
            Err(_) => Some(Value::String(raw)),
        },
        Some(other) => Some(other),
    })
}

// =============================================================================
// Vouchers
// =============================================================================

/// Voucher validation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherValidationRequest {
    pub code: String,
    pub customer_id: Option<CustomerId>,
    pub order_total: Money,
}

/// Outcome of validating a voucher code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherValidation {
    pub valid: bool,
    #[serde(default)]
    pub discount_amount: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_skip_unset_filters() {
        let query = OrderListQuery::page(0, 20);
        assert_eq!(
            query.to_query_pairs(),
            vec![("page", "0".to_string()), ("size", "20".to_string())]
        );
    }

    #[test]
    fn test_query_pairs_enum_and_date_filters() {
        let query = OrderListQuery {
            status: Some(OrderStatus::AwaitingShipment),
            channel: Some(OrderChannel::Online),
            search: Some("  HD123  ".to_string()),
            from: NaiveDate::from_ymd_opt(2026, 1, 1),
            to: NaiveDate::from_ymd_opt(2026, 1, 31),
            ..OrderListQuery::default()
        };

        let pairs = query.to_query_pairs();
        assert!(pairs.contains(&("status", "CHO_GIAO_HANG".to_string())));
        assert!(pairs.contains(&("channel", "ONLINE".to_string())));
        assert!(pairs.contains(&("search", "HD123".to_string())));
        assert!(pairs.contains(&("from", "2026-01-01".to_string())));
        assert!(pairs.contains(&("to", "2026-01-31".to_string())));
    }

    #[test]
    fn test_half_open_date_range_is_ignored() {
        let query = OrderListQuery {
            from: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..OrderListQuery::default()
        };
        assert!(query.to_query_pairs().is_empty());
        assert_eq!(query.normalized(), OrderListQuery::default());
    }

    #[test]
    fn test_blank_search_normalizes_away() {
        let query = OrderListQuery {
            search: Some("   ".to_string()),
            ..OrderListQuery::page(0, 20)
        };
        assert_eq!(query.normalized(), OrderListQuery::page(0, 20));

        let padded = OrderListQuery {
            search: Some(" HD123 ".to_string()),
            ..OrderListQuery::default()
        };
        assert_eq!(padded.normalized().search.as_deref(), Some("HD123"));
    }

    #[test]
    fn test_audit_entry_parses_encoded_values() {
        let entry: AuditEntry = serde_json::from_str(
            r#"{
                "id": 1,
                "order_id": 42,
                "action": "UPDATE_STATUS",
                "changed_at": "2026-03-01T08:00:00Z",
                "old_value": "{\"status\":\"CHO_XAC_NHAN\"}",
                "new_value": {"status": "DA_XAC_NHAN"}
            }"#,
        )
        .unwrap();

        assert_eq!(entry.old_value, Some(serde_json::json!({"status": "CHO_XAC_NHAN"})));
        assert_eq!(entry.new_value, Some(serde_json::json!({"status": "DA_XAC_NHAN"})));
        assert!(entry.actor.is_none());
    }

    #[test]
    fn test_audit_entry_keeps_unparseable_values() {
        let entry: AuditEntry = serde_json::from_str(
            r#"{
                "id": 2,
                "order_id": 42,
                "action": "NOTE",
                "changed_at": "2026-03-01T08:00:00Z",
                "old_value": "",
                "new_value": "called customer"
            }"#,
        )
        .unwrap();

        assert!(entry.old_value.is_none());
        assert_eq!(entry.new_value, Some(Value::String("called customer".to_string())));
    }

    #[test]
    fn test_voucher_validation_defaults() {
        let parsed: VoucherValidation = serde_json::from_str(r#"{"valid": false}"#).unwrap();
        assert!(!parsed.valid);
        assert_eq!(parsed.discount_amount, Money::ZERO);
        assert!(parsed.error.is_none());
    }
}
