//! Status and classification enums for orders.
//!
//! Order and payment statuses are owned by the backend; the client only
//! displays them and requests transitions. Serialized names are the
//! backend's own codes.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Awaiting confirmation by staff.
    #[default]
    #[serde(rename = "CHO_XAC_NHAN")]
    Pending,
    #[serde(rename = "DA_XAC_NHAN")]
    Confirmed,
    /// Goods are being prepared.
    #[serde(rename = "DANG_XU_LY")]
    Processing,
    #[serde(rename = "CHO_GIAO_HANG")]
    AwaitingShipment,
    #[serde(rename = "DANG_GIAO_HANG")]
    Shipping,
    #[serde(rename = "DA_GIAO_HANG")]
    Delivered,
    #[serde(rename = "HOAN_THANH")]
    Completed,
    #[serde(rename = "DA_HUY")]
    Cancelled,
    #[serde(rename = "YEU_CAU_TRA_HANG")]
    ReturnRequested,
    #[serde(rename = "DA_TRA_HANG")]
    Returned,
    #[serde(rename = "THAT_BAI")]
    Failed,
}

impl OrderStatus {
    /// Whether the order can no longer change status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::Returned | Self::Failed
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Confirmed => write!(f, "Confirmed"),
            Self::Processing => write!(f, "Processing"),
            Self::AwaitingShipment => write!(f, "Awaiting Shipment"),
            Self::Shipping => write!(f, "Shipping"),
            Self::Delivered => write!(f, "Delivered"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::ReturnRequested => write!(f, "Return Requested"),
            Self::Returned => write!(f, "Returned"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Order payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    #[default]
    #[serde(rename = "CHUA_THANH_TOAN")]
    Unpaid,
    #[serde(rename = "DA_THANH_TOAN")]
    Paid,
    #[serde(rename = "THANH_TOAN_MOT_PHAN")]
    PartiallyPaid,
    #[serde(rename = "HOAN_TIEN")]
    Refunded,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpaid => write!(f, "Unpaid"),
            Self::Paid => write!(f, "Paid"),
            Self::PartiallyPaid => write!(f, "Partially Paid"),
            Self::Refunded => write!(f, "Refunded"),
        }
    }
}

/// Sales channel an order was placed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderChannel {
    /// Placed through the web shop.
    #[serde(rename = "ONLINE")]
    Online,
    /// Rung up at the counter.
    #[default]
    #[serde(rename = "TAI_QUAY")]
    InStore,
}

impl std::fmt::Display for OrderChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::InStore => write!(f, "in_store"),
        }
    }
}

impl std::str::FromStr for OrderChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "in_store" => Ok(Self::InStore),
            _ => Err(format!("invalid order channel: {s}")),
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash at the counter.
    #[serde(rename = "TIEN_MAT")]
    Cash,
    /// Cash collected by the courier.
    #[serde(rename = "COD")]
    CashOnDelivery,
    /// Online card payment gateway.
    #[serde(rename = "VNPAY")]
    Gateway,
    #[serde(rename = "CHUYEN_KHOAN")]
    BankTransfer,
}

impl PaymentMethod {
    /// All payment methods, in display order.
    pub const ALL: [Self; 4] = [
        Self::Cash,
        Self::CashOnDelivery,
        Self::Gateway,
        Self::BankTransfer,
    ];
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::CashOnDelivery => write!(f, "cash_on_delivery"),
            Self::Gateway => write!(f, "gateway"),
            Self::BankTransfer => write!(f, "bank_transfer"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "cash_on_delivery" => Ok(Self::CashOnDelivery),
            "gateway" => Ok(Self::Gateway),
            "bank_transfer" => Ok(Self::BankTransfer),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Unpaid);
        assert_eq!(OrderChannel::default(), OrderChannel::InStore);
    }

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::AwaitingShipment).unwrap(),
            "\"CHO_GIAO_HANG\""
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"DA_HUY\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Paid).unwrap(),
            "\"DA_THANH_TOAN\""
        );
        assert_eq!(
            serde_json::to_string(&OrderChannel::InStore).unwrap(),
            "\"TAI_QUAY\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Cash).unwrap(),
            "\"TIEN_MAT\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentMethod::CashOnDelivery).unwrap(),
            "\"COD\""
        );
    }

    #[test]
    fn test_backend_codes_parse() {
        let status: OrderStatus = serde_json::from_str("\"CHO_XAC_NHAN\"").unwrap();
        assert_eq!(status, OrderStatus::Pending);
        let method: PaymentMethod = serde_json::from_str("\"VNPAY\"").unwrap();
        assert_eq!(method, PaymentMethod::Gateway);
        let payment: PaymentStatus = serde_json::from_str("\"HOAN_TIEN\"").unwrap();
        assert_eq!(payment, PaymentStatus::Refunded);
        assert!(serde_json::from_str::<OrderStatus>("\"PENDING\"").is_err());
    }

    #[test]
    fn test_payment_method_from_str_roundtrip() {
        for method in PaymentMethod::ALL {
            assert_eq!(method.to_string().parse::<PaymentMethod>().unwrap(), method);
        }
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Shipping.is_terminal());
    }
}
