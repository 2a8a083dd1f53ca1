//! Draft order data model.

use std::num::NonZeroU32;

use backoffice_core::{
    AddressId, CustomerId, DraftId, Money, OrderChannel, OrderStatus, PaymentMethod,
    PaymentStatus, VariantId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Customer attached to a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRef {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
}

/// Delivery address attached to a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRef {
    pub id: AddressId,
    pub recipient_name: String,
    pub recipient_phone: String,
    /// One-line address for display.
    pub summary: String,
}

/// One product variant on a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub variant_id: VariantId,
    /// Display name at the time the item was added.
    pub name: String,
    pub quantity: NonZeroU32,
    pub unit_price: Money,
}

impl LineItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity.get())
    }
}

/// A voucher applied to a draft and the amount it takes off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
    pub amount: Money,
}

/// Derived draft totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount_total: Money,
    pub shipping_fee: Money,
    pub grand_total: Money,
}

/// An in-progress order held in a tab until it is submitted or closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOrder {
    pub id: DraftId,
    /// Human-readable code, sent to the backend on submission.
    pub code: String,
    pub channel: OrderChannel,
    pub customer: Option<CustomerRef>,
    pub delivery_address: Option<AddressRef>,
    /// Whether the order is shipped rather than handed over at the counter.
    pub delivery: bool,
    pub line_items: Vec<LineItem>,
    pub discounts: Vec<AppliedDiscount>,
    pub payment_method: Option<PaymentMethod>,
    pub note: Option<String>,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    /// Set on every edit.
    pub dirty: bool,
}

impl DraftOrder {
    /// Create an empty draft.
    #[must_use]
    pub fn new(code: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id: DraftId::new(),
            code,
            channel: OrderChannel::default(),
            customer: None,
            delivery_address: None,
            delivery: false,
            line_items: Vec::new(),
            discounts: Vec::new(),
            payment_method: None,
            note: None,
            totals: OrderTotals::default(),
            status: OrderStatus::default(),
            payment_status: PaymentStatus::default(),
            created_at,
            dirty: false,
        }
    }

    /// Whether a voucher code is already applied.
    #[must_use]
    pub fn has_voucher(&self, code: &str) -> bool {
        self.discounts.iter().any(|d| d.code == code)
    }
}

/// Partial edit of the active draft.
///
/// `None` leaves a field unchanged; for clearable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct DraftUpdate {
    pub channel: Option<OrderChannel>,
    pub customer: Option<Option<CustomerRef>>,
    pub delivery_address: Option<Option<AddressRef>>,
    pub delivery: Option<bool>,
    /// Replaces all line items.
    pub line_items: Option<Vec<LineItem>>,
    /// Replaces all applied discounts.
    pub discounts: Option<Vec<AppliedDiscount>>,
    pub payment_method: Option<Option<PaymentMethod>>,
    pub note: Option<Option<String>>,
}

impl DraftUpdate {
    /// Merge into a draft. Returns whether any field was set.
    pub(crate) fn apply(self, draft: &mut DraftOrder) -> bool {
        let mut changed = false;
        if let Some(channel) = self.channel {
            draft.channel = channel;
            changed = true;
        }
        if let Some(customer) = self.customer {
            draft.customer = customer;
            changed = true;
        }
        if let Some(address) = self.delivery_address {
            draft.delivery_address = address;
            changed = true;
        }
        if let Some(delivery) = self.delivery {
            draft.delivery = delivery;
            changed = true;
        }
        if let Some(items) = self.line_items {
            draft.line_items = items;
            changed = true;
        }
        if let Some(discounts) = self.discounts {
            draft.discounts = discounts;
            changed = true;
        }
        if let Some(method) = self.payment_method {
            draft.payment_method = method;
            changed = true;
        }
        if let Some(note) = self.note {
            draft.note = note;
            changed = true;
        }
        changed
    }
}

/// A condition a draft must meet before it can be submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftRequirement {
    LineItems,
    PaymentMethod,
}

impl std::fmt::Display for DraftRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LineItems => write!(f, "at least one line item"),
            Self::PaymentMethod => write!(f, "a payment method"),
        }
    }
}
