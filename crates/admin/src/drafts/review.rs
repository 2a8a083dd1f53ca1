//! Advisory checks on a draft before submission.
//!
//! A review never blocks anything by itself; the manager only refuses to
//! submit drafts that fail [`DraftRequirement`](super::DraftRequirement)s.

use backoffice_core::{Phone, PhoneError};
use thiserror::Error;

use super::model::DraftOrder;
use crate::payment::{self, PaymentError, PaymentWarning};

/// Longest customer name the backend accepts.
pub const MAX_CUSTOMER_NAME_LEN: usize = 255;

/// Longest order note the backend accepts.
pub const MAX_NOTE_LEN: usize = 500;

/// A problem that will make submission fail or the backend reject the order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("order has no line items")]
    NoLineItems,

    #[error("no payment method selected")]
    NoPaymentMethod,

    #[error("delivery orders need a customer")]
    DeliveryWithoutCustomer,

    #[error("delivery orders need a delivery address")]
    DeliveryWithoutAddress,

    #[error("customer phone: {0}")]
    CustomerPhone(#[from] PhoneError),

    #[error("customer name is {len} characters, maximum is {max}")]
    CustomerNameTooLong { len: usize, max: usize },

    #[error("note is {len} characters, maximum is {max}")]
    NoteTooLong { len: usize, max: usize },

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

/// Result of reviewing a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftReview {
    pub errors: Vec<ReviewError>,
    pub warnings: Vec<PaymentWarning>,
}

impl DraftReview {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Review a draft.
#[must_use]
pub fn review(draft: &DraftOrder) -> DraftReview {
    let mut review = DraftReview::default();

    if draft.line_items.is_empty() {
        review.errors.push(ReviewError::NoLineItems);
    }

    if draft.delivery {
        if draft.delivery_address.is_none() {
            review.errors.push(ReviewError::DeliveryWithoutAddress);
        }
        match &draft.customer {
            None => review.errors.push(ReviewError::DeliveryWithoutCustomer),
            Some(customer) => {
                if let Err(e) = Phone::parse(customer.phone.as_deref().unwrap_or_default()) {
                    review.errors.push(e.into());
                }
                let len = customer.name.chars().count();
                if len > MAX_CUSTOMER_NAME_LEN {
                    review.errors.push(ReviewError::CustomerNameTooLong {
                        len,
                        max: MAX_CUSTOMER_NAME_LEN,
                    });
                }
            }
        }
    }

    if let Some(note) = &draft.note {
        let len = note.chars().count();
        if len > MAX_NOTE_LEN {
            review.errors.push(ReviewError::NoteTooLong {
                len,
                max: MAX_NOTE_LEN,
            });
        }
    }

    match draft.payment_method {
        None => review.errors.push(ReviewError::NoPaymentMethod),
        Some(method) => {
            let check = payment::check(
                method,
                draft.channel,
                draft.totals.grand_total,
                draft.delivery,
            );
            review.errors.extend(check.errors.into_iter().map(ReviewError::from));
            review.warnings.extend(check.warnings);
        }
    }

    review
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use backoffice_core::{AddressId, CustomerId, Money, OrderChannel, PaymentMethod, VariantId};
    use chrono::Utc;

    use super::*;
    use crate::drafts::model::{AddressRef, CustomerRef, LineItem};

    fn ready_draft() -> DraftOrder {
        let mut draft = DraftOrder::new("HD000001001".to_string(), Utc::now());
        draft.line_items.push(LineItem {
            variant_id: VariantId::new(1),
            name: "Tee".to_string(),
            quantity: NonZeroU32::new(1).unwrap(),
            unit_price: Money::from(100_000),
        });
        draft.totals.grand_total = Money::from(100_000);
        draft.payment_method = Some(PaymentMethod::Cash);
        draft
    }

    fn delivery(draft: &mut DraftOrder, phone: Option<&str>) {
        draft.delivery = true;
        draft.customer = Some(CustomerRef {
            id: CustomerId::new(9),
            name: "Lan".to_string(),
            phone: phone.map(str::to_string),
        });
        draft.delivery_address = Some(AddressRef {
            id: AddressId::new(3),
            recipient_name: "Lan".to_string(),
            recipient_phone: "0901234567".to_string(),
            summary: "12 Hang Bac".to_string(),
        });
    }

    #[test]
    fn test_ready_draft_is_clean() {
        assert!(review(&ready_draft()).is_clean());
    }

    #[test]
    fn test_empty_draft_errors() {
        let draft = DraftOrder::new("HD000001001".to_string(), Utc::now());
        let review = review(&draft);
        assert_eq!(
            review.errors,
            vec![ReviewError::NoLineItems, ReviewError::NoPaymentMethod]
        );
    }

    #[test]
    fn test_delivery_needs_customer_and_address() {
        let mut draft = ready_draft();
        draft.delivery = true;
        let review = review(&draft);
        assert!(review.errors.contains(&ReviewError::DeliveryWithoutAddress));
        assert!(review.errors.contains(&ReviewError::DeliveryWithoutCustomer));
    }

    #[test]
    fn test_delivery_customer_phone_checked() {
        let mut draft = ready_draft();
        delivery(&mut draft, Some("0901 234 567"));
        assert!(review(&draft).is_clean());

        delivery(&mut draft, Some("12345"));
        assert!(matches!(
            review(&draft).errors[..],
            [ReviewError::CustomerPhone(PhoneError::InvalidLength { .. })]
        ));

        delivery(&mut draft, None);
        assert_eq!(
            review(&draft).errors,
            vec![ReviewError::CustomerPhone(PhoneError::Empty)]
        );
    }

    #[test]
    fn test_note_length() {
        let mut draft = ready_draft();
        draft.note = Some("x".repeat(MAX_NOTE_LEN + 1));
        assert_eq!(
            review(&draft).errors,
            vec![ReviewError::NoteTooLong {
                len: 501,
                max: MAX_NOTE_LEN
            }]
        );
    }

    #[test]
    fn test_payment_rules_are_included() {
        let mut draft = ready_draft();
        draft.channel = OrderChannel::Online;
        delivery(&mut draft, Some("0901234567"));
        let review = review(&draft);
        assert!(matches!(
            review.errors[..],
            [ReviewError::Payment(PaymentError::ChannelNotSupported { .. })]
        ));

        let mut draft = ready_draft();
        draft.totals.grand_total = Money::from(25_000_000);
        let review = super::review(&draft);
        assert!(review.is_clean());
        assert_eq!(review.warnings, vec![PaymentWarning::HighValueCash]);
    }
}
