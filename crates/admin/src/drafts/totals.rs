//! Draft totals.

use backoffice_core::Money;

use super::model::{AppliedDiscount, LineItem, OrderTotals};

/// Compute totals from line items, discounts and the delivery flag.
///
/// `grand_total = max(0, subtotal - discount_total) + shipping_fee`, where the
/// shipping fee only applies to delivery orders.
#[must_use]
pub fn compute(
    line_items: &[LineItem],
    discounts: &[AppliedDiscount],
    delivery: bool,
    shipping_fee: Money,
) -> OrderTotals {
    let subtotal: Money = line_items.iter().map(LineItem::line_total).sum();
    let discount_total: Money = discounts.iter().map(|d| d.amount).sum();
    let shipping_fee = if delivery { shipping_fee } else { Money::ZERO };

    OrderTotals {
        subtotal,
        discount_total,
        shipping_fee,
        grand_total: subtotal.saturating_sub(discount_total) + shipping_fee,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::num::NonZeroU32;

    use backoffice_core::VariantId;

    use super::*;

    fn item(quantity: u32, unit_price: i64) -> LineItem {
        LineItem {
            variant_id: VariantId::new(1),
            name: "Tee".to_string(),
            quantity: NonZeroU32::new(quantity).unwrap(),
            unit_price: Money::from(unit_price),
        }
    }

    fn discount(amount: i64) -> AppliedDiscount {
        AppliedDiscount {
            code: format!("V{amount}"),
            amount: Money::from(amount),
        }
    }

    #[test]
    fn test_delivery_order_totals() {
        let totals = compute(
            &[item(2, 100_000)],
            &[discount(20_000)],
            true,
            Money::from(30_000),
        );
        assert_eq!(totals.subtotal, Money::from(200_000));
        assert_eq!(totals.discount_total, Money::from(20_000));
        assert_eq!(totals.shipping_fee, Money::from(30_000));
        assert_eq!(totals.grand_total, Money::from(210_000));
    }

    #[test]
    fn test_no_shipping_without_delivery() {
        let totals = compute(&[item(1, 50_000)], &[], false, Money::from(30_000));
        assert_eq!(totals.shipping_fee, Money::ZERO);
        assert_eq!(totals.grand_total, Money::from(50_000));
    }

    #[test]
    fn test_discount_larger_than_subtotal_floors_at_zero() {
        let totals = compute(
            &[item(1, 10_000)],
            &[discount(8_000), discount(5_000)],
            true,
            Money::from(30_000),
        );
        assert_eq!(totals.discount_total, Money::from(13_000));
        assert_eq!(totals.grand_total, Money::from(30_000));
    }

    #[test]
    fn test_empty_draft() {
        assert_eq!(
            compute(&[], &[], false, Money::from(30_000)),
            OrderTotals::default()
        );
    }
}
