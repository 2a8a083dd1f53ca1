//! Payment method rules.
//!
//! Which payment methods an order may use depends on its channel, its amount
//! and whether it is delivered. Rule violations are errors; high-value
//! combinations that staff should double-check are warnings.

use backoffice_core::{Money, OrderChannel, PaymentMethod};
use rust_decimal::Decimal;
use thiserror::Error;

const ALL_CHANNELS: &[OrderChannel] = &[OrderChannel::Online, OrderChannel::InStore];
const IN_STORE_ONLY: &[OrderChannel] = &[OrderChannel::InStore];

/// COD orders above this amount get a warning.
const COD_WARNING_THRESHOLD: i64 = 10_000_000;

/// Cash orders above this amount need manager sign-off.
const CASH_WARNING_THRESHOLD: i64 = 20_000_000;

/// Limits and fee for one payment method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRule {
    pub method: PaymentMethod,
    pub channels: &'static [OrderChannel],
    pub minimum: Money,
    pub maximum: Money,
    /// Fraction of the amount charged as a fee (`0.025` = 2.5%).
    pub fee_rate: Decimal,
}

impl PaymentRule {
    /// Rule for a payment method.
    #[must_use]
    pub fn for_method(method: PaymentMethod) -> Self {
        let (channels, minimum, maximum, fee_rate) = match method {
            PaymentMethod::Cash => (IN_STORE_ONLY, 0, 50_000_000, Decimal::ZERO),
            PaymentMethod::CashOnDelivery => (ALL_CHANNELS, 0, 20_000_000, Decimal::ZERO),
            PaymentMethod::Gateway => (ALL_CHANNELS, 10_000, 500_000_000, Decimal::new(25, 3)),
            PaymentMethod::BankTransfer => (ALL_CHANNELS, 0, 1_000_000_000, Decimal::ZERO),
        };
        Self {
            method,
            channels,
            minimum: Money::from(minimum),
            maximum: Money::from(maximum),
            fee_rate,
        }
    }

    fn allows_channel(&self, channel: OrderChannel) -> bool {
        self.channels.contains(&channel)
    }

    fn allows_amount(&self, amount: Money) -> bool {
        amount >= self.minimum && amount <= self.maximum
    }
}

/// A payment rule violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("{method} is not available for {channel} orders")]
    ChannelNotSupported {
        method: PaymentMethod,
        channel: OrderChannel,
    },

    #[error("minimum amount for {method} is {minimum}")]
    BelowMinimum { method: PaymentMethod, minimum: Money },

    #[error("maximum amount for {method} is {maximum}")]
    AboveMaximum { method: PaymentMethod, maximum: Money },

    #[error("cash on delivery requires a delivery order")]
    CodRequiresDelivery,
}

/// A combination that is allowed but should be double-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentWarning {
    /// High-value COD order; an online method is safer.
    HighValueCod,
    /// High-value cash order; needs manager confirmation.
    HighValueCash,
}

impl std::fmt::Display for PaymentWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HighValueCod => write!(
                f,
                "high-value cash on delivery order, consider an online payment method"
            ),
            Self::HighValueCash => write!(f, "high-value cash order, confirm with a manager"),
        }
    }
}

/// Outcome of checking a payment method against an order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentCheck {
    pub errors: Vec<PaymentError>,
    pub warnings: Vec<PaymentWarning>,
}

impl PaymentCheck {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Payment methods usable for an order, in display order.
#[must_use]
pub fn available_methods(channel: OrderChannel, amount: Money, delivery: bool) -> Vec<PaymentMethod> {
    PaymentMethod::ALL
        .into_iter()
        .filter(|&method| {
            let rule = PaymentRule::for_method(method);
            rule.allows_channel(channel)
                && rule.allows_amount(amount)
                && !cod_needs_delivery(method, channel, delivery)
        })
        .collect()
}

/// Check one payment method against an order.
#[must_use]
pub fn check(
    method: PaymentMethod,
    channel: OrderChannel,
    amount: Money,
    delivery: bool,
) -> PaymentCheck {
    let rule = PaymentRule::for_method(method);
    let mut result = PaymentCheck::default();

    if !rule.allows_channel(channel) {
        result
            .errors
            .push(PaymentError::ChannelNotSupported { method, channel });
    }
    if amount < rule.minimum {
        result.errors.push(PaymentError::BelowMinimum {
            method,
            minimum: rule.minimum,
        });
    }
    if amount > rule.maximum {
        result.errors.push(PaymentError::AboveMaximum {
            method,
            maximum: rule.maximum,
        });
    }
    if cod_needs_delivery(method, channel, delivery) {
        result.errors.push(PaymentError::CodRequiresDelivery);
    }

    match method {
        PaymentMethod::CashOnDelivery if amount > Money::from(COD_WARNING_THRESHOLD) => {
            result.warnings.push(PaymentWarning::HighValueCod);
        }
        PaymentMethod::Cash if amount > Money::from(CASH_WARNING_THRESHOLD) => {
            result.warnings.push(PaymentWarning::HighValueCash);
        }
        _ => {}
    }

    result
}

/// Fee charged for paying `amount` with `method`.
#[must_use]
pub fn fee(method: PaymentMethod, amount: Money) -> Money {
    let rule = PaymentRule::for_method(method);
    if rule.fee_rate.is_zero() {
        Money::ZERO
    } else {
        amount.percentage(rule.fee_rate)
    }
}

fn cod_needs_delivery(method: PaymentMethod, channel: OrderChannel, delivery: bool) -> bool {
    method == PaymentMethod::CashOnDelivery && channel == OrderChannel::Online && !delivery
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_is_in_store_only() {
        let online = available_methods(OrderChannel::Online, Money::from(100_000), true);
        assert!(!online.contains(&PaymentMethod::Cash));

        let in_store = available_methods(OrderChannel::InStore, Money::from(100_000), false);
        assert!(in_store.contains(&PaymentMethod::Cash));
    }

    #[test]
    fn test_online_cod_requires_delivery() {
        let pickup = available_methods(OrderChannel::Online, Money::from(100_000), false);
        assert!(!pickup.contains(&PaymentMethod::CashOnDelivery));

        let result = check(
            PaymentMethod::CashOnDelivery,
            OrderChannel::Online,
            Money::from(100_000),
            false,
        );
        assert_eq!(result.errors, vec![PaymentError::CodRequiresDelivery]);
    }

    #[test]
    fn test_gateway_minimum() {
        let methods = available_methods(OrderChannel::InStore, Money::from(5_000), false);
        assert_eq!(
            methods,
            vec![
                PaymentMethod::Cash,
                PaymentMethod::CashOnDelivery,
                PaymentMethod::BankTransfer
            ]
        );

        let result = check(
            PaymentMethod::Gateway,
            OrderChannel::InStore,
            Money::from(5_000),
            false,
        );
        assert!(!result.is_valid());
        assert!(matches!(result.errors[0], PaymentError::BelowMinimum { .. }));
    }

    #[test]
    fn test_amount_limits_are_inclusive() {
        let at_max = check(
            PaymentMethod::CashOnDelivery,
            OrderChannel::InStore,
            Money::from(20_000_000),
            true,
        );
        assert!(at_max.is_valid());

        let over = check(
            PaymentMethod::CashOnDelivery,
            OrderChannel::InStore,
            Money::from(20_000_001),
            true,
        );
        assert!(!over.is_valid());
    }

    #[test]
    fn test_high_value_warnings() {
        let cod = check(
            PaymentMethod::CashOnDelivery,
            OrderChannel::Online,
            Money::from(15_000_000),
            true,
        );
        assert!(cod.is_valid());
        assert_eq!(cod.warnings, vec![PaymentWarning::HighValueCod]);

        let cash = check(
            PaymentMethod::Cash,
            OrderChannel::InStore,
            Money::from(25_000_000),
            false,
        );
        assert!(cash.is_valid());
        assert_eq!(cash.warnings, vec![PaymentWarning::HighValueCash]);
    }

    #[test]
    fn test_cash_online_is_channel_error() {
        let result = check(
            PaymentMethod::Cash,
            OrderChannel::Online,
            Money::from(100_000),
            true,
        );
        assert_eq!(
            result.errors,
            vec![PaymentError::ChannelNotSupported {
                method: PaymentMethod::Cash,
                channel: OrderChannel::Online,
            }]
        );
    }

    #[test]
    fn test_fees() {
        assert_eq!(fee(PaymentMethod::Cash, Money::from(1_000_000)), Money::ZERO);
        assert_eq!(
            fee(PaymentMethod::Gateway, Money::from(1_000_000)),
            Money::from(25_000)
        );
        // 2.5% of 10_020 = 250.5, rounded half away from zero
        assert_eq!(fee(PaymentMethod::Gateway, Money::from(10_020)), Money::from(251));
    }
}
