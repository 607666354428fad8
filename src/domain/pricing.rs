use bigdecimal::{BigDecimal, Zero};

/// Monetary breakdown of an order as persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCharges {
    pub subtotal: BigDecimal,
    pub tax: BigDecimal,
    pub delivery_fee: BigDecimal,
    pub discount: BigDecimal,
    pub total_amount: BigDecimal,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ChargesError {
    #[error("{0} must not be negative")]
    Negative(&'static str),

    #[error("{0} must have at most 2 decimal places")]
    Precision(&'static str),

    #[error("Total amount {supplied} does not match computed total {expected}")]
    TotalMismatch {
        supplied: BigDecimal,
        expected: BigDecimal,
    },
}

/// Decimal places stored for every money column.
pub const MONEY_SCALE: i64 = 2;

fn has_money_scale(value: &BigDecimal) -> bool {
    value.with_scale(MONEY_SCALE) == *value
}

/// Σ unit price × quantity over `(price, quantity)` lines.
pub fn line_subtotal<'a, I>(lines: I) -> BigDecimal
where
    I: IntoIterator<Item = (&'a BigDecimal, i32)>,
{
    lines
        .into_iter()
        .fold(BigDecimal::zero(), |acc, (price, quantity)| {
            acc + price * BigDecimal::from(quantity)
        })
        .with_scale(MONEY_SCALE)
}

impl OrderCharges {
    /// Assembles the breakdown from caller-supplied charges. When `total_amount` is given
    /// it must equal `subtotal + tax + delivery_fee - discount`; otherwise it is derived once.
    pub fn assemble(
        subtotal: BigDecimal,
        tax: BigDecimal,
        delivery_fee: BigDecimal,
        discount: BigDecimal,
        total_amount: Option<BigDecimal>,
    ) -> Result<Self, ChargesError> {
        for (name, value) in [
            ("tax", &tax),
            ("deliveryFee", &delivery_fee),
            ("discount", &discount),
        ] {
            if value < &BigDecimal::zero() {
                return Err(ChargesError::Negative(name));
            }
            if !has_money_scale(value) {
                return Err(ChargesError::Precision(name));
            }
        }
        if let Some(supplied) = &total_amount {
            if !has_money_scale(supplied) {
                return Err(ChargesError::Precision("totalAmount"));
            }
        }

        let expected = (&subtotal + &tax + &delivery_fee - &discount).with_scale(MONEY_SCALE);
        if expected < BigDecimal::zero() {
            return Err(ChargesError::Negative("totalAmount"));
        }

        let total_amount = match total_amount {
            Some(supplied) if supplied != expected => {
                return Err(ChargesError::TotalMismatch { supplied, expected });
            }
            Some(supplied) => supplied.with_scale(MONEY_SCALE),
            None => expected,
        };

        Ok(Self {
            subtotal: subtotal.with_scale(MONEY_SCALE),
            tax: tax.with_scale(MONEY_SCALE),
            delivery_fee: delivery_fee.with_scale(MONEY_SCALE),
            discount: discount.with_scale(MONEY_SCALE),
            total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn subtotal_multiplies_quantities() {
        let ten = dec("10.00");
        let five = dec("5.00");
        let subtotal = line_subtotal([(&ten, 2), (&five, 1)]);
        assert_eq!(subtotal, dec("25.00"));
    }

    #[test]
    fn empty_lines_sum_to_zero() {
        assert_eq!(line_subtotal(std::iter::empty()), BigDecimal::zero());
    }

    #[test]
    fn supplied_total_is_kept_when_consistent() {
        let charges = OrderCharges::assemble(
            dec("25.00"),
            dec("2.50"),
            dec("3.00"),
            dec("0"),
            Some(dec("30.50")),
        )
        .unwrap();
        assert_eq!(charges.total_amount, dec("30.50"));
        assert_eq!(charges.subtotal, dec("25.00"));
    }

    #[test]
    fn total_is_derived_when_omitted() {
        let charges =
            OrderCharges::assemble(dec("25.00"), dec("2.50"), dec("3.00"), dec("1.25"), None)
                .unwrap();
        assert_eq!(charges.total_amount, dec("29.25"));
    }

    #[test]
    fn inconsistent_total_is_rejected() {
        let err = OrderCharges::assemble(
            dec("25.00"),
            dec("2.50"),
            dec("3.00"),
            dec("0"),
            Some(dec("31.00")),
        )
        .unwrap_err();
        assert!(matches!(err, ChargesError::TotalMismatch { .. }));
    }

    #[test]
    fn negative_charges_are_rejected() {
        let err = OrderCharges::assemble(dec("25.00"), dec("-1"), dec("0"), dec("0"), None)
            .unwrap_err();
        assert_eq!(err, ChargesError::Negative("tax"));

        let err = OrderCharges::assemble(dec("5.00"), dec("0"), dec("0"), dec("6.00"), None)
            .unwrap_err();
        assert_eq!(err, ChargesError::Negative("totalAmount"));
    }

    #[test]
    fn sub_cent_charges_are_rejected() {
        let err = OrderCharges::assemble(dec("25.00"), dec("0.005"), dec("0.005"), dec("0"), None)
            .unwrap_err();
        assert_eq!(err, ChargesError::Precision("tax"));

        let err = OrderCharges::assemble(dec("25.00"), dec("0"), dec("0"), dec("0.001"), None)
            .unwrap_err();
        assert_eq!(err, ChargesError::Precision("discount"));

        let err = OrderCharges::assemble(
            dec("25.00"),
            dec("0"),
            dec("0"),
            dec("0"),
            Some(dec("25.004")),
        )
        .unwrap_err();
        assert_eq!(err, ChargesError::Precision("totalAmount"));
    }

    #[test]
    fn trailing_zeros_beyond_cents_are_accepted() {
        let charges =
            OrderCharges::assemble(dec("25.00"), dec("2.5000"), dec("3"), dec("0.000"), None)
                .unwrap();
        assert_eq!(charges.total_amount, dec("30.50"));
        assert_eq!(
            charges.subtotal.clone() + charges.tax + charges.delivery_fee - charges.discount,
            charges.total_amount
        );
    }
}
