use rust_decimal::{Decimal, RoundingStrategy};

/// Quantize a monetary amount to two decimal places, half-up (matches
/// the store's NUMERIC(12,2) columns).
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// GST on a line amount at `rate` percent, split into equal CGST and
/// SGST halves (intra-state supply).
pub fn gst_halves(line_amount: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    let half = line_amount * (rate / Decimal::from(2)) / Decimal::from(100);
    (half, half)
}

/// Full IGST on a line amount at `rate` percent (inter-state supply).
pub fn gst_full(line_amount: Decimal, rate: Decimal) -> Decimal {
    line_amount * rate / Decimal::from(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn rounds_half_up_to_two_places() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(round_money(dec!(250)), dec!(250.00));
    }

    #[test]
    fn halves_sum_to_full_rate() {
        let (cgst, sgst) = gst_halves(dec!(200), dec!(18));
        assert_eq!(cgst, sgst);
        assert_eq!(cgst + sgst, gst_full(dec!(200), dec!(18)));
        assert_eq!(cgst + sgst, dec!(36));
    }
}
