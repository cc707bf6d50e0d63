use rust_decimal::{Decimal, RoundingStrategy};

/// Signed distance of `value` from `reference`, in percent.
/// `None` when the reference is zero (nothing sensible to derive).
pub fn price_difference_percentage(value: Decimal, reference: Decimal) -> Option<Decimal> {
    let diff = value.checked_sub(reference)?;
    let ratio = diff.checked_div(reference)?;
    ratio.checked_mul(Decimal::ONE_HUNDRED)
}

/// Inverse of [`price_difference_percentage`]:
/// `reference * (1 + percentage / 100)`.
pub fn price_from_percentage(percentage: Decimal, reference: Decimal) -> Option<Decimal> {
    let offset = reference.checked_mul(percentage)?.checked_div(Decimal::ONE_HUNDRED)?;
    reference.checked_add(offset)
}

/// Fixed-point display formatting, half-away-from-zero, zero-padded.
/// `format_fixed(dec!(12), 2)` is `"12.00"`.
pub fn format_fixed(value: Decimal, decimals: u32) -> String {
    let rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.prec$}", prec = decimals as usize)
}
