use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Mangrove-style tick base: price = 1.0001^tick.
const TICK_BASE: f64 = 1.0001;

/// One rung of a ladder. `gives` is the offered amount: base for asks,
/// quote for bids; the chart preview leaves it at zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferRung {
    pub index: usize,
    pub price: Decimal,
    pub gives: Decimal,
    pub tick: i64,
}

/// Bid/ask split of a ladder around the mid-price. Published to the chart
/// sink as a whole; consumers only ever see the latest value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeometricDistribution {
    pub bids: Vec<OfferRung>,
    pub asks: Vec<OfferRung>,
}

impl GeometricDistribution {
    pub fn rung_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }
}

/// Nearest tick for a price. `None` for non-positive prices.
pub fn price_to_tick(price: Decimal) -> Option<i64> {
    let price = price.to_f64()?;
    if price <= 0.0 || !price.is_finite() {
        return None;
    }
    let tick = price.ln() / TICK_BASE.ln();
    if !tick.is_finite() {
        return None;
    }
    Some(tick.round() as i64)
}

pub fn tick_to_price(tick: i64) -> Option<Decimal> {
    let price = TICK_BASE.powi(tick as i32);
    if !price.is_finite() {
        return None;
    }
    Decimal::from_f64(price)
}

/// Per-step ratio of the geometric grid spanning `[min, max]` with
/// `points` rungs. `None` unless `0 < min <= max` and `points >= 2`.
pub fn geometric_ratio(min: Decimal, max: Decimal, points: u32) -> Option<Decimal> {
    if min <= Decimal::ZERO || max < min || points < 2 {
        return None;
    }
    let span = (max / min).to_f64()?;
    let ratio = span.powf(1.0 / f64::from(points - 1));
    if !ratio.is_finite() || ratio < 1.0 {
        return None;
    }
    Decimal::from_f64(ratio)
}

/// How many rungs of spacing `ratio` fit in `[min, max]`, endpoints
/// included. Inverse of [`geometric_ratio`]; never below 2.
pub fn points_from_ratio(min: Decimal, max: Decimal, ratio: Decimal) -> Option<u32> {
    if min <= Decimal::ZERO || max < min || ratio <= Decimal::ONE {
        return None;
    }
    let span = (max / min).to_f64()?;
    let ratio = ratio.to_f64()?;
    // Nudge before flooring so an exact fit is not lost to fp error.
    let steps = (span.ln() / ratio.ln() + 1e-9).floor();
    if !steps.is_finite() || steps < 0.0 {
        return None;
    }
    Some(((steps as u32) + 1).max(2))
}

/// The geometric price grid itself: `min * ratio^i`, last rung pinned to
/// `max` so rounding noise cannot push the ladder past its range.
pub fn geometric_rungs(
    min: Decimal,
    max: Decimal,
    ratio: Decimal,
    points: u32,
    decimals: u32,
) -> Option<Vec<Decimal>> {
    if min <= Decimal::ZERO || max < min || points < 2 {
        return None;
    }
    let min_f = min.to_f64()?;
    let ratio_f = ratio.to_f64()?;
    let mut rungs = Vec::with_capacity(points as usize);
    for i in 0..points {
        let price = if i == points - 1 {
            max
        } else if i == 0 {
            min
        } else {
            Decimal::from_f64(min_f * ratio_f.powi(i as i32))?.round_dp(decimals)
        };
        rungs.push(price);
    }
    Some(rungs)
}

/// The chart preview shown while the oracle has not answered yet: a small
/// evenly spaced grid between min and max, bids below the mid-price, asks
/// at or above it, amounts left at zero. Without a mid-price there is
/// nothing to split around, so the preview is empty.
pub fn preview_distribution(
    min: Decimal,
    max: Decimal,
    mid: Option<Decimal>,
    points: usize,
) -> GeometricDistribution {
    let Some(mid) = mid else {
        return GeometricDistribution::default();
    };
    if min <= Decimal::ZERO || max < min || points < 2 {
        return GeometricDistribution::default();
    }

    let step = (max - min) / Decimal::from(points as u64 - 1);
    let mut distribution = GeometricDistribution::default();
    for i in 0..points {
        let price = min + step * Decimal::from(i as u64);
        let Some(tick) = price_to_tick(price) else {
            continue;
        };
        let rung = OfferRung {
            index: i,
            price,
            gives: Decimal::ZERO,
            tick,
        };
        if price < mid {
            distribution.bids.push(rung);
        } else {
            distribution.asks.push(rung);
        }
    }
    distribution
}
