use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::config::OracleConfig;
use crate::error::{FormError, FormResult};
use crate::form::fields::FieldId;
use crate::ladder::distribution::{
    geometric_ratio, geometric_rungs, points_from_ratio, price_to_tick, GeometricDistribution,
    OfferRung,
};

/// Snapshot of the debounced form inputs sent to the requirement oracle.
/// Compared for equality to suppress refetches of an unchanged snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LadderParams {
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub mid_price: Option<Decimal>,
    pub price_points: Option<Decimal>,
    pub ratio: Option<Decimal>,
    pub step_size: Option<Decimal>,
    /// Which field the user is editing; decides whether the ratio or the
    /// point count is authoritative for the grid.
    pub changing_from: Option<FieldId>,
}

/// What it takes to fund and post the ladder described by a `LadderParams`
/// snapshot. Amounts are exact decimals; on-chain funding checks cannot
/// tolerate float drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KandelRequirements {
    pub required_base: Decimal,
    pub required_quote: Decimal,
    pub required_bounty: Decimal,
    pub price_ratio: Decimal,
    pub price_points: u32,
    pub distribution: GeometricDistribution,
    pub offers_with_prices: Vec<OfferRung>,
}

#[async_trait]
pub trait RequirementOracle: Send + Sync {
    async fn get_requirements(&self, params: &LadderParams) -> FormResult<KandelRequirements>;
}

/// Local deterministic oracle: lays a geometric grid over the price range
/// and prices the deposits from config. A production host would swap in an
/// implementation backed by the strategy SDK; the contract is the same.
#[derive(Debug, Clone, Default)]
pub struct GeometricOracle {
    cfg: OracleConfig,
}

impl GeometricOracle {
    pub fn new(cfg: OracleConfig) -> Self {
        Self { cfg }
    }

    fn compute(&self, params: &LadderParams) -> FormResult<KandelRequirements> {
        let min = params.min_price;
        let max = params.max_price;
        if min <= Decimal::ZERO {
            return Err(FormError::Oracle("min price must be positive".to_string()));
        }
        if max < min {
            return Err(FormError::Oracle(
                "max price cannot be less than min price".to_string(),
            ));
        }

        let (points, ratio) = self.grid_shape(params, min, max)?;

        if let Some(step) = params.step_size {
            if step < Decimal::ONE || step >= Decimal::from(points) {
                return Err(FormError::Oracle(
                    "step size must be at least 1 and inferior to price points".to_string(),
                ));
            }
        }

        let rungs = geometric_rungs(min, max, ratio, points, self.cfg.price_decimals)
            .ok_or_else(|| FormError::Oracle("could not lay out price grid".to_string()))?;

        // Without a market mid-price, split at the geometric midpoint of
        // the range so the ladder still has two sides.
        let mid = match params.mid_price {
            Some(mid) => mid,
            None => geometric_midpoint(min, max)
                .ok_or_else(|| FormError::Oracle("could not derive a mid price".to_string()))?,
        };

        let mut distribution = GeometricDistribution::default();
        let mut offers_with_prices = Vec::with_capacity(rungs.len());
        let mut required_base = Decimal::ZERO;
        let mut required_quote = Decimal::ZERO;
        for (index, price) in rungs.into_iter().enumerate() {
            let tick = price_to_tick(price)
                .ok_or_else(|| FormError::Oracle(format!("no tick for rung price {price}")))?;
            if price < mid {
                let gives = (self.cfg.ask_gives * price).round_dp(self.cfg.price_decimals);
                required_quote += gives;
                let rung = OfferRung {
                    index,
                    price,
                    gives,
                    tick,
                };
                offers_with_prices.push(rung.clone());
                distribution.bids.push(rung);
            } else {
                let gives = self.cfg.ask_gives;
                required_base += gives;
                let rung = OfferRung {
                    index,
                    price,
                    gives,
                    tick,
                };
                offers_with_prices.push(rung.clone());
                distribution.asks.push(rung);
            }
        }

        let required_bounty = self.cfg.bounty_per_offer * Decimal::from(points);

        Ok(KandelRequirements {
            required_base,
            required_quote,
            required_bounty,
            price_ratio: ratio.round_dp(self.cfg.price_decimals),
            price_points: points,
            distribution,
            offers_with_prices,
        })
    }

    /// The grid has one degree of freedom: when the ratio is the field
    /// being edited it dictates the point count, otherwise the point count
    /// dictates the ratio.
    fn grid_shape(
        &self,
        params: &LadderParams,
        min: Decimal,
        max: Decimal,
    ) -> FormResult<(u32, Decimal)> {
        if params.changing_from == Some(FieldId::Ratio) {
            let ratio = params
                .ratio
                .ok_or_else(|| FormError::Oracle("ratio is required".to_string()))?;
            if ratio <= Decimal::ONE {
                return Err(FormError::Oracle(
                    "ratio must be greater than 1".to_string(),
                ));
            }
            let points = points_from_ratio(min, max, ratio).ok_or_else(|| {
                FormError::Oracle(format!("no grid fits ratio {ratio} in [{min},{max}]"))
            })?;
            return Ok((points, ratio));
        }

        let points = params
            .price_points
            .ok_or_else(|| FormError::Oracle("price points are required".to_string()))?;
        let points = points
            .trunc()
            .to_u32()
            .ok_or_else(|| FormError::Oracle("price points must be a whole number".to_string()))?;
        if points < 2 {
            return Err(FormError::Oracle(
                "price points must be at least 2".to_string(),
            ));
        }
        let ratio = geometric_ratio(min, max, points).ok_or_else(|| {
            FormError::Oracle(format!("no geometric ratio for [{min},{max}] x{points}"))
        })?;
        Ok((points, ratio))
    }
}

fn geometric_midpoint(min: Decimal, max: Decimal) -> Option<Decimal> {
    let product = (min * max).to_f64()?;
    if product <= 0.0 || !product.is_finite() {
        return None;
    }
    Decimal::from_f64(product.sqrt())
}

#[async_trait]
impl RequirementOracle for GeometricOracle {
    async fn get_requirements(&self, params: &LadderParams) -> FormResult<KandelRequirements> {
        self.compute(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params() -> LadderParams {
        LadderParams {
            min_price: dec!(100),
            max_price: dec!(200),
            mid_price: Some(dec!(150)),
            price_points: Some(dec!(5)),
            ratio: None,
            step_size: Some(dec!(1)),
            changing_from: Some(FieldId::PricePoints),
        }
    }

    #[tokio::test]
    async fn point_count_dictates_ratio() {
        let oracle = GeometricOracle::default();
        let req = oracle.get_requirements(&params()).await.unwrap();
        assert_eq!(req.price_points, 5);
        // 2^(1/4)
        assert_eq!(req.price_ratio, dec!(1.18920712));
        assert_eq!(req.distribution.rung_count(), 5);
        assert_eq!(req.offers_with_prices.len(), 5);
    }

    #[tokio::test]
    async fn ratio_dictates_point_count_when_changing_from_ratio() {
        let mut p = params();
        p.changing_from = Some(FieldId::Ratio);
        p.ratio = Some(dec!(1.19));
        p.price_points = None;

        let oracle = GeometricOracle::default();
        let req = oracle.get_requirements(&p).await.unwrap();
        // ln(2)/ln(1.19) ~ 3.98 -> 3 whole steps -> 4 rungs.
        assert_eq!(req.price_points, 4);
    }

    #[tokio::test]
    async fn deposits_split_around_mid_price() {
        let oracle = GeometricOracle::default();
        let req = oracle.get_requirements(&params()).await.unwrap();
        // Rungs: 100, ~118.92, ~141.42 below mid; ~168.18, 200 at/above.
        assert_eq!(req.distribution.bids.len(), 3);
        assert_eq!(req.distribution.asks.len(), 2);
        assert_eq!(req.required_base, dec!(2));
        let quote_sum: Decimal = req.distribution.bids.iter().map(|r| r.gives).sum();
        assert_eq!(req.required_quote, quote_sum);
        assert!(req.required_quote > dec!(360), "{}", req.required_quote);
        assert_eq!(req.required_bounty, dec!(0.10));
    }

    #[tokio::test]
    async fn invalid_range_is_an_oracle_error() {
        let mut p = params();
        p.max_price = dec!(50);
        let oracle = GeometricOracle::default();
        let err = oracle.get_requirements(&p).await.unwrap_err();
        assert!(err.to_string().contains("max price"));
    }

    #[tokio::test]
    async fn too_few_points_is_an_oracle_error() {
        let mut p = params();
        p.price_points = Some(dec!(1));
        p.step_size = None;
        let oracle = GeometricOracle::default();
        let err = oracle.get_requirements(&p).await.unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }

    #[tokio::test]
    async fn oversized_step_is_an_oracle_error() {
        let mut p = params();
        p.step_size = Some(dec!(5));
        let oracle = GeometricOracle::default();
        let err = oracle.get_requirements(&p).await.unwrap_err();
        assert!(err.to_string().contains("step size"));
    }

    #[tokio::test]
    async fn missing_mid_price_falls_back_to_geometric_midpoint() {
        let mut p = params();
        p.mid_price = None;
        let oracle = GeometricOracle::default();
        let req = oracle.get_requirements(&p).await.unwrap();
        // sqrt(100*200) ~ 141.42; rungs 100, 118.92 below it.
        assert_eq!(req.distribution.bids.len(), 2);
        assert_eq!(req.distribution.asks.len(), 3);
    }
}
