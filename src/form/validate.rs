use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::config::FormConfig;
use crate::form::fields::{FieldId, FieldSet, FieldValue};
use crate::ladder::requirements::KandelRequirements;
use crate::market::Balances;

/// Field name -> human-readable message. A valid field has no entry at all,
/// not an empty-string one. `BTreeMap` keeps iteration (and logs) stable.
pub type ErrorMap = BTreeMap<FieldId, String>;

/// Pure rule evaluation; the whole map is rebuilt from scratch on every
/// call, so identical inputs always yield an identical map and every rule
/// clears independently. Nothing here ever blocks typing, only submission.
pub fn evaluate(
    fields: &FieldSet,
    balances: &Balances,
    requirements: Option<&KandelRequirements>,
    cfg: &FormConfig,
) -> ErrorMap {
    let mut errors = ErrorMap::new();

    deposit_rule(
        &mut errors,
        FieldId::BaseDeposit,
        &fields.base_deposit,
        balances.base,
        requirements.map(|r| r.required_base),
        "Base deposit cannot be greater than wallet balance",
        "Base deposit must be greater than 0",
    );
    deposit_rule(
        &mut errors,
        FieldId::QuoteDeposit,
        &fields.quote_deposit,
        balances.quote,
        requirements.map(|r| r.required_quote),
        "Quote deposit cannot be greater than wallet balance",
        "Quote deposit must be greater than 0",
    );
    deposit_rule(
        &mut errors,
        FieldId::BountyDeposit,
        &fields.bounty_deposit,
        balances.native,
        requirements.map(|r| r.required_bounty),
        "Bounty deposit cannot be greater than wallet balance",
        "Bounty deposit must be greater than 0",
    );

    if let Some(points) = fields.price_points.parsed() {
        if points < Decimal::from(cfg.min_price_points) {
            errors.insert(
                FieldId::PricePoints,
                format!("Price points must be at least {}", cfg.min_price_points),
            );
        }
    }

    if let Some(ratio) = fields.ratio.parsed() {
        if ratio < cfg.min_ratio {
            errors.insert(
                FieldId::Ratio,
                format!("Ratio must be at least {}", cfg.min_ratio),
            );
        }
    }

    if let Some(step) = fields.step_size.parsed() {
        // An empty price-points field counts as zero here, same as the form
        // it replaces: any step is "not inferior" to an unset point count.
        let points = fields.price_points.parsed().unwrap_or(Decimal::ZERO);
        if step < Decimal::from(cfg.min_step_size) || step >= points {
            errors.insert(
                FieldId::StepSize,
                "Step size must be at least 1 and inferior to price points".to_string(),
            );
        }
    }

    if let (Some(min), Some(max)) = (fields.min_price.parsed(), fields.max_price.parsed()) {
        if min > max {
            errors.insert(
                FieldId::MinPrice,
                "Min price cannot be greater than max price".to_string(),
            );
        }
        if max < min {
            errors.insert(
                FieldId::MaxPrice,
                "Max price cannot be less than min price".to_string(),
            );
        }
    }

    if let (Some(min), Some(max)) = (
        fields.min_percentage.parsed(),
        fields.max_percentage.parsed(),
    ) {
        if min > max {
            errors.insert(
                FieldId::MinPercentage,
                "Min percentage cannot be greater than max percentage".to_string(),
            );
        }
        if max < min {
            errors.insert(
                FieldId::MaxPercentage,
                "Max percentage cannot be less than min percentage".to_string(),
            );
        }
    }

    errors
}

fn deposit_rule(
    errors: &mut ErrorMap,
    id: FieldId,
    field: &FieldValue,
    balance: Option<Decimal>,
    required: Option<Decimal>,
    over_balance_msg: &str,
    must_be_positive_msg: &str,
) {
    if let (Some(value), Some(balance)) = (field.parsed(), balance) {
        if value > balance {
            errors.insert(id, over_balance_msg.to_string());
            return;
        }
    }
    if let Some(required) = required {
        // An empty deposit is a zero deposit as far as funding goes.
        let value = field.parsed().unwrap_or(Decimal::ZERO);
        if required > Decimal::ZERO && value == Decimal::ZERO {
            errors.insert(id, must_be_positive_msg.to_string());
        }
    }
}
