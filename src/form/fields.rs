use std::str::FromStr;

use rust_decimal::Decimal;

/// Every directly editable input of the strategy-creation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    MinPrice,
    MinPercentage,
    MaxPrice,
    MaxPercentage,
    BaseDeposit,
    QuoteDeposit,
    PricePoints,
    Ratio,
    StepSize,
    BountyDeposit,
}

impl FieldId {
    /// Inputs that feed the requirement oracle. Edits to these arm the
    /// debounce window; deposit edits never trigger a refetch.
    pub fn is_debounced(self) -> bool {
        matches!(
            self,
            FieldId::MinPrice
                | FieldId::MinPercentage
                | FieldId::MaxPrice
                | FieldId::MaxPercentage
                | FieldId::PricePoints
                | FieldId::Ratio
                | FieldId::StepSize
        )
    }

    pub fn is_percentage(self) -> bool {
        matches!(self, FieldId::MinPercentage | FieldId::MaxPercentage)
    }
}

/// Which side of the form is authoritative for the current recomputation
/// pass. `Chart` covers atomic min/max updates from a range drag, where
/// neither price field is the user-typed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Field(FieldId),
    Chart,
}

impl Origin {
    pub fn is_field(self, id: FieldId) -> bool {
        self == Origin::Field(id)
    }
}

/// One form input: the raw text as typed, parsed on demand. Partial input
/// ("1.", "-", "") simply parses to `None`; it never poisons derived state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldValue {
    raw: String,
}

impl FieldValue {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn set(&mut self, raw: impl Into<String>) {
        self.raw = raw.into();
    }

    pub fn is_empty(&self) -> bool {
        self.raw.trim().is_empty()
    }

    pub fn parsed(&self) -> Option<Decimal> {
        let trimmed = self.raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Decimal::from_str(trimmed).ok()
    }
}

/// The mutually-derivable fields of one form session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet {
    pub min_price: FieldValue,
    pub min_percentage: FieldValue,
    pub max_price: FieldValue,
    pub max_percentage: FieldValue,
    pub base_deposit: FieldValue,
    pub quote_deposit: FieldValue,
    pub price_points: FieldValue,
    pub ratio: FieldValue,
    pub step_size: FieldValue,
    pub bounty_deposit: FieldValue,
}

impl FieldSet {
    pub fn get(&self, id: FieldId) -> &FieldValue {
        match id {
            FieldId::MinPrice => &self.min_price,
            FieldId::MinPercentage => &self.min_percentage,
            FieldId::MaxPrice => &self.max_price,
            FieldId::MaxPercentage => &self.max_percentage,
            FieldId::BaseDeposit => &self.base_deposit,
            FieldId::QuoteDeposit => &self.quote_deposit,
            FieldId::PricePoints => &self.price_points,
            FieldId::Ratio => &self.ratio,
            FieldId::StepSize => &self.step_size,
            FieldId::BountyDeposit => &self.bounty_deposit,
        }
    }

    pub fn get_mut(&mut self, id: FieldId) -> &mut FieldValue {
        match id {
            FieldId::MinPrice => &mut self.min_price,
            FieldId::MinPercentage => &mut self.min_percentage,
            FieldId::MaxPrice => &mut self.max_price,
            FieldId::MaxPercentage => &mut self.max_percentage,
            FieldId::BaseDeposit => &mut self.base_deposit,
            FieldId::QuoteDeposit => &mut self.quote_deposit,
            FieldId::PricePoints => &mut self.price_points,
            FieldId::Ratio => &mut self.ratio,
            FieldId::StepSize => &mut self.step_size,
            FieldId::BountyDeposit => &mut self.bounty_deposit,
        }
    }
}
