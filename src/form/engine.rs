use rust_decimal::Decimal;

use crate::config::FormConfig;
use crate::form::fields::{FieldId, FieldSet, Origin};
use crate::form::numbers::{format_fixed, price_difference_percentage, price_from_percentage};
use crate::form::validate::{self, ErrorMap};
use crate::ladder::distribution::GeometricDistribution;
use crate::ladder::requirements::{KandelRequirements, LadderParams};
use crate::market::{Balances, Market};

/// A debounced oracle request stamped with its sequence number. The engine
/// only ever honors the response carrying the latest issued sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementsRequest {
    pub seq: u64,
    pub params: LadderParams,
}

/// Single-writer state of one strategy-creation form session.
///
/// Every mutation happens synchronously inside one of the `set_*`/`on_*`
/// calls below; the only asynchronous boundary is the requirement oracle,
/// driven through [`FormEngine::poll_request`] and
/// [`FormEngine::on_requirements`] with an explicit millisecond clock so the
/// debounce and supersede rules are testable without timers.
#[derive(Debug)]
pub struct FormEngine {
    cfg: FormConfig,
    market: Market,

    fields: FieldSet,
    origin: Option<Origin>,

    mid_price: Option<Decimal>,
    balances: Balances,

    requirements: Option<KandelRequirements>,
    distribution: Option<GeometricDistribution>,
    errors: ErrorMap,
    global_error: Option<String>,

    debounce_deadline_ms: Option<i64>,
    issued_seq: u64,
    last_params: Option<LadderParams>,
}

impl FormEngine {
    pub fn new(cfg: FormConfig, market: Market) -> Self {
        let mut fields = FieldSet::default();
        fields.price_points.set(cfg.default_price_points.to_string());
        fields.step_size.set(cfg.default_step_size.to_string());

        Self {
            cfg,
            market,
            fields,
            origin: None,
            mid_price: None,
            balances: Balances::default(),
            requirements: None,
            distribution: None,
            errors: ErrorMap::new(),
            global_error: None,
            debounce_deadline_ms: None,
            issued_seq: 0,
            last_params: None,
        }
    }

    /// A direct user edit. Claims the origin, derives the non-origin
    /// fields, re-evaluates validation and (for oracle inputs) arms the
    /// debounce window.
    pub fn set_field(&mut self, id: FieldId, raw: &str, now_ms: i64) {
        // A lone minus sign is a keystroke on the way to a negative
        // percentage, not an edit; ignore it before touching the origin.
        if id.is_percentage() && raw.trim() == "-" {
            return;
        }

        self.fields.get_mut(id).set(raw);
        self.origin = Some(Origin::Field(id));

        if id.is_percentage() {
            self.derive_price_from_percentage(id);
        }

        if id.is_debounced() {
            self.arm_debounce(now_ms);
        }

        self.recompute_derived();
        self.revalidate();
    }

    /// Atomic min/max update from the range chart. Neither price field is
    /// the typed source, so the origin is the chart sentinel and both
    /// percentages may be rederived together.
    pub fn set_price_range_from_chart(&mut self, min: Decimal, max: Decimal, now_ms: i64) {
        if min <= Decimal::ZERO || max <= Decimal::ZERO {
            return;
        }
        let decimals = self.market.price_decimals();
        self.fields.min_price.set(format_fixed(min, decimals));
        self.fields.max_price.set(format_fixed(max, decimals));
        self.origin = Some(Origin::Chart);

        self.arm_debounce(now_ms);
        self.recompute_derived();
        self.revalidate();
    }

    /// Mid-price tick from the market feed. Read-only input: it never
    /// claims the origin, it only refreshes derived percentages.
    pub fn on_mid_price(&mut self, mid: Option<Decimal>) {
        self.mid_price = mid;
        self.recompute_derived();
        self.revalidate();
    }

    /// Wallet balance refresh. Read-only input, revalidates deposits.
    pub fn on_balances(&mut self, balances: Balances) {
        self.balances = balances;
        self.revalidate();
    }

    /// Fires at most one oracle request per quiescent debounce window, and
    /// only when the price range is complete. An armed window whose
    /// parameters match the last issued snapshot is swallowed.
    pub fn poll_request(&mut self, now_ms: i64) -> Option<RequirementsRequest> {
        let deadline = self.debounce_deadline_ms?;
        if now_ms < deadline {
            return None;
        }
        self.debounce_deadline_ms = None;

        let params = self.ladder_params()?;
        if self.last_params.as_ref() == Some(&params) {
            tracing::debug!(target: "form_engine", "ladder snapshot unchanged; skipping refetch");
            return None;
        }

        self.issued_seq += 1;
        self.last_params = Some(params.clone());
        tracing::debug!(
            target: "form_engine",
            seq = self.issued_seq,
            min = %params.min_price,
            max = %params.max_price,
            "issuing requirement request"
        );
        Some(RequirementsRequest {
            seq: self.issued_seq,
            params,
        })
    }

    /// Applies an oracle response, last-write-wins by sequence number:
    /// anything but the latest issued sequence is discarded regardless of
    /// arrival order. Failures surface as a single global error and leave
    /// every derived field untouched.
    pub fn on_requirements(
        &mut self,
        seq: u64,
        result: Result<KandelRequirements, crate::error::FormError>,
    ) {
        if seq != self.issued_seq {
            tracing::debug!(
                target: "form_engine",
                seq,
                latest = self.issued_seq,
                "discarding superseded oracle response"
            );
            return;
        }

        let requirements = match result {
            Ok(requirements) => requirements,
            Err(err) => {
                tracing::warn!(target: "form_engine", error = %err, "requirement oracle failed");
                self.global_error = Some(err.to_string());
                return;
            }
        };

        self.global_error = None;

        if self.origin != Some(Origin::Field(FieldId::Ratio)) {
            self.fields.ratio.set(format_fixed(
                requirements.price_ratio,
                self.cfg.ratio_display_decimals,
            ));
        }
        if self.origin != Some(Origin::Field(FieldId::PricePoints))
            && self.fields.price_points.parsed() != Some(Decimal::from(requirements.price_points))
        {
            self.fields
                .price_points
                .set(requirements.price_points.to_string());
        }

        self.distribution = Some(requirements.distribution.clone());
        self.requirements = Some(requirements);
        self.revalidate();
    }

    /* ---------- Read side ---------- */

    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn global_error(&self) -> Option<&str> {
        self.global_error.as_deref()
    }

    pub fn requirements(&self) -> Option<&KandelRequirements> {
        self.requirements.as_ref()
    }

    /// Latest oracle distribution, for the shared chart sink.
    pub fn distribution(&self) -> Option<&GeometricDistribution> {
        self.distribution.as_ref()
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        self.mid_price
    }

    /// Deposit and grid fields stay disabled until a price range exists.
    pub fn fields_disabled(&self) -> bool {
        self.fields.min_price.is_empty() || self.fields.max_price.is_empty()
    }

    /* ---------- Internal ---------- */

    fn arm_debounce(&mut self, now_ms: i64) {
        self.debounce_deadline_ms = Some(now_ms + self.cfg.debounce_ms as i64);
    }

    /// One derivation pass: percentages follow prices on the non-origin
    /// side only. The origin field is never overwritten, so a second pass
    /// with no new input is a no-op.
    fn recompute_derived(&mut self) {
        let Some(mid) = self.mid_price else {
            return;
        };

        if self.origin != Some(Origin::Field(FieldId::MinPercentage)) {
            if let Some(min_price) = self.fields.min_price.parsed() {
                if let Some(pct) = price_difference_percentage(min_price, mid) {
                    self.fields
                        .min_percentage
                        .set(format_fixed(pct, self.cfg.percentage_display_decimals));
                }
            }
        }

        if self.origin != Some(Origin::Field(FieldId::MaxPercentage)) {
            if let Some(max_price) = self.fields.max_price.parsed() {
                if let Some(pct) = price_difference_percentage(max_price, mid) {
                    self.fields
                        .max_percentage
                        .set(format_fixed(pct, self.cfg.percentage_display_decimals));
                }
            }
        }
    }

    /// The inverse derivation, applied only while the percentage itself is
    /// the origin (the edit that just happened). Empty or unparsable input
    /// derives nothing; the price keeps its last value.
    fn derive_price_from_percentage(&mut self, id: FieldId) {
        let Some(mid) = self.mid_price else {
            return;
        };
        let Some(pct) = self.fields.get(id).parsed() else {
            return;
        };
        let Some(price) = price_from_percentage(pct, mid) else {
            return;
        };
        let formatted = format_fixed(price, self.market.price_decimals());
        match id {
            FieldId::MinPercentage => self.fields.min_price.set(formatted),
            FieldId::MaxPercentage => self.fields.max_price.set(formatted),
            _ => {}
        }
    }

    fn ladder_params(&self) -> Option<LadderParams> {
        let min_price = self.fields.min_price.parsed()?;
        let max_price = self.fields.max_price.parsed()?;
        Some(LadderParams {
            min_price,
            max_price,
            mid_price: self.mid_price,
            price_points: self.fields.price_points.parsed(),
            ratio: self.fields.ratio.parsed(),
            step_size: self.fields.step_size.parsed(),
            changing_from: match self.origin {
                Some(Origin::Field(id)) => Some(id),
                Some(Origin::Chart) | None => None,
            },
        })
    }

    fn revalidate(&mut self) {
        self.errors = validate::evaluate(
            &self.fields,
            &self.balances,
            self.requirements.as_ref(),
            &self.cfg,
        );
    }
}
