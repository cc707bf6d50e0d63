use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, Instant};

use crate::config::FormConfig;
use crate::error::FormResult;
use crate::form::engine::FormEngine;
use crate::form::fields::FieldId;
use crate::form::validate::ErrorMap;
use crate::ladder::distribution::{preview_distribution, GeometricDistribution};
use crate::ladder::requirements::{KandelRequirements, RequirementOracle};
use crate::market::{Balances, Market};

const EVENT_BUFFER: usize = 256;

/// Everything that can happen to a form session. External callers send the
/// first four; `RequirementsResolved` is the loopback carrying a finished
/// oracle call back onto the single writer.
#[derive(Debug)]
pub enum FormEvent {
    FieldEdited { id: FieldId, raw: String },
    PriceRangeDragged { min: Decimal, max: Decimal },
    MidPriceChanged(Option<Decimal>),
    BalancesChanged(Balances),
    RequirementsResolved {
        seq: u64,
        result: FormResult<KandelRequirements>,
    },
    Shutdown,
}

/// Point-in-time view of the form, published after every state change.
/// Consumers watching the channel only ever see the latest value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    pub fields: crate::form::fields::FieldSet,
    pub errors: ErrorMap,
    pub global_error: Option<String>,
    pub requirements: Option<KandelRequirements>,
    pub fields_disabled: bool,
    pub mid_price: Option<Decimal>,
}

/// Sender half handed to the UI layer: an event queue plus the two
/// read-side sinks.
#[derive(Debug, Clone)]
pub struct FormHandle {
    pub events: mpsc::Sender<FormEvent>,
    pub snapshot: watch::Receiver<FormSnapshot>,
    pub distribution: watch::Receiver<GeometricDistribution>,
}

/// Owns the [`FormEngine`] and is its only writer. Oracle calls run as
/// spawned tasks so a slow quote never blocks typing; their results come
/// back through the same event queue and are applied (or discarded as
/// superseded) in arrival order.
pub struct FormRuntime {
    engine: FormEngine,
    oracle: Arc<dyn RequirementOracle>,
    cfg: FormConfig,
    rx_events: mpsc::Receiver<FormEvent>,
    tx_events: mpsc::Sender<FormEvent>,
    tx_snapshot: watch::Sender<FormSnapshot>,
    tx_distribution: watch::Sender<GeometricDistribution>,
    started: Instant,
}

impl FormRuntime {
    pub fn new(
        cfg: FormConfig,
        market: Market,
        oracle: Arc<dyn RequirementOracle>,
    ) -> (Self, FormHandle) {
        let (tx_events, rx_events) = mpsc::channel(EVENT_BUFFER);
        let (tx_snapshot, rx_snapshot) = watch::channel(FormSnapshot::default());
        let (tx_distribution, rx_distribution) = watch::channel(GeometricDistribution::default());

        let runtime = Self {
            engine: FormEngine::new(cfg.clone(), market),
            oracle,
            cfg,
            rx_events,
            tx_events: tx_events.clone(),
            tx_snapshot,
            tx_distribution,
            started: Instant::now(),
        };
        let handle = FormHandle {
            events: tx_events,
            snapshot: rx_snapshot,
            distribution: rx_distribution,
        };
        (runtime, handle)
    }

    pub async fn run(mut self) {
        tracing::info!(
            target: "form_runtime",
            debounce_ms = self.cfg.debounce_ms,
            "form runtime started"
        );
        let mut ticker = interval(Duration::from_millis(self.cfg.poll_interval_ms));
        self.publish();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_oracle();
                }
                event = self.rx_events.recv() => {
                    match event {
                        Some(FormEvent::Shutdown) | None => break,
                        Some(event) => self.handle_event(event),
                    }
                }
            }
            self.publish();
        }
        tracing::info!(target: "form_runtime", "form runtime stopped");
    }

    fn now_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn handle_event(&mut self, event: FormEvent) {
        match event {
            FormEvent::FieldEdited { id, raw } => {
                self.engine.set_field(id, &raw, self.now_ms());
            }
            FormEvent::PriceRangeDragged { min, max } => {
                self.engine.set_price_range_from_chart(min, max, self.now_ms());
            }
            FormEvent::MidPriceChanged(mid) => {
                self.engine.on_mid_price(mid);
            }
            FormEvent::BalancesChanged(balances) => {
                self.engine.on_balances(balances);
            }
            FormEvent::RequirementsResolved { seq, result } => {
                self.engine.on_requirements(seq, result);
            }
            FormEvent::Shutdown => {}
        }
    }

    fn poll_oracle(&mut self) {
        let Some(request) = self.engine.poll_request(self.now_ms()) else {
            return;
        };
        let oracle = Arc::clone(&self.oracle);
        let tx = self.tx_events.clone();
        tokio::spawn(async move {
            let result = oracle.get_requirements(&request.params).await;
            // Runtime gone means nobody cares about the answer anymore.
            let _ = tx
                .send(FormEvent::RequirementsResolved {
                    seq: request.seq,
                    result,
                })
                .await;
        });
    }

    fn publish(&self) {
        let snapshot = FormSnapshot {
            fields: self.engine.fields().clone(),
            errors: self.engine.errors().clone(),
            global_error: self.engine.global_error().map(str::to_string),
            requirements: self.engine.requirements().cloned(),
            fields_disabled: self.engine.fields_disabled(),
            mid_price: self.engine.mid_price(),
        };
        self.tx_snapshot.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });

        let distribution = match self.engine.distribution() {
            Some(distribution) => distribution.clone(),
            None => self.preview(),
        };
        self.tx_distribution.send_if_modified(|current| {
            if *current == distribution {
                return false;
            }
            *current = distribution;
            true
        });
    }

    /// Until the oracle has answered, the chart shows a flat local preview
    /// of the range (empty when the range or mid-price is missing).
    fn preview(&self) -> GeometricDistribution {
        let fields = self.engine.fields();
        let (Some(min), Some(max)) = (fields.min_price.parsed(), fields.max_price.parsed()) else {
            return GeometricDistribution::default();
        };
        preview_distribution(min, max, self.engine.mid_price(), self.cfg.preview_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::config::OracleConfig;
    use crate::error::FormError;
    use crate::ladder::requirements::{GeometricOracle, LadderParams};
    use crate::market::Token;

    fn market() -> Market {
        Market {
            base: Token::new("WETH", 18),
            quote: Token::new("USDC", 4),
        }
    }

    fn start(oracle: Arc<dyn RequirementOracle>) -> FormHandle {
        let (runtime, handle) = FormRuntime::new(FormConfig::default(), market(), oracle);
        tokio::spawn(runtime.run());
        handle
    }

    async fn edit(handle: &FormHandle, id: FieldId, raw: &str) {
        handle
            .events
            .send(FormEvent::FieldEdited {
                id,
                raw: raw.to_string(),
            })
            .await
            .unwrap();
    }

    /// Delegates to the local oracle after a per-call delay; the first call
    /// can be made slower than the rest to reorder responses.
    struct DelayedOracle {
        inner: GeometricOracle,
        first_delay: Duration,
        rest_delay: Duration,
        calls: AtomicU64,
    }

    impl DelayedOracle {
        fn new(first_delay: Duration, rest_delay: Duration) -> Self {
            Self {
                inner: GeometricOracle::new(OracleConfig::default()),
                first_delay,
                rest_delay,
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RequirementOracle for DelayedOracle {
        async fn get_requirements(&self, params: &LadderParams) -> FormResult<KandelRequirements> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if call == 0 {
                self.first_delay
            } else {
                self.rest_delay
            };
            tokio::time::sleep(delay).await;
            self.inner.get_requirements(params).await
        }
    }

    /// Errors on the first call, then behaves.
    struct FlakyOracle {
        inner: GeometricOracle,
        calls: AtomicU64,
    }

    impl FlakyOracle {
        fn new() -> Self {
            Self {
                inner: GeometricOracle::new(OracleConfig::default()),
                calls: AtomicU64::new(0),
            }
        }
    }

    #[async_trait]
    impl RequirementOracle for FlakyOracle {
        async fn get_requirements(&self, params: &LadderParams) -> FormResult<KandelRequirements> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(FormError::Oracle("quote backend unreachable".to_string()));
            }
            self.inner.get_requirements(params).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn edits_debounce_into_a_published_quote() {
        let mut handle = start(Arc::new(GeometricOracle::default()));

        handle
            .events
            .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
            .await
            .unwrap();
        edit(&handle, FieldId::MinPrice, "1000").await;
        edit(&handle, FieldId::MaxPrice, "2000").await;

        let snapshot = handle
            .snapshot
            .wait_for(|s| s.requirements.is_some())
            .await
            .unwrap()
            .clone();

        let req = snapshot.requirements.unwrap();
        assert_eq!(req.price_points, 10);
        assert!(!snapshot.fields_disabled);
        // The quote's ratio was fed back into the field.
        assert!(!snapshot.fields.ratio.is_empty());

        let distribution = handle.distribution.borrow().clone();
        assert_eq!(distribution.rung_count(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_is_published_before_any_quote() {
        let slow = Arc::new(DelayedOracle::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let mut handle = start(slow);

        handle
            .events
            .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
            .await
            .unwrap();
        edit(&handle, FieldId::MinPrice, "1000").await;
        edit(&handle, FieldId::MaxPrice, "2000").await;

        let distribution = handle
            .distribution
            .wait_for(|d| d.rung_count() > 0)
            .await
            .unwrap()
            .clone();
        // Local preview: five flat rungs, no amounts.
        assert_eq!(distribution.rung_count(), 5);
        assert!(distribution
            .bids
            .iter()
            .chain(&distribution.asks)
            .all(|r| r.gives == Decimal::ZERO));
        assert!(handle.snapshot.borrow().requirements.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_quote_never_wins() {
        // First call resolves long after the second.
        let oracle = Arc::new(DelayedOracle::new(
            Duration::from_millis(2_000),
            Duration::from_millis(10),
        ));
        let mut handle = start(oracle);

        handle
            .events
            .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
            .await
            .unwrap();
        edit(&handle, FieldId::MinPrice, "1000").await;
        edit(&handle, FieldId::MaxPrice, "2000").await;

        // Let the first debounce window elapse so request #1 is in flight.
        tokio::time::sleep(Duration::from_millis(400)).await;
        edit(&handle, FieldId::PricePoints, "4").await;

        let snapshot = handle
            .snapshot
            .wait_for(|s| s.requirements.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.requirements.unwrap().price_points, 4);

        // Give the slow first answer time to arrive and be discarded.
        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let snapshot = handle.snapshot.borrow().clone();
        assert_eq!(snapshot.requirements.unwrap().price_points, 4);
        assert_eq!(snapshot.fields.price_points.raw(), "4");
    }

    #[tokio::test(start_paused = true)]
    async fn oracle_failure_surfaces_and_clears() {
        let mut handle = start(Arc::new(FlakyOracle::new()));

        handle
            .events
            .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
            .await
            .unwrap();
        edit(&handle, FieldId::MinPrice, "1000").await;
        edit(&handle, FieldId::MaxPrice, "2000").await;

        let snapshot = handle
            .snapshot
            .wait_for(|s| s.global_error.is_some())
            .await
            .unwrap()
            .clone();
        assert!(snapshot
            .global_error
            .unwrap()
            .contains("quote backend unreachable"));

        // Any further grid edit retries and recovers.
        edit(&handle, FieldId::PricePoints, "6").await;
        let snapshot = handle
            .snapshot
            .wait_for(|s| s.requirements.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.global_error, None);
        assert_eq!(snapshot.requirements.unwrap().price_points, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn balances_gate_deposit_errors() {
        let mut handle = start(Arc::new(GeometricOracle::default()));

        edit(&handle, FieldId::BaseDeposit, "10").await;
        handle
            .events
            .send(FormEvent::BalancesChanged(Balances {
                base: Some(dec!(5)),
                ..Default::default()
            }))
            .await
            .unwrap();

        let snapshot = handle
            .snapshot
            .wait_for(|s| s.errors.contains_key(&FieldId::BaseDeposit))
            .await
            .unwrap()
            .clone();
        assert_eq!(
            snapshot.errors.get(&FieldId::BaseDeposit).map(String::as_str),
            Some("Base deposit cannot be greater than wallet balance")
        );

        // A deposit edit alone must not fire the oracle.
        assert!(snapshot.requirements.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn chart_drag_moves_both_prices() {
        let mut handle = start(Arc::new(GeometricOracle::default()));

        handle
            .events
            .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
            .await
            .unwrap();
        handle
            .events
            .send(FormEvent::PriceRangeDragged {
                min: dec!(1200),
                max: dec!(1800),
            })
            .await
            .unwrap();

        let snapshot = handle
            .snapshot
            .wait_for(|s| !s.fields.min_price.is_empty())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.fields.min_price.raw(), "1200.0000");
        assert_eq!(snapshot.fields.max_price.raw(), "1800.0000");
        assert_eq!(snapshot.fields.min_percentage.raw(), "-20.00");
        assert_eq!(snapshot.fields.max_percentage.raw(), "20.00");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_loop() {
        let (runtime, handle) = FormRuntime::new(
            FormConfig::default(),
            market(),
            Arc::new(GeometricOracle::default()),
        );
        let task = tokio::spawn(runtime.run());
        handle.events.send(FormEvent::Shutdown).await.unwrap();
        task.await.unwrap();
    }
}
