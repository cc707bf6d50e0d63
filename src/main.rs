use std::sync::Arc;

use rust_decimal_macros::dec;

use kandel_form::form::runtime::{FormEvent, FormRuntime};
use kandel_form::ladder::requirements::GeometricOracle;
use kandel_form::market::{Market, Token};
use kandel_form::{config, ops, FieldId, FormResult};

/// Scripted form session against the local oracle; mostly useful for
/// eyeballing log output and snapshot contents during development.
#[tokio::main]
async fn main() -> FormResult<()> {
    let cfg = config::load_config()?;
    ops::logging::init(&cfg.infra.log_level);

    tracing::info!(
        target: "boot",
        debounce_ms = cfg.form.debounce_ms,
        "kandel-form starting"
    );

    let market = Market {
        base: Token::new("WETH", 18),
        quote: Token::new("USDC", 6),
    };
    let oracle = Arc::new(GeometricOracle::new(cfg.oracle.clone()));
    let (runtime, handle) = FormRuntime::new(cfg.form.clone(), market, oracle);
    let task = tokio::spawn(runtime.run());

    handle
        .events
        .send(FormEvent::MidPriceChanged(Some(dec!(1500))))
        .await
        .map_err(|e| kandel_form::FormError::Other(e.to_string()))?;
    for (id, raw) in [
        (FieldId::MinPrice, "1000"),
        (FieldId::MaxPrice, "2000"),
        (FieldId::PricePoints, "8"),
    ] {
        handle
            .events
            .send(FormEvent::FieldEdited {
                id,
                raw: raw.to_string(),
            })
            .await
            .map_err(|e| kandel_form::FormError::Other(e.to_string()))?;
    }

    let mut snapshot_rx = handle.snapshot.clone();
    let snapshot = snapshot_rx
        .wait_for(|s| s.requirements.is_some() || s.global_error.is_some())
        .await
        .map_err(|e| kandel_form::FormError::Other(e.to_string()))?
        .clone();

    match (&snapshot.requirements, &snapshot.global_error) {
        (Some(req), _) => tracing::info!(
            target: "boot",
            ratio = %req.price_ratio,
            points = req.price_points,
            base = %req.required_base,
            quote = %req.required_quote,
            bounty = %req.required_bounty,
            "quote received"
        ),
        (None, Some(err)) => tracing::error!(target: "boot", error = %err, "quote failed"),
        (None, None) => {}
    }

    handle
        .events
        .send(FormEvent::Shutdown)
        .await
        .map_err(|e| kandel_form::FormError::Other(e.to_string()))?;
    task.await
        .map_err(|e| kandel_form::FormError::Other(e.to_string()))?;
    Ok(())
}
