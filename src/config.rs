use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::Figment;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{FormError, FormResult};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub form: FormConfig,
    pub oracle: OracleConfig,
    pub infra: InfraConfig,
}

impl AppConfig {
    pub fn validate(&self) -> FormResult<()> {
        self.form.validate()?;
        self.oracle.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FormConfig {
    /// Quiescence window before ladder parameters are sent to the oracle.
    pub debounce_ms: u64,
    /// How often the runtime checks whether the debounce window has elapsed.
    pub poll_interval_ms: u64,

    pub min_price_points: u32,
    pub min_ratio: Decimal,
    pub min_step_size: u32,

    /// Seeded into a fresh form; the oracle feedback overwrites them later.
    pub default_price_points: u32,
    pub default_step_size: u32,

    pub ratio_display_decimals: u32,
    pub percentage_display_decimals: u32,

    /// Rung count of the local chart preview (the oracle reports the real one).
    pub preview_points: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            poll_interval_ms: 50,
            min_price_points: 2,
            min_ratio: dec!(1.001),
            min_step_size: 1,
            default_price_points: 10,
            default_step_size: 1,
            ratio_display_decimals: 4,
            percentage_display_decimals: 2,
            preview_points: 5,
        }
    }
}

impl FormConfig {
    pub fn validate(&self) -> FormResult<()> {
        if self.debounce_ms == 0 {
            return Err(FormError::Config(
                "form.debounce_ms must be > 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > self.debounce_ms {
            return Err(FormError::Config(format!(
                "form.poll_interval_ms must be in [1,{}], got {}",
                self.debounce_ms, self.poll_interval_ms
            )));
        }
        if self.min_price_points < 2 {
            return Err(FormError::Config(format!(
                "form.min_price_points must be >=2, got {}",
                self.min_price_points
            )));
        }
        if self.min_ratio <= Decimal::ONE {
            return Err(FormError::Config(format!(
                "form.min_ratio must be > 1, got {}",
                self.min_ratio
            )));
        }
        if self.min_step_size == 0 {
            return Err(FormError::Config(
                "form.min_step_size must be >=1".to_string(),
            ));
        }
        if self.default_price_points < self.min_price_points {
            return Err(FormError::Config(format!(
                "form.default_price_points ({}) must be >= form.min_price_points ({})",
                self.default_price_points, self.min_price_points
            )));
        }
        if self.preview_points < 2 {
            return Err(FormError::Config(format!(
                "form.preview_points must be >=2, got {}",
                self.preview_points
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Base amount each ask rung gives; bid rungs give `ask_gives * price` in quote.
    pub ask_gives: Decimal,
    /// Native-token provision reserved per rung for offer bounties.
    pub bounty_per_offer: Decimal,
    /// Scale of computed rung prices and ratios.
    pub price_decimals: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            ask_gives: dec!(1),
            bounty_per_offer: dec!(0.02),
            price_decimals: 8,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> FormResult<()> {
        if self.ask_gives <= Decimal::ZERO {
            return Err(FormError::Config(format!(
                "oracle.ask_gives must be > 0, got {}",
                self.ask_gives
            )));
        }
        if self.bounty_per_offer < Decimal::ZERO {
            return Err(FormError::Config(format!(
                "oracle.bounty_per_offer must be >= 0, got {}",
                self.bounty_per_offer
            )));
        }
        if self.price_decimals > 28 {
            return Err(FormError::Config(format!(
                "oracle.price_decimals must be <= 28, got {}",
                self.price_decimals
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InfraConfig {
    pub log_level: String,
}

impl Default for InfraConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

pub fn load_config() -> FormResult<AppConfig> {
    let figment = build_figment_from_env()?;
    load_config_from(figment)
}

fn build_figment_from_env() -> FormResult<Figment> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Ok(path) = std::env::var("KANDEL_CONFIG_PATH") {
        figment = merge_config_file(figment, &path)?;
    }

    figment = figment.merge(Env::prefixed("KANDEL_").split("__"));
    Ok(figment)
}

fn merge_config_file(figment: Figment, path: &str) -> FormResult<Figment> {
    let p = Path::new(path);
    match p.extension().and_then(|s| s.to_str()) {
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        Some("json") => Ok(figment.merge(Json::file(path))),
        _ => Err(FormError::Config(format!(
            "unsupported config file extension for KANDEL_CONFIG_PATH: {path} (expected .toml or .json)"
        ))),
    }
}

fn load_config_from(figment: Figment) -> FormResult<AppConfig> {
    let cfg: AppConfig = figment
        .extract()
        .map_err(|e| FormError::Config(e.to_string()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    #[test]
    fn defaults_load() {
        let cfg =
            load_config_from(Figment::from(Serialized::defaults(AppConfig::default()))).unwrap();
        assert_eq!(cfg.form.debounce_ms, 300);
        assert_eq!(cfg.form.min_price_points, 2);
        assert_eq!(cfg.form.min_ratio, dec!(1.001));
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let cfg = FormConfig {
            debounce_ms: 0,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("form.debounce_ms"), "{msg}");
    }

    #[test]
    fn poll_interval_must_fit_inside_debounce_window() {
        let cfg = FormConfig {
            poll_interval_ms: 500,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("form.poll_interval_ms"), "{msg}");
    }

    #[test]
    fn min_ratio_must_exceed_one() {
        let cfg = FormConfig {
            min_ratio: dec!(1),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("form.min_ratio"));
    }

    #[test]
    fn non_positive_ask_gives_is_rejected() {
        let cfg = OracleConfig {
            ask_gives: dec!(0),
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("oracle.ask_gives"));
    }
}
