pub mod config;
pub mod error;
pub mod form;
pub mod ladder;
pub mod market;
pub mod ops;
pub mod orders;

pub use config::{load_config, AppConfig, FormConfig, OracleConfig};
pub use error::{FormError, FormResult};
pub use form::engine::{FormEngine, RequirementsRequest};
pub use form::fields::{FieldId, FieldSet, FieldValue, Origin};
pub use form::runtime::{FormEvent, FormHandle, FormRuntime, FormSnapshot};
pub use form::validate::ErrorMap;
pub use ladder::distribution::{GeometricDistribution, OfferRung};
pub use ladder::requirements::{
    GeometricOracle, KandelRequirements, LadderParams, RequirementOracle,
};
pub use market::{Balances, Market, Token};
