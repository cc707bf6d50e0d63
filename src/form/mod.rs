pub mod engine;
pub mod fields;
pub mod numbers;
pub mod runtime;
pub mod validate;
