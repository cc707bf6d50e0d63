pub mod distribution;
pub mod requirements;
