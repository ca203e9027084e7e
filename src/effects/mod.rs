pub mod chain;

pub use chain::{EffectChain, PARAM_RAMP_SECONDS, delay_time_seconds};
