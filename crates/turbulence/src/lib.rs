//! Deterministic fault injection and per-instance variation sampling for
//! Tempest scenario runs.

pub mod engine;
pub mod error;
pub mod variation;

pub use engine::{apply_timing_variation, AttemptOutcome, TurbulenceEngine};
pub use error::TurbulenceError;
pub use variation::VariationEngine;
