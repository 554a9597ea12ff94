use thiserror::Error;

/// Errors surfaced by fault injection itself, as distinct from the
/// Observations the underlying action produces (those are never errors —
/// a failed HTTP call is still a successful Observation with `ok: false`).
#[derive(Debug, Error)]
pub enum TurbulenceError {
    #[error("wrapped action produced no observation before the turbulence loop completed")]
    NoObservation,
}
