//! Error types.
//!
//! Nothing in the integration loop returns these: a run that does not reach its final time is
//! reported through [`IntegrationResult::failed`](crate::IntegrationResult::failed). They exist for
//! callers who validate their configuration up front or who prefer to propagate an incomplete run
//! with `?`.

use crate::Float;

/// Out-of-range controller settings, reported by [`Settings::validate`](crate::Settings::validate).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("tolerance must be finite and non-negative (got {0})")]
    InvalidTolerance(f64),
    #[error("expansion cap must be finite and at least 1 (got {0})")]
    InvalidExpansionCap(f64),
    #[error("reduction margin must lie in (0, 1] (got {0})")]
    InvalidReductionMargin(f64),
}

/// An integration that stopped before its final time.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum IntegrationError<F: Float> {
    #[error("step budget of {max_steps} exhausted at t = {t} before reaching t = {t_final}")]
    StepBudgetExhausted { t: F, t_final: F, max_steps: usize },
}
