use num_traits::cast;
use serde::{Deserialize, Serialize};

use crate::{
    Float, IntegrationResult, SettingsError, StageEvaluator, State, StepController, StepDecision,
    System, Tableau, stage::SystemEvaluationCounter,
};

/// Parameters of the adaptive step-size controller.
///
/// These are numeric inputs the integrator trusts as given; [`Self::validate`] is available to
/// whoever produces them. The type is serde-compatible so that settings can be read from any
/// serde format by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings<F> {
    /// Desired global error, distributed over the steps in proportion to their size.
    pub tol: F,
    /// Maximum number of attempted (accepted or rejected) steps.
    pub max_steps: usize,
    /// Largest factor by which a single accepted step may grow the step size.
    pub expansion_cap: F,
    /// Safety factor applied when shrinking the step after a rejection.
    pub reduction_margin: F,
    /// Accept a step that fails the error test if the step size is already at its minimum.
    pub accept_at_minimum_step: bool,
}

impl<F: Float> Default for Settings<F> {
    fn default() -> Self {
        Self {
            tol: cast(1e-6).unwrap(),
            max_steps: 2000,
            expansion_cap: cast(2.).unwrap(),
            reduction_margin: cast(0.95).unwrap(),
            accept_at_minimum_step: false,
        }
    }
}

impl<F: Float> Settings<F> {
    /// Set the desired global error.
    pub fn with_tol(self, tol: F) -> Self {
        Self { tol, ..self }
    }
    /// Set the maximum number of attempted steps.
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        Self { max_steps, ..self }
    }
    /// Set the largest single-step growth factor.
    pub fn with_expansion_cap(self, expansion_cap: F) -> Self {
        Self {
            expansion_cap,
            ..self
        }
    }
    /// Set the safety factor used when shrinking.
    pub fn with_reduction_margin(self, reduction_margin: F) -> Self {
        Self {
            reduction_margin,
            ..self
        }
    }
    /// Allow accepting steps that fail the error test at the minimum step size.
    pub fn with_minimum_step_acceptance(self, accept_at_minimum_step: bool) -> Self {
        Self {
            accept_at_minimum_step,
            ..self
        }
    }

    /// Check that the settings are in range.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let as_f64 = |value: F| value.to_f64().unwrap_or(f64::NAN);
        if !(self.tol.is_finite() && self.tol >= F::zero()) {
            return Err(SettingsError::InvalidTolerance(as_f64(self.tol)));
        }
        if !(self.expansion_cap.is_finite() && self.expansion_cap >= F::one()) {
            return Err(SettingsError::InvalidExpansionCap(as_f64(
                self.expansion_cap,
            )));
        }
        if !(self.reduction_margin > F::zero() && self.reduction_margin <= F::one()) {
            return Err(SettingsError::InvalidReductionMargin(as_f64(
                self.reduction_margin,
            )));
        }
        Ok(())
    }
}

/// Smallest step size used when integrating over an interval of length `span`.
pub fn minimum_step_size<F: Float>(span: F) -> F {
    cast::<_, F>(100.).unwrap() * F::epsilon() * span.abs()
}

/// An adaptive integrator driving an embedded Runge-Kutta pair from an initial to a final time.
#[derive(Clone, Debug)]
pub struct Integrator<'t, F: Float, const N: usize> {
    tableau: &'t Tableau<N>,
    settings: Settings<F>,
}

impl<'t, F: Float, const N: usize> Integrator<'t, F, N> {
    /// Make an integrator with default [`Settings`].
    pub fn new(tableau: &'t Tableau<N>) -> Self {
        Self {
            tableau,
            settings: Settings::default(),
        }
    }

    /// Replace all settings at once.
    pub fn with_settings(self, settings: Settings<F>) -> Self {
        Self { settings, ..self }
    }
    /// Set the desired global error.
    pub fn with_tol(self, tol: F) -> Self {
        self.map_settings(|settings| settings.with_tol(tol))
    }
    /// Set the maximum number of attempted steps.
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        self.map_settings(|settings| settings.with_max_steps(max_steps))
    }
    /// Set the largest single-step growth factor.
    pub fn with_expansion_cap(self, expansion_cap: F) -> Self {
        self.map_settings(|settings| settings.with_expansion_cap(expansion_cap))
    }
    /// Set the safety factor used when shrinking.
    pub fn with_reduction_margin(self, reduction_margin: F) -> Self {
        self.map_settings(|settings| settings.with_reduction_margin(reduction_margin))
    }
    /// Allow accepting steps that fail the error test at the minimum step size.
    pub fn with_minimum_step_acceptance(self, accept_at_minimum_step: bool) -> Self {
        self.map_settings(|settings| settings.with_minimum_step_acceptance(accept_at_minimum_step))
    }

    pub fn settings(&self) -> &Settings<F> {
        &self.settings
    }

    pub fn tableau(&self) -> &'t Tableau<N> {
        self.tableau
    }

    /// Integrate `system` from `(t_initial, y0)` to `t_final`, starting with step size
    /// `h_initial`.
    ///
    /// Never fails outright: if the step budget runs out first, the returned result is flagged
    /// [`failed`](IntegrationResult::failed) and holds the partial trajectory. An interval with
    /// `t_final <= t_initial` yields just the initial sample.
    pub fn integrate<S, Sys>(
        &self,
        system: &Sys,
        t_initial: F,
        t_final: F,
        y0: S,
        h_initial: F,
    ) -> IntegrationResult<S>
    where
        S: State<Float = F>,
        Sys: System<S>,
    {
        let settings = &self.settings;
        let span = t_final - t_initial;
        let evaluator = StageEvaluator::new(self.tableau);
        let mut controller = StepController::new(self.tableau.order(), span, settings);
        let h_min = controller.minimum_step_size();
        let system = SystemEvaluationCounter::new(system);

        log::debug!(
            "integrating {}-stage pair from t = {t_initial} to t = {t_final}, h0 = {h_initial}, tol = {}",
            self.tableau.stages(),
            settings.tol
        );

        let mut result = IntegrationResult::new(
            t_initial,
            y0.clone(),
            t_final,
            settings.max_steps,
            expected_steps(span, h_initial, settings.max_steps),
        );

        let mut t = t_initial;
        let mut y = y0;
        let mut h = h_initial.max(h_min);
        let mut num_steps = 0;
        while t < t_final && num_steps < settings.max_steps {
            num_steps += 1;

            // Far from the origin `h_min` can drop below the spacing of `t`, so keep every step
            // large enough to advance time.
            h = h.max(time_resolution(t));

            // Truncate the step so we land on `t_final` exactly.
            let remaining = t_final - t;
            let reaches_final = h >= remaining;
            if reaches_final {
                h = remaining;
                if h < h_min {
                    log::trace!("remaining interval {h} below minimum step, stopping at t = {t}");
                    t = t_final;
                    result.push_accepted(t, y.clone(), F::zero());
                    break;
                }
            }

            let (low, high) = evaluator.step(&system, t, &y, h);
            match controller.decide(&low, &high, h, reaches_final) {
                StepDecision::Accept {
                    error,
                    next_step_size,
                    expanded,
                    at_minimum_step,
                } => {
                    t = if reaches_final { t_final } else { t + h };
                    log::trace!("accepted step of size {h} to t = {t}, error {error}");
                    if at_minimum_step {
                        log::warn!(
                            "accepted step at minimum size {h} with error {error} above budget {}",
                            controller.error_budget(h)
                        );
                        result.record_minimum_step_acceptance();
                    }
                    if expanded {
                        result.record_expansion();
                    }
                    y = high;
                    result.push_accepted(t, y.clone(), error);
                    h = next_step_size;
                }
                StepDecision::Reject {
                    error,
                    next_step_size,
                } => {
                    log::trace!(
                        "rejected step of size {h} at t = {t}, error {error}, retrying with {next_step_size}"
                    );
                    result.record_contraction();
                    h = next_step_size;
                }
            }
        }

        result.finish(system.num_system_evals());
        if result.failed() {
            log::warn!(
                "step budget of {} exhausted at t = {t} before reaching t = {t_final}",
                settings.max_steps
            );
        }
        log::debug!(
            "finished with {} samples, {} expansions, {} contractions, estimated error {}",
            result.len(),
            result.expansions(),
            result.contractions(),
            result.estimated_error()
        );
        result
    }

    fn map_settings(self, f: impl FnOnce(Settings<F>) -> Settings<F>) -> Self {
        Self {
            settings: f(self.settings),
            ..self
        }
    }
}

/// Smallest step that is guaranteed to change `t` when added to it.
fn time_resolution<F: Float>(t: F) -> F {
    (F::one() + F::one()) * F::epsilon() * t.abs()
}

/// Upper bound on the number of samples reserved up front; longer trajectories grow as needed.
const MAX_RESERVED_SAMPLES: usize = 1 << 16;

/// Number of samples to reserve for: one per initial step across the span, bounded by the step
/// budget and by [`MAX_RESERVED_SAMPLES`].
fn expected_steps<F: Float>(span: F, h_initial: F, max_steps: usize) -> usize {
    let ratio = span / h_initial;
    let estimate = if ratio > F::zero() {
        cast::<_, usize>(ratio).map_or(usize::MAX, |n| n.saturating_add(1))
    } else {
        1
    };
    estimate.min(max_steps).min(MAX_RESERVED_SAMPLES)
}
