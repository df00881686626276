use num_traits::cast;

use crate::{Float, Settings, State};

/// Outcome of [`StepController::decide`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StepDecision<F: Float> {
    /// The high-order estimate should be committed.
    Accept {
        /// The error estimate of the accepted step.
        error: F,
        /// Step size to try next.
        next_step_size: F,
        /// Whether `next_step_size` was grown.
        expanded: bool,
        /// Whether the step was only accepted because it could not shrink below the minimum
        /// step size.
        at_minimum_step: bool,
    },
    /// The step must be retried with `next_step_size`.
    Reject { error: F, next_step_size: F },
}

/// Accept/reject and step-resize policy for an embedded pair.
///
/// The per-step error budget is `tol * h / span`, so the errors committed over the whole
/// integration sum to roughly `tol`. A step that directly follows a rejection is never expanded,
/// which keeps the step size from oscillating between growth and shrinkage.
#[derive(Clone, Debug)]
pub struct StepController<F: Float> {
    exponent: F,
    span: F,
    tol: F,
    minimum_step_size: F,
    expansion_cap: F,
    reduction_margin: F,
    accept_at_minimum_step: bool,
    rejected: bool,
}

impl<F: Float> StepController<F> {
    /// Controller for a pair whose high-order formula has consistency order `order`, integrating
    /// over an interval of length `span`.
    pub fn new(order: u32, span: F, settings: &Settings<F>) -> Self {
        let exponent = if order <= 2 {
            F::one()
        } else {
            F::one() / cast::<_, F>(order - 1).unwrap()
        };
        Self {
            exponent,
            span,
            tol: settings.tol,
            minimum_step_size: crate::minimum_step_size(span),
            expansion_cap: settings.expansion_cap,
            reduction_margin: settings.reduction_margin,
            accept_at_minimum_step: settings.accept_at_minimum_step,
            rejected: false,
        }
    }

    /// Error budget for a step of size `h`.
    pub fn error_budget(&self, h: F) -> F {
        self.tol * h / self.span
    }

    /// Smallest step size the controller will propose.
    pub fn minimum_step_size(&self) -> F {
        self.minimum_step_size
    }

    /// Whether the last decision was a rejection.
    pub fn rejected(&self) -> bool {
        self.rejected
    }

    /// Judge a step of size `h` from its two estimates.
    ///
    /// `reaches_final` tells the controller the step would end the integration, in which case an
    /// accepted step is never expanded.
    pub fn decide<S>(&mut self, low: &S, high: &S, h: F, reaches_final: bool) -> StepDecision<F>
    where
        S: State<Float = F>,
    {
        let budget = self.error_budget(h);
        let error = low.distance(high);
        let mu = self.growth_factor(budget, error);

        if error <= budget {
            let expanded = mu >= F::one() && !self.rejected && !reaches_final;
            let next_step_size = if expanded {
                h * self.expansion_cap.min(mu)
            } else {
                h
            };
            self.rejected = false;
            return StepDecision::Accept {
                error,
                next_step_size,
                expanded,
                at_minimum_step: false,
            };
        }

        if self.accept_at_minimum_step && h <= self.minimum_step_size && error.is_finite() {
            self.rejected = false;
            return StepDecision::Accept {
                error,
                next_step_size: h,
                expanded: false,
                at_minimum_step: true,
            };
        }

        self.rejected = true;
        let mut next_step_size = h * mu * self.reduction_margin;
        // Also catches a NaN error estimate.
        if !(next_step_size > self.minimum_step_size) {
            next_step_size = self.minimum_step_size;
        }
        StepDecision::Reject {
            error,
            next_step_size,
        }
    }

    fn growth_factor(&self, budget: F, error: F) -> F {
        if error == F::zero() {
            F::infinity()
        } else {
            (budget / error).powf(self.exponent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(order: u32) -> StepController<f64> {
        // Span of 1 so that the budget for a step of size h is tol * h.
        StepController::new(order, 1., &Settings::default().with_tol(1e-3))
    }

    #[test]
    fn exponent_depends_on_order() {
        assert_eq!(controller(1).exponent, 1.);
        assert_eq!(controller(2).exponent, 1.);
        assert_eq!(controller(3).exponent, 0.5);
        approx::assert_relative_eq!(controller(5).exponent, 0.25);
    }

    #[test]
    fn budget_is_proportional_to_step() {
        let controller = StepController::new(5, 10., &Settings::default().with_tol(1e-2));
        approx::assert_relative_eq!(controller.error_budget(0.5), 5e-4);
        approx::assert_relative_eq!(controller.minimum_step_size(), 1000. * f64::EPSILON);
    }

    #[test]
    fn accept_and_expand_by_growth_factor() {
        let mut controller = controller(2);
        // budget = 1e-4, error = 8e-5, mu = 1.25
        match controller.decide(&0., &8e-5, 0.1, false) {
            StepDecision::Accept {
                error,
                next_step_size,
                expanded,
                at_minimum_step,
            } => {
                approx::assert_relative_eq!(error, 8e-5);
                approx::assert_relative_eq!(next_step_size, 0.125, epsilon = 1e-12);
                assert!(expanded);
                assert!(!at_minimum_step);
            }
            decision => panic!("unexpected {decision:?}"),
        }
        assert!(!controller.rejected());
    }

    #[test]
    fn expansion_is_capped() {
        let mut controller = controller(2);
        let decision = controller.decide(&0., &1e-9, 0.1, false);
        assert!(matches!(
            decision,
            StepDecision::Accept { next_step_size, expanded: true, .. }
                if (next_step_size - 0.2).abs() < 1e-15
        ));
    }

    #[test]
    fn zero_error_expands_maximally() {
        let mut controller = controller(5);
        let decision = controller.decide(&1., &1., 0.1, false);
        match decision {
            StepDecision::Accept {
                error,
                next_step_size,
                expanded,
                ..
            } => {
                assert_eq!(error, 0.);
                assert!(expanded);
                assert!(next_step_size.is_finite());
                approx::assert_relative_eq!(next_step_size, 0.2);
            }
            decision => panic!("unexpected {decision:?}"),
        }
    }

    #[test]
    fn no_expansion_on_final_step() {
        let mut controller = controller(5);
        let decision = controller.decide(&1., &1., 0.1, true);
        assert!(matches!(
            decision,
            StepDecision::Accept { next_step_size, expanded: false, .. } if next_step_size == 0.1
        ));
    }

    #[test]
    fn reject_shrinks_with_margin() {
        let mut controller = controller(2);
        // budget = 1e-4, error = 4e-4, mu = 0.25
        match controller.decide(&0., &4e-4, 0.1, false) {
            StepDecision::Reject {
                error,
                next_step_size,
            } => {
                approx::assert_relative_eq!(error, 4e-4);
                approx::assert_relative_eq!(next_step_size, 0.1 * 0.25 * 0.95, epsilon = 1e-12);
            }
            decision => panic!("unexpected {decision:?}"),
        }
        assert!(controller.rejected());
    }

    #[test]
    fn no_expansion_directly_after_rejection() {
        let mut controller = controller(2);
        assert!(matches!(
            controller.decide(&0., &1., 0.1, false),
            StepDecision::Reject { .. }
        ));
        // Tiny error: would expand if the previous step had not been rejected.
        let decision = controller.decide(&0., &1e-12, 0.05, false);
        assert!(matches!(
            decision,
            StepDecision::Accept { next_step_size, expanded: false, .. } if next_step_size == 0.05
        ));
        // The rejection is forgotten once a step has been accepted.
        let decision = controller.decide(&0., &1e-12, 0.05, false);
        assert!(matches!(decision, StepDecision::Accept { expanded: true, .. }));
    }

    #[test]
    fn rejection_clamps_to_minimum_step() {
        // mu = 1e-9 * 1e-6 / 1e10, so the shrunk step falls far below the minimum.
        let mut controller = controller(2);
        let h_min = controller.minimum_step_size();
        let decision = controller.decide(&0., &1e10, 1e-6, false);
        assert_eq!(
            decision,
            StepDecision::Reject {
                error: 1e10,
                next_step_size: h_min
            }
        );
    }

    #[test]
    fn nan_error_is_rejected() {
        let mut controller = controller(5);
        let h_min = controller.minimum_step_size();
        match controller.decide(&0., &f64::NAN, 0.1, false) {
            StepDecision::Reject { next_step_size, .. } => assert_eq!(next_step_size, h_min),
            decision => panic!("unexpected {decision:?}"),
        }
    }

    #[test]
    fn minimum_step_acceptance_is_opt_in() {
        let settings = Settings::default().with_tol(1e-3);
        let mut strict = StepController::new(5, 1., &settings);
        let h_min = strict.minimum_step_size();
        assert!(matches!(
            strict.decide(&0., &1., h_min, false),
            StepDecision::Reject { .. }
        ));

        let mut lenient =
            StepController::new(5, 1., &settings.with_minimum_step_acceptance(true));
        assert!(matches!(
            lenient.decide(&0., &1., h_min, false),
            StepDecision::Accept { at_minimum_step: true, expanded: false, .. }
        ));
        assert!(!lenient.rejected());
        // Non-finite errors are never forced through.
        assert!(matches!(
            lenient.decide(&0., &f64::INFINITY, h_min, false),
            StepDecision::Reject { .. }
        ));
    }
}
