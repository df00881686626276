use core::cell::Cell;

use num_traits::cast;

use crate::{Float, State, System, Tableau};

/// Evaluates the stages of an embedded pair for a single trial step.
///
/// Stateless apart from the borrowed tableau, so one evaluator (or one tableau) can serve any
/// number of integrations.
#[derive(Clone, Copy, Debug)]
pub struct StageEvaluator<'t, const N: usize> {
    tableau: &'t Tableau<N>,
}

impl<'t, const N: usize> StageEvaluator<'t, N> {
    pub fn new(tableau: &'t Tableau<N>) -> Self {
        Self { tableau }
    }

    pub fn tableau(&self) -> &'t Tableau<N> {
        self.tableau
    }

    /// Attempt one step of size `h` from `(t, y)`.
    ///
    /// Calls `system` exactly `N` times and returns the `(low, high)` order estimates of the state
    /// at `t + h`. Zero coefficients are skipped.
    pub fn step<S, Sys>(&self, system: &Sys, t: S::Float, y: &S, h: S::Float) -> (S, S)
    where
        S: State,
        Sys: System<S>,
    {
        let a = self.tableau.a();
        let c = self.tableau.c();

        // Stage 0 is always an explicit Euler evaluation.
        let mut K: Vec<S> = Vec::with_capacity(N);
        let mut k0 = system.derivative(t, y);
        k0.scale(h);
        K.push(k0);

        for i in 1..N {
            let mut value = y.clone();
            for (&aij, Kj) in a[i][..i].iter().zip(K.iter()) {
                if aij != 0. {
                    value.add_scaled(coefficient(aij), Kj);
                }
            }
            let mut Ki = system.derivative(t + coefficient::<S::Float>(c[i]) * h, &value);
            Ki.scale(h);
            K.push(Ki);
        }

        let mut low = y.clone();
        let mut high = y.clone();
        for ((&bl, &bh), Ki) in self
            .tableau
            .b_low()
            .iter()
            .zip(self.tableau.b_high().iter())
            .zip(K.iter())
        {
            if bl != 0. {
                low.add_scaled(coefficient(bl), Ki);
            }
            if bh != 0. {
                high.add_scaled(coefficient(bh), Ki);
            }
        }
        (low, high)
    }
}

fn coefficient<F: Float>(value: f64) -> F {
    cast(value).unwrap()
}

/// Counts how often the wrapped system is evaluated.
pub(crate) struct SystemEvaluationCounter<'a, Sys> {
    system: &'a Sys,
    num_system_evals: Cell<usize>,
}

impl<'a, Sys> SystemEvaluationCounter<'a, Sys> {
    pub(crate) fn new(system: &'a Sys) -> Self {
        Self {
            system,
            num_system_evals: Cell::new(0),
        }
    }

    pub(crate) fn num_system_evals(&self) -> usize {
        self.num_system_evals.get()
    }
}

impl<S: State, Sys: System<S>> System<S> for SystemEvaluationCounter<'_, Sys> {
    fn derivative(&self, t: S::Float, y: &S) -> S {
        self.num_system_evals.set(self.num_system_evals.get() + 1);
        self.system.derivative(t, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_rhs_is_exact_for_both_estimates() {
        let system = |_t: f64, _y: &f64| 3.;
        let evaluator = StageEvaluator::new(&Tableau::FEHLBERG45);
        let (low, high) = evaluator.step(&system, 1., &2., 0.5);
        approx::assert_relative_eq!(low, 3.5, epsilon = 1e-14);
        approx::assert_relative_eq!(high, 3.5, epsilon = 1e-14);
    }

    #[test]
    fn high_order_estimate_integrates_quartic_in_time() {
        // y' = 5 t^4 is integrated exactly by a formula of order >= 5.
        let system = |t: f64, _y: &f64| 5. * t.powi(4);
        let evaluator = StageEvaluator::new(&Tableau::FEHLBERG45);
        let (low, high) = evaluator.step(&system, 0., &0., 1.);
        approx::assert_relative_eq!(high, 1., epsilon = 1e-13);
        assert!((low - 1.).abs() > 1e-6);
    }

    #[test]
    fn heun_euler_estimates() {
        // y' = y, one step of size h from y = 1: Euler gives 1 + h, Heun 1 + h + h^2 / 2.
        let system = |_t: f64, y: &f64| *y;
        let evaluator = StageEvaluator::new(&Tableau::HEUN_EULER12);
        let (low, high) = evaluator.step(&system, 0., &1., 0.1);
        approx::assert_relative_eq!(low, 1.1, epsilon = 1e-15);
        approx::assert_relative_eq!(high, 1.105, epsilon = 1e-15);
    }

    #[test]
    fn vector_state_and_evaluation_count() {
        let system = |_t: f64, y: &ndarray::Array1<f64>| ndarray::array![y[1], -y[0]];
        let counter = SystemEvaluationCounter::new(&system);
        let evaluator = StageEvaluator::new(&Tableau::BOGACKI_SHAMPINE23);
        let h: f64 = 1e-2;
        let (low, high) = evaluator.step(&counter, 0., &ndarray::array![1., 0.], h);
        assert_eq!(counter.num_system_evals(), 4);
        approx::assert_relative_eq!(high[0], h.cos(), epsilon = 1e-8);
        approx::assert_relative_eq!(high[1], -h.sin(), epsilon = 1e-8);
        assert!(low.distance(&high) < 1e-5);
    }

    fn stage_times<const N: usize>(tableau: &Tableau<N>, t: f64, h: f64) -> Vec<f64> {
        let times = core::cell::RefCell::new(Vec::new());
        let system = |t: f64, _y: &f64| {
            times.borrow_mut().push(t);
            0.
        };
        StageEvaluator::new(tableau).step(&system, t, &0., h);
        times.into_inner()
    }

    #[test]
    fn stage_times_follow_abscissas() {
        assert_eq!(stage_times(&Tableau::FEHLBERG12, 2., 1.), vec![2., 2.5, 3.]);

        // The last Fehlberg 4(5) stage goes back to the middle of the step.
        let times = stage_times(&Tableau::FEHLBERG45, 0., 1.);
        let expected = [0., 1. / 4., 3. / 8., 12. / 13., 1., 1. / 2.];
        assert_eq!(times.len(), expected.len());
        for (&t, &e) in times.iter().zip(expected.iter()) {
            approx::assert_relative_eq!(t, e, epsilon = 1e-14);
        }
        assert!(times[5] < times[4]);

        let times = stage_times(&Tableau::DORMAND_PRINCE45, 0., 1.);
        assert!(times.windows(2).all(|pair| pair[1] > pair[0] - 1e-14));
        approx::assert_relative_eq!(times[5], times[6], epsilon = 1e-13);
    }
}
