//! Adaptive embedded Runge-Kutta integration of ordinary differential equations.
//!
//! An [embedded Runge-Kutta pair](https://en.wikipedia.org/wiki/Runge%E2%80%93Kutta%E2%80%93Fehlberg_method)
//! evaluates its stages once per step and combines them with two weight sets of different order.
//! The difference between the two estimates approximates the local truncation error, which drives
//! the step size: steps whose error exceeds their share of the tolerance are rejected and retried
//! with a smaller step, and steps with a comfortable margin let the step grow (at most doubling
//! by default, and never directly after a rejection).
//!
//! The tolerance is a budget for the whole integration rather than for each step: a step of size
//! `h` over a span `T` may commit an error of `tol * h / T`, so the errors accumulated along the
//! trajectory stay near `tol`.
//!
//! Both plain scalars and [`ndarray`] vectors can be integrated (see [`State`]), using any of the
//! tableaux in [`Tableau`] or a user-supplied one. Integration never panics or errors on numerical
//! grounds: an integration that runs out of steps returns its partial trajectory flagged as
//! [`failed`](IntegrationResult::failed).
//!
//! The implementation follows:
//! * Fehlberg, Erwin. "Low-order classical Runge-Kutta formulas with stepsize control and their
//!   application to some heat transfer problems." NASA Technical Report R-315 (1969).
//! * Hairer, Ernst, Syvert P. Nørsett and Gerhard Wanner. Solving Ordinary Differential Equations
//!   I. Springer, 1993. Ch. II.4.
//!
//! As an example, consider a simple trigonometric system:
//!
//! ```
//! let omega: f64 = 1.2;
//! let system = |_t: f64, y: &ndarray::Array1<f64>| ndarray::array![y[1], -omega.powi(2) * y[0]];
//!
//! // Set up the integrator. The tolerance bounds the error summed over all steps.
//! let integrator = fehlberg::Integrator::new(&fehlberg::Tableau::FEHLBERG45)
//!     .with_tol(1e-6)
//!     .with_max_steps(5000);
//!
//! // Integrate, starting from a deliberately small step size.
//! let t_final = 10.2;
//! let result = integrator.integrate(&system, 0., t_final, ndarray::array![1., 0.], 1e-3);
//!
//! // The final sample lands exactly on the requested time.
//! assert!(!result.failed());
//! assert_eq!(result.final_time(), t_final);
//!
//! // Ensure result matches analytic solution.
//! approx::assert_relative_eq!(
//!     (omega * t_final).cos(),
//!     result.final_state()[0],
//!     epsilon = 1e-5,
//! );
//!
//! // Diagnostics are available, and the result renders as a whitespace-separated table.
//! assert!(result.expansions() > 0);
//! assert!(result.to_string().starts_with("# steps: "));
//! ```

#![expect(
    non_snake_case,
    reason = "Stage derivatives are named K as in the usual Runge-Kutta notation"
)]

pub use nd::Array1;
use ndarray as nd;

pub mod controller;
pub mod error;
pub mod integrator;
pub mod result;
pub mod stage;
pub mod state;
pub mod tableau;

pub use controller::{StepController, StepDecision};
pub use error::{IntegrationError, SettingsError};
pub use integrator::{Integrator, Settings, minimum_step_size};
pub use result::IntegrationResult;
pub use stage::StageEvaluator;
pub use state::State;
pub use tableau::Tableau;

pub trait Float:
    num_traits::Float
    + core::iter::Sum
    + core::ops::AddAssign
    + core::ops::MulAssign
    + core::fmt::Debug
    + core::fmt::Display
    + nd::ScalarOperand
{
}

impl Float for f32 {}
impl Float for f64 {}

/// Trait for defining an ordinary differential equation `dy/dt = f(t, y)`.
///
/// Implemented for every closure `Fn(t, &y) -> dydt`.
pub trait System<S: State> {
    /// Evaluate the right-hand side at `(t, y)`.
    fn derivative(&self, t: S::Float, y: &S) -> S;
}

impl<S, Func> System<S> for Func
where
    S: State,
    Func: Fn(S::Float, &S) -> S,
{
    fn derivative(&self, t: S::Float, y: &S) -> S {
        self(t, y)
    }
}

/// Integrate `system` from `(t_initial, y0)` to `t_final` with the given tableau, tolerance and
/// step budget, using the default controller settings otherwise.
///
/// Shorthand for [`Integrator::integrate`]:
///
/// ```
/// let result = fehlberg::integrate(
///     &fehlberg::Tableau::BOGACKI_SHAMPINE23,
///     &|_t: f64, y: &f64| -y,
///     0.,
///     1.,
///     1.,
///     0.1,
///     1e-6,
///     1000,
/// );
/// approx::assert_relative_eq!(*result.final_state(), (-1f64).exp(), epsilon = 1e-5);
/// ```
#[allow(clippy::too_many_arguments)]
pub fn integrate<S, Sys, const N: usize>(
    tableau: &Tableau<N>,
    system: &Sys,
    t_initial: S::Float,
    t_final: S::Float,
    y0: S,
    h_initial: S::Float,
    tol: S::Float,
    max_steps: usize,
) -> IntegrationResult<S>
where
    S: State,
    Sys: System<S>,
{
    Integrator::new(tableau)
        .with_tol(tol)
        .with_max_steps(max_steps)
        .integrate(system, t_initial, t_final, y0, h_initial)
}
