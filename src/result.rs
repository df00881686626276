use core::fmt;

use crate::{Float, IntegrationError, State};

/// Trajectory and diagnostics of one integration.
///
/// The trajectory always starts with the initial condition. Times are strictly increasing and,
/// unless [`Self::failed`] is set, the last one equals the requested final time exactly. A failed
/// integration still holds the partial trajectory computed before the step budget ran out.
///
/// The [`Display`](fmt::Display) implementation renders a whitespace-separated table, one
/// `t y0 y1 ...` row per sample, preceded by `#` comment lines with the diagnostics.
#[derive(Clone, Debug)]
pub struct IntegrationResult<S: State> {
    time: Vec<S::Float>,
    y: Vec<S>,
    estimated_error: S::Float,
    failed: bool,
    expansions: usize,
    contractions: usize,
    minimum_step_acceptances: usize,
    num_system_evals: usize,
    max_steps: usize,
    t_final: S::Float,
}

impl<S: State> IntegrationResult<S> {
    /// Start a result holding only the initial sample.
    pub(crate) fn new(
        t_initial: S::Float,
        y0: S,
        t_final: S::Float,
        max_steps: usize,
        capacity: usize,
    ) -> Self {
        let mut time = Vec::with_capacity(capacity);
        let mut y = Vec::with_capacity(capacity);
        time.push(t_initial);
        y.push(y0);
        Self {
            time,
            y,
            estimated_error: <S::Float as num_traits::Zero>::zero(),
            failed: false,
            expansions: 0,
            contractions: 0,
            minimum_step_acceptances: 0,
            num_system_evals: 0,
            max_steps,
            t_final,
        }
    }

    pub(crate) fn push_accepted(&mut self, t: S::Float, y: S, error: S::Float) {
        self.time.push(t);
        self.y.push(y);
        self.estimated_error += error;
    }

    pub(crate) fn record_expansion(&mut self) {
        self.expansions += 1;
    }

    pub(crate) fn record_contraction(&mut self) {
        self.contractions += 1;
    }

    pub(crate) fn record_minimum_step_acceptance(&mut self) {
        self.minimum_step_acceptances += 1;
    }

    pub(crate) fn finish(&mut self, num_system_evals: usize) {
        self.num_system_evals = num_system_evals;
        self.failed = self.final_time() < self.t_final;
    }

    /// Sample times.
    pub fn times(&self) -> &[S::Float] {
        &self.time
    }

    /// Sampled states, one per entry of [`Self::times`].
    pub fn states(&self) -> &[S] {
        &self.y
    }

    /// `(t, y)` samples in order.
    pub fn trajectory(&self) -> impl Iterator<Item = (S::Float, &S)> + '_ {
        self.time.iter().copied().zip(self.y.iter())
    }

    /// Number of samples, including the initial condition.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Always false: the initial condition is stored.
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_time(&self) -> S::Float {
        self.time[self.time.len() - 1]
    }

    pub fn final_state(&self) -> &S {
        &self.y[self.y.len() - 1]
    }

    /// Sum of the error estimates of all accepted steps.
    pub fn estimated_error(&self) -> S::Float {
        self.estimated_error
    }

    /// Whether the step budget ran out before the final time was reached.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn is_completed(&self) -> bool {
        !self.failed
    }

    /// Number of times the step size was grown.
    pub fn expansions(&self) -> usize {
        self.expansions
    }

    /// Number of rejected steps.
    pub fn contractions(&self) -> usize {
        self.contractions
    }

    /// Number of steps accepted only because the step size could not shrink further.
    pub fn minimum_step_acceptances(&self) -> usize {
        self.minimum_step_acceptances
    }

    /// Number of evaluations of the forcing function.
    pub fn num_system_evals(&self) -> usize {
        self.num_system_evals
    }

    /// Smallest and largest accepted step, or `None` if no step was taken.
    pub fn step_size_range(&self) -> Option<(S::Float, S::Float)> {
        self.time
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .fold(None, |range, h| match range {
                None => Some((h, h)),
                Some((h_min, h_max)) => Some((
                    num_traits::Float::min(h_min, h),
                    num_traits::Float::max(h_max, h),
                )),
            })
    }

    /// Turn a failed integration into an error.
    pub fn into_completed(self) -> Result<Self, IntegrationError<S::Float>> {
        if self.failed {
            Err(IntegrationError::StepBudgetExhausted {
                t: self.final_time(),
                t_final: self.t_final,
                max_steps: self.max_steps,
            })
        } else {
            Ok(self)
        }
    }
}

impl<S: State> fmt::Display for IntegrationResult<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zero = <S::Float as num_traits::Zero>::zero();
        let (h_min, h_max) = self.step_size_range().unwrap_or((zero, zero));
        writeln!(
            f,
            "# steps: {} contractions: {} expansions: {} failed: {}",
            self.len() - 1,
            self.contractions,
            self.expansions,
            self.failed
        )?;
        writeln!(f, "# estimated error: {}", self.estimated_error)?;
        writeln!(f, "# hmin: {h_min} hmax: {h_max}")?;
        for (t, y) in self.trajectory() {
            write!(f, "{t}")?;
            for yi in y.components() {
                write!(f, " {yi}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
