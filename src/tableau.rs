//! Butcher tableaux of explicit embedded Runge-Kutta pairs.

/// An explicit embedded Runge-Kutta pair with `S` stages.
///
/// The coupling matrix `a` must be strictly lower triangular; entries on and above the diagonal
/// are ignored by the stage evaluator but are expected to be zero. The abscissas `c` are not
/// supplied: they are derived as the row sums of `a`. No other validation is performed.
///
/// Coefficients are stored as `f64` so that tableaux can be built in `const` context and shared
/// between integrations of any [`Float`](crate::Float) type.
#[derive(Clone, Debug, PartialEq)]
pub struct Tableau<const S: usize> {
    a: [[f64; S]; S],
    b_low: [f64; S],
    b_high: [f64; S],
    c: [f64; S],
    order: u32,
}

impl<const S: usize> Tableau<S> {
    /// Build a tableau from its coupling matrix and the two weight sets.
    ///
    /// `order` is the consistency order of the high-order formula (`b_high`).
    pub const fn new(a: [[f64; S]; S], b_low: [f64; S], b_high: [f64; S], order: u32) -> Self {
        let mut c = [0.; S];
        let mut i = 1;
        while i < S {
            let mut sum = 0.;
            let mut j = 0;
            while j < S {
                sum += a[i][j];
                j += 1;
            }
            c[i] = sum;
            i += 1;
        }
        Self {
            a,
            b_low,
            b_high,
            c,
            order,
        }
    }

    /// Number of stages.
    pub const fn stages(&self) -> usize {
        S
    }

    /// Stage coupling matrix.
    pub const fn a(&self) -> &[[f64; S]; S] {
        &self.a
    }

    /// Weights of the low-order formula.
    pub const fn b_low(&self) -> &[f64; S] {
        &self.b_low
    }

    /// Weights of the high-order formula.
    pub const fn b_high(&self) -> &[f64; S] {
        &self.b_high
    }

    /// Abscissas, the row sums of [`Self::a`].
    pub const fn c(&self) -> &[f64; S] {
        &self.c
    }

    /// Consistency order of the high-order formula.
    pub const fn order(&self) -> u32 {
        self.order
    }
}

impl Tableau<2> {
    /// Euler/Heun 1(2) pair.
    pub const HEUN_EULER12: Self = Self::new([[0., 0.], [1., 0.]], [1., 0.], [0.5, 0.5], 2);
}

impl Tableau<3> {
    /// Fehlberg's 1(2) pair.
    pub const FEHLBERG12: Self = Self::new(
        [
            [0., 0., 0.],
            [1. / 2., 0., 0.],
            [1. / 256., 255. / 256., 0.],
        ],
        [1. / 256., 255. / 256., 0.],
        [1. / 512., 255. / 256., 1. / 512.],
        2,
    );
}

impl Tableau<4> {
    /// Bogacki-Shampine 2(3) pair.
    pub const BOGACKI_SHAMPINE23: Self = Self::new(
        [
            [0., 0., 0., 0.],
            [1. / 2., 0., 0., 0.],
            [0., 3. / 4., 0., 0.],
            [2. / 9., 1. / 3., 4. / 9., 0.],
        ],
        [7. / 24., 1. / 4., 1. / 3., 1. / 8.],
        [2. / 9., 1. / 3., 4. / 9., 0.],
        3,
    );
}

impl Tableau<6> {
    /// The classic Runge-Kutta-Fehlberg 4(5) pair.
    ///
    /// Its abscissas are `[0, 1/4, 3/8, 12/13, 1, 1/2]`: the last stage is evaluated at an
    /// earlier time than the one before it, so stage times within a step are not monotone.
    pub const FEHLBERG45: Self = Self::new(
        [
            [0., 0., 0., 0., 0., 0.],
            [1. / 4., 0., 0., 0., 0., 0.],
            [3. / 32., 9. / 32., 0., 0., 0., 0.],
            [1932. / 2197., -7200. / 2197., 7296. / 2197., 0., 0., 0.],
            [439. / 216., -8., 3680. / 513., -845. / 4104., 0., 0.],
            [-8. / 27., 2., -3544. / 2565., 1859. / 4104., -11. / 40., 0.],
        ],
        [25. / 216., 0., 1408. / 2565., 2197. / 4104., -1. / 5., 0.],
        [16. / 135., 0., 6656. / 12825., 28561. / 56430., -9. / 50., 2. / 55.],
        5,
    );
}

impl Tableau<7> {
    /// Dormand-Prince 4(5) pair. The last stage is evaluated like any other: there is no
    /// first-same-as-last reuse between steps.
    ///
    /// Its last two stages share the abscissa 1, so stage times within a step are only
    /// non-decreasing.
    pub const DORMAND_PRINCE45: Self = Self::new(
        [
            [0., 0., 0., 0., 0., 0., 0.],
            [1. / 5., 0., 0., 0., 0., 0., 0.],
            [3. / 40., 9. / 40., 0., 0., 0., 0., 0.],
            [44. / 45., -56. / 15., 32. / 9., 0., 0., 0., 0.],
            [19372. / 6561., -25360. / 2187., 64448. / 6561., -212. / 729., 0., 0., 0.],
            [9017. / 3168., -355. / 33., 46732. / 5247., 49. / 176., -5103. / 18656., 0., 0.],
            [35. / 384., 0., 500. / 1113., 125. / 192., -2187. / 6784., 11. / 84., 0.],
        ],
        [
            5179. / 57600.,
            0.,
            7571. / 16695.,
            393. / 640.,
            -92097. / 339200.,
            187. / 2100.,
            1. / 40.,
        ],
        [35. / 384., 0., 500. / 1113., 125. / 192., -2187. / 6784., 11. / 84., 0.],
        5,
    );
}
