//! State representations the integrator can advance.

use ndarray as nd;

use crate::Float;

/// A value type holding the state of an ODE system.
///
/// This supplies the vector-space operations the integrator needs plus the norm used to compare
/// the two embedded estimates. It is implemented for the plain scalars `f32`/`f64` (norm is the
/// absolute value) and for [`ndarray::Array1`] (Euclidean norm). Everything downstream is generic
/// over it, so the choice between representations is made statically.
///
/// Other vector types can be supported by implementing this trait, e.g. with `nalgebra`:
///
/// ```
/// #[derive(Clone, Debug)]
/// struct Planar(nalgebra::Vector2<f64>);
///
/// impl fehlberg::State for Planar {
///     type Float = f64;
///
///     fn norm(&self) -> f64 {
///         self.0.norm()
///     }
///     fn scale(&mut self, factor: f64) {
///         self.0 *= factor;
///     }
///     fn add_scaled(&mut self, factor: f64, other: &Self) {
///         self.0 += other.0 * factor;
///     }
///     fn components(&self) -> impl Iterator<Item = f64> + '_ {
///         self.0.iter().copied()
///     }
/// }
///
/// let a = Planar(nalgebra::Vector2::new(3., 0.));
/// let b = Planar(nalgebra::Vector2::new(0., 4.));
/// assert_eq!(fehlberg::State::distance(&a, &b), 5.);
/// ```
pub trait State: Clone + core::fmt::Debug {
    /// The floating point type.
    type Float: Float;

    /// Non-negative magnitude of the state.
    fn norm(&self) -> Self::Float;

    /// Multiply in place by `factor`.
    fn scale(&mut self, factor: Self::Float);

    /// Add `factor * other` in place.
    fn add_scaled(&mut self, factor: Self::Float, other: &Self);

    /// The scalar components, in order.
    fn components(&self) -> impl Iterator<Item = Self::Float> + '_;

    /// Magnitude of `self - other`.
    fn distance(&self, other: &Self) -> Self::Float {
        let mut difference = self.clone();
        difference.add_scaled(-<Self::Float as num_traits::One>::one(), other);
        difference.norm()
    }
}

macro_rules! impl_scalar_state {
    ($($float:ty),*) => {
        $(
            impl State for $float {
                type Float = $float;

                fn norm(&self) -> $float {
                    self.abs()
                }

                fn scale(&mut self, factor: $float) {
                    *self *= factor;
                }

                fn add_scaled(&mut self, factor: $float, other: &Self) {
                    *self += factor * *other;
                }

                fn components(&self) -> impl Iterator<Item = $float> + '_ {
                    core::iter::once(*self)
                }
            }
        )*
    };
}

impl_scalar_state!(f32, f64);

impl<F: Float> State for nd::Array1<F> {
    type Float = F;

    fn norm(&self) -> F {
        self.iter().map(|&yi| yi * yi).sum::<F>().sqrt()
    }

    fn scale(&mut self, factor: F) {
        self.mapv_inplace(|yi| yi * factor);
    }

    fn add_scaled(&mut self, factor: F, other: &Self) {
        self.scaled_add(factor, other);
    }

    fn components(&self) -> impl Iterator<Item = F> + '_ {
        self.iter().copied()
    }
}
