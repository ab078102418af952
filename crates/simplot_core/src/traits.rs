use crate::error::Result;
use crate::state::StateVector;

/// A first-order system `dy/dt = f(t, y)`.
///
/// Implementations bind their parameters at construction and must be pure:
/// the derivative depends only on `(t, y)`, and has the same length as `y`.
pub trait DynamicalSystem {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field at time `t` and state `y`.
    fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector>;
}

impl<S: DynamicalSystem + ?Sized> DynamicalSystem for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector> {
        (**self).derivative(t, y)
    }
}

impl<S: DynamicalSystem + ?Sized> DynamicalSystem for Box<S> {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector> {
        (**self).derivative(t, y)
    }
}

/// A fixed-step explicit method that advances a system by one step.
pub trait Steppable {
    /// Number of derivative evaluations per step.
    fn evaluations(&self) -> usize;

    /// Returns the state at `t + dt` given the state `y` at `t`.
    /// Pure: identical inputs give bit-identical output.
    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector>;
}
