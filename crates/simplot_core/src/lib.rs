pub mod equation_engine;
pub mod error;
pub mod integrate;
pub mod models;
pub mod nbody;
pub mod plot;
pub mod scenarios;
pub mod solvers;
pub mod state;
/// The `simplot_core` crate is the numerical engine behind the `simplot` CLI.
/// It advances systems of ordinary differential equations with fixed-step
/// explicit Runge-Kutta methods and records the resulting trajectories.
///
/// Key components:
/// - **Traits**: `DynamicalSystem` (right-hand sides), `Steppable` (one-step methods).
/// - **State**: `StateVector`, an immutable vector of `f64` with checked arithmetic.
/// - **Solvers**: Euler, Heun, Ralston and RK4, selected through `StepAlgorithm`.
/// - **Models**: Lotka-Volterra, SIR, FitzHugh-Nagumo and direct-summation N-body gravity.
/// - **Equation Engine**: A bytecode VM for user-supplied formulas.
/// - **Integrate**: Eager and streaming drivers producing a `Trajectory`.
pub mod traits;

pub use error::{Result, SimError};
pub use integrate::{integrate, Integration, Sample, Trajectory};
pub use solvers::StepAlgorithm;
pub use state::StateVector;
pub use traits::{DynamicalSystem, Steppable};
