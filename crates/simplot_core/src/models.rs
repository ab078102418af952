//! Closed-form models with a handful of state variables.

use crate::error::{Result, SimError};
use crate::state::StateVector;
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};
use std::fmt;

fn check_dimension(expected: usize, y: &StateVector) -> Result<()> {
    if y.len() != expected {
        return Err(SimError::LengthMismatch {
            left: expected,
            right: y.len(),
        });
    }
    Ok(())
}

/// Predator-prey dynamics:
///
/// ```text
/// dx/dt = alpha x - beta x y      (prey)
/// dy/dt = delta x y - gamma y     (predator)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LotkaVolterra {
    /// Prey birth rate.
    pub alpha: f64,
    /// Predation rate.
    pub beta: f64,
    /// Predator reproduction rate.
    pub delta: f64,
    /// Predator death rate.
    pub gamma: f64,
}

impl LotkaVolterra {
    pub fn new(alpha: f64, beta: f64, delta: f64, gamma: f64) -> Self {
        Self {
            alpha,
            beta,
            delta,
            gamma,
        }
    }

    pub fn variable_names() -> [&'static str; 2] {
        ["prey", "predator"]
    }
}

impl Default for LotkaVolterra {
    fn default() -> Self {
        Self::new(1.1, 0.4, 0.1, 0.4)
    }
}

impl DynamicalSystem for LotkaVolterra {
    fn dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
        check_dimension(2, y)?;
        let prey = y.get(0)?;
        let predator = y.get(1)?;

        Ok(StateVector::from([
            self.alpha * prey - self.beta * prey * predator,
            self.delta * prey * predator - self.gamma * predator,
        ]))
    }
}

/// SIR compartments with population turnover at rate `mu`:
///
/// ```text
/// dS/dt = -k S I + mu (1 - S)
/// dI/dt =  k S I - (gamma + mu) I
/// dR/dt =  gamma I - mu R
/// ```
///
/// `d(S + I + R)/dt = mu (1 - S - I - R)`, so a population normalized to 1
/// stays normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sir {
    /// Transmission rate.
    pub k: f64,
    /// Recovery rate.
    pub gamma: f64,
    /// Birth and death rate.
    pub mu: f64,
}

impl Sir {
    pub fn new(k: f64, gamma: f64, mu: f64) -> Self {
        Self { k, gamma, mu }
    }

    pub fn variable_names() -> [&'static str; 3] {
        ["susceptible", "infected", "recovered"]
    }
}

impl Default for Sir {
    fn default() -> Self {
        Self::new(0.5, 0.1, 0.01)
    }
}

impl DynamicalSystem for Sir {
    fn dimension(&self) -> usize {
        3
    }

    fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
        check_dimension(3, y)?;
        let s = y.get(0)?;
        let i = y.get(1)?;
        let r = y.get(2)?;

        Ok(StateVector::from([
            -self.k * s * i + self.mu * (1.0 - s),
            self.k * s * i - (self.gamma + self.mu) * i,
            self.gamma * i - self.mu * r,
        ]))
    }
}

/// FitzHugh-Nagumo neuron excitability model:
///
/// ```text
/// dV/dt = V - V^3 / 3 - W + I_ext
/// dW/dt = epsilon (V + a - b W)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitzHughNagumo {
    /// Time scale separation of the recovery variable.
    pub epsilon: f64,
    pub a: f64,
    pub b: f64,
    /// External stimulus current.
    pub i_ext: f64,
}

impl FitzHughNagumo {
    pub fn new(epsilon: f64, a: f64, b: f64, i_ext: f64) -> Self {
        Self { epsilon, a, b, i_ext }
    }

    pub fn variable_names() -> [&'static str; 2] {
        ["voltage", "recovery"]
    }
}

impl Default for FitzHughNagumo {
    fn default() -> Self {
        Self::new(0.08, 0.7, 0.8, 0.5)
    }
}

impl DynamicalSystem for FitzHughNagumo {
    fn dimension(&self) -> usize {
        2
    }

    fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
        check_dimension(2, y)?;
        let v = y.get(0)?;
        let w = y.get(1)?;

        Ok(StateVector::from([
            v - v * v * v / 3.0 - w + self.i_ext,
            self.epsilon * (v + self.a - self.b * w),
        ]))
    }
}

/// Adapts a plain closure into a `DynamicalSystem`.
pub struct FnSystem<F> {
    dimension: usize,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(f64, &[f64]) -> Vec<f64>,
{
    pub fn new(dimension: usize, f: F) -> Self {
        Self { dimension, f }
    }
}

impl<F> fmt::Debug for FnSystem<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSystem")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl<F> DynamicalSystem for FnSystem<F>
where
    F: Fn(f64, &[f64]) -> Vec<f64>,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector> {
        check_dimension(self.dimension, y)?;
        let dy = StateVector::new((self.f)(t, y.as_slice()));
        check_dimension(self.dimension, &dy)?;
        Ok(dy)
    }
}
