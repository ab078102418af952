//! Direct-summation Newtonian gravity for N bodies.
//!
//! State layout: body `i` occupies `[6i, 6i + 6)` of the state vector, first
//! its position `(x, y, z)` and then its velocity `(vx, vy, vz)`.

use crate::error::{Result, SimError};
use crate::state::StateVector;
use crate::traits::DynamicalSystem;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::trace;

pub type NVec3 = Vector3<f64>;

/// Gravitational constant in m^3 kg^-1 s^-2.
pub const G_SI: f64 = 6.67430e-11;
/// Gravitational constant in km^3 kg^-1 s^-2.
pub const G_KM: f64 = 6.67430e-20;

/// Components per body: three for position, three for velocity.
pub const BODY_STRIDE: usize = 6;

/// What to do with a pair of bodies at exactly the same position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoincidencePolicy {
    /// Drop the pair's contribution (treated as zero force).
    #[default]
    Skip,
    /// Fail the derivative evaluation with `SimError::CoincidentBodies`.
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NBodySystem {
    masses: Vec<f64>,
    g: f64,
    anchor: Option<usize>,
    coincidence: CoincidencePolicy,
}

impl NBodySystem {
    /// Creates a system with body 0 anchored in place.
    pub fn new(masses: Vec<f64>, g: f64) -> Result<Self> {
        if masses.is_empty() {
            return Err(SimError::EmptySystem);
        }
        Ok(Self {
            masses,
            g,
            anchor: Some(0),
            coincidence: CoincidencePolicy::Skip,
        })
    }

    /// Chooses the body whose derivative is forced to zero, or `None` to let
    /// every body move.
    pub fn with_anchor(mut self, anchor: Option<usize>) -> Result<Self> {
        if let Some(index) = anchor {
            if index >= self.masses.len() {
                return Err(SimError::IndexOutOfBounds {
                    index,
                    len: self.masses.len(),
                });
            }
        }
        self.anchor = anchor;
        Ok(self)
    }

    pub fn with_coincidence_policy(mut self, policy: CoincidencePolicy) -> Self {
        self.coincidence = policy;
        self
    }

    pub fn body_count(&self) -> usize {
        self.masses.len()
    }

    pub fn masses(&self) -> &[f64] {
        &self.masses
    }

    pub fn gravitational_constant(&self) -> f64 {
        self.g
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    /// Position of body `i` in state `y`.
    pub fn position(y: &StateVector, i: usize) -> Result<NVec3> {
        Self::block(y, i * BODY_STRIDE)
    }

    /// Velocity of body `i` in state `y`.
    pub fn velocity(y: &StateVector, i: usize) -> Result<NVec3> {
        Self::block(y, i * BODY_STRIDE + 3)
    }

    fn block(y: &StateVector, start: usize) -> Result<NVec3> {
        let s = y.slice(start, start + 3)?;
        Ok(NVec3::from_column_slice(s.as_slice()))
    }

    /// Builds a state vector from `(position, velocity)` pairs.
    pub fn pack_state(bodies: &[(NVec3, NVec3)]) -> StateVector {
        let mut data = Vec::with_capacity(bodies.len() * BODY_STRIDE);
        for (position, velocity) in bodies {
            data.extend_from_slice(position.as_slice());
            data.extend_from_slice(velocity.as_slice());
        }
        StateVector::new(data)
    }

    /// Kinetic plus pairwise potential energy. Anchored bodies count too.
    pub fn total_energy(&self, y: &StateVector) -> Result<f64> {
        let (positions, velocities) = self.unpack(y)?;
        let kinetic: f64 = self
            .masses
            .iter()
            .zip(&velocities)
            .map(|(m, v)| 0.5 * m * v.norm_squared())
            .sum();

        let mut potential = 0.0;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let dist = (positions[j] - positions[i]).norm();
                if dist > 0.0 {
                    potential -= self.g * self.masses[i] * self.masses[j] / dist;
                }
            }
        }
        Ok(kinetic + potential)
    }

    fn unpack(&self, y: &StateVector) -> Result<(Vec<NVec3>, Vec<NVec3>)> {
        let expected = self.masses.len() * BODY_STRIDE;
        if y.len() != expected {
            return Err(SimError::LengthMismatch {
                left: expected,
                right: y.len(),
            });
        }
        let data = y.as_slice();
        let positions = data
            .chunks_exact(BODY_STRIDE)
            .map(|body| NVec3::new(body[0], body[1], body[2]))
            .collect();
        let velocities = data
            .chunks_exact(BODY_STRIDE)
            .map(|body| NVec3::new(body[3], body[4], body[5]))
            .collect();
        Ok((positions, velocities))
    }
}

/// Speed of a circular orbit of radius `r` around a point mass `m`.
pub fn circular_speed(g: f64, m: f64, r: f64) -> f64 {
    (g * m / r).sqrt()
}

impl DynamicalSystem for NBodySystem {
    fn dimension(&self) -> usize {
        self.masses.len() * BODY_STRIDE
    }

    fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
        let (positions, velocities) = self.unpack(y)?;
        let n = positions.len();
        let mut dydt = vec![0.0; n * BODY_STRIDE];

        for i in 0..n {
            if Some(i) == self.anchor {
                continue;
            }
            let ri = positions[i];
            let mut acc = NVec3::zeros();

            for j in 0..n {
                if i == j {
                    continue;
                }
                // r_ij points from body i towards body j
                let rij = positions[j] - ri;
                let dist = rij.norm();
                if dist == 0.0 {
                    match self.coincidence {
                        CoincidencePolicy::Skip => {
                            trace!(i, j, "skipping coincident body pair");
                            continue;
                        }
                        CoincidencePolicy::Fail => {
                            return Err(SimError::CoincidentBodies { i, j });
                        }
                    }
                }
                acc += rij * (self.g * self.masses[j] / (dist * dist * dist));
            }

            let base = i * BODY_STRIDE;
            dydt[base..base + 3].copy_from_slice(velocities[i].as_slice());
            dydt[base + 3..base + 6].copy_from_slice(acc.as_slice());
        }

        Ok(StateVector::new(dydt))
    }
}
