use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable fixed-length vector of `f64` values.
///
/// Every arithmetic operation returns a fresh vector. Binary operations check
/// that both operands have the same length instead of truncating.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateVector {
    data: Vec<f64>,
}

impl StateVector {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.data.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn get(&self, i: usize) -> Result<f64> {
        self.data
            .get(i)
            .copied()
            .ok_or(SimError::IndexOutOfBounds {
                index: i,
                len: self.data.len(),
            })
    }

    /// Overwrites element `i`. Only meant for populating a freshly built
    /// vector; stepping code never mutates a vector it did not just create.
    pub fn set(&mut self, i: usize, value: f64) -> Result<()> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(i)
            .ok_or(SimError::IndexOutOfBounds { index: i, len })?;
        *slot = value;
        Ok(())
    }

    pub fn add(&self, other: &StateVector) -> Result<StateVector> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn subtract(&self, other: &StateVector) -> Result<StateVector> {
        self.zip_with(other, |a, b| a - b)
    }

    /// Returns `self + c * other` in a single pass.
    pub fn add_scaled(&self, other: &StateVector, c: f64) -> Result<StateVector> {
        self.zip_with(other, |a, b| a + c * b)
    }

    pub fn scale(&self, c: f64) -> StateVector {
        StateVector::new(self.data.iter().map(|v| v * c).collect())
    }

    pub fn dot(&self, other: &StateVector) -> Result<f64> {
        self.check_len(other)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Euclidean norm.
    pub fn magnitude(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    pub fn normalize(&self) -> Result<StateVector> {
        let mag = self.magnitude();
        if mag == 0.0 {
            return Err(SimError::DivideByZero);
        }
        Ok(self.scale(1.0 / mag))
    }

    /// Copies the half-open range `[start, end)` into a new vector.
    pub fn slice(&self, start: usize, end: usize) -> Result<StateVector> {
        if end > self.data.len() || start >= end {
            return Err(SimError::InvalidRange {
                start,
                end,
                len: self.data.len(),
            });
        }
        Ok(StateVector::new(self.data[start..end].to_vec()))
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    fn check_len(&self, other: &StateVector) -> Result<()> {
        if self.data.len() != other.data.len() {
            return Err(SimError::LengthMismatch {
                left: self.data.len(),
                right: other.data.len(),
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &StateVector, f: impl Fn(f64, f64) -> f64) -> Result<StateVector> {
        self.check_len(other)?;
        Ok(StateVector::new(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        ))
    }
}

impl From<Vec<f64>> for StateVector {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

impl From<&[f64]> for StateVector {
    fn from(data: &[f64]) -> Self {
        Self::new(data.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for StateVector {
    fn from(data: [f64; N]) -> Self {
        Self::new(data.to_vec())
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}
