use crate::error::{Result, SimError};
use crate::state::StateVector;
use crate::traits::{DynamicalSystem, Steppable};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forward Euler: `y + dt * f(t, y)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Euler;

impl Steppable for Euler {
    fn evaluations(&self) -> usize {
        1
    }

    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector> {
        let k1 = system.derivative(t, y)?;
        y.add_scaled(&k1, dt)
    }
}

/// Heun's method (improved Euler), averaging the slopes at both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Heun;

impl Steppable for Heun {
    fn evaluations(&self) -> usize {
        2
    }

    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector> {
        // k1 = f(t, y)
        let k1 = system.derivative(t, y)?;
        // k2 = f(t + dt, y + dt*k1)
        let k2 = system.derivative(t + dt, &y.add_scaled(&k1, dt)?)?;

        y.add_scaled(&k1.add(&k2)?, 0.5 * dt)
    }
}

/// Ralston's second order method, which weights the slopes to minimize the
/// truncation error bound among two-stage methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ralston;

impl Steppable for Ralston {
    fn evaluations(&self) -> usize {
        2
    }

    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector> {
        let two_thirds = 2.0 / 3.0;

        let k1 = system.derivative(t, y)?;
        // k2 = f(t + 2/3 dt, y + 2/3 dt*k1)
        let k2 = system.derivative(t + two_thirds * dt, &y.add_scaled(&k1, two_thirds * dt)?)?;

        // y_next = y + dt * (k1/4 + 3 k2/4)
        let weighted = k1.scale(0.25).add_scaled(&k2, 0.75)?;
        y.add_scaled(&weighted, dt)
    }
}

/// Classic Runge-Kutta 4th Order Solver
#[derive(Debug, Clone, Copy, Default)]
pub struct RK4;

impl Steppable for RK4 {
    fn evaluations(&self) -> usize {
        4
    }

    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector> {
        let half = 0.5 * dt;

        // k1 = f(t, y)
        let k1 = system.derivative(t, y)?;
        // k2 = f(t + dt/2, y + dt*k1/2)
        let k2 = system.derivative(t + half, &y.add_scaled(&k1, half)?)?;
        // k3 = f(t + dt/2, y + dt*k2/2)
        let k3 = system.derivative(t + half, &y.add_scaled(&k2, half)?)?;
        // k4 = f(t + dt, y + dt*k3)
        let k4 = system.derivative(t + dt, &y.add_scaled(&k3, dt)?)?;

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        let sum = k1.add_scaled(&k2, 2.0)?.add_scaled(&k3, 2.0)?.add(&k4)?;
        y.add_scaled(&sum, dt / 6.0)
    }
}

/// The closed set of step algorithms a run can be configured with.
///
/// Chosen once before integration starts and held for the whole run.
/// Deserializes from any name or alias accepted by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepAlgorithm {
    Euler,
    Heun,
    Ralston,
    Rk4,
}

impl StepAlgorithm {
    pub const ALL: [StepAlgorithm; 4] = [
        StepAlgorithm::Euler,
        StepAlgorithm::Heun,
        StepAlgorithm::Ralston,
        StepAlgorithm::Rk4,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StepAlgorithm::Euler => "euler",
            StepAlgorithm::Heun => "heun",
            StepAlgorithm::Ralston => "ralston",
            StepAlgorithm::Rk4 => "rk4",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            StepAlgorithm::Euler => &["explicit-euler", "forward-euler"],
            StepAlgorithm::Heun => &["rk2", "improved-euler"],
            StepAlgorithm::Ralston => &["ralston-rk2"],
            StepAlgorithm::Rk4 => &["runge-kutta", "runge-kutta-4"],
        }
    }

    /// Global order of accuracy.
    pub fn order(self) -> u32 {
        match self {
            StepAlgorithm::Euler => 1,
            StepAlgorithm::Heun | StepAlgorithm::Ralston => 2,
            StepAlgorithm::Rk4 => 4,
        }
    }

    fn stepper(self) -> &'static dyn Steppable {
        match self {
            StepAlgorithm::Euler => &Euler,
            StepAlgorithm::Heun => &Heun,
            StepAlgorithm::Ralston => &Ralston,
            StepAlgorithm::Rk4 => &RK4,
        }
    }
}

impl Steppable for StepAlgorithm {
    fn evaluations(&self) -> usize {
        self.stepper().evaluations()
    }

    fn step(
        &self,
        system: &dyn DynamicalSystem,
        t: f64,
        y: &StateVector,
        dt: f64,
    ) -> Result<StateVector> {
        self.stepper().step(system, t, y, dt)
    }
}

impl fmt::Display for StepAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<'de> Deserialize<'de> for StepAlgorithm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

impl FromStr for StepAlgorithm {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        StepAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.name() == key || alg.aliases().contains(&key.as_str()))
            .ok_or_else(|| SimError::UnknownAlgorithm {
                name: s.to_string(),
                available: StepAlgorithm::ALL
                    .iter()
                    .map(|alg| alg.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{StepAlgorithm, RK4};
    use crate::error::{Result, SimError};
    use crate::state::StateVector;
    use crate::traits::{DynamicalSystem, Steppable};
    use std::cell::Cell;

    struct Decay;

    impl DynamicalSystem for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
            Ok(y.scale(-1.0))
        }
    }

    /// dy/dt = t, so every method that samples t correctly integrates it.
    struct Ramp;

    impl DynamicalSystem for Ramp {
        fn dimension(&self) -> usize {
            1
        }

        fn derivative(&self, t: f64, _y: &StateVector) -> Result<StateVector> {
            Ok(StateVector::from([t]))
        }
    }

    struct Counting {
        calls: Cell<usize>,
    }

    impl DynamicalSystem for Counting {
        fn dimension(&self) -> usize {
            1
        }

        fn derivative(&self, _t: f64, y: &StateVector) -> Result<StateVector> {
            self.calls.set(self.calls.get() + 1);
            Ok(y.clone())
        }
    }

    fn run(alg: StepAlgorithm, dt: f64, steps: usize) -> f64 {
        let mut y = StateVector::from([1.0]);
        let mut t = 0.0;
        for _ in 0..steps {
            y = alg.step(&Decay, t, &y, dt).unwrap();
            t += dt;
        }
        y.get(0).unwrap()
    }

    #[test]
    fn euler_step_matches_formula() {
        let y = StateVector::from([2.0]);
        let next = StepAlgorithm::Euler.step(&Decay, 0.0, &y, 0.1).unwrap();
        assert_eq!(next.get(0).unwrap(), 2.0 - 0.2);
    }

    #[test]
    fn second_order_methods_integrate_linear_forcing_exactly() {
        for alg in [StepAlgorithm::Heun, StepAlgorithm::Ralston, StepAlgorithm::Rk4] {
            let next = alg.step(&Ramp, 1.0, &StateVector::from([0.0]), 0.5).unwrap();
            // integral of t from 1 to 1.5
            assert!((next.get(0).unwrap() - 0.625).abs() < 1e-14, "{alg}");
        }
    }

    #[test]
    fn rk4_error_is_orders_smaller_than_euler() {
        let exact = (-1.0_f64).exp();
        let euler_err = (run(StepAlgorithm::Euler, 0.1, 10) - exact).abs();
        let rk4_err = (run(StepAlgorithm::Rk4, 0.1, 10) - exact).abs();
        assert!(rk4_err * 10.0 < euler_err, "euler {euler_err}, rk4 {rk4_err}");
        assert!(rk4_err < 1e-5);
    }

    #[test]
    fn accuracy_improves_with_order() {
        let exact = (-1.0_f64).exp();
        let errs: Vec<f64> = StepAlgorithm::ALL
            .iter()
            .map(|alg| (run(*alg, 0.05, 20) - exact).abs())
            .collect();
        assert!(errs[0] > errs[1]);
        assert!(errs[0] > errs[2]);
        assert!(errs[1] > errs[3] && errs[2] > errs[3]);
    }

    #[test]
    fn steps_are_deterministic() {
        let y = StateVector::from([0.3, -1.7]);
        for alg in StepAlgorithm::ALL {
            let a = alg.step(&Decay, 0.25, &y, 0.01).unwrap();
            let b = alg.step(&Decay, 0.25, &y, 0.01).unwrap();
            for (x, z) in a.iter().zip(b.iter()) {
                assert_eq!(x.to_bits(), z.to_bits());
            }
        }
    }

    #[test]
    fn evaluation_counts_match_declared() {
        for alg in StepAlgorithm::ALL {
            let system = Counting { calls: Cell::new(0) };
            alg.step(&system, 0.0, &StateVector::from([1.0]), 0.1).unwrap();
            assert_eq!(system.calls.get(), alg.evaluations(), "{alg}");
        }
        assert_eq!(RK4.evaluations(), 4);
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("RK4".parse::<StepAlgorithm>().unwrap(), StepAlgorithm::Rk4);
        assert_eq!("improved_euler".parse::<StepAlgorithm>().unwrap(), StepAlgorithm::Heun);
        assert_eq!(" Ralston ".parse::<StepAlgorithm>().unwrap(), StepAlgorithm::Ralston);
        let err = "leapfrog".parse::<StepAlgorithm>().unwrap_err();
        assert!(matches!(err, SimError::UnknownAlgorithm { .. }));
        assert!(err.to_string().contains("euler, heun, ralston, rk4"));
    }

    #[test]
    fn deserializes_aliases_like_from_str() {
        use serde::de::value::{Error as ValueError, StrDeserializer};
        use serde::Deserialize;

        let decode =
            |name: &str| StepAlgorithm::deserialize(StrDeserializer::<ValueError>::new(name));
        assert_eq!(decode("rk2").unwrap(), StepAlgorithm::Heun);
        assert_eq!(decode("forward_euler").unwrap(), StepAlgorithm::Euler);
        assert_eq!(decode("RK4").unwrap(), StepAlgorithm::Rk4);
        assert_eq!(decode("ralston-rk2").unwrap(), StepAlgorithm::Ralston);
        assert!(decode("leapfrog").unwrap_err().to_string().contains("leapfrog"));
    }

    #[test]
    fn order_ranks_algorithms() {
        let orders: Vec<u32> = StepAlgorithm::ALL.iter().map(|a| a.order()).collect();
        assert_eq!(orders, vec![1, 2, 2, 4]);
    }
}
