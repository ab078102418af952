use crate::error::{Result, SimError};
use crate::solvers::StepAlgorithm;
use crate::state::StateVector;
use crate::traits::{DynamicalSystem, Steppable};
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tracing::{debug, warn};

/// Tolerance on `(t_end - t0) / dt` when counting steps, so that an end time
/// that is a whole number of steps away is reached despite rounding.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

/// Largest number of steps a single run may take. Leaves headroom so that
/// sample and evaluation counts derived from it cannot overflow.
pub const MAX_STEP_COUNT: usize = usize::MAX / 8;

/// One recorded point of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    pub state: StateVector,
}

/// Samples `(t, y)` of an integration run, in increasing time order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    samples: Vec<Sample>,
}

impl Trajectory {
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn final_state(&self) -> Option<&StateVector> {
        self.samples.last().map(|s| &s.state)
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    /// Time series of one state component, as `(t, y[index])` points.
    pub fn component(&self, index: usize) -> Result<Vec<(f64, f64)>> {
        self.samples
            .iter()
            .map(|s| Ok((s.t, s.state.get(index)?)))
            .collect()
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

impl FromIterator<Sample> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Number of steps between `t0` and `t_end`: the last sample is the latest
/// `t0 + k * dt` that does not pass `t_end`.
pub fn step_count(t0: f64, dt: f64, t_end: f64) -> Result<usize> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(SimError::InvalidStep(dt));
    }
    if !t0.is_finite() || !t_end.is_finite() || t_end < t0 {
        return Err(SimError::InvalidTimeSpan { t0, t_end });
    }
    let ratio = (t_end - t0) / dt;
    let count = (ratio + STEP_COUNT_TOLERANCE * ratio.max(1.0)).floor();
    if !count.is_finite() || count >= MAX_STEP_COUNT as f64 {
        return Err(SimError::TooManySteps { t0, t_end, dt });
    }
    Ok(count as usize)
}

enum Cursor {
    Ready(StateVector),
    Failed(SimError),
    Done,
}

/// Lazily integrates a system, yielding one sample at a time.
///
/// The first item is the initial sample at `t0`. After a step fails, the
/// error is yielded once and the stream ends. A fresh run needs a fresh
/// `Integration`.
pub struct Integration<'a> {
    system: &'a dyn DynamicalSystem,
    algorithm: StepAlgorithm,
    t0: f64,
    dt: f64,
    steps: usize,
    next_index: usize,
    cursor: Cursor,
}

impl<'a> Integration<'a> {
    pub fn new(
        system: &'a dyn DynamicalSystem,
        algorithm: StepAlgorithm,
        t0: f64,
        y0: StateVector,
        dt: f64,
        t_end: f64,
    ) -> Result<Self> {
        if y0.is_empty() || system.dimension() == 0 {
            return Err(SimError::EmptySystem);
        }
        if y0.len() != system.dimension() {
            return Err(SimError::LengthMismatch {
                left: system.dimension(),
                right: y0.len(),
            });
        }
        let steps = step_count(t0, dt, t_end)?;
        debug!(
            %algorithm,
            dimension = y0.len(),
            steps,
            evaluations = steps.saturating_mul(algorithm.evaluations()),
            "starting integration"
        );

        Ok(Self {
            system,
            algorithm,
            t0,
            dt,
            steps,
            next_index: 0,
            cursor: Cursor::Ready(y0),
        })
    }

    /// Total number of steps the run will take.
    pub fn steps(&self) -> usize {
        self.steps
    }

    // Multiplying instead of accumulating keeps sample times free of drift.
    fn time_at(&self, index: usize) -> f64 {
        self.t0 + index as f64 * self.dt
    }
}

impl Iterator for Integration<'_> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let state = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => return None,
            Cursor::Failed(err) => return Some(Err(err)),
            Cursor::Ready(state) => state,
        };
        let index = self.next_index;
        let t = self.time_at(index);
        self.next_index += 1;

        if index < self.steps {
            self.cursor = match self.algorithm.step(self.system, t, &state, self.dt) {
                Ok(next) => {
                    if !next.is_finite() && state.is_finite() {
                        warn!(t = self.time_at(index + 1), "state became non-finite");
                    }
                    Cursor::Ready(next)
                }
                Err(err) => {
                    debug!(t, error = %err, "integration step failed");
                    Cursor::Failed(err)
                }
            };
        }

        Some(Ok(Sample { t, state }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.cursor {
            Cursor::Done => (0, Some(0)),
            Cursor::Failed(_) => (1, Some(1)),
            Cursor::Ready(_) => {
                let remaining = (self.steps - self.next_index).saturating_add(1);
                (1, Some(remaining))
            }
        }
    }
}

/// Marks that iteration always ends after the first `None`.
impl FusedIterator for Integration<'_> {}

/// Integrates `system` from `(t0, y0)` to `t_end` with a fixed step `dt`,
/// collecting every sample.
pub fn integrate(
    system: &dyn DynamicalSystem,
    algorithm: StepAlgorithm,
    t0: f64,
    y0: StateVector,
    dt: f64,
    t_end: f64,
) -> Result<Trajectory> {
    let run = Integration::new(system, algorithm, t0, y0, dt, t_end)?;
    let trajectory = run.collect::<Result<Trajectory>>()?;
    debug!(samples = trajectory.len(), "integration finished");
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::{integrate, step_count, Integration};
    use crate::error::{Result, SimError};
    use crate::models::{FnSystem, LotkaVolterra};
    use crate::solvers::StepAlgorithm;
    use crate::state::StateVector;
    use crate::traits::DynamicalSystem;

    struct Exploding;

    impl DynamicalSystem for Exploding {
        fn dimension(&self) -> usize {
            1
        }

        fn derivative(&self, t: f64, y: &StateVector) -> Result<StateVector> {
            if t >= 0.25 {
                return Err(SimError::CoincidentBodies { i: 0, j: 1 });
            }
            Ok(y.clone())
        }
    }

    fn decay() -> FnSystem<impl Fn(f64, &[f64]) -> Vec<f64>> {
        FnSystem::new(1, |_t, y: &[f64]| vec![-y[0]])
    }

    #[test]
    fn step_count_handles_inexact_boundaries() {
        assert_eq!(step_count(0.0, 0.1, 1.0).unwrap(), 10);
        assert_eq!(step_count(0.0, 0.1, 30.0).unwrap(), 300);
        assert_eq!(step_count(0.0, 0.3, 1.0).unwrap(), 3);
        assert_eq!(step_count(2.0, 0.5, 2.0).unwrap(), 0);
        assert_eq!(step_count(0.0, 86400.0, 86400.0 * 365.0).unwrap(), 365);
    }

    #[test]
    fn step_count_rejects_bad_inputs() {
        assert_eq!(step_count(0.0, 0.0, 1.0).unwrap_err(), SimError::InvalidStep(0.0));
        assert!(matches!(step_count(0.0, -0.1, 1.0), Err(SimError::InvalidStep(_))));
        assert!(matches!(step_count(0.0, f64::NAN, 1.0), Err(SimError::InvalidStep(_))));
        assert!(matches!(
            step_count(1.0, 0.1, 0.0),
            Err(SimError::InvalidTimeSpan { .. })
        ));
    }

    #[test]
    fn step_count_rejects_unrepresentable_runs() {
        assert!(matches!(
            step_count(0.0, 1e-300, 1.0),
            Err(SimError::TooManySteps { .. })
        ));
        assert!(matches!(
            step_count(-1e308, 1e-10, 1e308),
            Err(SimError::TooManySteps { .. })
        ));
        assert_eq!(step_count(0.0, 1e-6, 1.0).unwrap(), 1_000_000);
    }

    #[test]
    fn tiny_step_fails_instead_of_overflowing() {
        let system = decay();
        let result = integrate(&system, StepAlgorithm::Euler, 0.0, [1.0].into(), 1e-300, 1.0);
        assert!(matches!(result, Err(SimError::TooManySteps { .. })));
        assert!(
            Integration::new(&system, StepAlgorithm::Rk4, 0.0, [1.0].into(), 1e-300, 1.0).is_err()
        );
    }

    #[test]
    fn trajectory_samples_every_step_including_end() {
        let system = decay();
        let traj = integrate(&system, StepAlgorithm::Euler, 0.0, [1.0].into(), 0.1, 1.0).unwrap();
        assert_eq!(traj.len(), 11);
        let times = traj.times();
        assert_eq!(times[0], 0.0);
        assert!((times[10] - 1.0).abs() < 1e-12);
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        let expected = 0.9_f64.powi(10);
        let last = traj.final_state().unwrap().get(0).unwrap();
        assert!((last - expected).abs() < 1e-12);
    }

    #[test]
    fn trajectory_starts_at_initial_state() {
        let system = LotkaVolterra::default();
        let y0 = StateVector::from([10.0, 5.0]);
        let traj = integrate(&system, StepAlgorithm::Rk4, 3.0, y0.clone(), 0.1, 4.0).unwrap();
        let first = &traj.samples()[0];
        assert_eq!(first.t, 3.0);
        assert_eq!(first.state, y0);
        let prey = traj.component(0).unwrap();
        assert_eq!(prey.len(), traj.len());
        assert_eq!(prey[0], (3.0, 10.0));
        assert!(traj.component(2).is_err());
    }

    #[test]
    fn rk4_beats_euler_over_an_interval() {
        let system = decay();
        let exact = (-2.0_f64).exp();
        let err = |alg| {
            let traj = integrate(&system, alg, 0.0, [1.0].into(), 0.1, 2.0).unwrap();
            (traj.final_state().unwrap().get(0).unwrap() - exact).abs()
        };
        assert!(err(StepAlgorithm::Rk4) * 10.0 < err(StepAlgorithm::Euler));
    }

    #[test]
    fn rejects_invalid_runs() {
        let system = decay();
        assert_eq!(
            integrate(&system, StepAlgorithm::Rk4, 0.0, [1.0].into(), 0.0, 1.0).unwrap_err(),
            SimError::InvalidStep(0.0)
        );
        assert_eq!(
            integrate(&system, StepAlgorithm::Rk4, 0.0, StateVector::zeros(0), 0.1, 1.0)
                .unwrap_err(),
            SimError::EmptySystem
        );
        assert!(matches!(
            integrate(&system, StepAlgorithm::Rk4, 0.0, [1.0, 2.0].into(), 0.1, 1.0),
            Err(SimError::LengthMismatch { left: 1, right: 2 })
        ));
    }

    #[test]
    fn streaming_yields_samples_then_error() {
        let run = Integration::new(&Exploding, StepAlgorithm::Euler, 0.0, [1.0].into(), 0.1, 1.0)
            .unwrap();
        assert_eq!(run.steps(), 10);
        let items: Vec<_> = run.collect();
        // Samples at t = 0.0, 0.1, 0.2, 0.3 are recorded; the step out of
        // t = 0.3 fails.
        assert_eq!(items.len(), 5);
        assert!(items[..4].iter().all(|item| item.is_ok()));
        assert!(items[4].is_err());

        let mut run = Integration::new(&Exploding, StepAlgorithm::Euler, 0.0, [1.0].into(), 0.1, 1.0)
            .unwrap();
        assert!(run.by_ref().nth(4).is_some_and(|item| item.is_err()));
        assert!(run.next().is_none());
        assert!(run.next().is_none());

        let system = Exploding;
        let result = integrate(&system, StepAlgorithm::Euler, 0.0, [1.0].into(), 0.1, 1.0);
        assert_eq!(result.unwrap_err(), SimError::CoincidentBodies { i: 0, j: 1 });
    }

    #[test]
    fn streaming_matches_eager_run() {
        let system = LotkaVolterra::default();
        let eager = integrate(&system, StepAlgorithm::Heun, 0.0, [10.0, 5.0].into(), 0.05, 2.0)
            .unwrap();
        let lazy = Integration::new(&system, StepAlgorithm::Heun, 0.0, [10.0, 5.0].into(), 0.05, 2.0)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(eager.samples(), lazy.as_slice());
    }
}
