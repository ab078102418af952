//! Ready-made runs: model, parameters, initial state, time grid and labels.

use crate::error::{Result, SimError};
use crate::integrate::Trajectory;
use crate::models::{FitzHughNagumo, LotkaVolterra, Sir};
use crate::nbody::{NBodySystem, G_KM};
use crate::plot::PlotSpec;
use crate::state::StateVector;
use crate::traits::DynamicalSystem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: f64 = 86_400.0;

const SOLAR_BODIES: [&str; 11] = [
    "sun", "mercury", "venus", "earth", "moon", "mars", "jupiter", "saturn", "titan", "uranus",
    "neptune",
];

/// Masses in kg, in the order of `SOLAR_BODIES`.
const SOLAR_MASSES: [f64; 11] = [
    1.99e30, 3.30e23, 4.87e24, 5.97e24, 7.35e22, 6.42e23, 1.90e27, 5.68e26, 1.35e23, 8.68e25,
    1.02e26,
];

/// Positions in km and velocities in km/s, six values per body.
#[rustfmt::skip]
const SOLAR_STATE: [f64; 66] = [
    0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
    -5.67e7, -3.23e7, 2.58e6, 13.9, -40.3, -4.57,
    -1.04e8, -3.19e7, 5.55e6, 9.89, -33.7, -1.03,
    -1.47e8, -2.97e7, 2.75e4, 5.31, -29.3, 6.69e-4,
    -1.47e8, -2.95e7, 5.29e4, 4.53, -28.6, 6.73e-2,
    -2.15e8, 1.27e8, 7.94e6, -11.5, -18.7, -0.111,
    5.54e7, 7.62e8, -4.40e6, -13.2, 12.9, 5.22e-2,
    1.42e9, -1.91e8, -5.33e7, 0.748, 9.55, -0.196,
    1.42e9, -1.92e8, -5.28e7, 5.95, 7.68, 0.254,
    1.62e9, 2.43e9, -1.19e7, -5.72, 3.45, 0.087,
    4.47e9, -5.31e7, -1.02e8, 0.0287, 5.47, -0.113,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    LotkaVolterra,
    Sir,
    FitzHughNagumo,
    SolarSystem,
}

impl Scenario {
    pub const ALL: [Scenario; 4] = [
        Scenario::LotkaVolterra,
        Scenario::Sir,
        Scenario::FitzHughNagumo,
        Scenario::SolarSystem,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::LotkaVolterra => "lotka-volterra",
            Scenario::Sir => "sir",
            Scenario::FitzHughNagumo => "fitzhugh-nagumo",
            Scenario::SolarSystem => "solar-system",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Scenario::LotkaVolterra => "predator-prey populations",
            Scenario::Sir => "SIR epidemic with population turnover",
            Scenario::FitzHughNagumo => "FitzHugh-Nagumo neuron excitability",
            Scenario::SolarSystem => "sun, eight planets, the Moon and Titan over one year",
        }
    }

    /// Builds the full run description for this scenario.
    pub fn preset(self) -> Result<Preset> {
        let preset = match self {
            Scenario::LotkaVolterra => Preset {
                scenario: self,
                system: Box::new(LotkaVolterra::default()),
                initial_state: StateVector::from([10.0, 5.0]),
                t0: 0.0,
                dt: 0.1,
                samples: 300,
                names: names(&LotkaVolterra::variable_names()),
                title: "Lotka-Volterra Simulation",
                x_label: "Time",
                y_label: "Population",
                series: vec![(0, "Prey"), (1, "Predator")],
            },
            Scenario::Sir => Preset {
                scenario: self,
                system: Box::new(Sir::default()),
                initial_state: StateVector::from([0.99, 0.01, 0.0]),
                t0: 0.0,
                dt: 0.1,
                samples: 300,
                names: names(&Sir::variable_names()),
                title: "SIR Epidemiological Model",
                x_label: "Time",
                y_label: "Population Fraction",
                series: vec![
                    (0, "Susceptible (S)"),
                    (1, "Infected (I)"),
                    (2, "Recovered (R)"),
                ],
            },
            Scenario::FitzHughNagumo => Preset {
                scenario: self,
                system: Box::new(FitzHughNagumo::default()),
                initial_state: StateVector::from([0.0, 0.0]),
                t0: 0.0,
                dt: 0.1,
                samples: 200,
                names: names(&FitzHughNagumo::variable_names()),
                title: "FitzHugh-Nagumo Neuron Simulation",
                x_label: "Time",
                y_label: "Values",
                series: vec![(0, "Membrane Voltage (V)"), (1, "Recovery Variable (W)")],
            },
            Scenario::SolarSystem => Preset {
                scenario: self,
                system: Box::new(solar_system()?),
                initial_state: StateVector::from(SOLAR_STATE),
                t0: 0.0,
                dt: SECONDS_PER_DAY,
                samples: 365,
                names: SOLAR_BODIES
                    .iter()
                    .flat_map(|body| {
                        ["x", "y", "z", "vx", "vy", "vz"]
                            .into_iter()
                            .map(move |axis| format!("{body}_{axis}"))
                    })
                    .collect(),
                title: "Mercury Position Over 365 Days",
                x_label: "Time (s)",
                y_label: "Position (km)",
                series: vec![(6, "X Position"), (7, "Y Position"), (8, "Z Position")],
            },
        };
        Ok(preset)
    }
}

fn names(vars: &[&str]) -> Vec<String> {
    vars.iter().map(|v| v.to_string()).collect()
}

/// The sun anchored at the origin, distances in km.
pub fn solar_system() -> Result<NBodySystem> {
    NBodySystem::new(SOLAR_MASSES.to_vec(), G_KM)
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let found = match key.as_str() {
            "lotka-volterra" | "lv" | "predator-prey" => Scenario::LotkaVolterra,
            "sir" => Scenario::Sir,
            "fitzhugh-nagumo" | "fhn" => Scenario::FitzHughNagumo,
            "solar-system" | "solar" => Scenario::SolarSystem,
            _ => {
                return Err(SimError::UnknownScenario {
                    name: s.to_string(),
                    available: Scenario::ALL
                        .iter()
                        .map(|sc| sc.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        };
        Ok(found)
    }
}

/// A fully parameterized run.
pub struct Preset {
    pub scenario: Scenario,
    pub system: Box<dyn DynamicalSystem + Send + Sync>,
    pub initial_state: StateVector,
    pub t0: f64,
    pub dt: f64,
    /// Number of recorded samples, the initial one included.
    pub samples: usize,
    /// One name per state component.
    pub names: Vec<String>,
    pub title: &'static str,
    pub x_label: &'static str,
    pub y_label: &'static str,
    /// `(state component, label)` pairs that make up the default plot.
    pub series: Vec<(usize, &'static str)>,
}

impl Preset {
    pub fn t_end(&self) -> f64 {
        self.t0 + self.samples.saturating_sub(1) as f64 * self.dt
    }

    pub fn plot(&self, trajectory: &Trajectory) -> Result<PlotSpec> {
        PlotSpec::new(self.title, self.x_label, self.y_label)
            .with_components(trajectory, &self.series)
    }
}

impl fmt::Debug for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preset")
            .field("scenario", &self.scenario)
            .field("dimension", &self.system.dimension())
            .field("t0", &self.t0)
            .field("dt", &self.dt)
            .field("samples", &self.samples)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{Scenario, SOLAR_BODIES};
    use crate::error::SimError;
    use crate::integrate::integrate;
    use crate::nbody::NBodySystem;
    use crate::solvers::StepAlgorithm;

    #[test]
    fn every_preset_is_consistent() {
        for scenario in Scenario::ALL {
            let preset = scenario.preset().unwrap();
            assert_eq!(preset.system.dimension(), preset.initial_state.len(), "{scenario}");
            assert_eq!(preset.names.len(), preset.initial_state.len(), "{scenario}");
            assert!(preset
                .series
                .iter()
                .all(|(index, _)| *index < preset.initial_state.len()));
        }
    }

    #[test]
    fn presets_produce_requested_sample_count() {
        for scenario in [Scenario::LotkaVolterra, Scenario::Sir, Scenario::FitzHughNagumo] {
            let preset = scenario.preset().unwrap();
            let traj = integrate(
                preset.system.as_ref(),
                StepAlgorithm::Rk4,
                preset.t0,
                preset.initial_state.clone(),
                preset.dt,
                preset.t_end(),
            )
            .unwrap();
            assert_eq!(traj.len(), preset.samples, "{scenario}");
            let plot = preset.plot(&traj).unwrap();
            assert_eq!(plot.series.len(), preset.series.len());
        }
    }

    #[test]
    fn solar_system_keeps_mercury_bound_for_a_year() {
        let preset = Scenario::SolarSystem.preset().unwrap();
        assert_eq!(preset.names[6], "mercury_x");
        assert_eq!(preset.names.len(), SOLAR_BODIES.len() * 6);

        let traj = integrate(
            preset.system.as_ref(),
            StepAlgorithm::Rk4,
            preset.t0,
            preset.initial_state.clone(),
            preset.dt,
            preset.t_end(),
        )
        .unwrap();
        assert_eq!(traj.len(), 365);

        let sun = NBodySystem::position(&traj.samples()[364].state, 0).unwrap();
        assert_eq!(sun.norm(), 0.0);
        for sample in traj.samples() {
            let r = NBodySystem::position(&sample.state, 1).unwrap().norm();
            // Mercury stays between roughly 0.3 and 0.47 AU.
            assert!(r > 4.0e7 && r < 7.5e7, "mercury at {r} km, t = {}", sample.t);
        }
    }

    #[test]
    fn parses_names_and_aliases() {
        assert_eq!("LV".parse::<Scenario>().unwrap(), Scenario::LotkaVolterra);
        assert_eq!("solar_system".parse::<Scenario>().unwrap(), Scenario::SolarSystem);
        assert_eq!("fhn".parse::<Scenario>().unwrap(), Scenario::FitzHughNagumo);
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>().unwrap(), scenario);
        }
        assert!(matches!(
            "lorenz".parse::<Scenario>(),
            Err(SimError::UnknownScenario { .. })
        ));
    }
}
