//! A runnable simulation: system, starting point, solver, time grid and the
//! labels used to present the result.

use crate::config::{RunConfig, DEFAULT_MAX_STEPS};
use anyhow::{bail, Result};
use simplot_core::integrate::{integrate, step_count};
use simplot_core::plot::PlotSpec;
use simplot_core::scenarios::Preset;
use simplot_core::{DynamicalSystem, StateVector, StepAlgorithm, Trajectory};
use std::time::Instant;
use tracing::{info, info_span};

pub struct Simulation {
    pub(crate) system: Box<dyn DynamicalSystem + Send + Sync>,
    pub names: Vec<String>,
    pub initial_state: StateVector,
    pub solver: StepAlgorithm,
    pub t0: f64,
    pub dt: f64,
    pub t_end: f64,
    pub max_steps: usize,
    title: String,
    x_label: String,
    y_label: String,
    series: Vec<(usize, String)>,
}

impl Simulation {
    pub fn from_preset(preset: Preset) -> Self {
        let t_end = preset.t_end();
        Self {
            title: preset.title.to_string(),
            x_label: preset.x_label.to_string(),
            y_label: preset.y_label.to_string(),
            series: preset
                .series
                .iter()
                .map(|(index, label)| (*index, label.to_string()))
                .collect(),
            system: preset.system,
            names: preset.names,
            initial_state: preset.initial_state,
            solver: StepAlgorithm::Rk4,
            t0: preset.t0,
            dt: preset.dt,
            t_end,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn from_config(config: &RunConfig) -> Result<Self> {
        let system = config.build_system()?;
        let names = config.variable_names();
        Ok(Self {
            title: "Simulation".to_string(),
            x_label: "Time".to_string(),
            y_label: "Value".to_string(),
            series: names.iter().cloned().enumerate().collect(),
            system: Box::new(system),
            names,
            initial_state: config.initial_state(),
            solver: config.solver,
            t0: config.t0,
            dt: config.dt,
            t_end: config.t_end,
            max_steps: config.max_steps,
        })
    }

    pub fn dimension(&self) -> usize {
        self.system.dimension()
    }

    pub fn run(&self) -> Result<Trajectory> {
        let steps = step_count(self.t0, self.dt, self.t_end)?;
        if steps > self.max_steps {
            bail!(
                "run needs {steps} steps, more than max_steps = {}",
                self.max_steps
            );
        }

        let _span = info_span!("simulate", solver = %self.solver, steps).entered();
        let started = Instant::now();
        let trajectory = integrate(
            self.system.as_ref(),
            self.solver,
            self.t0,
            self.initial_state.clone(),
            self.dt,
            self.t_end,
        )?;
        info!(
            samples = trajectory.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "integration complete"
        );
        Ok(trajectory)
    }

    pub fn plot(&self, trajectory: &Trajectory) -> Result<PlotSpec> {
        let plot = PlotSpec::new(&self.title, &self.x_label, &self.y_label)
            .with_components(trajectory, &self.series)?;
        Ok(plot)
    }

    /// Logs the last sample, one `name = value` pair per component.
    pub fn log_final_values(&self, trajectory: &Trajectory) {
        let Some(last) = trajectory.last() else {
            return;
        };
        let values = self
            .names
            .iter()
            .zip(last.state.iter())
            .map(|(name, value)| format!("{name} = {value:.6}"))
            .collect::<Vec<_>>()
            .join(", ");
        info!(t = last.t, "final values: {values}");
    }
}
