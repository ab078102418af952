//! TOML description of a user-defined run.
//!
//! ```toml
//! solver = "rk4"
//! dt = 0.1
//! t_end = 30.0
//!
//! [params]
//! alpha = 1.1
//!
//! [[equations]]
//! name = "prey"
//! expr = "alpha * prey - 0.4 * prey * predator"
//! initial = 10.0
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use simplot_core::equation_engine::EquationSystem;
use simplot_core::integrate::step_count;
use simplot_core::{StateVector, StepAlgorithm};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

pub const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// One state variable: its formula and starting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EquationConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub expr: String,
    pub initial: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub solver: StepAlgorithm,
    pub t0: f64,
    pub dt: f64,
    pub t_end: f64,
    /// Upper bound on the number of steps a run may take.
    pub max_steps: usize,
    pub params: BTreeMap<String, f64>,
    pub equations: Vec<EquationConfig>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            solver: StepAlgorithm::Rk4,
            t0: 0.0,
            dt: 0.01,
            t_end: 10.0,
            max_steps: DEFAULT_MAX_STEPS,
            params: BTreeMap::new(),
            equations: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Names of the state variables, `y<i>` where none was given.
    pub fn variable_names(&self) -> Vec<String> {
        self.equations
            .iter()
            .enumerate()
            .map(|(i, eq)| eq.name.clone().unwrap_or_else(|| format!("y{i}")))
            .collect()
    }

    pub fn initial_state(&self) -> StateVector {
        self.equations.iter().map(|eq| eq.initial).collect::<Vec<_>>().into()
    }

    /// Checks everything that can be checked without compiling the formulas.
    pub fn validate(&self) -> Result<()> {
        if self.equations.is_empty() {
            bail!("no equations given");
        }
        let steps = step_count(self.t0, self.dt, self.t_end)?;
        if steps > self.max_steps {
            bail!(
                "run needs {steps} steps, more than max_steps = {}",
                self.max_steps
            );
        }

        let mut seen = HashSet::new();
        for name in self.variable_names() {
            if !is_identifier(&name) {
                bail!("'{name}' is not a valid variable name");
            }
            if !seen.insert(name.clone()) {
                bail!("variable '{name}' is defined twice");
            }
            if self.params.contains_key(&name) {
                bail!("'{name}' is both a variable and a parameter");
            }
        }
        for (name, value) in &self.params {
            if !is_identifier(name) {
                bail!("'{name}' is not a valid parameter name");
            }
            if !value.is_finite() {
                bail!("parameter '{name}' is not finite");
            }
        }
        if !self.initial_state().is_finite() {
            bail!("initial values must be finite");
        }
        Ok(())
    }

    /// Validates the config and compiles its formulas.
    pub fn build_system(&self) -> Result<EquationSystem> {
        self.validate()?;
        let names = self.variable_names();
        let exprs: Vec<&str> = self.equations.iter().map(|eq| eq.expr.as_str()).collect();
        let params: Vec<(String, f64)> = self
            .params
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        let system = EquationSystem::from_strings(&exprs, Some(names.as_slice()), &params)?;
        Ok(system)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{RunConfig, DEFAULT_MAX_STEPS};
    use simplot_core::{DynamicalSystem, StateVector, StepAlgorithm};

    const LOTKA_VOLTERRA: &str = r#"
        solver = "heun"
        dt = 0.1
        t_end = 30.0

        [params]
        alpha = 1.1
        beta = 0.4
        delta = 0.1
        gamma = 0.4

        [[equations]]
        name = "prey"
        expr = "alpha * prey - beta * prey * predator"
        initial = 10.0

        [[equations]]
        name = "predator"
        expr = "delta * prey * predator - gamma * predator"
        initial = 5.0
    "#;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        match result {
            Ok(value) => panic!("expected error containing '{needle}', got {value:?}"),
            Err(err) => {
                let message = format!("{err:#}");
                assert!(
                    message.contains(needle),
                    "error '{message}' does not contain '{needle}'"
                );
            }
        }
    }

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        assert_eq!(config.solver, StepAlgorithm::Heun);
        assert_eq!(config.t0, 0.0);
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.params.len(), 4);
        assert_eq!(config.variable_names(), vec!["prey", "predator"]);
        assert_eq!(config.initial_state(), StateVector::from([10.0, 5.0]));

        let system = config.build_system().unwrap();
        let dy = system
            .derivative(0.0, &config.initial_state())
            .unwrap();
        assert!((dy.get(0).unwrap() - (11.0 - 20.0)).abs() < 1e-12);
        assert!((dy.get(1).unwrap() - (5.0 - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn unnamed_equations_get_default_names() {
        let config = RunConfig::from_toml_str(
            r#"
            [[equations]]
            expr = "-y0"
            initial = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.solver, StepAlgorithm::Rk4);
        assert_eq!(config.variable_names(), vec!["y0"]);
        assert!(config.build_system().is_ok());
    }

    #[test]
    fn solver_accepts_aliases() {
        let config = RunConfig::from_toml_str("solver = \"rk2\"").unwrap();
        assert_eq!(config.solver, StepAlgorithm::Heun);
        let config = RunConfig::from_toml_str("solver = \"Runge_Kutta\"").unwrap();
        assert_eq!(config.solver, StepAlgorithm::Rk4);
    }

    #[test]
    fn rejects_malformed_configs() {
        assert!(RunConfig::from_toml_str("solver = \"verlet\"").is_err());
        assert!(RunConfig::from_toml_str("tend = 3.0").is_err());
        assert_err_contains(RunConfig::default().validate(), "no equations");
    }

    #[test]
    fn rejects_runs_over_step_budget() {
        let mut config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        config.max_steps = 100;
        assert_err_contains(config.validate(), "300 steps");
        config.dt = -1.0;
        assert_err_contains(config.validate(), "Step size");
    }

    #[test]
    fn rejects_name_clashes() {
        let mut config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        config.params.insert("prey".to_string(), 1.0);
        assert_err_contains(config.validate(), "both a variable and a parameter");

        let mut config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        config.equations[1].name = Some("prey".to_string());
        assert_err_contains(config.validate(), "defined twice");

        config.equations[1].name = Some("2x".to_string());
        assert_err_contains(config.validate(), "not a valid variable name");
    }

    #[test]
    fn reports_formula_errors() {
        let mut config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        config.equations[1].expr = "delta * prey * wolves".to_string();
        assert_err_contains(config.build_system(), "wolves");
    }

    #[test]
    fn serializes_back_to_toml() {
        let config = RunConfig::from_toml_str(LOTKA_VOLTERRA).unwrap();
        let text = config.to_toml_string().unwrap();
        assert_eq!(RunConfig::from_toml_str(&text).unwrap(), config);
    }
}
