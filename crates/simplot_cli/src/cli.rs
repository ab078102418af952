//! Command line interface for simplot

use crate::config::{EquationConfig, RunConfig};
use crate::output::{open_output, write_csv, write_json, write_plot, OutputFormat};
use crate::system::Simulation;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use simplot_core::scenarios::Scenario;
use simplot_core::StepAlgorithm;
use std::path::PathBuf;
use tracing::info;

/// simplot - fixed-step ODE simulator
#[derive(Parser, Debug)]
#[command(name = "simplot", version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a built-in scenario
    Run(RunArgs),
    /// Integrate equations from a config file or the command line
    Solve(SolveArgs),
    /// List scenarios and step algorithms
    List,
}

#[derive(clap::Args, Debug)]
pub struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Csv)]
    pub format: OutputFormat,

    /// Write to FILE instead of standard output
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Scenario name (see `simplot list`)
    pub scenario: Scenario,

    /// Step algorithm (e.g., euler, heun, ralston, rk4)
    #[arg(short, long, value_name = "NAME")]
    pub solver: Option<StepAlgorithm>,

    /// Step size (overrides the scenario)
    #[arg(long, value_name = "DT")]
    pub dt: Option<f64>,

    /// End time (overrides the scenario)
    #[arg(long, value_name = "T", allow_negative_numbers = true)]
    pub t_end: Option<f64>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(clap::Args, Debug)]
pub struct SolveArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE", conflicts_with = "equation")]
    pub config: Option<PathBuf>,

    /// Right-hand side of one equation; repeat once per variable
    #[arg(short, long, value_name = "EXPR", allow_hyphen_values = true)]
    pub equation: Vec<String>,

    /// Initial value of each variable, in equation order
    #[arg(short, long, value_name = "Y0", allow_negative_numbers = true)]
    pub initial: Vec<f64>,

    /// Variable names, in equation order (default y0, y1, ...)
    #[arg(short, long, value_name = "NAME")]
    pub name: Vec<String>,

    /// Parameter value, as name=value
    #[arg(short, long, value_name = "NAME=VALUE", value_parser = parse_param)]
    pub param: Vec<(String, f64)>,

    /// Start time
    #[arg(long, value_name = "T", allow_negative_numbers = true)]
    pub t0: Option<f64>,

    /// Step size
    #[arg(long, value_name = "DT")]
    pub dt: Option<f64>,

    /// End time
    #[arg(long, value_name = "T", allow_negative_numbers = true)]
    pub t_end: Option<f64>,

    /// Step algorithm (e.g., euler, heun, ralston, rk4)
    #[arg(short, long, value_name = "NAME")]
    pub solver: Option<StepAlgorithm>,

    #[command(flatten)]
    pub output: OutputArgs,
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|err| format!("invalid value for '{}': {err}", name.trim()))?;
    Ok((name.trim().to_string(), value))
}

pub fn execute(args: Args) -> Result<()> {
    match args.command {
        Command::Run(run) => handle_run(run),
        Command::Solve(solve) => handle_solve(solve),
        Command::List => {
            handle_list();
            Ok(())
        }
    }
}

/// Prints available scenarios and step algorithms
pub fn handle_list() {
    println!("Available scenarios:");
    for scenario in Scenario::ALL {
        println!("  - {:<16} {}", scenario.name(), scenario.description());
    }

    println!("\nAvailable step algorithms:");
    for algorithm in StepAlgorithm::ALL {
        let aliases = algorithm.aliases();
        if aliases.is_empty() {
            println!("  - {algorithm} (order {})", algorithm.order());
        } else {
            println!(
                "  - {algorithm} (order {}, aliases: {})",
                algorithm.order(),
                aliases.join(", ")
            );
        }
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let mut sim = Simulation::from_preset(args.scenario.preset()?);
    if let Some(solver) = args.solver {
        info!("Using step algorithm: {solver}");
        sim.solver = solver;
    }
    if let Some(dt) = args.dt {
        info!("Overriding step size to: {dt}");
        sim.dt = dt;
    }
    if let Some(t_end) = args.t_end {
        info!("Overriding end time to: {t_end}");
        sim.t_end = t_end;
    }
    info!(scenario = %args.scenario, "running scenario");
    emit(&sim, &args.output)
}

/// Builds the run config from a file or inline arguments, then applies
/// command-line overrides.
pub fn load_solve_config(args: &SolveArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => inline_config(args)?,
    };
    if let Some(t0) = args.t0 {
        config.t0 = t0;
    }
    if let Some(dt) = args.dt {
        config.dt = dt;
    }
    if let Some(t_end) = args.t_end {
        config.t_end = t_end;
    }
    if let Some(solver) = args.solver {
        config.solver = solver;
    }
    config.validate()?;
    Ok(config)
}

fn inline_config(args: &SolveArgs) -> Result<RunConfig> {
    if args.equation.is_empty() {
        bail!("give either --config FILE or at least one --equation");
    }
    if args.initial.len() != args.equation.len() {
        bail!(
            "{} equations but {} initial values",
            args.equation.len(),
            args.initial.len()
        );
    }
    if !args.name.is_empty() && args.name.len() != args.equation.len() {
        bail!(
            "{} equations but {} variable names",
            args.equation.len(),
            args.name.len()
        );
    }

    let equations = args
        .equation
        .iter()
        .zip(&args.initial)
        .enumerate()
        .map(|(i, (expr, initial))| EquationConfig {
            name: args.name.get(i).cloned(),
            expr: expr.clone(),
            initial: *initial,
        })
        .collect();
    Ok(RunConfig {
        params: args.param.iter().cloned().collect(),
        equations,
        ..RunConfig::default()
    })
}

fn handle_solve(args: SolveArgs) -> Result<()> {
    let config = load_solve_config(&args)?;
    let sim = Simulation::from_config(&config)?;
    emit(&sim, &args.output)
}

fn emit(sim: &Simulation, output: &OutputArgs) -> Result<()> {
    let trajectory = sim.run()?;
    sim.log_final_values(&trajectory);

    let mut out = open_output(output.output.as_deref())?;
    match output.format {
        OutputFormat::Csv => write_csv(&mut out, &sim.names, &trajectory)?,
        OutputFormat::Json => write_json(&mut out, &sim.names, &trajectory)?,
        OutputFormat::Plot => write_plot(&mut out, &sim.plot(&trajectory)?)?,
    }
    out.flush()?;
    if let Some(path) = &output.output {
        info!("Wrote {:?} output to {}", output.format, path.display());
    }
    Ok(())
}
