use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use simplot_core::plot::PlotSpec;
use simplot_core::{Sample, Trajectory};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One row per sample: `t,<names...>`
    #[default]
    Csv,
    /// Variable names and samples as JSON
    Json,
    /// Plot description (title, axis labels, series) as JSON
    Plot,
}

#[derive(Serialize)]
struct TrajectoryRecord<'a> {
    names: &'a [String],
    samples: &'a [Sample],
}

/// Opens `path` for writing, or standard output when there is none.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

pub fn write_csv<W: Write>(out: &mut W, names: &[String], trajectory: &Trajectory) -> io::Result<()> {
    write!(out, "t")?;
    for name in names {
        write!(out, ",{name}")?;
    }
    writeln!(out)?;
    for sample in trajectory.samples() {
        write!(out, "{}", sample.t)?;
        for value in sample.state.iter() {
            write!(out, ",{value}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn write_json<W: Write>(out: &mut W, names: &[String], trajectory: &Trajectory) -> Result<()> {
    let record = TrajectoryRecord {
        names,
        samples: trajectory.samples(),
    };
    serde_json::to_writer_pretty(&mut *out, &record)?;
    writeln!(out)?;
    Ok(())
}

pub fn write_plot<W: Write>(out: &mut W, plot: &PlotSpec) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, plot)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{write_csv, write_json, write_plot};
    use simplot_core::plot::PlotSpec;
    use simplot_core::{Sample, Trajectory};

    fn sample_trajectory() -> Trajectory {
        [(0.0, [1.0, 2.0]), (0.5, [1.5, -0.25])]
            .into_iter()
            .map(|(t, y)| Sample { t, state: y.into() })
            .collect()
    }

    fn names() -> Vec<String> {
        vec!["x".to_string(), "y".to_string()]
    }

    #[test]
    fn csv_has_header_and_one_row_per_sample() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &names(), &sample_trajectory()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "t,x,y\n0,1,2\n0.5,1.5,-0.25\n");
    }

    #[test]
    fn json_lists_names_and_samples() {
        let mut buf = Vec::new();
        write_json(&mut buf, &names(), &sample_trajectory()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["names"][1], "y");
        assert_eq!(value["samples"][1]["t"], 0.5);
        assert_eq!(value["samples"][1]["state"][1], -0.25);
    }

    #[test]
    fn plot_is_written_as_json() {
        let plot = PlotSpec::from_trajectory("demo", &sample_trajectory(), &["x"]).unwrap();
        let mut buf = Vec::new();
        write_plot(&mut buf, &plot).unwrap();
        let back: PlotSpec = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, plot);
    }
}
