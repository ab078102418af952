use crate::error::{Result, SimError};
use crate::integrate::Trajectory;
use serde::{Deserialize, Serialize};

/// A named line of `(x, y)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
}

impl Series {
    pub fn new(label: impl Into<String>, points: Vec<(f64, f64)>) -> Result<Self> {
        let label = label.into();
        if points.is_empty() {
            return Err(SimError::EmptySeries(label));
        }
        Ok(Self { label, points })
    }
}

/// Everything a renderer needs to draw one line chart.
///
/// Built explicitly and handed to whatever draws it; there is no shared
/// figure state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlotSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub series: Vec<Series>,
}

impl PlotSpec {
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    /// Adds one time series per `(component index, label)` pair.
    pub fn with_components<S: AsRef<str>>(
        mut self,
        trajectory: &Trajectory,
        components: &[(usize, S)],
    ) -> Result<Self> {
        for (index, label) in components {
            let points = trajectory.component(*index)?;
            self.series.push(Series::new(label.as_ref(), points)?);
        }
        Ok(self)
    }

    /// One series per state component, labelled with `labels` in order.
    pub fn from_trajectory<S: AsRef<str>>(
        title: impl Into<String>,
        trajectory: &Trajectory,
        labels: &[S],
    ) -> Result<Self> {
        let components: Vec<(usize, &str)> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (i, label.as_ref()))
            .collect();
        PlotSpec::new(title, "Time", "Value").with_components(trajectory, &components)
    }
}
