// Result table - one row per swept radius
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::cli_api::SimulationError;

/// What the `value` column of a table holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    MeanDistance,
    SuccessCount,
    SuccessRate,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::MeanDistance => "Average Distance",
            Metric::SuccessCount => "Success Count",
            Metric::SuccessRate => "Success Rate",
        }
    }

    /// Whether larger values are the better place to stand
    pub fn higher_is_better(&self) -> bool {
        !matches!(self, Metric::MeanDistance)
    }
}

// Output format for rendered tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `Radius: <r> | Average Distance: <v>`
    Labeled,
    /// `<r>, <v>`
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub radius: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    metric: Metric,
    rows: Vec<ResultRow>,
}

// Summary statistics over the value column
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: ResultRow,
    pub max: ResultRow,
    pub best: ResultRow,
}

impl ResultTable {
    pub fn new(metric: Metric, rows: Vec<ResultRow>) -> Self {
        Self { metric, rows }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResultRow> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<ResultRow> {
        self.rows
    }

    pub fn summary(&self) -> Option<TableSummary> {
        let first = *self.rows.first()?;
        let n = self.rows.len() as f64;

        let mean = self.rows.iter().map(|r| r.value).sum::<f64>() / n;
        let variance = if self.rows.len() > 1 {
            self.rows.iter().map(|r| (r.value - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };

        // First row wins ties so the best radius is the closest one to spawn
        let mut min = first;
        let mut max = first;
        for row in &self.rows[1..] {
            if row.value < min.value {
                min = *row;
            }
            if row.value > max.value {
                max = *row;
            }
        }
        let best = if self.metric.higher_is_better() { max } else { min };

        Some(TableSummary {
            rows: self.rows.len(),
            mean,
            std_dev: variance.sqrt(),
            min,
            max,
            best,
        })
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, SimulationError> {
        let mut out = String::new();
        match format {
            OutputFormat::Labeled => {
                let label = self.metric.label();
                for row in &self.rows {
                    let _ = writeln!(out, "Radius: {} | {}: {}", row.radius, label, row.value);
                }
            }
            OutputFormat::Csv => {
                for row in &self.rows {
                    let _ = writeln!(out, "{}, {}", row.radius, row.value);
                }
            }
            OutputFormat::Json => {
                out = serde_json::to_string_pretty(self)?;
                out.push('\n');
            }
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a ResultTable {
    type Item = &'a ResultRow;
    type IntoIter = std::slice::Iter<'a, ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl IntoIterator for ResultTable {
    type Item = ResultRow;
    type IntoIter = std::vec::IntoIter<ResultRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
