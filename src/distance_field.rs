//! Nearest-stronghold sweep over a range of radii.
//!
//! For each radius the sweep looks at every batch from `angle_steps` evenly
//! spaced directions and reduces the nearest-stronghold distance of each
//! sample into one row: either the mean distance or the number (or share) of
//! samples that land within a threshold.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli_api::SimulationError;
use crate::constants::{MAX_RADIUS, TWO_PI};
use crate::result_table::{Metric, ResultRow, ResultTable};
use crate::ring_generator::{Batch, BatchSet};

/// Whether the far end of the radius range gets its own row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepBounds {
    /// `radius_steps + 1` rows, both ends included
    #[default]
    Inclusive,
    /// `radius_steps` rows, the end radius is left out
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SweepMode {
    #[default]
    MeanDistance,
    ThresholdCount,
}

/// How threshold hits are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThresholdOutput {
    /// Raw number of hits, in [0, angle_steps * batches]
    #[default]
    Count,
    /// Hits divided by the number of samples, in [0, 1]
    Probability,
}

/// Progress of a running sweep, reported once per finished radius
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    pub completed: usize,
    pub total: usize,
}

impl SweepProgress {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Sweep parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParams {
    pub radius_start: f64,
    pub radius_end: f64,
    pub radius_steps: usize,
    pub angle_steps: usize,
    pub bounds: SweepBounds,
    pub mode: SweepMode,
    pub threshold: Option<f64>,
    pub threshold_output: ThresholdOutput,
    /// Evaluate radius steps on the rayon pool
    pub parallel: bool,
}

impl SweepParams {
    /// Mean distance sweep with inclusive bounds
    pub fn new(radius_start: f64, radius_end: f64, radius_steps: usize, angle_steps: usize) -> Self {
        Self {
            radius_start,
            radius_end,
            radius_steps,
            angle_steps,
            bounds: SweepBounds::Inclusive,
            mode: SweepMode::MeanDistance,
            threshold: None,
            threshold_output: ThresholdOutput::Count,
            parallel: true,
        }
    }

    pub fn with_bounds(mut self, bounds: SweepBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Switch to threshold counting with the given success distance
    pub fn with_threshold(mut self, threshold: f64, output: ThresholdOutput) -> Self {
        self.mode = SweepMode::ThresholdCount;
        self.threshold = Some(threshold);
        self.threshold_output = output;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.radius_steps == 0 {
            return Err("Radius steps must be greater than 0".into());
        }
        if self.angle_steps == 0 {
            return Err("Angle steps must be greater than 0".into());
        }
        if !self.radius_start.is_finite() || !self.radius_end.is_finite() {
            return Err("Radius range must be finite".into());
        }
        if self.radius_start < 0.0 {
            return Err(format!("Radius range must start at or above 0, got {}", self.radius_start).into());
        }
        if self.radius_start > self.radius_end {
            return Err(format!(
                "Radius range is empty: start {} is past end {}",
                self.radius_start, self.radius_end
            ).into());
        }
        if self.radius_end > MAX_RADIUS {
            return Err(format!("Radius range must end at or below {MAX_RADIUS:e}, got {}", self.radius_end).into());
        }
        if self.radii().windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!(
                "Radius step {} is too fine to resolve near {}",
                (self.radius_end - self.radius_start) / self.radius_steps as f64,
                self.radius_start
            ).into());
        }
        if self.mode == SweepMode::ThresholdCount {
            match self.threshold {
                None => return Err("Threshold sweep requires a threshold distance".into()),
                Some(t) if !t.is_finite() || t < 0.0 => {
                    return Err(format!("Threshold must be a finite non-negative distance, got {t}").into())
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Radii visited by the sweep, strictly increasing.
    ///
    /// A range with `start == end` is a single point and yields one radius.
    pub fn radii(&self) -> Vec<f64> {
        if self.radius_start == self.radius_end {
            return vec![self.radius_start];
        }
        let span = self.radius_end - self.radius_start;
        let steps = self.radius_steps as f64;
        let count = match self.bounds {
            SweepBounds::Inclusive => self.radius_steps + 1,
            SweepBounds::Exclusive => self.radius_steps,
        };
        (0..count)
            .map(|i| self.radius_start + i as f64 * span / steps)
            .collect()
    }

    /// Sampling directions `k * 2π / angle_steps`
    pub fn angles(&self) -> Vec<f64> {
        let steps = self.angle_steps as f64;
        (0..self.angle_steps).map(|k| k as f64 * TWO_PI / steps).collect()
    }

    pub fn metric(&self) -> Metric {
        match (self.mode, self.threshold_output) {
            (SweepMode::MeanDistance, _) => Metric::MeanDistance,
            (SweepMode::ThresholdCount, ThresholdOutput::Count) => Metric::SuccessCount,
            (SweepMode::ThresholdCount, ThresholdOutput::Probability) => Metric::SuccessRate,
        }
    }
}

/// Squared distance from the polar point `(radius, theta)` to the nearest
/// stronghold of `batch`, by the law of cosines.
///
/// Rounding can push the result slightly below zero for coincident points.
pub fn min_distance_squared(radius: f64, theta: f64, batch: &Batch) -> f64 {
    let r2 = radius * radius;
    batch
        .points()
        .iter()
        .map(|p| {
            let rho = p.radius();
            r2 + rho * rho - 2.0 * radius * rho * (p.angle() - theta).cos()
        })
        .fold(f64::INFINITY, f64::min)
}

/// Run the sweep over every batch of `batch_set`.
///
/// `progress` is called after each radius row with the number of rows done
/// so far. Rows are independent, so the parallel and sequential paths give
/// identical tables.
pub fn sweep(
    batch_set: &BatchSet,
    params: &SweepParams,
    progress: Option<&(dyn Fn(SweepProgress) + Sync)>,
) -> Result<ResultTable, SimulationError> {
    params.validate()?;
    if batch_set.is_empty() {
        return Err("Batch set must contain at least one batch".into());
    }

    let radii = params.radii();
    let angles = params.angles();
    let total = radii.len();
    let completed = AtomicUsize::new(0);

    debug!(
        rows = total,
        batches = batch_set.len(),
        angle_steps = angles.len(),
        mode = ?params.mode,
        parallel = params.parallel,
        "starting sweep"
    );

    let row = |radius: f64| {
        let value = evaluate_radius(batch_set, radius, &angles, params);
        let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(report) = progress {
            report(SweepProgress { completed: done, total });
        }
        ResultRow { radius, value }
    };

    let rows: Vec<ResultRow> = if params.parallel {
        radii.par_iter().map(|&r| row(r)).collect()
    } else {
        radii.iter().map(|&r| row(r)).collect()
    };

    Ok(ResultTable::new(params.metric(), rows))
}

fn evaluate_radius(batch_set: &BatchSet, radius: f64, angles: &[f64], params: &SweepParams) -> f64 {
    let samples = (batch_set.len() * angles.len()) as f64;

    match params.mode {
        SweepMode::MeanDistance => {
            let mut total = 0.0;
            for batch in batch_set.batches() {
                for &theta in angles {
                    total += min_distance_squared(radius, theta, batch).max(0.0).sqrt();
                }
            }
            total / samples
        }
        SweepMode::ThresholdCount => {
            let threshold = params.threshold.unwrap_or(0.0);
            let limit = threshold * threshold;
            let mut hits = 0usize;
            for batch in batch_set.batches() {
                for &theta in angles {
                    if min_distance_squared(radius, theta, batch) <= limit {
                        hits += 1;
                    }
                }
            }
            match params.threshold_output {
                ThresholdOutput::Count => hits as f64,
                ThresholdOutput::Probability => hits as f64 / samples,
            }
        }
    }
}
