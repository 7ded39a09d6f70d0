// CLI API module - run configuration, errors and output for the command-line tool
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::*;
use crate::distance_field::{sweep, SweepParams, SweepProgress, ThresholdOutput};
use crate::result_table::{OutputFormat, ResultTable};
use crate::ring_generator::{generate, total_count, validate_rings, Ring};

// Error type for simulation runs
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to write output to {}: {source}", .path.display())]
    OutputWrite { path: PathBuf, source: io::Error },

    #[error("failed to load ring table from {}: {reason}", .path.display())]
    RingTable { path: PathBuf, reason: String },

    #[error("failed to serialize results: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<String> for SimulationError {
    fn from(msg: String) -> Self {
        SimulationError::InvalidConfiguration(msg)
    }
}

impl From<&str> for SimulationError {
    fn from(msg: &str) -> Self {
        SimulationError::InvalidConfiguration(msg.to_string())
    }
}

// Everything a run needs: the generative model, the sweep and the RNG seed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub rings: Vec<Ring>,
    pub batch_count: usize,
    /// Strongholds generated per batch; `None` places every ring in full
    pub points_per_batch: Option<usize>,
    pub sweep: SweepParams,
    pub seed: u64,
    /// Size of a dedicated rayon pool; `None` uses the global pool
    pub threads: Option<usize>,
}

impl SimulationConfig {
    /// Mean distance to the nearest stronghold across the whole world
    pub fn average_distance() -> Self {
        Self {
            rings: DEFAULT_RINGS.to_vec(),
            batch_count: AVERAGE_BATCHES,
            points_per_batch: None,
            sweep: SweepParams::new(0.0, AVERAGE_MAX_RADIUS, AVERAGE_RADIUS_STEPS, AVERAGE_ANGLE_STEPS),
            seed: DEFAULT_SEED,
            threads: None,
        }
    }

    /// Odds of landing within 20 blocks of a first-ring stronghold
    pub fn blind_travel() -> Self {
        Self {
            rings: FIRST_RING.to_vec(),
            batch_count: BLIND_BATCHES,
            points_per_batch: None,
            sweep: SweepParams::new(BLIND_MIN_RADIUS, BLIND_MAX_RADIUS, BLIND_RADIUS_STEPS, BLIND_ANGLE_STEPS)
                .with_threshold(BLIND_THRESHOLD, ThresholdOutput::Count),
            seed: DEFAULT_SEED,
            threads: None,
        }
    }

    pub fn points_per_batch(&self) -> usize {
        self.points_per_batch.unwrap_or_else(|| total_count(&self.rings))
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        validate_rings(&self.rings)?;
        if self.batch_count == 0 {
            return Err("Batch count must be greater than 0".into());
        }
        let total = total_count(&self.rings);
        let points = self.points_per_batch();
        if points == 0 || points > total {
            return Err(format!("Strongholds per batch must be between 1 and {total}, got {points}").into());
        }
        if self.threads == Some(0) {
            return Err("Thread count must be greater than 0".into());
        }
        self.sweep.validate()
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::average_distance()
    }
}

/// Build a dedicated rayon pool for the run.
///
/// A pool that fails to build is logged and the run falls back to the
/// global pool; results do not depend on the thread count.
fn build_thread_pool(threads: Option<usize>) -> Result<Option<rayon::ThreadPool>, SimulationError> {
    let Some(n) = threads else {
        return Ok(None);
    };
    if n == 0 {
        return Err("Thread count must be greater than 0".into());
    }
    match rayon::ThreadPoolBuilder::new().num_threads(n).build() {
        Ok(pool) => Ok(Some(pool)),
        Err(e) => {
            warn!("Failed to build a pool of {n} threads, using default threading: {e}");
            Ok(None)
        }
    }
}

/// Generate the batch set and sweep it.
///
/// Configuration errors are reported before any work starts.
pub fn run_simulation(
    config: &SimulationConfig,
    progress: Option<&(dyn Fn(SweepProgress) + Sync)>,
) -> Result<ResultTable, SimulationError> {
    config.validate()?;

    let started = Instant::now();
    info!(
        batches = config.batch_count,
        strongholds = config.points_per_batch(),
        radius_steps = config.sweep.radius_steps,
        angle_steps = config.sweep.angle_steps,
        seed = config.seed,
        "starting simulation"
    );

    let run = || {
        let batch_set = generate(&config.rings, config.batch_count, config.points_per_batch(), config.seed)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "strongholds generated");
        sweep(&batch_set, &config.sweep, progress)
    };

    let table = match build_thread_pool(config.threads)? {
        Some(pool) => pool.install(run)?,
        None => run()?,
    };

    info!(
        rows = table.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simulation finished"
    );
    Ok(table)
}

/// Read a ring table from a JSON array of `{count, radius_min, radius_max}`.
pub fn load_rings(path: &Path) -> Result<Vec<Ring>, SimulationError> {
    let ring_error = |reason: String| SimulationError::RingTable {
        path: path.to_path_buf(),
        reason,
    };

    let text = fs::read_to_string(path).map_err(|e| ring_error(e.to_string()))?;
    let rings: Vec<Ring> = serde_json::from_str(&text).map_err(|e| ring_error(e.to_string()))?;
    validate_rings(&rings).map_err(|e| ring_error(e.to_string()))?;
    Ok(rings)
}

/// Write a finished table to `path`.
///
/// The table is rendered in memory and written to a sibling temporary file
/// that is renamed into place, so a failed write leaves no partial output.
pub fn write_table(table: &ResultTable, path: &Path, format: OutputFormat) -> Result<(), SimulationError> {
    let rendered = table.render(format)?;
    let output_error = |source: io::Error| SimulationError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let discard_tmp = || {
        if let Err(e) = fs::remove_file(&tmp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                debug!(path = %tmp_path.display(), error = %e, "failed to remove temporary output");
            }
        }
    };

    fs::write(&tmp_path, rendered).map_err(|e| {
        discard_tmp();
        output_error(e)
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        discard_tmp();
        output_error(e)
    })?;

    debug!(path = %path.display(), rows = table.len(), "results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance_field::SweepBounds;
    use crate::result_table::Metric;
    use tempfile::tempdir;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            batch_count: 6,
            sweep: SweepParams::new(0.0, 25000.0, 50, 8),
            ..SimulationConfig::average_distance()
        }
    }

    #[test]
    fn test_presets_are_valid() {
        let average = SimulationConfig::average_distance();
        assert!(average.validate().is_ok());
        assert_eq!(average.points_per_batch(), 128);
        assert_eq!(average.sweep.radii().len(), 5001);

        let blind = SimulationConfig::blind_travel();
        assert!(blind.validate().is_ok());
        assert_eq!(blind.points_per_batch(), 3);
        assert_eq!(blind.sweep.metric(), Metric::SuccessCount);
        assert_eq!(blind.sweep.threshold, Some(20.0));
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            SimulationConfig { batch_count: 0, ..small_config() },
            SimulationConfig { points_per_batch: Some(0), ..small_config() },
            SimulationConfig { points_per_batch: Some(129), ..small_config() },
            SimulationConfig { rings: Vec::new(), ..small_config() },
            SimulationConfig { threads: Some(0), ..small_config() },
            SimulationConfig { sweep: SweepParams::new(10.0, 5.0, 1, 1), ..small_config() },
        ];
        for config in &cases {
            let err = run_simulation(config, None).unwrap_err();
            assert!(matches!(err, SimulationError::InvalidConfiguration(_)), "{err}");
        }
    }

    #[test]
    fn test_run_is_reproducible() {
        let a = run_simulation(&small_config(), None).unwrap();
        let b = run_simulation(&SimulationConfig { threads: Some(1), ..small_config() }, None).unwrap();
        let c = run_simulation(&SimulationConfig { threads: Some(3), ..small_config() }, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        let other_seed = run_simulation(&SimulationConfig { seed: 1, ..small_config() }, None).unwrap();
        assert_ne!(a, other_seed);
    }

    #[test]
    fn test_truncated_model_run() {
        let config = SimulationConfig {
            points_per_batch: Some(9),
            sweep: SweepParams::new(0.0, 3000.0, 30, 12).with_bounds(SweepBounds::Exclusive),
            ..small_config()
        };
        let table = run_simulation(&config, None).unwrap();
        assert_eq!(table.len(), 30);
        assert!(table.iter().all(|row| row.value >= 0.0));
    }

    #[test]
    fn test_write_table_roundtrip() {
        let table = run_simulation(&SimulationConfig {
            sweep: SweepParams::new(0.0, 100.0, 4, 4),
            ..small_config()
        }, None).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("table.json");
        write_table(&table, &path, OutputFormat::Json).unwrap();
        let parsed: ResultTable = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, table);
        assert!(!dir.path().join("table.json.tmp").exists());
    }

    #[test]
    fn test_write_table_failure() {
        let table = ResultTable::new(Metric::MeanDistance, Vec::new());
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.txt");
        let err = write_table(&table, &path, OutputFormat::Csv).unwrap_err();
        assert!(matches!(err, SimulationError::OutputWrite { .. }));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_load_rings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rings.json");
        fs::write(&path, serde_json::to_string(&DEFAULT_RINGS.to_vec()).unwrap()).unwrap();
        assert_eq!(load_rings(&path).unwrap(), DEFAULT_RINGS.to_vec());

        fs::write(&path, r#"[{"count": 0, "radius_min": 1.0, "radius_max": 2.0}]"#).unwrap();
        assert!(matches!(load_rings(&path), Err(SimulationError::RingTable { .. })));

        fs::write(&path, "not json").unwrap();
        assert!(matches!(load_rings(&path), Err(SimulationError::RingTable { .. })));

        let wide = r#"[{"count": 3, "radius_min": 0.0, "radius_max": 1.7976931348623157e308}]"#;
        fs::write(&path, wide).unwrap();
        assert!(matches!(load_rings(&path), Err(SimulationError::RingTable { .. })));

        assert!(load_rings(&dir.path().join("no-such-rings.json")).is_err());
    }
}
