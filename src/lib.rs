//! # Stronghold Engine
//!
//! Monte-Carlo estimates of how far the nearest stronghold is from a point at
//! a given distance from the origin, and how often blind travel from that
//! distance lands next to one.

// Re-export the main types and functions
pub use cli_api::{load_rings, run_simulation, write_table, SimulationConfig, SimulationError};
pub use distance_field::{
    min_distance_squared, sweep, SweepBounds, SweepMode, SweepParams, SweepProgress, ThresholdOutput,
};
pub use result_table::{Metric, OutputFormat, ResultRow, ResultTable, TableSummary};
pub use ring_generator::{generate, total_count, Batch, BatchSet, Point, Ring};

// Module declarations
pub mod cli_api;
pub mod constants;
pub mod distance_field;
pub mod result_table;
pub mod ring_generator;
