/// Default generative model and preset sweep parameters

use crate::ring_generator::Ring;

/// Full circle in radians
pub const TWO_PI: f64 = std::f64::consts::TAU;

/// Stronghold rings of the standard world layout, innermost first.
///
/// Counts per ring: 3, 6, 10, 15, 21, 28, 36, 9 (128 total). Each ring spans
/// 1536 blocks and successive rings start 3072 blocks apart.
///
/// Source: https://minecraft.gamepedia.com/Stronghold
pub const DEFAULT_RINGS: [Ring; 8] = [
    Ring::new(3, 1280.0, 2816.0),
    Ring::new(6, 4352.0, 5888.0),
    Ring::new(10, 7424.0, 8960.0),
    Ring::new(15, 10496.0, 12032.0),
    Ring::new(21, 13568.0, 15104.0),
    Ring::new(28, 16640.0, 18176.0),
    Ring::new(36, 19712.0, 21248.0),
    Ring::new(9, 22784.0, 24320.0),
];

/// First ring only, at the radius range the placement RNG actually draws from.
///
/// The published first-ring range is 1280..2816, but the generator rolls
/// 1408..2688 and then snaps up to 128 blocks for biome placement. The
/// narrower range covers the vast majority of real placements.
pub const FIRST_RING: [Ring; 1] = [Ring::new(3, 1408.0, 2688.0)];

/// First ring at the published range.
pub const FIRST_RING_WIKI: [Ring; 1] = [Ring::new(3, 1280.0, 2816.0)];

// Average distance preset
/// Simulated worlds for the average distance sweep
pub const AVERAGE_BATCHES: usize = 100;
/// Farthest radius anyone would build a portal at
pub const AVERAGE_MAX_RADIUS: f64 = 25000.0;
pub const AVERAGE_RADIUS_STEPS: usize = 5000;
pub const AVERAGE_ANGLE_STEPS: usize = 10;

// Blind travel preset
pub const BLIND_BATCHES: usize = 4000;
pub const BLIND_MIN_RADIUS: f64 = 1360.0;
pub const BLIND_MAX_RADIUS: f64 = 2720.0;
pub const BLIND_RADIUS_STEPS: usize = 5000;
pub const BLIND_ANGLE_STEPS: usize = 2000;
/// Distance to a stronghold at which blind travel counts as a success
pub const BLIND_THRESHOLD: f64 = 20.0;

/// Seed used when the caller does not pick one
pub const DEFAULT_SEED: u64 = 0;

/// Largest radius a ring or sweep may use.
///
/// Keeps `(r + ρ)²` inside the f64 range in the distance kernel and the
/// radius span finite for the uniform sampler.
pub const MAX_RADIUS: f64 = 6.703903964971298e153;

/// Resolution of the console loading bar
pub const PROGRESS_TICKS: usize = 100;

/// Tolerance for floating point comparisons in angle checks
pub const ANGLE_TOLERANCE: f64 = 1e-9;
