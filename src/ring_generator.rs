//! Ring-structured stronghold placement.
//!
//! Every simulated world ("batch") places its strongholds ring by ring. Inside
//! a ring the points sit at equal angular spacing from a seed angle drawn
//! fresh for that ring, and each radius is drawn uniformly from the ring's
//! range. Batches draw from independent ChaCha8 streams, so generation runs in
//! parallel and stays reproducible for a given seed.

use rand::distributions::{Distribution, Uniform};
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cli_api::SimulationError;
use crate::constants::{MAX_RADIUS, TWO_PI};

/// One ring of the generative model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    pub count: usize,
    pub radius_min: f64,
    pub radius_max: f64,
}

impl Ring {
    pub const fn new(count: usize, radius_min: f64, radius_max: f64) -> Self {
        Self { count, radius_min, radius_max }
    }

    /// Angle between neighbouring strongholds of this ring
    pub fn angular_step(&self) -> f64 {
        TWO_PI / self.count as f64
    }

    pub fn contains_radius(&self, radius: f64) -> bool {
        radius >= self.radius_min && radius <= self.radius_max
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.count == 0 {
            return Err("Ring must hold at least one stronghold".into());
        }
        if !self.radius_min.is_finite() || !self.radius_max.is_finite() {
            return Err(format!(
                "Ring radius range must be finite, got [{}, {}]",
                self.radius_min, self.radius_max
            ).into());
        }
        if self.radius_min < 0.0 || self.radius_min > self.radius_max {
            return Err(format!(
                "Ring radius range must satisfy 0 <= min <= max, got [{}, {}]",
                self.radius_min, self.radius_max
            ).into());
        }
        if self.radius_max > MAX_RADIUS {
            return Err(format!(
                "Ring radius must not exceed {MAX_RADIUS:e}, got {}",
                self.radius_max
            ).into());
        }
        Ok(())
    }
}

/// Total number of strongholds the ring table can place
pub fn total_count(rings: &[Ring]) -> usize {
    rings.iter().map(|r| r.count).sum()
}

/// Validate a ring table as a whole
pub fn validate_rings(rings: &[Ring]) -> Result<(), SimulationError> {
    if rings.is_empty() {
        return Err("Ring table is empty".into());
    }
    for (i, ring) in rings.iter().enumerate() {
        ring.validate().map_err(|e| match e {
            SimulationError::InvalidConfiguration(msg) => {
                SimulationError::InvalidConfiguration(format!("ring {i}: {msg}"))
            }
            other => other,
        })?;
    }
    Ok(())
}

/// Wrap an angle into [0, 2π)
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TWO_PI);
    // rem_euclid can round up to exactly 2π
    if wrapped >= TWO_PI {
        0.0
    } else {
        wrapped
    }
}

/// A single stronghold in polar coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    angle: f64,
    radius: f64,
    ring: usize,
}

impl Point {
    /// Place a stronghold by hand. The angle is wrapped into [0, 2π).
    pub fn new(angle: f64, radius: f64) -> Self {
        Self::in_ring(angle, radius, 0)
    }

    pub fn in_ring(angle: f64, radius: f64, ring: usize) -> Self {
        Self { angle: wrap_angle(angle), radius, ring }
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Index of the ring that produced this point
    pub fn ring(&self) -> usize {
        self.ring
    }
}

/// One simulated world
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    points: Vec<Point>,
}

impl Batch {
    pub fn from_points(points: Vec<Point>) -> Result<Self, SimulationError> {
        if points.is_empty() {
            return Err("Batch must contain at least one stronghold".into());
        }
        if let Some(p) = points.iter().find(|p| !(p.radius >= 0.0 && p.radius <= MAX_RADIUS)) {
            return Err(format!("Stronghold radius must be in [0, {MAX_RADIUS:e}], got {}", p.radius).into());
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points produced by one ring, in placement order
    pub fn ring_points(&self, ring: usize) -> impl Iterator<Item = &Point> + '_ {
        self.points.iter().filter(move |p| p.ring == ring)
    }
}

/// All simulated worlds of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSet {
    batches: Vec<Batch>,
}

impl BatchSet {
    pub fn from_batches(batches: Vec<Batch>) -> Result<Self, SimulationError> {
        if batches.is_empty() {
            return Err("Batch set must contain at least one batch".into());
        }
        if batches.iter().any(Batch::is_empty) {
            return Err("Batch must contain at least one stronghold".into());
        }
        Ok(Self { batches })
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Generate `batch_count` worlds of `points_per_batch` strongholds each.
///
/// `points_per_batch` may be smaller than the ring table's total, in which
/// case generation stops partway through a ring. Batch `i` draws from stream
/// `i` of a ChaCha8 generator seeded with `seed`.
pub fn generate(
    rings: &[Ring],
    batch_count: usize,
    points_per_batch: usize,
    seed: u64,
) -> Result<BatchSet, SimulationError> {
    validate_rings(rings)?;
    if batch_count == 0 {
        return Err("Batch count must be greater than 0".into());
    }
    let total = total_count(rings);
    if points_per_batch == 0 || points_per_batch > total {
        return Err(format!(
            "Strongholds per batch must be between 1 and {total}, got {points_per_batch}"
        ).into());
    }

    let angle_dist = Uniform::new(0.0, TWO_PI);
    let radius_dists: Vec<Uniform<f64>> = rings
        .iter()
        .map(|r| Uniform::new_inclusive(r.radius_min, r.radius_max))
        .collect();

    debug!(batch_count, points_per_batch, rings = rings.len(), seed, "generating strongholds");

    let batches = (0..batch_count)
        .into_par_iter()
        .map(|i| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            rng.set_stream(i as u64);
            generate_batch(rings, &radius_dists, &angle_dist, points_per_batch, &mut rng)
        })
        .collect();

    Ok(BatchSet { batches })
}

fn generate_batch(
    rings: &[Ring],
    radius_dists: &[Uniform<f64>],
    angle_dist: &Uniform<f64>,
    points_per_batch: usize,
    rng: &mut ChaCha8Rng,
) -> Batch {
    let mut points = Vec::with_capacity(points_per_batch);
    let mut index = 0;
    let mut placed_in_ring = 0;
    let mut theta = angle_dist.sample(rng);

    for _ in 0..points_per_batch {
        placed_in_ring += 1;
        if placed_in_ring > rings[index].count {
            index += 1;
            placed_in_ring = 1;
            theta = angle_dist.sample(rng);
        }
        theta = wrap_angle(theta + rings[index].angular_step());
        points.push(Point {
            angle: theta,
            radius: radius_dists[index].sample(rng),
            ring: index,
        });
    }

    Batch { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ANGLE_TOLERANCE, DEFAULT_RINGS, FIRST_RING};

    fn sorted_angles<'a>(points: impl Iterator<Item = &'a Point>) -> Vec<f64> {
        let mut angles: Vec<f64> = points.map(Point::angle).collect();
        angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
        angles
    }

    #[test]
    fn test_points_within_bounds() {
        let set = generate(&DEFAULT_RINGS, 20, 128, 7).unwrap();
        assert_eq!(set.len(), 20);
        for batch in set.batches() {
            assert_eq!(batch.len(), 128);
            for p in batch.points() {
                assert!(p.angle() >= 0.0 && p.angle() < TWO_PI, "angle {}", p.angle());
                assert!(DEFAULT_RINGS[p.ring()].contains_radius(p.radius()), "radius {}", p.radius());
            }
        }
    }

    #[test]
    fn test_rings_are_contiguous() {
        let set = generate(&DEFAULT_RINGS, 3, 128, 1).unwrap();
        for batch in set.batches() {
            let rings: Vec<usize> = batch.points().iter().map(Point::ring).collect();
            assert!(rings.windows(2).all(|w| w[0] <= w[1]));
            for (i, ring) in DEFAULT_RINGS.iter().enumerate() {
                assert_eq!(batch.ring_points(i).count(), ring.count);
            }
        }
    }

    #[test]
    fn test_equal_angular_spacing() {
        let set = generate(&DEFAULT_RINGS, 10, 128, 42).unwrap();
        for batch in set.batches() {
            for (i, ring) in DEFAULT_RINGS.iter().enumerate() {
                let angles = sorted_angles(batch.ring_points(i));
                let step = ring.angular_step();
                for w in angles.windows(2) {
                    assert!((w[1] - w[0] - step).abs() < ANGLE_TOLERANCE);
                }
                let wrap = TWO_PI - (angles[angles.len() - 1] - angles[0]);
                assert!((wrap - step).abs() < ANGLE_TOLERANCE);
            }
        }
    }

    #[test]
    fn test_seed_angle_redrawn_per_ring() {
        // With a shared phase, ring 1 would contain ring 0's angles (3 divides 6)
        let set = generate(&DEFAULT_RINGS, 50, 9, 3).unwrap();
        let shared_phase = set.batches().iter().all(|batch| {
            let first = batch.ring_points(0).next().unwrap().angle();
            batch.ring_points(1).any(|p| (p.angle() - first).abs() < ANGLE_TOLERANCE)
        });
        assert!(!shared_phase);
    }

    #[test]
    fn test_truncated_batch() {
        let set = generate(&DEFAULT_RINGS, 5, 5, 11).unwrap();
        for batch in set.batches() {
            assert_eq!(batch.len(), 5);
            assert_eq!(batch.ring_points(0).count(), 3);
            assert_eq!(batch.ring_points(1).count(), 2);

            // Partial ring keeps the full ring's spacing
            let partial: Vec<f64> = batch.ring_points(1).map(Point::angle).collect();
            let diff = wrap_angle(partial[1] - partial[0]);
            assert!((diff - DEFAULT_RINGS[1].angular_step()).abs() < ANGLE_TOLERANCE);
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = generate(&DEFAULT_RINGS, 8, 128, 99).unwrap();
        let b = generate(&DEFAULT_RINGS, 8, 128, 99).unwrap();
        let c = generate(&DEFAULT_RINGS, 8, 128, 100).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_independent_of_thread_count() {
        let single = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let many = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let a = single.install(|| generate(&FIRST_RING, 64, 3, 5).unwrap());
        let b = many.install(|| generate(&FIRST_RING, 64, 3, 5).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_degenerate_radius_range() {
        let rings = [Ring::new(3, 1000.0, 1000.0)];
        let set = generate(&rings, 4, 3, 0).unwrap();
        assert!(set.batches().iter().flat_map(Batch::points).all(|p| p.radius() == 1000.0));
    }

    #[test]
    fn test_invalid_generation_inputs() {
        assert!(generate(&DEFAULT_RINGS, 0, 128, 0).is_err());
        assert!(generate(&DEFAULT_RINGS, 1, 0, 0).is_err());
        assert!(generate(&DEFAULT_RINGS, 1, 129, 0).is_err());
        assert!(generate(&[], 1, 1, 0).is_err());
        assert!(generate(&[Ring::new(0, 1.0, 2.0)], 1, 1, 0).is_err());
        assert!(generate(&[Ring::new(3, 2.0, 1.0)], 1, 1, 0).is_err());
        assert!(generate(&[Ring::new(3, -1.0, 1.0)], 1, 1, 0).is_err());
        assert!(generate(&[Ring::new(3, 0.0, f64::INFINITY)], 1, 1, 0).is_err());
    }

    #[test]
    fn test_radius_ceiling() {
        let wide = Ring::new(3, 0.0, f64::MAX);
        assert!(matches!(wide.validate(), Err(SimulationError::InvalidConfiguration(_))));
        assert!(matches!(
            generate(&[wide], 1, 3, 0),
            Err(SimulationError::InvalidConfiguration(_))
        ));
        assert!(Batch::from_points(vec![Point::new(0.0, f64::MAX)]).is_err());

        // The ceiling itself still samples and stays finite
        let edge = [Ring::new(3, 0.0, MAX_RADIUS)];
        let set = generate(&edge, 2, 3, 0).unwrap();
        assert!(set.batches().iter().flat_map(Batch::points).all(|p| edge[0].contains_radius(p.radius())));
    }

    #[test]
    fn test_manual_batches() {
        assert!(Batch::from_points(Vec::new()).is_err());
        assert!(Batch::from_points(vec![Point::new(0.0, -1.0)]).is_err());
        assert!(BatchSet::from_batches(Vec::new()).is_err());

        let batch = Batch::from_points(vec![Point::new(TWO_PI + 1.0, 10.0)]).unwrap();
        assert!((batch.points()[0].angle() - 1.0).abs() < ANGLE_TOLERANCE);
        assert_eq!(BatchSet::from_batches(vec![batch]).unwrap().len(), 1);
    }

    #[test]
    fn test_wrap_angle() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert_eq!(wrap_angle(TWO_PI), 0.0);
        assert!((wrap_angle(-1.0) - (TWO_PI - 1.0)).abs() < ANGLE_TOLERANCE);
        assert!(wrap_angle(-1e-20) < TWO_PI);
    }
}
