//! Distribution statistics over particle positions.
//!
//! The scalar and grid paths are not bit-identical, so they are compared by
//! these aggregates rather than per particle.

use glam::Vec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistributionStats {
    pub count: usize,
    /// Mean distance moved since the previous frame.
    pub mean_displacement: f32,
    pub max_displacement: f32,
    /// Mean distance to the final target.
    pub mean_target_distance: f32,
    pub max_target_distance: f32,
    /// Fraction of particles within `settle_eps` of their target.
    pub settled_fraction: f32,
    pub centroid: Vec3,
    /// RMS distance from the centroid.
    pub spread: f32,
}

impl DistributionStats {
    /// Measure `current` against the previous frame and the targets.
    ///
    /// Slices of unequal length are compared over their common prefix.
    pub fn measure(previous: &[Vec3], current: &[Vec3], targets: &[Vec3], settle_eps: f32) -> Self {
        let n = current.len();
        if n == 0 {
            return Self::default();
        }

        let mut stats = Self {
            count: n,
            ..Self::default()
        };

        let moved = previous.len().min(n);
        for (a, b) in previous.iter().zip(current) {
            let d = a.distance(*b);
            stats.mean_displacement += d;
            stats.max_displacement = stats.max_displacement.max(d);
        }
        if moved > 0 {
            stats.mean_displacement /= moved as f32;
        }

        let compared = targets.len().min(n);
        let mut settled = 0usize;
        for (p, t) in current.iter().zip(targets) {
            let d = p.distance(*t);
            stats.mean_target_distance += d;
            stats.max_target_distance = stats.max_target_distance.max(d);
            if d <= settle_eps {
                settled += 1;
            }
        }
        if compared > 0 {
            stats.mean_target_distance /= compared as f32;
            stats.settled_fraction = settled as f32 / compared as f32;
        }

        stats.centroid = current.iter().copied().sum::<Vec3>() / n as f32;
        let var = current
            .iter()
            .map(|p| p.distance_squared(stats.centroid))
            .sum::<f32>()
            / n as f32;
        stats.spread = var.sqrt();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(DistributionStats::measure(&[], &[], &[], 0.01), DistributionStats::default());
    }

    #[test]
    fn test_measure() {
        let prev = [Vec3::ZERO, Vec3::ZERO];
        let cur = [Vec3::X, Vec3::new(-1.0, 0.0, 0.0)];
        let targets = [Vec3::X, Vec3::ZERO];
        let s = DistributionStats::measure(&prev, &cur, &targets, 1e-3);
        assert_eq!(s.count, 2);
        assert_eq!(s.mean_displacement, 1.0);
        assert_eq!(s.max_target_distance, 1.0);
        assert_eq!(s.settled_fraction, 0.5);
        assert_eq!(s.centroid, Vec3::ZERO);
        assert_eq!(s.spread, 1.0);
    }
}
