//! Point clouds: the targets particles form into.
//!
//! Clouds in a sequence share one length so that particle `i` keeps its
//! identity across every target. [`PointCloud::fit_to`] enforces that without
//! ever failing: long clouds are truncated, short ones are padded by
//! resampling with replacement.

use glam::Vec3;

use crate::noise::hash;

/// A single sampled point of a shape. Immutable once created.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub position: Vec3,
    pub color: Vec3,
    /// Lies on the shape's outline rather than its interior.
    pub is_edge: bool,
    pub opacity_mul: f32,
    pub size_mul: f32,
}

impl Point {
    /// A neutral white interior point at `position`.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn with_edge(mut self, is_edge: bool) -> Self {
        self.is_edge = is_edge;
        self
    }

    /// Replace non-finite values with neutral ones.
    fn sanitized(mut self) -> Self {
        if !self.position.is_finite() {
            self.position = Vec3::ZERO;
        }
        if !self.color.is_finite() {
            self.color = Vec3::ONE;
        }
        if !self.opacity_mul.is_finite() || self.opacity_mul < 0.0 {
            self.opacity_mul = 1.0;
        }
        if !self.size_mul.is_finite() || self.size_mul < 0.0 {
            self.size_mul = 1.0;
        }
        self
    }
}

impl Default for Point {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            is_edge: false,
            opacity_mul: 1.0,
            size_mul: 1.0,
        }
    }
}

/// An ordered sequence of points sampled from one shape.
#[derive(Clone, Debug, PartialEq)]
pub struct PointCloud {
    /// 32-bit content hash identifying the source shape.
    pub id: u32,
    pub points: Vec<Point>,
}

impl PointCloud {
    pub fn new(id: u32, points: Vec<Point>) -> Self {
        Self { id, points }
    }

    /// Build a cloud from bare positions, hashing them for the id.
    pub fn from_positions(positions: impl IntoIterator<Item = Vec3>) -> Self {
        let points: Vec<Point> = positions.into_iter().map(Point::at).collect();
        let id = Self::content_hash(&points);
        Self { id, points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// FNV-1a over the bit patterns of every point.
    pub fn content_hash(points: &[Point]) -> u32 {
        const OFFSET: u32 = 0x811c_9dc5;
        const PRIME: u32 = 0x0100_0193;
        let mut h = OFFSET;
        let mut feed = |word: u32| {
            for byte in word.to_le_bytes() {
                h ^= byte as u32;
                h = h.wrapping_mul(PRIME);
            }
        };
        for p in points {
            feed(p.position.x.to_bits());
            feed(p.position.y.to_bits());
            feed(p.position.z.to_bits());
            feed(p.color.x.to_bits());
            feed(p.color.y.to_bits());
            feed(p.color.z.to_bits());
            feed(p.is_edge as u32);
        }
        h
    }

    /// Return a copy with exactly `count` points.
    ///
    /// Extra points are drawn with replacement using a hash of `seed` and the
    /// slot index, so the same inputs always pad the same way. An empty cloud
    /// pads with neutral points at the origin.
    pub fn fit_to(&self, count: usize, seed: u32) -> PointCloud {
        let mut points: Vec<Point> = self
            .points
            .iter()
            .take(count)
            .map(|p| p.sanitized())
            .collect();

        if points.len() < count {
            let source = points.len();
            log::debug!(
                "Padding cloud {:08x} from {} to {} points",
                self.id,
                source,
                count
            );
            for slot in source..count {
                let point = if source == 0 {
                    Point::default()
                } else {
                    let pick = hash(seed ^ hash(slot as u32 ^ self.id)) as usize % source;
                    points[pick]
                };
                points.push(point);
            }
        }

        PointCloud {
            id: self.id,
            points,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.points.iter().map(|p| p.position)
    }
}

/// Fit every cloud to `count` points.
pub fn normalize_lengths(clouds: &[PointCloud], count: usize, seed: u32) -> Vec<PointCloud> {
    clouds.iter().map(|c| c.fit_to(count, seed)).collect()
}
