//! Shape analysis.
//!
//! A [`Shape`] is rasterized into a square fill mask, from which the analyzer
//! derives an edge mask, an affine pixel-to-particle mapping and a few
//! metrics. Results are cached per `(content hash, raster size)` for the
//! lifetime of the [`ShapeAnalyzer`].
//!
//! Particle space is y-up with the shape's longer bounding-box side spanning
//! `[-1, 1]`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use glam::{Vec2, Vec3};
use image::{imageops::FilterType, DynamicImage, GenericImageView};

use crate::cloud::{Point, PointCloud};
use crate::error::ShapeError;
use crate::noise::{hash, rand};
use crate::sdf::SignedDistanceField;

/// Default analysis raster edge length.
pub const DEFAULT_RASTER_SIZE: u32 = 384;
const MIN_RASTER_SIZE: u32 = 8;
/// Fraction of the raster left empty around an outline.
const OUTLINE_MARGIN: f32 = 0.04;

/// Source artwork for a target.
#[derive(Clone, Debug)]
pub enum Shape {
    /// Closed polygons in any y-down coordinate space; filled even-odd.
    Outline { contours: Vec<Vec<Vec2>> },
    /// Pixels are filled where alpha ≥ 128, or, for opaque images, where luma < 128.
    Raster(DynamicImage),
}

impl Shape {
    pub fn outline(contours: Vec<Vec<Vec2>>) -> Self {
        Shape::Outline { contours }
    }

    /// Load a raster shape from a PNG or JPEG file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ShapeError> {
        let image = image::open(path)?;
        Ok(Shape::Raster(image))
    }

    /// FNV-1a over the shape's defining data.
    pub fn content_hash(&self) -> u32 {
        let mut h: u32 = 0x811c_9dc5;
        let mut feed = |bytes: &[u8]| {
            for b in bytes {
                h ^= *b as u32;
                h = h.wrapping_mul(0x0100_0193);
            }
        };
        match self {
            Shape::Outline { contours } => {
                feed(b"outline");
                for contour in contours {
                    feed(&(contour.len() as u32).to_le_bytes());
                    for p in contour {
                        feed(&p.x.to_bits().to_le_bytes());
                        feed(&p.y.to_bits().to_le_bytes());
                    }
                }
            }
            Shape::Raster(image) => {
                feed(b"raster");
                feed(&image.width().to_le_bytes());
                feed(&image.height().to_le_bytes());
                feed(image.as_bytes());
            }
        }
        h
    }
}

/// Affine map between analysis pixels (y-down) and particle space (y-up).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelMapping {
    /// Particle units per pixel.
    pub scale: f32,
    /// Pixel coordinate that maps to the particle-space origin.
    pub offset: Vec2,
}

impl PixelMapping {
    pub fn to_particle(&self, pixel: Vec2) -> Vec2 {
        Vec2::new(
            (pixel.x - self.offset.x) * self.scale,
            -(pixel.y - self.offset.y) * self.scale,
        )
    }

    pub fn to_pixel(&self, particle: Vec2) -> Vec2 {
        Vec2::new(
            particle.x / self.scale + self.offset.x,
            -particle.y / self.scale + self.offset.y,
        )
    }
}

/// Coverage metrics of an analyzed shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeMetrics {
    /// Fill pixels over raster pixels.
    pub fill_ratio: f32,
    /// Edge pixels over fill pixels.
    pub edge_ratio: f32,
    /// Bounding-box width over height.
    pub aspect: f32,
}

/// Everything staging needs to know about one shape at one raster size.
#[derive(Debug)]
pub struct ShapeDescriptor {
    pub hash: u32,
    pub raster_size: u32,
    pub fill: Vec<bool>,
    pub edge: Vec<bool>,
    pub mapping: PixelMapping,
    pub metrics: ShapeMetrics,
    sdf: OnceLock<SignedDistanceField>,
}

impl ShapeDescriptor {
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let n = self.raster_size as i32;
        if x < 0 || y < 0 || x >= n || y >= n {
            return None;
        }
        Some(y as usize * self.raster_size as usize + x as usize)
    }

    /// Pixel containing a particle-space position.
    pub fn pixel_of(&self, position: Vec3) -> (i32, i32) {
        let p = self.mapping.to_pixel(position.truncate());
        (p.x.floor() as i32, p.y.floor() as i32)
    }

    pub fn is_fill_at(&self, position: Vec3) -> bool {
        let (x, y) = self.pixel_of(position);
        self.index(x, y).is_some_and(|i| self.fill[i])
    }

    pub fn is_edge_at(&self, position: Vec3) -> bool {
        let (x, y) = self.pixel_of(position);
        self.index(x, y).is_some_and(|i| self.edge[i])
    }

    /// The signed distance field, computed on first use.
    pub fn sdf(&self) -> &SignedDistanceField {
        self.sdf.get_or_init(|| {
            log::debug!("Computing SDF for shape {:08x} at {}px", self.hash, self.raster_size);
            SignedDistanceField::from_mask(&self.fill, self.raster_size, self.raster_size)
        })
    }

    /// Normalized interior distance at a particle-space position.
    pub fn interior_depth(&self, position: Vec3) -> f32 {
        let (x, y) = self.pixel_of(position);
        self.sdf().normalized_interior(x, y)
    }

    /// Sample `count` points uniformly from the fill mask.
    ///
    /// Points land at jittered pixel centres and carry the edge flag of their
    /// pixel. Deterministic for a given `seed`.
    pub fn sample_fill(&self, count: usize, seed: u32) -> PointCloud {
        let filled: Vec<usize> = self
            .fill
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.then_some(i))
            .collect();
        let size = self.raster_size as usize;

        let points = (0..count)
            .map(|i| {
                if filled.is_empty() {
                    return Point::default();
                }
                let h = hash(seed ^ hash(i as u32).wrapping_add(self.hash));
                let pixel = filled[h as usize % filled.len()];
                let px = (pixel % size) as f32 + rand(h.wrapping_add(1));
                let py = (pixel / size) as f32 + rand(h.wrapping_add(2));
                let p = self.mapping.to_particle(Vec2::new(px, py));
                Point::at(p.extend(0.0)).with_edge(self.edge[pixel])
            })
            .collect();

        PointCloud::new(self.hash, points)
    }
}

/// Rasterizes shapes and caches descriptors for the session.
///
/// Shared between the frame loop and background builds, so the cache sits
/// behind a mutex.
#[derive(Debug, Default)]
pub struct ShapeAnalyzer {
    cache: Mutex<HashMap<(u32, u32), Arc<ShapeDescriptor>>>,
}

impl ShapeAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze a shape, using `hash` as its cache identity.
    pub fn analyze(
        &self,
        shape: &Shape,
        hash: u32,
        raster_size: u32,
    ) -> Result<Arc<ShapeDescriptor>, ShapeError> {
        if let Some(hit) = self.cached(hash, raster_size) {
            log::debug!("Shape cache hit for {:08x} at {}px", hash, raster_size);
            return Ok(hit);
        }

        let descriptor = Arc::new(analyze_uncached(shape, hash, raster_size)?);
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert((hash, raster_size), descriptor.clone());
        }
        Ok(descriptor)
    }

    pub fn cached(&self, hash: u32, raster_size: u32) -> Option<Arc<ShapeDescriptor>> {
        self.cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&(hash, raster_size)).cloned())
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

fn analyze_uncached(shape: &Shape, hash: u32, raster_size: u32) -> Result<ShapeDescriptor, ShapeError> {
    if raster_size < MIN_RASTER_SIZE {
        return Err(ShapeError::InvalidRasterSize(raster_size));
    }

    let fill = match shape {
        Shape::Outline { contours } => rasterize_outline(contours, raster_size)?,
        Shape::Raster(image) => rasterize_image(image, raster_size),
    };

    let size = raster_size as usize;
    let mut fill_count = 0usize;
    let mut edge_count = 0usize;
    let mut min = (usize::MAX, usize::MAX);
    let mut max = (0usize, 0usize);
    let mut edge = vec![false; fill.len()];

    for y in 0..size {
        for x in 0..size {
            if !fill[y * size + x] {
                continue;
            }
            fill_count += 1;
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));

            let empty = |nx: isize, ny: isize| -> bool {
                nx < 0
                    || ny < 0
                    || nx >= size as isize
                    || ny >= size as isize
                    || !fill[ny as usize * size + nx as usize]
            };
            let (xi, yi) = (x as isize, y as isize);
            if empty(xi - 1, yi) || empty(xi + 1, yi) || empty(xi, yi - 1) || empty(xi, yi + 1) {
                edge[y * size + x] = true;
                edge_count += 1;
            }
        }
    }

    if fill_count == 0 {
        return Err(ShapeError::EmptyMask);
    }

    let bbox_w = (max.0 - min.0 + 1) as f32;
    let bbox_h = (max.1 - min.1 + 1) as f32;
    let mapping = PixelMapping {
        scale: 2.0 / bbox_w.max(bbox_h),
        offset: Vec2::new(min.0 as f32 + bbox_w / 2.0, min.1 as f32 + bbox_h / 2.0),
    };

    let metrics = ShapeMetrics {
        fill_ratio: fill_count as f32 / (size * size) as f32,
        edge_ratio: edge_count as f32 / fill_count as f32,
        aspect: bbox_w / bbox_h,
    };

    log::debug!(
        "Analyzed shape {:08x} at {}px: fill {:.3}, edge {:.3}, aspect {:.2}",
        hash,
        raster_size,
        metrics.fill_ratio,
        metrics.edge_ratio,
        metrics.aspect
    );

    Ok(ShapeDescriptor {
        hash,
        raster_size,
        fill,
        edge,
        mapping,
        metrics,
        sdf: OnceLock::new(),
    })
}

/// Even-odd scanline fill sampled at pixel centres.
fn rasterize_outline(contours: &[Vec<Vec2>], size: u32) -> Result<Vec<bool>, ShapeError> {
    let contours: Vec<&Vec<Vec2>> = contours
        .iter()
        .filter(|c| c.len() >= 3 && c.iter().all(|p| p.is_finite()))
        .collect();
    if contours.is_empty() {
        return Err(ShapeError::DegenerateOutline);
    }

    let mut lo = Vec2::splat(f32::MAX);
    let mut hi = Vec2::splat(f32::MIN);
    for p in contours.iter().flat_map(|c| c.iter()) {
        lo = lo.min(*p);
        hi = hi.max(*p);
    }
    let extent = (hi - lo).max_element();
    if extent <= 0.0 {
        return Err(ShapeError::DegenerateOutline);
    }

    let usable = size as f32 * (1.0 - 2.0 * OUTLINE_MARGIN);
    let scale = usable / extent;
    let centre = (lo + hi) * 0.5;
    let half = size as f32 / 2.0;
    let to_px = |p: Vec2| (p - centre) * scale + Vec2::splat(half);

    let edges: Vec<(Vec2, Vec2)> = contours
        .iter()
        .flat_map(|c| {
            (0..c.len()).map(move |i| (to_px(c[i]), to_px(c[(i + 1) % c.len()])))
        })
        .collect();

    let n = size as usize;
    let mut mask = vec![false; n * n];
    let mut crossings: Vec<f32> = Vec::new();
    for y in 0..n {
        let sy = y as f32 + 0.5;
        crossings.clear();
        for (a, b) in &edges {
            if (a.y <= sy && b.y > sy) || (b.y <= sy && a.y > sy) {
                let t = (sy - a.y) / (b.y - a.y);
                crossings.push(a.x + t * (b.x - a.x));
            }
        }
        crossings.sort_by(|a, b| a.total_cmp(b));
        for span in crossings.chunks_exact(2) {
            let start = (span[0] - 0.5).ceil().max(0.0) as usize;
            let end = (span[1] - 0.5).floor().min(n as f32 - 1.0);
            if end < 0.0 {
                continue;
            }
            for x in start..=end as usize {
                mask[y * n + x] = true;
            }
        }
    }

    Ok(mask)
}

/// Fit the image into the raster, preserving aspect, centred.
fn rasterize_image(image: &DynamicImage, size: u32) -> Vec<bool> {
    let resized = image.resize(size, size, FilterType::Triangle);
    let rgba = resized.to_rgba8();
    let (w, h) = resized.dimensions();
    let has_alpha = rgba.pixels().any(|p| p[3] < 255);
    let ox = (size - w.min(size)) / 2;
    let oy = (size - h.min(size)) / 2;

    let n = size as usize;
    let mut mask = vec![false; n * n];
    for (x, y, p) in rgba.enumerate_pixels() {
        let filled = if has_alpha {
            p[3] >= 128
        } else {
            let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
            luma < 128.0
        };
        let (tx, ty) = ((x + ox) as usize, (y + oy) as usize);
        if filled && tx < n && ty < n {
            mask[ty * n + tx] = true;
        }
    }
    mask
}
