//! Signed distance field over a fill mask.
//!
//! Exact Euclidean distance transform (Felzenszwalb & Huttenlocher), run
//! once for the interior and once for the exterior. Values are in pixels,
//! positive inside the shape and negative outside.

const INF: f64 = 1e20;

/// Signed distance to the shape boundary for every pixel of a mask.
#[derive(Clone, Debug)]
pub struct SignedDistanceField {
    width: u32,
    height: u32,
    values: Vec<f32>,
    max_interior: f32,
}

impl SignedDistanceField {
    /// Build the field for a row-major `width × height` fill mask.
    ///
    /// Pixels outside the raster count as empty, so fill touching the border
    /// still has a finite interior distance.
    pub fn from_mask(mask: &[bool], width: u32, height: u32) -> Self {
        let (w, h) = (width as usize, height as usize);
        debug_assert_eq!(mask.len(), w * h);

        // Pad by one empty pixel on every side.
        let (pw, ph) = (w + 2, h + 2);
        let filled = |x: usize, y: usize| -> bool {
            x >= 1 && y >= 1 && x <= w && y <= h && mask[(y - 1) * w + (x - 1)]
        };

        let inside_sq = squared_edt(pw, ph, |x, y| if filled(x, y) { INF } else { 0.0 });
        let outside_sq = squared_edt(pw, ph, |x, y| if filled(x, y) { 0.0 } else { INF });

        let mut values = Vec::with_capacity(w * h);
        let mut max_interior = 0.0f32;
        for y in 0..h {
            for x in 0..w {
                let i = (y + 1) * pw + (x + 1);
                let v = if mask[y * w + x] {
                    inside_sq[i].sqrt() as f32
                } else {
                    -(outside_sq[i].sqrt() as f32)
                };
                max_interior = max_interior.max(v);
                values.push(v);
            }
        }

        Self {
            width,
            height,
            values,
            max_interior,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Largest interior distance in pixels. Zero for an empty mask.
    pub fn max_interior(&self) -> f32 {
        self.max_interior
    }

    /// Signed distance at a pixel, clamped to the raster.
    pub fn at(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.values[y * self.width as usize + x]
    }

    /// Interior distance normalized to `[0, 1]`; zero on and outside the boundary.
    pub fn normalized_interior(&self, x: i32, y: i32) -> f32 {
        if self.max_interior <= 0.0 {
            return 0.0;
        }
        (self.at(x, y).max(0.0) / self.max_interior).clamp(0.0, 1.0)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

/// Squared distance to the nearest zero of `f`, separable in x then y.
fn squared_edt(w: usize, h: usize, f: impl Fn(usize, usize) -> f64) -> Vec<f64> {
    let mut grid = vec![0.0f64; w * h];
    for y in 0..h {
        for x in 0..w {
            grid[y * w + x] = f(x, y);
        }
    }

    let n = w.max(h);
    let mut input = vec![0.0f64; n];
    let mut output = vec![0.0f64; n];
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];

    for x in 0..w {
        for y in 0..h {
            input[y] = grid[y * w + x];
        }
        edt_1d(&input[..h], &mut output[..h], &mut v, &mut z);
        for y in 0..h {
            grid[y * w + x] = output[y];
        }
    }

    for y in 0..h {
        input[..w].copy_from_slice(&grid[y * w..(y + 1) * w]);
        edt_1d(&input[..w], &mut output[..w], &mut v, &mut z);
        grid[y * w..(y + 1) * w].copy_from_slice(&output[..w]);
    }

    grid
}

/// 1D lower envelope of parabolas.
fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    v[0] = 0;
    z[0] = -INF;
    z[1] = INF;

    for q in 1..n {
        let qf = q as f64;
        loop {
            let vk = v[k] as f64;
            let s = ((f[q] + qf * qf) - (f[v[k]] + vk * vk)) / (2.0 * qf - 2.0 * vk);
            if s <= z[k] && k > 0 {
                k -= 1;
                continue;
            }
            if s <= z[k] {
                // k == 0 and z[0] == -INF: only reachable with non-finite input.
                v[0] = q;
                z[1] = INF;
                break;
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = INF;
            break;
        }
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let vk = v[k] as f64;
        *out = (qf - vk) * (qf - vk) + f[v[k]];
    }
}
