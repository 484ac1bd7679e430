//! CPU mirror of the WGSL random and noise helpers in [`shader_utils`](crate::shader_utils).
//!
//! The host grid kernel and the scalar simulator call these; the compute
//! shader calls the WGSL versions. Both produce the same values up to
//! floating point rounding.

use glam::{Vec3, Vec4};

/// Integer hash, identical to the WGSL `hash`.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5a_d4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c_1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x3184_8bab);
    x ^= x >> 14;
    x
}

/// Random float in `[0, 1]`, identical to the WGSL `rand`.
#[inline]
pub fn rand(seed: u32) -> f32 {
    hash(seed) as f32 / 4_294_967_295.0
}

/// Four stable randoms for particle `index` under `salt`.
///
/// Written once per particle; every force that needs per-particle variety
/// derives from these.
pub fn stable_randoms(index: u32, salt: u32) -> [f32; 4] {
    let h = hash(index.wrapping_mul(0x9E37_79B9) ^ salt);
    [
        rand(h),
        rand(h.wrapping_add(1)),
        rand(h.wrapping_add(2)),
        rand(h.wrapping_add(3)),
    ]
}

fn floor3(v: Vec3) -> Vec3 {
    v.floor()
}

fn mod289_3(x: Vec3) -> Vec3 {
    x - floor3(x * (1.0 / 289.0)) * 289.0
}

fn mod289_4(x: Vec4) -> Vec4 {
    x - (x * (1.0 / 289.0)).floor() * 289.0
}

fn permute4(x: Vec4) -> Vec4 {
    mod289_4(((x * 34.0) + Vec4::ONE) * x)
}

fn taylor_inv_sqrt4(r: Vec4) -> Vec4 {
    Vec4::splat(1.792_842_9) - 0.853_734_73 * r
}

/// WGSL `step(edge, x)`: 1 where `x >= edge`.
fn step3(edge: Vec3, x: Vec3) -> Vec3 {
    Vec3::new(
        if x.x >= edge.x { 1.0 } else { 0.0 },
        if x.y >= edge.y { 1.0 } else { 0.0 },
        if x.z >= edge.z { 1.0 } else { 0.0 },
    )
}

fn step4(edge: Vec4, x: Vec4) -> Vec4 {
    Vec4::new(
        if x.x >= edge.x { 1.0 } else { 0.0 },
        if x.y >= edge.y { 1.0 } else { 0.0 },
        if x.z >= edge.z { 1.0 } else { 0.0 },
        if x.w >= edge.w { 1.0 } else { 0.0 },
    )
}

/// 3D simplex noise in roughly `[-1, 1]`.
pub fn noise3(v: Vec3) -> f32 {
    let c = (1.0 / 6.0, 1.0 / 3.0);

    let mut i = (v + Vec3::splat(v.dot(Vec3::splat(c.1)))).floor();
    let x0 = v - i + Vec3::splat(i.dot(Vec3::splat(c.0)));

    let x0_yzx = Vec3::new(x0.y, x0.z, x0.x);
    let g = step3(x0_yzx, x0);
    let l = Vec3::ONE - g;
    let l_zxy = Vec3::new(l.z, l.x, l.y);
    let i1 = g.min(l_zxy);
    let i2 = g.max(l_zxy);

    let x1 = x0 - i1 + Vec3::splat(c.0);
    let x2 = x0 - i2 + Vec3::splat(c.1);
    let x3 = x0 - Vec3::splat(0.5);

    i = mod289_3(i);
    let p = permute4(
        permute4(
            permute4(Vec4::splat(i.z) + Vec4::new(0.0, i1.z, i2.z, 1.0))
                + Vec4::splat(i.y)
                + Vec4::new(0.0, i1.y, i2.y, 1.0),
        ) + Vec4::splat(i.x)
            + Vec4::new(0.0, i1.x, i2.x, 1.0),
    );

    // ns = n_ * D.wyz - D.xzx with D = (0, 0.5, 1, 2)
    let n_ = 0.142_857_15;
    let ns = Vec3::new(n_ * 2.0, n_ * 0.5 - 1.0, n_);

    let j = p - 49.0 * (p * ns.z * ns.z).floor();

    let x_ = (j * ns.z).floor();
    let y_ = (j - 7.0 * x_).floor();

    let x = x_ * ns.x + Vec4::splat(ns.y);
    let y = y_ * ns.x + Vec4::splat(ns.y);
    let h = Vec4::ONE - x.abs() - y.abs();

    let b0 = Vec4::new(x.x, x.y, y.x, y.y);
    let b1 = Vec4::new(x.z, x.w, y.z, y.w);

    let s0 = b0.floor() * 2.0 + Vec4::ONE;
    let s1 = b1.floor() * 2.0 + Vec4::ONE;
    let sh = -step4(h, Vec4::ZERO);

    let a0 = Vec4::new(b0.x, b0.z, b0.y, b0.w) + Vec4::new(s0.x, s0.z, s0.y, s0.w) * Vec4::new(sh.x, sh.x, sh.y, sh.y);
    let a1 = Vec4::new(b1.x, b1.z, b1.y, b1.w) + Vec4::new(s1.x, s1.z, s1.y, s1.w) * Vec4::new(sh.z, sh.z, sh.w, sh.w);

    let mut p0 = Vec3::new(a0.x, a0.y, h.x);
    let mut p1 = Vec3::new(a0.z, a0.w, h.y);
    let mut p2 = Vec3::new(a1.x, a1.y, h.z);
    let mut p3 = Vec3::new(a1.z, a1.w, h.w);

    let norm = taylor_inv_sqrt4(Vec4::new(p0.dot(p0), p1.dot(p1), p2.dot(p2), p3.dot(p3)));
    p0 *= norm.x;
    p1 *= norm.y;
    p2 *= norm.z;
    p3 *= norm.w;

    let mut m = (Vec4::splat(0.6) - Vec4::new(x0.dot(x0), x1.dot(x1), x2.dot(x2), x3.dot(x3)))
        .max(Vec4::ZERO);
    m *= m;
    42.0 * (m * m).dot(Vec4::new(p0.dot(x0), p1.dot(x1), p2.dot(x2), p3.dot(x3)))
}

/// Central-difference step of [`curl_noise`].
pub const CURL_EPS: f32 = 0.01;

/// Divergence-free flow in the XY plane from a scalar noise potential,
/// plus a weak independent Z drift.
pub fn curl_noise(p: Vec3) -> Vec3 {
    let dx = Vec3::new(CURL_EPS, 0.0, 0.0);
    let dy = Vec3::new(0.0, CURL_EPS, 0.0);
    let d_dy = (noise3(p + dy) - noise3(p - dy)) / (2.0 * CURL_EPS);
    let d_dx = (noise3(p + dx) - noise3(p - dx)) / (2.0 * CURL_EPS);
    let drift = noise3(p + Vec3::new(31.4, 17.2, 5.9));
    Vec3::new(d_dy, -d_dx, 0.25 * drift)
}
