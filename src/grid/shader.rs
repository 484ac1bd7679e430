//! WGSL source of the grid kernel.
//!
//! The body is a line-by-line transcription of
//! [`step_motion`](crate::forces::step_motion). Uniform layout and phase mode
//! constants come from the derive macros, so only the motion code itself is
//! written by hand.

use crate::forces::{LOCK_SNAP, RESTITUTION, SOFT_PUSH};
use crate::shader_utils::all_utils_wgsl;
use crate::staging::PhaseMode;
use crate::WgslStruct;

use super::kernel::GridUniforms;

/// Workgroup edge length; dispatches cover `ceil(width / 8) x ceil(height / 8)`.
pub const WORKGROUP_SIZE: u32 = 8;

pub mod binding {
    pub const UNIFORMS: u32 = 0;
    pub const POS_IN: u32 = 1;
    pub const VEL_IN: u32 = 2;
    pub const RANDOM: u32 = 3;
    pub const FROM: u32 = 4;
    pub const TO: u32 = 5;
    pub const POS_OUT: u32 = 6;
    pub const VEL_OUT: u32 = 7;
}

const HELPERS: &str = r#"
// False for NaN and infinities; WGSL has no isnan/isinf.
fn finite1(x: f32) -> bool {
    return abs(x) <= 3.4e38;
}

fn finite3(v: vec3<f32>) -> bool {
    return all(abs(v) <= vec3<f32>(3.4e38));
}

fn ss(e0: f32, e1: f32, x: f32) -> f32 {
    if e1 <= e0 {
        return select(1.0, 0.0, x < e0);
    }
    let t = clamp((x - e0) / (e1 - e0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn gate(morph_t: f32, phase: f32, window: f32) -> f32 {
    let hi = min(phase + max(window, 0.0), 1.0);
    return ss(min(phase, hi), hi, morph_t);
}

fn scatter_anchor(r: vec4<f32>, radius: f32) -> vec3<f32> {
    var dir = vec3<f32>(r.x * 2.0 - 1.0, r.y * 2.0 - 1.0, (r.z * 2.0 - 1.0) * 0.3);
    if dot(dir, dir) < 1e-8 {
        dir = vec3<f32>(1.0, 0.0, 0.0);
    } else {
        dir = normalize(dir);
    }
    return dir * radius * (0.35 + 0.65 * sqrt(max(r.w, 0.0)));
}

fn vortex_accel(p: vec3<f32>, v: vec4<f32>) -> vec3<f32> {
    let d = p.xy - v.xy;
    let r2 = dot(d, d) + 0.02;
    let tangent = vec2<f32>(-d.y, d.x) / sqrt(r2);
    return vec3<f32>(tangent * v.w * 2.0 * exp(-r2 * 1.5), 0.0);
}

fn orbit_accel(p: vec3<f32>) -> vec3<f32> {
    let d = p.xy - u.orbit.xy;
    let r = max(length(d), 1e-3);
    let radial = d / r;
    let tangent = vec2<f32>(-radial.y, radial.x);
    let planar = tangent * u.orbit.w * u.orbit.z * 1.5 + radial * (u.orbit.z - r) * 6.0;
    return vec3<f32>(planar, -p.z * 2.0);
}

fn burst_accel(p: vec3<f32>) -> vec3<f32> {
    let d = p - u.burst.xyz;
    let d_len = length(d);
    var dir = vec3<f32>(1.0, 0.0, 0.0);
    if d_len > 1e-3 {
        dir = d / d_len;
    }
    return dir / (0.35 + d_len);
}

fn soft_boundary(p: vec3<f32>) -> vec3<f32> {
    let r = length(p);
    let margin = max(u.soft_margin, 1e-3);
    let inner = u.safe_radius - margin;
    if r <= inner || r < 1e-6 {
        return vec3<f32>(0.0);
    }
    let excess = (r - inner) / margin;
    return -p / r * excess * SOFT_PUSH;
}

fn lock_blend(settle: f32, dist: f32, dt: f32) -> f32 {
    if settle >= LOCK_SNAP {
        return 1.0;
    }
    var rate = u.lock_rate;
    if dist < u.near_epsilon {
        rate = rate * 0.5;
    }
    return clamp(settle * settle * (1.0 - exp(-rate * dt)), 0.0, 1.0);
}
"#;

const MAIN: &str = r#"
@compute @workgroup_size(8, 8)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(pos_in);
    if gid.x >= dims.x || gid.y >= dims.y {
        return;
    }
    let coords = vec2<i32>(i32(gid.x), i32(gid.y));
    let index = gid.y * u.width + gid.x;
    let pos_texel = textureLoad(pos_in, coords, 0);
    let vel_texel = textureLoad(vel_in, coords, 0);
    if index >= u.count {
        textureStore(pos_out, coords, pos_texel);
        textureStore(vel_out, coords, vel_texel);
        return;
    }

    let r = textureLoad(random_tex, coords, 0);
    let src_pos = textureLoad(from_tex, coords, 0).xyz;
    let dst_pos = textureLoad(to_tex, coords, 0).xyz;
    let ambient = pos_texel.w < 0.0;
    let phase = max(pos_texel.w, 0.0);
    let staged = !ambient && u.phase_mode != PHASE_MODE_NONE;
    let dt = max(u.dt, 0.0);

    var local_morph = u.morph_t;
    var g = 1.0;
    if staged {
        g = gate(u.morph_t, phase, u.phase_window);
        local_morph = g;
    }
    let goal = src_pos + (dst_pos - src_pos) * local_morph;
    let suppress = 1.0 - u.settle_t;

    // Scatter amount eases toward its target; gated particles hold theirs.
    var amount = vel_texel.w;
    var amount_goal = u.scatter_t;
    var rate = u.amount_rate_fast;
    if ambient {
        amount_goal = max(u.scatter_t, u.min_ambient_scatter);
    } else if staged && g < 1.0 {
        amount_goal = max(u.scatter_t, amount) * (1.0 - g) + u.scatter_t * g;
        rate = u.amount_rate_gated;
    }
    amount = clamp(amount + (amount_goal - amount) * (1.0 - exp(-rate * dt)), 0.0, 1.0);
    var effective = amount * suppress;
    if ambient {
        effective = amount;
    }

    let anchor = scatter_anchor(r, u.scatter_radius);
    let scattered = goal + (anchor - goal) * (0.55 + 0.45 * u.chaos_t);
    let desired = goal + (scattered - goal) * effective;

    let k = u.spring_loose + (u.spring_tight - u.spring_loose) * u.attract_t;
    let damping = u.drag + 1.6 * sqrt(k) * u.attract_t;
    var pos = pos_texel.xyz;
    var vel = vel_texel.xyz;
    var acc = (desired - pos) * k;

    var wobble = u.chaos_t * suppress;
    if ambient {
        wobble = max(u.chaos_t, u.min_ambient_scatter);
    }
    if wobble > 0.0 {
        let q = pos * u.noise_scale * u.noise_scale_mul + vec3<f32>(0.0, 0.0, u.time * u.noise_speed);
        acc += curl_noise(q) * u.noise_strength * wobble;
        if u.vortex_count > 0u {
            acc += vortex_accel(pos, u.vortex0) * u.vortex_strength * wobble;
        }
        if u.vortex_count > 1u {
            acc += vortex_accel(pos, u.vortex1) * u.vortex_strength * wobble;
        }
        if u.vortex_count > 2u {
            acc += vortex_accel(pos, u.vortex2) * u.vortex_strength * wobble;
        }
    }
    if u.has_orbit != 0u {
        acc += orbit_accel(pos) * u.orbit_strength * u.orbit_t * suppress;
    }
    if u.has_burst != 0u {
        acc += burst_accel(pos) * u.burst_strength * u.burst.w * u.burst_t * suppress;
    }
    if u.has_field != 0u {
        acc += (dst_pos - pos) * u.field_pull * u.next_field_t * g;
    }

    var magnet_falloff = 0.0;
    if u.magnet_enabled != 0u && !ambient && u.magnet.w > 0.0 {
        let d = pos - u.magnet.xyz;
        let dist = length(d);
        if dist < u.magnet.w {
            magnet_falloff = 1.0 - ss(0.0, u.magnet.w, dist);
            var dir = vec3<f32>(1.0, 0.0, 0.0);
            if dist > 1e-5 {
                dir = d / dist;
            }
            acc += dir * u.magnet_strength * magnet_falloff;
        }
    }

    acc += soft_boundary(pos);

    vel += acc * dt;
    vel *= exp(-damping * dt);
    let speed = length(vel);
    if speed > u.max_speed {
        vel *= u.max_speed / speed;
    }
    pos += vel * dt;

    let radius = length(pos);
    if radius > u.safe_radius && finite1(radius) {
        let n = pos / radius;
        pos = n * u.safe_radius;
        let vn = dot(vel, n);
        if vn > 0.0 {
            vel -= n * vn * (1.0 + RESTITUTION);
        }
    }

    if !ambient {
        let lock_w = lock_blend(u.settle_t, distance(pos, desired), dt) * (1.0 - magnet_falloff);
        if lock_w > 0.0 {
            pos = pos + (desired - pos) * lock_w;
            vel *= 1.0 - lock_w;
        }
    }

    if !(finite3(pos) && finite3(vel)) {
        pos = desired;
        vel = vec3<f32>(0.0);
    }

    textureStore(pos_out, coords, vec4<f32>(pos, pos_texel.w));
    textureStore(vel_out, coords, vec4<f32>(vel, amount));
}
"#;

/// Generate the complete compute shader.
pub fn kernel_wgsl() -> String {
    let mut code = String::new();
    code.push_str(GridUniforms::WGSL_STRUCT);
    code.push('\n');
    code.push_str(PhaseMode::WGSL_CONSTANTS);
    code.push_str(&format!(
        "const LOCK_SNAP: f32 = {:?};\nconst SOFT_PUSH: f32 = {:?};\nconst RESTITUTION: f32 = {:?};\n",
        LOCK_SNAP, SOFT_PUSH, RESTITUTION
    ));
    code.push_str(&format!(
        r#"
@group(0) @binding({}) var<uniform> u: GridUniforms;
@group(0) @binding({}) var pos_in: texture_2d<f32>;
@group(0) @binding({}) var vel_in: texture_2d<f32>;
@group(0) @binding({}) var random_tex: texture_2d<f32>;
@group(0) @binding({}) var from_tex: texture_2d<f32>;
@group(0) @binding({}) var to_tex: texture_2d<f32>;
@group(0) @binding({}) var pos_out: texture_storage_2d<rgba32float, write>;
@group(0) @binding({}) var vel_out: texture_storage_2d<rgba32float, write>;
"#,
        binding::UNIFORMS,
        binding::POS_IN,
        binding::VEL_IN,
        binding::RANDOM,
        binding::FROM,
        binding::TO,
        binding::POS_OUT,
        binding::VEL_OUT,
    ));
    code.push_str(&all_utils_wgsl());
    code.push_str(HELPERS);
    code.push_str(MAIN);
    code
}
