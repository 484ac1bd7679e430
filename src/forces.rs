//! Force model shared by the scalar simulator and the grid kernel.
//!
//! [`step_motion`] advances one particle by one frame. The scalar simulator
//! calls it per [`Particle`](crate::scalar::Particle), the host grid kernel per
//! texel, and the compute shader carries a WGSL transcription of it. Keep the
//! three in step when changing anything here.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::curves::{smoothstep, CurveState, ScriptParams, Vortex};
use crate::noise::curl_noise;
use crate::settings::SimParams;
use crate::staging::{gate, PhaseMode};

/// Settle values at or above this snap particles onto their targets.
pub const LOCK_SNAP: f32 = 1.0 - 1e-6;
/// Strength of the soft inward push beyond `safe_radius - soft_margin`.
pub const SOFT_PUSH: f32 = 30.0;
/// Fraction of outward speed kept after a hard boundary hit.
pub const RESTITUTION: f32 = 0.6;

/// A pointer-driven attractor or repeller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Magnet {
    pub center: Vec3,
    pub radius: f32,
    pub strength: f32,
    pub repel: bool,
}

impl Magnet {
    pub fn attract(center: Vec3, radius: f32, strength: f32) -> Self {
        Self {
            center,
            radius,
            strength,
            repel: false,
        }
    }

    pub fn repel(center: Vec3, radius: f32, strength: f32) -> Self {
        Self {
            center,
            radius,
            strength,
            repel: true,
        }
    }

    /// Acceleration at `position` and the falloff weight in `[0, 1]`.
    pub fn influence(&self, position: Vec3) -> (Vec3, f32) {
        if self.radius <= 0.0 {
            return (Vec3::ZERO, 0.0);
        }
        let d = position - self.center;
        let dist = d.length();
        if dist >= self.radius {
            return (Vec3::ZERO, 0.0);
        }
        let falloff = 1.0 - smoothstep(0.0, self.radius, dist);
        let dir = if dist > 1e-5 { d / dist } else { Vec3::X };
        let sign = if self.repel { 1.0 } else { -1.0 };
        (dir * self.strength * falloff * sign, falloff)
    }
}

/// Far scatter anchor derived only from a particle's stable randoms.
pub fn scatter_anchor(randoms: [f32; 4], radius: f32) -> Vec3 {
    let dir = Vec3::new(
        randoms[0] * 2.0 - 1.0,
        randoms[1] * 2.0 - 1.0,
        (randoms[2] * 2.0 - 1.0) * 0.3,
    );
    let dir = if dir.length_squared() < 1e-8 {
        Vec3::X
    } else {
        dir.normalize()
    };
    dir * radius * (0.35 + 0.65 * randoms[3].max(0.0).sqrt())
}

/// How far toward the anchor a fully scattered particle goes.
#[inline]
pub fn scatter_strength(chaos_t: f32) -> f32 {
    0.55 + 0.45 * chaos_t
}

pub fn vortex_accel(position: Vec3, vortex: &Vortex) -> Vec3 {
    let d = position.truncate() - vortex.center.truncate();
    let r2 = d.length_squared() + 0.02;
    let tangent = Vec2::new(-d.y, d.x) / r2.sqrt();
    (tangent * vortex.strength * 2.0 * (-r2 * 1.5).exp()).extend(0.0)
}

pub fn orbit_accel(position: Vec3, params: &ScriptParams) -> Vec3 {
    let d = position.truncate() - params.orbit_center;
    let r = d.length().max(1e-3);
    let radial = d / r;
    let tangent = Vec2::new(-radial.y, radial.x);
    let planar = tangent * params.orbit_omega * params.orbit_radius * 1.5
        + radial * (params.orbit_radius - r) * 6.0;
    planar.extend(-position.z * 2.0)
}

pub fn burst_accel(position: Vec3, center: Vec3) -> Vec3 {
    let d = position - center;
    let len = d.length();
    let dir = if len > 1e-3 { d / len } else { Vec3::X };
    dir / (0.35 + len)
}

/// Inward push once a particle enters the outer margin.
pub fn soft_boundary(position: Vec3, safe_radius: f32, margin: f32) -> Vec3 {
    let r = position.length();
    let inner = safe_radius - margin.max(1e-3);
    if r <= inner || r < 1e-6 {
        return Vec3::ZERO;
    }
    let excess = (r - inner) / margin.max(1e-3);
    -position / r * excess * SOFT_PUSH
}

/// Project back onto the safe sphere and reflect outward velocity.
pub fn hard_boundary(position: &mut Vec3, velocity: &mut Vec3, safe_radius: f32) {
    let r = position.length();
    if r <= safe_radius || !r.is_finite() {
        return;
    }
    let n = *position / r;
    *position = n * safe_radius;
    let vn = velocity.dot(n);
    if vn > 0.0 {
        *velocity -= n * vn * (1.0 + RESTITUTION);
    }
}

/// Fraction of the remaining gap to close this frame.
///
/// Grows with `settle_t²`, runs at half rate within `near_epsilon` and is
/// exactly one once settle completes.
pub fn lock_blend(settle_t: f32, distance: f32, params: &SimParams, dt: f32) -> f32 {
    if settle_t >= LOCK_SNAP {
        return 1.0;
    }
    let rate = if distance < params.near_epsilon {
        params.lock_rate * 0.5
    } else {
        params.lock_rate
    };
    (settle_t * settle_t * (1.0 - (-rate * dt.max(0.0)).exp())).clamp(0.0, 1.0)
}

/// Mutable per-particle motion state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionState {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Current scatter amount in `[0, 1]`.
    pub amount: f32,
}

/// Read-only per-particle inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionInput {
    pub from: Vec3,
    pub to: Vec3,
    pub randoms: [f32; 4],
    pub phase: f32,
    pub ambient: bool,
}

/// Per-frame inputs shared by every particle.
#[derive(Clone, Copy, Debug)]
pub struct StepContext<'a> {
    pub curve: &'a CurveState,
    pub params: &'a SimParams,
    pub dt: f32,
    pub time: f32,
    pub magnet: Option<&'a Magnet>,
}

/// What a particle is converging to this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Goal {
    /// Formed position along the morph.
    pub target: Vec3,
    /// Position the spring pulls toward after scatter.
    pub desired: Vec3,
    /// Local morph progress after staging.
    pub local_morph: f32,
    /// Staging gate, one when unstaged.
    pub gate: f32,
}

fn is_staged(input: &MotionInput, curve: &CurveState) -> bool {
    !input.ambient && curve.phase_mode != PhaseMode::None
}

/// Local morph progress for one particle.
pub fn local_morph(input: &MotionInput, curve: &CurveState) -> (f32, f32) {
    if is_staged(input, curve) {
        let g = gate(curve.morph_t, input.phase, curve.phase_params.window);
        (g, g)
    } else {
        (curve.morph_t, 1.0)
    }
}

/// Advance one particle by `ctx.dt`. Returns the goal it moved toward.
pub fn step_motion(state: &mut MotionState, input: &MotionInput, ctx: &StepContext) -> Goal {
    let c = ctx.curve;
    let p = ctx.params;
    let dt = ctx.dt.max(0.0);
    let staged = is_staged(input, c);
    let (local, g) = local_morph(input, c);
    let target = input.from + (input.to - input.from) * local;
    let suppress = 1.0 - c.settle_t;

    // Scatter amount eases toward its target; gated particles hold theirs.
    let global = c.scatter_t;
    let (amount_target, rate) = if input.ambient {
        (global.max(p.min_ambient_scatter), p.amount_rate_fast)
    } else if staged && g < 1.0 {
        (global.max(state.amount) * (1.0 - g) + global * g, p.amount_rate_gated)
    } else {
        (global, p.amount_rate_fast)
    };
    state.amount += (amount_target - state.amount) * (1.0 - (-rate * dt).exp());
    state.amount = state.amount.clamp(0.0, 1.0);
    let effective = if input.ambient {
        state.amount
    } else {
        state.amount * suppress
    };

    let anchor = scatter_anchor(input.randoms, p.scatter_radius);
    let scattered = target + (anchor - target) * scatter_strength(c.chaos_t);
    let desired = target.lerp(scattered, effective);

    let k = p.spring_loose + (p.spring_tight - p.spring_loose) * c.attract_t;
    let damping = p.drag + 1.6 * k.sqrt() * c.attract_t;
    let mut acc = (desired - state.position) * k;

    let wobble = if input.ambient {
        c.chaos_t.max(p.min_ambient_scatter)
    } else {
        c.chaos_t * suppress
    };
    if wobble > 0.0 {
        let q = state.position * p.noise_scale * c.params.noise_scale
            + Vec3::new(0.0, 0.0, ctx.time * p.noise_speed);
        acc += curl_noise(q) * p.noise_strength * wobble;
        for vortex in c.params.vortices.iter().take(c.params.vortex_count.min(3) as usize) {
            acc += vortex_accel(state.position, vortex) * p.vortex_strength * wobble;
        }
    }
    if let Some(o) = c.orbit_t {
        acc += orbit_accel(state.position, &c.params) * p.orbit_strength * o * suppress;
    }
    if let Some(b) = c.burst_t {
        acc += burst_accel(state.position, c.params.burst_center)
            * p.burst_strength
            * c.params.burst_strength
            * b
            * suppress;
    }
    if let Some(f) = c.next_field_t {
        acc += (input.to - state.position) * p.field_pull * f * g;
    }

    let mut magnet_falloff = 0.0;
    if let (Some(m), false) = (ctx.magnet, input.ambient) {
        let (m_acc, falloff) = m.influence(state.position);
        acc += m_acc;
        magnet_falloff = falloff;
    }

    acc += soft_boundary(state.position, p.safe_radius, p.soft_margin);

    state.velocity += acc * dt;
    state.velocity *= (-damping * dt).exp();
    let speed = state.velocity.length();
    if speed > p.max_speed {
        state.velocity *= p.max_speed / speed;
    }
    state.position += state.velocity * dt;

    hard_boundary(&mut state.position, &mut state.velocity, p.safe_radius);

    if !input.ambient {
        let lock = lock_blend(c.settle_t, state.position.distance(desired), p, dt)
            * (1.0 - magnet_falloff);
        if lock > 0.0 {
            state.position = state.position.lerp(desired, lock);
            state.velocity *= 1.0 - lock;
        }
    }

    if !state.position.is_finite() || !state.velocity.is_finite() {
        state.position = desired;
        state.velocity = Vec3::ZERO;
    }

    Goal {
        target,
        desired,
        local_morph: local,
        gate: g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(from: Vec3, to: Vec3) -> MotionInput {
        MotionInput {
            from,
            to,
            randoms: [0.2, 0.7, 0.4, 0.9],
            phase: 0.0,
            ambient: false,
        }
    }

    #[test]
    fn test_formed_curve_snaps_to_target() {
        let curve = CurveState::formed();
        let params = SimParams::default();
        let ctx = StepContext {
            curve: &curve,
            params: &params,
            dt: 1.0 / 60.0,
            time: 0.0,
            magnet: None,
        };
        let mut state = MotionState {
            position: Vec3::new(0.5, 0.5, 0.0),
            velocity: Vec3::new(1.0, 0.0, 0.0),
            amount: 0.4,
        };
        let target = Vec3::new(-0.3, 0.2, 0.0);
        step_motion(&mut state, &input(Vec3::ZERO, target), &ctx);
        assert!(state.position.distance(target) < 1e-6);
        assert_eq!(state.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_lock_blend_shape() {
        let p = SimParams::default();
        assert_eq!(lock_blend(0.0, 1.0, &p, 1.0 / 30.0), 0.0);
        assert_eq!(lock_blend(1.0, 1.0, &p, 1.0 / 30.0), 1.0);
        let far = lock_blend(0.5, 1.0, &p, 1.0 / 30.0);
        let near = lock_blend(0.5, 0.001, &p, 1.0 / 30.0);
        assert!(near < far && near > 0.0);
    }

    #[test]
    fn test_hard_boundary_reflects() {
        let mut pos = Vec3::new(2.0, 0.0, 0.0);
        let mut vel = Vec3::new(1.0, 0.5, 0.0);
        hard_boundary(&mut pos, &mut vel, 1.6);
        assert!((pos.length() - 1.6).abs() < 1e-6);
        assert!(vel.x < 0.0);
        assert_eq!(vel.y, 0.5);
    }

    #[test]
    fn test_soft_boundary_points_inward() {
        assert_eq!(soft_boundary(Vec3::new(0.5, 0.0, 0.0), 1.6, 0.15), Vec3::ZERO);
        let push = soft_boundary(Vec3::new(1.55, 0.0, 0.0), 1.6, 0.15);
        assert!(push.x < 0.0);
    }

    #[test]
    fn test_magnet_falloff() {
        let m = Magnet::repel(Vec3::ZERO, 0.5, 3.0);
        let (acc, w) = m.influence(Vec3::new(0.1, 0.0, 0.0));
        assert!(acc.x > 0.0 && w > 0.0 && w <= 1.0);
        assert_eq!(m.influence(Vec3::new(0.6, 0.0, 0.0)), (Vec3::ZERO, 0.0));
        let (acc, _) = Magnet::attract(Vec3::ZERO, 0.5, 3.0).influence(Vec3::new(0.1, 0.0, 0.0));
        assert!(acc.x < 0.0);
    }

    #[test]
    fn test_magnet_skips_ambient() {
        let mut curve = CurveState::formed();
        curve.settle_t = 0.0;
        let params = SimParams::default();
        let magnet = Magnet::repel(Vec3::ZERO, 1.0, 8.0);
        let run = |ambient: bool, magnet: Option<&Magnet>| {
            let ctx = StepContext {
                curve: &curve,
                params: &params,
                dt: 1.0 / 30.0,
                time: 0.0,
                magnet,
            };
            let mut inp = input(Vec3::new(0.1, 0.0, 0.0), Vec3::new(0.1, 0.0, 0.0));
            inp.ambient = ambient;
            let mut state = MotionState {
                position: Vec3::new(0.1, 0.0, 0.0),
                ..MotionState::default()
            };
            step_motion(&mut state, &inp, &ctx);
            state.position
        };
        assert_eq!(run(true, Some(&magnet)), run(true, None));
        assert!(run(false, Some(&magnet)).x > run(false, None).x);
    }

    #[test]
    fn test_scatter_anchor_stable_and_bounded() {
        let a = scatter_anchor([0.1, 0.9, 0.5, 0.3], 1.1);
        assert_eq!(a, scatter_anchor([0.1, 0.9, 0.5, 0.3], 1.1));
        assert!(a.length() <= 1.1 + 1e-5);
        assert!(scatter_anchor([0.5, 0.5, 0.5, 1.0], 1.0).is_finite());
    }

    #[test]
    fn test_ambient_keeps_min_scatter() {
        let curve = CurveState::formed();
        let params = SimParams::default();
        let ctx = StepContext {
            curve: &curve,
            params: &params,
            dt: 1.0 / 30.0,
            time: 0.0,
            magnet: None,
        };
        let mut state = MotionState::default();
        let mut inp = input(Vec3::ZERO, Vec3::ZERO);
        inp.ambient = true;
        for _ in 0..120 {
            step_motion(&mut state, &inp, &ctx);
        }
        assert!((state.amount - params.min_ambient_scatter).abs() < 1e-3);
    }

    #[test]
    fn test_staged_particle_waits_for_gate() {
        let mut curve = CurveState::formed();
        curve.morph_t = 0.3;
        curve.settle_t = 0.0;
        curve.attract_t = 1.0;
        curve.scatter_t = 0.0;
        curve.phase_mode = PhaseMode::SdfFront;
        let mut inp = input(Vec3::ZERO, Vec3::X);
        inp.phase = 0.6;
        let (local, g) = local_morph(&inp, &curve);
        assert_eq!(local, 0.0);
        assert_eq!(g, 0.0);
        inp.phase = 0.1;
        let (local, g) = local_morph(&inp, &curve);
        assert_eq!(local, 1.0);
        assert_eq!(g, 1.0);
    }

    #[test]
    fn test_speed_clamped() {
        let mut curve = CurveState::formed();
        curve.settle_t = 0.0;
        let params = SimParams::default();
        let ctx = StepContext {
            curve: &curve,
            params: &params,
            dt: 1.0 / 30.0,
            time: 0.0,
            magnet: None,
        };
        let mut state = MotionState {
            position: Vec3::new(-1.0, 0.0, 0.0),
            velocity: Vec3::ZERO,
            amount: 0.0,
        };
        step_motion(&mut state, &input(Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)), &ctx);
        assert!(state.velocity.length() <= params.max_speed + 1e-4);
    }
}
