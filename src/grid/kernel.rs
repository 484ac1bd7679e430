//! Per-frame uniforms and the host version of the grid kernel.

use glam::{Vec2, Vec3, Vec4};

use crate::curves::{CurveState, ScriptParams, Vortex};
use crate::forces::{step_motion, Magnet, MotionInput, MotionState, StepContext};
use crate::settings::SimParams;
use crate::staging::{PhaseMode, PhaseParams};
use crate::WgslStruct;

use super::layout::{GridLayout, GridState, Texel};

/// Everything the kernel reads besides the grids.
///
/// Optional curve channels travel as value plus `has_*` flag. Vortices,
/// orbit and burst pack their scalars into the `w` (or `zw`) lanes.
#[derive(Clone, Copy, Debug, Default, PartialEq, WgslStruct)]
pub struct GridUniforms {
    pub time: f32,
    pub dt: f32,
    pub count: u32,
    pub width: u32,

    pub morph_t: f32,
    pub scatter_t: f32,
    pub chaos_t: f32,
    pub attract_t: f32,

    pub settle_t: f32,
    pub orbit_t: f32,
    pub burst_t: f32,
    pub next_field_t: f32,

    pub has_orbit: u32,
    pub has_burst: u32,
    pub has_field: u32,
    pub phase_mode: u32,

    pub phase_window: f32,
    pub vortex_count: u32,
    pub noise_scale_mul: f32,
    pub magnet_enabled: u32,

    /// `xyz` center, `w` strength.
    pub vortex0: Vec4,
    pub vortex1: Vec4,
    pub vortex2: Vec4,
    /// `xy` center, `z` radius, `w` angular speed.
    pub orbit: Vec4,
    /// `xyz` center, `w` script strength.
    pub burst: Vec4,
    /// `xyz` center, `w` radius.
    pub magnet: Vec4,
    /// Positive repels, negative attracts.
    pub magnet_strength: f32,

    pub drag: f32,
    pub max_speed: f32,
    pub safe_radius: f32,
    pub soft_margin: f32,
    pub spring_loose: f32,
    pub spring_tight: f32,
    pub scatter_radius: f32,
    pub noise_scale: f32,
    pub noise_speed: f32,
    pub noise_strength: f32,
    pub vortex_strength: f32,
    pub orbit_strength: f32,
    pub burst_strength: f32,
    pub field_pull: f32,
    pub lock_rate: f32,
    pub near_epsilon: f32,
    pub amount_rate_fast: f32,
    pub amount_rate_gated: f32,
    pub min_ambient_scatter: f32,
}

fn vortex_lanes(v: &Vortex) -> Vec4 {
    v.center.extend(v.strength)
}

fn optional(value: Option<f32>) -> (f32, u32) {
    match value {
        Some(v) => (v, 1),
        None => (0.0, 0),
    }
}

impl GridUniforms {
    /// Pack one frame. `None` curve means idle, i.e. [`CurveState::formed`].
    pub fn from_frame(
        curve: Option<&CurveState>,
        params: &SimParams,
        dt: f32,
        time: f32,
        magnet: Option<&Magnet>,
        layout: GridLayout,
    ) -> Self {
        let formed = CurveState::formed();
        let c = curve.unwrap_or(&formed);
        let (orbit_t, has_orbit) = optional(c.orbit_t);
        let (burst_t, has_burst) = optional(c.burst_t);
        let (next_field_t, has_field) = optional(c.next_field_t);
        let s = &c.params;

        let (magnet_lanes, magnet_strength, magnet_enabled) = match magnet {
            Some(m) => (
                m.center.extend(m.radius),
                if m.repel { m.strength } else { -m.strength },
                1,
            ),
            None => (Vec4::ZERO, 0.0, 0),
        };

        Self {
            time,
            dt,
            count: layout.count,
            width: layout.width,
            morph_t: c.morph_t,
            scatter_t: c.scatter_t,
            chaos_t: c.chaos_t,
            attract_t: c.attract_t,
            settle_t: c.settle_t,
            orbit_t,
            burst_t,
            next_field_t,
            has_orbit,
            has_burst,
            has_field,
            phase_mode: c.phase_mode.into(),
            phase_window: c.phase_params.window,
            vortex_count: s.vortex_count.min(3),
            noise_scale_mul: s.noise_scale,
            magnet_enabled,
            vortex0: vortex_lanes(&s.vortices[0]),
            vortex1: vortex_lanes(&s.vortices[1]),
            vortex2: vortex_lanes(&s.vortices[2]),
            orbit: Vec4::new(s.orbit_center.x, s.orbit_center.y, s.orbit_radius, s.orbit_omega),
            burst: s.burst_center.extend(s.burst_strength),
            magnet: magnet_lanes,
            magnet_strength,
            drag: params.drag,
            max_speed: params.max_speed,
            safe_radius: params.safe_radius,
            soft_margin: params.soft_margin,
            spring_loose: params.spring_loose,
            spring_tight: params.spring_tight,
            scatter_radius: params.scatter_radius,
            noise_scale: params.noise_scale,
            noise_speed: params.noise_speed,
            noise_strength: params.noise_strength,
            vortex_strength: params.vortex_strength,
            orbit_strength: params.orbit_strength,
            burst_strength: params.burst_strength,
            field_pull: params.field_pull,
            lock_rate: params.lock_rate,
            near_epsilon: params.near_epsilon,
            amount_rate_fast: params.amount_rate_fast,
            amount_rate_gated: params.amount_rate_gated,
            min_ambient_scatter: params.min_ambient_scatter,
        }
    }

    /// Rebuild the curve a shader invocation sees.
    pub fn curve(&self) -> CurveState {
        let flag = |has: u32, v: f32| (has != 0).then_some(v);
        let unpack = |v: Vec4| Vortex {
            center: v.truncate(),
            strength: v.w,
        };
        CurveState {
            morph_t: self.morph_t,
            scatter_t: self.scatter_t,
            chaos_t: self.chaos_t,
            attract_t: self.attract_t,
            settle_t: self.settle_t,
            phase_mode: PhaseMode::from(self.phase_mode),
            phase_params: PhaseParams {
                window: self.phase_window,
                ..PhaseParams::default()
            },
            orbit_t: flag(self.has_orbit, self.orbit_t),
            burst_t: flag(self.has_burst, self.burst_t),
            next_field_t: flag(self.has_field, self.next_field_t),
            params: ScriptParams {
                vortices: [unpack(self.vortex0), unpack(self.vortex1), unpack(self.vortex2)],
                vortex_count: self.vortex_count,
                noise_scale: self.noise_scale_mul,
                orbit_center: Vec2::new(self.orbit.x, self.orbit.y),
                orbit_radius: self.orbit.z,
                orbit_omega: self.orbit.w,
                burst_center: self.burst.truncate(),
                burst_strength: self.burst.w,
            },
        }
    }

    pub fn sim_params(&self) -> SimParams {
        SimParams {
            drag: self.drag,
            max_speed: self.max_speed,
            safe_radius: self.safe_radius,
            soft_margin: self.soft_margin,
            spring_loose: self.spring_loose,
            spring_tight: self.spring_tight,
            scatter_radius: self.scatter_radius,
            noise_scale: self.noise_scale,
            noise_speed: self.noise_speed,
            noise_strength: self.noise_strength,
            vortex_strength: self.vortex_strength,
            orbit_strength: self.orbit_strength,
            burst_strength: self.burst_strength,
            field_pull: self.field_pull,
            lock_rate: self.lock_rate,
            near_epsilon: self.near_epsilon,
            amount_rate_fast: self.amount_rate_fast,
            amount_rate_gated: self.amount_rate_gated,
            min_ambient_scatter: self.min_ambient_scatter,
            ..SimParams::default()
        }
    }

    pub fn magnet(&self) -> Option<Magnet> {
        (self.magnet_enabled != 0).then(|| Magnet {
            center: self.magnet.truncate(),
            radius: self.magnet.w,
            strength: self.magnet_strength.abs(),
            repel: self.magnet_strength >= 0.0,
        })
    }
}

/// Read-only texels of one cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellInputs {
    pub random: Texel,
    pub from: Texel,
    pub to: Texel,
}

fn xyz(t: &Texel) -> Vec3 {
    Vec3::new(t[0], t[1], t[2])
}

/// Step one live texel. Phase `< 0` marks an ambient particle.
pub fn step_cell(pos: Texel, vel: Texel, cell: &CellInputs, ctx: &StepContext) -> (Texel, Texel) {
    let input = MotionInput {
        from: xyz(&cell.from),
        to: xyz(&cell.to),
        randoms: cell.random,
        phase: pos[3].max(0.0),
        ambient: pos[3] < 0.0,
    };
    let mut state = MotionState {
        position: xyz(&pos),
        velocity: xyz(&vel),
        amount: vel[3],
    };
    step_motion(&mut state, &input, ctx);
    let p = state.position;
    let v = state.velocity;
    ([p.x, p.y, p.z, pos[3]], [v.x, v.y, v.z, state.amount])
}

/// Host execution of one kernel dispatch over every cell of `input`.
///
/// Cells at `index >= count` are copied through unchanged.
pub fn dispatch(
    uniforms: &GridUniforms,
    input: &GridState,
    pos_out: &mut [Texel],
    vel_out: &mut [Texel],
) {
    let curve = uniforms.curve();
    let params = uniforms.sim_params();
    let magnet = uniforms.magnet();
    let ctx = StepContext {
        curve: &curve,
        params: &params,
        dt: uniforms.dt,
        time: uniforms.time,
        magnet: magnet.as_ref(),
    };

    let live = uniforms.count as usize;
    for i in 0..input.pos.len().min(pos_out.len()).min(vel_out.len()) {
        if i >= live {
            pos_out[i] = input.pos[i];
            vel_out[i] = input.vel[i];
            continue;
        }
        let cell = CellInputs {
            random: input.random[i],
            from: input.from[i],
            to: input.to[i],
        };
        let (p, v) = step_cell(input.pos[i], input.vel[i], &cell, &ctx);
        pos_out[i] = p;
        vel_out[i] = v;
    }
}
