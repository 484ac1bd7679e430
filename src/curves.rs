//! Timing curves that drive every transition.
//!
//! All curves are pure functions of a normalized progress value `t ∈ [0, 1]`.
//! Scripts compose [`smoothstep`] and [`bump`] into the five canonical
//! channels of a [`CurveState`].
//!
//! # Channels
//!
//! | Channel | Meaning |
//! |---------|---------|
//! | `morph_t` | Blend from the source cloud to the target cloud |
//! | `scatter_t` | How far particles are pushed toward their scattered anchors |
//! | `chaos_t` | Amplitude of noise/vortex wobble and scatter radius |
//! | `attract_t` | Stiffness of the spring toward the formed position |
//! | `settle_t` | Terminal lock onto exact targets, suppresses wobble |
//!
//! Scripts may add `orbit_t`, `burst_t` (signed) and `next_field_t`.

use glam::{Vec2, Vec3};

use crate::staging::{PhaseMode, PhaseParams};

/// Hermite smoothstep between two edges.
///
/// When `edge1 <= edge0` this degenerates to a step at `edge0`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Smoothed rectangular window over `[start, end]`.
///
/// Rises over `[start, start + fade]` and falls over `[end - fade, end]`.
/// Always in `[0, 1]`.
#[inline]
pub fn bump(t: f32, start: f32, end: f32, fade: f32) -> f32 {
    let rise = smoothstep(start, start + fade, t);
    let fall = 1.0 - smoothstep(end - fade, end, t);
    (rise * fall).clamp(0.0, 1.0)
}

/// Clamp to the unit interval, mapping NaN to zero.
#[inline]
pub fn clamp01(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// A vortex baked into a script at transition start.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vortex {
    /// Vortex centre in particle space.
    pub center: Vec3,
    /// Signed angular strength (positive = counter-clockwise around +Z).
    pub strength: f32,
}

/// Per-transition force parameters chosen by the script at start.
///
/// These never change during a transition; only the `*_t` gates do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScriptParams {
    /// Up to three vortices (`vortex_count` of them are active).
    pub vortices: [Vortex; 3],
    /// Number of active entries in `vortices`.
    pub vortex_count: u32,
    /// Noise frequency multiplier applied on top of the simulation's noise scale.
    pub noise_scale: f32,
    /// Orbit centre in the XY plane.
    pub orbit_center: Vec2,
    /// Preferred orbit radius.
    pub orbit_radius: f32,
    /// Signed angular velocity of the orbit in radians per second.
    pub orbit_omega: f32,
    /// Burst origin.
    pub burst_center: Vec3,
    /// Burst impulse multiplier.
    pub burst_strength: f32,
}

impl Default for ScriptParams {
    fn default() -> Self {
        Self {
            vortices: [Vortex {
                center: Vec3::ZERO,
                strength: 0.0,
            }; 3],
            vortex_count: 0,
            noise_scale: 1.0,
            orbit_center: Vec2::ZERO,
            orbit_radius: 0.5,
            orbit_omega: 0.0,
            burst_center: Vec3::ZERO,
            burst_strength: 0.0,
        }
    }
}

/// The per-frame timing state shared by both simulators.
///
/// Produced by [`TransitionDirector::evaluate`](crate::TransitionDirector::evaluate).
/// All `*_t` values are in `[0, 1]` except `burst_t`, which is in `[-1, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveState {
    pub morph_t: f32,
    pub scatter_t: f32,
    pub chaos_t: f32,
    pub attract_t: f32,
    pub settle_t: f32,
    /// Staging mode attached by the sequence; `PhaseMode::None` disables gating.
    pub phase_mode: PhaseMode,
    pub phase_params: PhaseParams,
    pub orbit_t: Option<f32>,
    pub burst_t: Option<f32>,
    pub next_field_t: Option<f32>,
    pub params: ScriptParams,
}

impl CurveState {
    /// A fully formed, motionless state.
    pub fn formed() -> Self {
        Self {
            morph_t: 1.0,
            scatter_t: 0.0,
            chaos_t: 0.0,
            attract_t: 1.0,
            settle_t: 1.0,
            phase_mode: PhaseMode::None,
            phase_params: PhaseParams::default(),
            orbit_t: None,
            burst_t: None,
            next_field_t: None,
            params: ScriptParams::default(),
        }
    }

    /// Clamp every channel into its legal range.
    pub fn clamped(mut self) -> Self {
        self.morph_t = clamp01(self.morph_t);
        self.scatter_t = clamp01(self.scatter_t);
        self.chaos_t = clamp01(self.chaos_t);
        self.attract_t = clamp01(self.attract_t);
        self.settle_t = clamp01(self.settle_t);
        self.orbit_t = self.orbit_t.map(clamp01);
        self.burst_t = self
            .burst_t
            .map(|b| if b.is_nan() { 0.0 } else { b.clamp(-1.0, 1.0) });
        self.next_field_t = self.next_field_t.map(clamp01);
        self
    }

    /// Scale the chaos channel by a user setting in `[0, 1]`.
    pub fn with_chaos_scale(mut self, chaos: f32) -> Self {
        self.chaos_t = clamp01(self.chaos_t * clamp01(chaos));
        self
    }

    /// Attach a staging profile.
    pub fn with_staging(mut self, mode: PhaseMode, params: PhaseParams) -> Self {
        self.phase_mode = mode;
        self.phase_params = params;
        self
    }

    /// Iterate over the channels that must lie in `[0, 1]`.
    pub fn unit_channels(&self) -> impl Iterator<Item = f32> + '_ {
        [
            Some(self.morph_t),
            Some(self.scatter_t),
            Some(self.chaos_t),
            Some(self.attract_t),
            Some(self.settle_t),
            self.orbit_t,
            self.next_field_t,
        ]
        .into_iter()
        .flatten()
    }
}

impl Default for CurveState {
    fn default() -> Self {
        Self::formed()
    }
}
