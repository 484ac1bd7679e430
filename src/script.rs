//! Transition scripts.
//!
//! A script is a fixed composition of [`smoothstep`] and [`bump`] curves.
//! All randomness is drawn once in [`Script::start`]; [`Script::evaluate`]
//! is a pure function of `t`.

use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::curves::{bump, smoothstep, CurveState, ScriptParams, Vortex};
use crate::GpuEnum;

/// Names of the available scripts.
#[derive(GpuEnum, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptKind {
    /// Morph with mild scatter and no chaos.
    CleanMorph,
    /// Turbulent smoke: curl noise plus up to three vortices.
    SmokeNoise,
    /// Particles swirl around a common orbit before reforming.
    OrbitLoop,
    /// Outward burst, inward collapse, then a pull toward the next shape.
    FireballBurst,
}

/// Selection weights used by the `chaotic` style.
pub const CHAOTIC_WEIGHTS: [(ScriptKind, f32); 3] = [
    (ScriptKind::SmokeNoise, 0.45),
    (ScriptKind::OrbitLoop, 0.30),
    (ScriptKind::FireballBurst, 0.25),
];

impl ScriptKind {
    /// Stable display name, also used when persisting transition records.
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::CleanMorph => "CleanMorph",
            ScriptKind::SmokeNoise => "SmokeNoise",
            ScriptKind::OrbitLoop => "OrbitLoop",
            ScriptKind::FireballBurst => "FireballBurst",
        }
    }

    /// Pick a chaotic script from a uniform roll in `[0, 1)`.
    pub fn pick_chaotic(roll: f32) -> Self {
        let total: f32 = CHAOTIC_WEIGHTS.iter().map(|(_, w)| w).sum();
        let mut acc = 0.0;
        let target = roll.clamp(0.0, 1.0) * total;
        for (kind, weight) in CHAOTIC_WEIGHTS {
            acc += weight;
            if target < acc {
                return kind;
            }
        }
        CHAOTIC_WEIGHTS[CHAOTIC_WEIGHTS.len() - 1].0
    }
}

impl std::fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A script with its per-transition parameters baked in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Script {
    CleanMorph,
    SmokeNoise {
        vortices: [Vortex; 3],
        vortex_count: u32,
        noise_scale: f32,
    },
    OrbitLoop {
        center: Vec2,
        radius: f32,
        omega: f32,
    },
    FireballBurst {
        center: Vec3,
        strength: f32,
    },
}

fn random_in_disc<R: Rng>(rng: &mut R, radius: f32) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = radius * rng.gen::<f32>().sqrt();
    Vec2::new(angle.cos() * r, angle.sin() * r)
}

fn random_sign<R: Rng>(rng: &mut R) -> f32 {
    if rng.gen::<bool>() {
        1.0
    } else {
        -1.0
    }
}

impl Script {
    /// Draw the parameters for a script of the given kind.
    pub fn start<R: Rng>(kind: ScriptKind, rng: &mut R) -> Self {
        match kind {
            ScriptKind::CleanMorph => Script::CleanMorph,
            ScriptKind::SmokeNoise => {
                let vortex_count = rng.gen_range(1..=3u32);
                let mut vortices = [Vortex {
                    center: Vec3::ZERO,
                    strength: 0.0,
                }; 3];
                for vortex in vortices.iter_mut().take(vortex_count as usize) {
                    let c = random_in_disc(rng, 0.6);
                    *vortex = Vortex {
                        center: Vec3::new(c.x, c.y, 0.0),
                        strength: random_sign(rng) * rng.gen_range(0.6..1.6),
                    };
                }
                Script::SmokeNoise {
                    vortices,
                    vortex_count,
                    noise_scale: rng.gen_range(1.5..3.0),
                }
            }
            ScriptKind::OrbitLoop => Script::OrbitLoop {
                center: random_in_disc(rng, 0.2),
                radius: rng.gen_range(0.35..0.7),
                omega: random_sign(rng) * rng.gen_range(1.5..3.0),
            },
            ScriptKind::FireballBurst => {
                let c = random_in_disc(rng, 0.25);
                Script::FireballBurst {
                    center: Vec3::new(c.x, c.y, 0.0),
                    strength: rng.gen_range(1.2..2.4),
                }
            }
        }
    }

    pub fn kind(&self) -> ScriptKind {
        match self {
            Script::CleanMorph => ScriptKind::CleanMorph,
            Script::SmokeNoise { .. } => ScriptKind::SmokeNoise,
            Script::OrbitLoop { .. } => ScriptKind::OrbitLoop,
            Script::FireballBurst { .. } => ScriptKind::FireballBurst,
        }
    }

    /// Force parameters handed to the simulators.
    pub fn params(&self) -> ScriptParams {
        let mut params = ScriptParams::default();
        match *self {
            Script::CleanMorph => {}
            Script::SmokeNoise {
                vortices,
                vortex_count,
                noise_scale,
            } => {
                params.vortices = vortices;
                params.vortex_count = vortex_count.min(3);
                params.noise_scale = noise_scale;
            }
            Script::OrbitLoop {
                center,
                radius,
                omega,
            } => {
                params.orbit_center = center;
                params.orbit_radius = radius;
                params.orbit_omega = omega;
            }
            Script::FireballBurst { center, strength } => {
                params.burst_center = center;
                params.burst_strength = strength;
            }
        }
        params
    }

    /// Evaluate the script at normalized progress `t`.
    pub fn evaluate(&self, t: f32) -> CurveState {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mut state = CurveState::formed();
        state.params = self.params();

        match self {
            Script::CleanMorph => {
                state.morph_t = smoothstep(0.15, 0.85, t);
                state.scatter_t = 0.35 * bump(t, 0.0, 0.8, 0.25);
                state.chaos_t = 0.0;
                state.attract_t = smoothstep(0.45, 0.9, t);
                state.settle_t = smoothstep(0.8, 1.0, t);
            }
            Script::SmokeNoise { .. } => {
                state.morph_t = smoothstep(0.2, 0.88, t);
                state.scatter_t = bump(t, 0.0, 0.78, 0.25);
                state.chaos_t = bump(t, 0.05, 0.75, 0.2);
                state.attract_t = smoothstep(0.5, 0.92, t);
                state.settle_t = smoothstep(0.8, 1.0, t);
            }
            Script::OrbitLoop { .. } => {
                state.morph_t = smoothstep(0.25, 0.9, t);
                state.scatter_t = bump(t, 0.05, 0.75, 0.2);
                state.chaos_t = 0.35 * bump(t, 0.1, 0.7, 0.2);
                state.attract_t = smoothstep(0.5, 0.92, t);
                state.settle_t = smoothstep(0.82, 1.0, t);
                state.orbit_t = Some(bump(t, 0.05, 0.8, 0.2));
            }
            Script::FireballBurst { .. } => {
                state.morph_t = smoothstep(0.3, 0.9, t);
                state.scatter_t = bump(t, 0.0, 0.7, 0.15);
                state.chaos_t = 0.6 * bump(t, 0.05, 0.6, 0.15);
                state.attract_t = smoothstep(0.55, 0.92, t);
                state.settle_t = smoothstep(0.82, 1.0, t);
                state.burst_t = Some(bump(t, 0.0, 0.3, 0.1) - 0.5 * bump(t, 0.35, 0.7, 0.15));
                state.next_field_t = Some(smoothstep(0.55, 0.95, t));
            }
        }

        state.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn all_scripts() -> Vec<Script> {
        let mut rng = StdRng::seed_from_u64(7);
        [
            ScriptKind::CleanMorph,
            ScriptKind::SmokeNoise,
            ScriptKind::OrbitLoop,
            ScriptKind::FireballBurst,
        ]
        .into_iter()
        .map(|kind| Script::start(kind, &mut rng))
        .collect()
    }

    #[test]
    fn test_curve_bounds_all_scripts() {
        for script in all_scripts() {
            for i in 0..=1000 {
                let state = script.evaluate(i as f32 / 1000.0);
                for v in state.unit_channels() {
                    assert!((0.0..=1.0).contains(&v), "{} out of range: {}", script.kind(), v);
                }
                if let Some(b) = state.burst_t {
                    assert!((-1.0..=1.0).contains(&b));
                }
            }
        }
    }

    #[test]
    fn test_completion_reaches_one() {
        for script in all_scripts() {
            let end = script.evaluate(1.0);
            assert_eq!(end.morph_t, 1.0, "{}", script.kind());
            assert_eq!(end.settle_t, 1.0, "{}", script.kind());
            assert_eq!(end.scatter_t, 0.0, "{}", script.kind());
        }
    }

    #[test]
    fn test_start_at_zero() {
        for script in all_scripts() {
            let start = script.evaluate(0.0);
            assert_eq!(start.morph_t, 0.0);
            assert_eq!(start.settle_t, 0.0);
        }
    }

    #[test]
    fn test_clean_morph_has_no_chaos() {
        for i in 0..=100 {
            assert_eq!(Script::CleanMorph.evaluate(i as f32 / 100.0).chaos_t, 0.0);
        }
    }

    #[test]
    fn test_fireball_burst_is_signed() {
        let mut rng = StdRng::seed_from_u64(3);
        let script = Script::start(ScriptKind::FireballBurst, &mut rng);
        let out = script.evaluate(0.15).burst_t.unwrap();
        let back = script.evaluate(0.52).burst_t.unwrap();
        assert!(out > 0.0);
        assert!(back < 0.0);
    }

    #[test]
    fn test_pick_chaotic_weights() {
        assert_eq!(ScriptKind::pick_chaotic(0.0), ScriptKind::SmokeNoise);
        assert_eq!(ScriptKind::pick_chaotic(0.5), ScriptKind::OrbitLoop);
        assert_eq!(ScriptKind::pick_chaotic(0.99), ScriptKind::FireballBurst);
        assert_eq!(ScriptKind::pick_chaotic(1.0), ScriptKind::FireballBurst);
    }

    #[test]
    fn test_smoke_vortex_count_in_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..32 {
            let script = Script::start(ScriptKind::SmokeNoise, &mut rng);
            let params = script.params();
            assert!((1..=3).contains(&params.vortex_count));
        }
    }

    #[test]
    fn test_kind_codes_roundtrip() {
        for code in 0..ScriptKind::count() {
            let kind = ScriptKind::from(code);
            assert_eq!(u32::from(kind), code);
        }
    }
}
