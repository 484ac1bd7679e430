//! Scalar particle simulator.
//!
//! One [`Particle`] record per particle, updated in a plain loop. Particles
//! are created once by [`ScalarSimulator::initialize`] and repositioned in
//! place afterwards; only a new particle count reallocates them.

use glam::Vec3;

use crate::cloud::{Point, PointCloud};
use crate::curves::CurveState;
use crate::forces::{local_morph, scatter_anchor, step_motion, Magnet, MotionInput, MotionState, StepContext};
use crate::noise::{hash, rand, stable_randoms};
use crate::settings::SimParams;

const RANDOM_SALT: u32 = 0x0BAD_5EED;
const AMBIENT_SALT: u32 = 0xA3B1_E17A;
/// Radius of the shell ambient particles drift in, independent of any target.
const AMBIENT_SPREAD: f32 = 1.0;
/// How much a fully scattered particle grows.
const SCATTER_GROWTH: f32 = 0.35;
/// How much a fully scattered particle fades.
const SCATTER_FADE: f32 = 0.35;

/// Render attributes carried by a target point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointStyle {
    pub color: Vec3,
    pub size_mul: f32,
    pub opacity_mul: f32,
    pub is_edge: bool,
}

impl From<&Point> for PointStyle {
    fn from(p: &Point) -> Self {
        Self {
            color: p.color,
            size_mul: p.size_mul,
            opacity_mul: p.opacity_mul,
            is_edge: p.is_edge,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Written once at creation.
    pub randoms: [f32; 4],
    /// Formed position of the current formation.
    pub base: Vec3,
    pub base_style: PointStyle,
    /// Set when a transition is pushed, cleared on commit.
    pub morph_from: Option<Vec3>,
    pub morph_to: Option<Vec3>,
    pub target_style: Option<PointStyle>,
    pub is_ambient: bool,
    /// Staging phase for the in-flight transition.
    pub phase: f32,
    /// Current scatter amount.
    pub amount: f32,
    pub size: f32,
    pub opacity: f32,
    pub display_color: Vec3,
    pub is_edge: bool,
}

impl Particle {
    fn new(index: u32, point: &Point, seed: u32, ambient_ratio: f32) -> Self {
        let style = PointStyle::from(point);
        let is_ambient = rand(hash(index ^ AMBIENT_SALT) ^ seed) < ambient_ratio;
        let randoms = stable_randoms(index, seed ^ RANDOM_SALT);
        let home = if is_ambient {
            scatter_anchor(randoms, AMBIENT_SPREAD)
        } else {
            point.position
        };
        Self {
            position: home,
            velocity: Vec3::ZERO,
            randoms,
            base: home,
            base_style: style,
            morph_from: None,
            morph_to: None,
            target_style: None,
            is_ambient,
            phase: 0.0,
            amount: 0.0,
            size: style.size_mul,
            opacity: style.opacity_mul,
            display_color: style.color,
            is_edge: style.is_edge,
        }
    }

    /// Source and destination of the current motion.
    pub fn endpoints(&self) -> (Vec3, Vec3) {
        (
            self.morph_from.unwrap_or(self.base),
            self.morph_to.unwrap_or(self.base),
        )
    }

    pub fn motion_input(&self) -> MotionInput {
        let (from, to) = self.endpoints();
        MotionInput {
            from,
            to,
            randoms: self.randoms,
            phase: self.phase,
            ambient: self.is_ambient,
        }
    }

    /// Recompute size, opacity, color and edge flag for `local` morph progress.
    pub fn refresh_display(&mut self, local: f32) {
        let to = self.target_style.unwrap_or(self.base_style);
        let from = self.base_style;
        let size = from.size_mul + (to.size_mul - from.size_mul) * local;
        let opacity = from.opacity_mul + (to.opacity_mul - from.opacity_mul) * local;
        self.size = size * (1.0 + SCATTER_GROWTH * self.amount);
        self.opacity = (opacity * (1.0 - SCATTER_FADE * self.amount)).clamp(0.0, 1.0);
        self.display_color = from.color.lerp(to.color, local);
        self.is_edge = if local >= 0.5 { to.is_edge } else { from.is_edge };
    }
}

#[derive(Clone, Debug, Default)]
pub struct ScalarSimulator {
    particles: Vec<Particle>,
    seed: u32,
}

impl ScalarSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create one particle per point, formed on `cloud`.
    pub fn initialize(&mut self, cloud: &PointCloud, seed: u32, ambient_ratio: f32) {
        self.seed = seed;
        self.particles = cloud
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Particle::new(i as u32, p, seed, ambient_ratio))
            .collect();
        log::debug!("Initialized {} scalar particles", self.particles.len());
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// Push a new target. Short or long clouds are fitted to the particle count.
    /// Ambient particles keep their own anchors.
    pub fn morph_to(&mut self, cloud: &PointCloud, phases: &[f32]) {
        let fitted;
        let cloud = if cloud.len() == self.particles.len() {
            cloud
        } else {
            fitted = cloud.fit_to(self.particles.len(), self.seed);
            &fitted
        };
        for (i, (particle, point)) in self.particles.iter_mut().zip(&cloud.points).enumerate() {
            if particle.is_ambient {
                continue;
            }
            particle.morph_from = Some(particle.base);
            particle.morph_to = Some(point.position);
            particle.target_style = Some(PointStyle::from(point));
            particle.phase = phases.get(i).copied().unwrap_or(0.0).clamp(0.0, 1.0);
        }
    }

    /// Make the pushed target the new formation.
    pub fn commit(&mut self) {
        for particle in &mut self.particles {
            if let Some(to) = particle.morph_to.take() {
                particle.base = to;
            }
            if let Some(style) = particle.target_style.take() {
                particle.base_style = style;
            }
            particle.morph_from = None;
            particle.phase = 0.0;
        }
    }

    /// Abandon the in-flight target and treat current positions as formed.
    pub fn rebase_to_current(&mut self) {
        for particle in self.particles.iter_mut().filter(|p| !p.is_ambient) {
            particle.base = particle.position;
            particle.morph_from = None;
            particle.morph_to = None;
            particle.target_style = None;
            particle.phase = 0.0;
        }
    }

    /// Advance every particle by `dt`. `None` means idle: hold the formation.
    pub fn update(
        &mut self,
        curve: Option<&CurveState>,
        dt: f32,
        time: f32,
        params: &SimParams,
        magnet: Option<&Magnet>,
    ) {
        let formed = CurveState::formed();
        let curve = curve.unwrap_or(&formed);
        let ctx = StepContext {
            curve,
            params,
            dt,
            time,
            magnet,
        };

        for particle in &mut self.particles {
            let input = particle.motion_input();
            let mut state = MotionState {
                position: particle.position,
                velocity: particle.velocity,
                amount: particle.amount,
            };
            let goal = step_motion(&mut state, &input, &ctx);
            particle.position = state.position;
            particle.velocity = state.velocity;
            particle.amount = state.amount;
            particle.refresh_display(goal.local_morph);
        }
    }

    /// Recompute display attributes after positions were written externally.
    pub fn refresh_display(&mut self, curve: Option<&CurveState>) {
        let formed = CurveState::formed();
        let curve = curve.unwrap_or(&formed);
        for particle in &mut self.particles {
            let (local, _) = local_morph(&particle.motion_input(), curve);
            particle.refresh_display(local);
        }
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Where each particle ends up once the current motion completes.
    pub fn final_targets(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.endpoints().1).collect()
    }
}
