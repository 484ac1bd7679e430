//! Shape-aware staging.
//!
//! Each shape particle gets an activation phase in `[0, 1]`. It joins the
//! morph once `morph_t` passes its phase, blending in over a soft window.
//! Ambient particles ignore staging.

use serde::{Deserialize, Serialize};

use crate::cloud::PointCloud;
use crate::curves::smoothstep;
use crate::noise::{hash, rand};
use crate::shape::ShapeDescriptor;
use crate::GpuEnum;

/// How activation phases are assigned.
#[derive(GpuEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseMode {
    /// Every particle follows `morph_t` directly.
    #[default]
    None,
    /// Outline points settle first, then the interior.
    EdgeThenFill,
    /// Activation sweeps inward from the outline; the deepest interior goes last.
    SdfFront,
}

/// Phase ranges and the gate window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PhaseParams {
    pub edge_start: f32,
    pub edge_end: f32,
    pub fill_start: f32,
    pub fill_end: f32,
    /// Exponent applied to normalized interior distance in `SdfFront`.
    pub power: f32,
    /// Width of the soft activation window in `morph_t` units.
    pub window: f32,
}

impl Default for PhaseParams {
    fn default() -> Self {
        Self {
            edge_start: 0.0,
            edge_end: 0.25,
            fill_start: 0.2,
            fill_end: 0.75,
            power: 1.0,
            window: 0.18,
        }
    }
}

/// A staging mode together with its parameters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StagingProfile {
    pub mode: PhaseMode,
    pub params: PhaseParams,
}

impl StagingProfile {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(mode: PhaseMode, params: PhaseParams) -> Self {
        Self { mode, params }
    }
}

const PHASE_SALT: u32 = 0x5717_A6E5;

/// Phase of a point in `sdfFront` mode.
///
/// Monotonically non-decreasing in `depth` for `power > 0`.
pub fn sdf_front_phase(depth: f32, params: &PhaseParams) -> f32 {
    let power = if params.power > 0.0 { params.power } else { 1.0 };
    let d = depth.clamp(0.0, 1.0).powf(power);
    (params.fill_start + (params.fill_end - params.fill_start) * d).clamp(0.0, 1.0)
}

/// Phase of a point in `edgeThenFill` mode, drawn from a stable random.
pub fn edge_then_fill_phase(is_edge: bool, random: f32, params: &PhaseParams) -> f32 {
    let (lo, hi) = if is_edge {
        (params.edge_start, params.edge_end)
    } else {
        (params.fill_start, params.fill_end)
    };
    (lo + (hi - lo) * random.clamp(0.0, 1.0)).clamp(0.0, 1.0)
}

/// Compute one phase per point of `cloud`.
///
/// Returns the phases and the mode actually applied: `SdfFront` without a
/// descriptor degrades to `None`.
pub fn compute_phases(
    cloud: &PointCloud,
    descriptor: Option<&ShapeDescriptor>,
    profile: &StagingProfile,
) -> (Vec<f32>, PhaseMode) {
    let params = &profile.params;
    match (profile.mode, descriptor) {
        (PhaseMode::None, _) => (vec![0.0; cloud.len()], PhaseMode::None),
        (PhaseMode::EdgeThenFill, d) => {
            let phases = cloud
                .points
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let edge = p.is_edge || d.is_some_and(|d| d.is_edge_at(p.position));
                    let r = rand(hash(i as u32 ^ PHASE_SALT));
                    edge_then_fill_phase(edge, r, params)
                })
                .collect();
            (phases, PhaseMode::EdgeThenFill)
        }
        (PhaseMode::SdfFront, Some(d)) => {
            let phases = cloud
                .points
                .iter()
                .map(|p| sdf_front_phase(d.interior_depth(p.position), params))
                .collect();
            (phases, PhaseMode::SdfFront)
        }
        (PhaseMode::SdfFront, None) => {
            log::warn!("SDF staging requested without shape analysis; using plain morph");
            (vec![0.0; cloud.len()], PhaseMode::None)
        }
    }
}

/// Soft participation gate for a staged particle.
///
/// Zero until `morph_t` reaches `phase`, one from `phase + window`. Always one
/// at `morph_t == 1`.
#[inline]
pub fn gate(morph_t: f32, phase: f32, window: f32) -> f32 {
    let hi = (phase + window.max(0.0)).min(1.0);
    smoothstep(phase.min(hi), hi, morph_t)
}
