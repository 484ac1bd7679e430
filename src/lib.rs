//! # morphdust
//!
//! Shape-morphing particle engine. Particles dissolve, scatter and reform
//! into a sequence of target point clouds, on the CPU or on the GPU.
//!
//! ## Quick Start
//!
//! ```ignore
//! use morphdust::prelude::*;
//!
//! let settings = Settings { count: 5_000, ..Settings::default() };
//! let mut engine = Engine::for_export(settings, 30.0);
//! engine.load_targets(vec![
//!     TargetSpec::shape(Shape::outline(vec![circle])),
//!     TargetSpec::shape(Shape::outline(vec![star])),
//! ])?;
//!
//! for _ in 0..300 {
//!     let report = engine.step();
//!     for p in engine.particles() {
//!         draw(p.position, p.display_color, p.size, p.opacity);
//!     }
//! }
//! ```
//!
//! ## How a frame is made
//!
//! 1. A [`Sequence`] decides when transitions start and commit.
//! 2. The [`TransitionDirector`] picks a script per transition and evaluates
//!    it to a [`CurveState`]: five canonical curves (`morph`, `scatter`,
//!    `chaos`, `attract`, `settle`) plus script extras.
//! 3. Optional shape-aware staging gives each particle a phase, so outlines
//!    settle before fill or fronts sweep inward along a signed distance field.
//! 4. A simulator applies the shared force model in [`forces`] for one `dt`.
//!
//! ## Backends
//!
//! | Backend | Runs on | Notes |
//! |---------|---------|-------|
//! | [`Backend::Scalar`] | CPU | one record per particle, always available |
//! | [`Backend::HostGrid`] | CPU | the grid kernel on host memory |
//! | [`Backend::Grid`] | GPU | wgpu compute on `rgba32float` textures |
//!
//! The grid paths are statistically, not bitwise, equivalent to the scalar
//! path. If no GPU is usable the engine reports it once and stays scalar.
//!
//! ## Determinism
//!
//! With [`Engine::for_export`] the director is deterministic and the clock
//! advances by exactly `1 / fps`. The tuple `(seed, from id, to id, style,
//! duration)` then fixes the script and every curve value.

extern crate self as morphdust;

pub mod build;
pub mod cloud;
pub mod curves;
pub mod director;
pub mod engine;
pub mod error;
pub mod forces;
pub mod gpu;
pub mod grid;
pub mod noise;
pub mod scalar;
pub mod script;
pub mod sdf;
pub mod sequence;
pub mod settings;
pub mod shader_utils;
pub mod shape;
pub mod staging;
pub mod stats;
pub mod time;

pub use bytemuck;
pub use glam::{Vec2, Vec3, Vec4};
pub use morphdust_derive::{GpuEnum, WgslStruct};

pub use build::{BuildToken, PreparedTarget, TargetSpec};
pub use cloud::{Point, PointCloud};
pub use curves::CurveState;
pub use director::{DirectorMode, TransitionDirector, TransitionRecord, TransitionStyle};
pub use engine::{Engine, FrameReport};
pub use error::{ConfigError, EngineError, GpuError, ShapeError};
pub use forces::Magnet;
pub use sequence::{Sequence, SequenceEvent, SequenceMode};
pub use settings::{Backend, Settings, SimParams, MAX_COUNT};
pub use shape::{Shape, ShapeAnalyzer, ShapeDescriptor};
pub use staging::{PhaseMode, PhaseParams, StagingProfile};
pub use stats::DistributionStats;

/// Trait implemented by `#[derive(WgslStruct)]`.
///
/// Bridges a Rust struct to a uniform block. The derive macro generates:
/// - A companion `{Name}Gpu` struct with explicit padding fields
/// - The matching WGSL `struct` definition
/// - The conversion between the two
///
/// # Do Not Implement Manually
///
/// The padding rules (vec3 and vec4 aligned to 16 bytes, total size a
/// multiple of 16) are easy to get wrong by hand.
pub trait WgslStruct {
    /// GPU-compatible representation with proper memory alignment.
    type Gpu: Copy + bytemuck::Pod + bytemuck::Zeroable;

    /// Struct name as it appears in WGSL.
    const WGSL_NAME: &'static str;

    /// WGSL struct definition matching [`Self::Gpu`] byte for byte.
    const WGSL_STRUCT: &'static str;

    fn to_gpu(&self) -> Self::Gpu;
}

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use morphdust::prelude::*;
/// ```
pub mod prelude {
    pub use crate::build::TargetSpec;
    pub use crate::cloud::{Point, PointCloud};
    pub use crate::director::TransitionStyle;
    pub use crate::engine::{Engine, FrameReport};
    pub use crate::forces::Magnet;
    pub use crate::sequence::{SequenceEvent, SequenceMode};
    pub use crate::settings::{Backend, Settings};
    pub use crate::shape::Shape;
    pub use crate::staging::PhaseMode;
    pub use crate::{Vec2, Vec3, Vec4};
}
