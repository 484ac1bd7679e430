//! Texture-grid simulator.
//!
//! Particle state lives in five RGBA32F grids (see [`layout`]). One kernel
//! step reads the current position and velocity grids and writes the other
//! pair, then the pairs swap. [`GridExecutor`] hides where the kernel runs:
//! [`host::HostGrid`] on the CPU, [`crate::gpu::GpuGrid`] on a wgpu device.

pub mod host;
pub mod kernel;
pub mod layout;
pub mod shader;

pub use host::HostGrid;
pub use kernel::GridUniforms;
pub use layout::{GridLayout, GridState, Texel};

use crate::error::GpuError;
use crate::gpu::GpuGrid;

/// Something that can run the grid kernel.
pub trait GridExecutor {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn layout(&self) -> GridLayout;

    /// Replace every grid. The state's layout must match [`layout`](Self::layout).
    fn upload(&mut self, state: &GridState) -> Result<(), GpuError>;

    /// Run one kernel step and swap the position and velocity grids.
    fn step(&mut self, uniforms: &GridUniforms) -> Result<(), GpuError>;

    /// Current position and velocity grids, padding included.
    fn read_back(&mut self) -> Result<(Vec<Texel>, Vec<Texel>), GpuError>;

    /// Free all resources. Every later call fails with [`GpuError::Released`].
    fn release(&mut self);

    /// The device-resident executor, for renderers that sample its textures.
    fn as_gpu(&self) -> Option<&GpuGrid> {
        None
    }
}

pub(crate) fn check_layout(expected: GridLayout, state: &GridState) -> Result<(), GpuError> {
    let capacity = expected.capacity();
    let lengths = [
        state.pos.len(),
        state.vel.len(),
        state.random.len(),
        state.from.len(),
        state.to.len(),
    ];
    if let Some(&got) = lengths.iter().find(|&&n| n != capacity) {
        return Err(GpuError::SizeMismatch {
            expected: capacity,
            got,
        });
    }
    if state.layout != expected {
        return Err(GpuError::SizeMismatch {
            expected: capacity,
            got: state.layout.capacity(),
        });
    }
    Ok(())
}
