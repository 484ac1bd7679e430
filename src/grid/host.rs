//! CPU executor for the grid kernel.

use crate::error::GpuError;

use super::kernel::{dispatch, GridUniforms};
use super::layout::{GridLayout, GridState, Texel};
use super::{check_layout, GridExecutor};

/// Runs [`dispatch`] on host memory with the same ping-pong discipline as
/// the GPU path.
#[derive(Debug)]
pub struct HostGrid {
    layout: GridLayout,
    state: GridState,
    pos_back: Vec<Texel>,
    vel_back: Vec<Texel>,
    released: bool,
}

impl HostGrid {
    pub fn new(layout: GridLayout) -> Self {
        let n = layout.capacity();
        Self {
            layout,
            state: GridState::zeroed(layout),
            pos_back: vec![[0.0; 4]; n],
            vel_back: vec![[0.0; 4]; n],
            released: false,
        }
    }

    /// All grids as they stand.
    pub fn state(&self) -> &GridState {
        &self.state
    }

    fn live(&self) -> Result<(), GpuError> {
        if self.released {
            Err(GpuError::Released)
        } else {
            Ok(())
        }
    }
}

impl GridExecutor for HostGrid {
    fn name(&self) -> &'static str {
        "host-grid"
    }

    fn layout(&self) -> GridLayout {
        self.layout
    }

    fn upload(&mut self, state: &GridState) -> Result<(), GpuError> {
        self.live()?;
        check_layout(self.layout, state)?;
        self.state.clone_from(state);
        Ok(())
    }

    fn step(&mut self, uniforms: &GridUniforms) -> Result<(), GpuError> {
        self.live()?;
        dispatch(uniforms, &self.state, &mut self.pos_back, &mut self.vel_back);
        std::mem::swap(&mut self.state.pos, &mut self.pos_back);
        std::mem::swap(&mut self.state.vel, &mut self.vel_back);
        Ok(())
    }

    fn read_back(&mut self) -> Result<(Vec<Texel>, Vec<Texel>), GpuError> {
        self.live()?;
        Ok((self.state.pos.clone(), self.state.vel.clone()))
    }

    fn release(&mut self) {
        if !self.released {
            log::debug!("Releasing {} ({} cells)", self.name(), self.layout.capacity());
        }
        self.released = true;
        self.state = GridState::zeroed(GridLayout {
            count: 0,
            width: 0,
            height: 0,
        });
        self.pos_back = Vec::new();
        self.vel_back = Vec::new();
    }
}
