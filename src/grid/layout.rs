//! Grid dimensions and texel packing.
//!
//! | Grid | x | y | z | w |
//! |------|---|---|---|---|
//! | position | x | y | z | phase, `-1` for ambient |
//! | velocity | vx | vy | vz | scatter amount |
//! | random | r0 | r1 | r2 | r3 |
//! | from / to | x | y | z | edge flag |
//!
//! Cells at `index >= count` are padding and stay zero.

use crate::scalar::Particle;

pub type Texel = [f32; 4];

/// Phase written for ambient particles.
pub const AMBIENT_PHASE: f32 = -1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GridLayout {
    pub count: u32,
    pub width: u32,
    pub height: u32,
}

impl GridLayout {
    /// Smallest near-square grid holding `count` cells.
    pub fn for_count(count: u32) -> Self {
        let count = count.max(1);
        let mut width = (count as f64).sqrt().ceil() as u32;
        while width.saturating_mul(width) < count {
            width += 1;
        }
        let height = count.div_ceil(width);
        Self {
            count,
            width,
            height,
        }
    }

    pub fn capacity(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn padding(&self) -> usize {
        self.capacity() - self.count as usize
    }

    pub fn coords(&self, index: u32) -> (u32, u32) {
        (index % self.width, index / self.width)
    }

    pub fn is_padding(&self, index: usize) -> bool {
        index >= self.count as usize
    }
}

/// All five grids on the host side.
#[derive(Clone, Debug, PartialEq)]
pub struct GridState {
    pub layout: GridLayout,
    pub pos: Vec<Texel>,
    pub vel: Vec<Texel>,
    pub random: Vec<Texel>,
    pub from: Vec<Texel>,
    pub to: Vec<Texel>,
}

impl GridState {
    pub fn zeroed(layout: GridLayout) -> Self {
        let n = layout.capacity();
        Self {
            layout,
            pos: vec![[0.0; 4]; n],
            vel: vec![[0.0; 4]; n],
            random: vec![[0.0; 4]; n],
            from: vec![[0.0; 4]; n],
            to: vec![[0.0; 4]; n],
        }
    }

    /// Pack scalar particles into grids.
    pub fn from_particles(particles: &[Particle]) -> Self {
        let layout = GridLayout::for_count(particles.len() as u32);
        let mut state = Self::zeroed(layout);
        for (i, p) in particles.iter().enumerate() {
            let (from, to) = p.endpoints();
            let edge_from = p.base_style.is_edge as u32 as f32;
            let edge_to = p.target_style.unwrap_or(p.base_style).is_edge as u32 as f32;
            let phase = if p.is_ambient { AMBIENT_PHASE } else { p.phase };
            state.pos[i] = [p.position.x, p.position.y, p.position.z, phase];
            state.vel[i] = [p.velocity.x, p.velocity.y, p.velocity.z, p.amount];
            state.random[i] = p.randoms;
            state.from[i] = [from.x, from.y, from.z, edge_from];
            state.to[i] = [to.x, to.y, to.z, edge_to];
        }
        state
    }
}

/// Write grid positions, velocities and amounts back into particles.
pub fn write_back(pos: &[Texel], vel: &[Texel], particles: &mut [Particle]) {
    for ((p, pt), vt) in particles.iter_mut().zip(pos).zip(vel) {
        p.position = glam::Vec3::new(pt[0], pt[1], pt[2]);
        p.velocity = glam::Vec3::new(vt[0], vt[1], vt[2]);
        p.amount = vt[3];
    }
}
