//! wgpu executor for the grid kernel.
//!
//! Headless: no surface, no window. Positions and velocities live in two
//! ping-pong pairs of `rgba32float` textures; the kernel samples one pair
//! and writes the other through storage bindings.

use wgpu::util::DeviceExt;

use crate::error::GpuError;
use crate::grid::shader::{binding, kernel_wgsl, WORKGROUP_SIZE};
use crate::grid::{check_layout, GridExecutor, GridLayout, GridState, GridUniforms, Texel};
use crate::WgslStruct;

const GRID_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
const TEXEL_BYTES: u32 = 16;

pub struct GpuGrid {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    layout: GridLayout,
    /// `[read, write]` swaps every step; `current` indexes the freshest pair.
    pos: [wgpu::Texture; 2],
    vel: [wgpu::Texture; 2],
    random: wgpu::Texture,
    from: wgpu::Texture,
    to: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    /// `bind_groups[i]` reads pair `i` and writes pair `1 - i`.
    bind_groups: [wgpu::BindGroup; 2],
    readback: wgpu::Buffer,
    padded_row: u32,
    current: usize,
    released: bool,
}

impl GpuGrid {
    /// Create a device and all grid resources for `layout`.
    pub fn new(layout: GridLayout) -> Result<Self, GpuError> {
        pollster::block_on(Self::new_async(layout))
    }

    pub async fn new_async(layout: GridLayout) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let features = adapter.get_texture_format_features(GRID_FORMAT);
        if !features
            .allowed_usages
            .contains(wgpu::TextureUsages::STORAGE_BINDING)
        {
            return Err(GpuError::UnsupportedFormat);
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Grid Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let max_dim = device.limits().max_texture_dimension_2d;
        if layout.width > max_dim || layout.height > max_dim {
            return Err(GpuError::SizeMismatch {
                expected: (max_dim as usize) * (max_dim as usize),
                got: layout.count as usize,
            });
        }

        log::info!(
            "GPU grid on {} ({}x{} cells for {} particles)",
            adapter.get_info().name,
            layout.width,
            layout.height,
            layout.count
        );

        let make_texture = |label: &str| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent(layout),
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: GRID_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        };
        let pos = [make_texture("Position A"), make_texture("Position B")];
        let vel = [make_texture("Velocity A"), make_texture("Velocity B")];
        let random = make_texture("Random");
        let from = make_texture("Morph From");
        let to = make_texture("Morph To");

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Grid Uniforms"),
            contents: bytemuck::bytes_of(&GridUniforms::default().to_gpu()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampled = |index: u32| wgpu::BindGroupLayoutEntry {
            binding: index,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let storage = |index: u32| wgpu::BindGroupLayoutEntry {
            binding: index,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: GRID_FORMAT,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: binding::UNIFORMS,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                sampled(binding::POS_IN),
                sampled(binding::VEL_IN),
                sampled(binding::RANDOM),
                sampled(binding::FROM),
                sampled(binding::TO),
                storage(binding::POS_OUT),
                storage(binding::VEL_OUT),
            ],
        });

        let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
        let random_view = view(&random);
        let from_view = view(&from);
        let to_view = view(&to);
        let make_bind_group = |read: usize| {
            let write = 1 - read;
            let pos_in = view(&pos[read]);
            let vel_in = view(&vel[read]);
            let pos_out = view(&pos[write]);
            let vel_out = view(&vel[write]);
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Grid Bind Group"),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: binding::UNIFORMS,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::POS_IN,
                        resource: wgpu::BindingResource::TextureView(&pos_in),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::VEL_IN,
                        resource: wgpu::BindingResource::TextureView(&vel_in),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::RANDOM,
                        resource: wgpu::BindingResource::TextureView(&random_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::FROM,
                        resource: wgpu::BindingResource::TextureView(&from_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::TO,
                        resource: wgpu::BindingResource::TextureView(&to_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::POS_OUT,
                        resource: wgpu::BindingResource::TextureView(&pos_out),
                    },
                    wgpu::BindGroupEntry {
                        binding: binding::VEL_OUT,
                        resource: wgpu::BindingResource::TextureView(&vel_out),
                    },
                ],
            })
        };
        let bind_groups = [make_bind_group(0), make_bind_group(1)];

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Kernel"),
            source: wgpu::ShaderSource::Wgsl(kernel_wgsl().into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Grid Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Grid Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        // Rows in texture-to-buffer copies are aligned to 256 bytes.
        let padded_row = (layout.width * TEXEL_BYTES).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Readback"),
            size: padded_row as u64 * layout.height as u64 * 2,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            layout,
            pos,
            vel,
            random,
            from,
            to,
            uniform_buffer,
            bind_groups,
            readback,
            padded_row,
            current: 0,
            released: false,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Position grid written by the latest step. `w` carries the staging
    /// phase, negative for ambient particles.
    pub fn positions_texture(&self) -> &wgpu::Texture {
        &self.pos[self.current]
    }

    /// Velocity grid written by the latest step. `w` carries the scatter amount.
    pub fn velocities_texture(&self) -> &wgpu::Texture {
        &self.vel[self.current]
    }

    fn live(&self) -> Result<(), GpuError> {
        if self.released {
            Err(GpuError::Released)
        } else {
            Ok(())
        }
    }

    fn write_grid(&self, texture: &wgpu::Texture, texels: &[Texel]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.layout.width * TEXEL_BYTES),
                rows_per_image: Some(self.layout.height),
            },
            extent(self.layout),
        );
    }

    fn copy_to_readback(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture, offset: u64) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset,
                    bytes_per_row: Some(self.padded_row),
                    rows_per_image: Some(self.layout.height),
                },
            },
            extent(self.layout),
        );
    }

    fn unpad(&self, bytes: &[u8]) -> Vec<Texel> {
        let row_bytes = (self.layout.width * TEXEL_BYTES) as usize;
        let mut texels = Vec::with_capacity(self.layout.capacity());
        for row in bytes.chunks_exact(self.padded_row as usize) {
            texels.extend_from_slice(bytemuck::cast_slice::<u8, Texel>(&row[..row_bytes]));
        }
        texels
    }
}

fn extent(layout: GridLayout) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: layout.width,
        height: layout.height,
        depth_or_array_layers: 1,
    }
}

impl GridExecutor for GpuGrid {
    fn name(&self) -> &'static str {
        "gpu-grid"
    }

    fn layout(&self) -> GridLayout {
        self.layout
    }

    fn upload(&mut self, state: &GridState) -> Result<(), GpuError> {
        self.live()?;
        check_layout(self.layout, state)?;
        self.write_grid(&self.pos[self.current], &state.pos);
        self.write_grid(&self.vel[self.current], &state.vel);
        self.write_grid(&self.random, &state.random);
        self.write_grid(&self.from, &state.from);
        self.write_grid(&self.to, &state.to);
        Ok(())
    }

    fn step(&mut self, uniforms: &GridUniforms) -> Result<(), GpuError> {
        self.live()?;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms.to_gpu()));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Grid Step"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Grid Kernel Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.current], &[]);
            pass.dispatch_workgroups(
                self.layout.width.div_ceil(WORKGROUP_SIZE),
                self.layout.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(Some(encoder.finish()));
        self.current = 1 - self.current;
        Ok(())
    }

    fn read_back(&mut self) -> Result<(Vec<Texel>, Vec<Texel>), GpuError> {
        self.live()?;
        let half = self.padded_row as u64 * self.layout.height as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Grid Readback"),
            });
        self.copy_to_readback(&mut encoder, &self.pos[self.current], 0);
        self.copy_to_readback(&mut encoder, &self.vel[self.current], half);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let (pos, vel) = {
            let data = slice.get_mapped_range();
            let (pos_bytes, vel_bytes) = data.split_at(half as usize);
            (self.unpad(pos_bytes), self.unpad(vel_bytes))
        };
        self.readback.unmap();
        Ok((pos, vel))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        log::debug!("Releasing {} ({} cells)", self.name(), self.layout.capacity());
        for texture in self.pos.iter().chain(&self.vel) {
            texture.destroy();
        }
        self.random.destroy();
        self.from.destroy();
        self.to.destroy();
        self.uniform_buffer.destroy();
        self.readback.destroy();
        self.released = true;
    }

    fn as_gpu(&self) -> Option<&GpuGrid> {
        Some(self)
    }
}

impl Drop for GpuGrid {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SimParams;

    fn device_or_skip(layout: GridLayout) -> Option<GpuGrid> {
        match GpuGrid::new(layout) {
            Ok(grid) => Some(grid),
            Err(e) => {
                eprintln!("skipping GPU test: {e}");
                None
            }
        }
    }

    #[test]
    fn test_gpu_formed_step_and_padding() {
        let layout = GridLayout::for_count(70);
        let Some(mut grid) = device_or_skip(layout) else {
            return;
        };
        let sentinel = [5.0, 6.0, 7.0, 8.0];
        let mut state = GridState::zeroed(layout);
        for i in 0..layout.capacity() {
            if layout.is_padding(i) {
                state.pos[i] = sentinel;
                state.vel[i] = sentinel;
            } else {
                let x = (i as f32 / 70.0) - 0.5;
                state.pos[i] = [0.0, 0.0, 0.0, 0.0];
                state.to[i] = [x, -x, 0.0, 0.0];
                state.from[i] = [x, -x, 0.0, 0.0];
            }
        }
        grid.upload(&state).unwrap();
        let u = GridUniforms::from_frame(None, &SimParams::default(), 1.0 / 30.0, 0.0, None, layout);
        grid.step(&u).unwrap();
        grid.step(&u).unwrap();
        let (pos, vel) = grid.read_back().unwrap();
        for i in 0..layout.capacity() {
            if layout.is_padding(i) {
                assert_eq!(pos[i], sentinel);
                assert_eq!(vel[i], sentinel);
            } else {
                assert!((pos[i][0] - state.to[i][0]).abs() < 1e-4);
                assert!((pos[i][1] - state.to[i][1]).abs() < 1e-4);
            }
        }
        grid.release();
        assert!(matches!(grid.step(&u), Err(GpuError::Released)));
    }

    #[test]
    fn test_exposed_textures_follow_the_swap() {
        let layout = GridLayout::for_count(16);
        let Some(mut grid) = device_or_skip(layout) else {
            return;
        };
        assert!(grid.as_gpu().is_some());
        assert!(std::ptr::eq(grid.positions_texture(), &grid.pos[0]));
        grid.upload(&GridState::zeroed(layout)).unwrap();
        let u = GridUniforms::from_frame(None, &SimParams::default(), 1.0 / 30.0, 0.0, None, layout);
        grid.step(&u).unwrap();
        assert!(std::ptr::eq(grid.positions_texture(), &grid.pos[1]));
        assert!(std::ptr::eq(grid.velocities_texture(), &grid.vel[1]));
        assert_eq!(grid.positions_texture().format(), GRID_FORMAT);
    }
}
