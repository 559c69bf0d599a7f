use std::borrow::Cow;
use std::mem;

use glam::UVec3;
use log::{debug, info, warn};
use rand::Rng;
use wgpu::{util::DeviceExt, BindGroup, Buffer, ComputePipeline, Device, Queue};

use super::shaders::{meshing_shader, transition_shader, workgroups};
use crate::error::Error;
use crate::mesh::{Vertex, FACES_PER_CELL, VERTICES_PER_FACE};
use crate::palette::{Palette, FALLBACK_COLOR};
use crate::rule::{RuleError, RuleSpec};
use crate::seed::Seed;

/// A grid stepped and meshed on the GPU, with a host mirror for editing.
///
/// The mirror is only as fresh as the last [`GpuAutomata::pull`]; edits reach the
/// device on [`GpuAutomata::push`].
pub struct GpuAutomata {
    pub dim: UVec3,
    pub size: u32,
    rule: RuleSpec,
    pipeline: ComputePipeline,
    mesh_pipeline: ComputePipeline,
    buffers: [Buffer; 2],
    bind_groups: Vec<BindGroup>,
    palette_buffer: Buffer,
    mesh_buffer: Buffer,
    mesh_bind_groups: Vec<BindGroup>,
    buffer_idx: usize,
    staging_buffer: Buffer,
    cells: Vec<u32>,
    generation: u64,
}

fn palette_contents(palette: &Palette) -> Vec<u32> {
    // Zero-sized bindings are invalid; an empty palette colors everything with the fallback.
    if palette.is_empty() {
        vec![FALLBACK_COLOR]
    } else {
        palette.colors().to_vec()
    }
}

/// Bytes of mesh storage one cell occupies.
pub const MESH_BYTES_PER_CELL: u64 =
    (FACES_PER_CELL * VERTICES_PER_FACE * mem::size_of::<Vertex>()) as u64;

/// Checks that every buffer a `dim` grid needs fits `limits`, returning the cell count.
pub fn check_grid_size(dim: UVec3, limits: &wgpu::Limits) -> Result<u32, Error> {
    if dim.cmpeq(UVec3::ZERO).any() {
        return Err(Error::EmptyGrid(dim));
    }
    let cells = (dim.x as u64)
        .saturating_mul(dim.y as u64)
        .saturating_mul(dim.z as u64);
    // The mesh buffer is the largest. A binding never exceeds u32::MAX bytes, so a
    // grid that passes also has a u32 cell count.
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    let bytes = cells.saturating_mul(MESH_BYTES_PER_CELL);
    if bytes > limit {
        return Err(Error::GridTooLarge { dim, bytes, limit });
    }
    Ok(cells as u32)
}

impl GpuAutomata {
    pub fn new(dim: UVec3, rule: &str, palette: &Palette, device: &Device) -> Result<Self, Error> {
        let size = check_grid_size(dim, &device.limits())?;
        let rule = RuleSpec::parse(rule)?;
        info!("new {:?} gpu automata under {}", dim, rule);
        Ok(Self::build(dim, size, rule, palette, device))
    }

    /// `size` must come from [`check_grid_size`] for `dim`.
    fn build(dim: UVec3, size: u32, rule: RuleSpec, palette: &Palette, device: &Device) -> Self {
        let initial_state = vec![0u32; size as usize];
        let slice_size = (size as usize * mem::size_of::<u32>()) as wgpu::BufferAddress;

        let cs_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("automata transition"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(transition_shader(&rule, dim))),
        });
        let mesh_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("automata mesher"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(meshing_shader(dim))),
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Automata Staging"),
            size: slice_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let tensor = |label| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&initial_state),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            })
        };
        let buffers = [tensor("Automata Tensor 1"), tensor("Automata Tensor 2")];

        let palette_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Automata Palette"),
            contents: bytemuck::cast_slice(&palette_contents(palette)),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let mesh_vertices = size as usize * FACES_PER_CELL * VERTICES_PER_FACE;
        let absent_mesh = vec![Vertex::ABSENT; mesh_vertices];
        let mesh_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Automata Mesh"),
            contents: bytemuck::cast_slice(&absent_mesh),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_SRC,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("automata transition pipeline"),
            layout: None,
            module: &cs_module,
            entry_point: "main",
        });
        let mesh_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("automata mesh pipeline"),
            layout: None,
            module: &mesh_module,
            entry_point: "main",
        });

        // Bind group i reads buffer i and writes the other one.
        let bind_group_layout = pipeline.get_bind_group_layout(0);
        let bind_groups: Vec<BindGroup> = (0..2)
            .map(|offset| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout: &bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffers[offset].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: buffers[(offset + 1) % 2].as_entire_binding(),
                        },
                    ],
                })
            })
            .collect();

        let mesh_bind_groups =
            Self::mesh_bind_groups(device, &mesh_pipeline, &buffers, &palette_buffer, &mesh_buffer);

        Self {
            dim,
            size,
            rule,
            pipeline,
            mesh_pipeline,
            buffers,
            bind_groups,
            palette_buffer,
            mesh_buffer,
            mesh_bind_groups,
            buffer_idx: 0,
            staging_buffer,
            cells: initial_state,
            generation: 0,
        }
    }

    fn mesh_bind_groups(
        device: &Device,
        mesh_pipeline: &ComputePipeline,
        buffers: &[Buffer; 2],
        palette_buffer: &Buffer,
        mesh_buffer: &Buffer,
    ) -> Vec<BindGroup> {
        let layout = mesh_pipeline.get_bind_group_layout(0);
        buffers
            .iter()
            .map(|cells| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: None,
                    layout: &layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: cells.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: palette_buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: mesh_buffer.as_entire_binding(),
                        },
                    ],
                })
            })
            .collect()
    }

    pub fn rule(&self) -> &RuleSpec {
        &self.rule
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Replaces the active rule, rebuilding every device resource on success.
    ///
    /// A rejected rule leaves the pipelines, buffers and host mirror untouched.
    pub fn set_rule(
        &mut self,
        rule: &str,
        palette: &Palette,
        device: &Device,
    ) -> Result<(), RuleError> {
        let rule = match RuleSpec::parse(rule) {
            Ok(rule) => rule,
            Err(err) => {
                warn!("rejected rule {:?}, keeping {}: {}", rule, self.rule, err);
                return Err(err);
            }
        };
        info!("gpu rule changed from {} to {}", self.rule, rule);
        *self = Self::build(self.dim, self.size, rule, palette, device);
        Ok(())
    }

    pub fn set_palette(&mut self, palette: &Palette, device: &Device) {
        self.palette_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Automata Palette"),
            contents: bytemuck::cast_slice(&palette_contents(palette)),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });
        self.mesh_bind_groups = Self::mesh_bind_groups(
            device,
            &self.mesh_pipeline,
            &self.buffers,
            &self.palette_buffer,
            &self.mesh_buffer,
        );
    }

    /// Host mirror of the current buffer.
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u32] {
        &mut self.cells
    }

    pub fn seed<R: Rng>(&mut self, seed: &Seed, rng: &mut R) {
        seed.apply(&mut self.cells, self.dim, rng);
    }

    pub fn step(&mut self, device: &Device, queue: &Queue) {
        let bind_group = &self.bind_groups[self.buffer_idx];
        let (x, y, z) = workgroups(self.dim);

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut cpass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: None });
            cpass.set_pipeline(&self.pipeline);
            cpass.set_bind_group(0, bind_group, &[]);
            cpass.insert_debug_marker("iterate automata");
            cpass.dispatch_workgroups(x, y, z);
        }
        queue.submit(Some(encoder.finish()));

        self.buffer_idx = (self.buffer_idx + 1) % 2;
        self.generation += 1;
        debug!("gpu generation {}", self.generation);
    }

    /// Rewrites the mesh buffer from the current cells.
    pub fn remesh(&self, device: &Device, queue: &Queue) {
        let (x, y, z) = workgroups(self.dim);
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut cpass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: None });
            cpass.set_pipeline(&self.mesh_pipeline);
            cpass.set_bind_group(0, &self.mesh_bind_groups[self.buffer_idx], &[]);
            cpass.insert_debug_marker("mesh automata");
            cpass.dispatch_workgroups(x, y, z);
        }
        queue.submit(Some(encoder.finish()));
    }

    /// Vertex buffer laid out like [`crate::mesh::Mesh::vertices`], ready to draw with
    /// [`Vertex::layout`].
    pub fn mesh_buffer(&self) -> &Buffer {
        &self.mesh_buffer
    }

    pub fn mesh_vertex_count(&self) -> u32 {
        self.size * (FACES_PER_CELL * VERTICES_PER_FACE) as u32
    }

    /// Copies the current device buffer into the host mirror.
    pub async fn pull(&mut self, device: &Device, queue: &Queue) -> Result<&[u32], Error> {
        let size = (self.cells.len() * mem::size_of::<u32>()) as wgpu::BufferAddress;
        self.cells = super::read_buffer(
            device,
            queue,
            &self.buffers[self.buffer_idx],
            &self.staging_buffer,
            size,
        )
        .await?;
        Ok(&self.cells)
    }

    /// Uploads the host mirror into the current device buffer.
    pub fn push(&self, queue: &Queue) {
        queue.write_buffer(
            &self.buffers[self.buffer_idx],
            0,
            bytemuck::cast_slice(&self.cells),
        );
    }

    /// Reads the device mesh back to the host.
    pub async fn read_mesh(&self, device: &Device, queue: &Queue) -> Result<Vec<Vertex>, Error> {
        let size = (self.mesh_vertex_count() as usize * mem::size_of::<Vertex>())
            as wgpu::BufferAddress;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Automata Mesh Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        super::read_buffer(device, queue, &self.mesh_buffer, &staging, size).await
    }
}
