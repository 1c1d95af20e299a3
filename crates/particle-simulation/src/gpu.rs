//! wgpu compute backend
//!
//! Device buffers mirror the host store: particles, grid indices, grid
//! offsets, a constants uniform and a per-particle delta scratch buffer.
//! Buffers start at [`BASELINE_CAPACITY`] elements and double whenever a step
//! needs more; the bind group is recreated after any reallocation.

use particle_physics::{Particle, SpatialGrid};
use wgpu::util::DeviceExt;

use crate::backend::ComputeBackend;
use crate::error::{Result, SimulationError};
use crate::params::StepConstants;

/// Initial element capacity of every growable device buffer
pub const BASELINE_CAPACITY: u64 = 100;

/// Threads per workgroup, must match `@workgroup_size` in the shader
const WORKGROUP_SIZE: u32 = 256;

/// Smallest doubling of `current` that holds `required` elements
pub fn grown_capacity(current: u64, required: u64) -> u64 {
    let mut capacity = current.max(1);
    while capacity < required {
        capacity *= 2;
    }
    capacity
}

/// Acquire a high-performance adapter and a device with default limits.
pub async fn request_device() -> Result<(wgpu::Device, wgpu::Queue)> {
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
        .await?;

    log::info!("✓ Using GPU: {}", adapter.get_info().name);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("Simulation Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;

    Ok((device, queue))
}

/// Device buffer that grows geometrically
struct GrowableBuffer {
    buffer: wgpu::Buffer,
    /// Capacity in elements
    capacity: u64,
    element_size: u64,
    usage: wgpu::BufferUsages,
    label: &'static str,
}

impl GrowableBuffer {
    fn new(
        device: &wgpu::Device,
        label: &'static str,
        element_size: u64,
        usage: wgpu::BufferUsages,
    ) -> Self {
        Self {
            buffer: Self::allocate(device, label, element_size * BASELINE_CAPACITY, usage),
            capacity: BASELINE_CAPACITY,
            element_size,
            usage,
            label,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        label: &str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Make room for `required` elements; returns whether the buffer was replaced
    fn reserve(&mut self, device: &wgpu::Device, required: u64) -> bool {
        if required <= self.capacity {
            return false;
        }
        let capacity = grown_capacity(self.capacity, required);
        log::info!(
            "Growing {} from {} to {} elements",
            self.label,
            self.capacity,
            capacity
        );
        self.buffer.destroy();
        self.buffer = Self::allocate(device, self.label, capacity * self.element_size, self.usage);
        self.capacity = capacity;
        true
    }

    #[inline]
    fn bytes(&self, elements: u64) -> u64 {
        elements * self.element_size
    }
}

/// GPU implementation of the step contract
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Buffers
    particle_buffer: GrowableBuffer,
    index_buffer: GrowableBuffer,
    offset_buffer: GrowableBuffer,
    delta_buffer: GrowableBuffer,
    staging_buffer: GrowableBuffer,
    constants_buffer: wgpu::Buffer,

    // Compute pipelines
    integrate_pipeline: wgpu::ComputePipeline,
    collision_deltas_pipeline: wgpu::ComputePipeline,
    apply_deltas_pipeline: wgpu::ComputePipeline,
    boundary_pipeline: wgpu::ComputePipeline,

    // Bind groups
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,

    particle_count: u32,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuBackend {
    /// Request a device and build the backend on it
    pub async fn request() -> Result<Self> {
        let (device, queue) = request_device().await?;
        Ok(Self::new(device, queue))
    }

    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        log::info!("Initializing GpuBackend...");

        let particle_size = std::mem::size_of::<Particle>() as u64;
        let particle_buffer = GrowableBuffer::new(
            &device,
            "Particle Buffer",
            particle_size,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        );
        let index_buffer = GrowableBuffer::new(
            &device,
            "Cell Index Buffer",
            4,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        let offset_buffer = GrowableBuffer::new(
            &device,
            "Cell Offset Buffer",
            4,
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        );
        // vec2<f32> per particle
        let delta_buffer = GrowableBuffer::new(
            &device,
            "Collision Delta Buffer",
            8,
            wgpu::BufferUsages::STORAGE,
        );
        let staging_buffer = GrowableBuffer::new(
            &device,
            "Particle Staging Buffer",
            particle_size,
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        );

        let constants_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Step Constants Buffer"),
            contents: bytemuck::cast_slice(&[<StepConstants as bytemuck::Zeroable>::zeroed()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::info!("Buffers created");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Verlet Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/verlet.wgsl").into()),
        });

        // 0: particles (rw), 1: cell indices, 2: cell offsets, 3: constants, 4: deltas (rw)
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Simulation Bind Group Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Simulation Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let create_pipeline = |label: &str, entry_point: &str| {
            log::debug!("Creating {} pipeline...", entry_point);
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let integrate_pipeline = create_pipeline("Integration Pipeline", "integrate");
        let collision_deltas_pipeline =
            create_pipeline("Collision Delta Pipeline", "collision_deltas");
        let apply_deltas_pipeline = create_pipeline("Apply Delta Pipeline", "apply_deltas");
        let boundary_pipeline = create_pipeline("Boundary Pipeline", "apply_boundary");

        log::info!("Pipelines created");

        let bind_group = Self::create_bind_group(
            &device,
            &bind_group_layout,
            &particle_buffer,
            &index_buffer,
            &offset_buffer,
            &constants_buffer,
            &delta_buffer,
        );

        Self {
            device,
            queue,
            particle_buffer,
            index_buffer,
            offset_buffer,
            delta_buffer,
            staging_buffer,
            constants_buffer,
            integrate_pipeline,
            collision_deltas_pipeline,
            apply_deltas_pipeline,
            boundary_pipeline,
            bind_group_layout,
            bind_group,
            particle_count: 0,
        }
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        particles: &GrowableBuffer,
        indices: &GrowableBuffer,
        offsets: &GrowableBuffer,
        constants: &wgpu::Buffer,
        deltas: &GrowableBuffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Simulation Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: particles.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: indices.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: offsets.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: constants.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: deltas.buffer.as_entire_binding(),
                },
            ],
        })
    }

    fn workgroup_count(&self) -> u32 {
        self.particle_count.div_ceil(WORKGROUP_SIZE)
    }

    /// Encode one compute pass per pipeline, in order, and submit them together
    fn dispatch(&self, label: &str, pipelines: &[&wgpu::ComputePipeline]) {
        if self.particle_count == 0 {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        let workgroup_count = self.workgroup_count();
        for pipeline in pipelines {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(pipeline);
            compute_pass.set_bind_group(0, &self.bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroup_count, 1, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl ComputeBackend for GpuBackend {
    fn label(&self) -> &'static str {
        "gpu"
    }

    fn upload_state(
        &mut self,
        particles: &[Particle],
        grid: &SpatialGrid,
        constants: &StepConstants,
    ) -> Result<()> {
        if grid.particle_count() != particles.len() {
            return Err(SimulationError::CountMismatch {
                host: particles.len(),
                device: grid.particle_count(),
            });
        }

        let n = particles.len() as u64;
        let offsets = grid.cell_offsets().len() as u64;

        let mut reallocated = false;
        reallocated |= self.particle_buffer.reserve(&self.device, n);
        reallocated |= self.delta_buffer.reserve(&self.device, n);
        reallocated |= self.index_buffer.reserve(&self.device, n);
        reallocated |= self.offset_buffer.reserve(&self.device, offsets);
        self.staging_buffer.reserve(&self.device, n);

        if reallocated {
            self.bind_group = Self::create_bind_group(
                &self.device,
                &self.bind_group_layout,
                &self.particle_buffer,
                &self.index_buffer,
                &self.offset_buffer,
                &self.constants_buffer,
                &self.delta_buffer,
            );
        }

        if !particles.is_empty() {
            self.queue.write_buffer(
                &self.particle_buffer.buffer,
                0,
                bytemuck::cast_slice(particles),
            );
            self.queue.write_buffer(
                &self.index_buffer.buffer,
                0,
                bytemuck::cast_slice(grid.cell_indices()),
            );
        }
        self.queue.write_buffer(
            &self.offset_buffer.buffer,
            0,
            bytemuck::cast_slice(grid.cell_offsets()),
        );
        self.queue
            .write_buffer(&self.constants_buffer, 0, bytemuck::cast_slice(&[*constants]));

        self.particle_count = particles.len() as u32;
        Ok(())
    }

    fn integrate(&mut self, _particles: &mut [Particle]) {
        self.dispatch("Integration Compute Pass", &[&self.integrate_pipeline]);
    }

    fn resolve_collisions(&mut self, _particles: &mut [Particle], _grid: &mut SpatialGrid) {
        // deltas must be complete before any position moves
        self.dispatch(
            "Collision Compute Pass",
            &[&self.collision_deltas_pipeline, &self.apply_deltas_pipeline],
        );
    }

    fn apply_boundary(&mut self, _particles: &mut [Particle]) {
        self.dispatch("Boundary Compute Pass", &[&self.boundary_pipeline]);
    }

    fn download_state(&mut self, particles: &mut [Particle]) -> Result<()> {
        let n = self.particle_count as usize;
        if particles.len() != n {
            return Err(SimulationError::CountMismatch {
                host: particles.len(),
                device: n,
            });
        }
        if n == 0 {
            return Ok(());
        }

        let size = self.particle_buffer.bytes(n as u64);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Particle Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(
            &self.particle_buffer.buffer,
            0,
            &self.staging_buffer.buffer,
            0,
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.staging_buffer.buffer.slice(..size);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // receiver outlives the poll below
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        rx.recv().map_err(|_| SimulationError::ReadbackLost)??;

        {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice_mut::<Particle, u8>(particles).copy_from_slice(&data);
        }
        self.staging_buffer.buffer.unmap();

        log::trace!("Downloaded {} particles", n);
        Ok(())
    }
}
