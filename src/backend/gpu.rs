// cellfluid - GPU Cellular Fluid Automaton
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! wgpu backend. Every call writes its uniform block, records one encoder and
//! submits it, so submission order is call order.

use super::{Backend, GeometryStats};
use crate::cell::Cell;
use crate::error::SimError;
use crate::extraction::{strategy_for, ExtractionStrategy, Primitive};
use crate::grid::GridLayout;
use crate::mc_table;
use crate::settings::ExtractionMode;
use crate::shaders;
use crate::uniforms::{ExtractUniforms, GridEditUniforms, UpdateUniforms, ViewUniforms};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const DENSE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub struct GpuCellBuffer {
    buffer: wgpu::Buffer,
}

pub struct GpuDenseVolume {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct GpuGeometry {
    primitives: wgpu::Buffer,
    counter: wgpu::Buffer,
    args: wgpu::Buffer,
    finalize_bind_group: wgpu::BindGroup,
    capacity: u32,
}

/// Where `draw_indirect` renders. Attached by the viewer for one frame.
pub struct FrameTarget {
    pub color: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    pub clear_color: wgpu::Color,
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,

    update_layout: wgpu::BindGroupLayout,
    edit_layout: wgpu::BindGroupLayout,
    densify_layout: wgpu::BindGroupLayout,
    extract_layout: wgpu::BindGroupLayout,
    finalize_layout: wgpu::BindGroupLayout,
    surface_layout: wgpu::BindGroupLayout,

    update_pipeline: wgpu::ComputePipeline,
    edit_pipeline: wgpu::ComputePipeline,
    densify_pipeline: wgpu::ComputePipeline,
    triangles_pipeline: wgpu::ComputePipeline,
    quads_pipeline: wgpu::ComputePipeline,
    finalize_pipeline: wgpu::ComputePipeline,
    surface_pipeline: wgpu::RenderPipeline,

    update_params: wgpu::Buffer,
    edit_params: wgpu::Buffer,
    densify_params: wgpu::Buffer,
    extract_params: wgpu::Buffer,
    view_params: wgpu::Buffer,
    tri_table: wgpu::Buffer,

    frame: Option<FrameTarget>,
}

fn storage_entry(binding: u32, read_only: bool, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_buffer(device: &wgpu::Device, label: &str, size: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    module: &wgpu::ShaderModule,
    entry_point: &str,
) -> wgpu::ComputePipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module,
        entry_point,
        compilation_options: Default::default(),
        cache: None,
    })
}

impl GpuBackend {
    /// Requests an adapter without a surface. Used by the headless driver and the GPU tests.
    pub fn new_headless() -> Result<Self, SimError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| SimError::DeviceUnavailable("no adapter found".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("cellfluid Device"),
                required_features: wgpu::Features::empty(),
                required_limits: Self::required_limits(&adapter),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|err| SimError::DeviceUnavailable(err.to_string()))?;

        log::info!("using adapter {} ({:?})", adapter.get_info().name, adapter.get_info().backend);
        Ok(Self::with_device(device, queue, wgpu::TextureFormat::Rgba8UnormSrgb))
    }

    /// Defaults, raised to what the adapter allows for large grids.
    pub fn required_limits(adapter: &wgpu::Adapter) -> wgpu::Limits {
        let supported = adapter.limits();
        wgpu::Limits {
            max_storage_buffer_binding_size: supported.max_storage_buffer_binding_size,
            max_buffer_size: supported.max_buffer_size,
            ..wgpu::Limits::default()
        }
    }

    pub fn with_device(device: wgpu::Device, queue: wgpu::Queue, color_format: wgpu::TextureFormat) -> Self {
        let compute = wgpu::ShaderStages::COMPUTE;

        let update_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Update Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose(shaders::UPDATE_WGSL).into()),
        });
        let edit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Grid Edit Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose(shaders::GRID_EDIT_WGSL).into()),
        });
        let densify_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Densify Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose(shaders::DENSIFY_WGSL).into()),
        });
        let extract_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Extract Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose(shaders::EXTRACT_WGSL).into()),
        });
        let surface_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Surface Shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::compose(shaders::SURFACE_WGSL).into()),
        });

        let update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Update Bind Group Layout"),
            entries: &[
                storage_entry(0, true, compute),
                storage_entry(1, false, compute),
                uniform_entry(2, compute),
            ],
        });
        let edit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Edit Bind Group Layout"),
            entries: &[storage_entry(0, false, compute), uniform_entry(1, compute)],
        });
        let densify_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Densify Bind Group Layout"),
            entries: &[
                storage_entry(0, true, compute),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: compute,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: DENSE_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
                uniform_entry(2, compute),
            ],
        });
        let extract_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Extract Bind Group Layout"),
            entries: &[
                storage_entry(0, true, compute),
                storage_entry(1, false, compute),
                storage_entry(2, false, compute),
                storage_entry(3, false, compute),
                storage_entry(4, true, compute),
                uniform_entry(5, compute),
            ],
        });
        // finalize_args only touches the primitive array length, counter and args.
        let finalize_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Finalize Args Bind Group Layout"),
            entries: &[
                storage_entry(1, false, compute),
                storage_entry(2, false, compute),
                storage_entry(3, false, compute),
            ],
        });
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Surface Bind Group Layout"),
            entries: &[
                storage_entry(0, true, wgpu::ShaderStages::VERTEX),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                uniform_entry(2, wgpu::ShaderStages::VERTEX_FRAGMENT),
            ],
        });

        let update_pipeline = compute_pipeline(&device, "Update Cells", &update_layout, &update_shader, "update_cells");
        let edit_pipeline = compute_pipeline(&device, "Edit Cells", &edit_layout, &edit_shader, "edit_cells");
        let densify_pipeline = compute_pipeline(&device, "Densify", &densify_layout, &densify_shader, "densify");
        let triangles_pipeline = compute_pipeline(
            &device,
            "Extract Triangles",
            &extract_layout,
            &extract_shader,
            strategy_for(ExtractionMode::Triangles).kernel_entry_point(),
        );
        let quads_pipeline = compute_pipeline(
            &device,
            "Extract Quads",
            &extract_layout,
            &extract_shader,
            strategy_for(ExtractionMode::Quads).kernel_entry_point(),
        );
        let finalize_pipeline = compute_pipeline(
            &device,
            "Finalize Args",
            &finalize_layout,
            &extract_shader,
            "finalize_args",
        );

        let surface_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Surface Pipeline Layout"),
            bind_group_layouts: &[&surface_layout],
            push_constant_ranges: &[],
        });
        let surface_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Surface Pipeline"),
            layout: Some(&surface_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &surface_shader,
                entry_point: "vs_main",
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &surface_shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        let update_params = uniform_buffer(&device, "Update Params", std::mem::size_of::<UpdateUniforms>());
        let edit_params = uniform_buffer(&device, "Grid Edit Params", std::mem::size_of::<GridEditUniforms>());
        let densify_params = uniform_buffer(&device, "Densify Params", std::mem::size_of::<ExtractUniforms>());
        let extract_params = uniform_buffer(&device, "Extract Params", std::mem::size_of::<ExtractUniforms>());
        let view_params = uniform_buffer(&device, "View Params", std::mem::size_of::<ViewUniforms>());

        let table = mc_table::flattened();
        let tri_table = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Marching Cubes Table"),
            size: (table.len() * std::mem::size_of::<i32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&tri_table, 0, bytemuck::cast_slice(&table));

        Self {
            device,
            queue,
            update_layout,
            edit_layout,
            densify_layout,
            extract_layout,
            finalize_layout,
            surface_layout,
            update_pipeline,
            edit_pipeline,
            densify_pipeline,
            triangles_pipeline,
            quads_pipeline,
            finalize_pipeline,
            surface_pipeline,
            update_params,
            edit_params,
            densify_params,
            extract_params,
            view_params,
            tri_table,
            frame: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_depth_texture(&self, width: u32, height: u32) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    pub fn begin_frame(&mut self, target: FrameTarget) {
        self.frame = Some(target);
    }

    pub fn end_frame(&mut self) {
        self.frame = None;
    }

    /// Creates a buffer inside an error scope so allocation failures come back
    /// as `SimError::Allocation` instead of a device-lost panic.
    fn create_buffer_checked(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> Result<wgpu::Buffer, SimError> {
        let limits = self.device.limits();
        if size > limits.max_buffer_size
            || (usage.contains(wgpu::BufferUsages::STORAGE) && size > limits.max_storage_buffer_binding_size as u64)
        {
            return Err(SimError::Allocation {
                label: label.to_string(),
                reason: format!(
                    "{} bytes exceeds device limits (buffer {}, storage binding {})",
                    size, limits.max_buffer_size, limits.max_storage_buffer_binding_size
                ),
            });
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        });
        let oom = pollster::block_on(self.device.pop_error_scope());
        let invalid = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = oom.or(invalid) {
            buffer.destroy();
            return Err(SimError::Allocation {
                label: label.to_string(),
                reason: err.to_string(),
            });
        }
        log::debug!("allocated {} ({} bytes)", label, size);
        Ok(buffer)
    }

    fn submit_compute(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        workgroups: [u32; 3],
        prepare: impl FnOnce(&mut wgpu::CommandEncoder),
    ) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        prepare(&mut encoder);
        if workgroups.iter().all(|&w| w > 0) {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups[0], workgroups[1], workgroups[2]);
        } else {
            log::trace!("{}: empty dispatch skipped", label);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_buffer<T: bytemuck::Pod>(&self, source: &wgpu::Buffer, size: u64) -> Result<Vec<T>, SimError> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Read") });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(receiver.receive()) {
            Some(Ok(())) => {}
            Some(Err(err)) => return Err(SimError::Readback(err.to_string())),
            None => return Err(SimError::Readback("map callback was dropped".to_string())),
        }

        let result = {
            let data = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&data).to_vec()
        };
        staging.unmap();
        staging.destroy();
        Ok(result)
    }
}

impl Backend for GpuBackend {
    type CellBuffer = GpuCellBuffer;
    type DenseVolume = GpuDenseVolume;
    type Geometry = GpuGeometry;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn create_cell_buffer(&mut self, layout: &GridLayout, label: &str) -> Result<GpuCellBuffer, SimError> {
        let buffer = self.create_buffer_checked(
            label,
            layout.buffer_bytes(),
            wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        )?;
        Ok(GpuCellBuffer { buffer })
    }

    fn destroy_cell_buffer(&mut self, buffer: GpuCellBuffer) {
        buffer.buffer.destroy();
    }

    fn edit_cells(&mut self, buffer: &mut GpuCellBuffer, _layout: &GridLayout, uniforms: &GridEditUniforms) {
        self.queue.write_buffer(&self.edit_params, 0, bytemuck::bytes_of(uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Edit Bind Group"),
            layout: &self.edit_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: buffer.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: self.edit_params.as_entire_binding() },
            ],
        });
        let region = uniforms.region();
        let extent = [0, 1, 2].map(|axis| region.max[axis] - region.min[axis] + 1);
        self.submit_compute("Edit Cells", &self.edit_pipeline, &bind_group, GridLayout::workgroups(extent), |_| {});
    }

    fn read_cells(&mut self, buffer: &GpuCellBuffer, layout: &GridLayout) -> Result<Vec<Cell>, SimError> {
        let size = (layout.cell_count() * std::mem::size_of::<Cell>()) as u64;
        self.read_buffer(&buffer.buffer, size)
    }

    fn dispatch_update(&mut self, src: &GpuCellBuffer, dst: &mut GpuCellBuffer, layout: &GridLayout, uniforms: &UpdateUniforms) {
        self.queue.write_buffer(&self.update_params, 0, bytemuck::bytes_of(uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Update Bind Group"),
            layout: &self.update_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: dst.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: self.update_params.as_entire_binding() },
            ],
        });
        self.submit_compute(
            "Update Cells",
            &self.update_pipeline,
            &bind_group,
            GridLayout::workgroups(layout.resolution),
            |_| {},
        );
    }

    fn create_dense_volume(&mut self, layout: &GridLayout) -> Result<GpuDenseVolume, SimError> {
        let [width, height, depth] = layout.resolution;
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Dense Volume"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: DENSE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let oom = pollster::block_on(self.device.pop_error_scope());
        let invalid = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = oom.or(invalid) {
            texture.destroy();
            return Err(SimError::Allocation {
                label: "Dense Volume".to_string(),
                reason: err.to_string(),
            });
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(GpuDenseVolume { texture, view })
    }

    fn create_geometry(&mut self, capacity: u32, vertices_per_primitive: u32) -> Result<GpuGeometry, SimError> {
        let storage = wgpu::BufferUsages::STORAGE;
        let primitives = self.create_buffer_checked(
            "Primitives",
            capacity as u64 * std::mem::size_of::<Primitive>() as u64,
            storage,
        )?;
        let counter = match self.create_buffer_checked(
            "Primitive Counter",
            4,
            storage | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                primitives.destroy();
                return Err(err);
            }
        };
        let args = match self.create_buffer_checked(
            "Draw Indirect Args",
            16,
            storage | wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                primitives.destroy();
                counter.destroy();
                return Err(err);
            }
        };
        self.queue.write_buffer(&args, 0, bytemuck::cast_slice(&[vertices_per_primitive, 0u32, 0, 0]));

        let finalize_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Finalize Args Bind Group"),
            layout: &self.finalize_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 1, resource: primitives.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: args.as_entire_binding() },
            ],
        });

        Ok(GpuGeometry {
            primitives,
            counter,
            args,
            finalize_bind_group,
            capacity,
        })
    }

    fn destroy_dense_volume(&mut self, volume: GpuDenseVolume) {
        volume.texture.destroy();
    }

    fn destroy_geometry(&mut self, geometry: GpuGeometry) {
        geometry.primitives.destroy();
        geometry.counter.destroy();
        geometry.args.destroy();
    }

    fn dispatch_densify(&mut self, src: &GpuCellBuffer, volume: &mut GpuDenseVolume, layout: &GridLayout) {
        let uniforms = ExtractUniforms::new(layout, 0, 0, 0, 0.0);
        self.queue.write_buffer(&self.densify_params, 0, bytemuck::bytes_of(&uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Densify Bind Group"),
            layout: &self.densify_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&volume.view) },
                wgpu::BindGroupEntry { binding: 2, resource: self.densify_params.as_entire_binding() },
            ],
        });
        self.submit_compute(
            "Densify",
            &self.densify_pipeline,
            &bind_group,
            GridLayout::workgroups(layout.resolution),
            |_| {},
        );
    }

    fn dispatch_extract(
        &mut self,
        src: &GpuCellBuffer,
        geometry: &mut GpuGeometry,
        layout: &GridLayout,
        strategy: &dyn ExtractionStrategy,
        uniforms: &ExtractUniforms,
    ) {
        self.queue.write_buffer(&self.extract_params, 0, bytemuck::bytes_of(uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Extract Bind Group"),
            layout: &self.extract_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: src.buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: geometry.primitives.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: geometry.counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: geometry.args.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: self.tri_table.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: self.extract_params.as_entire_binding() },
            ],
        });
        let pipeline = match strategy.mode() {
            ExtractionMode::Triangles => &self.triangles_pipeline,
            ExtractionMode::Quads => &self.quads_pipeline,
        };
        let counter = &geometry.counter;
        self.submit_compute(
            strategy.kernel_entry_point(),
            pipeline,
            &bind_group,
            GridLayout::workgroups(strategy.dispatch_extent(layout)),
            |encoder| encoder.clear_buffer(counter, 0, None),
        );
    }

    fn sync_draw_args(&mut self, geometry: &mut GpuGeometry) {
        self.submit_compute(
            "Finalize Args",
            &self.finalize_pipeline,
            &geometry.finalize_bind_group,
            [1, 1, 1],
            |_| {},
        );
    }

    fn draw_indirect(&mut self, geometry: &GpuGeometry, volume: &GpuDenseVolume, view: &ViewUniforms) {
        let Some(frame) = self.frame.as_ref() else {
            log::trace!("no frame target attached; draw skipped");
            return;
        };

        self.queue.write_buffer(&self.view_params, 0, bytemuck::bytes_of(view));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Surface Bind Group"),
            layout: &self.surface_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: geometry.primitives.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&volume.view) },
                wgpu::BindGroupEntry { binding: 2, resource: self.view_params.as_entire_binding() },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Surface Render") });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Surface Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &frame.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.surface_pipeline);
            render_pass.set_bind_group(0, &bind_group, &[]);
            render_pass.draw_indirect(&geometry.args, 0);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn read_geometry_stats(&mut self, geometry: &GpuGeometry) -> Result<GeometryStats, SimError> {
        let counter: Vec<u32> = self.read_buffer(&geometry.counter, 4)?;
        let args: Vec<u32> = self.read_buffer(&geometry.args, 16)?;
        Ok(GeometryStats {
            live_count: counter.first().copied().unwrap_or(0),
            capacity: geometry.capacity,
            args: [args[0], args[1], args[2], args[3]],
        })
    }

    fn wait_idle(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
