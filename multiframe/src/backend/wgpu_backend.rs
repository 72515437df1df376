use std::borrow::Cow;
use std::mem;

use fxhash::FxHashMap;
use glam::UVec2;
use log::{debug, info, trace};
use wgpu::util::DeviceExt;

use super::*;
use crate::Error;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
    // position (xyz) + uv (x)
    0 => Float32x4,
    // normal (xyz) + uv (y)
    1 => Float32x4,
];

/// [`Backend`] running on an existing wgpu device.
///
/// Pipelines are created lazily, the first time a program is used with given
/// bindings and targets, and cached until the program gets destroyed; bind
/// groups are created per pass.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    sampler: wgpu::Sampler,
    textures: Vec<TextureEntry>,
    buffers: Vec<BufferEntry>,
    meshes: Vec<Option<MeshEntry>>,
    programs: Vec<Option<ProgramEntry>>,
    pipelines: FxHashMap<PipelineKey, Pipeline>,
    encoder: Option<wgpu::CommandEncoder>,
}

#[derive(Debug)]
struct TextureEntry {
    desc: TextureDescriptor,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

#[derive(Debug)]
struct BufferEntry {
    desc: BufferDescriptor,
    buffer: wgpu::Buffer,
}

#[derive(Debug)]
struct MeshEntry {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug)]
struct ProgramEntry {
    label: String,
    module: wgpu::ShaderModule,
    stages: ProgramStages,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    layout: Vec<wgpu::BindGroupLayoutEntry>,
    has_params: bool,
    target: Option<RenderTargetKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct RenderTargetKey {
    state: RenderState,
    color_formats: Vec<wgpu::TextureFormat>,
    depth_format: Option<wgpu::TextureFormat>,
    uses_mesh: bool,
}

#[derive(Debug)]
struct Pipeline {
    kind: PipelineKind,
    layout: wgpu::BindGroupLayout,
    params_layout: Option<wgpu::BindGroupLayout>,
}

#[derive(Debug)]
enum PipelineKind {
    Render(wgpu::RenderPipeline),
    Compute(wgpu::ComputePipeline),
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        info!("Initializing wgpu backend");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("multiframe_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            device,
            queue,
            sampler,
            textures: Default::default(),
            buffers: Default::default(),
            meshes: Default::default(),
            programs: Default::default(),
            pipelines: Default::default(),
            encoder: None,
        }
    }

    /// Returns limits the device has to be requested with.
    ///
    /// The G-buffer pass writes six color targets at once, which doesn't fit
    /// into WebGPU's default per-sample budget of 32 bytes.
    pub fn required_limits(adapter: &wgpu::Limits) -> wgpu::Limits {
        wgpu::Limits {
            max_color_attachment_bytes_per_sample: 64,
            ..wgpu::Limits::default().using_resolution(adapter.clone())
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the view of given texture, e.g. for blitting the painter's
    /// output into a surface.
    pub fn texture_view(&self, texture: TextureHandle) -> &wgpu::TextureView {
        &self.texture(texture).view
    }

    fn texture(&self, texture: TextureHandle) -> &TextureEntry {
        self.textures
            .get(texture.index())
            .unwrap_or_else(|| panic!("Texture does not exist: {texture:?}"))
    }

    fn buffer(&self, buffer: BufferHandle) -> &BufferEntry {
        self.buffers
            .get(buffer.index())
            .unwrap_or_else(|| panic!("Buffer does not exist: {buffer:?}"))
    }

    fn program(&self, program: ProgramHandle) -> &ProgramEntry {
        self.programs
            .get(program.index())
            .and_then(Option::as_ref)
            .unwrap_or_else(|| panic!("Program does not exist: {program:?}"))
    }

    /// Returns the encoder of the current frame; callers put it back once
    /// they're done recording.
    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("multiframe_encoder"),
                })
        })
    }

    fn allocate_texture(
        device: &wgpu::Device,
        desc: &TextureDescriptor,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        debug!(
            "Allocating texture `{}`; size={}, format={:?}",
            desc.label, desc.size, desc.format
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.size.x,
                height: desc.size.y,
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        });

        let view = texture.create_view(&Default::default());

        (texture, view)
    }

    fn allocate_buffer(
        device: &wgpu::Device,
        desc: &BufferDescriptor,
    ) -> wgpu::Buffer {
        debug!(
            "Allocating buffer `{}`; size={}, usage={:?}",
            desc.label, desc.size, desc.usage
        );

        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&desc.label),
            size: desc.size,
            usage: desc.usage,
            mapped_at_creation: false,
        })
    }

    fn layout_entries(
        &self,
        bindings: &[Binding],
        compute: bool,
    ) -> Vec<wgpu::BindGroupLayoutEntry> {
        let (readable, writable) = if compute {
            (wgpu::ShaderStages::COMPUTE, wgpu::ShaderStages::COMPUTE)
        } else {
            (
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                wgpu::ShaderStages::FRAGMENT,
            )
        };

        let mut entries = Vec::new();
        let mut slot = 0;

        for binding in bindings {
            match *binding {
                Binding::Texture { texture, .. } => {
                    let format = self.texture(texture).desc.format;

                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot,
                        visibility: readable,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: unfilterable_sample_type(format),
                        },
                        count: None,
                    });
                }

                Binding::SampledTexture { .. } => {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot,
                        visibility: readable,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float {
                                filterable: true,
                            },
                        },
                        count: None,
                    });

                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot + 1,
                        visibility: readable,
                        ty: wgpu::BindingType::Sampler(
                            wgpu::SamplerBindingType::Filtering,
                        ),
                        count: None,
                    });
                }

                Binding::StorageTexture { texture, .. } => {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot,
                        visibility: writable,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: self.texture(texture).desc.format,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    });
                }

                Binding::UniformBuffer { .. } => {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot,
                        visibility: readable,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    });
                }

                Binding::StorageBuffer { read_only, .. } => {
                    entries.push(wgpu::BindGroupLayoutEntry {
                        binding: slot,
                        visibility: if read_only { readable } else { writable },
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    });
                }
            }

            slot += binding.slots();
        }

        entries
    }

    fn prepare_pipeline(&mut self, key: &PipelineKey) {
        if self.pipelines.contains_key(key) {
            return;
        }

        let program = self.program(key.program);

        debug!("Initializing pipeline: {}", program.label);

        let visibility = if key.target.is_some() {
            wgpu::ShaderStages::VERTEX_FRAGMENT
        } else {
            wgpu::ShaderStages::COMPUTE
        };

        let layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}_bg0_layout", program.label)),
                    entries: &key.layout,
                });

        let params_layout = key.has_params.then(|| {
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}_bg1_layout", program.label)),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                })
        });

        let bind_group_layouts: Vec<_> =
            [Some(&layout), params_layout.as_ref()]
                .into_iter()
                .flatten()
                .collect();

        let pipeline_layout =
            self.device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&format!("{}_pipeline_layout", program.label)),
                    bind_group_layouts: &bind_group_layouts,
                    push_constant_ranges: &[],
                });

        let pipeline_label = format!("{}_pipeline", program.label);

        let kind = match (program.stages, &key.target) {
            (ProgramStages::Compute { entry_point }, None) => {
                PipelineKind::Compute(self.device.create_compute_pipeline(
                    &wgpu::ComputePipelineDescriptor {
                        label: Some(&pipeline_label),
                        layout: Some(&pipeline_layout),
                        module: &program.module,
                        entry_point: Some(entry_point),
                        compilation_options: Default::default(),
                        cache: None,
                    },
                ))
            }

            (ProgramStages::Render { vertex, fragment }, Some(target)) => {
                let mesh_layout = [wgpu::VertexBufferLayout {
                    array_stride: mem::size_of::<gpu::Vertex>() as _,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &VERTEX_ATTRIBUTES,
                }];

                let vertex_buffers: &[wgpu::VertexBufferLayout] =
                    if target.uses_mesh { &mesh_layout } else { &[] };

                let color_targets: Vec<_> = target
                    .color_formats
                    .iter()
                    .map(|&format| {
                        Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })
                    })
                    .collect();

                let depth_stencil =
                    target.depth_format.map(|format| wgpu::DepthStencilState {
                        format,
                        depth_write_enabled: target.state.depth_write,
                        depth_compare: if target.state.depth_test {
                            target.state.depth_compare
                        } else {
                            wgpu::CompareFunction::Always
                        },
                        stencil: Default::default(),
                        bias: Default::default(),
                    });

                PipelineKind::Render(self.device.create_render_pipeline(
                    &wgpu::RenderPipelineDescriptor {
                        label: Some(&pipeline_label),
                        layout: Some(&pipeline_layout),
                        vertex: wgpu::VertexState {
                            module: &program.module,
                            entry_point: Some(vertex),
                            compilation_options: Default::default(),
                            buffers: vertex_buffers,
                        },
                        primitive: wgpu::PrimitiveState {
                            topology: wgpu::PrimitiveTopology::TriangleList,
                            strip_index_format: None,
                            front_face: wgpu::FrontFace::Ccw,
                            cull_mode: target.state.cull,
                            polygon_mode: wgpu::PolygonMode::Fill,
                            unclipped_depth: false,
                            conservative: false,
                        },
                        depth_stencil,
                        multisample: Default::default(),
                        fragment: fragment.map(|entry_point| {
                            wgpu::FragmentState {
                                module: &program.module,
                                entry_point: Some(entry_point),
                                compilation_options: Default::default(),
                                targets: &color_targets,
                            }
                        }),
                        multiview: None,
                        cache: None,
                    },
                ))
            }

            (stages, _) => {
                panic!(
                    "Program `{}` ({stages:?}) cannot be used in this pass",
                    program.label
                );
            }
        };

        self.pipelines.insert(
            key.clone(),
            Pipeline {
                kind,
                layout,
                params_layout,
            },
        );
    }

    fn create_bind_groups(
        &self,
        label: &str,
        pipeline: &Pipeline,
        bindings: &[Binding],
        params: &[u8],
    ) -> (wgpu::BindGroup, Option<wgpu::BindGroup>) {
        let views: Vec<_> = bindings
            .iter()
            .map(|binding| match *binding {
                Binding::Texture {
                    texture,
                    mip_level: Some(mip_level),
                }
                | Binding::StorageTexture { texture, mip_level } => {
                    Some(self.texture(texture).texture.create_view(
                        &wgpu::TextureViewDescriptor {
                            base_mip_level: mip_level,
                            mip_level_count: Some(1),
                            ..Default::default()
                        },
                    ))
                }

                _ => None,
            })
            .collect();

        let mut entries = Vec::new();
        let mut slot = 0;

        for (binding, view) in bindings.iter().zip(&views) {
            match *binding {
                Binding::Texture { texture, .. }
                | Binding::StorageTexture { texture, .. } => {
                    let view =
                        view.as_ref().unwrap_or(&self.texture(texture).view);

                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::TextureView(view),
                    });
                }

                Binding::SampledTexture { texture } => {
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: wgpu::BindingResource::TextureView(
                            &self.texture(texture).view,
                        ),
                    });

                    entries.push(wgpu::BindGroupEntry {
                        binding: slot + 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    });
                }

                Binding::UniformBuffer { buffer }
                | Binding::StorageBuffer { buffer, .. } => {
                    entries.push(wgpu::BindGroupEntry {
                        binding: slot,
                        resource: self
                            .buffer(buffer)
                            .buffer
                            .as_entire_binding(),
                    });
                }
            }

            slot += binding.slots();
        }

        let bind_group =
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label}_bg0")),
                layout: &pipeline.layout,
                entries: &entries,
            });

        let params = pipeline.params_layout.as_ref().map(|layout| {
            let buffer = self.device.create_buffer_init(
                &wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label}_params")),
                    contents: params,
                    usage: wgpu::BufferUsages::UNIFORM,
                },
            );

            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label}_bg1")),
                layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        });

        (bind_group, params)
    }
}

impl Backend for WgpuBackend {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        let (texture, view) = Self::allocate_texture(&self.device, desc);
        let handle = TextureHandle::new(self.textures.len() as u32);

        self.textures.push(TextureEntry {
            desc: desc.clone(),
            texture,
            view,
        });

        handle
    }

    fn resize_texture(&mut self, texture: TextureHandle, size: UVec2) {
        let mut desc = self.texture(texture).desc.clone();

        desc.size = size;

        let (raw, view) = Self::allocate_texture(&self.device, &desc);

        self.textures[texture.index()] = TextureEntry {
            desc,
            texture: raw,
            view,
        };
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) {
        let entry = self.texture(texture);
        let size = entry.desc.size;
        let texel_size = entry.desc.format.block_copy_size(None).unwrap_or(4);

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.x * texel_size),
                rows_per_image: Some(size.y),
            },
            wgpu::Extent3d {
                width: size.x,
                height: size.y,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BufferHandle {
        let buffer = Self::allocate_buffer(&self.device, desc);
        let handle = BufferHandle::new(self.buffers.len() as u32);

        self.buffers.push(BufferEntry {
            desc: desc.clone(),
            buffer,
        });

        handle
    }

    fn resize_buffer(&mut self, buffer: BufferHandle, size: u64) {
        let mut desc = self.buffer(buffer).desc.clone();

        desc.size = size;

        let raw = Self::allocate_buffer(&self.device, &desc);

        self.buffers[buffer.index()] = BufferEntry { desc, buffer: raw };
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        self.queue
            .write_buffer(&self.buffer(buffer).buffer, offset, data);
    }

    fn clear_buffer(&mut self, buffer: BufferHandle) {
        let mut encoder = self.take_encoder();

        encoder.clear_buffer(&self.buffer(buffer).buffer, 0, None);

        self.encoder = Some(encoder);
    }

    fn create_mesh(
        &mut self,
        label: &str,
        vertices: &[gpu::Vertex],
        indices: &[u32],
    ) -> MeshHandle {
        debug!(
            "Allocating mesh `{label}`; vertices={}, indices={}",
            vertices.len(),
            indices.len()
        );

        let vertex_buffer =
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label}_vertices")),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });

        let index_buffer =
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{label}_indices")),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });

        let handle = MeshHandle::new(self.meshes.len() as u32);

        self.meshes.push(Some(MeshEntry {
            vertices: vertex_buffer,
            indices: index_buffer,
            index_count: indices.len() as u32,
        }));

        handle
    }

    fn destroy_mesh(&mut self, mesh: MeshHandle) {
        let Some(entry) =
            self.meshes.get_mut(mesh.index()).and_then(Option::take)
        else {
            panic!("Mesh does not exist: {mesh:?}");
        };

        debug!("Releasing mesh: {mesh:?}");

        entry.vertices.destroy();
        entry.indices.destroy();
    }

    fn create_program(
        &mut self,
        desc: &ProgramDescriptor,
    ) -> Result<ProgramHandle> {
        debug!("Compiling program: {}", desc.label);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module =
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&desc.label),
                    source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(
                        &desc.source,
                    )),
                });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(Error::ShaderCompile {
                label: desc.label.clone(),
                message: err.to_string(),
            });
        }

        let handle = ProgramHandle::new(self.programs.len() as u32);

        self.programs.push(Some(ProgramEntry {
            label: desc.label.clone(),
            module,
            stages: desc.stages,
        }));

        Ok(handle)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        debug!("Destroying program: {}", self.program(program).label);

        self.programs[program.index()] = None;
        self.pipelines.retain(|key, _| key.program != program);
    }

    fn render(&mut self, pass: &RenderPass) {
        trace!("Rendering `{}`; draws={}", pass.label, pass.draws.len());

        let color_formats: Vec<_> = pass
            .color_targets
            .iter()
            .map(|target| self.texture(target.texture).desc.format)
            .collect();

        let depth_format = pass
            .depth_target
            .map(|target| self.texture(target.texture).desc.format);

        let mut prepared = Vec::with_capacity(pass.draws.len());

        for draw in &pass.draws {
            let key = PipelineKey {
                program: draw.program,
                layout: self.layout_entries(&draw.bindings, false),
                has_params: !draw.params.is_empty(),
                target: Some(RenderTargetKey {
                    state: draw.state,
                    color_formats: color_formats.clone(),
                    depth_format,
                    uses_mesh: matches!(draw.geometry, Geometry::Mesh(_)),
                }),
            };

            self.prepare_pipeline(&key);

            let Some(pipeline) = self.pipelines.get(&key) else {
                continue;
            };

            let bind_groups = self.create_bind_groups(
                &pass.label,
                pipeline,
                &draw.bindings,
                &draw.params,
            );

            prepared.push((draw, key, bind_groups));
        }

        let mut encoder = self.take_encoder();

        {
            let color_attachments: Vec<_> = pass
                .color_targets
                .iter()
                .map(|target| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &self.texture(target.texture).view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: match target.clear {
                                Some(color) => wgpu::LoadOp::Clear(wgpu::Color {
                                    r: color.x as f64,
                                    g: color.y as f64,
                                    b: color.z as f64,
                                    a: color.w as f64,
                                }),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();

            let depth_stencil_attachment = pass.depth_target.map(|target| {
                wgpu::RenderPassDepthStencilAttachment {
                    view: &self.texture(target.texture).view,
                    depth_ops: Some(wgpu::Operations {
                        load: match target.clear {
                            Some(depth) => wgpu::LoadOp::Clear(depth),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }
            });

            let mut rpass =
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&pass.label),
                    color_attachments: &color_attachments,
                    depth_stencil_attachment,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

            if let Some(viewport) = pass.viewport {
                rpass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.z as f32,
                    viewport.w as f32,
                    0.0,
                    1.0,
                );
            }

            for (draw, key, (bind_group, params)) in &prepared {
                let Some(Pipeline {
                    kind: PipelineKind::Render(pipeline),
                    ..
                }) = self.pipelines.get(key)
                else {
                    continue;
                };

                rpass.set_pipeline(pipeline);
                rpass.set_bind_group(0, bind_group, &[]);

                if let Some(params) = params {
                    rpass.set_bind_group(1, params, &[]);
                }

                match draw.geometry {
                    Geometry::Mesh(mesh) => {
                        let Some(mesh) = self
                            .meshes
                            .get(mesh.index())
                            .and_then(Option::as_ref)
                        else {
                            panic!("Mesh does not exist: {mesh:?}");
                        };

                        rpass.set_vertex_buffer(0, mesh.vertices.slice(..));

                        rpass.set_index_buffer(
                            mesh.indices.slice(..),
                            wgpu::IndexFormat::Uint32,
                        );

                        rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }

                    Geometry::Procedural { vertices } => {
                        rpass.draw(0..vertices, 0..1);
                    }
                }
            }
        }

        self.encoder = Some(encoder);
    }

    fn compute(&mut self, pass: &ComputePass) {
        trace!("Dispatching `{}`; groups={}", pass.label, pass.workgroups);

        let key = PipelineKey {
            program: pass.program,
            layout: self.layout_entries(&pass.bindings, true),
            has_params: !pass.params.is_empty(),
            target: None,
        };

        self.prepare_pipeline(&key);

        let Some(pipeline) = self.pipelines.get(&key) else {
            return;
        };

        let (bind_group, params) = self.create_bind_groups(
            &pass.label,
            pipeline,
            &pass.bindings,
            &pass.params,
        );

        let mut encoder = self.take_encoder();

        if let Some(Pipeline {
            kind: PipelineKind::Compute(pipeline),
            ..
        }) = self.pipelines.get(&key)
        {
            let mut cpass =
                encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some(&pass.label),
                    timestamp_writes: None,
                });

            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);

            if let Some(params) = &params {
                cpass.set_bind_group(1, params, &[]);
            }

            cpass.dispatch_workgroups(
                pass.workgroups.x,
                pass.workgroups.y,
                pass.workgroups.z,
            );
        }

        self.encoder = Some(encoder);
    }

    fn finish_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit([encoder.finish()]);
        }
    }
}

fn unfilterable_sample_type(
    format: wgpu::TextureFormat,
) -> wgpu::TextureSampleType {
    match format {
        wgpu::TextureFormat::Depth32Float => wgpu::TextureSampleType::Depth,

        wgpu::TextureFormat::R32Uint
        | wgpu::TextureFormat::Rg32Uint
        | wgpu::TextureFormat::Rgba32Uint => wgpu::TextureSampleType::Uint,

        _ => wgpu::TextureSampleType::Float { filterable: false },
    }
}
