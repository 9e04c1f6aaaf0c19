use std::collections::HashMap;
use std::sync::Arc;
use vista_common::Viewport;
use vista_render::{
    BufferKind, Filter, FrameState, IndexType, ProgramDesc, RenderDevice, SamplerDesc,
    ShaderError, ShaderStage, TextureUnit, TextureUpload, Topology, UniformLocation, UniformValue,
    Vertex, VertexLayoutDesc, Wrap,
};
use wgpu::util::DeviceExt;

use crate::layout::{
    align_to, expand_to_rgba8, frame_block_size, mip_level_count, vertex_attributes, write_slot,
    Block, UniformReflection, DRAW_BLOCK_SIZE,
};
use crate::mipmap::MipmapBlitter;
use crate::shaders;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Draws the per-draw uniform buffer holds before it first has to grow.
pub const DEFAULT_DRAW_CAPACITY: u32 = 4096;

/// Immutable GPU buffer.
pub struct WgpuBuffer {
    buffer: Arc<wgpu::Buffer>,
    kind: BufferKind,
}

impl WgpuBuffer {
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    pub fn size(&self) -> u64 {
        self.buffer.size()
    }
}

/// Vertex and index buffer pair drawn together.
pub struct WgpuVertexLayout {
    vertices: Arc<wgpu::Buffer>,
    indices: Arc<wgpu::Buffer>,
}

struct TextureInner {
    id: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Sampled 2D texture, stored as RGBA8 with its own sampler.
pub struct WgpuTexture {
    inner: Arc<TextureInner>,
}

impl WgpuTexture {
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub fn size(&self) -> (u32, u32) {
        let size = self.inner.texture.size();
        (size.width, size.height)
    }
}

struct ProgramInner {
    id: u32,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    attributes: Vec<wgpu::VertexAttribute>,
    reflection: UniformReflection,
    frame_size: u32,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
}

/// Linked scene program: both stage modules plus its frame uniform buffer.
pub struct WgpuProgram {
    inner: Arc<ProgramInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: u32,
    depth_test: bool,
    cull_back_faces: bool,
}

struct DrawRecord {
    pipeline: PipelineKey,
    program: Arc<ProgramInner>,
    vertices: Arc<wgpu::Buffer>,
    indices: Arc<wgpu::Buffer>,
    index_format: wgpu::IndexFormat,
    index_count: u32,
    offset: u32,
    textures: (u32, u32),
}

struct Layouts {
    frame: wgpu::BindGroupLayout,
    draw: wgpu::BindGroupLayout,
    textures: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

/// Per-draw uniform buffer addressed by dynamic offset, one stride per draw.
struct DrawBlock {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    capacity: u32,
}

impl DrawBlock {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, stride: u32, capacity: u32) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw_uniform_buffer"),
            size: stride as u64 * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(DRAW_BLOCK_SIZE as u64),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            capacity,
        }
    }
}

/// [`RenderDevice`] on top of wgpu.
///
/// Uniform uploads are staged in CPU memory: frame-block values go to the
/// current program's frame buffer, draw-block values are snapshotted per draw
/// into a dynamically offset buffer that grows to fit the frame. Draws are recorded and encoded into one
/// render pass in [`RenderDevice::end_frame`], which targets the view passed
/// to [`WgpuDevice::set_target`]. One program is expected per frame.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    viewport: Viewport,
    depth_view: wgpu::TextureView,
    layouts: Layouts,
    mipmaps: MipmapBlitter,
    fallback: Arc<TextureInner>,
    draw_block: DrawBlock,
    draw_stride: u32,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    texture_groups: HashMap<(u32, u32), wgpu::BindGroup>,
    next_id: u32,

    frame: Option<FrameState>,
    target: Option<wgpu::TextureView>,
    program: Option<Arc<ProgramInner>>,
    bound: [Option<Arc<TextureInner>>; 2],
    frame_staging: Vec<u8>,
    draw_staging: Vec<u8>,
    draw_data: Vec<u8>,
    draws: Vec<DrawRecord>,
    dropped_draws: u32,
}

impl WgpuDevice {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        viewport: Viewport,
    ) -> Self {
        Self::with_draw_capacity(device, queue, color_format, viewport, DEFAULT_DRAW_CAPACITY)
    }

    /// Like [`WgpuDevice::new`] with an initial per-draw buffer size. The
    /// buffer still grows when a frame records more draws.
    pub fn with_draw_capacity(
        device: wgpu::Device,
        queue: wgpu::Queue,
        color_format: wgpu::TextureFormat,
        viewport: Viewport,
        draw_capacity: u32,
    ) -> Self {
        let uniform_entry = |dynamic: bool, visibility| wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: None,
            },
            count: None,
        };
        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[uniform_entry(false, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw_bind_group_layout"),
            entries: &[uniform_entry(true, wgpu::ShaderStages::VERTEX_FRAGMENT)],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                texture_entry(2),
                sampler_entry(3),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &draw_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let draw_stride = align_to(
            DRAW_BLOCK_SIZE,
            device.limits().min_uniform_buffer_offset_alignment,
        );
        let draw_block = DrawBlock::new(&device, &draw_layout, draw_stride, draw_capacity.max(1));

        let mipmaps = MipmapBlitter::new(&device, TEXTURE_FORMAT);
        let fallback = Arc::new(white_texture(&device, &queue));
        let depth_view = create_depth_view(&device, viewport);

        tracing::info!(
            format = ?color_format,
            draw_stride,
            draw_capacity = draw_block.capacity,
            "wgpu device ready"
        );

        Self {
            device,
            queue,
            color_format,
            viewport,
            depth_view,
            layouts: Layouts {
                frame: frame_layout,
                draw: draw_layout,
                textures: texture_layout,
                pipeline: pipeline_layout,
            },
            mipmaps,
            fallback,
            draw_block,
            draw_stride,
            pipelines: HashMap::new(),
            texture_groups: HashMap::new(),
            next_id: 1,
            frame: None,
            target: None,
            program: None,
            bound: [None, None],
            frame_staging: Vec::new(),
            draw_staging: vec![0; DRAW_BLOCK_SIZE as usize],
            draw_data: Vec::new(),
            draws: Vec::new(),
            dropped_draws: 0,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    /// Colour attachment for the next `end_frame`.
    pub fn set_target(&mut self, view: wgpu::TextureView) {
        self.target = Some(view);
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn compile(
        &self,
        stage: ShaderStage,
        body: &str,
        light_capacity: usize,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        let source = shaders::stage_source(shaders::SCENE_PRELUDE, body, light_capacity);
        let label = match stage {
            ShaderStage::Vertex => "scene_vertex_shader",
            ShaderStage::Fragment => "scene_fragment_shader",
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(ShaderError::Compile {
                stage,
                log: err.to_string(),
            }),
            None => Ok(module),
        }
    }

    fn build_pipeline(&self, program: &ProgramInner, key: PipelineKey) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene_pipeline"),
            layout: Some(&self.layouts.pipeline),
            vertex: wgpu::VertexState {
                module: &program.vertex,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: Vertex::LAYOUT.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &program.attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.fragment,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.color_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: key.cull_back_faces.then_some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: key.depth_test,
                depth_compare: if key.depth_test {
                    wgpu::CompareFunction::Less
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Grow the per-draw buffer so every recorded draw has a slot.
    ///
    /// Returns the number of draws that fit, which is short of `needed` only
    /// when the device buffer size limit is reached.
    fn reserve_draws(&mut self, needed: usize) -> usize {
        let max_buffer = self.device.limits().max_buffer_size;
        let capacity = draw_capacity(self.draw_block.capacity, needed, self.draw_stride, max_buffer);
        if capacity > self.draw_block.capacity {
            tracing::debug!(
                from = self.draw_block.capacity,
                to = capacity,
                "growing draw uniform buffer"
            );
            self.draw_block =
                DrawBlock::new(&self.device, &self.layouts.draw, self.draw_stride, capacity);
        }
        needed.min(self.draw_block.capacity as usize)
    }

    /// Bind group for the currently bound texture pair, built on first use.
    fn texture_group(&mut self) -> (u32, u32) {
        let diffuse = self.bound[0].clone().unwrap_or_else(|| Arc::clone(&self.fallback));
        let specular = self.bound[1].clone().unwrap_or_else(|| Arc::clone(&self.fallback));
        let key = (diffuse.id, specular.id);
        if !self.texture_groups.contains_key(&key) {
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("texture_bind_group"),
                layout: &self.layouts.textures,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&diffuse.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&diffuse.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&specular.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::Sampler(&specular.sampler),
                    },
                ],
            });
            self.texture_groups.insert(key, group);
        }
        key
    }
}

impl RenderDevice for WgpuDevice {
    type Buffer = WgpuBuffer;
    type VertexLayout = WgpuVertexLayout;
    type Texture = WgpuTexture;
    type Program = WgpuProgram;

    fn create_buffer(&mut self, kind: BufferKind, label: &str, contents: &[u8]) -> WgpuBuffer {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            });
        WgpuBuffer {
            buffer: Arc::new(buffer),
            kind,
        }
    }

    fn create_vertex_layout(
        &mut self,
        vertices: &WgpuBuffer,
        indices: &WgpuBuffer,
        layout: &VertexLayoutDesc,
    ) -> WgpuVertexLayout {
        if layout.stride != Vertex::LAYOUT.stride {
            tracing::warn!(
                stride = layout.stride,
                "vertex layout differs from the scene vertex format"
            );
        }
        WgpuVertexLayout {
            vertices: Arc::clone(&vertices.buffer),
            indices: Arc::clone(&indices.buffer),
        }
    }

    fn create_texture(&mut self, upload: &TextureUpload<'_>, sampler: &SamplerDesc) -> WgpuTexture {
        let rgba = expand_to_rgba8(upload.format, upload.pixels);
        let levels = if sampler.mipmap_filter.is_some() {
            mip_level_count(upload.width, upload.height)
        } else {
            1
        };
        let id = self.allocate_id();
        let texture = upload_rgba8(
            &self.device,
            &self.queue,
            upload.width,
            upload.height,
            levels,
            &rgba,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&sampler_descriptor(sampler));
        WgpuTexture {
            inner: Arc::new(TextureInner {
                id,
                texture,
                view,
                sampler,
            }),
        }
    }

    fn generate_mipmaps(&mut self, texture: &WgpuTexture) {
        if texture.inner.texture.mip_level_count() < 2 {
            return;
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("mipmap_encoder"),
            });
        self.mipmaps
            .generate(&self.device, &mut encoder, &texture.inner.texture);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<WgpuProgram, ShaderError> {
        let vertex = self.compile(ShaderStage::Vertex, &desc.source.vertex, desc.light_capacity)?;
        let fragment =
            self.compile(ShaderStage::Fragment, &desc.source.fragment, desc.light_capacity)?;

        let bound: Vec<u32> = desc.attributes.iter().map(|a| a.location).collect();
        let attributes = vertex_attributes(&Vertex::LAYOUT, &bound);

        let frame_size = frame_block_size(desc.light_capacity);
        let frame_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame_uniform_buffer"),
            size: frame_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &self.layouts.frame,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let program = ProgramInner {
            id: self.allocate_id(),
            vertex,
            fragment,
            attributes,
            reflection: UniformReflection::scene(desc.light_capacity),
            frame_size,
            frame_buffer,
            frame_bind_group,
        };

        let key = PipelineKey {
            program: program.id,
            depth_test: true,
            cull_back_faces: true,
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.build_pipeline(&program, key);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Link {
                log: err.to_string(),
            });
        }
        self.pipelines.insert(key, pipeline);

        tracing::debug!(
            program = program.id,
            uniforms = program.reflection.len(),
            frame_bytes = frame_size,
            "scene program linked"
        );
        Ok(WgpuProgram {
            inner: Arc::new(program),
        })
    }

    fn uniform_location(&self, program: &WgpuProgram, name: &str) -> Option<UniformLocation> {
        program.inner.reflection.location(name)
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        if viewport != self.viewport {
            self.depth_view = create_depth_view(&self.device, viewport);
        }
        self.viewport = viewport;
    }

    fn begin_frame(&mut self, state: &FrameState) {
        if self.frame.is_some() {
            tracing::warn!("begin_frame called twice, discarding recorded draws");
        }
        self.frame = Some(*state);
        self.draws.clear();
        self.draw_data.clear();
        self.dropped_draws = 0;
    }

    fn use_program(&mut self, program: Option<&WgpuProgram>) {
        self.program = program.map(|p| Arc::clone(&p.inner));
        if let Some(program) = &self.program {
            self.frame_staging.resize(program.frame_size as usize, 0);
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = &self.program else {
            return;
        };
        let Some(slot) = program.reflection.slot(location) else {
            tracing::debug!(location = location.0, "no uniform at location");
            return;
        };
        let block = match slot.block {
            Block::Frame => &mut self.frame_staging,
            Block::Draw => &mut self.draw_staging,
        };
        if !write_slot(block, slot, value) {
            tracing::debug!(location = location.0, ?value, "uniform value does not fit its slot");
        }
    }

    fn bind_texture(&mut self, unit: TextureUnit, texture: Option<&WgpuTexture>) {
        let texture = texture.map(|t| Arc::clone(&t.inner));
        match unit.0 {
            0 => self.bound[0] = texture,
            1 => self.bound[1] = texture,
            other => tracing::debug!(unit = other, "texture unit not sampled by the scene program"),
        }
    }

    fn draw_indexed(
        &mut self,
        layout: &WgpuVertexLayout,
        index_count: u32,
        index_type: IndexType,
        topology: Topology,
    ) {
        let Some(state) = self.frame else {
            tracing::warn!("draw outside begin_frame/end_frame ignored");
            return;
        };
        let Some(program) = self.program.clone() else {
            self.dropped_draws += 1;
            return;
        };

        let key = PipelineKey {
            program: program.id,
            depth_test: state.depth_test,
            cull_back_faces: state.cull_back_faces,
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = self.build_pipeline(&program, key);
            self.pipelines.insert(key, pipeline);
        }
        let textures = self.texture_group();

        let Topology::Triangles = topology;
        let index_format = match index_type {
            IndexType::U16 => wgpu::IndexFormat::Uint16,
            IndexType::U32 => wgpu::IndexFormat::Uint32,
        };

        let offset = self.draws.len() as u32 * self.draw_stride;
        self.draw_data.resize(offset as usize, 0);
        self.draw_data.extend_from_slice(&self.draw_staging);

        self.draws.push(DrawRecord {
            pipeline: key,
            program,
            vertices: Arc::clone(&layout.vertices),
            indices: Arc::clone(&layout.indices),
            index_format,
            index_count,
            offset,
            textures,
        });
    }

    fn end_frame(&mut self) {
        let Some(state) = self.frame.take() else {
            tracing::debug!("end_frame without begin_frame");
            return;
        };
        let Some(target) = self.target.take() else {
            tracing::warn!(draws = self.draws.len(), "no target view set, frame dropped");
            self.draws.clear();
            return;
        };
        if self.dropped_draws > 0 {
            tracing::debug!(dropped = self.dropped_draws, "draws without a program skipped");
        }
        let fitting = self.reserve_draws(self.draws.len());
        if fitting < self.draws.len() {
            tracing::warn!(
                draws = self.draws.len(),
                capacity = fitting,
                "draw uniform buffer at device limit, dropping draws"
            );
            self.draws.truncate(fitting);
            self.draw_data.truncate(fitting * self.draw_stride as usize);
        }

        if let Some(program) = &self.program {
            self.queue
                .write_buffer(&program.frame_buffer, 0, &self.frame_staging);
        }
        if !self.draw_data.is_empty() {
            self.queue
                .write_buffer(&self.draw_block.buffer, 0, &self.draw_data);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("scene_encoder"),
            });
        {
            let [r, g, b, a] = state.clear_colour.map(f64::from);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            let vp = self.viewport;
            pass.set_viewport(
                vp.x.max(0) as f32,
                vp.y.max(0) as f32,
                vp.width.max(1) as f32,
                vp.height.max(1) as f32,
                0.0,
                1.0,
            );

            for draw in &self.draws {
                let (Some(pipeline), Some(textures)) = (
                    self.pipelines.get(&draw.pipeline),
                    self.texture_groups.get(&draw.textures),
                ) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &draw.program.frame_bind_group, &[]);
                pass.set_bind_group(1, &self.draw_block.bind_group, &[draw.offset]);
                pass.set_bind_group(2, textures, &[]);
                pass.set_vertex_buffer(0, draw.vertices.slice(..));
                pass.set_index_buffer(draw.indices.slice(..), draw.index_format);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.draws.clear();
    }
}

/// Draw slots needed to hold `needed` draws, doubling from `current`.
///
/// Never shrinks, and never exceeds what fits in `max_buffer_bytes`.
fn draw_capacity(current: u32, needed: usize, stride: u32, max_buffer_bytes: u64) -> u32 {
    // Dynamic offsets are u32, so the buffer can't address past u32::MAX either.
    let bytes = max_buffer_bytes.min(u32::MAX as u64);
    let limit = (bytes / stride.max(1) as u64) as u32;
    let mut capacity = current.max(1);
    while (capacity as usize) < needed && capacity < limit {
        capacity = capacity.saturating_mul(2).min(limit);
    }
    capacity.max(current)
}

fn create_depth_view(device: &wgpu::Device, viewport: Viewport) -> wgpu::TextureView {
    let width = viewport.x.max(0) as u32 + viewport.width;
    let height = viewport.y.max(0) as u32 + viewport.height;
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
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
    });
    texture.create_view(&Default::default())
}

fn upload_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    levels: u32,
    rgba: &[u8],
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("scene_texture"),
        size,
        mip_level_count: levels,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.width),
            rows_per_image: Some(size.height),
        },
        size,
    );
    texture
}

/// 1x1 white texture bound to units with nothing bound.
fn white_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> TextureInner {
    let texture = upload_rgba8(device, queue, 1, 1, 1, &[255; 4]);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("fallback_sampler"),
        ..Default::default()
    });
    TextureInner {
        id: 0,
        texture,
        view,
        sampler,
    }
}

fn sampler_descriptor(desc: &SamplerDesc) -> wgpu::SamplerDescriptor<'static> {
    let filter = |f: Filter| match f {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    };
    let wrap = |w: Wrap| match w {
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    };
    wgpu::SamplerDescriptor {
        label: Some("scene_sampler"),
        address_mode_u: wrap(desc.wrap_u),
        address_mode_v: wrap(desc.wrap_v),
        mag_filter: filter(desc.mag_filter),
        min_filter: filter(desc.min_filter),
        mipmap_filter: desc.mipmap_filter.map(filter).unwrap_or(wgpu::FilterMode::Nearest),
        lod_max_clamp: if desc.mipmap_filter.is_some() { 32.0 } else { 0.0 },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_capacity_doubles_past_the_initial_size() {
        let max = 256 * 1024 * 1024;
        assert_eq!(draw_capacity(DEFAULT_DRAW_CAPACITY, 5000, 256, max), 8192);
        assert_eq!(draw_capacity(4096, 4096, 256, max), 4096);
        assert_eq!(draw_capacity(4096, 10, 256, max), 4096);
        assert_eq!(draw_capacity(1, 3, 256, max), 4);
    }

    #[test]
    fn draw_capacity_stops_at_the_buffer_limit() {
        // 1000 slots of 256 bytes fit.
        assert_eq!(draw_capacity(512, 5000, 256, 256_000), 1000);
        assert_eq!(draw_capacity(512, 700, 256, 256_000), 1000);
    }

    #[test]
    fn trilinear_repeat_maps_to_wgpu_sampler() {
        let d = sampler_descriptor(&SamplerDesc::TRILINEAR_REPEAT);
        assert_eq!(d.mag_filter, wgpu::FilterMode::Linear);
        assert_eq!(d.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(d.mipmap_filter, wgpu::FilterMode::Linear);
        assert_eq!(d.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(d.address_mode_v, wgpu::AddressMode::Repeat);
    }

    #[test]
    fn sampler_without_mipmaps_clamps_lod() {
        let desc = SamplerDesc {
            mipmap_filter: None,
            wrap_u: Wrap::ClampToEdge,
            ..SamplerDesc::TRILINEAR_REPEAT
        };
        let d = sampler_descriptor(&desc);
        assert_eq!(d.lod_max_clamp, 0.0);
        assert_eq!(d.address_mode_u, wgpu::AddressMode::ClampToEdge);
    }
}
