use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace, warn};

use crate::backend::{ConstantBuffer, RenderBackend};
use crate::batch::{RenderState, SamplerState, StencilMode, TextureSlot};
use crate::error::DeviceError;
use crate::shader::{ShaderId, VertexLayout};
use crate::texture::{TextureDesc, TextureFormat, TextureRegion, TextureUsage};

use super::arena::UniformArena;
use super::bindings::{self, TextureSetKey};
use super::pipeline::{self, PipelineDesc, PipelineKey};
use super::shaders::{ShaderLibrary, ShaderStage};

/// Construction options of [`WgpuBackend`].
#[derive(Debug, Copy, Clone)]
pub struct WgpuBackendConfig {
    /// Format of the frame targets passed to [`WgpuBackend::set_frame_target`].
    pub color_format: wgpu::TextureFormat,
    /// Stencil attachment format. `None` renders without stencil; masking
    /// batches then draw unclipped.
    pub stencil_format: Option<wgpu::TextureFormat>,
    /// Sample color textures as sRGB.
    pub srgb_textures: bool,
    /// Bytes of constant data staged between two submissions.
    pub uniform_arena_size: usize,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Bgra8Unorm,
            stencil_format: Some(wgpu::TextureFormat::Stencil8),
            srgb_textures: false,
            uniform_arena_size: 256 * 1024,
        }
    }
}

/// Pipeline handle: the base variant lives in the backend, other render
/// states are created on first use.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WgpuPipeline {
    pub shader: ShaderId,
}

/// All permutations share one pipeline layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WgpuResources {
    pub shader: ShaderId,
}

#[derive(Debug)]
pub struct WgpuTexture {
    id: u64,
    texture: wgpu::Texture,
    view: Arc<wgpu::TextureView>,
    rgbx: bool,
}

impl WgpuTexture {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    #[inline]
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

#[derive(Debug, Clone)]
pub struct WgpuBinding {
    texture: u64,
    sampler_bits: u8,
    view: Arc<wgpu::TextureView>,
    sampler: Arc<wgpu::Sampler>,
}

/// Color target of the current frame.
struct FrameTarget {
    view: wgpu::TextureView,
    clear: Option<wgpu::Color>,
}

struct StencilTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct ShaderInfo {
    vertex_key: String,
    fragment_key: String,
    layout: VertexLayout,
}

/// Pass command recorded at draw time and replayed on submission.
#[derive(Debug, Copy, Clone)]
enum PassOp {
    Pipeline(PipelineKey),
    Constants([u32; ConstantBuffer::COUNT]),
    Textures(TextureSetKey),
    VertexBuffer(u64),
    StencilRef(u32),
    Draw { first: u32, count: u32 },
}

/// Last value recorded for each piece of pass state, to skip redundant ops.
#[derive(Debug, Default)]
struct Recorded {
    pipeline: Option<PipelineKey>,
    constants: Option<[u32; ConstantBuffer::COUNT]>,
    textures: Option<TextureSetKey>,
    vertex_offset: Option<u64>,
    stencil_ref: Option<u32>,
}

#[derive(Debug, Default)]
struct Warnings {
    wireframe: bool,
    stencil: bool,
    offscreen: bool,
}

/// [`RenderBackend`] on top of wgpu.
///
/// Draws are recorded and replayed into a single render pass when the device
/// flushes. Constant uploads go through a [`UniformArena`] addressed with
/// dynamic offsets, so every recorded draw keeps the values it saw.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: WgpuBackendConfig,
    shaders: Box<dyn ShaderLibrary>,
    border_sampling: bool,

    modules: HashMap<String, wgpu::ShaderModule>,
    infos: HashMap<ShaderId, ShaderInfo>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    pipeline_layout: wgpu::PipelineLayout,
    textures_layout: wgpu::BindGroupLayout,

    arena: UniformArena,
    arena_buffer: wgpu::Buffer,
    constants_group: wgpu::BindGroup,

    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,

    samplers: HashMap<SamplerState, Arc<wgpu::Sampler>>,
    _white: wgpu::Texture,
    white_view: Arc<wgpu::TextureView>,
    white_sampler: Arc<wgpu::Sampler>,
    texture_groups: HashMap<TextureSetKey, wgpu::BindGroup>,
    bound: [Option<WgpuBinding>; TextureSlot::COUNT],
    retired: Vec<u64>,
    next_texture_id: u64,

    target: Option<FrameTarget>,
    stencil: Option<StencilTarget>,
    first_pass: bool,

    shader: Option<ShaderId>,
    state: RenderState,
    stencil_ref: u8,
    vertex_offset: u64,

    ops: Vec<PassOp>,
    recorded: Recorded,
    warned: Warnings,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        config: WgpuBackendConfig,
        shaders: Box<dyn ShaderLibrary>,
    ) -> Self {
        let border_sampling = device
            .features()
            .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        let alignment = device.limits().min_uniform_buffer_offset_alignment as usize;

        let constants_layout = bindings::constants_layout(&device);
        let textures_layout = bindings::textures_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gilded pipeline layout"),
            bind_group_layouts: &[&constants_layout, &textures_layout],
            immediate_size: 0,
        });

        let arena = UniformArena::new(config.uniform_arena_size, alignment);
        let arena_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gilded constants arena"),
            size: arena.capacity() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let constants_group = bindings::constants_bind_group(&device, &constants_layout, &arena_buffer);

        let white = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gilded white texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_region(&queue, &white, 0, TextureRegion::new(0, 0, 1, 1), 4, &[0xff; 4]);
        let white_view = Arc::new(white.create_view(&wgpu::TextureViewDescriptor::default()));
        let white_sampler = Arc::new(
            device.create_sampler(&bindings::sampler_descriptor(SamplerState::default(), false)),
        );

        debug!(
            "wgpu backend: color={:?} stencil={:?} arena={}B border_sampling={}",
            config.color_format,
            config.stencil_format,
            arena.capacity(),
            border_sampling
        );

        Self {
            device,
            queue,
            config,
            shaders,
            border_sampling,
            modules: HashMap::new(),
            infos: HashMap::new(),
            pipelines: HashMap::new(),
            pipeline_layout,
            textures_layout,
            arena,
            arena_buffer,
            constants_group,
            vertex_buffer: None,
            index_buffer: None,
            samplers: HashMap::new(),
            _white: white,
            white_view,
            white_sampler,
            texture_groups: HashMap::new(),
            bound: Default::default(),
            retired: Vec::new(),
            next_texture_id: 0,
            target: None,
            stencil: None,
            first_pass: true,
            shader: None,
            state: RenderState::default(),
            stencil_ref: 0,
            vertex_offset: 0,
            ops: Vec::new(),
            recorded: Recorded::default(),
            warned: Warnings::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &WgpuBackendConfig {
        &self.config
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Number of pipeline variants created so far.
    #[inline]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Sets the color target for the next frame. `clear` is applied by the
    /// first pass of the frame; `None` keeps the existing contents.
    pub fn set_frame_target(
        &mut self,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
        clear: Option<wgpu::Color>,
    ) {
        self.target = Some(FrameTarget { view, clear });
        self.ensure_stencil(width.max(1), height.max(1));
    }

    fn ensure_stencil(&mut self, width: u32, height: u32) {
        let Some(format) = self.config.stencil_format else {
            return;
        };
        if let Some(s) = &self.stencil {
            if s.width == width && s.height == height {
                return;
            }
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gilded stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.stencil = Some(StencilTarget {
            _texture: texture,
            view,
            width,
            height,
        });
    }

    // ── shaders and pipelines ────────────────────────────────────────────

    fn load_module(&mut self, shader: ShaderId, stage: ShaderStage) -> Result<String, DeviceError> {
        let key = stage.key(shader);
        if !self.modules.contains_key(&key) {
            let source = self.shaders.source(shader, stage)?;
            let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(key.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            trace!("shader module {key} loaded");
            self.modules.insert(key.clone(), module);
        }
        Ok(key)
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) -> Result<(), DeviceError> {
        if self.pipelines.contains_key(&key) {
            return Ok(());
        }
        let info = self
            .infos
            .get(&key.shader)
            .ok_or(DeviceError::UnknownShader(key.shader as u8))?;
        let missing = || DeviceError::Backend(format!("no shader module for {}", key.shader.name()));
        let vertex_module = self.modules.get(&info.vertex_key).ok_or_else(missing)?;
        let fragment_module = self.modules.get(&info.fragment_key).ok_or_else(missing)?;

        let pipeline = pipeline::create_pipeline(
            &self.device,
            &PipelineDesc {
                key,
                layout: &self.pipeline_layout,
                vertex_layout: &info.layout,
                vertex_module,
                fragment_module,
                color_format: self.config.color_format,
                stencil_format: self.config.stencil_format,
            },
        );
        trace!("pipeline variant {key:?} created");
        self.pipelines.insert(key, pipeline);
        Ok(())
    }

    fn current_key(&mut self, shader: ShaderId) -> PipelineKey {
        if self.state.wireframe && !self.warned.wireframe {
            warn!("wireframe render state is not supported; drawing filled");
            self.warned.wireframe = true;
        }
        let stencil_available = self.config.stencil_format.is_some();
        if !stencil_available && self.state.stencil != StencilMode::Disabled && !self.warned.stencil {
            warn!("stencil requested without a stencil attachment; masking is ignored");
            self.warned.stencil = true;
        }
        PipelineKey::new(shader, self.state, stencil_available)
    }

    // ── textures ─────────────────────────────────────────────────────────

    fn sampler(&mut self, state: SamplerState) -> Arc<wgpu::Sampler> {
        let device = &self.device;
        let border = self.border_sampling;
        self.samplers
            .entry(state)
            .or_insert_with(|| Arc::new(device.create_sampler(&bindings::sampler_descriptor(state, border))))
            .clone()
    }

    fn ensure_texture_group(&mut self) -> TextureSetKey {
        let key: TextureSetKey =
            std::array::from_fn(|i| self.bound[i].as_ref().map(|b| (b.texture, b.sampler_bits)));
        if !self.texture_groups.contains_key(&key) {
            let slots = std::array::from_fn(|i| match &self.bound[i] {
                Some(b) => (&*b.view, &*b.sampler),
                None => (&*self.white_view, &*self.white_sampler),
            });
            let group = bindings::textures_bind_group(&self.device, &self.textures_layout, slots);
            self.texture_groups.insert(key, group);
        }
        key
    }

    /// Drops bind groups that reference destroyed textures.
    fn purge_retired(&mut self) {
        if self.retired.is_empty() {
            return;
        }
        let retired = std::mem::take(&mut self.retired);
        self.texture_groups.retain(|key, _| {
            !key.iter()
                .flatten()
                .any(|(texture, _)| retired.contains(texture))
        });
    }

    // ── submission ───────────────────────────────────────────────────────

    fn record(&mut self, op: PassOp) {
        let changed = match op {
            PassOp::Pipeline(key) => self.recorded.pipeline.replace(key) != Some(key),
            PassOp::Constants(offsets) => self.recorded.constants.replace(offsets) != Some(offsets),
            PassOp::Textures(key) => self.recorded.textures.replace(key) != Some(key),
            PassOp::VertexBuffer(offset) => self.recorded.vertex_offset.replace(offset) != Some(offset),
            PassOp::StencilRef(value) => self.recorded.stencil_ref.replace(value) != Some(value),
            PassOp::Draw { .. } => true,
        };
        if changed {
            self.ops.push(op);
        }
    }

    /// Encodes the recorded ops into one render pass and submits it.
    fn encode_pass(&mut self) -> Result<(), DeviceError> {
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| DeviceError::Backend("draws recorded without a frame target".into()))?;

        self.queue
            .write_buffer(&self.arena_buffer, 0, self.arena.written());

        let color_load = match (self.first_pass, target.clear) {
            (true, Some(color)) => wgpu::LoadOp::Clear(color),
            _ => wgpu::LoadOp::Load,
        };
        let stencil_load = if self.first_pass {
            wgpu::LoadOp::Clear(0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("gilded encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gilded pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: self.stencil.as_ref().map(|s| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view: &s.view,
                        depth_ops: None,
                        stencil_ops: Some(wgpu::Operations {
                            load: stencil_load,
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if let Some(index) = &self.index_buffer {
                rpass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint16);
            }

            for op in &self.ops {
                match *op {
                    PassOp::Pipeline(key) => {
                        if let Some(p) = self.pipelines.get(&key) {
                            rpass.set_pipeline(p);
                        }
                    }
                    PassOp::Constants(offsets) => {
                        rpass.set_bind_group(0, &self.constants_group, &offsets[..]);
                    }
                    PassOp::Textures(key) => {
                        if let Some(group) = self.texture_groups.get(&key) {
                            rpass.set_bind_group(1, group, &[]);
                        }
                    }
                    PassOp::VertexBuffer(offset) => {
                        if let Some(vb) = &self.vertex_buffer {
                            rpass.set_vertex_buffer(0, vb.slice(offset..));
                        }
                    }
                    PassOp::StencilRef(value) => rpass.set_stencil_reference(value),
                    PassOp::Draw { first, count } => rpass.draw_indexed(first..first + count, 0, 0..1),
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        trace!("submitted pass with {} ops", self.ops.len());
        self.first_pass = false;
        Ok(())
    }

    fn finish_submission(&mut self) {
        self.arena.restart();
        self.ops.clear();
        self.recorded = Recorded::default();
        self.purge_retired();
    }
}

impl RenderBackend for WgpuBackend {
    type Pipeline = WgpuPipeline;
    type ResourceSet = WgpuResources;
    type Texture = WgpuTexture;
    type TextureBinding = WgpuBinding;

    fn create_pipeline(
        &mut self,
        shader: ShaderId,
        layout: &VertexLayout,
    ) -> Result<WgpuPipeline, DeviceError> {
        let vertex_key = self.load_module(shader, ShaderStage::Vertex)?;
        let fragment_key = self.load_module(shader, ShaderStage::Fragment)?;
        self.infos.insert(
            shader,
            ShaderInfo {
                vertex_key,
                fragment_key,
                layout: layout.clone(),
            },
        );
        self.ensure_pipeline(PipelineKey::base(shader))?;
        Ok(WgpuPipeline { shader })
    }

    fn create_resource_set(&mut self, shader: ShaderId) -> Result<WgpuResources, DeviceError> {
        Ok(WgpuResources { shader })
    }

    fn create_buffers(&mut self, vertex_capacity: u64, index_capacity: u64) -> Result<(), DeviceError> {
        let create = |label: &'static str, size: u64, usage: wgpu::BufferUsages| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size.max(4).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
                usage: usage | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let vertex = create("gilded vertices", vertex_capacity, wgpu::BufferUsages::VERTEX);
        let index = create("gilded indices", index_capacity, wgpu::BufferUsages::INDEX);
        self.vertex_buffer = Some(vertex);
        self.index_buffer = Some(index);
        Ok(())
    }

    fn set_pipeline(&mut self, pipeline: &WgpuPipeline, _resources: &WgpuResources) {
        self.shader = Some(pipeline.shader);
    }

    fn set_render_state(&mut self, state: RenderState, stencil_ref: u8) {
        self.state = state;
        self.stencil_ref = stencil_ref;
    }

    fn set_buffers(&mut self, vertex_offset: u64) {
        self.vertex_offset = vertex_offset;
    }

    fn update_constants(&mut self, buffer: ConstantBuffer, data: &[f32]) -> Result<(), DeviceError> {
        if self.arena.push(buffer, data) {
            return Ok(());
        }
        self.flush()?;
        if self.arena.push(buffer, data) {
            Ok(())
        } else {
            Err(DeviceError::Backend("constant arena cannot hold one upload".into()))
        }
    }

    fn write_vertices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let vb = self
            .vertex_buffer
            .as_ref()
            .ok_or_else(|| DeviceError::Backend("vertex buffer written before creation".into()))?;
        self.queue.write_buffer(vb, offset, &padded(data));
        Ok(())
    }

    fn write_indices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        let ib = self
            .index_buffer
            .as_ref()
            .ok_or_else(|| DeviceError::Backend("index buffer written before creation".into()))?;
        self.queue.write_buffer(ib, offset, &padded(data));
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        levels: Option<&[&[u8]]>,
    ) -> Result<WgpuTexture, DeviceError> {
        desc.validate_size(self.max_texture_dimension())?;
        if let Some(levels) = levels {
            desc.validate_levels(levels)?;
        }

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if matches!(desc.usage, TextureUsage::RenderTarget { .. }) {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("gilded texture"),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format, self.config.srgb_textures),
            usage,
            view_formats: &[],
        });

        let rgbx = desc.format == TextureFormat::Rgbx8;
        let bpp = desc.format.bytes_per_pixel();
        if let Some(levels) = levels {
            for (level, data) in levels.iter().enumerate().take(desc.mip_levels as usize) {
                let level = level as u32;
                let (w, h) = desc.level_size(level);
                let data = &data[..desc.level_bytes(level)];
                let data = if rgbx { force_opaque(data) } else { Cow::Borrowed(data) };
                write_region(&self.queue, &texture, level, TextureRegion::new(0, 0, w, h), bpp, &data);
            }
        }

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        trace!("texture {id} created: {}x{} {:?}", desc.width, desc.height, desc.format);

        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Ok(WgpuTexture {
            id,
            texture,
            view,
            rgbx,
        })
    }

    fn update_texture(
        &mut self,
        texture: &WgpuTexture,
        desc: &TextureDesc,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let data = if texture.rgbx {
            force_opaque(data)
        } else {
            Cow::Borrowed(data)
        };
        write_region(
            &self.queue,
            &texture.texture,
            level,
            region,
            desc.format.bytes_per_pixel(),
            &data,
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: WgpuTexture) {
        trace!("texture {} destroyed", texture.id);
        self.retired.push(texture.id);
        for slot in &mut self.bound {
            if slot.as_ref().is_some_and(|b| b.texture == texture.id) {
                *slot = None;
            }
        }
    }

    fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn create_texture_binding(
        &mut self,
        texture: &WgpuTexture,
        _slot: TextureSlot,
        sampler: SamplerState,
    ) -> Result<WgpuBinding, DeviceError> {
        Ok(WgpuBinding {
            texture: texture.id,
            sampler_bits: sampler.to_bits(),
            view: texture.view.clone(),
            sampler: self.sampler(sampler),
        })
    }

    fn bind_texture(&mut self, slot: TextureSlot, binding: Option<&WgpuBinding>) {
        self.bound[slot.index()] = binding.cloned();
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<(), DeviceError> {
        let shader = self
            .shader
            .ok_or_else(|| DeviceError::Backend("draw without a pipeline".into()))?;
        if self.vertex_buffer.is_none() || self.index_buffer.is_none() {
            return Err(DeviceError::Backend("draw before buffers were created".into()));
        }

        let key = self.current_key(shader);
        self.ensure_pipeline(key)?;
        let textures = self.ensure_texture_group();

        self.record(PassOp::Pipeline(key));
        self.record(PassOp::Constants(self.arena.offsets()));
        self.record(PassOp::Textures(textures));
        self.record(PassOp::VertexBuffer(self.vertex_offset));
        if self.stencil.is_some() {
            self.record(PassOp::StencilRef(u32::from(self.stencil_ref)));
        }
        self.record(PassOp::Draw {
            first: first_index,
            count: index_count,
        });
        Ok(())
    }

    fn begin_render(&mut self, offscreen: bool) {
        if offscreen && !self.warned.offscreen {
            warn!("offscreen passes are not supported; rendering to the frame target");
            self.warned.offscreen = true;
        }
        self.first_pass = true;
    }

    fn end_render(&mut self) -> Result<(), DeviceError> {
        self.flush()?;
        // A frame without draws still applies its clear.
        if self.first_pass && self.target.is_some() {
            self.encode_pass()?;
            self.finish_submission();
        }
        self.target = None;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        if !self.ops.is_empty() {
            self.encode_pass()?;
        }
        self.finish_submission();
        Ok(())
    }
}

/// Maps a UI texture format onto wgpu.
pub(crate) fn texture_format(format: TextureFormat, srgb: bool) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8 | TextureFormat::Rgbx8 if srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TextureFormat::Rgba8 | TextureFormat::Rgbx8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
    }
}

/// Sets the unused alpha channel of RGBX texels to 255.
pub(crate) fn force_opaque(data: &[u8]) -> Cow<'_, [u8]> {
    if data.chunks_exact(4).all(|px| px[3] == 0xff) {
        return Cow::Borrowed(data);
    }
    let mut owned = data.to_vec();
    for px in owned.chunks_exact_mut(4) {
        px[3] = 0xff;
    }
    Cow::Owned(owned)
}

/// Buffer writes must be a multiple of four bytes.
pub(crate) fn padded(data: &[u8]) -> Cow<'_, [u8]> {
    let len = data.len().next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT as usize);
    if len == data.len() {
        return Cow::Borrowed(data);
    }
    let mut owned = data.to_vec();
    owned.resize(len, 0);
    Cow::Owned(owned)
}

fn write_region(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    level: u32,
    region: TextureRegion,
    bytes_per_pixel: u32,
    data: &[u8],
) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: level,
            origin: wgpu::Origin3d {
                x: region.x,
                y: region.y,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(region.width * bytes_per_pixel),
            rows_per_image: Some(region.height),
        },
        wgpu::Extent3d {
            width: region.width,
            height: region.height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_formats_follow_srgb_option() {
        assert_eq!(
            texture_format(TextureFormat::Rgba8, false),
            wgpu::TextureFormat::Rgba8Unorm
        );
        assert_eq!(
            texture_format(TextureFormat::Rgbx8, true),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        assert_eq!(texture_format(TextureFormat::R8, true), wgpu::TextureFormat::R8Unorm);
    }

    #[test]
    fn rgbx_alpha_is_forced_opaque() {
        let data = [10, 20, 30, 0, 40, 50, 60, 7];
        assert_eq!(&*force_opaque(&data), &[10, 20, 30, 255, 40, 50, 60, 255]);

        let opaque = [1, 2, 3, 255];
        assert!(matches!(force_opaque(&opaque), Cow::Borrowed(_)));
    }

    #[test]
    fn writes_are_padded_to_four_bytes() {
        assert_eq!(padded(&[1, 2, 3, 4]).len(), 4);
        assert_eq!(&*padded(&[1, 2, 3, 4, 5, 6]), &[1, 2, 3, 4, 5, 6, 0, 0]);
    }
}
