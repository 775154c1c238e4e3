use log::trace;

use crate::batch::{RenderState, SamplerState, TextureSlot};
use crate::error::DeviceError;
use crate::shader::{ShaderId, VertexLayout};
use crate::texture::{TextureDesc, TextureRegion};

use super::{ConstantBuffer, RenderBackend};

/// Pipeline handle of the headless backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadlessPipeline {
    pub shader: ShaderId,
    pub stride: u32,
}

/// CPU copy of a texture, one byte vector per mip level.
#[derive(Debug, Clone)]
pub struct HeadlessTexture {
    pub id: u32,
    pub desc: TextureDesc,
    pub levels: Vec<Vec<u8>>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadlessBinding {
    pub texture: u32,
    pub slot: TextureSlot,
    pub sampler: SamplerState,
}

/// Everything the backend was asked to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreatePipeline(ShaderId),
    CreateResourceSet(ShaderId),
    CreateBuffers { vertex_capacity: u64, index_capacity: u64 },
    SetPipeline(ShaderId),
    SetRenderState { state: RenderState, stencil_ref: u8 },
    SetBuffers { vertex_offset: u64 },
    UpdateConstants { buffer: ConstantBuffer, data: Vec<f32> },
    WriteVertices { offset: u64, len: usize },
    WriteIndices { offset: u64, len: usize },
    CreateTexture { id: u32 },
    UpdateTexture { id: u32, level: u32, region: TextureRegion },
    DestroyTexture { id: u32 },
    CreateTextureBinding(HeadlessBinding),
    BindTexture { slot: TextureSlot, texture: Option<u32> },
    DrawIndexed { first_index: u32, index_count: u32 },
    BeginRender { offscreen: bool },
    EndRender,
    Flush,
}

/// State captured at the moment of a draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub shader: ShaderId,
    pub render_state: RenderState,
    pub stencil_ref: u8,
    pub vertex_offset: u64,
    pub first_index: u32,
    pub indices: Vec<u16>,
    /// Vertex bytes from `vertex_offset` up to the highest referenced vertex.
    pub vertices: Vec<u8>,
    pub textures: [Option<HeadlessBinding>; TextureSlot::COUNT],
    /// Last uploaded contents of each constant buffer.
    pub constants: [Vec<f32>; ConstantBuffer::COUNT],
}

/// Backend that keeps every resource in CPU memory and records all calls.
///
/// Used by tests and tooling to observe exactly what the render device
/// submits without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    commands: Vec<Command>,
    draws: Vec<DrawRecord>,

    vertices: Vec<u8>,
    indices: Vec<u8>,
    constants: [Vec<f32>; ConstantBuffer::COUNT],

    pipeline: Option<HeadlessPipeline>,
    render_state: RenderState,
    stencil_ref: u8,
    vertex_offset: u64,
    textures: [Option<HeadlessBinding>; TextureSlot::COUNT],

    next_texture: u32,
    flushes: usize,
    in_frame: bool,

    fail_upload: Option<ConstantBuffer>,
    fail_flush: bool,
    max_dimension: Option<u32>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps texture width and height, like a GPU limit would.
    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_dimension = Some(max);
        self
    }

    #[inline]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    #[inline]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.draws.clear();
    }

    /// Number of uploads to `buffer` since the log was last cleared.
    pub fn upload_count(&self, buffer: ConstantBuffer) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::UpdateConstants { buffer: b, .. } if *b == buffer))
            .count()
    }

    pub fn binding_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::CreateTextureBinding(_)))
            .count()
    }

    /// Makes the next upload to `buffer` fail without touching its contents.
    pub fn fail_next_upload(&mut self, buffer: ConstantBuffer) {
        self.fail_upload = Some(buffer);
    }

    /// Makes the next flush fail.
    pub fn fail_next_flush(&mut self) {
        self.fail_flush = true;
    }

    #[inline]
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    #[inline]
    pub fn constants(&self, buffer: ConstantBuffer) -> &[f32] {
        &self.constants[buffer.index()]
    }

    #[inline]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    fn write(target: &mut Vec<u8>, offset: u64, data: &[u8]) {
        let start = offset as usize;
        let end = start + data.len();
        if target.len() < end {
            target.resize(end, 0);
        }
        target[start..end].copy_from_slice(data);
    }

    fn index_at(&self, index: usize) -> Option<u16> {
        let bytes = self.indices.get(index * 2..index * 2 + 2)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

impl RenderBackend for HeadlessBackend {
    type Pipeline = HeadlessPipeline;
    type ResourceSet = ShaderId;
    type Texture = HeadlessTexture;
    type TextureBinding = HeadlessBinding;

    fn create_pipeline(
        &mut self,
        shader: ShaderId,
        layout: &VertexLayout,
    ) -> Result<Self::Pipeline, DeviceError> {
        self.commands.push(Command::CreatePipeline(shader));
        Ok(HeadlessPipeline {
            shader,
            stride: layout.stride(),
        })
    }

    fn create_resource_set(&mut self, shader: ShaderId) -> Result<Self::ResourceSet, DeviceError> {
        self.commands.push(Command::CreateResourceSet(shader));
        Ok(shader)
    }

    fn create_buffers(&mut self, vertex_capacity: u64, index_capacity: u64) -> Result<(), DeviceError> {
        self.vertices = vec![0; vertex_capacity as usize];
        self.indices = vec![0; index_capacity as usize];
        self.commands.push(Command::CreateBuffers {
            vertex_capacity,
            index_capacity,
        });
        Ok(())
    }

    fn set_pipeline(&mut self, pipeline: &Self::Pipeline, _resources: &Self::ResourceSet) {
        self.pipeline = Some(*pipeline);
        self.commands.push(Command::SetPipeline(pipeline.shader));
    }

    fn set_render_state(&mut self, state: RenderState, stencil_ref: u8) {
        self.render_state = state;
        self.stencil_ref = stencil_ref;
        self.commands.push(Command::SetRenderState { state, stencil_ref });
    }

    fn set_buffers(&mut self, vertex_offset: u64) {
        self.vertex_offset = vertex_offset;
        self.commands.push(Command::SetBuffers { vertex_offset });
    }

    fn update_constants(&mut self, buffer: ConstantBuffer, data: &[f32]) -> Result<(), DeviceError> {
        if self.fail_upload == Some(buffer) {
            self.fail_upload = None;
            return Err(DeviceError::Backend(format!("{buffer:?} upload rejected")));
        }
        self.constants[buffer.index()] = data.to_vec();
        self.commands.push(Command::UpdateConstants {
            buffer,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn write_vertices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        Self::write(&mut self.vertices, offset, data);
        self.commands.push(Command::WriteVertices {
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn write_indices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError> {
        Self::write(&mut self.indices, offset, data);
        self.commands.push(Command::WriteIndices {
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        levels: Option<&[&[u8]]>,
    ) -> Result<Self::Texture, DeviceError> {
        if let Some(levels) = levels {
            desc.validate_levels(levels)?;
        }

        let levels = (0..desc.mip_levels)
            .map(|level| {
                let len = desc.level_bytes(level);
                match levels.and_then(|l| l.get(level as usize)) {
                    Some(data) => data[..len].to_vec(),
                    None => vec![0; len],
                }
            })
            .collect();

        let id = self.next_texture;
        self.next_texture += 1;
        self.commands.push(Command::CreateTexture { id });
        Ok(HeadlessTexture {
            id,
            desc: *desc,
            levels,
        })
    }

    fn update_texture(
        &mut self,
        texture: &Self::Texture,
        desc: &TextureDesc,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let expected = region.byte_len(desc.format);
        if data.len() < expected {
            return Err(DeviceError::InvalidTextureData {
                level,
                expected,
                actual: data.len(),
            });
        }
        self.commands.push(Command::UpdateTexture {
            id: texture.id,
            level,
            region,
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: Self::Texture) {
        self.commands.push(Command::DestroyTexture { id: texture.id });
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_dimension.unwrap_or(u32::MAX)
    }

    fn create_texture_binding(
        &mut self,
        texture: &Self::Texture,
        slot: TextureSlot,
        sampler: SamplerState,
    ) -> Result<Self::TextureBinding, DeviceError> {
        let binding = HeadlessBinding {
            texture: texture.id,
            slot,
            sampler,
        };
        self.commands.push(Command::CreateTextureBinding(binding));
        Ok(binding)
    }

    fn bind_texture(&mut self, slot: TextureSlot, binding: Option<&Self::TextureBinding>) {
        self.textures[slot.index()] = binding.copied();
        self.commands.push(Command::BindTexture {
            slot,
            texture: binding.map(|b| b.texture),
        });
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<(), DeviceError> {
        let pipeline = self
            .pipeline
            .ok_or_else(|| DeviceError::Backend("draw without a pipeline".into()))?;

        let indices: Vec<u16> = (first_index..first_index + index_count)
            .map(|i| {
                self.index_at(i as usize)
                    .ok_or_else(|| DeviceError::Backend(format!("index {i} was never written")))
            })
            .collect::<Result<_, _>>()?;

        let referenced = indices.iter().copied().max().map_or(0, |max| max as u64 + 1);
        let start = (self.vertex_offset as usize).min(self.vertices.len());
        let end = (self.vertex_offset + referenced * pipeline.stride as u64) as usize;
        let vertices = self.vertices[start..end.min(self.vertices.len())].to_vec();

        trace!(
            "headless draw {:?}: {} indices from {}",
            pipeline.shader, index_count, first_index
        );

        self.draws.push(DrawRecord {
            shader: pipeline.shader,
            render_state: self.render_state,
            stencil_ref: self.stencil_ref,
            vertex_offset: self.vertex_offset,
            first_index,
            indices,
            vertices,
            textures: self.textures,
            constants: self.constants.clone(),
        });
        self.commands.push(Command::DrawIndexed {
            first_index,
            index_count,
        });
        Ok(())
    }

    fn begin_render(&mut self, offscreen: bool) {
        self.in_frame = true;
        self.commands.push(Command::BeginRender { offscreen });
    }

    fn end_render(&mut self) -> Result<(), DeviceError> {
        self.in_frame = false;
        self.commands.push(Command::EndRender);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        if std::mem::take(&mut self.fail_flush) {
            return Err(DeviceError::Backend("flush rejected".into()));
        }
        self.flushes += 1;
        self.commands.push(Command::Flush);
        Ok(())
    }
}
