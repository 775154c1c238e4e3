//! Graphics backend seam.
//!
//! [`RenderDevice`](crate::RenderDevice) owns all bookkeeping (hash caches,
//! ring cursors, texture registry) and drives a [`RenderBackend`] with the
//! resulting state changes and draws.

pub mod gpu;
mod headless;

pub use headless::{Command, DrawRecord, HeadlessBackend, HeadlessBinding, HeadlessPipeline, HeadlessTexture};

use crate::batch::{RenderState, SamplerState, TextureSlot};
use crate::error::DeviceError;
use crate::shader::{ShaderId, VertexLayout};
use crate::texture::{TextureDesc, TextureRegion};

/// Constant buffers a batch can update.
///
///  Buffer    Stage      Size (bytes)  Contents
///  ----------------------------------------------------------------
///  Vertex    vertex     64            projection (column-major)
///  TexDims   vertex     16            width, height, 1/width, 1/height
///  Pixel     fragment   48            rgba | radial gradient | opacity
///  Effect    fragment   64            effect parameters
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConstantBuffer {
    Vertex,
    TexDims,
    Pixel,
    Effect,
}

impl ConstantBuffer {
    pub const COUNT: usize = 4;

    pub const ALL: [ConstantBuffer; Self::COUNT] = [
        ConstantBuffer::Vertex,
        ConstantBuffer::TexDims,
        ConstantBuffer::Pixel,
        ConstantBuffer::Effect,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Capacity in floats.
    pub const fn floats(self) -> usize {
        match self {
            ConstantBuffer::Vertex => 16,
            ConstantBuffer::TexDims => 4,
            ConstantBuffer::Pixel => 12,
            ConstantBuffer::Effect => 16,
        }
    }

    /// Capacity in bytes.
    #[inline]
    pub const fn size(self) -> usize {
        self.floats() * 4
    }
}

/// Operations the render device needs from a graphics API.
///
/// Calls arrive in draw order. A backend may defer GPU work until
/// [`flush`](Self::flush) or [`end_render`](Self::end_render), but must apply
/// state and data in the order it was received.
pub trait RenderBackend {
    /// Pipeline for one shader permutation.
    type Pipeline;
    /// Per-shader resource layout.
    type ResourceSet;
    type Texture;
    /// A texture prepared for one slot with one sampler state.
    type TextureBinding: Clone;

    fn create_pipeline(
        &mut self,
        shader: ShaderId,
        layout: &VertexLayout,
    ) -> Result<Self::Pipeline, DeviceError>;

    fn create_resource_set(&mut self, shader: ShaderId) -> Result<Self::ResourceSet, DeviceError>;

    /// Allocates the dynamic vertex and index buffers. Called once, before any write.
    fn create_buffers(&mut self, vertex_capacity: u64, index_capacity: u64) -> Result<(), DeviceError>;

    fn set_pipeline(&mut self, pipeline: &Self::Pipeline, resources: &Self::ResourceSet);

    fn set_render_state(&mut self, state: RenderState, stencil_ref: u8);

    /// Binds the index buffer and the vertex buffer at `vertex_offset` bytes.
    fn set_buffers(&mut self, vertex_offset: u64);

    /// `data` never exceeds [`ConstantBuffer::floats`].
    fn update_constants(&mut self, buffer: ConstantBuffer, data: &[f32]) -> Result<(), DeviceError>;

    fn write_vertices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    fn write_indices(&mut self, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    /// `levels`, when present, holds one tightly packed slice per mip level.
    fn create_texture(
        &mut self,
        desc: &TextureDesc,
        levels: Option<&[&[u8]]>,
    ) -> Result<Self::Texture, DeviceError>;

    fn update_texture(
        &mut self,
        texture: &Self::Texture,
        desc: &TextureDesc,
        level: u32,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), DeviceError>;

    fn destroy_texture(&mut self, texture: Self::Texture);

    /// Largest width or height `create_texture` accepts.
    fn max_texture_dimension(&self) -> u32 {
        u32::MAX
    }

    fn create_texture_binding(
        &mut self,
        texture: &Self::Texture,
        slot: TextureSlot,
        sampler: SamplerState,
    ) -> Result<Self::TextureBinding, DeviceError>;

    /// Binds `binding` to `slot`, or clears the slot.
    fn bind_texture(&mut self, slot: TextureSlot, binding: Option<&Self::TextureBinding>);

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) -> Result<(), DeviceError>;

    fn begin_render(&mut self, offscreen: bool);

    fn end_render(&mut self) -> Result<(), DeviceError>;

    /// Submits everything recorded so far. Called before ring buffers wrap.
    fn flush(&mut self) -> Result<(), DeviceError>;
}
