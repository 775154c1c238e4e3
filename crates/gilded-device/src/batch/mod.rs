//! Structured batch record.
//!
//! A [`Batch`] borrows its parameter blocks from the caller and is consumed by
//! [`RenderDevice::draw_batch`](crate::RenderDevice::draw_batch) before the
//! call returns.

mod state;

pub use state::{BlendMode, MinMagFilter, MipFilter, RenderState, SamplerState, StencilMode, WrapMode};

use crate::shader::ShaderId;
use crate::texture::TextureHandle;

/// Texture slot of a batch, in binding order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum TextureSlot {
    Pattern,
    Ramps,
    Image,
    Glyphs,
    Shadow,
}

impl TextureSlot {
    pub const COUNT: usize = 5;

    pub const ALL: [TextureSlot; Self::COUNT] = [
        TextureSlot::Pattern,
        TextureSlot::Ramps,
        TextureSlot::Image,
        TextureSlot::Glyphs,
        TextureSlot::Shadow,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            TextureSlot::Pattern => "pattern",
            TextureSlot::Ramps => "ramps",
            TextureSlot::Image => "image",
            TextureSlot::Glyphs => "glyphs",
            TextureSlot::Shadow => "shadow",
        }
    }
}

/// A texture bound to one slot of a batch.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BoundTexture {
    pub handle: TextureHandle,
    pub sampler: SamplerState,
}

impl BoundTexture {
    pub const fn new(handle: TextureHandle, sampler: SamplerState) -> Self {
        Self { handle, sampler }
    }
}

/// A parameter block together with the content hash computed by the UI library.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hashed<T> {
    pub value: T,
    pub hash: u32,
}

impl<T> Hashed<T> {
    pub const fn new(value: T, hash: u32) -> Self {
        Self { value, hash }
    }
}

/// One draw request.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<'a> {
    pub shader: ShaderId,
    pub render_state: RenderState,
    pub stencil_ref: u8,

    /// Byte offset of the first vertex, relative to the last mapped vertex region.
    pub vertex_offset: u32,
    pub num_vertices: u32,
    /// First index, relative to the last mapped index region.
    pub start_index: u32,
    pub num_indices: u32,

    pub textures: [Option<BoundTexture>; TextureSlot::COUNT],

    /// Up to 16 floats.
    pub effect_params: Option<Hashed<&'a [f32]>>,
    /// Row-major 4x4 projection.
    pub proj_mtx: Option<Hashed<&'a [f32; 16]>>,
    pub opacity: Option<Hashed<f32>>,
    pub rgba: Option<Hashed<&'a [f32; 4]>>,
    pub radial_grad: Option<Hashed<&'a [f32; 8]>>,
}

impl<'a> Batch<'a> {
    /// A batch drawing `num_indices` indices with no textures or parameters.
    pub fn new(shader: ShaderId, num_vertices: u32, num_indices: u32) -> Self {
        Self {
            shader,
            render_state: RenderState::default(),
            stencil_ref: 0,
            vertex_offset: 0,
            num_vertices,
            start_index: 0,
            num_indices,
            textures: [None; TextureSlot::COUNT],
            effect_params: None,
            proj_mtx: None,
            opacity: None,
            rgba: None,
            radial_grad: None,
        }
    }

    #[inline]
    pub fn texture(&self, slot: TextureSlot) -> Option<BoundTexture> {
        self.textures[slot.index()]
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: BoundTexture) -> Self {
        self.textures[slot.index()] = Some(texture);
        self
    }

    pub fn with_projection(mut self, mtx: &'a [f32; 16], hash: u32) -> Self {
        self.proj_mtx = Some(Hashed::new(mtx, hash));
        self
    }

    pub fn with_rgba(mut self, rgba: &'a [f32; 4], hash: u32) -> Self {
        self.rgba = Some(Hashed::new(rgba, hash));
        self
    }

    pub fn with_radial_grad(mut self, grad: &'a [f32; 8], hash: u32) -> Self {
        self.radial_grad = Some(Hashed::new(grad, hash));
        self
    }

    pub fn with_opacity(mut self, opacity: f32, hash: u32) -> Self {
        self.opacity = Some(Hashed::new(opacity, hash));
        self
    }

    pub fn with_effect_params(mut self, params: &'a [f32], hash: u32) -> Self {
        self.effect_params = Some(Hashed::new(params, hash));
        self
    }

    /// True when any of the pixel-constant blocks is present.
    pub fn has_pixel_constants(&self) -> bool {
        self.rgba.is_some() || self.radial_grad.is_some() || self.opacity.is_some()
    }

    /// Combined pixel-constant hash; absent blocks contribute zero.
    pub fn pixel_hash(&self) -> u32 {
        self.rgba.map_or(0, |h| h.hash)
            ^ self.radial_grad.map_or(0, |h| h.hash)
            ^ self.opacity.map_or(0, |h| h.hash)
    }

    /// Texture whose size feeds the texture-dimension constants: glyphs, else image.
    pub fn dimension_texture(&self) -> Option<BoundTexture> {
        self.texture(TextureSlot::Glyphs)
            .or_else(|| self.texture(TextureSlot::Image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(index: u32) -> TextureHandle {
        TextureHandle { index, generation: 0 }
    }

    #[test]
    fn pixel_hash_xors_present_blocks() {
        let rgba = [1.0; 4];
        let batch = Batch::new(ShaderId::Rgba, 4, 6)
            .with_rgba(&rgba, 0b1100)
            .with_opacity(0.5, 0b1010);
        assert!(batch.has_pixel_constants());
        assert_eq!(batch.pixel_hash(), 0b0110);
    }

    #[test]
    fn bare_batch_has_no_pixel_constants() {
        let batch = Batch::new(ShaderId::PathSolid, 3, 3);
        assert!(!batch.has_pixel_constants());
        assert_eq!(batch.pixel_hash(), 0);
        assert!(batch.textures.iter().all(Option::is_none));
    }

    #[test]
    fn glyphs_take_priority_for_dimensions() {
        let sampler = SamplerState::default();
        let batch = Batch::new(ShaderId::SdfSolid, 4, 6)
            .with_texture(TextureSlot::Image, BoundTexture::new(handle(1), sampler))
            .with_texture(TextureSlot::Glyphs, BoundTexture::new(handle(2), sampler));
        assert_eq!(batch.dimension_texture().map(|t| t.handle), Some(handle(2)));

        let image_only = Batch::new(ShaderId::ImageOpacitySolid, 4, 6)
            .with_texture(TextureSlot::Image, BoundTexture::new(handle(1), sampler));
        assert_eq!(image_only.dimension_texture().map(|t| t.handle), Some(handle(1)));
    }

    #[test]
    fn slot_indices_follow_binding_order() {
        for (i, slot) in TextureSlot::ALL.iter().enumerate() {
            assert_eq!(slot.index(), i);
        }
    }
}
