use std::ptr;

use crate::batch::{Batch, BoundTexture, Hashed, RenderState, SamplerState, TextureSlot};
use crate::error::DeviceError;
use crate::shader::ShaderId;
use crate::texture::TextureHandle;

/// Texture slot of a [`RawBatch`]. A zero handle means the slot is empty.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct RawTexture {
    pub handle: u64,
    pub sampler: u8,
    pub _pad: [u8; 7],
}

/// Batch record as laid out by the UI library.
///
///  Offset  Field
///  ------------------------------------------------
///  0       shader, render_state, stencil_ref (u8)
///  4       vertex_offset, num_vertices,
///          start_index, num_indices (u32)
///  24      textures[5] (16 bytes each)
///  104     effect_params ptr, size (floats), hash
///  120     proj_mtx ptr, hash
///  136     opacity ptr, hash
///  152     rgba ptr, hash
///  168     radial_grad ptr, hash
///
/// Offsets past 24 hold on 64-bit targets.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RawBatch {
    pub shader: u8,
    pub render_state: u8,
    pub stencil_ref: u8,
    pub _pad: u8,

    pub vertex_offset: u32,
    pub num_vertices: u32,
    pub start_index: u32,
    pub num_indices: u32,

    pub textures: [RawTexture; TextureSlot::COUNT],

    pub effect_params: *const f32,
    pub effect_params_size: u32,
    pub effect_params_hash: u32,

    pub proj_mtx: *const f32,
    pub proj_mtx_hash: u32,

    pub opacity: *const f32,
    pub opacity_hash: u32,

    pub rgba: *const f32,
    pub rgba_hash: u32,

    pub radial_grad: *const f32,
    pub radial_grad_hash: u32,
}

impl RawBatch {
    /// Decodes the record. An effect block with zero floats decodes as absent.
    ///
    /// # Safety
    ///
    /// Every non-null pointer must be valid for reads of its block
    /// (`effect_params_size`, 16, 1, 4 and 8 floats) for `'a`.
    pub unsafe fn decode<'a>(&self) -> Result<Batch<'a>, DeviceError> {
        let shader = ShaderId::try_from(self.shader)?;

        let mut textures = [None; TextureSlot::COUNT];
        for (bound, raw) in textures.iter_mut().zip(&self.textures) {
            *bound = TextureHandle::from_bits(raw.handle)
                .map(|handle| BoundTexture::new(handle, SamplerState::from_bits(raw.sampler)));
        }

        // SAFETY: forwarded from the caller.
        let (effect_params, proj_mtx, opacity, rgba, radial_grad) = unsafe {
            let present = !self.effect_params.is_null() && self.effect_params_size != 0;
            let effect_params = present.then(|| {
                let params = std::slice::from_raw_parts(self.effect_params, self.effect_params_size as usize);
                Hashed::new(params, self.effect_params_hash)
            });
            (
                effect_params,
                block::<16>(self.proj_mtx, self.proj_mtx_hash),
                self.opacity
                    .as_ref()
                    .map(|value| Hashed::new(*value, self.opacity_hash)),
                block::<4>(self.rgba, self.rgba_hash),
                block::<8>(self.radial_grad, self.radial_grad_hash),
            )
        };

        Ok(Batch {
            shader,
            render_state: RenderState::from_bits(self.render_state),
            stencil_ref: self.stencil_ref,
            vertex_offset: self.vertex_offset,
            num_vertices: self.num_vertices,
            start_index: self.start_index,
            num_indices: self.num_indices,
            textures,
            effect_params,
            proj_mtx,
            opacity,
            rgba,
            radial_grad,
        })
    }
}

/// # Safety
///
/// `ptr` is null or valid for reads of `N` floats for `'a`.
unsafe fn block<'a, const N: usize>(ptr: *const f32, hash: u32) -> Option<Hashed<&'a [f32; N]>> {
    // SAFETY: see above; `[f32; N]` has the alignment of `f32`.
    unsafe { ptr.cast::<[f32; N]>().as_ref() }.map(|value| Hashed::new(value, hash))
}

impl From<&Batch<'_>> for RawBatch {
    /// Encodes a batch the way the UI library would. The pointers borrow from
    /// `batch` and are only valid while its blocks are.
    fn from(batch: &Batch<'_>) -> Self {
        let mut textures = [RawTexture::default(); TextureSlot::COUNT];
        for (raw, bound) in textures.iter_mut().zip(&batch.textures) {
            if let Some(bound) = bound {
                raw.handle = bound.handle.to_bits();
                raw.sampler = bound.sampler.to_bits();
            }
        }

        let (effect_params, effect_params_size, effect_params_hash) = match batch.effect_params {
            Some(p) => (p.value.as_ptr(), p.value.len() as u32, p.hash),
            None => (ptr::null(), 0, 0),
        };
        let opacity = batch.opacity.as_ref();

        Self {
            shader: batch.shader as u8,
            render_state: batch.render_state.to_bits(),
            stencil_ref: batch.stencil_ref,
            _pad: 0,
            vertex_offset: batch.vertex_offset,
            num_vertices: batch.num_vertices,
            start_index: batch.start_index,
            num_indices: batch.num_indices,
            textures,
            effect_params,
            effect_params_size,
            effect_params_hash,
            proj_mtx: batch.proj_mtx.map_or(ptr::null(), |h| h.value.as_ptr()),
            proj_mtx_hash: batch.proj_mtx.map_or(0, |h| h.hash),
            opacity: opacity.map_or(ptr::null(), |h| &h.value as *const f32),
            opacity_hash: opacity.map_or(0, |h| h.hash),
            rgba: batch.rgba.map_or(ptr::null(), |h| h.value.as_ptr()),
            rgba_hash: batch.rgba.map_or(0, |h| h.hash),
            radial_grad: batch.radial_grad.map_or(ptr::null(), |h| h.value.as_ptr()),
            radial_grad_hash: batch.radial_grad.map_or(0, |h| h.hash),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    fn empty() -> RawBatch {
        RawBatch {
            shader: ShaderId::PathSolid as u8,
            render_state: 0b11,
            stencil_ref: 0,
            _pad: 0,
            vertex_offset: 0,
            num_vertices: 3,
            start_index: 0,
            num_indices: 3,
            textures: [RawTexture::default(); TextureSlot::COUNT],
            effect_params: ptr::null(),
            effect_params_size: 0,
            effect_params_hash: 0,
            proj_mtx: ptr::null(),
            proj_mtx_hash: 0,
            opacity: ptr::null(),
            opacity_hash: 0,
            rgba: ptr::null(),
            rgba_hash: 0,
            radial_grad: ptr::null(),
            radial_grad_hash: 0,
        }
    }

    #[test]
    fn header_offsets() {
        assert_eq!(offset_of!(RawBatch, shader), 0);
        assert_eq!(offset_of!(RawBatch, render_state), 1);
        assert_eq!(offset_of!(RawBatch, stencil_ref), 2);
        assert_eq!(offset_of!(RawBatch, vertex_offset), 4);
        assert_eq!(offset_of!(RawBatch, num_vertices), 8);
        assert_eq!(offset_of!(RawBatch, start_index), 12);
        assert_eq!(offset_of!(RawBatch, num_indices), 16);
        assert_eq!(offset_of!(RawBatch, textures), 24);
        assert_eq!(size_of::<RawTexture>(), 16);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn pointer_block_offsets() {
        assert_eq!(offset_of!(RawBatch, effect_params), 104);
        assert_eq!(offset_of!(RawBatch, effect_params_size), 112);
        assert_eq!(offset_of!(RawBatch, effect_params_hash), 116);
        assert_eq!(offset_of!(RawBatch, proj_mtx), 120);
        assert_eq!(offset_of!(RawBatch, proj_mtx_hash), 128);
        assert_eq!(offset_of!(RawBatch, opacity), 136);
        assert_eq!(offset_of!(RawBatch, opacity_hash), 144);
        assert_eq!(offset_of!(RawBatch, rgba), 152);
        assert_eq!(offset_of!(RawBatch, rgba_hash), 160);
        assert_eq!(offset_of!(RawBatch, radial_grad), 168);
        assert_eq!(offset_of!(RawBatch, radial_grad_hash), 176);
        assert_eq!(size_of::<RawBatch>(), 184);
    }

    #[test]
    fn nulls_decode_to_none() {
        let raw = empty();
        let batch = unsafe { raw.decode() }.unwrap();
        assert_eq!(batch.shader, ShaderId::PathSolid);
        assert_eq!(batch.render_state, RenderState::default());
        assert!(batch.textures.iter().all(Option::is_none));
        assert!(batch.effect_params.is_none());
        assert!(batch.proj_mtx.is_none());
        assert!(batch.opacity.is_none());
        assert!(batch.rgba.is_none());
        assert!(batch.radial_grad.is_none());
    }

    #[test]
    fn blocks_and_textures_decode() {
        let rgba = [0.25f32, 0.5, 0.75, 1.0];
        let params = [1.0f32, 2.0, 3.0];
        let opacity = 0.5f32;
        let handle = TextureHandle {
            index: 3,
            generation: 1,
        };

        let mut raw = empty();
        raw.rgba = rgba.as_ptr();
        raw.rgba_hash = 42;
        raw.effect_params = params.as_ptr();
        raw.effect_params_size = 3;
        raw.opacity = &opacity;
        raw.textures[TextureSlot::Image.index()] = RawTexture {
            handle: handle.to_bits(),
            sampler: 2 | (1 << 3),
            _pad: [0; 7],
        };

        let batch = unsafe { raw.decode() }.unwrap();
        assert_eq!(batch.rgba.map(|h| *h.value), Some(rgba));
        assert_eq!(batch.rgba.map(|h| h.hash), Some(42));
        assert_eq!(batch.effect_params.map(|h| h.value.len()), Some(3));
        assert_eq!(batch.opacity.map(|h| h.value), Some(0.5));

        let image = batch.texture(TextureSlot::Image).unwrap();
        assert_eq!(image.handle, handle);
        assert_eq!(image.sampler, SamplerState::from_bits(2 | (1 << 3)));
    }

    #[test]
    fn empty_effect_block_is_absent() {
        let params = [1.0f32; 4];
        let mut raw = empty();
        raw.effect_params = params.as_ptr();
        raw.effect_params_size = 0;
        raw.effect_params_hash = 9;

        let batch = unsafe { raw.decode() }.unwrap();
        assert!(batch.effect_params.is_none());
    }

    #[test]
    fn unknown_shader_is_rejected() {
        let mut raw = empty();
        raw.shader = ShaderId::COUNT as u8;
        assert!(matches!(
            unsafe { raw.decode() },
            Err(DeviceError::UnknownShader(52))
        ));
    }

    #[test]
    fn encoding_points_at_batch_blocks() {
        let proj = [2.0f32; 16];
        let batch = Batch::new(ShaderId::Rgba, 4, 6)
            .with_projection(&proj, 7)
            .with_opacity(0.75, 8);
        let raw = RawBatch::from(&batch);
        assert_eq!(raw.proj_mtx, proj.as_ptr());
        assert_eq!(raw.proj_mtx_hash, 7);
        assert!(raw.rgba.is_null());

        let decoded = unsafe { raw.decode() }.unwrap();
        assert_eq!(decoded, batch);
    }
}
