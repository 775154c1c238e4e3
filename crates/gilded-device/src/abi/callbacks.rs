use std::ffi::c_void;
use std::ptr;

use log::error;

use crate::backend::RenderBackend;
use crate::device::RenderDevice;
use crate::error::DeviceError;
use crate::texture::{TextureDesc, TextureFormat, TextureHandle, TextureRegion};

use super::raw::RawBatch;

pub type DrawBatchFn = unsafe extern "C" fn(user_data: *mut c_void, batch: *const RawBatch);
pub type MapFn = unsafe extern "C" fn(user_data: *mut c_void, bytes: u32) -> *mut c_void;
pub type UnmapFn = unsafe extern "C" fn(user_data: *mut c_void);
/// `data` is null or points to one pointer per mip level. Returns 0 on failure.
pub type CreateTextureFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    width: u32,
    height: u32,
    num_levels: u32,
    format: u8,
    data: *const *const c_void,
) -> u64;
pub type TextureSizeFn = unsafe extern "C" fn(user_data: *mut c_void, texture: u64) -> u32;
pub type TextureFlagFn = unsafe extern "C" fn(user_data: *mut c_void, texture: u64) -> bool;
pub type UpdateTextureFn = unsafe extern "C" fn(
    user_data: *mut c_void,
    texture: u64,
    level: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    data: *const c_void,
) -> bool;

/// Callback table handed to the UI library.
///
/// Every function takes `user_data` as its first argument. Failures are
/// logged and reported as a null pointer, 0 or `false`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct RenderCallbacks {
    pub user_data: *mut c_void,
    pub draw_batch: DrawBatchFn,
    pub map_vertices: MapFn,
    pub unmap_vertices: UnmapFn,
    pub map_indices: MapFn,
    pub unmap_indices: UnmapFn,
    pub create_texture: CreateTextureFn,
    pub get_width: TextureSizeFn,
    pub get_height: TextureSizeFn,
    pub has_mipmaps: TextureFlagFn,
    pub is_inverted: TextureFlagFn,
    pub update_texture: UpdateTextureFn,
}

impl RenderCallbacks {
    /// Builds a table that forwards to `device`.
    ///
    /// The table stores a raw pointer: `device` must stay in place and must not
    /// be used through any other path while a callback runs. Callbacks must be
    /// invoked from the thread that owns the device.
    pub fn new<B: RenderBackend>(device: &mut RenderDevice<B>) -> Self {
        Self {
            user_data: (device as *mut RenderDevice<B>).cast(),
            draw_batch: draw_batch::<B>,
            map_vertices: map_vertices::<B>,
            unmap_vertices: unmap_vertices::<B>,
            map_indices: map_indices::<B>,
            unmap_indices: unmap_indices::<B>,
            create_texture: create_texture::<B>,
            get_width: get_width::<B>,
            get_height: get_height::<B>,
            has_mipmaps: has_mipmaps::<B>,
            is_inverted: is_inverted::<B>,
            update_texture: update_texture::<B>,
        }
    }
}

/// # Safety
///
/// `user_data` comes from [`RenderCallbacks::new`] for a live device.
unsafe fn device<'a, B: RenderBackend>(user_data: *mut c_void) -> &'a mut RenderDevice<B> {
    // SAFETY: see above.
    unsafe { &mut *user_data.cast::<RenderDevice<B>>() }
}

fn report<T>(callback: &str, result: Result<T, DeviceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            error!("{callback}: {err}");
            None
        }
    }
}

fn handle(bits: u64) -> Result<TextureHandle, DeviceError> {
    TextureHandle::from_bits(bits).ok_or(DeviceError::NullTexture)
}

unsafe extern "C" fn draw_batch<B: RenderBackend>(user_data: *mut c_void, batch: *const RawBatch) {
    // SAFETY: the UI library passes a live device and a valid record whose
    // blocks outlive this call.
    let result = unsafe {
        let device = device::<B>(user_data);
        match batch.as_ref() {
            Some(raw) => raw.decode().and_then(|batch| device.draw_batch(&batch)),
            None => Err(DeviceError::Backend("null batch".into())),
        }
    };
    report("draw_batch", result);
}

unsafe extern "C" fn map_vertices<B: RenderBackend>(user_data: *mut c_void, bytes: u32) -> *mut c_void {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("map_vertices", device.map_vertices(bytes))
        .map_or(ptr::null_mut(), |region| region.as_mut_ptr().cast())
}

unsafe extern "C" fn unmap_vertices<B: RenderBackend>(user_data: *mut c_void) {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("unmap_vertices", device.unmap_vertices());
}

unsafe extern "C" fn map_indices<B: RenderBackend>(user_data: *mut c_void, bytes: u32) -> *mut c_void {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("map_indices", device.map_indices(bytes))
        .map_or(ptr::null_mut(), |region| region.as_mut_ptr().cast())
}

unsafe extern "C" fn unmap_indices<B: RenderBackend>(user_data: *mut c_void) {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("unmap_indices", device.unmap_indices());
}

unsafe extern "C" fn create_texture<B: RenderBackend>(
    user_data: *mut c_void,
    width: u32,
    height: u32,
    num_levels: u32,
    format: u8,
    data: *const *const c_void,
) -> u64 {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };

    let result = TextureFormat::try_from(format).and_then(|format| {
        let desc = TextureDesc::new(width, height, num_levels, format);
        if data.is_null() {
            return device.create_texture(desc, None);
        }
        device.validate_texture(&desc)?;
        // SAFETY: the library provides one tightly packed level per pointer.
        let levels: Vec<&[u8]> = unsafe {
            (0..desc.mip_levels)
                .map(|level| {
                    let level_ptr = *data.add(level as usize);
                    if level_ptr.is_null() {
                        return Err(DeviceError::InvalidTextureData {
                            level,
                            expected: desc.level_bytes(level),
                            actual: 0,
                        });
                    }
                    Ok(std::slice::from_raw_parts(level_ptr.cast::<u8>(), desc.level_bytes(level)))
                })
                .collect::<Result<_, _>>()?
        };
        device.create_texture(desc, Some(levels.as_slice()))
    });

    report("create_texture", result).map_or(0, TextureHandle::to_bits)
}

unsafe extern "C" fn get_width<B: RenderBackend>(user_data: *mut c_void, texture: u64) -> u32 {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("get_width", handle(texture).and_then(|h| device.texture_width(h))).unwrap_or(0)
}

unsafe extern "C" fn get_height<B: RenderBackend>(user_data: *mut c_void, texture: u64) -> u32 {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("get_height", handle(texture).and_then(|h| device.texture_height(h))).unwrap_or(0)
}

unsafe extern "C" fn has_mipmaps<B: RenderBackend>(user_data: *mut c_void, texture: u64) -> bool {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("has_mipmaps", handle(texture).and_then(|h| device.texture_has_mipmaps(h))).unwrap_or(false)
}

unsafe extern "C" fn is_inverted<B: RenderBackend>(user_data: *mut c_void, texture: u64) -> bool {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    report("is_inverted", handle(texture).and_then(|h| device.texture_is_inverted(h))).unwrap_or(false)
}

unsafe extern "C" fn update_texture<B: RenderBackend>(
    user_data: *mut c_void,
    texture: u64,
    level: u32,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    data: *const c_void,
) -> bool {
    // SAFETY: live device.
    let device = unsafe { device::<B>(user_data) };
    let region = TextureRegion::new(x, y, width, height);

    let result = handle(texture).and_then(|handle| {
        let format = device.texture_desc(handle)?.format;
        if data.is_null() {
            return Err(DeviceError::InvalidTextureData {
                level,
                expected: region.byte_len(format),
                actual: 0,
            });
        }
        // SAFETY: the library provides a tightly packed region.
        let bytes = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), region.byte_len(format)) };
        device.update_texture(handle, level, region, bytes)
    });

    report("update_texture", result).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::batch::{Batch, BoundTexture, SamplerState, TextureSlot};
    use crate::device::DeviceConfig;
    use crate::shader::ShaderId;

    fn device() -> RenderDevice<HeadlessBackend> {
        RenderDevice::new(HeadlessBackend::new(), DeviceConfig::default()).unwrap()
    }

    /// Copies `bytes` through a map/unmap callback pair.
    unsafe fn upload(callbacks: &RenderCallbacks, map: MapFn, unmap: UnmapFn, bytes: &[u8]) {
        unsafe {
            let dst = map(callbacks.user_data, bytes.len() as u32).cast::<u8>();
            assert!(!dst.is_null());
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            unmap(callbacks.user_data);
        }
    }

    #[test]
    fn frame_through_callbacks() {
        let mut device = device();
        let callbacks = RenderCallbacks::new(&mut device);

        let texels = [255u8; 2 * 2 * 4];
        let levels = [texels.as_ptr().cast::<c_void>()];
        let positions: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let uvs: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
        let mut vertices: Vec<u8> = Vec::new();
        for i in 0..4 {
            vertices.extend_from_slice(bytemuck::cast_slice(&positions[i * 2..i * 2 + 2]));
            vertices.extend_from_slice(&[255, 255, 255, 255]);
            vertices.extend_from_slice(bytemuck::cast_slice(&uvs[i * 2..i * 2 + 2]));
        }
        let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

        let texture = unsafe {
            (callbacks.create_texture)(callbacks.user_data, 2, 2, 1, 0, levels.as_ptr())
        };
        assert_ne!(texture, 0);
        assert_eq!(unsafe { (callbacks.get_width)(callbacks.user_data, texture) }, 2);

        let handle = TextureHandle::from_bits(texture).unwrap();
        let batch = Batch::new(ShaderId::ImageOpacitySolid, 4, 6)
            .with_texture(TextureSlot::Image, BoundTexture::new(handle, SamplerState::default()))
            .with_opacity(1.0, 5);
        let raw = RawBatch::from(&batch);

        unsafe {
            upload(&callbacks, callbacks.map_vertices, callbacks.unmap_vertices, &vertices);
            upload(
                &callbacks,
                callbacks.map_indices,
                callbacks.unmap_indices,
                bytemuck::cast_slice(&indices),
            );
            (callbacks.draw_batch)(callbacks.user_data, &raw);
        }

        let draw = &device.backend().draws()[0];
        assert_eq!(draw.shader, ShaderId::ImageOpacitySolid);
        assert_eq!(draw.indices, indices.to_vec());
        assert_eq!(draw.vertices, vertices);
        assert!(draw.textures[TextureSlot::Image.index()].is_some());
    }

    #[test]
    fn failures_map_to_sentinels() {
        let mut device = device();
        let callbacks = RenderCallbacks::new(&mut device);
        unsafe {
            assert_eq!((callbacks.get_width)(callbacks.user_data, 0), 0);
            assert_eq!((callbacks.get_height)(callbacks.user_data, 99), 0);
            assert!(!(callbacks.has_mipmaps)(callbacks.user_data, 99));
            assert!((callbacks.map_vertices)(callbacks.user_data, u32::MAX).is_null());
            // Unknown format.
            assert_eq!(
                (callbacks.create_texture)(callbacks.user_data, 4, 4, 1, 9, ptr::null()),
                0
            );

            // More levels than the mip chain has; the level table is never read.
            let texels = [0u8; 64];
            let levels = [texels.as_ptr().cast::<c_void>()];
            assert_eq!(
                (callbacks.create_texture)(callbacks.user_data, 4, 4, 40, 0, levels.as_ptr()),
                0
            );

            // Null level pointer.
            let levels = [texels.as_ptr().cast::<c_void>(), ptr::null()];
            assert_eq!(
                (callbacks.create_texture)(callbacks.user_data, 4, 4, 2, 0, levels.as_ptr()),
                0
            );
        }
        assert_eq!(device.texture_count(), 0);
    }

    #[test]
    fn update_texture_through_callbacks() {
        let mut device = device();
        let callbacks = RenderCallbacks::new(&mut device);
        let row = [7u8; 4];
        unsafe {
            let texture = (callbacks.create_texture)(callbacks.user_data, 4, 4, 3, 2, ptr::null());
            assert!((callbacks.has_mipmaps)(callbacks.user_data, texture));
            assert!(!(callbacks.is_inverted)(callbacks.user_data, texture));
            assert!((callbacks.update_texture)(
                callbacks.user_data,
                texture,
                0,
                0,
                1,
                4,
                1,
                row.as_ptr().cast()
            ));
            assert!(!(callbacks.update_texture)(
                callbacks.user_data,
                texture,
                0,
                2,
                0,
                4,
                1,
                row.as_ptr().cast()
            ));
        }
    }
}
