use glam::Mat4;

use crate::backend::ConstantBuffer;
use crate::batch::Batch;

/// Last uploaded content hash per constant buffer.
///
/// Starts empty so the first batch carrying a block always uploads it.
#[derive(Debug, Default)]
pub(crate) struct ConstantCache {
    hashes: [Option<u32>; ConstantBuffer::COUNT],
}

impl ConstantCache {
    /// True when `hash` is not the last one committed for `buffer`.
    #[inline]
    pub fn differs(&self, buffer: ConstantBuffer, hash: u32) -> bool {
        self.hashes[buffer.index()] != Some(hash)
    }

    /// Records `hash` as uploaded. Call only once the upload succeeded.
    #[inline]
    pub fn commit(&mut self, buffer: ConstantBuffer, hash: u32) {
        self.hashes[buffer.index()] = Some(hash);
    }
}

/// Row-major projection to the column-major layout the shaders read.
pub(crate) fn transpose(mtx: &[f32; 16]) -> [f32; 16] {
    Mat4::from_cols_array(mtx).transpose().to_cols_array()
}

/// Packs rgba, radial gradient and opacity, in that order, into the pixel
/// constant block. Returns the number of floats written and whether any
/// present value had to be dropped.
pub(crate) fn pack_pixel(batch: &Batch<'_>, out: &mut [f32; 12]) -> (usize, bool) {
    let mut len = 0;
    let mut truncated = false;

    let mut push = |values: &[f32]| {
        let room = out.len() - len;
        let n = values.len().min(room);
        out[len..len + n].copy_from_slice(&values[..n]);
        len += n;
        truncated |= n < values.len();
    };

    if let Some(rgba) = batch.rgba {
        push(rgba.value);
    }
    if let Some(grad) = batch.radial_grad {
        push(grad.value);
    }
    if let Some(opacity) = batch.opacity {
        push(&[opacity.value]);
    }

    (len, truncated)
}

/// Packed size hash of the texture-dimension constants.
#[inline]
pub(crate) fn dims_hash(width: u32, height: u32) -> u32 {
    (width << 16) | (height & 0xffff)
}

pub(crate) fn tex_dims(width: u32, height: u32) -> [f32; 4] {
    let (w, h) = (width as f32, height as f32);
    [w, h, 1.0 / w, 1.0 / h]
}
