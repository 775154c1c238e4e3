use crate::backend::ConstantBuffer;

/// Counters accumulated over the lifetime of a render device.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct DeviceStats {
    pub frames: u64,
    pub batches: u64,
    /// Uploads per constant buffer, indexed by [`ConstantBuffer::index`].
    pub constant_uploads: [u64; ConstantBuffer::COUNT],
    /// Constant blocks present on a batch whose hash matched the cached one.
    pub skipped_uploads: u64,
    pub textures_created: u64,
    pub textures_destroyed: u64,
    pub vertex_wraps: u64,
    pub index_wraps: u64,
}

impl DeviceStats {
    #[inline]
    pub fn uploads(&self, buffer: ConstantBuffer) -> u64 {
        self.constant_uploads[buffer.index()]
    }

    pub fn total_uploads(&self) -> u64 {
        self.constant_uploads.iter().sum()
    }
}
