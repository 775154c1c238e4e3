/// Default capacity of the dynamic vertex ring, in bytes.
pub const DYNAMIC_VB_SIZE: u32 = 512 * 1024;
/// Default capacity of the dynamic index ring, in bytes.
pub const DYNAMIC_IB_SIZE: u32 = 128 * 1024;

/// Capabilities reported to the UI library.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeviceCaps {
    /// Offset added to pixel centers by the rasterizer (0.5 on some APIs).
    pub center_pixel_offset: f32,
    /// Render targets and textures are in linear space.
    pub linear_rendering: bool,
    /// Subpixel (LCD) glyph rendering is available.
    pub subpixel_rendering: bool,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            center_pixel_offset: 0.0,
            linear_rendering: false,
            subpixel_rendering: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Capacity of the vertex ring. Rounded up to a multiple of 4.
    pub vertex_buffer_size: u32,
    /// Capacity of the index ring. Rounded up to a multiple of 4.
    pub index_buffer_size: u32,
    pub caps: DeviceCaps,
    /// Render targets are stored bottom-up.
    pub flipped_textures: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vertex_buffer_size: DYNAMIC_VB_SIZE,
            index_buffer_size: DYNAMIC_IB_SIZE,
            caps: DeviceCaps::default(),
            flipped_textures: false,
        }
    }
}
