use std::fmt;

use crate::texture::{TextureHandle, TextureRegion};

/// Which dynamic buffer an error refers to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferKind {
    Vertices,
    Indices,
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferKind::Vertices => f.write_str("vertex buffer"),
            BufferKind::Indices => f.write_str("index buffer"),
        }
    }
}

/// Errors reported by the render device and its backends.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The operation exists in the callback surface but this device does not implement it.
    #[error("operation not supported by this render device: {0}")]
    Unsupported(&'static str),

    #[error("{buffer} map of {requested} bytes exceeds its capacity of {capacity} bytes")]
    MapOverflow {
        buffer: BufferKind,
        requested: u32,
        capacity: u32,
    },

    #[error("{0} is already mapped")]
    AlreadyMapped(BufferKind),

    #[error("{0} is not mapped")]
    NotMapped(BufferKind),

    /// A batch was submitted while vertex or index data was still mapped.
    #[error("draw issued while a dynamic buffer is still mapped")]
    BufferMapped,

    #[error("null texture handle")]
    NullTexture,

    #[error("unknown or destroyed texture {0:?}")]
    InvalidTexture(TextureHandle),

    #[error("shader id {0} is outside the shader table")]
    UnknownShader(u8),

    #[error("texture format id {0} is not recognised")]
    UnknownTextureFormat(u8),

    #[error("texture data for level {level} holds {actual} bytes, expected {expected}")]
    InvalidTextureData {
        level: u32,
        expected: usize,
        actual: usize,
    },

    #[error("texture of {width}x{height} with {mip_levels} level(s) exceeds the device limit of {max_dimension} or its mip chain")]
    InvalidTextureSize {
        width: u32,
        height: u32,
        mip_levels: u32,
        max_dimension: u32,
    },

    #[error("region {region:?} lies outside mip level {level}")]
    InvalidRegion { level: u32, region: TextureRegion },

    #[error("failed to load shader source '{key}'")]
    ShaderSource {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backend failure: {0}")]
    Backend(String),
}
