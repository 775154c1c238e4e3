//! Texture descriptions and the device-owned texture registry.

mod format;
mod store;

pub use format::{TextureDesc, TextureFormat, TextureRegion, TextureUsage};
pub use store::{TextureHandle, TextureRecord, TextureStore};
