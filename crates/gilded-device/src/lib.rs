//! Gilded render device.
//!
//! This crate adapts the batch callbacks of an external vector-graphics UI
//! library onto a GPU backend. The library owns tessellation and shading
//! decisions; this crate owns pipelines, buffers, constant uploads and textures.

pub mod abi;
pub mod backend;
pub mod batch;
pub mod device;
pub mod error;
pub mod logging;
pub mod shader;
pub mod texture;

pub use batch::Batch;
pub use device::{DeviceCaps, DeviceConfig, DeviceStats, RenderDevice};
pub use error::DeviceError;
pub use shader::ShaderId;
pub use texture::{TextureDesc, TextureFormat, TextureHandle};
