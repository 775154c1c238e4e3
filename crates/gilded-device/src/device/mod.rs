//! The render device: batch dispatch, dynamic buffers and textures.

mod config;
mod constants;
mod dynamic;
mod render_device;
mod stats;

pub use config::{DYNAMIC_IB_SIZE, DYNAMIC_VB_SIZE, DeviceCaps, DeviceConfig};
pub use render_device::RenderDevice;
pub use stats::DeviceStats;
