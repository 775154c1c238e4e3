//! wgpu implementation of [`RenderBackend`](crate::backend::RenderBackend).
//!
//! Shader sources come from a [`ShaderLibrary`]: [`BuiltinShaders`] generates
//! WGSL for every permutation, [`DirectoryShaders`] loads prebuilt files.

mod arena;
mod backend;
mod bindings;
mod builtin;
mod pipeline;
mod shaders;

pub use backend::{WgpuBackend, WgpuBackendConfig, WgpuBinding, WgpuPipeline, WgpuResources, WgpuTexture};
pub use builtin::{BuiltinShaders, fragment_wgsl, vertex_wgsl};
pub use shaders::{DirectoryShaders, ShaderLibrary, ShaderStage};
