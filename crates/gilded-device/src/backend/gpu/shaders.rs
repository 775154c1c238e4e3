use std::fs;
use std::path::PathBuf;

use crate::error::DeviceError;
use crate::shader::ShaderId;

/// Pipeline stage of a shader source.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Source key of `shader` for this stage.
    pub fn key(self, shader: ShaderId) -> String {
        match self {
            ShaderStage::Vertex => shader.vertex_shader_key(),
            ShaderStage::Fragment => shader.fragment_shader_key(),
        }
    }

    pub const fn entry_point(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }
}

/// Source of WGSL modules for the shader permutations.
///
/// Every module must declare the shared bind groups (see [`BuiltinShaders`])
/// and export `vs_main` or `fs_main`. Modules are cached per key, so
/// permutations sharing a vertex key load it once.
///
/// [`BuiltinShaders`]: super::BuiltinShaders
pub trait ShaderLibrary {
    fn source(&self, shader: ShaderId, stage: ShaderStage) -> Result<String, DeviceError>;
}

/// Loads `<root>/<key>.wgsl`, e.g. `shaders/Path_Solid_FS.wgsl`.
#[derive(Debug, Clone)]
pub struct DirectoryShaders {
    root: PathBuf,
}

impl DirectoryShaders {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.wgsl"))
    }
}

impl ShaderLibrary for DirectoryShaders {
    fn source(&self, shader: ShaderId, stage: ShaderStage) -> Result<String, DeviceError> {
        let key = stage.key(shader);
        fs::read_to_string(self.path(&key)).map_err(|source| DeviceError::ShaderSource { key, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_keys() {
        assert_eq!(ShaderStage::Vertex.key(ShaderId::PathSolid), "PosColor_VS");
        assert_eq!(ShaderStage::Fragment.key(ShaderId::PathSolid), "Path_Solid_FS");
    }

    #[test]
    fn directory_paths() {
        let shaders = DirectoryShaders::new("assets/shaders");
        assert_eq!(
            shaders.path("Mask_FS"),
            PathBuf::from("assets/shaders").join("Mask_FS.wgsl")
        );
    }

    #[test]
    fn missing_source_reports_key() {
        let shaders = DirectoryShaders::new("/nonexistent/gilded");
        match shaders.source(ShaderId::Mask, ShaderStage::Fragment) {
            Err(DeviceError::ShaderSource { key, .. }) => assert_eq!(key, "Mask_FS"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
