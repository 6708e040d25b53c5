//! WGSL sources and validated shader compilation.
//!
//! Every pipeline compiles its shader through [`compile`], which runs module
//! creation inside a wgpu validation scope. A shader that fails to compile is
//! a hard error carrying the full diagnostic; nothing is drawn with it.

use std::path::Path;

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

pub const SCENE_WGSL: &str = include_str!("shaders/scene.wgsl");
pub const SKYBOX_WGSL: &str = include_str!("shaders/skybox.wgsl");
pub const POST_PROCESS_WGSL: &str = include_str!("shaders/post_process.wgsl");

/// The WGSL text for each pipeline.
///
/// Defaults are the shaders embedded in the crate. Custom sources must keep
/// the same bindings and entry points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub scene: String,
    pub skybox: String,
    pub post_process: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            scene: SCENE_WGSL.to_string(),
            skybox: SKYBOX_WGSL.to_string(),
            post_process: POST_PROCESS_WGSL.to_string(),
        }
    }
}

impl ShaderSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `scene.wgsl`, `skybox.wgsl` and `post_process.wgsl` from `dir`.
    ///
    /// Files that do not exist keep the embedded default.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut sources = Self::default();
        for (file, slot) in [
            ("scene.wgsl", &mut sources.scene),
            ("skybox.wgsl", &mut sources.skybox),
            ("post_process.wgsl", &mut sources.post_process),
        ] {
            let path = dir.join(file);
            if path.is_file() {
                *slot = std::fs::read_to_string(&path)?;
                log::info!("using shader override {}", path.display());
            }
        }
        Ok(sources)
    }

    pub fn scene(mut self, source: impl Into<String>) -> Self {
        self.scene = source.into();
        self
    }

    pub fn skybox(mut self, source: impl Into<String>) -> Self {
        self.skybox = source.into();
        self
    }

    pub fn post_process(mut self, source: impl Into<String>) -> Self {
        self.post_process = source.into();
        self
    }
}

/// Compile WGSL into a shader module.
///
/// An empty source is rejected before it reaches the device. Compile errors
/// are logged in full and returned as [`Error::ShaderCompile`].
pub fn compile(gpu: &GpuContext, label: &str, source: &str) -> Result<wgpu::ShaderModule> {
    if source.trim().is_empty() {
        log::error!("shader `{label}` has no source");
        return Err(Error::EmptyShaderSource {
            label: label.to_string(),
        });
    }

    gpu.validated(|device| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    })
    .map_err(|diagnostic| {
        log::error!("shader `{label}` failed to compile:\n{diagnostic}");
        Error::ShaderCompile {
            label: label.to_string(),
            diagnostic,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(source: &str) -> naga::Module {
        let module = naga::front::wgsl::parse_str(source).unwrap();
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .unwrap();
        module
    }

    fn entry_points(module: &naga::Module) -> Vec<(&str, naga::ShaderStage)> {
        module
            .entry_points
            .iter()
            .map(|ep| (ep.name.as_str(), ep.stage))
            .collect()
    }

    #[test]
    fn scene_shader_validates() {
        let module = validate(SCENE_WGSL);
        let eps = entry_points(&module);
        for (name, stage) in [
            ("vs_colored", naga::ShaderStage::Vertex),
            ("fs_colored", naga::ShaderStage::Fragment),
            ("vs_textured", naga::ShaderStage::Vertex),
            ("fs_textured", naga::ShaderStage::Fragment),
        ] {
            assert!(eps.contains(&(name, stage)), "missing {name}");
        }
    }

    #[test]
    fn skybox_shader_validates() {
        let module = validate(SKYBOX_WGSL);
        let eps = entry_points(&module);
        assert!(eps.contains(&("vs_main", naga::ShaderStage::Vertex)));
        assert!(eps.contains(&("fs_main", naga::ShaderStage::Fragment)));
    }

    #[test]
    fn post_process_shader_has_every_effect() {
        let module = validate(POST_PROCESS_WGSL);
        let eps = entry_points(&module);
        assert!(eps.contains(&("vs_main", naga::ShaderStage::Vertex)));
        for effect in crate::pipeline::PostEffect::ALL {
            assert!(
                eps.contains(&(effect.entry_point(), naga::ShaderStage::Fragment)),
                "missing {}",
                effect.entry_point()
            );
        }
    }

    #[test]
    fn missing_override_dir_keeps_defaults() {
        let dir = std::env::temp_dir().join("meshview-no-shader-overrides");
        assert_eq!(ShaderSources::from_dir(dir).unwrap(), ShaderSources::default());
    }
}
