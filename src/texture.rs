use std::collections::HashMap;
use std::path::{Path, PathBuf};

use wgpu::util::DeviceExt;

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// A 2D GPU texture that can be bound to shaders.
#[derive(Debug)]
pub struct Texture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Create a texture from raw RGBA data.
    pub fn from_rgba(gpu: &GpuContext, data: &[u8], width: u32, height: u32, label: &str) -> Self {
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(&format!("{} Sampler", label)),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            width,
            height,
        }
    }

    /// A 1x1 texture of a single color.
    pub fn solid(gpu: &GpuContext, rgba: [u8; 4], label: &str) -> Self {
        Self::from_rgba(gpu, &rgba, 1, 1, label)
    }

    /// Load a texture from an image file.
    pub fn from_file(gpu: &GpuContext, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?.to_rgba8();
        let (width, height) = img.dimensions();
        log::debug!("loaded texture {} ({width}x{height})", path.display());
        Ok(Self::from_rgba(gpu, &img, width, height, &path.to_string_lossy()))
    }

    /// Load a texture from embedded bytes.
    pub fn from_bytes(gpu: &GpuContext, bytes: &[u8], label: &str) -> Result<Self> {
        let img = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self::from_rgba(gpu, &img, width, height, label))
    }

    /// Bind this texture and its sampler against a (texture, sampler) layout.
    pub fn bind_group(&self, device: &wgpu::Device, layout: &wgpu::BindGroupLayout) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }
}

/// Cube map face order, matching the array layer order wgpu expects
/// (+X, -X, +Y, -Y, +Z, -Z).
pub const CUBE_FACES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

const FACE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A six-layer cube texture sampled by direction.
#[derive(Debug)]
pub struct CubeTexture {
    #[allow(dead_code)]
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) sampler: wgpu::Sampler,
    pub size: u32,
}

impl CubeTexture {
    /// Load `right, left, top, bottom, front, back` images from `dir`.
    ///
    /// Each face may be `.png`, `.jpg` or `.jpeg`. All faces must be square
    /// and the same size.
    pub fn from_dir(gpu: &GpuContext, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut size = None;
        let mut data = Vec::new();

        for face in CUBE_FACES {
            let path = find_face(dir, face)?;
            let img = image::open(&path)?.to_rgba8();
            let (width, height) = img.dimensions();
            let expected = *size.get_or_insert(width);
            if width != expected || height != expected {
                return Err(Error::CubeFaceSize {
                    face,
                    width,
                    height,
                    expected,
                });
            }
            data.extend_from_slice(&img);
        }

        let size = size.unwrap_or(1);
        log::info!("loaded skybox {} ({size}x{size} faces)", dir.display());
        Ok(Self::from_layers(gpu, &data, size, &dir.to_string_lossy()))
    }

    /// A 1x1 cube with one solid color per face, in [`CUBE_FACES`] order.
    pub fn from_colors(gpu: &GpuContext, faces: [[u8; 4]; 6]) -> Self {
        let data: Vec<u8> = faces.iter().flatten().copied().collect();
        Self::from_layers(gpu, &data, 1, "Solid Skybox")
    }

    fn from_layers(gpu: &GpuContext, data: &[u8], size: u32, label: &str) -> Self {
        let texture = gpu.device.create_texture_with_data(
            &gpu.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 6,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            data,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Cube Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            size,
        }
    }
}

fn find_face(dir: &Path, face: &str) -> Result<PathBuf> {
    FACE_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{face}.{ext}")))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::MissingCubeFace {
            path: dir.join(format!("{face}.png")),
        })
}

/// Handle to a texture registered in a [`TextureLibrary`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub(crate) usize);

/// Textures registered by name.
///
/// Registering a name twice replaces the texture and keeps the handle, so
/// nodes that already refer to it pick up the new image. Each replacement
/// bumps the handle's [`generation`](Self::generation), which tells render
/// stages their cached bindings are out of date.
#[derive(Debug)]
pub struct TextureLibrary<T = Texture> {
    names: HashMap<String, TextureId>,
    textures: Vec<T>,
    generations: Vec<u64>,
}

impl<T> Default for TextureLibrary<T> {
    fn default() -> Self {
        Self {
            names: HashMap::new(),
            textures: Vec::new(),
            generations: Vec::new(),
        }
    }
}

impl<T> TextureLibrary<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, texture: T) -> TextureId {
        let name = name.into();
        if let Some(&id) = self.names.get(&name) {
            self.textures[id.0] = texture;
            self.generations[id.0] += 1;
            log::debug!("replaced texture `{name}`, generation {}", self.generations[id.0]);
            return id;
        }
        let id = TextureId(self.textures.len());
        self.textures.push(texture);
        self.generations.push(0);
        self.names.insert(name, id);
        id
    }

    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.names.get(name).copied()
    }

    pub fn get(&self, id: TextureId) -> Option<&T> {
        self.textures.get(id.0)
    }

    /// How many times the texture behind `id` has been replaced.
    pub fn generation(&self, id: TextureId) -> Option<u64> {
        self.generations.get(id.0).copied()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

impl TextureLibrary<Texture> {
    /// Load an image file and register it under `name`.
    pub fn load(&mut self, gpu: &GpuContext, name: impl Into<String>, path: impl AsRef<Path>) -> Result<TextureId> {
        let texture = Texture::from_file(gpu, path)?;
        Ok(self.insert(name, texture))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_map_to_stable_handles() {
        let mut library = TextureLibrary::new();
        let wood = library.insert("wood", 1);
        let stone = library.insert("stone", 2);
        assert_ne!(wood, stone);
        assert_eq!(library.id("wood"), Some(wood));
        assert_eq!(library.get(stone), Some(&2));
        assert_eq!(library.id("glass"), None);

        let replaced = library.insert("wood", 3);
        assert_eq!(replaced, wood);
        assert_eq!(library.get(wood), Some(&3));
        assert_eq!(library.len(), 2);
    }

    #[test]
    fn replacing_a_texture_bumps_only_its_generation() {
        let mut library = TextureLibrary::new();
        let wood = library.insert("wood", 1);
        let stone = library.insert("stone", 2);
        assert_eq!(library.generation(wood), Some(0));

        library.insert("wood", 3);
        library.insert("wood", 4);
        assert_eq!(library.generation(wood), Some(2));
        assert_eq!(library.generation(stone), Some(0));
        assert_eq!(library.generation(TextureId(7)), None);
    }

    #[test]
    fn missing_cube_face_is_reported() {
        let dir = std::env::temp_dir().join("meshview-missing-skybox");
        let err = find_face(&dir, "right").unwrap_err();
        assert!(matches!(err, Error::MissingCubeFace { path } if path.ends_with("right.png")));
    }
}
