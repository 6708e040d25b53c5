//! Offscreen color + depth/stencil target.

use crate::error::{Error, Result};
use crate::gpu::GpuContext;

/// Depth/stencil format shared by every depth-tested pipeline.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// The image the scene is rendered into before post-processing.
///
/// The color texture uses [`GpuContext::format`], the same format the scene
/// pipelines write to the surface, so they render into either target. It is
/// a render attachment, a sampled texture for the post-process stage and a
/// copy source for readback. The depth/stencil texture is only an attachment.
///
/// The target is sized once. Window resizes do not reallocate it; the
/// post-process quad stretches it over the surface.
pub struct OffscreenTarget {
    #[allow(dead_code)]
    pub(crate) color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    #[allow(dead_code)]
    pub(crate) depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
}

impl OffscreenTarget {
    /// Allocate a `width` x `height` target.
    ///
    /// Fails with [`Error::FramebufferIncomplete`] when a dimension is zero
    /// or larger than the device supports, or when allocation is rejected.
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Result<Self> {
        let max = gpu.device.limits().max_texture_dimension_2d;
        check_size(width, height, max)?;

        let format = gpu.format();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let (color_texture, depth_texture) = gpu
            .validated(|device| {
                let color = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Offscreen Color"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let depth = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Offscreen Depth Stencil"),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                });
                (color, depth)
            })
            .map_err(|reason| {
                log::error!("offscreen target allocation failed: {reason}");
                Error::FramebufferIncomplete { reason }
            })?;

        let color_view = color_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        log::info!("offscreen target {width}x{height} {format:?} + {DEPTH_FORMAT:?}");

        Ok(Self {
            color_texture,
            color_view,
            depth_texture,
            depth_view,
            width,
            height,
            format,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }
}

fn check_size(width: u32, height: u32, max: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::FramebufferIncomplete {
            reason: format!("zero-sized attachment {width}x{height}"),
        });
    }
    if width > max || height > max {
        return Err(Error::FramebufferIncomplete {
            reason: format!("{width}x{height} exceeds the device limit of {max}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_oversized_targets_are_incomplete() {
        assert!(check_size(800, 600, 8192).is_ok());
        assert!(matches!(
            check_size(0, 600, 8192),
            Err(Error::FramebufferIncomplete { .. })
        ));
        assert!(matches!(
            check_size(800, 9000, 8192),
            Err(Error::FramebufferIncomplete { .. })
        ));
    }
}
