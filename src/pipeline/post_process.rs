//! Full-screen post-process stage.

use wgpu::util::DeviceExt;

use crate::error::Result;
use crate::gpu::GpuContext;
use crate::pipeline::offscreen::OffscreenTarget;
use crate::shader::{self, ShaderSources};

/// Luma weights used by the grayscale effect.
pub const LUMA: [f32; 3] = [0.3, 0.59, 0.11];

/// Weighted luminance of a linear RGB color.
pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA[0] + rgb[1] * LUMA[1] + rgb[2] * LUMA[2]
}

/// Screen-space effect applied by the [`PostProcessStage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PostEffect {
    #[default]
    Grayscale,
    Invert,
    Passthrough,
}

impl PostEffect {
    pub const ALL: [PostEffect; 3] = [
        PostEffect::Grayscale,
        PostEffect::Invert,
        PostEffect::Passthrough,
    ];

    /// Fragment entry point in the post-process shader.
    pub fn entry_point(self) -> &'static str {
        match self {
            PostEffect::Grayscale => "fs_grayscale",
            PostEffect::Invert => "fs_invert",
            PostEffect::Passthrough => "fs_passthrough",
        }
    }

    /// CPU version of the effect, matching the shader.
    pub fn apply(self, rgb: [f32; 3]) -> [f32; 3] {
        match self {
            PostEffect::Grayscale => [luminance(rgb); 3],
            PostEffect::Invert => rgb.map(|c| 1.0 - c),
            PostEffect::Passthrough => rgb,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct QuadVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

/// Two triangles covering clip space. UV (0, 0) is the top-left texel.
const QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
    QuadVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    QuadVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
];

const QUAD_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<QuadVertex>() as u64,
    step_mode: wgpu::VertexStepMode::Vertex,
    attributes: &[
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: 8,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x2,
        },
    ],
};

/// Draws the offscreen color image onto the current target through an effect.
///
/// The bind group references the offscreen color view directly, so the stage
/// is tied to the target it was built for.
pub struct PostProcessStage {
    pipeline: wgpu::RenderPipeline,
    quad: wgpu::Buffer,
    #[allow(dead_code)]
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    effect: PostEffect,
}

impl PostProcessStage {
    pub fn new(
        gpu: &GpuContext,
        sources: &ShaderSources,
        target: &OffscreenTarget,
        effect: PostEffect,
    ) -> Result<Self> {
        let shader = shader::compile(gpu, "Post Process Shader", &sources.post_process)?;
        let device = &gpu.device;

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post Process Quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post Process Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post Process Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post Process Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&target.color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post Process Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let label = format!("Post Process Pipeline ({:?})", effect);
        let pipeline = gpu.link(&label, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[QUAD_LAYOUT],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(effect.entry_point()),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.format(),
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })?;

        Ok(Self {
            pipeline,
            quad,
            sampler,
            bind_group,
            effect,
        })
    }

    pub fn effect(&self) -> PostEffect {
        self.effect
    }

    /// Draw the full-screen quad. The pass must target a color attachment of
    /// the surface format with no depth attachment.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad.slice(..));
        pass.draw(0..QUAD.len() as u32, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_of_pure_red() {
        let gray = PostEffect::Grayscale.apply([1.0, 0.0, 0.0]);
        assert!((gray[0] * 255.0 - 76.5).abs() < 1e-3);
        assert_eq!(gray[0], gray[1]);
        assert_eq!(gray[1], gray[2]);
    }

    #[test]
    fn grayscale_keeps_white_white() {
        let gray = PostEffect::Grayscale.apply([1.0, 1.0, 1.0]);
        assert!(gray.iter().all(|c| (c - 1.0).abs() < 1e-6));
    }

    #[test]
    fn invert_and_passthrough() {
        assert_eq!(PostEffect::Invert.apply([0.25, 0.5, 1.0]), [0.75, 0.5, 0.0]);
        assert_eq!(PostEffect::Passthrough.apply([0.1, 0.2, 0.3]), [0.1, 0.2, 0.3]);
    }

    #[test]
    fn quad_covers_clip_space_with_two_triangles() {
        assert_eq!(QUAD.len(), 6);
        let corners: Vec<[f32; 2]> = QUAD.iter().map(|v| v.position).collect();
        for corner in [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]] {
            assert!(corners.contains(&corner));
        }
        for v in &QUAD {
            // uv follows position with y flipped
            assert_eq!(v.uv[0], (v.position[0] + 1.0) / 2.0);
            assert_eq!(v.uv[1], (1.0 - v.position[1]) / 2.0);
        }
    }
}
