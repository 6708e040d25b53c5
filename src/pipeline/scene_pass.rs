//! Scene-graph mesh rendering with depth testing.
//!
//! The scene pass draws the [`DrawItem`]s collected from the scene graph. It
//! uses three bind groups:
//! - **Group 0**: camera uniforms (projection)
//! - **Group 1**: model uniforms (model-view matrix, tint and opacity), one
//!   slot per draw item in a dynamic-offset buffer
//! - **Group 2**: texture and sampler, textured meshes only
//!
//! Each frame, [`ScenePass::prepare`] uploads every uniform once before the
//! pass is recorded, then [`ScenePass::render`] is called per phase. Opaque
//! items are drawn with depth writes and no blending; transparent items
//! (opacity below 1) afterwards with alpha blending and depth writes off, in
//! the order the scene graph produced them.

use std::collections::HashMap;
use std::num::NonZeroU64;

use crate::camera::Camera;
use crate::error::Result;
use crate::gpu::GpuContext;
use crate::mesh::{Mesh, StreamKind};
use crate::pipeline::offscreen::DEPTH_FORMAT;
use crate::scene::DrawItem;
use crate::shader::{self, ShaderSources};
use crate::texture::{Texture, TextureId, TextureLibrary};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniforms {
    projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniforms {
    model_view: [[f32; 4]; 4],
    tint: [f32; 4],
}

const MODEL_SIZE: u64 = std::mem::size_of::<ModelUniforms>() as u64;
const INITIAL_MODEL_SLOTS: usize = 16;

/// Which draw items a [`ScenePass::render`] call records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Opaque,
    Transparent,
}

impl Phase {
    fn of(item: &DrawItem) -> Self {
        if item.is_transparent() {
            Phase::Transparent
        } else {
            Phase::Opaque
        }
    }
}

/// Byte distance between model slots for a device alignment.
fn model_stride(alignment: u32) -> u64 {
    let alignment = u64::from(alignment.max(1));
    MODEL_SIZE.div_ceil(alignment) * alignment
}

/// Slot count after growing to fit `needed`.
fn grown_capacity(current: usize, needed: usize) -> usize {
    if needed <= current {
        current
    } else {
        needed.next_power_of_two().max(INITIAL_MODEL_SLOTS)
    }
}

/// A cached texture bind group must be rebuilt when it is missing or was
/// built from an older generation of the texture.
fn needs_rebuild(cached: Option<u64>, generation: u64) -> bool {
    cached != Some(generation)
}

struct Pipelines {
    colored_opaque: wgpu::RenderPipeline,
    colored_transparent: wgpu::RenderPipeline,
    textured_opaque: wgpu::RenderPipeline,
    textured_transparent: wgpu::RenderPipeline,
}

impl Pipelines {
    fn get(&self, kind: StreamKind, phase: Phase) -> &wgpu::RenderPipeline {
        match (kind, phase) {
            (StreamKind::Colors, Phase::Opaque) => &self.colored_opaque,
            (StreamKind::Colors, Phase::Transparent) => &self.colored_transparent,
            (StreamKind::TexCoords, Phase::Opaque) => &self.textured_opaque,
            (StreamKind::TexCoords, Phase::Transparent) => &self.textured_transparent,
        }
    }
}

/// Draws scene-graph meshes into a color + depth/stencil attachment.
pub struct ScenePass {
    pipelines: Pipelines,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_stride: u64,
    model_capacity: usize,
    texture_layout: wgpu::BindGroupLayout,
    #[allow(dead_code)]
    default_texture: Texture,
    default_bind_group: wgpu::BindGroup,
    /// Bind groups per texture, tagged with the library generation they were built from.
    texture_bind_groups: HashMap<TextureId, (u64, wgpu::BindGroup)>,
    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    /// Surface-sized depth used when the scene renders straight to the window.
    pub(crate) depth_view: wgpu::TextureView,
    depth_size: (u32, u32),
}

impl ScenePass {
    pub fn new(gpu: &GpuContext, sources: &ShaderSources) -> Result<Self> {
        let shader = shader::compile(gpu, "Scene Shader", &sources.scene)?;
        let device = &gpu.device;

        // Camera uniform buffer (group 0)
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Model uniform slots (group 1)
        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(MODEL_SIZE),
                },
                count: None,
            }],
        });

        let model_stride = model_stride(device.limits().min_uniform_buffer_offset_alignment);
        let (model_buffer, model_bind_group) =
            Self::create_model_slots(device, &model_layout, model_stride, INITIAL_MODEL_SLOTS);

        // Texture bind group layout (group 2)
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Texture Bind Group Layout"),
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

        // 1x1 white texture for textured meshes without an assigned texture
        let default_texture = Texture::solid(gpu, [255, 255, 255, 255], "Default White Texture");
        let default_bind_group = default_texture.bind_group(device, &texture_layout);

        let colored_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Colored Mesh Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &model_layout],
            push_constant_ranges: &[],
        });
        let textured_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Textured Mesh Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &model_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |layout: &wgpu::PipelineLayout, kind, phase| {
            Self::create_pipeline(gpu, &shader, layout, kind, phase)
        };
        let pipelines = Pipelines {
            colored_opaque: pipeline(&colored_layout, StreamKind::Colors, Phase::Opaque)?,
            colored_transparent: pipeline(&colored_layout, StreamKind::Colors, Phase::Transparent)?,
            textured_opaque: pipeline(&textured_layout, StreamKind::TexCoords, Phase::Opaque)?,
            textured_transparent: pipeline(
                &textured_layout,
                StreamKind::TexCoords,
                Phase::Transparent,
            )?,
        };

        let (depth_texture, depth_view) = Self::create_depth_texture(gpu);

        Ok(Self {
            pipelines,
            camera_buffer,
            camera_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity: INITIAL_MODEL_SLOTS,
            texture_layout,
            default_texture,
            default_bind_group,
            texture_bind_groups: HashMap::new(),
            depth_texture,
            depth_view,
            depth_size: (gpu.width(), gpu.height()),
        })
    }

    fn create_pipeline(
        gpu: &GpuContext,
        shader: &wgpu::ShaderModule,
        layout: &wgpu::PipelineLayout,
        kind: StreamKind,
        phase: Phase,
    ) -> Result<wgpu::RenderPipeline> {
        let (vs, fs) = match kind {
            StreamKind::Colors => ("vs_colored", "fs_colored"),
            StreamKind::TexCoords => ("vs_textured", "fs_textured"),
        };
        let (blend, depth_write) = match phase {
            Phase::Opaque => (wgpu::BlendState::REPLACE, true),
            Phase::Transparent => (wgpu::BlendState::ALPHA_BLENDING, false),
        };
        let buffers = Mesh::layouts(kind);
        let label = format!("Mesh Pipeline ({kind:?}, {phase:?})");

        gpu.link(&label, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some(vs),
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(fs),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.format(),
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    fn create_model_slots(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        slots: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniforms"),
            size: stride * slots as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(MODEL_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn create_depth_texture(gpu: &GpuContext) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Texture"),
            size: wgpu::Extent3d {
                width: gpu.width(),
                height: gpu.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Ensures the surface depth buffer matches the current screen size.
    pub fn ensure_depth_size(&mut self, gpu: &GpuContext) {
        if self.depth_size != (gpu.width(), gpu.height()) {
            let (texture, view) = Self::create_depth_texture(gpu);
            self.depth_texture = texture;
            self.depth_view = view;
            self.depth_size = (gpu.width(), gpu.height());
        }
    }

    /// Upload the camera projection and one model slot per draw item.
    ///
    /// Must be called once per frame with the same items later passed to
    /// [`render`](Self::render); slot `i` belongs to `draws[i]`.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        camera: &Camera,
        draws: &[DrawItem],
        textures: &TextureLibrary,
    ) {
        let camera_uniforms = CameraUniforms {
            projection: camera.projection_matrix().to_cols_array_2d(),
        };
        gpu.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[camera_uniforms]),
        );

        if draws.is_empty() {
            return;
        }

        let capacity = grown_capacity(self.model_capacity, draws.len());
        if capacity != self.model_capacity {
            log::debug!("growing model uniform slots to {capacity}");
            let (buffer, bind_group) =
                Self::create_model_slots(&gpu.device, &self.model_layout, self.model_stride, capacity);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            self.model_capacity = capacity;
        }

        let stride = self.model_stride as usize;
        let mut bytes = vec![0u8; stride * draws.len()];
        for (slot, item) in bytes.chunks_exact_mut(stride).zip(draws) {
            let uniforms = ModelUniforms {
                model_view: item.transform.to_cols_array_2d(),
                tint: [1.0, 1.0, 1.0, item.opacity],
            };
            slot[..MODEL_SIZE as usize].copy_from_slice(bytemuck::bytes_of(&uniforms));
        }
        gpu.queue.write_buffer(&self.model_buffer, 0, &bytes);

        for id in draws.iter().filter_map(|item| item.texture) {
            let (Some(texture), Some(generation)) = (textures.get(id), textures.generation(id)) else {
                log::warn!("texture {id:?} is not in the library, drawing untextured");
                continue;
            };
            let cached = self.texture_bind_groups.get(&id).map(|(tag, _)| *tag);
            if !needs_rebuild(cached, generation) {
                continue;
            }
            let bind_group = texture.bind_group(&gpu.device, &self.texture_layout);
            self.texture_bind_groups.insert(id, (generation, bind_group));
        }
    }

    /// Record the draws of one phase.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, draws: &[DrawItem], phase: Phase) {
        let mut bound: Option<StreamKind> = None;

        for (slot, item) in draws.iter().enumerate() {
            if Phase::of(item) != phase {
                continue;
            }
            let kind = item.mesh.kind();
            if bound != Some(kind) {
                pass.set_pipeline(self.pipelines.get(kind, phase));
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                if kind == StreamKind::TexCoords {
                    pass.set_bind_group(2, &self.default_bind_group, &[]);
                }
                bound = Some(kind);
            }

            let offset = (slot as u64 * self.model_stride) as u32;
            pass.set_bind_group(1, &self.model_bind_group, &[offset]);

            let texture = item
                .texture
                .and_then(|id| self.texture_bind_groups.get(&id))
                .map(|(_, group)| group);
            match (kind, texture) {
                (StreamKind::TexCoords, Some(texture)) => {
                    item.mesh
                        .draw_with_texture(pass, 2, texture, &self.default_bind_group);
                }
                _ => item.mesh.draw(pass),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_slots_respect_offset_alignment() {
        assert_eq!(model_stride(256), 256);
        assert_eq!(model_stride(64), 128);
        assert_eq!(model_stride(16), MODEL_SIZE);
        assert_eq!(MODEL_SIZE, 80);
    }

    #[test]
    fn model_slots_grow_by_powers_of_two() {
        assert_eq!(grown_capacity(16, 3), 16);
        assert_eq!(grown_capacity(16, 17), 32);
        assert_eq!(grown_capacity(32, 100), 128);
    }

    #[test]
    fn replaced_texture_invalidates_cached_bind_group() {
        let mut library = TextureLibrary::new();
        let wood = library.insert("wood", "oak");
        let Some(built) = library.generation(wood) else {
            panic!("wood is registered");
        };
        assert!(needs_rebuild(None, built));
        assert!(!needs_rebuild(Some(built), built));

        assert_eq!(library.insert("wood", "pine"), wood);
        let current = library.generation(wood).unwrap_or(built);
        assert!(needs_rebuild(Some(built), current));
    }
}
