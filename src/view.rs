//! The view: owns the scene, the camera and every render stage.
//!
//! Per frame the app calls [`View::handle_event`] for each input event,
//! [`View::update`] once, then [`View::render`]. Rendering follows the
//! [`FramePlan`] built from the post-process toggle and the scene contents.

use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::config::ViewConfig;
use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::input::{Input, InputEvent};
use crate::orbit_camera::OrbitController;
use crate::pipeline::{
    DrawOp, FramePlan, OffscreenTarget, Phase, PostProcessStage, ScenePass, Skybox, Target,
};
use crate::scene::{DrawItem, SceneGraph};
use crate::texture::{CubeTexture, TextureLibrary};

/// Edge-triggered switch for the post-process stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcessToggle {
    enabled: bool,
    key: KeyCode,
}

impl PostProcessToggle {
    pub fn new(enabled: bool, key: KeyCode) -> Self {
        Self { enabled, key }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flip on a fresh press of the toggle key. Returns true if it flipped.
    ///
    /// Repeats from a held key are ignored.
    pub fn on_key_down(&mut self, key: KeyCode, repeat: bool) -> bool {
        if key != self.key || repeat {
            return false;
        }
        self.enabled = !self.enabled;
        log::debug!(
            "post-processing {}",
            if self.enabled { "enabled" } else { "disabled" }
        );
        true
    }
}

/// Per-frame scene update hook, called with the frame's delta time in seconds.
pub type UpdateFn = Box<dyn FnMut(&mut SceneGraph, f32)>;

pub struct View {
    camera: Camera,
    orbit: OrbitController,
    scene: SceneGraph,
    textures: TextureLibrary,
    skybox: Skybox,
    scene_pass: ScenePass,
    offscreen: OffscreenTarget,
    post_process: PostProcessStage,
    toggle: PostProcessToggle,
    clear_color: wgpu::Color,
    on_update: Option<UpdateFn>,
}

impl View {
    /// Build every stage. Any shader, pipeline or framebuffer failure aborts
    /// construction.
    ///
    /// The offscreen target takes the surface size at this point and keeps
    /// it for the life of the view.
    pub fn new(gpu: &GpuContext, config: &ViewConfig) -> Result<Self> {
        let cube = match &config.skybox_dir {
            Some(dir) => CubeTexture::from_dir(gpu, dir)?,
            None => CubeTexture::from_colors(gpu, config.sky_colors),
        };
        let skybox = Skybox::new(gpu, &config.shaders, cube)?;
        let scene_pass = ScenePass::new(gpu, &config.shaders)?;
        let offscreen = OffscreenTarget::new(gpu, gpu.width(), gpu.height())?;
        let post_process = PostProcessStage::new(gpu, &config.shaders, &offscreen, config.effect)?;

        let mut camera = config.build_camera();
        camera.set_aspect(gpu.aspect());

        let [r, g, b, a] = config.clear_color.map(f64::from);

        Ok(Self {
            camera,
            orbit: OrbitController::new().sensitivity(config.orbit_sensitivity),
            scene: SceneGraph::new(),
            textures: TextureLibrary::new(),
            skybox,
            scene_pass,
            offscreen,
            post_process,
            toggle: PostProcessToggle::new(config.post_process_enabled, config.toggle_key),
            clear_color: wgpu::Color { r, g, b, a },
            on_update: None,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn orbit(&self) -> &OrbitController {
        &self.orbit
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn textures(&self) -> &TextureLibrary {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureLibrary {
        &mut self.textures
    }

    pub fn toggle(&self) -> &PostProcessToggle {
        &self.toggle
    }

    pub fn toggle_mut(&mut self) -> &mut PostProcessToggle {
        &mut self.toggle
    }

    pub fn offscreen(&self) -> &OffscreenTarget {
        &self.offscreen
    }

    /// Install the per-frame scene update hook, replacing any previous one.
    pub fn on_update(&mut self, f: impl FnMut(&mut SceneGraph, f32) + 'static) {
        self.on_update = Some(Box::new(f));
    }

    pub fn handle_event(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::KeyDown { key, repeat } => {
                self.toggle.on_key_down(key, repeat);
            }
            InputEvent::PointerDown { position } => self.orbit.pointer_down(position),
            InputEvent::PointerMoved { position } => self.orbit.pointer_moved(position),
            InputEvent::PointerUp { .. } => self.orbit.pointer_up(),
            InputEvent::Resized { width, height } => self.resize(width, height),
            InputEvent::KeyUp { .. } | InputEvent::CloseRequested => {}
        }
    }

    /// Update the camera aspect after a window resize.
    ///
    /// Zero sizes are ignored. The offscreen target is not reallocated.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.camera.set_aspect(width as f32 / height as f32);
        }
    }

    /// Advance one frame: camera movement, orbit, then the scene hook.
    pub fn update(&mut self, input: &Input, dt: f32) {
        self.camera.handle_input(input, dt);
        self.orbit.apply(&mut self.camera);
        if let Some(on_update) = self.on_update.as_mut() {
            on_update(&mut self.scene, dt);
        }
    }

    /// Render a frame to the window surface and present it.
    ///
    /// Fails with [`Error::NoSurface`] on a headless context; use
    /// [`render_to`](Self::render_to) there.
    pub fn render(&mut self, gpu: &GpuContext) -> Result<()> {
        let surface = gpu.surface.as_ref().ok_or(Error::NoSurface)?;
        let output = surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(gpu.format()),
            ..Default::default()
        });
        self.render_to(gpu, &view);
        output.present();
        Ok(())
    }

    /// Record and submit one frame with `surface_view` as the default target.
    ///
    /// `surface_view` must have the format [`GpuContext::format`] and the
    /// size of the context.
    pub fn render_to(&mut self, gpu: &GpuContext, surface_view: &wgpu::TextureView) {
        self.scene_pass.ensure_depth_size(gpu);

        let draws = self.scene.collect_draws(self.camera.view_matrix());
        self.skybox.prepare(gpu, &self.camera);
        self.scene_pass
            .prepare(gpu, &self.camera, &draws, &self.textures);

        let has_transparent = draws.iter().any(DrawItem::is_transparent);
        let plan = FramePlan::new(self.toggle.enabled(), has_transparent);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        for pass_plan in &plan.passes {
            let (color_view, label) = match pass_plan.target {
                Target::Offscreen => (&self.offscreen.color_view, "Offscreen Pass"),
                Target::Default => (surface_view, "Default Pass"),
            };
            let depth_view = match pass_plan.target {
                _ if !pass_plan.uses_depth() => None,
                Target::Offscreen => Some(&self.offscreen.depth_view),
                Target::Default => Some(&self.scene_pass.depth_view),
            };

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: depth_view.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(0),
                            store: wgpu::StoreOp::Store,
                        }),
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for op in &pass_plan.ops {
                match op {
                    DrawOp::Skybox => self.skybox.render(&mut pass),
                    DrawOp::Opaque => self.scene_pass.render(&mut pass, &draws, Phase::Opaque),
                    DrawOp::Transparent => {
                        self.scene_pass
                            .render(&mut pass, &draws, Phase::Transparent)
                    }
                    DrawOp::PostProcess => self.post_process.render(&mut pass),
                }
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_once_per_press() {
        let mut toggle = PostProcessToggle::new(true, KeyCode::KeyP);
        assert!(toggle.on_key_down(KeyCode::KeyP, false));
        assert!(!toggle.enabled());

        // Holding the key produces repeats, which are ignored.
        assert!(!toggle.on_key_down(KeyCode::KeyP, true));
        assert!(!toggle.on_key_down(KeyCode::KeyP, true));
        assert!(!toggle.enabled());

        assert!(toggle.on_key_down(KeyCode::KeyP, false));
        assert!(toggle.enabled());
    }

    #[test]
    fn other_keys_do_not_toggle() {
        let mut toggle = PostProcessToggle::new(false, KeyCode::KeyP);
        assert!(!toggle.on_key_down(KeyCode::KeyW, false));
        assert!(!toggle.enabled());
    }

    #[test]
    fn held_key_through_input_toggles_once() {
        let mut input = Input::new();
        let mut toggle = PostProcessToggle::new(true, KeyCode::KeyP);
        for _ in 0..5 {
            if let InputEvent::KeyDown { key, repeat } = input.press_key(KeyCode::KeyP, false) {
                toggle.on_key_down(key, repeat);
            }
        }
        assert!(!toggle.enabled());
    }

    mod readback {
        use std::rc::Rc;

        use super::*;
        use crate::mesh::{ColorGenerator, Mesh, MeshData};

        const SIZE: u32 = 64;
        const RED: [u8; 4] = [255, 0, 0, 255];

        /// A headless context, or `None` when the machine has no adapter.
        fn headless() -> Option<GpuContext> {
            match GpuContext::headless(SIZE, SIZE, wgpu::TextureFormat::Rgba8Unorm) {
                Ok(gpu) => Some(gpu),
                Err(err) => {
                    eprintln!("skipping GPU test: {err}");
                    None
                }
            }
        }

        /// A view whose sky and clear color are both pure red.
        fn red_view(gpu: &GpuContext, post_process: bool) -> View {
            let config = ViewConfig::new()
                .size(SIZE, SIZE)
                .clear_color([1.0, 0.0, 0.0, 1.0])
                .sky_colors([RED; 6])
                .post_process(post_process);
            View::new(gpu, &config).expect("view")
        }

        fn surface_texture(gpu: &GpuContext) -> wgpu::Texture {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Test Surface"),
                size: wgpu::Extent3d {
                    width: SIZE,
                    height: SIZE,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: gpu.format(),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        }

        fn center_pixel(gpu: &GpuContext, texture: &wgpu::Texture) -> [u8; 4] {
            // 64 texels of 4 bytes is already a multiple of the 256 byte row alignment.
            let bytes_per_row = SIZE * 4;
            let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback"),
                size: u64::from(bytes_per_row * SIZE),
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
            encoder.copy_texture_to_buffer(
                texture.as_image_copy(),
                wgpu::TexelCopyBufferInfo {
                    buffer: &buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(SIZE),
                    },
                },
                texture.size(),
            );
            gpu.queue.submit(std::iter::once(encoder.finish()));

            let slice = buffer.slice(..);
            slice.map_async(wgpu::MapMode::Read, |result| result.expect("map readback"));
            gpu.device
                .poll(wgpu::PollType::wait_indefinitely())
                .expect("poll");

            let data = slice.get_mapped_range();
            let at = ((SIZE / 2) * bytes_per_row + (SIZE / 2) * 4) as usize;
            let pixel = [data[at], data[at + 1], data[at + 2], data[at + 3]];
            drop(data);
            buffer.unmap();
            pixel
        }

        #[test]
        fn grayscale_of_red_frame_is_thirty_percent() {
            let Some(gpu) = headless() else { return };
            let mut view = red_view(&gpu, true);
            let surface = surface_texture(&gpu);
            view.render_to(&gpu, &surface.create_view(&Default::default()));

            assert_eq!(center_pixel(&gpu, &view.offscreen().color_texture), RED);
            let [r, g, b, a] = center_pixel(&gpu, &surface);
            assert!((74..=79).contains(&r), "gray level {r}");
            assert_eq!((r, r, 255), (g, b, a));
        }

        #[test]
        fn invert_of_red_frame_is_cyan() {
            let Some(gpu) = headless() else { return };
            let config = ViewConfig::new()
                .size(SIZE, SIZE)
                .clear_color([1.0, 0.0, 0.0, 1.0])
                .sky_colors([RED; 6])
                .effect(crate::pipeline::PostEffect::Invert);
            let mut view = View::new(&gpu, &config).expect("view");
            let surface = surface_texture(&gpu);
            view.render_to(&gpu, &surface.create_view(&Default::default()));

            assert_eq!(center_pixel(&gpu, &surface), [0, 255, 255, 255]);
        }

        #[test]
        fn disabled_post_process_leaves_offscreen_untouched() {
            let Some(gpu) = headless() else { return };
            let mut view = red_view(&gpu, true);
            let surface = surface_texture(&gpu);
            let surface_view = surface.create_view(&Default::default());
            view.render_to(&gpu, &surface_view);
            assert_eq!(center_pixel(&gpu, &view.offscreen().color_texture), RED);

            // A cube in front of the camera would show up in any target it is drawn to.
            let data = MeshData::cube("cube", &mut ColorGenerator::default());
            let cube = view.scene_mut().create_mesh_node(Rc::new(Mesh::upload(&gpu, &data)));
            let root = view.scene().root();
            view.scene_mut().add_child(root, cube).expect("attach cube");
            view.toggle_mut().set_enabled(false);

            for _ in 0..2 {
                view.render_to(&gpu, &surface_view);
                assert_eq!(center_pixel(&gpu, &view.offscreen().color_texture), RED);
            }
            assert_ne!(center_pixel(&gpu, &surface), RED);
        }
    }
}
