//! Viewer configuration.
//!
//! [`ViewConfig`] collects the window, asset, camera and post-process
//! settings in one builder. [`crate::run`] opens the window from it and
//! [`View::new`](crate::View::new) builds every render stage from it.

use std::path::PathBuf;

use glam::Vec3;
use winit::keyboard::KeyCode;

use crate::camera::Camera;
use crate::geometry::ImportPolicy;
use crate::pipeline::PostEffect;
use crate::shader::ShaderSources;

/// Everything needed to open the window and build a [`View`](crate::View).
///
/// # Example
/// ```ignore
/// let config = ViewConfig::new()
///     .title("Teapot")
///     .model("assets/teapot.obj")
///     .skybox("assets/sky")
///     .effect(PostEffect::Invert);
/// ```
#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub model_path: Option<PathBuf>,
    pub skybox_dir: Option<PathBuf>,
    /// Solid face colors used when `skybox_dir` is unset, in cube face order.
    pub sky_colors: [[u8; 4]; 6],
    pub import_policy: ImportPolicy,
    /// Offscreen and surface clear color, RGBA written without sRGB encoding.
    pub clear_color: [f32; 4],
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    pub move_speed: f32,
    pub orbit_sensitivity: f32,
    pub post_process_enabled: bool,
    pub effect: PostEffect,
    pub toggle_key: KeyCode,
    pub target_fps: f32,
    pub color_seed: u32,
    pub shaders: ShaderSources,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            title: "Mesh Loader".to_string(),
            width: 800,
            height: 600,
            model_path: None,
            skybox_dir: None,
            sky_colors: [
                [70, 90, 130, 255],
                [70, 90, 130, 255],
                [120, 150, 200, 255],
                [30, 30, 40, 255],
                [80, 100, 140, 255],
                [60, 80, 120, 255],
            ],
            import_policy: ImportPolicy::default(),
            clear_color: [0.1, 0.1, 0.12, 1.0],
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            camera_position: Vec3::new(0.0, 0.0, 10.0),
            camera_target: Vec3::ZERO,
            move_speed: 2.5,
            orbit_sensitivity: 0.005,
            post_process_enabled: true,
            effect: PostEffect::Grayscale,
            toggle_key: KeyCode::KeyP,
            target_fps: 60.0,
            color_seed: 0x5eed,
            shaders: ShaderSources::default(),
        }
    }
}

impl ViewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn model(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn skybox(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skybox_dir = Some(dir.into());
        self
    }

    pub fn sky_colors(mut self, colors: [[u8; 4]; 6]) -> Self {
        self.sky_colors = colors;
        self
    }

    pub fn import_policy(mut self, policy: ImportPolicy) -> Self {
        self.import_policy = policy;
        self
    }

    pub fn clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    /// Set the field of view in degrees.
    pub fn fov(mut self, degrees: f32) -> Self {
        self.fov_degrees = degrees;
        self
    }

    pub fn clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn camera(mut self, position: impl Into<Vec3>, target: impl Into<Vec3>) -> Self {
        self.camera_position = position.into();
        self.camera_target = target.into();
        self
    }

    pub fn move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    pub fn orbit_sensitivity(mut self, sensitivity: f32) -> Self {
        self.orbit_sensitivity = sensitivity;
        self
    }

    pub fn post_process(mut self, enabled: bool) -> Self {
        self.post_process_enabled = enabled;
        self
    }

    pub fn effect(mut self, effect: PostEffect) -> Self {
        self.effect = effect;
        self
    }

    pub fn toggle_key(mut self, key: KeyCode) -> Self {
        self.toggle_key = key;
        self
    }

    pub fn target_fps(mut self, fps: f32) -> Self {
        self.target_fps = fps;
        self
    }

    pub fn color_seed(mut self, seed: u32) -> Self {
        self.color_seed = seed;
        self
    }

    pub fn shaders(mut self, shaders: ShaderSources) -> Self {
        self.shaders = shaders;
        self
    }

    /// The camera this configuration starts with.
    pub fn build_camera(&self) -> Camera {
        Camera::new()
            .at(self.camera_position)
            .looking_at(self.camera_target)
            .with_fov(self.fov_degrees)
            .clip_planes(self.near, self.far)
            .with_aspect(self.width.max(1) as f32 / self.height.max(1) as f32)
            .with_move_speed(self.move_speed)
    }

    /// Duration of one frame at the target rate.
    pub fn frame_time(&self) -> std::time::Duration {
        let fps = if self.target_fps > 0.0 { self.target_fps } else { 60.0 };
        std::time::Duration::from_secs_f32(1.0 / fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_an_800_by_600_window() {
        let config = ViewConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert!(config.post_process_enabled);
        assert_eq!(config.effect, PostEffect::Grayscale);

        let camera = config.build_camera();
        assert!((camera.fov - 45f32.to_radians()).abs() < 1e-6);
        assert_eq!((camera.near, camera.far), (0.1, 100.0));
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn frame_time_falls_back_to_60_fps() {
        let config = ViewConfig::new().target_fps(0.0);
        assert_eq!(config.frame_time(), ViewConfig::new().frame_time());
        let fast = ViewConfig::new().target_fps(120.0);
        assert!(fast.frame_time() < config.frame_time());
    }
}
