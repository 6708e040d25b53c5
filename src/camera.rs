//! Perspective camera with accumulated orbit angles.
//!
//! The view matrix is a look-at transform followed by the orbit rotation
//! `Rx(angle_around_x) * Ry(angle_around_y)`, so pointer drags spin the scene
//! about the origin without moving the eye. Both matrix accessors are pure.

use glam::{Mat4, Vec3};
use winit::keyboard::KeyCode;

use crate::input::Input;

/// Pitch limit for the accumulated x angle, just short of straight up/down.
const MAX_ANGLE_AROUND_X: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Width / height of the surface the camera renders to.
    pub aspect: f32,
    pub angle_around_x: f32,
    pub angle_around_y: f32,
    /// Keyboard movement speed in units per second.
    pub move_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
            aspect: 800.0 / 600.0,
            angle_around_x: 0.0,
            angle_around_y: 0.0,
            move_speed: 2.5,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: impl Into<Vec3>) -> Self {
        self.position = position.into();
        self
    }

    pub fn looking_at(mut self, target: impl Into<Vec3>) -> Self {
        self.target = target.into();
        self
    }

    /// Set the field of view in degrees.
    pub fn with_fov(mut self, fov_degrees: f32) -> Self {
        self.fov = fov_degrees.to_radians();
        self
    }

    /// Set near and far clipping planes.
    pub fn clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self
    }

    pub fn with_move_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    /// Rotation applied after the look-at transform.
    pub fn orbit_rotation(&self) -> Mat4 {
        Mat4::from_rotation_x(self.angle_around_x) * Mat4::from_rotation_y(self.angle_around_y)
    }

    /// World-to-view transform, used as the parent transform of the scene root.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up) * self.orbit_rotation()
    }

    /// Right-handed perspective projection with a [0, 1] depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// View matrix with the translation removed, for the skybox.
    pub fn skybox_view_matrix(&self) -> Mat4 {
        let mut view = self.view_matrix();
        view.w_axis = glam::Vec4::W;
        view
    }

    /// Rotate the eye about the target by `rotation`.
    ///
    /// Both the eye offset and the up vector are transformed, so repeated
    /// calls compound.
    pub fn rotate(&mut self, rotation: Mat4) {
        let offset = rotation.transform_vector3(self.position - self.target);
        self.position = self.target + offset;
        self.up = rotation.transform_vector3(self.up).normalize_or(Vec3::Y);
    }

    pub fn set_target(&mut self, x: f32, y: f32, z: f32) {
        self.target = Vec3::new(x, y, z);
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Add to the accumulated orbit angles (radians).
    ///
    /// The x angle is clamped to avoid flipping over the poles.
    pub fn orbit(&mut self, around_x: f32, around_y: f32) {
        self.angle_around_x =
            (self.angle_around_x + around_x).clamp(-MAX_ANGLE_AROUND_X, MAX_ANGLE_AROUND_X);
        self.angle_around_y += around_y;
    }

    fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    fn right(&self) -> Vec3 {
        self.forward().cross(self.up).normalize_or(Vec3::X)
    }

    /// Move the eye and target with the held movement keys.
    ///
    /// W/S move along the view direction, A/D strafe and Q/E move down/up.
    pub fn handle_input(&mut self, input: &Input, dt: f32) {
        let forward = self.forward();
        let right = self.right();
        let up = self.up.normalize_or(Vec3::Y);

        let mut velocity = Vec3::ZERO;
        if input.key_down(KeyCode::KeyW) {
            velocity += forward;
        }
        if input.key_down(KeyCode::KeyS) {
            velocity -= forward;
        }
        if input.key_down(KeyCode::KeyA) {
            velocity -= right;
        }
        if input.key_down(KeyCode::KeyD) {
            velocity += right;
        }
        if input.key_down(KeyCode::KeyQ) {
            velocity -= up;
        }
        if input.key_down(KeyCode::KeyE) {
            velocity += up;
        }

        if velocity.length_squared() > 0.0 {
            let step = velocity.normalize() * self.move_speed * dt;
            self.position += step;
            self.target += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_is_pure() {
        let camera = Camera::new();
        let a = camera.projection_matrix();
        let b = camera.projection_matrix();
        assert_eq!(a.to_cols_array(), b.to_cols_array());
        assert_eq!(camera.view_matrix(), camera.view_matrix());
    }

    #[test]
    fn default_view_looks_down_negative_z() {
        let camera = Camera::new();
        let origin = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(0.0, 0.0, -5.0)).length() < 1e-5);
    }

    #[test]
    fn skybox_view_has_no_translation() {
        let mut camera = Camera::new().at([3.0, 2.0, 7.0]);
        camera.orbit(0.2, 0.4);
        let view = camera.skybox_view_matrix();
        assert_eq!(view.transform_point3(Vec3::ZERO), Vec3::ZERO);
    }

    #[test]
    fn orbit_clamps_pitch() {
        let mut camera = Camera::new();
        camera.orbit(10.0, 1.0);
        assert!(camera.angle_around_x <= MAX_ANGLE_AROUND_X);
        assert_eq!(camera.angle_around_y, 1.0);
    }

    #[test]
    fn rotate_keeps_distance_to_target() {
        let mut camera = Camera::new();
        camera.rotate(Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2));
        assert!((camera.position.distance(camera.target) - 5.0).abs() < 1e-5);
        assert!((camera.position - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn movement_translates_eye_and_target_together() {
        let mut camera = Camera::new().with_move_speed(1.0);
        let mut input = Input::new();
        input.press_key(KeyCode::KeyW, false);
        camera.handle_input(&input, 0.5);
        assert!((camera.position - Vec3::new(0.0, 0.0, 4.5)).length() < 1e-5);
        assert!((camera.target - Vec3::new(0.0, 0.0, -0.5)).length() < 1e-5);
    }
}
