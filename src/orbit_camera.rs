use glam::Vec2;

use crate::camera::Camera;

/// Pointer drag state of the [`OrbitController`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    /// A drag is in progress; `last` is the previous pointer position.
    Dragging { last: Vec2 },
}

/// Turns pointer drags into per-frame orbit angle deltas.
///
/// While dragging, each pointer move replaces the current delta with the
/// motion since the previous move. [`apply`](Self::apply) adds the current
/// delta to the camera every frame, so holding the pointer still after a
/// motion keeps the camera spinning at the last speed until it moves again or
/// is released. Releasing zeroes the delta but keeps the accumulated angles.
///
/// # Example
/// ```ignore
/// let mut orbit = OrbitController::new().sensitivity(0.005);
///
/// orbit.pointer_down(position);
/// orbit.pointer_moved(new_position);
///
/// // In frame loop:
/// orbit.apply(&mut camera);
/// ```
#[derive(Clone, Debug)]
pub struct OrbitController {
    state: DragState,
    delta: Vec2,
    /// Radians per pixel of pointer motion.
    pub sensitivity: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            state: DragState::Idle,
            delta: Vec2::ZERO,
            sensitivity: 0.005,
        }
    }
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sensitivity(mut self, sensitivity: f32) -> Self {
        self.sensitivity = sensitivity;
        self
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    /// Current per-frame angle delta (x: around Y, y: around X), in pixels.
    pub fn delta(&self) -> Vec2 {
        self.delta
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        if !self.is_dragging() {
            log::debug!("orbit drag started at {position}");
        }
        self.state = DragState::Dragging { last: position };
    }

    pub fn pointer_moved(&mut self, position: Vec2) {
        if let DragState::Dragging { last } = self.state {
            self.delta = position - last;
            self.state = DragState::Dragging { last: position };
        }
    }

    pub fn pointer_up(&mut self) {
        if self.is_dragging() {
            log::debug!("orbit drag released");
        }
        self.state = DragState::Idle;
        self.delta = Vec2::ZERO;
    }

    /// Add the current delta to the camera's accumulated angles.
    pub fn apply(&self, camera: &mut Camera) {
        if self.delta != Vec2::ZERO {
            camera.orbit(
                self.delta.y * self.sensitivity,
                self.delta.x * self.sensitivity,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_moves_do_nothing() {
        let mut orbit = OrbitController::new();
        let mut camera = Camera::new();
        orbit.pointer_moved(Vec2::new(40.0, 40.0));
        orbit.apply(&mut camera);
        assert_eq!(orbit.state(), DragState::Idle);
        assert_eq!(camera.angle_around_x, 0.0);
        assert_eq!(camera.angle_around_y, 0.0);
    }

    #[test]
    fn drag_accumulates_every_frame_until_release() {
        let mut orbit = OrbitController::new().sensitivity(0.01);
        let mut camera = Camera::new();

        orbit.pointer_down(Vec2::new(100.0, 100.0));
        orbit.pointer_moved(Vec2::new(110.0, 100.0));
        assert_eq!(orbit.delta(), Vec2::new(10.0, 0.0));

        orbit.apply(&mut camera);
        orbit.apply(&mut camera);
        assert!((camera.angle_around_y - 0.2).abs() < 1e-6);

        orbit.pointer_up();
        assert_eq!(orbit.state(), DragState::Idle);
        assert_eq!(orbit.delta(), Vec2::ZERO);

        orbit.apply(&mut camera);
        assert!((camera.angle_around_y - 0.2).abs() < 1e-6);
    }

    #[test]
    fn each_move_replaces_the_delta() {
        let mut orbit = OrbitController::new();
        orbit.pointer_down(Vec2::ZERO);
        orbit.pointer_moved(Vec2::new(5.0, 5.0));
        orbit.pointer_moved(Vec2::new(6.0, 3.0));
        assert_eq!(orbit.delta(), Vec2::new(1.0, -2.0));
    }
}
