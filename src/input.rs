use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// A window event translated into the viewer's vocabulary.
///
/// Events the viewer has no use for (focus, scroll, IME, ...) are dropped by
/// [`Input::handle_event`] and never become an `InputEvent`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    CloseRequested,
    KeyDown { key: KeyCode, repeat: bool },
    KeyUp { key: KeyCode },
    PointerDown { position: Vec2 },
    PointerUp { position: Vec2 },
    PointerMoved { position: Vec2 },
    Resized { width: u32, height: u32 },
}

/// Tracks held keys and the cursor position.
#[derive(Debug, Default)]
pub struct Input {
    keys_down: HashSet<KeyCode>,
    pointer_position: Vec2,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a window event, update the held state and return the matching
    /// [`InputEvent`], if any.
    ///
    /// Only the left mouse button produces pointer down/up events.
    pub fn handle_event(&mut self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::CloseRequested => Some(InputEvent::CloseRequested),
            WindowEvent::Resized(size) => Some(InputEvent::Resized {
                width: size.width,
                height: size.height,
            }),
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return None;
                };
                Some(match event.state {
                    ElementState::Pressed => self.press_key(key, event.repeat),
                    ElementState::Released => self.release_key(key),
                })
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => Some(match state {
                ElementState::Pressed => self.press_pointer(),
                ElementState::Released => self.release_pointer(),
            }),
            WindowEvent::CursorMoved { position, .. } => Some(
                self.move_pointer(Vec2::new(position.x as f32, position.y as f32)),
            ),
            _ => None,
        }
    }

    /// Record a key press.
    ///
    /// A press of a key that is already held counts as a repeat even when the
    /// platform did not flag it.
    pub fn press_key(&mut self, key: KeyCode, repeat: bool) -> InputEvent {
        let already_down = !self.keys_down.insert(key);
        InputEvent::KeyDown {
            key,
            repeat: repeat || already_down,
        }
    }

    pub fn release_key(&mut self, key: KeyCode) -> InputEvent {
        self.keys_down.remove(&key);
        InputEvent::KeyUp { key }
    }

    pub fn press_pointer(&mut self) -> InputEvent {
        InputEvent::PointerDown {
            position: self.pointer_position,
        }
    }

    pub fn release_pointer(&mut self) -> InputEvent {
        InputEvent::PointerUp {
            position: self.pointer_position,
        }
    }

    pub fn move_pointer(&mut self, position: Vec2) -> InputEvent {
        self.pointer_position = position;
        InputEvent::PointerMoved { position }
    }

    /// Returns true if the key is currently held down.
    pub fn key_down(&self, key: KeyCode) -> bool {
        self.keys_down.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_press_of_held_key_is_a_repeat() {
        let mut input = Input::new();
        assert_eq!(
            input.press_key(KeyCode::KeyP, false),
            InputEvent::KeyDown {
                key: KeyCode::KeyP,
                repeat: false
            }
        );
        assert_eq!(
            input.press_key(KeyCode::KeyP, false),
            InputEvent::KeyDown {
                key: KeyCode::KeyP,
                repeat: true
            }
        );
        input.release_key(KeyCode::KeyP);
        assert!(!input.key_down(KeyCode::KeyP));
    }

    #[test]
    fn pointer_events_carry_last_cursor_position() {
        let mut input = Input::new();
        input.move_pointer(Vec2::new(10.0, 20.0));
        assert_eq!(
            input.press_pointer(),
            InputEvent::PointerDown {
                position: Vec2::new(10.0, 20.0)
            }
        );
        input.move_pointer(Vec2::new(15.0, 25.0));
        assert_eq!(
            input.release_pointer(),
            InputEvent::PointerUp {
                position: Vec2::new(15.0, 25.0)
            }
        );
    }
}
