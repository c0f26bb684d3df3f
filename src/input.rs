use glam::Vec2;

use crate::controls::OrbitControls;

/// Identifier for a mouse button (primary button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const PRIMARY: Self = Self(0);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

/// Pointer input in canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    Down { button: MouseButton, position: Vec2 },
    Move { position: Vec2 },
    Up { button: MouseButton },
    Wheel { delta_y: f32 },
}

/// Turns raw pointer events into orbit-control operations.
#[derive(Debug, Default)]
pub struct DragTracker {
    active: Option<MouseButton>,
    last: Vec2,
}

impl DragTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    /// Feeds one event; rotation only happens while the primary button is held.
    pub fn handle(
        &mut self,
        input: PointerInput,
        controls: &mut OrbitControls,
        viewport_height: f32,
    ) {
        match input {
            PointerInput::Down { button, position } => {
                if button == MouseButton::PRIMARY {
                    self.active = Some(button);
                    self.last = position;
                }
            }
            PointerInput::Move { position } => {
                if self.active.is_some() {
                    let delta = position - self.last;
                    controls.rotate_by_pixels(delta.x, delta.y, viewport_height);
                }
                self.last = position;
            }
            PointerInput::Up { button } => {
                if self.active == Some(button) {
                    self.active = None;
                }
            }
            PointerInput::Wheel { delta_y } => controls.zoom(delta_y),
        }
    }
}
