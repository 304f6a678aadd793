//! Directional pad input with change detection.
//!
//! Samples the keyboard every frame and turns it into the pad events the
//! predictor consumes: a 2D direction vector while keys are held, a single
//! stop event on release, and an edge-triggered interact event.

use macroquad::prelude::*;

/// Events produced by the pad, in the order they were detected this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PadEvent {
    /// Direction changed (or started). Components are in [-1, 1];
    /// up on the pad is negative y.
    Move { x: f32, y: f32 },
    /// All movement keys released.
    Stop,
    /// Interact key pressed.
    Interact,
}

pub struct InputPad {
    current: (f32, f32),
    prev_interact: bool,
}

impl InputPad {
    pub fn new() -> Self {
        Self {
            current: (0.0, 0.0),
            prev_interact: false,
        }
    }

    /// The last sampled direction vector.
    pub fn direction(&self) -> (f32, f32) {
        self.current
    }

    /// Samples the keys and reports what changed since the previous frame.
    pub fn update(&mut self) -> Vec<PadEvent> {
        let mut x = 0.0;
        let mut y = 0.0;

        if is_key_down(KeyCode::A) || is_key_down(KeyCode::Left) {
            x -= 1.0;
        }
        if is_key_down(KeyCode::D) || is_key_down(KeyCode::Right) {
            x += 1.0;
        }
        if is_key_down(KeyCode::W) || is_key_down(KeyCode::Up) {
            y -= 1.0;
        }
        if is_key_down(KeyCode::S) || is_key_down(KeyCode::Down) {
            y += 1.0;
        }

        let interact = is_key_down(KeyCode::E);

        let mut events = Vec::new();

        let held = (x, y) != (0.0, 0.0);
        let was_held = self.current != (0.0, 0.0);

        if held && (x, y) != self.current {
            events.push(PadEvent::Move { x, y });
        } else if !held && was_held {
            events.push(PadEvent::Stop);
        }
        self.current = (x, y);

        // Edge detection so holding the key is a single interaction.
        if interact && !self.prev_interact {
            events.push(PadEvent::Interact);
        }
        self.prev_interact = interact;

        events
    }
}

impl Default for InputPad {
    fn default() -> Self {
        Self::new()
    }
}
