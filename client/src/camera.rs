//! Third-person follow camera yaw smoothing.
//!
//! The camera tracks a target yaw with exponential decay instead of snapping
//! to it, which filters pad jitter out of the framing. The decay always runs
//! along the shortest arc of the angle circle; a naive lerp across the +/-pi
//! seam would swing the camera the long way around.

use shared::{CAMERA_DISTANCE, CAMERA_HEIGHT, CAMERA_SMOOTH_FACTOR};

/// Maps an angle difference into (-pi, pi].
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};

    angle %= TAU;
    if angle > PI {
        angle -= TAU;
    } else if angle <= -PI {
        angle += TAU;
    }
    angle
}

pub struct CameraSmoother {
    current_yaw: f32,
    target_yaw: f32,
    smooth_factor: f32,
}

impl CameraSmoother {
    pub fn new() -> Self {
        Self {
            current_yaw: 0.0,
            target_yaw: 0.0,
            smooth_factor: CAMERA_SMOOTH_FACTOR,
        }
    }

    pub fn current_yaw(&self) -> f32 {
        self.current_yaw
    }

    pub fn set_target(&mut self, yaw: f32) {
        self.target_yaw = yaw;
    }

    /// Points the target directly away from the current view, the
    /// "look where you've been" idle behavior.
    pub fn reverse_target(&mut self) {
        self.target_yaw = self.current_yaw + std::f32::consts::PI;
    }

    /// One render-frame step of exponential decay toward the target.
    pub fn step(&mut self) {
        let diff = normalize_angle(self.target_yaw - self.current_yaw);
        self.current_yaw = normalize_angle(self.current_yaw + diff * self.smooth_factor);
    }

    /// Offset from the avatar to the camera eye for the current yaw.
    pub fn eye_offset(&self) -> [f32; 3] {
        [
            -self.current_yaw.sin() * CAMERA_DISTANCE,
            CAMERA_HEIGHT,
            self.current_yaw.cos() * CAMERA_DISTANCE,
        ]
    }
}

impl Default for CameraSmoother {
    fn default() -> Self {
        Self::new()
    }
}
