//! Local motion prediction.
//!
//! The predictor owns the local participant's state and advances it on a
//! fixed control tick, without waiting for any server round trip. Each tick
//! that produces movement (and the single tick after the pad is released)
//! yields an emission the session forwards to the relay.

use shared::{AnimationTag, PlayerState, MOVE_SPEED, STOP_GRACE};
use std::time::{Duration, Instant};

/// What a control tick produced, if anything.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Outgoing sequence number for the relay's reorder gate.
    pub seq: u32,
    pub position: [f32; 3],
    pub rotation: f32,
    pub animation: AnimationTag,
}

/// Advances the local avatar from pad input, one fixed tick at a time.
///
/// Single-writer rule: only the control tick mutates the state held here;
/// incoming broadcasts never touch the local participant.
pub struct MotionPredictor {
    state: PlayerState,
    /// Last reported pad vector, components in [-1, 1]. `None` after release.
    direction: Option<(f32, f32)>,
    /// Set while a release still owes the final idle emission.
    pending_stop: bool,
    /// When the pad was released; drives the look-back camera grace.
    stopped_at: Option<Instant>,
    reverse_fired: bool,
    next_seq: u32,
}

impl MotionPredictor {
    pub fn new() -> Self {
        Self {
            state: PlayerState::new(0),
            direction: None,
            pending_stop: false,
            stopped_at: None,
            reverse_fired: false,
            next_seq: 1,
        }
    }

    /// Seeds the predictor from the server's welcome state.
    pub fn adopt(&mut self, state: PlayerState) {
        self.state = state;
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    /// Reports the current pad vector. Components are clamped per axis;
    /// diagonal deflection is intentionally not jointly normalized.
    pub fn set_direction(&mut self, x: f32, y: f32) {
        self.direction = Some((x.clamp(-1.0, 1.0), y.clamp(-1.0, 1.0)));
        self.pending_stop = false;
        self.stopped_at = None;
        self.reverse_fired = false;
    }

    /// The pad was released: the next tick emits one final idle update.
    pub fn release(&mut self) {
        if self.direction.take().is_some() {
            self.pending_stop = true;
            self.stopped_at = Some(Instant::now());
            self.reverse_fired = false;
        }
    }

    pub fn is_moving(&self) -> bool {
        self.direction.is_some()
    }

    /// Marks an explicit interaction. The tag sticks until movement resumes,
    /// and the change is emitted immediately rather than on the next tick.
    pub fn interact(&mut self) -> StepOutput {
        self.state.animation = AnimationTag::Interacting;
        self.emit()
    }

    /// Runs one fixed-rate control tick.
    ///
    /// While the pad is deflected this integrates a camera-relative
    /// displacement, turns the avatar to face it, and emits the new state.
    /// Facing is only defined by motion: a zero displacement leaves the
    /// rotation untouched. After a release exactly one idle emission is
    /// produced, then the predictor goes quiet.
    pub fn tick(&mut self, camera_yaw: f32) -> Option<StepOutput> {
        if let Some((x, y)) = self.direction {
            let (sin_yaw, cos_yaw) = camera_yaw.sin_cos();

            // Forward is where the camera looks, projected on the ground.
            let forward = [-sin_yaw, 0.0, cos_yaw];
            let right = [cos_yaw, 0.0, sin_yaw];

            let dx = forward[0] * (-y * MOVE_SPEED) + right[0] * (x * MOVE_SPEED);
            let dz = forward[2] * (-y * MOVE_SPEED) + right[2] * (x * MOVE_SPEED);

            if dx == 0.0 && dz == 0.0 {
                return None;
            }

            self.state.position[0] += dx;
            self.state.position[2] += dz;
            self.state.rotation = dx.atan2(dz);
            self.state.animation = AnimationTag::Running;
            return Some(self.emit());
        }

        if self.pending_stop {
            self.pending_stop = false;
            self.state.animation = AnimationTag::Idle;
            return Some(self.emit());
        }

        None
    }

    /// Fires once, `STOP_GRACE` after the pad was released, to let the
    /// camera turn around and look back along the path of travel.
    pub fn reverse_due(&mut self, grace: Duration) -> bool {
        match self.stopped_at {
            Some(stopped) if !self.reverse_fired && stopped.elapsed() >= grace => {
                self.reverse_fired = true;
                true
            }
            _ => false,
        }
    }

    /// Convenience wrapper using the shared grace constant.
    pub fn look_back_due(&mut self) -> bool {
        self.reverse_due(STOP_GRACE)
    }

    fn emit(&mut self) -> StepOutput {
        let seq = self.next_seq;
        self.next_seq += 1;
        StepOutput {
            seq,
            position: self.state.position,
            rotation: self.state.rotation,
            animation: self.state.animation,
        }
    }
}

impl Default for MotionPredictor {
    fn default() -> Self {
        Self::new()
    }
}
