//! Per-frame session orchestration.
//!
//! `Session` glues the predictor, cache, camera and animation selector
//! together without touching the socket or the window: incoming packets are
//! fed in by the caller and outgoing packets accumulate in an outbox the
//! caller drains. That keeps the ownership rules simple. The control tick is
//! the only writer of predicted state, the packet path is the only writer of
//! the cache, and the render loop just reads.

use crate::animation::AnimationSelector;
use crate::cache::RemoteStateCache;
use crate::camera::CameraSmoother;
use crate::input::PadEvent;
use crate::predictor::MotionPredictor;
use log::{debug, info, warn};
use shared::{Packet, PlayerState, CONTROL_TICK};
use std::time::Duration;

pub struct Session {
    predictor: MotionPredictor,
    cache: RemoteStateCache,
    camera: CameraSmoother,
    selector: AnimationSelector,

    self_id: Option<u32>,
    closed_reason: Option<String>,

    /// Carries fractional frame time between fixed control ticks.
    tick_accumulator: Duration,
    outbox: Vec<Packet>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            predictor: MotionPredictor::new(),
            cache: RemoteStateCache::new(),
            camera: CameraSmoother::new(),
            selector: AnimationSelector::new(),
            self_id: None,
            closed_reason: None,
            tick_accumulator: Duration::ZERO,
            outbox: Vec::new(),
        }
    }

    pub fn self_id(&self) -> Option<u32> {
        self.self_id
    }

    pub fn is_connected(&self) -> bool {
        self.self_id.is_some() && self.closed_reason.is_none()
    }

    /// Why the server ended the session, once it has.
    pub fn closed_reason(&self) -> Option<&str> {
        self.closed_reason.as_deref()
    }

    pub fn local_player(&self) -> &PlayerState {
        self.predictor.state()
    }

    pub fn cache(&self) -> &RemoteStateCache {
        &self.cache
    }

    pub fn camera(&self) -> &CameraSmoother {
        &self.camera
    }

    pub fn selector(&self) -> &AnimationSelector {
        &self.selector
    }

    /// Participants currently in the scene, the local one included.
    pub fn participant_count(&self) -> usize {
        let self_cached = self
            .self_id
            .map(|id| self.cache.contains(id))
            .unwrap_or(false);
        self.cache.len() + usize::from(self.is_connected() && !self_cached)
    }

    /// Packets queued since the last drain.
    pub fn take_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }

    /// Merges one server packet into local state.
    pub fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Welcome { player, players } => {
                info!("Joined scene as participant {}", player.id);
                self.self_id = Some(player.id);
                self.predictor.adopt(player);
                self.cache.apply_roster(players);
            }

            Packet::StateDelta { id, player } => {
                // The relay excludes the sender, so a self delta is a stale
                // echo; predicted state stays authoritative for the local id.
                if Some(id) == self.self_id {
                    debug!("Ignoring self echo in state delta");
                    return;
                }
                self.cache.apply_delta(id, player);
            }

            Packet::Roster { players } => {
                self.cache.apply_roster(players);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected by server: {}", reason);
                self.closed_reason = Some(reason);
            }

            _ => {
                warn!("Unexpected packet type from server");
            }
        }
    }

    /// Feeds one pad event into the predictor and animation selector.
    pub fn handle_pad_event(&mut self, event: PadEvent) {
        match event {
            PadEvent::Move { x, y } => {
                self.predictor.set_direction(x, y);
                self.selector.movement_started();
            }
            PadEvent::Stop => {
                self.predictor.release();
                self.selector.movement_stopped();
            }
            PadEvent::Interact => {
                self.selector.interact();
                let out = self.predictor.interact();
                self.queue_move(out);
            }
        }
    }

    /// Advances clocks by one rendered frame: fixed-rate control ticks, the
    /// stop-grace camera reversal, yaw smoothing and the cross-fade clock.
    pub fn update(&mut self, dt: Duration) {
        self.tick_accumulator += dt;
        while self.tick_accumulator >= CONTROL_TICK {
            self.tick_accumulator -= CONTROL_TICK;
            self.control_tick();
        }

        if self.predictor.look_back_due() {
            self.camera.reverse_target();
        }

        self.camera.step();
        self.selector.advance(dt);
    }

    /// One fixed 20 Hz step of movement prediction and state emission.
    fn control_tick(&mut self) {
        let camera_yaw = self.camera.current_yaw();
        if let Some(out) = self.predictor.tick(camera_yaw) {
            if self.predictor.is_moving() {
                // Camera chases the direction of travel while it lasts.
                self.camera.set_target(out.rotation);
            }
            self.queue_move(out);
        }
    }

    fn queue_move(&mut self, out: crate::predictor::StepOutput) {
        // Nothing to report until the server has told us who we are.
        if self.self_id.is_none() {
            return;
        }
        self.outbox.push(Packet::PlayerMove {
            seq: out.seq,
            position: out.position,
            rotation: out.rotation,
            animation: out.animation,
        });
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
