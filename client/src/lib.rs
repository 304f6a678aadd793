//! # Presence Client Library
//!
//! Client half of the shared-scene presence system: it predicts the local
//! avatar's motion ahead of the server, mirrors every other participant's
//! state, and renders the scene behind a smoothed follow camera.
//!
//! ## Architecture Overview
//!
//! ### Local Prediction
//! Pad input is integrated on a fixed 20 Hz control tick and applied to the
//! local avatar immediately; the resulting state is then reported to the
//! relay. No server confirmation is ever awaited, and no echo ever comes
//! back for the local id, so the predictor is simply authoritative for the
//! local avatar.
//!
//! ### Remote Reconciliation
//! Broadcasts from the relay arrive asynchronously and are merged into the
//! remote state cache without disturbing predicted state: deltas upsert one
//! participant, full rosters replace the cache wholesale (which is also how
//! departures propagate).
//!
//! ### Latency Masking
//! Remote avatars jump to their last reported state, while the follow camera
//! decays toward the direction of travel instead of snapping, and animation
//! switches cross-fade. Together these hide most of the network's roughness.
//!
//! ## Module Organization
//!
//! - [`predictor`]: fixed-tick movement integration, facing, and the
//!   emission stream sent to the relay.
//! - [`cache`]: the client-side mirror of the server's session registry.
//! - [`camera`]: wrap-safe yaw smoothing and the follow-camera offset.
//! - [`animation`]: clip selection state machine with cross-fade and
//!   missing-clip fallback.
//! - [`input`]: keyboard directional pad with change detection.
//! - [`network`]: the background socket task and its channels.
//! - [`session`]: per-frame orchestration tying the above together.
//! - [`rendering`]: macroquad scene and HUD drawing.
//!
//! ## Concurrency Rules
//!
//! Two writers, strictly separated: the control tick (inside
//! [`session::Session::update`]) is the only writer of predicted state, and
//! the packet path ([`session::Session::handle_packet`]) is the only writer
//! of the cache. The render loop reads both and owns camera and animation
//! clocks. The socket lives on its own thread and communicates through
//! channels only; dropping the handle tears the whole network side down.

pub mod animation;
pub mod cache;
pub mod camera;
pub mod input;
pub mod network;
pub mod predictor;
pub mod rendering;
pub mod session;
