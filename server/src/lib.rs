//! # Presence Relay Server Library
//!
//! Server half of the shared-scene presence system. It keeps the canonical
//! registry of connected participants and republishes their state updates so
//! every client's mirror of the scene stays approximately consistent.
//!
//! ## Core Responsibilities
//!
//! ### Session Registry
//! The single source of truth for who is currently in the scene and where.
//! An id is present in the registry exactly while its connection is open:
//! inserted with a default spawn state on connect, overwritten on every
//! accepted `PlayerMove`, and deleted on disconnect or timeout.
//!
//! ### Broadcast Relay
//! The server does not simulate movement; clients are authoritative for
//! their own avatars. On each accepted update the relay mutates the registry
//! and fans the delta out to every other open connection. On disconnect it
//! broadcasts the full roster instead, which is how removals reach clients
//! without a dedicated message type.
//!
//! ## Architecture Design
//!
//! ### Serialized Mutation
//! All registry writes and fan-out decisions happen on a single `run` loop
//! fed by mpsc channels, so there is one consistent ordering of updates.
//! Socket reads, socket writes, and the timeout sweep run as separate tokio
//! tasks.
//!
//! ### Best-Effort Delivery
//! Fan-out is fire-and-forget. There are no acknowledgments and no retries;
//! a send failure toward one peer is logged and delivery to the remaining
//! peers continues. No single connection's failure can take the relay down.
//!
//! ## Module Organization
//!
//! - [`registry`]: session bookkeeping and last-known participant state,
//!   including the per-sender sequence gate that drops reordered updates.
//! - [`network`]: UDP plumbing, packet dispatch, and the welcome/delta/roster
//!   fan-out logic.

pub mod network;
pub mod registry;
