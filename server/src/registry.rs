//! Session registry: the server-side source of truth for who is connected.
//!
//! Maps each assigned participant id to its last-known [`PlayerState`] plus
//! the connection bookkeeping needed to route replies and expire dead
//! sessions. An id exists in the registry exactly as long as its connection
//! is considered open; entries are created on connect and removed on
//! disconnect or timeout, never anywhere else.

use log::{debug, info};
use shared::{AnimationTag, PlayerState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// One connected participant as the server sees it.
#[derive(Debug)]
pub struct Participant {
    /// Last state received from (or assigned to) this participant.
    pub state: PlayerState,
    /// Network address replies and fan-outs are sent to.
    pub addr: SocketAddr,
    /// Last time any packet arrived from this address.
    pub last_seen: Instant,
    /// Highest update sequence applied so far. Anything at or below this is
    /// a reordered duplicate and gets dropped.
    pub last_seq: u32,
}

/// Result of applying a state update against the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// State was overwritten; peers should hear about it.
    Applied,
    /// Sequence was not newer than the last applied one.
    Stale,
    /// The id is gone; the participant disconnected between input and relay.
    UnknownId,
}

/// Registry of all open sessions, owned by the relay's main loop.
pub struct SessionRegistry {
    participants: HashMap<u32, Participant>,
    next_id: u32,
    max_participants: usize,
}

impl SessionRegistry {
    pub fn new(max_participants: usize) -> Self {
        Self {
            participants: HashMap::new(),
            next_id: 1,
            max_participants,
        }
    }

    /// Opens a session for a new connection and returns its fresh id, or
    /// `None` when the scene is full. The participant spawns at the origin
    /// with the idle animation.
    pub fn add(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.participants.len() >= self.max_participants {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.participants.insert(
            id,
            Participant {
                state: PlayerState::new(id),
                addr,
                last_seen: Instant::now(),
                last_seq: 0,
            },
        );
        info!("Participant {} joined from {}", id, addr);
        Some(id)
    }

    /// Removes a session. Returns false if the id was already gone.
    pub fn remove(&mut self, id: u32) -> bool {
        let removed = self.participants.remove(&id).is_some();
        if removed {
            info!("Participant {} left", id);
        }
        removed
    }

    /// Overwrites a participant's state with a newer update.
    ///
    /// Updates for unknown ids are a disconnect race, not an error, and are
    /// dropped quietly. Updates with a stale sequence lost to reordering and
    /// are dropped so an older position can never clobber a newer one.
    pub fn apply_update(
        &mut self,
        id: u32,
        seq: u32,
        position: [f32; 3],
        rotation: f32,
        animation: AnimationTag,
    ) -> UpdateOutcome {
        let Some(participant) = self.participants.get_mut(&id) else {
            debug!("Dropping update for unknown participant {}", id);
            return UpdateOutcome::UnknownId;
        };

        participant.last_seen = Instant::now();

        if seq <= participant.last_seq {
            debug!(
                "Dropping stale update for participant {} (seq {} <= {})",
                id, seq, participant.last_seq
            );
            return UpdateOutcome::Stale;
        }

        participant.last_seq = seq;
        participant.state.position = position;
        participant.state.rotation = rotation;
        participant.state.animation = animation;
        UpdateOutcome::Applied
    }

    /// Marks a participant as alive without touching its state.
    pub fn touch(&mut self, id: u32) {
        if let Some(participant) = self.participants.get_mut(&id) {
            participant.last_seen = Instant::now();
        }
    }

    /// Resolves the session owning a socket address, if any.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.participants
            .iter()
            .find(|(_, p)| p.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn state_of(&self, id: u32) -> Option<&PlayerState> {
        self.participants.get(&id).map(|p| &p.state)
    }

    pub fn addr_of(&self, id: u32) -> Option<SocketAddr> {
        self.participants.get(&id).map(|p| p.addr)
    }

    /// Full copy of the registry contents, the payload of `Welcome` and
    /// `Roster` packets.
    pub fn snapshot(&self) -> HashMap<u32, PlayerState> {
        self.participants
            .iter()
            .map(|(id, p)| (*id, p.state.clone()))
            .collect()
    }

    /// Destinations for a fan-out, optionally excluding one id.
    pub fn peer_addrs(&self, exclude: Option<u32>) -> Vec<(u32, SocketAddr)> {
        self.participants
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, p)| (*id, p.addr))
            .collect()
    }

    /// Collects ids that have been silent longer than `timeout`.
    pub fn check_timeouts(&self, timeout: Duration) -> Vec<u32> {
        self.participants
            .iter()
            .filter(|(_, p)| p.last_seen.elapsed() > timeout)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.participants.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn test_add_assigns_fresh_ids_and_default_state() {
        let mut registry = SessionRegistry::new(8);

        let a = registry.add(addr(4000)).unwrap();
        let b = registry.add(addr(4001)).unwrap();
        assert_ne!(a, b);

        let state = registry.state_of(a).unwrap();
        assert_eq!(state.position, [0.0, 0.0, 0.0]);
        assert_eq!(state.rotation, 0.0);
        assert_eq!(state.animation, AnimationTag::Idle);
    }

    #[test]
    fn test_key_set_tracks_connections() {
        let mut registry = SessionRegistry::new(8);
        assert!(registry.is_empty());

        let a = registry.add(addr(4000)).unwrap();
        let b = registry.add(addr(4001)).unwrap();
        let c = registry.add(addr(4002)).unwrap();
        assert_eq!(registry.len(), 3);

        assert!(registry.remove(b));
        let mut ids = registry.ids();
        ids.sort_unstable();
        assert_eq!(ids, vec![a, c]);

        assert!(registry.remove(a));
        assert!(registry.remove(c));
        assert!(registry.is_empty());

        // Removing again is a no-op, not a phantom entry.
        assert!(!registry.remove(a));
    }

    #[test]
    fn test_capacity_limit() {
        let mut registry = SessionRegistry::new(2);
        assert!(registry.add(addr(4000)).is_some());
        assert!(registry.add(addr(4001)).is_some());
        assert!(registry.add(addr(4002)).is_none());

        // A slot frees up after a disconnect.
        let id = registry.find_by_addr(addr(4000)).unwrap();
        registry.remove(id);
        assert!(registry.add(addr(4002)).is_some());
    }

    #[test]
    fn test_ids_not_reused_after_disconnect() {
        let mut registry = SessionRegistry::new(8);
        let first = registry.add(addr(4000)).unwrap();
        registry.remove(first);

        let second = registry.add(addr(4000)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_apply_update_overwrites_state() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();

        let outcome =
            registry.apply_update(id, 1, [1.0, 0.0, 2.0], 0.5, AnimationTag::Running);
        assert_eq!(outcome, UpdateOutcome::Applied);

        let state = registry.state_of(id).unwrap();
        assert_eq!(state.position, [1.0, 0.0, 2.0]);
        assert_eq!(state.rotation, 0.5);
        assert_eq!(state.animation, AnimationTag::Running);
    }

    #[test]
    fn test_update_for_unknown_id_is_noop() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();
        registry.remove(id);

        let outcome =
            registry.apply_update(id, 1, [9.0, 0.0, 9.0], 1.0, AnimationTag::Running);
        assert_eq!(outcome, UpdateOutcome::UnknownId);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_sequence_is_dropped() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();

        registry.apply_update(id, 5, [5.0, 0.0, 0.0], 0.2, AnimationTag::Running);

        // A reordered older update must not clobber the newer position.
        let outcome =
            registry.apply_update(id, 3, [3.0, 0.0, 0.0], 0.1, AnimationTag::Running);
        assert_eq!(outcome, UpdateOutcome::Stale);
        assert_eq!(registry.state_of(id).unwrap().position, [5.0, 0.0, 0.0]);

        // Replaying the same sequence is also a no-op.
        let outcome =
            registry.apply_update(id, 5, [9.0, 0.0, 0.0], 0.9, AnimationTag::Idle);
        assert_eq!(outcome, UpdateOutcome::Stale);
        assert_eq!(registry.state_of(id).unwrap().position, [5.0, 0.0, 0.0]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();

        let snapshot = registry.snapshot();
        registry.apply_update(id, 1, [1.0, 0.0, 0.0], 0.0, AnimationTag::Running);

        assert_eq!(snapshot[&id].position, [0.0, 0.0, 0.0]);
        assert_eq!(registry.state_of(id).unwrap().position, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_peer_addrs_excludes_sender() {
        let mut registry = SessionRegistry::new(8);
        let a = registry.add(addr(4000)).unwrap();
        let b = registry.add(addr(4001)).unwrap();
        let c = registry.add(addr(4002)).unwrap();

        let peers = registry.peer_addrs(Some(b));
        let ids: Vec<u32> = peers.iter().map(|(id, _)| *id).collect();
        assert_eq!(peers.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&c));
        assert!(!ids.contains(&b));

        assert_eq!(registry.peer_addrs(None).len(), 3);
    }

    #[test]
    fn test_find_by_addr() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();

        assert_eq!(registry.find_by_addr(addr(4000)), Some(id));
        assert_eq!(registry.find_by_addr(addr(4999)), None);
    }

    #[test]
    fn test_timeout_sweep() {
        let mut registry = SessionRegistry::new(8);
        let id = registry.add(addr(4000)).unwrap();

        assert!(registry.check_timeouts(Duration::from_secs(60)).is_empty());

        std::thread::sleep(Duration::from_millis(5));
        let timed_out = registry.check_timeouts(Duration::from_millis(1));
        assert_eq!(timed_out, vec![id]);

        // Any packet activity resets the clock.
        registry.touch(id);
        assert!(registry
            .check_timeouts(Duration::from_millis(1000))
            .is_empty());
    }
}
