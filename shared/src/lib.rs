//! Wire contract shared by the presence server and client.
//!
//! Both halves of the system speak bincode-encoded [`Packet`]s over UDP and
//! agree on the tuning constants defined here, so movement speed and camera
//! behavior stay identical regardless of which binary is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Bumped whenever the packet layout changes incompatibly.
pub const PROTOCOL_VERSION: u32 = 1;

/// World units moved per control tick at full pad deflection.
pub const MOVE_SPEED: f32 = 0.2;
/// Fixed interval of the client control tick (20 Hz), independent of frame rate.
pub const CONTROL_TICK: Duration = Duration::from_millis(50);
/// Exponential decay factor applied to the camera yaw each rendered frame.
pub const CAMERA_SMOOTH_FACTOR: f32 = 0.05;
/// Horizontal distance from the avatar to the follow camera.
pub const CAMERA_DISTANCE: f32 = 10.0;
/// Height of the follow camera above the avatar.
pub const CAMERA_HEIGHT: f32 = 5.0;
/// Delay after movement stops before the camera turns to look back.
pub const STOP_GRACE: Duration = Duration::from_millis(1000);
/// Duration of the cross-fade between animation clips.
pub const CROSS_FADE: Duration = Duration::from_millis(500);

/// Named animation clip attached to a participant.
///
/// The set is closed on the wire; an unloaded clip on the rendering side is
/// handled there by falling back to [`AnimationTag::Idle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AnimationTag {
    #[default]
    Idle,
    Running,
    Interacting,
    /// Bind pose shown before any real clip has been selected.
    TPose,
}

impl AnimationTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnimationTag::Idle => "Idle",
            AnimationTag::Running => "Running",
            AnimationTag::Interacting => "Interacting",
            AnimationTag::TPose => "TPose",
        }
    }

    /// Looks up a tag by clip name. Unknown names yield `None`; callers are
    /// expected to fall back to `Idle`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Idle" => Some(AnimationTag::Idle),
            "Running" => Some(AnimationTag::Running),
            "Interacting" => Some(AnimationTag::Interacting),
            "TPose" => Some(AnimationTag::TPose),
            _ => None,
        }
    }
}

/// Last-known state of one connected participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Identity assigned by the server, stable for the lifetime of one connection.
    pub id: u32,
    /// World position.
    pub position: [f32; 3],
    /// Yaw in radians. No pitch or roll.
    pub rotation: f32,
    pub animation: AnimationTag,
}

impl PlayerState {
    /// Spawn state for a freshly connected participant.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            position: [0.0, 0.0, 0.0],
            rotation: 0.0,
            animation: AnimationTag::Idle,
        }
    }
}

/// Everything that crosses the wire, in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    /// Client -> server: request to join the scene.
    Connect {
        client_version: u32,
    },
    /// Client -> server: locally predicted state after a control tick.
    /// `seq` increases per sender; the server drops anything older than the
    /// last applied update.
    PlayerMove {
        seq: u32,
        position: [f32; 3],
        rotation: f32,
        animation: AnimationTag,
    },
    /// Client -> server: keep-alive while the pad is idle.
    Ping,
    /// Client -> server: graceful close.
    Disconnect,

    /// Server -> the joining client only: own state plus a full snapshot.
    Welcome {
        player: PlayerState,
        players: HashMap<u32, PlayerState>,
    },
    /// Server -> every peer except the mover: single-participant update.
    StateDelta {
        id: u32,
        player: PlayerState,
    },
    /// Server -> everyone: full registry snapshot. Replaces the receiving
    /// cache wholesale, which is how removals propagate.
    Roster {
        players: HashMap<u32, PlayerState>,
    },
    /// Server -> client: the session is over.
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_player_state() {
        let state = PlayerState::new(7);
        assert_eq!(state.id, 7);
        assert_eq!(state.position, [0.0, 0.0, 0.0]);
        assert_eq!(state.rotation, 0.0);
        assert_eq!(state.animation, AnimationTag::Idle);
    }

    #[test]
    fn test_animation_tag_names() {
        for tag in [
            AnimationTag::Idle,
            AnimationTag::Running,
            AnimationTag::Interacting,
            AnimationTag::TPose,
        ] {
            assert_eq!(AnimationTag::from_name(tag.as_str()), Some(tag));
        }

        assert_eq!(AnimationTag::from_name("Swimming"), None);
        assert_eq!(AnimationTag::from_name(""), None);
    }

    #[test]
    fn test_packet_serialization_player_move() {
        let packet = Packet::PlayerMove {
            seq: 9,
            position: [1.5, 0.0, -2.25],
            rotation: 0.5,
            animation: AnimationTag::Running,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::PlayerMove {
                seq,
                position,
                rotation,
                animation,
            } => {
                assert_eq!(seq, 9);
                assert_eq!(position, [1.5, 0.0, -2.25]);
                assert_eq!(rotation, 0.5);
                assert_eq!(animation, AnimationTag::Running);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_welcome() {
        let mut players = HashMap::new();
        players.insert(1, PlayerState::new(1));
        players.insert(2, PlayerState::new(2));

        let packet = Packet::Welcome {
            player: PlayerState::new(2),
            players,
        };

        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Welcome { player, players } => {
                assert_eq!(player.id, 2);
                assert_eq!(players.len(), 2);
                assert!(players.contains_key(&1));
                assert!(players.contains_key(&2));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_roster() {
        let mut players = HashMap::new();
        players.insert(4, PlayerState::new(4));

        let packet = Packet::Roster { players };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Roster { players } => {
                assert_eq!(players.len(), 1);
                assert_eq!(players[&4].id, 4);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_malformed_packet_rejected() {
        let valid = bincode::serialize(&Packet::Ping).unwrap();

        let truncated = &valid[..valid.len().saturating_sub(1)];
        assert!(bincode::deserialize::<Packet>(truncated).is_err());

        assert!(bincode::deserialize::<Packet>(&[0xFF; 16]).is_err());
        assert!(bincode::deserialize::<Packet>(&[]).is_err());
    }
}
