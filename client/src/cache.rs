//! Client-side mirror of the server's session registry.
//!
//! Updated only by the network receive path, read by the render loop. The
//! merge rules are the whole contract: a delta upserts exactly one id, a
//! roster replaces everything (which is how disconnected participants
//! disappear, there is no removal message).

use shared::PlayerState;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct RemoteStateCache {
    players: HashMap<u32, PlayerState>,
}

impl RemoteStateCache {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Merges a single-participant delta. Other keys are untouched.
    pub fn apply_delta(&mut self, id: u32, player: PlayerState) {
        self.players.insert(id, player);
    }

    /// Replaces the whole cache with a full snapshot. Ids absent from the
    /// snapshot are implicitly removed.
    pub fn apply_roster(&mut self, players: HashMap<u32, PlayerState>) {
        self.players = players;
    }

    pub fn get(&self, id: u32) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.players.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Everyone except the local participant. The local avatar is always
    /// rendered from predicted state, never from a (possibly stale) echo.
    pub fn remote_players(&self, self_id: Option<u32>) -> impl Iterator<Item = &PlayerState> {
        self.players
            .values()
            .filter(move |p| Some(p.id) != self_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::AnimationTag;

    fn moved(id: u32, x: f32) -> PlayerState {
        PlayerState {
            id,
            position: [x, 0.0, 0.0],
            rotation: 0.5,
            animation: AnimationTag::Running,
        }
    }

    #[test]
    fn test_delta_upserts_one_key() {
        let mut cache = RemoteStateCache::new();
        cache.apply_delta(1, moved(1, 1.0));
        cache.apply_delta(2, moved(2, 2.0));

        cache.apply_delta(1, moved(1, 5.0));

        assert_eq!(cache.get(1).unwrap().position[0], 5.0);
        // The untouched key keeps its previous value.
        assert_eq!(cache.get(2).unwrap().position[0], 2.0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_delta_is_idempotent() {
        let mut cache = RemoteStateCache::new();

        cache.apply_delta(1, moved(1, 3.0));
        let once: Vec<_> = {
            let mut v: Vec<_> = cache.players.iter().map(|(k, p)| (*k, p.clone())).collect();
            v.sort_by_key(|(k, _)| *k);
            v
        };

        cache.apply_delta(1, moved(1, 3.0));
        let twice: Vec<_> = {
            let mut v: Vec<_> = cache.players.iter().map(|(k, p)| (*k, p.clone())).collect();
            v.sort_by_key(|(k, _)| *k);
            v
        };

        assert_eq!(once, twice);
    }

    #[test]
    fn test_deltas_commute_across_ids() {
        let mut forward = RemoteStateCache::new();
        forward.apply_delta(1, moved(1, 1.0));
        forward.apply_delta(2, moved(2, 2.0));

        let mut reverse = RemoteStateCache::new();
        reverse.apply_delta(2, moved(2, 2.0));
        reverse.apply_delta(1, moved(1, 1.0));

        assert_eq!(forward.get(1), reverse.get(1));
        assert_eq!(forward.get(2), reverse.get(2));
        assert_eq!(forward.len(), reverse.len());
    }

    #[test]
    fn test_roster_replaces_wholesale() {
        let mut cache = RemoteStateCache::new();
        cache.apply_delta(1, moved(1, 1.0));
        cache.apply_delta(2, moved(2, 2.0));
        cache.apply_delta(3, moved(3, 3.0));

        let mut roster = HashMap::new();
        roster.insert(2, moved(2, 9.0));
        cache.apply_roster(roster);

        // Ids absent from the snapshot are gone, even though no removal
        // message ever named them.
        assert!(!cache.contains(1));
        assert!(!cache.contains(3));
        assert_eq!(cache.get(2).unwrap().position[0], 9.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_empty_roster_clears_cache() {
        let mut cache = RemoteStateCache::new();
        cache.apply_delta(1, moved(1, 1.0));

        cache.apply_roster(HashMap::new());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remote_players_skips_self() {
        let mut cache = RemoteStateCache::new();
        cache.apply_delta(1, moved(1, 1.0));
        cache.apply_delta(2, moved(2, 2.0));

        let ids: Vec<u32> = cache.remote_players(Some(1)).map(|p| p.id).collect();
        assert_eq!(ids, vec![2]);

        // Before the welcome arrives there is no self to suppress.
        let mut all: Vec<u32> = cache.remote_players(None).map(|p| p.id).collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2]);
    }
}
