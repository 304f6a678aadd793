//! Animation clip selection and cross-fading.
//!
//! Small state machine over the closed clip set: movement flips between
//! `Running` and `Idle`, an explicit interaction overrides both until the
//! next movement event, and a clip missing from the loaded set degrades to
//! `Idle` with a warning instead of failing.

use log::warn;
use shared::{AnimationTag, CROSS_FADE};
use std::collections::HashSet;
use std::time::Duration;

pub struct AnimationSelector {
    current: AnimationTag,
    previous: AnimationTag,
    /// Seconds since the last clip switch, capped at the fade duration.
    fade_elapsed: f32,
    /// Clips actually available to the playback layer.
    loaded: HashSet<AnimationTag>,
}

impl AnimationSelector {
    pub fn new() -> Self {
        Self::with_loaded_clips(
            [
                AnimationTag::Idle,
                AnimationTag::Running,
                AnimationTag::Interacting,
                AnimationTag::TPose,
            ]
            .into_iter()
            .collect(),
        )
    }

    pub fn with_loaded_clips(loaded: HashSet<AnimationTag>) -> Self {
        Self {
            current: AnimationTag::Idle,
            previous: AnimationTag::Idle,
            fade_elapsed: CROSS_FADE.as_secs_f32(),
            loaded,
        }
    }

    pub fn current(&self) -> AnimationTag {
        self.current
    }

    pub fn previous(&self) -> AnimationTag {
        self.previous
    }

    pub fn movement_started(&mut self) {
        self.set_tag(AnimationTag::Running);
    }

    pub fn movement_stopped(&mut self) {
        self.set_tag(AnimationTag::Idle);
    }

    /// Explicit action trigger. Sticks until a movement event replaces it.
    pub fn interact(&mut self) {
        self.set_tag(AnimationTag::Interacting);
    }

    /// Switches to the requested clip, starting a cross-fade. Requesting the
    /// already-active clip is a no-op so held input does not restart fades.
    pub fn set_tag(&mut self, tag: AnimationTag) {
        let resolved = self.resolve_clip(tag);
        if resolved == self.current {
            return;
        }
        self.previous = self.current;
        self.current = resolved;
        self.fade_elapsed = 0.0;
    }

    /// Falls back to `Idle` when the requested clip never loaded.
    fn resolve_clip(&self, tag: AnimationTag) -> AnimationTag {
        if self.loaded.contains(&tag) {
            tag
        } else {
            warn!(
                "Animation clip '{}' is not loaded, falling back to Idle",
                tag.as_str()
            );
            AnimationTag::Idle
        }
    }

    /// Advances the cross-fade clock; driven by the render loop.
    pub fn advance(&mut self, dt: Duration) {
        let limit = CROSS_FADE.as_secs_f32();
        self.fade_elapsed = (self.fade_elapsed + dt.as_secs_f32()).min(limit);
    }

    /// Blend weight of the current clip over the previous one, in [0, 1].
    pub fn blend(&self) -> f32 {
        let limit = CROSS_FADE.as_secs_f32();
        if limit <= 0.0 {
            return 1.0;
        }
        (self.fade_elapsed / limit).clamp(0.0, 1.0)
    }
}

impl Default for AnimationSelector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_starts_idle_with_no_fade() {
        let selector = AnimationSelector::new();
        assert_eq!(selector.current(), AnimationTag::Idle);
        assert_approx_eq!(selector.blend(), 1.0, 1e-6);
    }

    #[test]
    fn test_movement_transitions() {
        let mut selector = AnimationSelector::new();

        selector.movement_started();
        assert_eq!(selector.current(), AnimationTag::Running);
        assert_eq!(selector.previous(), AnimationTag::Idle);

        selector.movement_stopped();
        assert_eq!(selector.current(), AnimationTag::Idle);
        assert_eq!(selector.previous(), AnimationTag::Running);
    }

    #[test]
    fn test_interact_sticks_until_movement() {
        let mut selector = AnimationSelector::new();

        selector.interact();
        assert_eq!(selector.current(), AnimationTag::Interacting);

        // Interact again: still interacting, fade not restarted.
        selector.advance(Duration::from_millis(200));
        let blend = selector.blend();
        selector.interact();
        assert_approx_eq!(selector.blend(), blend, 1e-6);

        selector.movement_started();
        assert_eq!(selector.current(), AnimationTag::Running);
    }

    #[test]
    fn test_repeated_tag_does_not_restart_fade() {
        let mut selector = AnimationSelector::new();
        selector.movement_started();
        selector.advance(Duration::from_millis(300));

        selector.movement_started();
        assert!(selector.blend() > 0.5);
    }

    #[test]
    fn test_cross_fade_progress() {
        let mut selector = AnimationSelector::new();
        selector.movement_started();
        assert_approx_eq!(selector.blend(), 0.0, 1e-6);

        selector.advance(Duration::from_millis(250));
        assert_approx_eq!(selector.blend(), 0.5, 1e-3);

        selector.advance(Duration::from_millis(500));
        assert_approx_eq!(selector.blend(), 1.0, 1e-6);
    }

    #[test]
    fn test_unloaded_clip_falls_back_to_idle() {
        let mut selector = AnimationSelector::with_loaded_clips(
            [AnimationTag::Idle, AnimationTag::Running].into_iter().collect(),
        );

        selector.interact();
        assert_eq!(selector.current(), AnimationTag::Idle);

        // Movement still works with the reduced clip set.
        selector.movement_started();
        assert_eq!(selector.current(), AnimationTag::Running);
    }
}
