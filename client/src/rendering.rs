//! Scene rendering: follow camera, ground plane, avatars, HUD.
//!
//! Thin consumer of the synchronized state. The local avatar is always drawn
//! from predicted state and every remote avatar from the cache; the camera
//! eye comes from the smoothed yaw, never from raw input.

use crate::session::Session;
use macroquad::prelude::*;
use shared::{AnimationTag, PlayerState};

const AVATAR_SIZE: Vec3 = vec3(0.8, 1.6, 0.8);
const FLOOR_COLOR: Color = Color::new(0.13, 0.35, 0.16, 1.0);

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, session: &Session) {
        clear_background(Color::from_rgba(26, 26, 38, 255));

        if !session.is_connected() {
            self.draw_status_screen(session);
            return;
        }

        let local = session.local_player();
        let focus = vec3(local.position[0], 1.0, local.position[2]);
        let offset = session.camera().eye_offset();

        set_camera(&Camera3D {
            position: focus + vec3(offset[0], offset[1], offset[2]),
            target: focus,
            up: vec3(0.0, 1.0, 0.0),
            ..Default::default()
        });

        self.draw_floor();

        self.draw_avatar(local, self.local_color(session), true);
        for player in session.cache().remote_players(session.self_id()) {
            self.draw_avatar(player, tag_color(player.animation), false);
        }

        set_default_camera();
        self.draw_hud(session);
    }

    fn draw_floor(&self) {
        draw_grid(60, 1.0, Color::from_rgba(60, 90, 60, 255), FLOOR_COLOR);
    }

    /// Local avatar color cross-fades between the previous and current clip.
    fn local_color(&self, session: &Session) -> Color {
        let selector = session.selector();
        let from = tag_color(selector.previous());
        let to = tag_color(selector.current());
        lerp_color(from, to, selector.blend())
    }

    fn draw_avatar(&self, player: &PlayerState, color: Color, is_local: bool) {
        let center = vec3(
            player.position[0],
            player.position[1] + AVATAR_SIZE.y / 2.0,
            player.position[2],
        );
        draw_cube(center, AVATAR_SIZE, None, color);
        draw_cube_wires(center, AVATAR_SIZE, if is_local { WHITE } else { GRAY });

        // Nose block showing which way the avatar faces.
        let nose = vec3(
            center.x + player.rotation.sin() * 0.6,
            center.y + 0.4,
            center.z + player.rotation.cos() * 0.6,
        );
        draw_cube(nose, vec3(0.2, 0.2, 0.2), None, WHITE);
    }

    fn draw_hud(&self, session: &Session) {
        let count = session.participant_count();
        draw_text(&format!("{} in scene", count), 10.0, 20.0, 20.0, WHITE);

        for i in 0..count.min(16) {
            draw_rectangle(
                10.0 + (i as f32) * 6.0,
                28.0,
                4.0,
                4.0,
                Color::from_rgba(0, 170, 255, 255),
            );
        }

        let (label, color) = match session.self_id() {
            Some(id) => (format!("connected as {}", id), GREEN),
            None => ("connecting...".to_string(), YELLOW),
        };
        draw_rectangle(10.0, 40.0, 8.0, 8.0, color);
        draw_text(&label, 24.0, 48.0, 16.0, WHITE);

        let anim = session.selector().current().as_str();
        draw_text(anim, 10.0, 66.0, 16.0, LIGHTGRAY);
    }

    fn draw_status_screen(&self, session: &Session) {
        let message = match session.closed_reason() {
            Some(reason) => format!("Disconnected: {}", reason),
            None => "Connecting to server...".to_string(),
        };
        let size = 30.0;
        let width = measure_text(&message, None, size as u16, 1.0).width;
        draw_text(
            &message,
            (screen_width() - width) / 2.0,
            screen_height() / 2.0,
            size,
            WHITE,
        );
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn tag_color(tag: AnimationTag) -> Color {
    match tag {
        AnimationTag::Idle => Color::from_rgba(160, 160, 170, 255),
        AnimationTag::Running => Color::from_rgba(255, 150, 50, 255),
        AnimationTag::Interacting => Color::from_rgba(80, 160, 255, 255),
        AnimationTag::TPose => Color::from_rgba(120, 120, 120, 255),
    }
}

fn lerp_color(from: Color, to: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    Color::new(
        from.r + (to.r - from.r) * t,
        from.g + (to.g - from.g) * t,
        from.b + (to.b - from.b) * t,
        from.a + (to.a - from.a) * t,
    )
}
