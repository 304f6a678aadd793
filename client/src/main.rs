mod animation;
mod cache;
mod camera;
mod input;
mod network;
mod predictor;
mod rendering;
mod session;

use clap::Parser;
use input::InputPad;
use log::{error, info};
use network::NetworkHandle;
use rendering::Renderer;
use session::Session;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

fn window_conf() -> macroquad::prelude::Conf {
    macroquad::prelude::Conf {
        window_title: "Presence".to_string(),
        window_width: 1024,
        window_height: 768,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: WASD/arrows to move, E to interact");

    let net = match NetworkHandle::connect(&args.server, args.fake_ping) {
        Ok(net) => net,
        Err(e) => {
            error!("Failed to start network channel: {}", e);
            return;
        }
    };
    let mut session = Session::new();
    let mut pad = InputPad::new();
    let mut renderer = Renderer::new();

    loop {
        // Network receive path: sole writer of the remote cache.
        for packet in net.drain_incoming() {
            session.handle_packet(packet);
        }

        for event in pad.update() {
            session.handle_pad_event(event);
        }

        let dt = Duration::from_secs_f32(macroquad::time::get_frame_time());
        session.update(dt);

        for packet in session.take_outbox() {
            net.send(packet);
        }

        renderer.render(&session);

        if macroquad::input::is_key_pressed(macroquad::input::KeyCode::Escape) {
            break;
        }

        macroquad::window::next_frame().await;
    }

    // Dropping the handle sends the graceful disconnect and stops the
    // network task's timers.
    drop(net);
}
