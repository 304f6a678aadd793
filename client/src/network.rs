//! Connection channel to the relay server.
//!
//! The render loop must never block on the network, so the UDP socket lives
//! on its own thread inside a small tokio runtime. Outgoing packets cross a
//! queue into that task; decoded incoming packets cross back and are drained
//! once per frame. Dropping the handle closes the queue, which makes the
//! task send a graceful `Disconnect` and exit, taking its keep-alive timer
//! with it.

use bincode::{deserialize, serialize};
use log::{error, info, warn};
use shared::{Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

/// Interval of the keep-alive ping that holds the session open while the
/// pad is idle.
const PING_INTERVAL: Duration = Duration::from_secs(1);

pub struct NetworkHandle {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: std_mpsc::Receiver<Packet>,
}

impl NetworkHandle {
    /// Starts the network task and initiates the connection handshake.
    pub fn connect(
        server_addr: &str,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("net-channel".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to build network runtime: {}", e);
                        return;
                    }
                };

                runtime.block_on(channel_task(
                    server_addr,
                    fake_ping_ms,
                    outgoing_rx,
                    incoming_tx,
                ));
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    /// Queues a packet for sending. Errors mean the channel task is gone;
    /// the session notices through the missing traffic, so they are only
    /// logged here.
    pub fn send(&self, packet: Packet) {
        if self.outgoing.send(packet).is_err() {
            warn!("Network task is gone; dropping outgoing packet");
        }
    }

    /// Drains every packet that arrived since the last frame.
    pub fn drain_incoming(&self) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Ok(packet) = self.incoming.try_recv() {
            packets.push(packet);
        }
        packets
    }
}

/// The socket task: connect handshake, outgoing queue, receive path, and
/// keep-alive, all in one select loop.
async fn channel_task(
    server_addr: SocketAddr,
    fake_ping_ms: u64,
    mut outgoing_rx: mpsc::UnboundedReceiver<Packet>,
    incoming_tx: std_mpsc::Sender<Packet>,
) {
    let socket = match UdpSocket::bind("0.0.0.0:0").await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind client socket: {}", e);
            return;
        }
    };

    info!("Connecting to {}", server_addr);
    send_packet(
        &socket,
        server_addr,
        &Packet::Connect {
            client_version: PROTOCOL_VERSION,
        },
        fake_ping_ms,
    )
    .await;

    let mut ping_timer = interval(PING_INTERVAL);
    let mut buffer = [0u8; 2048];

    loop {
        tokio::select! {
            queued = outgoing_rx.recv() => {
                match queued {
                    Some(packet) => {
                        send_packet(&socket, server_addr, &packet, fake_ping_ms).await;
                    }
                    // Handle dropped: say goodbye and stop every periodic
                    // driver owned by this task.
                    None => {
                        send_packet(&socket, server_addr, &Packet::Disconnect, 0).await;
                        info!("Network channel closed");
                        return;
                    }
                }
            }

            result = socket.recv_from(&mut buffer) => {
                match result {
                    Ok((len, from)) => {
                        if from != server_addr {
                            continue;
                        }
                        if fake_ping_ms > 0 {
                            sleep(Duration::from_millis(fake_ping_ms / 2)).await;
                        }
                        match deserialize::<Packet>(&buffer[0..len]) {
                            Ok(packet) => {
                                if incoming_tx.send(packet).is_err() {
                                    // Receiver side is gone; nothing left to do.
                                    return;
                                }
                            }
                            Err(_) => warn!("Failed to deserialize datagram from server"),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            }

            _ = ping_timer.tick() => {
                send_packet(&socket, server_addr, &Packet::Ping, 0).await;
            }
        }
    }
}

async fn send_packet(socket: &UdpSocket, addr: SocketAddr, packet: &Packet, fake_ping_ms: u64) {
    if fake_ping_ms > 0 {
        sleep(Duration::from_millis(fake_ping_ms / 2)).await;
    }

    match serialize(packet) {
        Ok(data) => {
            if let Err(e) = socket.send_to(&data, addr).await {
                error!("Failed to send packet: {}", e);
            }
        }
        Err(e) => error!("Failed to serialize packet: {}", e),
    }
}
