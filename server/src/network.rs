//! Broadcast relay: UDP receive/dispatch/fan-out around the session registry.
//!
//! All registry mutation and fan-out decisions happen on the main `run` loop,
//! so updates are applied and republished in a single serialized order.
//! Actual socket writes are pushed to a sender task and are fire-and-forget;
//! a failure to reach one peer never aborts delivery to the rest.

use crate::registry::{SessionRegistry, UpdateOutcome};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, PlayerState, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to the main relay loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ParticipantTimeout {
        id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Outgoing work queued for the sender task.
#[derive(Debug)]
pub enum RelayMessage {
    /// Point-to-point reply (welcome, rejection).
    Send {
        packet: Packet,
        addr: SocketAddr,
    },
    /// One packet, many recipients. The recipient set is computed by the
    /// main loop while it still holds the registry, so it is consistent
    /// with the mutation that triggered it.
    FanOut {
        packet: Packet,
        recipients: Vec<(u32, SocketAddr)>,
    },
}

/// The relay server: session registry plus the tasks moving packets around.
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<SessionRegistry>>,
    timeout: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    relay_tx: mpsc::UnboundedSender<RelayMessage>,
    relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_participants: usize,
        timeout: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (relay_tx, relay_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            registry: Arc::new(RwLock::new(SessionRegistry::new(max_participants))),
            timeout,
            server_tx,
            server_rx,
            relay_tx,
            relay_rx,
        })
    }

    /// Address the socket actually bound to (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that continuously listens for incoming datagrams.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize datagram from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing queue. Send errors are
    /// isolated per recipient.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut relay_rx = std::mem::replace(&mut self.relay_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = relay_rx.recv().await {
                match message {
                    RelayMessage::Send { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    RelayMessage::FanOut { packet, recipients } => {
                        for (id, addr) in recipients {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to participant {}: {}", id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that sweeps for silent connections once a second.
    fn spawn_timeout_checker(&self) {
        let registry = Arc::clone(&self.registry);
        let server_tx = self.server_tx.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let registry = registry.read().await;
                    registry.check_timeouts(timeout)
                };

                for id in timed_out {
                    if server_tx
                        .send(ServerMessage::ParticipantTimeout { id })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn queue_send(&self, packet: Packet, addr: SocketAddr) {
        if self.relay_tx.send(RelayMessage::Send { packet, addr }).is_err() {
            error!("Sender task is gone; dropping outgoing packet");
        }
    }

    fn queue_fan_out(&self, packet: Packet, recipients: Vec<(u32, SocketAddr)>) {
        if recipients.is_empty() {
            return;
        }
        if self
            .relay_tx
            .send(RelayMessage::FanOut { packet, recipients })
            .is_err()
        {
            error!("Sender task is gone; dropping fan-out");
        }
    }

    /// Handles one inbound packet against the registry.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                self.handle_connect(addr, client_version).await;
            }

            Packet::PlayerMove {
                seq,
                position,
                rotation,
                animation,
            } => {
                let mut registry = self.registry.write().await;

                // A move from an address with no session is a disconnect
                // race; drop it without telling anyone.
                let Some(id) = registry.find_by_addr(addr) else {
                    debug!("Move from unknown address {}", addr);
                    return;
                };

                match registry.apply_update(id, seq, position, rotation, animation) {
                    UpdateOutcome::Applied => {
                        if let Some(player) = registry.state_of(id).cloned() {
                            let recipients = registry.peer_addrs(Some(id));
                            drop(registry);

                            // The sender already has this state locally.
                            self.queue_fan_out(Packet::StateDelta { id, player }, recipients);
                        }
                    }
                    UpdateOutcome::Stale | UpdateOutcome::UnknownId => {}
                }
            }

            Packet::Ping => {
                let mut registry = self.registry.write().await;
                if let Some(id) = registry.find_by_addr(addr) {
                    registry.touch(id);
                }
            }

            Packet::Disconnect => {
                let id = {
                    let registry = self.registry.read().await;
                    registry.find_by_addr(addr)
                };

                if let Some(id) = id {
                    self.remove_and_announce(id).await;
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, addr: SocketAddr, client_version: u32) {
        info!("Connection from {} (version {})", addr, client_version);

        if client_version != PROTOCOL_VERSION {
            self.queue_send(
                Packet::Disconnected {
                    reason: format!(
                        "Protocol version mismatch (server {}, client {})",
                        PROTOCOL_VERSION, client_version
                    ),
                },
                addr,
            );
            return;
        }

        // A reconnect from the same address replaces the old session; peers
        // learn about the removal the same way they would for a disconnect.
        let existing = {
            let registry = self.registry.read().await;
            registry.find_by_addr(addr)
        };
        if let Some(existing_id) = existing {
            info!("Replacing existing session {} for {}", existing_id, addr);
            self.remove_and_announce(existing_id).await;
        }

        let mut registry = self.registry.write().await;
        let Some(id) = registry.add(addr) else {
            drop(registry);
            self.queue_send(
                Packet::Disconnected {
                    reason: "Scene full".to_string(),
                },
                addr,
            );
            return;
        };

        // Only the joining client hears about the join at this point; peers
        // learn the new id from its first move delta.
        let player = PlayerState::new(id);
        let players = registry.snapshot();
        drop(registry);

        self.queue_send(Packet::Welcome { player, players }, addr);
    }

    /// Removes a session and broadcasts the updated full roster to everyone
    /// still connected.
    async fn remove_and_announce(&mut self, id: u32) {
        let mut registry = self.registry.write().await;
        if !registry.remove(id) {
            return;
        }

        let players = registry.snapshot();
        let recipients = registry.peer_addrs(None);
        drop(registry);

        self.queue_fan_out(Packet::Roster { players }, recipients);
    }

    /// Main relay loop: serialized packet handling plus timeout removals.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Relay started");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ParticipantTimeout { id } => {
                    warn!("Participant {} timed out", id);
                    self.remove_and_announce(id).await;
                }
                ServerMessage::Shutdown => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
