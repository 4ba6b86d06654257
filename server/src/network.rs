//! Server network layer handling UDP communications
//!
//! Translates client datagrams into game loop messages and fans the loop's
//! snapshots out to every connected client. Three tasks cooperate:
//! - receiver: decodes packets, tracks clients, forwards commands, answers
//!   pings and tells everybody who joined or left
//! - sender: sends every serialized snapshot to every client
//! - timeout checker: drops clients that went silent

use crate::client_manager::ClientManager;
use crate::dispatch::{ClientMessage, Command};
use crate::game_loop::{timestamp_millis, Broadcast};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Packet, Vec2};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch, RwLock};

/// What the receiver does with one incoming packet.
#[derive(Debug, Default, PartialEq)]
pub struct Routed {
    /// Messages for the game loop, in order.
    pub messages: Vec<ClientMessage>,
    /// Packet to send back to the sender.
    pub reply: Option<Packet>,
    /// Packets for every connected client except the sender.
    pub notices: Vec<Packet>,
}

/// Network front of the game server
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    client_timeout: Duration,

    // Communication channels
    commands: mpsc::UnboundedSender<ClientMessage>,
    broadcasts: Option<watch::Receiver<Broadcast>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
        commands: mpsc::UnboundedSender<ClientMessage>,
        broadcasts: watch::Receiver<Broadcast>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            client_timeout,
            commands,
            broadcasts: Some(broadcasts),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that sends the latest snapshot to every client
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let Some(mut broadcasts) = self.broadcasts.take() else {
            return;
        };

        tokio::spawn(async move {
            while broadcasts.changed().await.is_ok() {
                let broadcast = broadcasts.borrow_and_update().clone();
                let client_addrs = {
                    let clients_guard = clients.read().await;
                    clients_guard.get_client_addrs()
                };

                for (client_id, addr) in client_addrs {
                    if let Err(e) = socket.send_to(&broadcast.payload, addr).await {
                        error!(
                            "Failed to send snapshot {} to client {}: {}",
                            broadcast.tick, client_id, e
                        );
                    }
                }
            }
            debug!("Broadcast channel closed, sender stopped");
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let commands = self.commands.clone();
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let (timed_out, remaining) = {
                    let mut clients_guard = clients.write().await;
                    let timed_out = clients_guard.check_timeouts(timeout);
                    (timed_out, clients_guard.get_client_addrs())
                };

                for client_id in timed_out {
                    info!("Client {} timed out", client_id);
                    let leave = Packet::Leave {
                        client_id,
                        reason: "Timed out".to_string(),
                    };
                    notify(&socket, &remaining, None, &leave).await;
                    let message = ClientMessage {
                        client_id,
                        command: Command::Leave,
                    };
                    if let Err(e) = commands.send(message) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(data) => {
                if let Err(e) = self.socket.send_to(&data, addr).await {
                    error!("Failed to send packet to {}: {}", addr, e);
                }
            }
            Err(e) => error!("Failed to serialize packet for {}: {}", addr, e),
        }
    }

    /// Receives packets until the game loop stops listening.
    pub async fn run(mut self) {
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut buffer = [0u8; 2048];
        info!("Network server started");

        loop {
            let (len, addr) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let Ok(packet) = deserialize::<Packet>(&buffer[..len]) else {
                warn!("Failed to deserialize packet from {}", addr);
                continue;
            };

            let (routed, client_addrs) = {
                let mut clients = self.clients.write().await;
                let routed = route_packet(&mut clients, packet, addr);
                (routed, clients.get_client_addrs())
            };

            if let Some(reply) = &routed.reply {
                self.send_packet(reply, addr).await;
            }
            for notice in &routed.notices {
                notify(&self.socket, &client_addrs, Some(addr), notice).await;
            }
            for message in routed.messages {
                if self.commands.send(message).is_err() {
                    info!("Game loop is gone, network server stopping");
                    return;
                }
            }
        }
    }
}

/// Sends `packet` to every client in `addrs` but `except`.
async fn notify(
    socket: &UdpSocket,
    addrs: &[(u32, SocketAddr)],
    except: Option<SocketAddr>,
    packet: &Packet,
) {
    let data = match serialize(packet) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to serialize notice: {}", e);
            return;
        }
    };
    for &(client_id, addr) in addrs {
        if Some(addr) == except {
            continue;
        }
        if let Err(e) = socket.send_to(&data, addr).await {
            error!("Failed to notify client {}: {}", client_id, e);
        }
    }
}

/// Maps one packet from `addr` to game loop messages, an optional reply
/// and notices for the other clients.
pub fn route_packet(clients: &mut ClientManager, packet: Packet, addr: SocketAddr) -> Routed {
    let mut routed = Routed::default();

    match packet {
        Packet::Connect { name, kind } => {
            info!("Client {} connecting from {}", name, addr);

            // Remove existing connection if present
            if let Some(existing_id) = clients.find_client_by_addr(addr) {
                info!("Removing existing client {} from {}", existing_id, addr);
                clients.remove_client(&existing_id);
                routed.messages.push(ClientMessage {
                    client_id: existing_id,
                    command: Command::Leave,
                });
                routed.notices.push(Packet::Leave {
                    client_id: existing_id,
                    reason: "Reconnected".to_string(),
                });
            }

            match clients.add_client(addr, name.clone(), kind) {
                Some(client_id) => {
                    routed.messages.push(ClientMessage {
                        client_id,
                        command: Command::Join { name: name.clone() },
                    });
                    routed.reply = Some(Packet::Stay {
                        client_id,
                        players: clients.roster(),
                    });
                    routed.notices.push(Packet::Joined {
                        client_id,
                        name,
                        kind,
                    });
                }
                None => {
                    routed.reply = Some(Packet::Disconnected {
                        reason: "Server full".to_string(),
                    });
                }
            }
        }

        Packet::Move { x, y } => {
            if let Some(client_id) = clients.touch_by_addr(addr) {
                routed.messages.push(ClientMessage {
                    client_id,
                    command: Command::Move {
                        dst: Vec2::new(x, y),
                    },
                });
            } else {
                debug!("Move from unknown address {}", addr);
            }
        }

        Packet::Build { kind, x, y } => {
            if let Some(client_id) = clients.touch_by_addr(addr) {
                routed.messages.push(ClientMessage {
                    client_id,
                    command: Command::Build {
                        kind,
                        pos: Vec2::new(x, y),
                    },
                });
            } else {
                debug!("Build from unknown address {}", addr);
            }
        }

        Packet::Ping { id, .. } => {
            clients.touch_by_addr(addr);
            routed.reply = Some(Packet::Pong {
                id,
                timestamp: timestamp_millis(),
            });
        }

        Packet::Disconnect => {
            if let Some(client_id) = clients.find_client_by_addr(addr) {
                clients.remove_client(&client_id);
                routed.messages.push(ClientMessage {
                    client_id,
                    command: Command::Leave,
                });
                routed.notices.push(Packet::Leave {
                    client_id,
                    reason: "Disconnected".to_string(),
                });
            }
        }

        _ => {
            warn!("Unexpected packet type from client at {}", addr);
        }
    }

    routed
}
