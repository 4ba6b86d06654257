//! Client connection management for the survival server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Connection health monitoring and automatic cleanup
//! - Client capacity management and address tracking
//!
//! It only knows about addresses and client ids. What a client controls in
//! the game is the business of the game loop, which learns about joins and
//! leaves through regular messages.

use log::info;
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected client
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Name announced in the Connect packet
    pub name: String,
    /// Character type picked in the Connect packet
    pub kind: u8,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    /// Creates a new client and marks it as recently active.
    pub fn new(id: u32, addr: SocketAddr, name: String, kind: u8) -> Self {
        Self {
            id,
            addr,
            name,
            kind,
            last_seen: Instant::now(),
        }
    }

    /// Records activity from this client.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager enforces the server capacity limit and maps incoming
/// datagrams to client ids. Client ids start from 1; 0 is reserved for
/// messages the server sends to itself.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr, name: String, kind: u8) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} ({}) connected from {}", client_id, name, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, name, kind));

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Finds the client sending from `addr` and marks it as active.
    pub fn touch_by_addr(&mut self, addr: SocketAddr) -> Option<u32> {
        let client = self.clients.values_mut().find(|c| c.addr == addr)?;
        client.touch();
        Some(client.id)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Names of all connected clients, by client id
    pub fn roster(&self) -> BTreeMap<u32, String> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.name.clone()))
            .collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so the game can drop their players.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Gets all client IDs and their network addresses
    pub fn get_client_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients
            .iter()
            .map(|(id, client)| (*id, client.addr))
            .collect()
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
