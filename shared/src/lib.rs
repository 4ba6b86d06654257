pub mod math;

pub use math::{Aabb, Path, Vec2};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minutes in one in-game day; the game clock wraps at this value.
pub const MINUTES_PER_DAY: u16 = 1440;
/// Half extent of the bounding box of every entity, in world units.
///
/// Two overlapping boxes have centers less than `2 * sqrt(2) * ENTITY_RADIUS`
/// apart, which must stay below the zombie attack distance.
pub const ENTITY_RADIUS: f32 = 0.4;
/// Number of upcoming waypoints included in a moving entity's snapshot.
pub const MAX_WAYPOINTS_TO_SEND: usize = 3;

/// Identifier of a live entity, unique for the lifetime of the server.
pub type EntityId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Zombie,
    Building,
}

/// Current action of an entity along with its action-specific payload.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ActionData {
    Idle,
    Moving { speed: f32, path: Vec<Vec2> },
    Building { building_id: EntityId },
    Attacking { target_id: EntityId },
}

/// Per-entity state sent to clients for players and zombies.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub position: Vec2,
    pub action: ActionData,
    pub cur_hp: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BuildingSnapshot {
    pub kind: u8,
    pub position: Vec2,
    pub cur_hp: u16,
    pub total_hp: u16,
    /// Construction progress in `[0, 1]`.
    pub progress: f32,
    pub finished: bool,
}

/// Full simulation state at one broadcast tick.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct GameSnapshot {
    pub timestamp: u64,
    /// In-game minutes since midnight.
    pub game_time: u16,
    pub entities: BTreeMap<EntityId, EntitySnapshot>,
    pub buildings: BTreeMap<EntityId, BuildingSnapshot>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    /// Join request; `kind` is the character type the player picked.
    Connect { name: String, kind: u8 },
    Move { x: f32, y: f32 },
    Build { kind: u8, x: f32, y: f32 },
    Disconnect,
    /// Time synchronization request, answered with a `Pong` of the same id.
    Ping { id: u32, timestamp: u64 },

    /// Accepted join: the id given to the joining client and the names of
    /// every connected client, itself included.
    Stay {
        client_id: u32,
        players: BTreeMap<u32, String>,
    },
    /// Sent to everybody else when a client joins.
    Joined { client_id: u32, name: String, kind: u8 },
    /// Sent to everybody else when a client goes away.
    Leave { client_id: u32, reason: String },
    /// `timestamp` is the server clock, in milliseconds since the epoch.
    Pong { id: u32, timestamp: u64 },
    GameState(GameSnapshot),
    /// Refused join.
    Disconnected { reason: String },
}
