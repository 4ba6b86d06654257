//! Authoritative simulation state
//!
//! [`GameState`] owns the entity table, the world and the pathfinder. It is
//! only ever touched by the game loop: message handlers call the `on_*`
//! methods, the logic tick calls [`GameState::update`] and the broadcast
//! tick calls [`GameState::pack`].

use crate::config::Config;
use crate::entity::{Building, Entity, EntityState, EntityTable, GameEvent, Player, TickContext};
use crate::error::DispatchError;
use crate::pathfinder::Pathfinder;
use crate::planner::{PathRequest, PathResult};
use crate::world::{Grid, SpatialIndex, World};
use crate::zombie::Zombie;
use log::{debug, info, warn};
use shared::{Aabb, EntityId, EntityKind, GameSnapshot, Vec2, ENTITY_RADIUS, MINUTES_PER_DAY};
use std::collections::HashMap;
use std::time::Duration;

/// Counters answered to the admin console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSummary {
    pub game_time: u16,
    pub players: usize,
    pub zombies: usize,
    pub buildings: usize,
}

pub struct GameState {
    config: Config,
    entities: EntityTable,
    world: World,
    pathfinder: Pathfinder,
    /// Entity controlled by each joined client.
    players: HashMap<u32, EntityId>,
    /// In-game minutes since midnight.
    game_time: u16,
    next_request: u64,
    path_requests: Vec<PathRequest>,
}

impl GameState {
    pub fn new(config: Config, grid: Grid) -> Self {
        let world = World::new(grid);
        let pathfinder = Pathfinder::new(world.grid.clone());
        Self {
            config,
            entities: EntityTable::new(),
            world,
            pathfinder,
            players: HashMap::new(),
            game_time: 0,
            next_request: 1,
            path_requests: Vec::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.world.grid
    }

    pub fn pathfinder(&self) -> &Pathfinder {
        &self.pathfinder
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.world.index
    }

    pub fn game_time(&self) -> u16 {
        self.game_time
    }

    pub fn player_entity(&self, client_id: u32) -> Option<EntityId> {
        self.players.get(&client_id).copied()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn zombie_count(&self) -> usize {
        self.entities.count(EntityKind::Zombie)
    }

    /// Creates the player entity of a client at the spawn point.
    pub fn on_player_joined(&mut self, client_id: u32, name: String) -> Result<EntityId, DispatchError> {
        if self.players.contains_key(&client_id) {
            return Err(DispatchError::AlreadyJoined(client_id));
        }

        let id = self.entities.allocate_id();
        let player = Player::new(
            id,
            client_id,
            name,
            self.config.player_spawn,
            self.config.player_speed,
            self.config.player_total_hp,
            self.config.player_build_power,
        );
        info!(
            "Player {} ({}) joined as entity {} at ({}, {})",
            client_id, player.name, id, player.movable.pos.x, player.movable.pos.y
        );
        self.add_entity(Entity::Player(player));
        self.players.insert(client_id, id);
        Ok(id)
    }

    pub fn on_player_left(&mut self, client_id: u32) -> Result<(), DispatchError> {
        let id = self
            .players
            .remove(&client_id)
            .ok_or(DispatchError::UnknownClient(client_id))?;
        self.remove_entity(id);
        info!("Player {} left, entity {} removed", client_id, id);
        Ok(())
    }

    /// Sends the player of `client_id` to `dst`. Returns the number of the
    /// movement request issued for it.
    pub fn on_move(&mut self, client_id: u32, dst: Vec2) -> Result<u64, DispatchError> {
        if !self.world.grid.contains(dst) {
            return Err(DispatchError::OutOfWorld(dst));
        }
        let id = self.controlled_player(client_id)?;
        self.abandon_site_of(id);

        let request = self.next_request();
        let org = match self.entities.get_mut(id) {
            Some(Entity::Player(player)) => {
                player.move_to(request);
                player.movable.pos
            }
            _ => return Err(DispatchError::UnknownClient(client_id)),
        };
        self.path_requests.push(PathRequest {
            request,
            entity: id,
            org,
            dst,
        });
        Ok(request)
    }

    /// Places a building site at `pos` and sends the player of `client_id`
    /// to build it. Returns the id of the new building.
    pub fn on_build(&mut self, client_id: u32, kind: u8, pos: Vec2) -> Result<EntityId, DispatchError> {
        if !self.world.grid.contains(pos) {
            return Err(DispatchError::OutOfWorld(pos));
        }
        let id = self.controlled_player(client_id)?;
        self.abandon_site_of(id);

        let building_id = self.entities.allocate_id();
        let request = self.next_request();
        let org = match self.entities.get_mut(id) {
            Some(Entity::Player(player)) => {
                player.build(request, building_id);
                player.movable.pos
            }
            _ => return Err(DispatchError::UnknownClient(client_id)),
        };

        self.add_entity(Entity::Building(Building::new(
            building_id,
            kind,
            pos,
            self.config.building_total_hp,
            self.config.building_build_points,
        )));
        info!(
            "Player {} placed building {} of kind {} at ({}, {})",
            client_id, building_id, kind, pos.x, pos.y
        );
        self.path_requests.push(PathRequest {
            request,
            entity: id,
            org,
            dst: pos,
        });
        Ok(building_id)
    }

    /// Applies the answer of the movement planner.
    ///
    /// Results for entities that are gone, or superseded by a newer command,
    /// are dropped. A missing path cancels the player's actions.
    pub fn on_path_result(&mut self, result: PathResult) -> Result<(), DispatchError> {
        let PathResult {
            request,
            entity,
            path,
        } = result;

        let abandoned = match self.entities.get_mut(entity) {
            Some(Entity::Player(player)) if player.is_pending(request) => match path {
                Some(path) => {
                    debug!(
                        "Player {} got path for request {}: {} waypoints",
                        entity,
                        request,
                        path.len()
                    );
                    player.set_path(path);
                    None
                }
                None => {
                    info!("No path for player {}, request {}", entity, request);
                    player.cancel_actions()
                }
            },
            Some(Entity::Player(_)) => {
                debug!("Dropping stale request {} of player {}", request, entity);
                None
            }
            _ => {
                debug!("Dropping request {}, entity {} is gone", request, entity);
                None
            }
        };

        if let Some(building) = abandoned {
            self.remove_untouched_site(building);
        }
        Ok(())
    }

    /// Movement requests issued since the last call.
    pub fn take_path_requests(&mut self) -> Vec<PathRequest> {
        std::mem::take(&mut self.path_requests)
    }

    pub fn spawn_zombie(&mut self, pos: Vec2) -> EntityId {
        let id = self.entities.allocate_id();
        self.add_entity(Entity::Zombie(Zombie::new(id, pos, self.config.zombie)));
        info!("Zombie {} spawned at ({}, {})", id, pos.x, pos.y);
        id
    }

    /// True if an entity standing at `pos` would overlap nothing.
    pub fn is_free(&self, pos: Vec2) -> bool {
        self.world
            .index
            .query(&Aabb::from_circle(pos, ENTITY_RADIUS))
            .is_empty()
    }

    /// Runs one logic tick.
    ///
    /// Entities are updated in ascending id order. Each one is taken out
    /// of the table while it updates so it can look at, and damage, the
    /// others. Entities killed during the tick are removed at its end.
    pub fn update(&mut self, dt: Duration) -> Vec<GameEvent> {
        let mut events = Vec::new();

        for id in self.entities.ids() {
            let Some(mut entity) = self.entities.remove(id) else {
                continue;
            };
            if entity.is_alive() {
                let mut ctx = TickContext {
                    entities: &mut self.entities,
                    index: &mut self.world.index,
                    pathfinder: &self.pathfinder,
                    events: &mut events,
                };
                entity.update(dt, &mut ctx);
            }
            self.entities.insert(entity);
        }

        for event in &events {
            match *event {
                GameEvent::ZombieDeath { id }
                | GameEvent::PlayerDeath { id }
                | GameEvent::BuildingDestroyed { id } => {
                    if let Some(Entity::Player(player)) = self.remove_entity(id) {
                        self.players.remove(&player.client_id);
                    }
                }
                GameEvent::BuildingFinished { .. } => {}
            }
        }
        events
    }

    /// Moves the in-game clock one minute forward.
    pub fn advance_clock(&mut self) -> u16 {
        self.game_time = (self.game_time + 1) % MINUTES_PER_DAY;
        self.game_time
    }

    pub fn pack(&self, timestamp: u64) -> GameSnapshot {
        let mut snapshot = GameSnapshot {
            timestamp,
            game_time: self.game_time,
            ..Default::default()
        };
        for (&id, entity) in self.entities.iter() {
            match entity.state() {
                EntityState::Mobile(state) => {
                    snapshot.entities.insert(id, state);
                }
                EntityState::Building(state) => {
                    snapshot.buildings.insert(id, state);
                }
            }
        }
        snapshot
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            game_time: self.game_time,
            players: self.entities.count(EntityKind::Player),
            zombies: self.entities.count(EntityKind::Zombie),
            buildings: self.entities.count(EntityKind::Building),
        }
    }

    pub fn entity_state(&self, id: EntityId) -> Option<EntityState> {
        self.entities.get(id).map(Entity::state)
    }

    pub fn entity_states(&self) -> Vec<(EntityId, EntityState)> {
        self.entities
            .iter()
            .map(|(&id, entity)| (id, entity.state()))
            .collect()
    }

    fn next_request(&mut self) -> u64 {
        let request = self.next_request;
        self.next_request += 1;
        request
    }

    fn controlled_player(&self, client_id: u32) -> Result<EntityId, DispatchError> {
        self.players
            .get(&client_id)
            .copied()
            .ok_or(DispatchError::UnknownClient(client_id))
    }

    fn add_entity(&mut self, entity: Entity) {
        self.world
            .index
            .insert(entity.id(), entity.kind(), entity.bounds());
        self.entities.insert(entity);
    }

    fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        self.world.index.remove(id);
        self.entities.remove(id)
    }

    /// Cancels the current actions of a player before a new command and
    /// drops the site of a building it never started.
    fn abandon_site_of(&mut self, player: EntityId) {
        let site = match self.entities.get_mut(player) {
            Some(Entity::Player(p)) => p.cancel_actions(),
            _ => None,
        };
        if let Some(building) = site {
            self.remove_untouched_site(building);
        }
    }

    fn remove_untouched_site(&mut self, building: EntityId) {
        let untouched = matches!(
            self.entities.get(building),
            Some(Entity::Building(b)) if b.progress <= 0.0
        );
        if untouched {
            warn!("Removing abandoned building site {}", building);
            self.remove_entity(building);
        }
    }
}
