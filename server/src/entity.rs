//! Entities of the simulation and the table owning them
//!
//! Every entity lives in the [`EntityTable`], keyed by its id. Nothing else
//! holds an entity: the spatial index, zombie targets and building actions
//! all refer to entities by id and resolve them through the table each
//! time they need them, since the referenced entity may be gone.

use crate::actions::{Action, ActionStack};
use crate::movable::Movable;
use crate::pathfinder::Pathfinder;
use crate::world::SpatialIndex;
use crate::zombie::Zombie;
use log::{debug, error};
use shared::{
    Aabb, ActionData, BuildingSnapshot, EntityId, EntityKind, EntitySnapshot, Path, Vec2,
    ENTITY_RADIUS, MAX_WAYPOINTS_TO_SEND,
};
use std::collections::BTreeMap;
use std::time::Duration;

/// Notifications produced while updating entities, drained by the game
/// loop after each logic tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    ZombieDeath { id: EntityId },
    PlayerDeath { id: EntityId },
    BuildingDestroyed { id: EntityId },
    BuildingFinished { id: EntityId },
}

/// Everything an entity may look at or modify while it updates.
///
/// The entity being updated has been taken out of `entities` for the
/// duration of the call.
pub struct TickContext<'a> {
    pub entities: &'a mut EntityTable,
    pub index: &'a mut SpatialIndex,
    pub pathfinder: &'a Pathfinder,
    pub events: &'a mut Vec<GameEvent>,
}

/// Snapshot of one entity, split the way it is broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityState {
    Mobile(EntitySnapshot),
    Building(BuildingSnapshot),
}

#[derive(Debug, Clone)]
pub enum Entity {
    Player(Player),
    Zombie(Zombie),
    Building(Building),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Player(p) => p.id,
            Entity::Zombie(z) => z.id(),
            Entity::Building(b) => b.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Player(_) => EntityKind::Player,
            Entity::Zombie(_) => EntityKind::Zombie,
            Entity::Building(_) => EntityKind::Building,
        }
    }

    pub fn position(&self) -> Vec2 {
        match self {
            Entity::Player(p) => p.movable.pos,
            Entity::Zombie(z) => z.position(),
            Entity::Building(b) => b.pos,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_circle(self.position(), ENTITY_RADIUS)
    }

    pub fn is_alive(&self) -> bool {
        match self {
            Entity::Player(p) => p.cur_hp > 0.0,
            Entity::Zombie(z) => z.is_alive(),
            Entity::Building(b) => b.cur_hp > 0.0,
        }
    }

    pub fn update(&mut self, dt: Duration, ctx: &mut TickContext<'_>) {
        match self {
            Entity::Player(p) => p.update(dt, ctx),
            Entity::Zombie(z) => z.update(dt, ctx),
            Entity::Building(_) => {}
        }
    }

    /// Applies damage and returns true if this call killed the entity.
    /// A dead entity ignores further damage.
    pub fn deal_damage(&mut self, damage: f32, events: &mut Vec<GameEvent>) -> bool {
        match self {
            Entity::Player(p) => {
                if apply_damage(&mut p.cur_hp, damage) {
                    events.push(GameEvent::PlayerDeath { id: p.id });
                    return true;
                }
                false
            }
            Entity::Zombie(z) => z.deal_damage(damage, events),
            Entity::Building(b) => {
                if apply_damage(&mut b.cur_hp, damage) {
                    events.push(GameEvent::BuildingDestroyed { id: b.id });
                    return true;
                }
                false
            }
        }
    }

    pub fn state(&self) -> EntityState {
        match self {
            Entity::Player(p) => EntityState::Mobile(p.state()),
            Entity::Zombie(z) => EntityState::Mobile(z.snapshot()),
            Entity::Building(b) => EntityState::Building(b.state()),
        }
    }
}

/// Lowers `hp` by `damage`, clamping at zero. Returns true only on the
/// call that brings a living entity to zero.
pub(crate) fn apply_damage(hp: &mut f32, damage: f32) -> bool {
    if *hp <= 0.0 {
        return false;
    }
    if damage >= *hp {
        *hp = 0.0;
        true
    } else {
        *hp -= damage;
        false
    }
}

/// Entity controlled by a connected client.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: EntityId,
    pub client_id: u32,
    pub name: String,
    pub movable: Movable,
    pub cur_hp: f32,
    pub total_hp: f32,
    pub build_power: f32,
    actions: ActionStack,
    pending_request: Option<u64>,
}

impl Player {
    pub fn new(
        id: EntityId,
        client_id: u32,
        name: String,
        spawn: Vec2,
        speed: f32,
        total_hp: f32,
        build_power: f32,
    ) -> Self {
        Self {
            id,
            client_id,
            name,
            movable: Movable::new(spawn, speed),
            cur_hp: total_hp,
            total_hp,
            build_power,
            actions: ActionStack::new(),
            pending_request: None,
        }
    }

    pub fn actions(&self) -> &ActionStack {
        &self.actions
    }

    pub fn current_action(&self) -> &Action {
        self.actions.peek()
    }

    /// Cancels whatever the player was doing and waits for a path.
    pub fn move_to(&mut self, request: u64) {
        debug!("Player {} moving, request {}", self.id, request);
        self.actions.clear();
        self.actions.push(Action::Moving {
            speed: self.movable.speed,
        });
        self.actions.push(Action::WaitingForPath { request });
        self.movable.clear_path();
        self.pending_request = Some(request);
    }

    /// Cancels whatever the player was doing, waits for a path to the
    /// building site, walks there and then builds.
    pub fn build(&mut self, request: u64, building: EntityId) {
        debug!(
            "Player {} building {}, request {}",
            self.id, building, request
        );
        self.actions.clear();
        self.actions.push(Action::Building { building });
        self.actions.push(Action::Moving {
            speed: self.movable.speed,
        });
        self.actions.push(Action::WaitingForPath { request });
        self.movable.clear_path();
        self.pending_request = Some(request);
    }

    /// True if `request` is the latest movement request of this player.
    pub fn is_pending(&self, request: u64) -> bool {
        self.pending_request == Some(request)
    }

    /// Hands the computed path to the player, ending its wait.
    ///
    /// # Panics
    /// If the topmost action is not `WaitingForPath`.
    pub fn set_path(&mut self, path: Path) {
        match self.actions.peek() {
            Action::WaitingForPath { .. } => {
                self.actions.pop();
                self.movable.set_path(path);
                self.pending_request = None;
            }
            other => {
                error!(
                    "Player {}: path received while top action is {:?}",
                    self.id, other
                );
                panic!("next action in player action stack must be WaitingForPath");
            }
        }
    }

    /// Drops every action down to Idle. Returns the building the player
    /// was about to work on, if any.
    pub fn cancel_actions(&mut self) -> Option<EntityId> {
        let building = self.actions.iter().find_map(|a| match a {
            Action::Building { building } => Some(*building),
            _ => None,
        });
        self.actions.clear();
        self.movable.clear_path();
        self.pending_request = None;
        building
    }

    fn update(&mut self, dt: Duration, ctx: &mut TickContext<'_>) {
        match *self.actions.peek() {
            Action::Moving { speed } => {
                self.movable.speed = speed;
                if self.movable.advance(dt) {
                    ctx.index.update(self.id, self.movable.bounds());
                }
                if self.movable.has_reached_destination() {
                    self.actions.pop();
                }
            }
            Action::Building { building } => {
                let points = self.build_power * dt.as_secs_f32();
                let done = match ctx.entities.get_mut(building) {
                    Some(Entity::Building(b)) if b.cur_hp > 0.0 => {
                        b.add_progress(points, ctx.events)
                    }
                    _ => true,
                };
                if done {
                    self.actions.pop();
                }
            }
            Action::Idle | Action::WaitingForPath { .. } => {}
        }
    }

    fn state(&self) -> EntitySnapshot {
        let action = match *self.actions.peek() {
            Action::Idle | Action::WaitingForPath { .. } => ActionData::Idle,
            Action::Moving { speed } => ActionData::Moving {
                speed,
                path: self.movable.remaining_path(MAX_WAYPOINTS_TO_SEND),
            },
            Action::Building { building } => ActionData::Building {
                building_id: building,
            },
        };
        EntitySnapshot {
            kind: EntityKind::Player,
            position: self.movable.pos,
            action,
            cur_hp: self.cur_hp.round() as u16,
        }
    }
}

/// Static structure raised by players; an obstacle for zombies.
#[derive(Debug, Clone)]
pub struct Building {
    pub id: EntityId,
    pub kind: u8,
    pub pos: Vec2,
    pub cur_hp: f32,
    pub total_hp: f32,
    pub progress: f32,
    pub required: f32,
}

impl Building {
    /// A freshly placed building site, with no progress and 1 HP.
    pub fn new(id: EntityId, kind: u8, pos: Vec2, total_hp: f32, required: f32) -> Self {
        Self {
            id,
            kind,
            pos,
            cur_hp: 1.0_f32.min(total_hp),
            total_hp,
            progress: 0.0,
            required,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= self.required
    }

    /// Adds build points; HP grows along with progress. Returns true once
    /// the building is finished.
    pub fn add_progress(&mut self, points: f32, events: &mut Vec<GameEvent>) -> bool {
        if self.is_finished() {
            return true;
        }
        self.progress = (self.progress + points).min(self.required);
        let ratio = if self.required > 0.0 {
            points / self.required
        } else {
            1.0
        };
        self.cur_hp = (self.cur_hp + self.total_hp * ratio).min(self.total_hp);

        if self.is_finished() {
            self.cur_hp = self.total_hp;
            events.push(GameEvent::BuildingFinished { id: self.id });
            return true;
        }
        false
    }

    fn state(&self) -> BuildingSnapshot {
        BuildingSnapshot {
            kind: self.kind,
            position: self.pos,
            cur_hp: self.cur_hp.round() as u16,
            total_hp: self.total_hp.round() as u16,
            progress: if self.required > 0.0 {
                self.progress / self.required
            } else {
                1.0
            },
            finished: self.is_finished(),
        }
    }
}

/// Arena of every live entity, iterated in ascending id order.
#[derive(Debug)]
pub struct EntityTable {
    entities: BTreeMap<EntityId, Entity>,
    next_id: EntityId,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn allocate_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id(), entity);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities.values().filter(|e| e.kind() == kind).count()
    }

    /// Closest living entity accepted by `filter`, with its distance.
    /// Ties go to the lowest id.
    pub fn nearest<F>(&self, pos: Vec2, filter: F) -> Option<(EntityId, f32)>
    where
        F: Fn(&Entity) -> bool,
    {
        let mut best: Option<(EntityId, f32)> = None;
        for (id, entity) in &self.entities {
            if !entity.is_alive() || !filter(entity) {
                continue;
            }
            let dist = pos.distance(entity.position());
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((*id, dist));
            }
        }
        best
    }
}
