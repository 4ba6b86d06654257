//! Zombie AI
//!
//! A zombie is a three-state machine:
//! - `Looking`: pick the nearest living non-zombie and a path to it
//! - `Walking`: follow the path, looking again every `looking_interval`
//! - `Attacking`: hit the target every `damage_interval` while in range
//!
//! The time accumulator is local to the current state and is reset on every
//! transition. The target is held by id and re-resolved on every update; a
//! target that vanished or died sends the zombie back to `Looking`.

use crate::config::ZombieConfig;
use crate::entity::{apply_damage, Entity, GameEvent, TickContext};
use crate::movable::Movable;
use log::{debug, trace};
use shared::{
    Aabb, ActionData, EntityId, EntityKind, EntitySnapshot, Vec2, ENTITY_RADIUS,
    MAX_WAYPOINTS_TO_SEND,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZombieState {
    Looking,
    Walking,
    Attacking,
}

#[derive(Debug, Clone)]
pub struct Zombie {
    id: EntityId,
    state: ZombieState,
    time_acc: Duration,
    target: Option<EntityId>,
    movable: Movable,
    cur_hp: f32,
    config: ZombieConfig,
}

impl Zombie {
    pub fn new(id: EntityId, pos: Vec2, config: ZombieConfig) -> Self {
        Self {
            id,
            state: ZombieState::Looking,
            time_acc: Duration::ZERO,
            target: None,
            movable: Movable::new(pos, config.walk_speed),
            cur_hp: config.total_hp,
            config,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn position(&self) -> Vec2 {
        self.movable.pos
    }

    pub fn state(&self) -> ZombieState {
        self.state
    }

    pub fn target(&self) -> Option<EntityId> {
        self.target
    }

    pub fn cur_hp(&self) -> f32 {
        self.cur_hp
    }

    pub fn is_alive(&self) -> bool {
        self.cur_hp > 0.0
    }

    pub fn update(&mut self, dt: Duration, ctx: &mut TickContext<'_>) {
        self.time_acc += dt;

        let next = match (self.state, self.resolve_target(ctx)) {
            (ZombieState::Looking, _) => self.look(ctx),
            (_, None) => {
                debug!("Zombie {} lost its target {:?}", self.id, self.target);
                self.target = None;
                ZombieState::Looking
            }
            (ZombieState::Walking, Some((_, target_pos))) => self.walk(dt, target_pos, ctx),
            (ZombieState::Attacking, Some((target, target_pos))) => {
                self.attack(target, target_pos, ctx)
            }
        };

        if next != self.state {
            debug!("Zombie {}: {:?} -> {:?}", self.id, self.state, next);
            self.time_acc = Duration::ZERO;
            self.state = next;
        }
    }

    /// Applies damage and returns true if this call killed the zombie.
    pub fn deal_damage(&mut self, damage: f32, events: &mut Vec<GameEvent>) -> bool {
        if apply_damage(&mut self.cur_hp, damage) {
            events.push(GameEvent::ZombieDeath { id: self.id });
            return true;
        }
        false
    }

    pub(crate) fn snapshot(&self) -> EntitySnapshot {
        let action = match (self.state, self.target) {
            (ZombieState::Attacking, Some(target_id)) => ActionData::Attacking { target_id },
            (ZombieState::Looking | ZombieState::Walking, _)
                if !self.movable.has_reached_destination() =>
            {
                ActionData::Moving {
                    speed: self.movable.speed,
                    path: self.movable.remaining_path(MAX_WAYPOINTS_TO_SEND),
                }
            }
            _ => ActionData::Idle,
        };
        EntitySnapshot {
            kind: EntityKind::Zombie,
            position: self.movable.pos,
            action,
            cur_hp: self.cur_hp.round() as u16,
        }
    }

    /// Id and position of the target if it still exists and is alive.
    fn resolve_target(&self, ctx: &TickContext<'_>) -> Option<(EntityId, Vec2)> {
        let id = self.target?;
        ctx.entities
            .get(id)
            .filter(|e| e.is_alive())
            .map(|e| (id, e.position()))
    }

    fn look(&mut self, ctx: &mut TickContext<'_>) -> ZombieState {
        let pos = self.movable.pos;
        let Some((id, dist)) = ctx
            .entities
            .nearest(pos, |e| e.kind() != EntityKind::Zombie)
        else {
            return ZombieState::Looking;
        };
        self.target = Some(id);

        let Some(target_pos) = ctx.entities.get(id).map(Entity::position) else {
            return ZombieState::Looking;
        };
        match ctx.pathfinder.find_path(pos, target_pos) {
            Some(path) => {
                self.movable.set_path(path);
                if dist < self.config.attack_distance {
                    ZombieState::Attacking
                } else {
                    ZombieState::Walking
                }
            }
            None => {
                trace!("Zombie {} has no path to {}", self.id, id);
                ZombieState::Looking
            }
        }
    }

    fn walk(&mut self, dt: Duration, target_pos: Vec2, ctx: &mut TickContext<'_>) -> ZombieState {
        if self.movable.pos.distance(target_pos) < self.config.attack_distance {
            return ZombieState::Attacking;
        }

        if self.time_acc >= self.config.looking_interval {
            self.time_acc -= self.config.looking_interval;
            return ZombieState::Looking;
        }

        self.movable.speed = self.config.walk_speed;
        self.move_or_collide(dt, ctx).unwrap_or(ZombieState::Walking)
    }

    fn attack(&mut self, target: EntityId, target_pos: Vec2, ctx: &mut TickContext<'_>) -> ZombieState {
        if self.movable.pos.distance(target_pos) > self.config.attack_distance {
            return ZombieState::Walking;
        }

        if self.time_acc >= self.config.damage_interval {
            self.time_acc -= self.config.damage_interval;
            let damage = f32::from(self.config.combat_power);
            let killed = match ctx.entities.get_mut(target) {
                Some(entity) => entity.deal_damage(damage, ctx.events),
                None => false,
            };
            if killed {
                debug!("Zombie {} killed {}", self.id, target);
                self.target = None;
                return ZombieState::Looking;
            }
        }
        ZombieState::Attacking
    }

    /// Moves along the path unless the next position overlaps another
    /// entity.
    ///
    /// Returns `None` when the zombie moved (or had nowhere to go) and
    /// should keep walking, or the state the collision forces otherwise.
    /// Only one collision is resolved per tick: the first living player
    /// found becomes the target; any other overlap aborts the move.
    fn move_or_collide(&mut self, dt: Duration, ctx: &mut TickContext<'_>) -> Option<ZombieState> {
        let (next, _) = self.movable.compute_move(dt);
        let area = Aabb::from_circle(next, ENTITY_RADIUS);

        let mut blocked = false;
        for (id, kind) in ctx.index.query(&area) {
            if id == self.id {
                continue;
            }
            if kind == EntityKind::Player {
                if ctx.entities.get(id).map_or(false, Entity::is_alive) {
                    trace!("Zombie {} bumped into player {}", self.id, id);
                    self.target = Some(id);
                    return Some(ZombieState::Attacking);
                }
                continue;
            }
            blocked = true;
        }
        if blocked {
            return Some(ZombieState::Looking);
        }

        if self.movable.advance(dt) {
            ctx.index.update(self.id, self.movable.bounds());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Building, EntityTable, Player};
    use crate::pathfinder::Pathfinder;
    use crate::world::{Grid, SpatialIndex};
    use std::sync::Arc;

    const TICK: Duration = Duration::from_millis(10);

    struct Sim {
        entities: EntityTable,
        index: SpatialIndex,
        pathfinder: Pathfinder,
        events: Vec<GameEvent>,
    }

    impl Sim {
        fn new(grid: Grid) -> Self {
            Self {
                entities: EntityTable::new(),
                index: SpatialIndex::new(),
                pathfinder: Pathfinder::new(Arc::new(grid)),
                events: Vec::new(),
            }
        }

        fn add(&mut self, entity: Entity) -> EntityId {
            let id = entity.id();
            self.index.insert(id, entity.kind(), entity.bounds());
            self.entities.insert(entity);
            id
        }

        fn add_player(&mut self, id: EntityId, pos: Vec2) -> EntityId {
            self.add(Entity::Player(Player::new(
                id,
                id,
                "survivor".into(),
                pos,
                3.0,
                100.0,
                3.0,
            )))
        }

        fn step(&mut self, zombie: &mut Zombie) {
            let mut ctx = TickContext {
                entities: &mut self.entities,
                index: &mut self.index,
                pathfinder: &self.pathfinder,
                events: &mut self.events,
            };
            zombie.update(TICK, &mut ctx);
        }

        fn player_hp(&self, id: EntityId) -> f32 {
            match self.entities.get(id) {
                Some(Entity::Player(p)) => p.cur_hp,
                other => panic!("not a player: {:?}", other),
            }
        }
    }

    fn spawn_zombie(sim: &mut Sim, id: EntityId, pos: Vec2) -> Zombie {
        let zombie = Zombie::new(id, pos, ZombieConfig::default());
        sim.index.insert(id, EntityKind::Zombie, zombie.movable.bounds());
        zombie
    }

    #[test]
    fn test_stays_looking_without_target() {
        let mut sim = Sim::new(Grid::open(10, 10, 1.0));
        let mut zombie = spawn_zombie(&mut sim, 1, Vec2::new(1.0, 1.0));

        for _ in 0..10 {
            sim.step(&mut zombie);
        }
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(zombie.target(), None);
    }

    #[test]
    fn test_stays_looking_without_path() {
        let grid = Grid::from_ascii(
            "
            ..#..
            ..#..
            ..#..
            ",
            1.0,
        );
        let mut sim = Sim::new(grid);
        sim.add_player(1, Vec2::new(4.5, 1.5));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(0.5, 1.5));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(zombie.target(), Some(1));
    }

    #[test]
    fn test_chases_and_attacks_stationary_player() {
        let mut sim = Sim::new(Grid::open(20, 20, 1.0));
        let player = sim.add_player(1, Vec2::new(10.0, 10.0));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(0.0, 0.0));

        let mut transitions = Vec::new();
        let mut state = zombie.state();
        for _ in 0..5000 {
            sim.step(&mut zombie);
            if zombie.state() != state {
                transitions.push((state, zombie.state()));
                state = zombie.state();
            }
            if state == ZombieState::Attacking {
                break;
            }
        }

        assert_eq!(
            transitions.first(),
            Some(&(ZombieState::Looking, ZombieState::Walking))
        );
        assert_eq!(
            transitions.last(),
            Some(&(ZombieState::Walking, ZombieState::Attacking))
        );
        let dist = zombie.position().distance(Vec2::new(10.0, 10.0));
        assert!(dist <= 1.2, "attacking from {}", dist);
        assert_eq!(sim.player_hp(player), 100.0);

        for _ in 0..49 {
            sim.step(&mut zombie);
        }
        assert_eq!(sim.player_hp(player), 100.0);

        sim.step(&mut zombie);
        assert_eq!(sim.player_hp(player), 95.0);
        assert_eq!(zombie.state(), ZombieState::Attacking);

        for _ in 0..49 {
            sim.step(&mut zombie);
        }
        assert_eq!(sim.player_hp(player), 95.0);
    }

    #[test]
    fn test_killing_target_goes_back_to_looking() {
        let mut sim = Sim::new(Grid::open(10, 10, 1.0));
        let player = sim.add_player(1, Vec2::new(2.0, 1.0));
        if let Some(Entity::Player(p)) = sim.entities.get_mut(player) {
            p.cur_hp = 5.0;
        }
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Attacking);

        for _ in 0..50 {
            sim.step(&mut zombie);
        }
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(zombie.target(), None);
        assert_eq!(sim.events, vec![GameEvent::PlayerDeath { id: player }]);
    }

    #[test]
    fn test_vanished_target_falls_back_to_looking() {
        let mut sim = Sim::new(Grid::open(20, 20, 1.0));
        let player = sim.add_player(1, Vec2::new(15.0, 15.0));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Walking);

        sim.entities.remove(player);
        sim.index.remove(player);

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(zombie.target(), None);
    }

    #[test]
    fn test_dead_target_falls_back_to_looking() {
        let mut sim = Sim::new(Grid::open(10, 10, 1.0));
        let player = sim.add_player(1, Vec2::new(2.0, 1.0));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Attacking);

        if let Some(e) = sim.entities.get_mut(player) {
            e.deal_damage(1000.0, &mut Vec::new());
        }
        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Looking);
    }

    #[test]
    fn test_walking_relooks_after_interval() {
        let mut sim = Sim::new(Grid::open(30, 30, 1.0));
        sim.add_player(1, Vec2::new(25.0, 25.0));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Walking);

        // 200ms looking interval at 10ms per tick
        for _ in 0..19 {
            sim.step(&mut zombie);
            assert_eq!(zombie.state(), ZombieState::Walking);
        }
        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Looking);
    }

    #[test]
    fn test_collision_with_player_switches_target() {
        let mut sim = Sim::new(Grid::open(20, 20, 1.0));
        let far = sim.add_player(1, Vec2::new(18.0, 1.0));
        let mut zombie = spawn_zombie(&mut sim, 3, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.target(), Some(far));

        // a second player steps right in front of the zombie
        let near = sim.add_player(2, Vec2::new(1.75, 1.0));
        let before = zombie.position();
        let mut ctx = TickContext {
            entities: &mut sim.entities,
            index: &mut sim.index,
            pathfinder: &sim.pathfinder,
            events: &mut sim.events,
        };
        zombie.movable.speed = 2.0;
        let outcome = zombie.move_or_collide(TICK, &mut ctx);

        assert_eq!(outcome, Some(ZombieState::Attacking));
        assert_eq!(zombie.target(), Some(near));
        assert_eq!(zombie.position(), before);
    }

    #[test]
    fn test_collision_with_obstacle_aborts_move() {
        let mut sim = Sim::new(Grid::open(20, 20, 1.0));
        sim.add_player(1, Vec2::new(18.0, 1.0));
        let mut zombie = spawn_zombie(&mut sim, 3, Vec2::new(1.0, 1.0));
        sim.step(&mut zombie);

        let blocker = spawn_zombie(&mut sim, 4, Vec2::new(1.75, 1.0));
        sim.entities.insert(Entity::Zombie(blocker));
        let before = zombie.position();

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(zombie.position(), before);
    }

    #[test]
    fn test_free_moves_commit_and_update_index() {
        let mut sim = Sim::new(Grid::open(20, 20, 1.0));
        sim.add_player(1, Vec2::new(18.0, 1.0));
        let mut first = spawn_zombie(&mut sim, 3, Vec2::new(1.0, 1.0));
        let mut second = spawn_zombie(&mut sim, 4, Vec2::new(1.0, 5.0));

        sim.step(&mut first);
        sim.step(&mut second);
        let (a, b) = (first.position(), second.position());

        sim.step(&mut first);
        sim.step(&mut second);
        assert!(first.position().x > a.x);
        assert!(second.position().x > b.x);
        assert_eq!(sim.index.bounds(3), Some(first.movable.bounds()));
        assert_eq!(sim.index.bounds(4), Some(second.movable.bounds()));
    }

    #[test]
    fn test_attacks_buildings_too() {
        let mut sim = Sim::new(Grid::open(10, 10, 1.0));
        let building = sim.add(Entity::Building(Building::new(
            1,
            0,
            Vec2::new(2.0, 1.0),
            10.0,
            5.0,
        )));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));

        sim.step(&mut zombie);
        assert_eq!(zombie.state(), ZombieState::Attacking);
        assert_eq!(zombie.target(), Some(building));

        for _ in 0..50 {
            sim.step(&mut zombie);
        }
        assert_eq!(zombie.state(), ZombieState::Looking);
        assert_eq!(sim.events, vec![GameEvent::BuildingDestroyed { id: building }]);
    }

    #[test]
    fn test_zombie_death_is_reported_once() {
        let mut zombie = Zombie::new(9, Vec2::ZERO, ZombieConfig::default());
        let mut events = Vec::new();

        assert!(!zombie.deal_damage(5.0, &mut events));
        assert_eq!(zombie.cur_hp(), 15.0);
        assert!(zombie.deal_damage(15.0, &mut events));
        assert_eq!(zombie.cur_hp(), 0.0);
        assert!(!zombie.deal_damage(100.0, &mut events));
        assert_eq!(zombie.cur_hp(), 0.0);
        assert_eq!(events, vec![GameEvent::ZombieDeath { id: 9 }]);
    }

    #[test]
    fn test_snapshot_reports_attack_target() {
        let mut sim = Sim::new(Grid::open(10, 10, 1.0));
        sim.add_player(1, Vec2::new(2.0, 1.0));
        let mut zombie = spawn_zombie(&mut sim, 2, Vec2::new(1.0, 1.0));
        assert_eq!(zombie.snapshot().action, ActionData::Idle);

        sim.step(&mut zombie);
        let snapshot = zombie.snapshot();
        assert_eq!(snapshot.kind, EntityKind::Zombie);
        assert_eq!(snapshot.cur_hp, 20);
        assert_eq!(snapshot.action, ActionData::Attacking { target_id: 1 });
    }
}
