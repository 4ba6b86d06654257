use crate::game::GameState;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::EntityId;

/// Tiles tried before giving up on a spawn.
const SPAWN_ATTEMPTS: usize = 16;

/// Periodic zombie spawner.
///
/// Zombies only appear while somebody is playing, on a random walkable
/// tile nobody stands on, up to a fixed population.
pub struct ZombieDirector {
    rng: StdRng,
    max_zombies: usize,
}

impl ZombieDirector {
    pub fn new(max_zombies: usize) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            max_zombies,
        }
    }

    pub fn with_seed(max_zombies: usize, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_zombies,
        }
    }

    /// Spawns at most one zombie. Returns its id, if any.
    pub fn spawn(&mut self, state: &mut GameState) -> Option<EntityId> {
        if state.player_count() == 0 || state.zombie_count() >= self.max_zombies {
            return None;
        }

        let tiles: Vec<_> = state.grid().walkable_tiles().collect();
        for _ in 0..SPAWN_ATTEMPTS {
            let tile = *tiles.choose(&mut self.rng)?;
            let pos = state.grid().tile_center(tile);
            if state.is_free(pos) {
                return Some(state.spawn_zombie(pos));
            }
        }
        debug!("No free tile found to spawn a zombie");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::world::Grid;
    use shared::{EntityKind, Vec2};

    fn state(grid: Grid) -> GameState {
        let config = Config {
            player_spawn: Vec2::new(0.5, 0.5),
            ..Config::default()
        };
        GameState::new(config, grid)
    }

    #[test]
    fn test_no_spawn_without_players() {
        let mut state = state(Grid::open(10, 10, 1.0));
        let mut director = ZombieDirector::with_seed(5, 1);

        assert_eq!(director.spawn(&mut state), None);
        assert_eq!(state.zombie_count(), 0);
    }

    #[test]
    fn test_spawns_up_to_the_cap() {
        let mut state = state(Grid::open(10, 10, 1.0));
        state.on_player_joined(1, "dave".into()).unwrap();
        let mut director = ZombieDirector::with_seed(3, 7);

        let mut spawned = Vec::new();
        for _ in 0..10 {
            spawned.extend(director.spawn(&mut state));
        }
        assert_eq!(spawned.len(), 3);
        assert_eq!(state.zombie_count(), 3);
        for id in spawned {
            let entity = state.entities().get(id).unwrap();
            assert_eq!(entity.kind(), EntityKind::Zombie);
            assert!(state.grid().tile_at(entity.position()).is_some());
        }
    }

    #[test]
    fn test_only_free_walkable_tiles() {
        // the player stands on the only walkable tile
        let grid = Grid::from_ascii(
            "
            .##
            ###
            ",
            1.0,
        );
        let mut state = state(grid);
        state.on_player_joined(1, "erin".into()).unwrap();
        let mut director = ZombieDirector::with_seed(3, 42);

        assert_eq!(director.spawn(&mut state), None);
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let spawn_positions = |seed| {
            let mut state = state(Grid::open(30, 30, 1.0));
            state.on_player_joined(1, "frank".into()).unwrap();
            let mut director = ZombieDirector::with_seed(5, seed);
            let mut positions = Vec::new();
            for _ in 0..5 {
                if let Some(id) = director.spawn(&mut state) {
                    positions.push(state.entities().get(id).unwrap().position());
                }
            }
            positions
        };
        assert_eq!(spawn_positions(9), spawn_positions(9));
    }
}
