//! Runtime configuration of the simulation and its collaborators
//!
//! `main.rs` builds a [`Config`] from command-line arguments; tests usually
//! start from [`Config::default`] and override the handful of fields they
//! care about.

use crate::error::ConfigError;
use shared::Vec2;
use std::time::Duration;

/// Combat and movement parameters shared by every zombie.
#[derive(Debug, Clone, Copy)]
pub struct ZombieConfig {
    pub walk_speed: f32,
    pub combat_power: u8,
    pub total_hp: f32,
    /// Distance under which a zombie stops walking and starts hitting.
    pub attack_distance: f32,
    pub damage_interval: Duration,
    /// Time spent walking before the zombie looks for a closer target.
    pub looking_interval: Duration,
}

impl Default for ZombieConfig {
    fn default() -> Self {
        Self {
            walk_speed: 1.0,
            combat_power: 5,
            total_hp: 20.0,
            attack_distance: 1.2,
            damage_interval: Duration::from_millis(500),
            looking_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub logic_tick_period: Duration,
    pub broadcast_tick_period: Duration,
    /// In-game minutes that elapse per real minute.
    pub time_factor: u32,

    pub grid_width: u32,
    pub grid_height: u32,
    /// Tiles per world unit.
    pub grid_scale: f32,

    pub player_spawn: Vec2,
    pub player_speed: f32,
    pub player_total_hp: f32,
    /// Build points a player adds to a building per second.
    pub player_build_power: f32,

    pub building_total_hp: f32,
    pub building_build_points: f32,

    pub zombie: ZombieConfig,
    /// Zero disables the spawner.
    pub zombie_spawn_period: Duration,
    pub max_zombies: usize,
    /// Seed of the spawn position generator; `None` draws one from the OS.
    pub spawn_seed: Option<u64>,

    pub max_clients: usize,
    pub client_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logic_tick_period: Duration::from_millis(10),
            broadcast_tick_period: Duration::from_millis(100),
            time_factor: 10,
            grid_width: 64,
            grid_height: 64,
            grid_scale: 1.0,
            player_spawn: Vec2::new(32.0, 32.0),
            player_speed: 3.0,
            player_total_hp: 100.0,
            player_build_power: 3.0,
            building_total_hp: 100.0,
            building_build_points: 30.0,
            zombie: ZombieConfig::default(),
            zombie_spawn_period: Duration::from_secs(5),
            max_zombies: 20,
            spawn_seed: None,
            max_clients: 16,
            client_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Real time between two increments of the in-game minute counter.
    pub fn clock_period(&self) -> Duration {
        Duration::from_secs(60) / self.time_factor.max(1)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logic_tick_period.is_zero() {
            return Err(ConfigError::ZeroPeriod("logic tick"));
        }
        if self.broadcast_tick_period.is_zero() {
            return Err(ConfigError::ZeroPeriod("broadcast tick"));
        }
        if self.time_factor == 0 {
            return Err(ConfigError::ZeroTimeFactor);
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(ConfigError::EmptyGrid {
                width: self.grid_width,
                height: self.grid_height,
            });
        }
        if self.grid_scale.is_nan() || self.grid_scale <= 0.0 {
            return Err(ConfigError::InvalidGridScale(self.grid_scale));
        }
        Ok(())
    }
}
