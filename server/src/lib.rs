//! # Survival Game Server Library
//!
//! This library provides the authoritative server for a multiplayer survival
//! game where players build bases while zombies hunt them down. It owns the
//! canonical game state, turns client commands into entity actions and
//! broadcasts snapshots so every client sees the same world.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive simulation: player movement along
//! computed paths, construction of buildings, and the zombie AI hunting
//! anything that isn't a zombie. Clients only send commands and render
//! the snapshots they receive.
//!
//! ### Pathfinding
//! Players and zombies move along paths computed by an A* search over the
//! tile grid. Paths start and end at the exact requested points and are
//! smoothed so that straight runs hold no intermediate waypoints.
//!
//! ### State Broadcasting
//! At a fixed rate the whole state is packed into a snapshot, serialized
//! with bincode and handed to the network layer for delivery.
//!
//! ## Architecture Design
//!
//! ### Single Writer Game Loop
//! One task, the [`game_loop::GameLoop`], owns the simulation. It waits on
//! all of its event sources at once and handles whichever fires first:
//! inbound messages, logic ticks, broadcast ticks, clock ticks, zombie
//! spawns and admin queries. Since nothing else touches the state, no
//! locks guard the entities or the world.
//!
//! ### Message Passing
//! The UDP network layer, the movement planner and the admin console run
//! as separate tasks and only exchange messages with the loop through
//! channels. Path requests in particular are answered asynchronously: a
//! player waits in a `WaitingForPath` action until its path comes back.
//!
//! ## Module Organization
//!
//! - `world`: tile grid and spatial index for overlap queries
//! - `pathfinder`: A* search and path smoothing
//! - `movable`, `actions`, `entity`, `zombie`: the entity model, the player
//!   action stack and the zombie state machine
//! - `game`: the simulation state and its command handlers
//! - `dispatch`: message types and the handler table
//! - `planner`, `director`: movement planner task and zombie spawner
//! - `game_loop`: the scheduler tying it all together
//! - `client_manager`, `network`: UDP clients and packet routing
//! - `config`, `error`: runtime configuration and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::Config;
//! use server::game_loop::GameLoop;
//! use server::network::Server;
//! use server::world::Grid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let grid = Grid::open(config.grid_width, config.grid_height, config.grid_scale);
//!     let (game_loop, handle) = GameLoop::new(config.clone(), grid);
//!
//!     let server = Server::new(
//!         "127.0.0.1:8080",
//!         config.max_clients,
//!         config.client_timeout,
//!         handle.commands.clone(),
//!         handle.broadcasts,
//!     )
//!     .await?;
//!     tokio::spawn(server.run());
//!
//!     game_loop.run().await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod client_manager;
pub mod config;
pub mod director;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod game;
pub mod game_loop;
pub mod movable;
pub mod network;
pub mod pathfinder;
pub mod planner;
pub mod world;
pub mod zombie;
