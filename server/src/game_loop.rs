//! The game loop, sole owner and mutator of the simulation
//!
//! Every iteration waits for whichever of these is ready first and handles
//! exactly that one:
//! - shutdown signal
//! - inbound message, dispatched to its handler
//! - broadcast tick, packing and serializing a snapshot
//! - logic tick, updating every entity
//! - clock tick, advancing the in-game minute counter
//! - zombie spawn tick
//! - admin query
//!
//! The network layer, the movement planner and the admin console only talk
//! to the loop through channels, so nothing here needs a lock.

use crate::config::Config;
use crate::director::ZombieDirector;
use crate::dispatch::{ClientMessage, MessageManager};
use crate::entity::{EntityState, GameEvent};
use crate::error::LoopError;
use crate::game::{GameState, GameSummary};
use crate::planner::{spawn_planner, PathRequest};
use crate::world::Grid;
use bincode::serialize;
use log::{debug, error, info, trace};
use shared::{EntityId, Packet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Serialized `Packet::GameState` ready to be sent to every client.
///
/// Only the latest one is kept: a network sender that falls behind skips
/// snapshots instead of queueing them.
#[derive(Debug, Clone, Default)]
pub struct Broadcast {
    pub tick: u64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminQuery {
    Summary,
    Entity(EntityId),
    Entities,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminReply {
    Summary(GameSummary),
    Entity(Option<EntityState>),
    Entities(Vec<(EntityId, EntityState)>),
}

#[derive(Debug)]
pub struct AdminRequest {
    pub query: AdminQuery,
    pub reply: oneshot::Sender<AdminReply>,
}

/// Everything the collaborators of the loop need to talk to it.
pub struct LoopHandle {
    pub commands: mpsc::UnboundedSender<ClientMessage>,
    pub broadcasts: watch::Receiver<Broadcast>,
    pub admin: mpsc::UnboundedSender<AdminRequest>,
    /// Send `true` to stop the loop.
    pub shutdown: watch::Sender<bool>,
}

impl LoopHandle {
    /// Asks the loop a read-only question. Returns `None` if the loop is
    /// gone.
    pub async fn query(&self, query: AdminQuery) -> Option<AdminReply> {
        let (reply, response) = oneshot::channel();
        self.admin.send(AdminRequest { query, reply }).ok()?;
        response.await.ok()
    }
}

pub struct GameLoop {
    state: GameState,
    dispatcher: MessageManager,
    director: ZombieDirector,

    inbound_tx: mpsc::UnboundedSender<ClientMessage>,
    inbound_rx: mpsc::UnboundedReceiver<ClientMessage>,
    broadcast_tx: watch::Sender<Broadcast>,
    admin_rx: mpsc::UnboundedReceiver<AdminRequest>,
    shutdown_rx: watch::Receiver<bool>,
    planner_tx: Option<mpsc::UnboundedSender<PathRequest>>,

    broadcast_tick: u64,
    logic_tick: u64,
}

impl GameLoop {
    pub fn new(config: Config, grid: Grid) -> (Self, LoopHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, broadcast_rx) = watch::channel(Broadcast::default());
        let (admin_tx, admin_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let director = match config.spawn_seed {
            Some(seed) => ZombieDirector::with_seed(config.max_zombies, seed),
            None => ZombieDirector::new(config.max_zombies),
        };
        let game_loop = GameLoop {
            state: GameState::new(config, grid),
            dispatcher: MessageManager::with_game_handlers(),
            director,
            inbound_tx: inbound_tx.clone(),
            inbound_rx,
            broadcast_tx,
            admin_rx,
            shutdown_rx,
            planner_tx: None,
            broadcast_tick: 0,
            logic_tick: 0,
        };
        let handle = LoopHandle {
            commands: inbound_tx,
            broadcasts: broadcast_rx,
            admin: admin_tx,
            shutdown: shutdown_tx,
        };
        (game_loop, handle)
    }

    /// Runs until shutdown is requested or the snapshot can't be
    /// serialized.
    pub async fn run(mut self) -> Result<(), LoopError> {
        let config = self.state.config().clone();

        let (planner_tx, planner_rx) = mpsc::unbounded_channel();
        let planner = spawn_planner(
            self.state.pathfinder().clone(),
            planner_rx,
            self.inbound_tx.clone(),
        );
        self.planner_tx = Some(planner_tx);

        let mut logic_interval = ticker(config.logic_tick_period);
        let mut broadcast_interval = ticker(config.broadcast_tick_period);
        let mut clock_interval = ticker(config.clock_period());
        let spawner_enabled = !config.zombie_spawn_period.is_zero();
        let mut spawn_interval = ticker(config.zombie_spawn_period.max(Duration::from_millis(1)));
        let mut last_logic = Instant::now();

        info!(
            "Game loop started: logic every {:?}, broadcast every {:?}, one game minute every {:?}",
            config.logic_tick_period,
            config.broadcast_tick_period,
            config.clock_period()
        );

        let result = loop {
            tokio::select! {
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        break Ok(());
                    }
                }

                Some(message) = self.inbound_rx.recv() => {
                    self.handle_message(message);
                }

                _ = broadcast_interval.tick() => {
                    if let Err(e) = self.broadcast() {
                        error!("Stopping game loop: {}", e);
                        break Err(e);
                    }
                }

                _ = logic_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_logic);
                    last_logic = now;
                    self.logic(dt);
                }

                _ = clock_interval.tick() => {
                    let time = self.state.advance_clock();
                    trace!("Game time {:02}:{:02}", time / 60, time % 60);
                }

                _ = spawn_interval.tick(), if spawner_enabled => {
                    self.director.spawn(&mut self.state);
                }

                Some(request) = self.admin_rx.recv() => {
                    let reply = self.answer(request.query);
                    if request.reply.send(reply).is_err() {
                        debug!("Admin requester went away before the reply");
                    }
                }
            }
        };

        self.planner_tx = None;
        if let Err(e) = planner.await {
            error!("Movement planner task failed: {}", e);
        }
        info!("Game loop stopped after {} logic ticks", self.logic_tick);
        result
    }

    fn handle_message(&mut self, message: ClientMessage) {
        let client_id = message.client_id;
        let message_type = message.command.message_type();
        if let Err(e) = self.dispatcher.dispatch(&mut self.state, message) {
            error!(
                "Couldn't handle {:?} from client {}: {}",
                message_type, client_id, e
            );
        }
        self.forward_path_requests();
    }

    fn forward_path_requests(&mut self) {
        let requests = self.state.take_path_requests();
        let Some(planner) = &self.planner_tx else {
            return;
        };
        for request in requests {
            if planner.send(request).is_err() {
                error!("Movement planner is gone, dropping path request");
            }
        }
    }

    fn logic(&mut self, dt: Duration) {
        self.logic_tick += 1;
        for event in self.state.update(dt) {
            match event {
                GameEvent::ZombieDeath { id } => info!("Zombie {} died", id),
                GameEvent::PlayerDeath { id } => info!("Player entity {} died", id),
                GameEvent::BuildingDestroyed { id } => info!("Building {} destroyed", id),
                GameEvent::BuildingFinished { id } => info!("Building {} finished", id),
            }
        }

        if self.logic_tick % 1000 == 0 {
            let summary = self.state.summary();
            debug!(
                "Tick {}: dt {:?}, {} players, {} zombies, {} buildings",
                self.logic_tick, dt, summary.players, summary.zombies, summary.buildings
            );
        }
    }

    fn broadcast(&mut self) -> Result<(), LoopError> {
        let snapshot = self.state.pack(timestamp_millis());
        let payload = serialize(&Packet::GameState(snapshot))?;
        self.broadcast_tick += 1;

        let broadcast = Broadcast {
            tick: self.broadcast_tick,
            payload,
        };
        if self.broadcast_tx.send(broadcast).is_err() {
            trace!("Nobody listens to broadcasts");
        }
        Ok(())
    }

    fn answer(&self, query: AdminQuery) -> AdminReply {
        match query {
            AdminQuery::Summary => AdminReply::Summary(self.state.summary()),
            AdminQuery::Entity(id) => AdminReply::Entity(self.state.entity_state(id)),
            AdminQuery::Entities => AdminReply::Entities(self.state.entity_states()),
        }
    }
}

/// Interval whose first tick fires one period from now. Late ticks are
/// skipped rather than bunched.
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

pub(crate) fn timestamp_millis() -> u64 {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    (timestamp.min(u64::MAX as u128)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Command;
    use bincode::deserialize;
    use shared::Vec2;

    fn fast_config() -> Config {
        Config {
            logic_tick_period: Duration::from_millis(5),
            broadcast_tick_period: Duration::from_millis(20),
            zombie_spawn_period: Duration::ZERO,
            player_spawn: Vec2::new(5.0, 5.0),
            grid_width: 16,
            grid_height: 16,
            ..Config::default()
        }
    }

    fn start() -> (tokio::task::JoinHandle<Result<(), LoopError>>, LoopHandle) {
        let config = fast_config();
        let grid = Grid::open(config.grid_width, config.grid_height, config.grid_scale);
        let (game_loop, handle) = GameLoop::new(config, grid);
        (tokio::spawn(game_loop.run()), handle)
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (task, handle) = start();
        handle.shutdown.send(true).unwrap();
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_loop() {
        let (task, handle) = start();
        drop(handle);
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_broadcasts_decode_to_game_state() {
        let (task, mut handle) = start();

        handle.broadcasts.changed().await.unwrap();
        let first = handle.broadcasts.borrow_and_update().clone();
        handle.broadcasts.changed().await.unwrap();
        let second = handle.broadcasts.borrow_and_update().clone();
        assert!(first.tick >= 1);
        assert!(second.tick > first.tick);

        match deserialize::<Packet>(&second.payload).unwrap() {
            Packet::GameState(snapshot) => {
                assert!(snapshot.entities.is_empty());
                assert!(snapshot.timestamp > 0);
            }
            other => panic!("unexpected packet {:?}", other),
        }

        handle.shutdown.send(true).unwrap();
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_message_does_not_stop_loop() {
        let (task, handle) = start();

        handle
            .commands
            .send(ClientMessage {
                client_id: 9,
                command: Command::Leave,
            })
            .unwrap();
        handle
            .commands
            .send(ClientMessage {
                client_id: 9,
                command: Command::Join {
                    name: "gina".into(),
                },
            })
            .unwrap();

        // inbound messages and admin queries race each other, so poll
        let mut players = 0;
        for _ in 0..100 {
            match handle.query(AdminQuery::Summary).await {
                Some(AdminReply::Summary(summary)) => players = summary.players,
                other => panic!("unexpected reply {:?}", other),
            }
            if players == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(players, 1);

        handle.shutdown.send(true).unwrap();
        tokio_test::assert_ok!(task.await.unwrap());
    }

    #[test]
    fn test_spawn_seed_makes_spawns_reproducible() {
        let spawned = || {
            let config = Config {
                spawn_seed: Some(9),
                ..fast_config()
            };
            let grid = Grid::open(config.grid_width, config.grid_height, config.grid_scale);
            let (mut game_loop, _handle) = GameLoop::new(config, grid);
            game_loop.state.on_player_joined(1, "hana".into()).unwrap();

            let mut positions = Vec::new();
            for _ in 0..3 {
                let id = game_loop.director.spawn(&mut game_loop.state).unwrap();
                positions.push(game_loop.state.entity_state(id));
            }
            positions
        };

        assert_eq!(spawned(), spawned());
    }

    #[test]
    fn test_ticker_skips_first_immediate_tick() {
        tokio_test::block_on(async {
            let period = Duration::from_millis(20);
            let start = Instant::now();
            let mut interval = ticker(period);
            interval.tick().await;
            assert!(start.elapsed() >= period);
        });
    }
}
