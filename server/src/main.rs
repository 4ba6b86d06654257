use clap::Parser;
use log::{error, info};
use server::config::{Config, ZombieConfig};
use server::game_loop::GameLoop;
use server::network::Server;
use server::world::Grid;
use shared::Vec2;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Logic tick period in milliseconds
    #[arg(long, default_value = "10")]
    logic_tick_ms: u64,

    /// Broadcast tick period in milliseconds
    #[arg(long, default_value = "100")]
    broadcast_tick_ms: u64,

    /// In-game minutes elapsing per real minute
    #[arg(short, long, default_value = "10")]
    time_factor: u32,

    /// Grid width in tiles
    #[arg(long, default_value = "64")]
    grid_width: u32,

    /// Grid height in tiles
    #[arg(long, default_value = "64")]
    grid_height: u32,

    /// Tiles per world unit
    #[arg(long, default_value = "1.0")]
    grid_scale: f32,

    /// Build points a player adds per second
    #[arg(long, default_value = "3.0")]
    build_power: f32,

    /// Damage dealt by a zombie hit
    #[arg(long, default_value = "5")]
    zombie_power: u8,

    /// Seconds between zombie spawns, 0 disables spawning
    #[arg(long, default_value = "5")]
    zombie_spawn_secs: u64,

    /// Maximum number of zombies alive at once
    #[arg(long, default_value = "20")]
    max_zombies: usize,

    /// Seed for zombie spawn positions, random if not given
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Log filter used when RUST_LOG isn't set
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self) -> Config {
        let defaults = Config::default();
        Config {
            logic_tick_period: Duration::from_millis(self.logic_tick_ms),
            broadcast_tick_period: Duration::from_millis(self.broadcast_tick_ms),
            time_factor: self.time_factor,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            grid_scale: self.grid_scale,
            player_spawn: Vec2::new(
                self.grid_width as f32 / self.grid_scale / 2.0,
                self.grid_height as f32 / self.grid_scale / 2.0,
            ),
            player_build_power: self.build_power,
            zombie: ZombieConfig {
                combat_power: self.zombie_power,
                ..ZombieConfig::default()
            },
            zombie_spawn_period: Duration::from_secs(self.zombie_spawn_secs),
            max_zombies: self.max_zombies,
            spawn_seed: self.seed,
            max_clients: self.max_clients,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let config = args.config();
    config.validate()?;
    info!("Starting server with {:?}", config);

    let grid = Grid::open(config.grid_width, config.grid_height, config.grid_scale);
    let (game_loop, handle) = GameLoop::new(config.clone(), grid);

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(
        &address,
        config.max_clients,
        config.client_timeout,
        handle.commands.clone(),
        handle.broadcasts,
    )
    .await?;

    let network_handle = tokio::spawn(server.run());
    let mut game_handle = tokio::spawn(game_loop.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = &mut game_handle => {
            match result {
                Ok(Ok(())) => info!("Game loop finished"),
                Ok(Err(e)) => error!("Game loop failed: {}", e),
                Err(e) => error!("Game loop task panicked: {}", e),
            }
        }
        result = network_handle => {
            if let Err(e) = result {
                error!("Network task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = handle.shutdown.send(true);
            match game_handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Game loop failed while stopping: {}", e),
                Err(e) => error!("Game loop task panicked: {}", e),
            }
        }
    }

    Ok(())
}
