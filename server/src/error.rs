use crate::dispatch::MessageType;
use shared::Vec2;
use thiserror::Error;

/// Error returned by a message handler. The offending message is dropped
/// and the game loop keeps running.
#[derive(Debug, Error, PartialEq)]
pub enum DispatchError {
    #[error("no handler registered for message type {0:?}")]
    NoHandler(MessageType),
    #[error("client {0} doesn't control any entity")]
    UnknownClient(u32),
    #[error("client {0} already joined the game")]
    AlreadyJoined(u32),
    #[error("position ({}, {}) is outside the world", .0.x, .0.y)]
    OutOfWorld(Vec2),
    #[error("handler for {expected:?} received an unexpected command")]
    UnexpectedCommand { expected: MessageType },
}

/// Fatal error stopping the game loop.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("couldn't pack the game state: {0}")]
    Snapshot(#[from] bincode::Error),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} period must be greater than zero")]
    ZeroPeriod(&'static str),
    #[error("time factor must be greater than zero")]
    ZeroTimeFactor,
    #[error("grid must have at least one tile, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("grid scale must be positive, got {0}")]
    InvalidGridScale(f32),
}
