//! Inbound messages and the table routing them to their handler

use crate::error::DispatchError;
use crate::game::GameState;
use crate::planner::PathResult;
use log::warn;
use shared::Vec2;
use std::collections::HashMap;

/// Client id used for messages produced by the server itself, such as
/// movement planner results. Real clients are numbered from 1.
pub const SERVER_ORIGIN: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Join,
    Leave,
    Move,
    Build,
    MovementRequestResult,
}

/// Decoded command along with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join { name: String },
    Leave,
    Move { dst: Vec2 },
    Build { kind: u8, pos: Vec2 },
    PathResult(PathResult),
}

impl Command {
    pub fn message_type(&self) -> MessageType {
        match self {
            Command::Join { .. } => MessageType::Join,
            Command::Leave => MessageType::Leave,
            Command::Move { .. } => MessageType::Move,
            Command::Build { .. } => MessageType::Build,
            Command::PathResult(_) => MessageType::MovementRequestResult,
        }
    }
}

/// Command queued for the game loop, tagged with the client it comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientMessage {
    pub client_id: u32,
    pub command: Command,
}

pub type Handler = fn(&mut GameState, u32, Command) -> Result<(), DispatchError>;

/// Routes every message type to exactly one handler.
#[derive(Default)]
pub struct MessageManager {
    handlers: HashMap<MessageType, Handler>,
}

impl MessageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch table with the handlers of every gameplay message.
    pub fn with_game_handlers() -> Self {
        let mut manager = Self::new();
        manager.listen(MessageType::Join, handle_join);
        manager.listen(MessageType::Leave, handle_leave);
        manager.listen(MessageType::Move, handle_move);
        manager.listen(MessageType::Build, handle_build);
        manager.listen(MessageType::MovementRequestResult, handle_path_result);
        manager
    }

    /// Registers the handler of a message type, replacing the previous one.
    pub fn listen(&mut self, message_type: MessageType, handler: Handler) {
        if self.handlers.insert(message_type, handler).is_some() {
            warn!("Replacing handler for {:?}", message_type);
        }
    }

    pub fn dispatch(&self, state: &mut GameState, message: ClientMessage) -> Result<(), DispatchError> {
        let message_type = message.command.message_type();
        let handler = self
            .handlers
            .get(&message_type)
            .ok_or(DispatchError::NoHandler(message_type))?;
        handler(state, message.client_id, message.command)
    }
}

fn handle_join(state: &mut GameState, client_id: u32, command: Command) -> Result<(), DispatchError> {
    match command {
        Command::Join { name } => state.on_player_joined(client_id, name).map(|_| ()),
        _ => Err(DispatchError::UnexpectedCommand {
            expected: MessageType::Join,
        }),
    }
}

fn handle_leave(state: &mut GameState, client_id: u32, command: Command) -> Result<(), DispatchError> {
    match command {
        Command::Leave => state.on_player_left(client_id),
        _ => Err(DispatchError::UnexpectedCommand {
            expected: MessageType::Leave,
        }),
    }
}

fn handle_move(state: &mut GameState, client_id: u32, command: Command) -> Result<(), DispatchError> {
    match command {
        Command::Move { dst } => state.on_move(client_id, dst).map(|_| ()),
        _ => Err(DispatchError::UnexpectedCommand {
            expected: MessageType::Move,
        }),
    }
}

fn handle_build(state: &mut GameState, client_id: u32, command: Command) -> Result<(), DispatchError> {
    match command {
        Command::Build { kind, pos } => state.on_build(client_id, kind, pos).map(|_| ()),
        _ => Err(DispatchError::UnexpectedCommand {
            expected: MessageType::Build,
        }),
    }
}

fn handle_path_result(state: &mut GameState, _client_id: u32, command: Command) -> Result<(), DispatchError> {
    match command {
        Command::PathResult(result) => state.on_path_result(result),
        _ => Err(DispatchError::UnexpectedCommand {
            expected: MessageType::MovementRequestResult,
        }),
    }
}
