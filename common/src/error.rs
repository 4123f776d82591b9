// common/src/error.rs
use thiserror::Error;
use uuid::Uuid;

use crate::address::Address;

/// Errors produced while parsing a wallet address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0} must start with 0x")]
    MissingPrefix(String),

    #[error("address {address} has {length} hex digits, expected 40")]
    InvalidLength { address: String, length: usize },

    #[error("address {0} is not valid hex")]
    InvalidHex(String),
}

/// Failures reported by the state-channel network or other remote collaborators
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("request to {service} failed: {message}")]
    Transport { service: String, message: String },

    #[error("{method} rejected by clearnode ({code}): {message}")]
    Rejected {
        method: String,
        code: i64,
        message: String,
    },

    #[error("invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },
}

/// Local validation failures of the channel registry, plus collaborator failures
/// surfaced while a channel operation was in flight
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("channel not found: {0}")]
    NotFound(String),

    #[error("invalid version: {proposed} must be greater than current version {current}")]
    InvalidVersion { current: u64, proposed: u64 },

    #[error("final state version {proposed} is older than recorded version {current}")]
    StaleFinalState { current: u64, proposed: u64 },

    #[error("a channel needs at least one participant")]
    EmptyParticipants,

    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(Address),

    #[error("allocation names {0}, who is not a channel participant")]
    UnknownParticipant(Address),

    #[error("{0} is not a participant of this channel")]
    NotParticipant(Address),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Errors raised by the Cerebro game
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("game not found: {0}")]
    NotFound(Uuid),

    #[error("a game needs at least one player")]
    NoPlayers,

    #[error("player {0} is listed more than once")]
    DuplicatePlayer(Address),

    #[error("{0} is not playing this game")]
    NotPlayer(Address),

    #[error("grid size {size} is outside 1..={max}")]
    InvalidGridSize { size: usize, max: usize },

    #[error("it is {expected}'s turn, not {mover}'s")]
    NotYourTurn { expected: Address, mover: Address },

    #[error("cell ({x}, {y}) is outside the {size}x{size} board")]
    OutOfBounds { x: usize, y: usize, size: usize },

    #[error("cell ({x}, {y}) is already occupied")]
    CellOccupied { x: usize, y: usize },

    #[error("cell ({x}, {y}) is empty")]
    CellEmpty { x: usize, y: usize },

    #[error("failed to encode game state: {0}")]
    Encoding(String),
}
