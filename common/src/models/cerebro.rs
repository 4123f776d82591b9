// common/src/models/cerebro.rs
//! Cerebro, a small turn-based board game played over a state channel.
//!
//! Players take turns placing marks on an N x N board, removing marks, or
//! "moving". Each accepted move updates the board, the mover's score, the move
//! log, the turn and the version together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::address::Address;
use crate::error::GameError;
use crate::models::channel::ChannelId;

pub const DEFAULT_GRID_SIZE: usize = 8;
pub const MAX_GRID_SIZE: usize = 32;

pub const PLACE_BONUS: i64 = 10;
pub const REMOVE_BONUS: i64 = 5;
pub const MOVE_BONUS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveAction {
    Place,
    Remove,
    Move,
}

impl MoveAction {
    pub fn bonus(self) -> i64 {
        match self {
            MoveAction::Place => PLACE_BONUS,
            MoveAction::Remove => REMOVE_BONUS,
            MoveAction::Move => MOVE_BONUS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CerebroMove {
    pub player: Address,
    pub action: MoveAction,
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub player: Address,
    pub action: MoveAction,
    pub x: usize,
    pub y: usize,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CerebroGame {
    pub game_id: Uuid,
    /// Channel that receives the serialized state after every move
    pub channel_id: Option<ChannelId>,
    pub grid_size: usize,
    /// Indexed as `board[x][y]`
    pub board: Vec<Vec<Option<Address>>>,
    pub scores: BTreeMap<Address, i64>,
    pub moves: Vec<MoveRecord>,
    pub participants: Vec<Address>,
    pub current_player: Address,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl CerebroGame {
    pub fn new(
        game_id: Uuid,
        participants: Vec<Address>,
        grid_size: usize,
        channel_id: Option<ChannelId>,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if grid_size == 0 || grid_size > MAX_GRID_SIZE {
            return Err(GameError::InvalidGridSize { size: grid_size, max: MAX_GRID_SIZE });
        }

        let mut seen = HashSet::new();
        for player in &participants {
            if !seen.insert(player) {
                return Err(GameError::DuplicatePlayer(player.clone()));
            }
        }

        let current_player = participants.first().cloned().ok_or(GameError::NoPlayers)?;
        let scores = participants.iter().map(|p| (p.clone(), 0)).collect();

        Ok(Self {
            game_id,
            channel_id,
            grid_size,
            board: vec![vec![None; grid_size]; grid_size],
            scores,
            moves: Vec::new(),
            participants,
            current_player,
            version: 0,
            updated_at: now,
        })
    }

    pub fn is_player(&self, address: &Address) -> bool {
        self.participants.contains(address)
    }

    /// Owner of a cell, `None` when empty or off the board
    pub fn cell(&self, x: usize, y: usize) -> Option<&Address> {
        self.board.get(x).and_then(|column| column.get(y)).and_then(Option::as_ref)
    }

    pub fn score(&self, player: &Address) -> i64 {
        self.scores.get(player).copied().unwrap_or(0)
    }

    /// Explain why a move would be rejected
    pub fn check_move(&self, mv: &CerebroMove) -> Result<(), GameError> {
        if mv.x >= self.grid_size || mv.y >= self.grid_size {
            return Err(GameError::OutOfBounds { x: mv.x, y: mv.y, size: self.grid_size });
        }

        if !self.is_player(&mv.player) {
            return Err(GameError::NotPlayer(mv.player.clone()));
        }

        if mv.player != self.current_player {
            return Err(GameError::NotYourTurn {
                expected: self.current_player.clone(),
                mover: mv.player.clone(),
            });
        }

        let occupied = self.board[mv.x][mv.y].is_some();
        match mv.action {
            MoveAction::Place if occupied => Err(GameError::CellOccupied { x: mv.x, y: mv.y }),
            MoveAction::Remove if !occupied => Err(GameError::CellEmpty { x: mv.x, y: mv.y }),
            // TODO: validate source and destination once "move" carries both
            _ => Ok(()),
        }
    }

    pub fn is_valid_move(&self, mv: &CerebroMove) -> bool {
        self.check_move(mv).is_ok()
    }

    /// Validate and apply a move; nothing changes when it is rejected
    pub fn apply_move(&mut self, mv: &CerebroMove, now: DateTime<Utc>) -> Result<(), GameError> {
        self.check_move(mv)?;

        match mv.action {
            MoveAction::Place => self.board[mv.x][mv.y] = Some(mv.player.clone()),
            MoveAction::Remove => self.board[mv.x][mv.y] = None,
            MoveAction::Move => {}
        }

        *self.scores.entry(mv.player.clone()).or_insert(0) += mv.action.bonus();

        self.moves.push(MoveRecord {
            player: mv.player.clone(),
            action: mv.action,
            x: mv.x,
            y: mv.y,
            at: now,
        });

        let position = self
            .participants
            .iter()
            .position(|p| *p == self.current_player)
            .unwrap_or(0);
        self.current_player = self.participants[(position + 1) % self.participants.len()].clone();

        self.version += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Serialized game, carried as the `data` of a channel state update
    pub fn to_state_payload(&self) -> Result<Vec<u8>, GameError> {
        serde_json::to_vec(self).map_err(|e| GameError::Encoding(e.to_string()))
    }
}
