// common/src/messages.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::address::Address;
use crate::models::cerebro::MoveAction;
use crate::models::channel::ChannelState;

/// Uniform envelope for every API response.
///
/// Callers check `success` before reading `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSessionRequest {
    pub address: Address,
    pub session_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateSessionResponse {
    pub valid: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub participants: Vec<Address>,
    #[serde(default)]
    pub initial_allocation: BTreeMap<Address, i128>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseChannelRequest {
    pub final_state: ChannelState,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeChannelRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGameRequest {
    pub participants: Vec<Address>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub grid_size: Option<usize>,
}

/// A move submitted by the authenticated player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRequest {
    pub action: MoveAction,
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetReceipt {
    pub amount: serde_json::Value,
    pub token: String,
    #[serde(rename = "txStatus")]
    pub tx_status: String,
}

/// Summary of a channel closure returned to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelClosedResponse {
    pub channel_id: String,
    pub final_version: u64,
    pub closed_at: DateTime<Utc>,
}
