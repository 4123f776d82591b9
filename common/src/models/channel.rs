// common/src/models/channel.rs
//! Channel records as tracked by the local registry.
//!
//! The registry only sequences state; economic validity of an allocation is
//! judged by the clearnode and its adjudicator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::address::Address;
use crate::error::ChannelError;
use crate::utils::hex_bytes;

/// Signed amount moved per participant in a state update
pub type Allocation = BTreeMap<Address, i128>;

/// Opaque channel identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChannelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A versioned snapshot of a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub version: u64,
    #[serde(default)]
    pub allocations: Allocation,
    #[serde(default, with = "hex_bytes")]
    pub data: Vec<u8>,
}

impl ChannelState {
    pub fn initial(allocations: Allocation) -> Self {
        Self {
            version: 0,
            allocations,
            data: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: ChannelId,
    /// Fixed at creation
    pub participants: Vec<Address>,
    pub state: ChannelState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChannelRecord {
    /// Build a record at version 0 after validating participants and allocation
    pub fn new(
        channel_id: ChannelId,
        participants: Vec<Address>,
        initial_allocation: Allocation,
        now: DateTime<Utc>,
    ) -> Result<Self, ChannelError> {
        validate_participants(&participants)?;
        validate_allocation(&participants, &initial_allocation)?;

        Ok(Self {
            channel_id,
            participants,
            state: ChannelState::initial(initial_allocation),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn is_participant(&self, address: &Address) -> bool {
        self.participants.contains(address)
    }

    /// Check that `new_state` may replace the current state
    pub fn check_update(&self, new_state: &ChannelState) -> Result<(), ChannelError> {
        if new_state.version <= self.state.version {
            return Err(ChannelError::InvalidVersion {
                current: self.state.version,
                proposed: new_state.version,
            });
        }
        validate_allocation(&self.participants, &new_state.allocations)
    }

    /// Check a closing state against the last recorded update
    pub fn check_final_state(&self, final_state: &ChannelState) -> Result<(), ChannelError> {
        if final_state.version < self.state.version {
            return Err(ChannelError::StaleFinalState {
                current: self.state.version,
                proposed: final_state.version,
            });
        }
        validate_allocation(&self.participants, &final_state.allocations)
    }

    /// Replace the state once `check_update` passes
    pub fn apply_update(&mut self, new_state: ChannelState, now: DateTime<Utc>) -> Result<(), ChannelError> {
        self.check_update(&new_state)?;
        self.state = new_state;
        self.updated_at = now;
        Ok(())
    }
}

/// Participants must be non-empty and distinct
pub fn validate_participants(participants: &[Address]) -> Result<(), ChannelError> {
    if participants.is_empty() {
        return Err(ChannelError::EmptyParticipants);
    }

    let mut seen = HashSet::with_capacity(participants.len());
    for participant in participants {
        if !seen.insert(participant) {
            return Err(ChannelError::DuplicateParticipant(participant.clone()));
        }
    }
    Ok(())
}

/// Every allocation entry must name a participant
pub fn validate_allocation(participants: &[Address], allocation: &Allocation) -> Result<(), ChannelError> {
    match allocation.keys().find(|address| !participants.contains(address)) {
        Some(stranger) => Err(ChannelError::UnknownParticipant(stranger.clone())),
        None => Ok(()),
    }
}
