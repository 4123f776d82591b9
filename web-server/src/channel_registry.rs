// web-server/src/channel_registry.rs
//! Local registry of open channels and their latest accepted state.
//!
//! Each channel sits behind its own async mutex. Holding a [`ChannelLock`]
//! serializes version checks and commits for that channel, including across
//! awaits on the clearnode, while other channels proceed independently.
//!
//! Reads go to a published copy of the last committed record instead, so a
//! slow clearnode call never blocks lookups or listings.

use chrono::{DateTime, Utc};
use common::models::channel::{Allocation, ChannelId, ChannelRecord, ChannelState};
use common::{Address, ChannelError, Clock};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::utils::token::hash_hex;

struct Slot {
    record: ChannelRecord,
    // Set on close so waiters queued on the mutex see the channel as gone
    closed: bool,
}

// Last committed record per open channel, written only under the channel lock
type Published = Arc<DashMap<ChannelId, ChannelRecord>>;

pub struct ChannelRegistry {
    channels: DashMap<ChannelId, Arc<Mutex<Slot>>>,
    published: Published,
    counter: AtomicU64,
    clock: Arc<dyn Clock>,
}

/// Exclusive access to one open channel
pub struct ChannelLock {
    channel_id: ChannelId,
    guard: OwnedMutexGuard<Slot>,
    published: Published,
}

impl ChannelLock {
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    pub fn record(&self) -> &ChannelRecord {
        &self.guard.record
    }

    /// Replace the stored state, enforcing a strictly greater version
    pub fn commit_update(&mut self, new_state: ChannelState, now: DateTime<Utc>) -> Result<&ChannelRecord, ChannelError> {
        self.guard.record.apply_update(new_state, now)?;
        self.published.insert(self.channel_id.clone(), self.guard.record.clone());
        Ok(&self.guard.record)
    }
}

impl ChannelRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            channels: DashMap::new(),
            published: Arc::new(DashMap::new()),
            counter: AtomicU64::new(0),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn contains(&self, channel_id: &ChannelId) -> bool {
        self.channels.contains_key(channel_id)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Validate inputs and build a version 0 record under a fresh identifier,
    /// without registering it yet
    pub fn prepare_channel(
        &self,
        participants: Vec<Address>,
        initial_allocation: Allocation,
    ) -> Result<ChannelRecord, ChannelError> {
        let now = self.clock.now();
        let channel_id = self.next_channel_id(&participants, now);
        ChannelRecord::new(channel_id, participants, initial_allocation, now)
    }

    /// Register a prepared record
    pub fn insert(&self, record: ChannelRecord) -> ChannelId {
        let channel_id = record.channel_id.clone();
        self.published.insert(channel_id.clone(), record.clone());
        self.channels
            .insert(channel_id.clone(), Arc::new(Mutex::new(Slot { record, closed: false })));
        tracing::info!("Channel registered: {}", channel_id);
        channel_id
    }

    /// Create and register a channel at version 0
    pub fn create_channel(
        &self,
        participants: Vec<Address>,
        initial_allocation: Allocation,
    ) -> Result<ChannelId, ChannelError> {
        let record = self.prepare_channel(participants, initial_allocation)?;
        Ok(self.insert(record))
    }

    /// Wait for exclusive access to an open channel
    pub async fn lock(&self, channel_id: &ChannelId) -> Result<ChannelLock, ChannelError> {
        // Clone the Arc so no map shard stays locked across the await
        let slot = self
            .channels
            .get(channel_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))?;

        let guard = slot.lock_owned().await;
        if guard.closed {
            // Closed while we were waiting
            return Err(ChannelError::NotFound(channel_id.to_string()));
        }

        Ok(ChannelLock {
            channel_id: channel_id.clone(),
            guard,
            published: Arc::clone(&self.published),
        })
    }

    /// Close a locked channel; later lookups report not found
    pub fn remove(&self, mut lock: ChannelLock) -> ChannelRecord {
        self.channels.remove(&lock.channel_id);
        self.published.remove(&lock.channel_id);
        lock.guard.closed = true;
        tracing::info!("Channel removed: {}", lock.channel_id);
        lock.guard.record.clone()
    }

    /// Last committed record; does not wait for an update in flight
    pub fn get_channel(&self, channel_id: &ChannelId) -> Result<ChannelRecord, ChannelError> {
        self.published
            .get(channel_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ChannelError::NotFound(channel_id.to_string()))
    }

    /// Apply an update locally, rejecting versions that do not increase
    pub async fn update_channel_state(
        &self,
        channel_id: &ChannelId,
        new_state: ChannelState,
    ) -> Result<ChannelRecord, ChannelError> {
        let mut lock = self.lock(channel_id).await?;
        let now = self.clock.now();
        Ok(lock.commit_update(new_state, now)?.clone())
    }

    /// Remove a channel given a final state no older than the recorded one
    pub async fn close_channel(
        &self,
        channel_id: &ChannelId,
        final_state: &ChannelState,
    ) -> Result<ChannelRecord, ChannelError> {
        let lock = self.lock(channel_id).await?;
        lock.record().check_final_state(final_state)?;
        Ok(self.remove(lock))
    }

    /// Snapshot of open channels, optionally only those `participant` belongs to
    pub fn list_channels(&self, participant: Option<&Address>) -> Vec<ChannelRecord> {
        let mut records: Vec<ChannelRecord> = self
            .published
            .iter()
            .filter(|entry| participant.map_or(true, |p| entry.value().is_participant(p)))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        records
    }

    // sha256(counter || timestamp || participants), re-rolled on collision
    fn next_channel_id(&self, participants: &[Address], now: DateTime<Utc>) -> ChannelId {
        loop {
            let nonce = self.counter.fetch_add(1, Ordering::SeqCst);
            let mut input = Vec::new();
            input.extend_from_slice(&nonce.to_be_bytes());
            input.extend_from_slice(&now.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
            for participant in participants {
                input.extend_from_slice(participant.as_str().as_bytes());
            }

            let channel_id = ChannelId::new(format!("0x{}", hash_hex(&input)));
            if !self.channels.contains_key(&channel_id) {
                return channel_id;
            }
        }
    }
}
