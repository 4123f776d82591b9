// web-server/src/channel_service.rs
//! Orchestrates channel operations between the local registry and the clearnode.
//!
//! Local checks run first and the registry is only changed after the clearnode
//! accepts, so a failed remote call leaves the registry as it was.

use common::models::channel::{validate_participants, Allocation, ChannelId, ChannelRecord, ChannelState};
use common::{Address, ChannelConfig, ChannelError};
use std::sync::Arc;

use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::channel_registry::{ChannelLock, ChannelRegistry};
use crate::network::{ChallengeResult, ChannelInfo, ClearnodeClient, CloseResult, CreateChannelParams};

pub struct ChannelService {
    registry: Arc<ChannelRegistry>,
    network: Arc<dyn ClearnodeClient>,
    audit: Arc<dyn AuditSink>,
    settings: ChannelConfig,
}

impl ChannelService {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        network: Arc<dyn ClearnodeClient>,
        audit: Arc<dyn AuditSink>,
        settings: ChannelConfig,
    ) -> Self {
        Self {
            registry,
            network,
            audit,
            settings,
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Open a channel on the clearnode and register it locally at version 0.
    /// The creator must be one of the participants.
    pub async fn create_channel(
        &self,
        creator: &Address,
        participants: Vec<Address>,
        initial_allocation: Allocation,
    ) -> Result<ChannelRecord, ChannelError> {
        validate_participants(&participants)?;
        if !participants.contains(creator) {
            return Err(ChannelError::NotParticipant(creator.clone()));
        }

        let record = self.registry.prepare_channel(participants, initial_allocation)?;

        let params = CreateChannelParams {
            channel_id: record.channel_id.clone(),
            participants: record.participants.clone(),
            initial_allocation: record.state.allocations.clone(),
            token: self.settings.token.clone(),
            challenge_period_secs: self.settings.challenge_period_secs,
            adjudicator: self.settings.adjudicator.clone(),
        };

        let handle = self.network.create_channel(&params).await.map_err(|e| {
            tracing::error!("Clearnode failed to create channel {}: {}", record.channel_id, e);
            e
        })?;
        tracing::debug!("Clearnode opened {} with status {}", handle.channel_id, handle.status);

        self.registry.insert(record.clone());
        self.audit.record(AuditRecord::new(
            AuditKind::ChannelCreated,
            record.channel_id.as_str(),
            format!("opened by {} with {} participants", creator, record.participants.len()),
            record.created_at,
        ));

        Ok(record)
    }

    /// Forward a new state to the clearnode and record it once accepted.
    ///
    /// The channel stays locked for the whole exchange, so concurrent updates
    /// to one channel are applied one at a time.
    pub async fn update_channel_state(
        &self,
        caller: &Address,
        channel_id: &ChannelId,
        new_state: ChannelState,
    ) -> Result<ChannelRecord, ChannelError> {
        let lock = self.registry.lock(channel_id).await?;
        self.push_state(lock, caller, new_state).await
    }

    /// Replace the channel payload at the next version, keeping allocations.
    ///
    /// The version is read under the same lock that commits it, so a
    /// concurrent update is never overtaken.
    pub async fn advance_channel_state(
        &self,
        caller: &Address,
        channel_id: &ChannelId,
        data: Vec<u8>,
    ) -> Result<ChannelRecord, ChannelError> {
        let lock = self.registry.lock(channel_id).await?;
        let current = lock.record();
        let next = ChannelState {
            version: current.version() + 1,
            allocations: current.state.allocations.clone(),
            data,
        };
        self.push_state(lock, caller, next).await
    }

    async fn push_state(
        &self,
        mut lock: ChannelLock,
        caller: &Address,
        new_state: ChannelState,
    ) -> Result<ChannelRecord, ChannelError> {
        let channel_id = lock.channel_id().clone();
        ensure_participant(lock.record(), caller)?;
        lock.record().check_update(&new_state)?;

        let result = self.network.update_channel(&channel_id, &new_state).await.map_err(|e| {
            tracing::error!("Clearnode rejected update {} of {}: {}", new_state.version, channel_id, e);
            e
        })?;
        tracing::debug!("Clearnode accepted {} at version {}", result.channel_id, result.version);

        let now = self.registry.now();
        let record = lock.commit_update(new_state, now)?.clone();

        self.audit.record(AuditRecord::new(
            AuditKind::ChannelUpdated,
            channel_id.as_str(),
            format!("version {} by {}", record.version(), caller),
            now,
        ));

        Ok(record)
    }

    /// Close a channel with a final state no older than the last recorded one
    pub async fn close_channel(
        &self,
        caller: &Address,
        channel_id: &ChannelId,
        final_state: ChannelState,
        reason: &str,
    ) -> Result<CloseResult, ChannelError> {
        let lock = self.registry.lock(channel_id).await?;
        ensure_participant(lock.record(), caller)?;
        lock.record().check_final_state(&final_state)?;

        let result = self
            .network
            .close_channel(channel_id, &final_state, reason)
            .await
            .map_err(|e| {
                tracing::error!("Clearnode failed to close {}: {}", channel_id, e);
                e
            })?;

        self.registry.remove(lock);
        self.audit.record(AuditRecord::new(
            AuditKind::ChannelClosed,
            channel_id.as_str(),
            format!("closed by {} at version {}: {}", caller, final_state.version, reason),
            self.registry.now(),
        ));

        Ok(result)
    }

    /// Pass a dispute through to the clearnode; nothing changes locally
    pub async fn challenge_channel(
        &self,
        caller: &Address,
        channel_id: &ChannelId,
        reason: &str,
    ) -> Result<ChallengeResult, ChannelError> {
        let record = self.registry.get_channel(channel_id)?;
        ensure_participant(&record, caller)?;

        let result = self
            .network
            .challenge_channel(channel_id, reason, caller)
            .await
            .map_err(|e| {
                tracing::error!("Clearnode failed to challenge {}: {}", channel_id, e);
                e
            })?;

        tracing::warn!("Channel {} challenged by {}: {}", channel_id, caller, reason);
        self.audit.record(AuditRecord::new(
            AuditKind::ChannelChallenged,
            channel_id.as_str(),
            format!("challenged by {}: {}", caller, reason),
            self.registry.now(),
        ));

        Ok(result)
    }

    pub fn get_channel(&self, caller: &Address, channel_id: &ChannelId) -> Result<ChannelRecord, ChannelError> {
        let record = self.registry.get_channel(channel_id)?;
        ensure_participant(&record, caller)?;
        Ok(record)
    }

    /// The clearnode's view of a channel the caller belongs to
    pub async fn remote_channel(&self, caller: &Address, channel_id: &ChannelId) -> Result<ChannelInfo, ChannelError> {
        self.get_channel(caller, channel_id)?;
        Ok(self.network.get_channel(channel_id).await?)
    }

    pub fn list_channels(&self, caller: &Address) -> Vec<ChannelRecord> {
        self.registry.list_channels(Some(caller))
    }
}

fn ensure_participant(record: &ChannelRecord, caller: &Address) -> Result<(), ChannelError> {
    if record.is_participant(caller) {
        Ok(())
    } else {
        Err(ChannelError::NotParticipant(caller.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ChannelHandle, DemoClearnode, UpdateResult};
    use async_trait::async_trait;
    use common::{ManualClock, NetworkError};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    #[derive(Debug, Default)]
    struct MemoryAudit(Mutex<Vec<AuditRecord>>);

    impl AuditSink for MemoryAudit {
        fn record(&self, record: AuditRecord) {
            self.0.lock().unwrap().push(record);
        }
    }

    /// Demo network whose updates and closes can be made to fail
    #[derive(Default)]
    struct FlakyClearnode {
        inner: DemoClearnode,
        failing: AtomicBool,
    }

    impl FlakyClearnode {
        fn fail(&self) -> Result<(), NetworkError> {
            if self.failing.load(Ordering::SeqCst) {
                Err(NetworkError::Transport { service: "clearnode".into(), message: "connection reset".into() })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ClearnodeClient for FlakyClearnode {
        async fn create_channel(&self, params: &CreateChannelParams) -> Result<ChannelHandle, NetworkError> {
            self.fail()?;
            self.inner.create_channel(params).await
        }

        async fn update_channel(&self, id: &ChannelId, state: &ChannelState) -> Result<UpdateResult, NetworkError> {
            self.fail()?;
            self.inner.update_channel(id, state).await
        }

        async fn close_channel(&self, id: &ChannelId, state: &ChannelState, reason: &str) -> Result<CloseResult, NetworkError> {
            self.fail()?;
            self.inner.close_channel(id, state, reason).await
        }

        async fn challenge_channel(&self, id: &ChannelId, reason: &str, who: &Address) -> Result<ChallengeResult, NetworkError> {
            self.fail()?;
            self.inner.challenge_channel(id, reason, who).await
        }

        async fn get_channel(&self, id: &ChannelId) -> Result<ChannelInfo, NetworkError> {
            self.inner.get_channel(id).await
        }
    }

    fn service(network: Arc<dyn ClearnodeClient>) -> (ChannelService, Arc<MemoryAudit>) {
        let audit = Arc::new(MemoryAudit::default());
        let registry = Arc::new(ChannelRegistry::new(Arc::new(ManualClock::default())));
        let service = ChannelService::new(registry, network, audit.clone(), ChannelConfig::default());
        (service, audit)
    }

    fn transfer(version: u64, amount: i128) -> ChannelState {
        ChannelState {
            version,
            allocations: [(addr(1), -amount), (addr(2), amount)].into_iter().collect(),
            data: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_update_and_replay() {
        let (service, audit) = service(Arc::new(DemoClearnode::new()));
        let record = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap();
        assert_eq!(record.version(), 0);

        let id = record.channel_id;
        let updated = service.update_channel_state(&addr(1), &id, transfer(1, 10)).await.unwrap();
        assert_eq!(updated.version(), 1);

        let replay = service.update_channel_state(&addr(2), &id, transfer(1, 10)).await.unwrap_err();
        assert_eq!(replay, ChannelError::InvalidVersion { current: 1, proposed: 1 });

        let kinds: Vec<_> = audit.0.lock().unwrap().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![AuditKind::ChannelCreated, AuditKind::ChannelUpdated]);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_state_unchanged() {
        let network = Arc::new(FlakyClearnode::default());
        let (service, _) = service(network.clone());
        let id = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap()
            .channel_id;

        network.failing.store(true, Ordering::SeqCst);
        let err = service.update_channel_state(&addr(1), &id, transfer(1, 5)).await.unwrap_err();
        assert!(matches!(err, ChannelError::Network(NetworkError::Transport { .. })));
        assert_eq!(service.get_channel(&addr(1), &id).unwrap().version(), 0);

        let err = service.close_channel(&addr(1), &id, transfer(0, 0), "done").await.unwrap_err();
        assert!(matches!(err, ChannelError::Network(_)));
        assert!(service.registry().contains(&id));

        network.failing.store(false, Ordering::SeqCst);
        service.update_channel_state(&addr(1), &id, transfer(1, 5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_create_registers_nothing() {
        let network = Arc::new(FlakyClearnode::default());
        network.failing.store(true, Ordering::SeqCst);
        let (service, _) = service(network);

        assert!(service.create_channel(&addr(1), vec![addr(1)], Allocation::new()).await.is_err());
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_outsiders_are_rejected() {
        let (service, _) = service(Arc::new(DemoClearnode::new()));

        let err = service.create_channel(&addr(9), vec![addr(1), addr(2)], Allocation::new()).await.unwrap_err();
        assert_eq!(err, ChannelError::NotParticipant(addr(9)));

        let id = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap()
            .channel_id;
        assert!(matches!(
            service.update_channel_state(&addr(9), &id, transfer(1, 1)).await,
            Err(ChannelError::NotParticipant(_))
        ));
        assert!(matches!(
            service.challenge_channel(&addr(9), &id, "mine").await,
            Err(ChannelError::NotParticipant(_))
        ));
    }

    #[tokio::test]
    async fn test_close_then_lookup_fails() {
        let (service, _) = service(Arc::new(DemoClearnode::new()));
        let id = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap()
            .channel_id;
        service.update_channel_state(&addr(1), &id, transfer(1, 3)).await.unwrap();

        let closed = service.close_channel(&addr(2), &id, transfer(1, 3), "settled").await.unwrap();
        assert_eq!(closed.final_version, 1);

        assert!(matches!(service.get_channel(&addr(1), &id), Err(ChannelError::NotFound(_))));
        assert!(matches!(
            service.close_channel(&addr(1), &id, transfer(1, 3), "again").await,
            Err(ChannelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_advance_keeps_allocations_and_bumps_version() {
        let (service, _) = service(Arc::new(DemoClearnode::new()));
        let id = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap()
            .channel_id;
        service.update_channel_state(&addr(1), &id, transfer(1, 7)).await.unwrap();

        let record = service.advance_channel_state(&addr(2), &id, b"board".to_vec()).await.unwrap();
        assert_eq!(record.version(), 2);
        assert_eq!(record.state.allocations, transfer(1, 7).allocations);
        assert_eq!(record.state.data, b"board".to_vec());

        assert!(matches!(
            service.advance_channel_state(&addr(9), &id, Vec::new()).await,
            Err(ChannelError::NotParticipant(_))
        ));
    }

    #[tokio::test]
    async fn test_challenge_is_pass_through() {
        let (service, _) = service(Arc::new(DemoClearnode::new()));
        let id = service
            .create_channel(&addr(1), vec![addr(1), addr(2)], Allocation::new())
            .await
            .unwrap()
            .channel_id;

        let result = service.challenge_channel(&addr(2), &id, "counterparty offline").await.unwrap();
        assert_eq!(result.challenger, addr(2));
        assert_eq!(service.get_channel(&addr(1), &id).unwrap().version(), 0);
        assert_eq!(service.remote_channel(&addr(1), &id).await.unwrap().status, "challenged");
    }
}
