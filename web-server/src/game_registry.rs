// web-server/src/game_registry.rs
use common::models::cerebro::{CerebroGame, CerebroMove, DEFAULT_GRID_SIZE};
use common::models::channel::ChannelId;
use common::{Address, ChannelError, Clock, GameError};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::audit::{AuditKind, AuditRecord, AuditSink};
use crate::channel_service::ChannelService;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Live Cerebro games, optionally mirrored into a state channel
pub struct GameRegistry {
    games: DashMap<Uuid, Arc<Mutex<CerebroGame>>>,
    channels: Arc<ChannelService>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl GameRegistry {
    pub fn new(channels: Arc<ChannelService>, audit: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            games: DashMap::new(),
            channels,
            audit,
            clock,
        }
    }

    /// Start a game. When bound to a channel, every player must belong to it.
    pub async fn create_game(
        &self,
        creator: &Address,
        participants: Vec<Address>,
        grid_size: Option<usize>,
        channel_id: Option<ChannelId>,
    ) -> Result<CerebroGame, PlayError> {
        if !participants.contains(creator) {
            return Err(GameError::NotPlayer(creator.clone()).into());
        }

        if let Some(channel_id) = &channel_id {
            let record = self.channels.get_channel(creator, channel_id)?;
            if let Some(outsider) = participants.iter().find(|p| !record.is_participant(p)) {
                return Err(ChannelError::NotParticipant(outsider.clone()).into());
            }
        }

        let game = CerebroGame::new(
            Uuid::new_v4(),
            participants,
            grid_size.unwrap_or(DEFAULT_GRID_SIZE),
            channel_id,
            self.clock.now(),
        )?;

        self.games.insert(game.game_id, Arc::new(Mutex::new(game.clone())));
        tracing::info!("Cerebro game {} started by {}", game.game_id, creator);
        Ok(game)
    }

    pub async fn get_game(&self, caller: &Address, game_id: Uuid) -> Result<CerebroGame, PlayError> {
        let game = self.slot(game_id)?.lock().await.clone();
        if !game.is_player(caller) {
            return Err(GameError::NotPlayer(caller.clone()).into());
        }
        Ok(game)
    }

    /// Validate and apply a move.
    ///
    /// For a channel-bound game the new state is pushed to the channel first;
    /// the game only advances if that update is accepted.
    pub async fn play(&self, game_id: Uuid, mv: CerebroMove) -> Result<CerebroGame, PlayError> {
        let slot = self.slot(game_id)?;
        let mut game = slot.lock().await;

        let mut next = game.clone();
        next.apply_move(&mv, self.clock.now())?;

        if let Some(channel_id) = &next.channel_id {
            self.channels
                .advance_channel_state(&mv.player, channel_id, next.to_state_payload()?)
                .await?;
        }

        *game = next;

        self.audit.record(AuditRecord::new(
            AuditKind::GameMove,
            game_id.to_string(),
            format!("{} {:?} at ({}, {})", mv.player, mv.action, mv.x, mv.y),
            game.updated_at,
        ));

        Ok(game.clone())
    }

    /// Drop a finished or abandoned game. Only its players may end it.
    pub async fn end_game(&self, caller: &Address, game_id: Uuid) -> Result<CerebroGame, PlayError> {
        let slot = self.slot(game_id)?;
        let game = slot.lock().await;
        if !game.is_player(caller) {
            return Err(GameError::NotPlayer(caller.clone()).into());
        }

        // A move queued behind this lock finds the game gone on its next lookup
        self.games.remove(&game_id);
        tracing::info!("Cerebro game {} ended by {} at version {}", game_id, caller, game.version);

        self.audit.record(AuditRecord::new(
            AuditKind::GameEnded,
            game_id.to_string(),
            format!("ended by {} at version {}", caller, game.version),
            self.clock.now(),
        ));

        Ok(game.clone())
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    fn slot(&self, game_id: Uuid) -> Result<Arc<Mutex<CerebroGame>>, GameError> {
        self.games
            .get(&game_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(GameError::NotFound(game_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditSink;
    use crate::channel_registry::ChannelRegistry;
    use crate::network::{
        ChallengeResult, ChannelHandle, ChannelInfo, ClearnodeClient, CloseResult, CreateChannelParams, DemoClearnode,
        UpdateResult,
    };
    use async_trait::async_trait;
    use common::models::channel::ChannelState;
    use common::NetworkError;
    use common::models::cerebro::{MoveAction, PLACE_BONUS};
    use common::models::channel::Allocation;
    use common::{ChannelConfig, ManualClock};

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    /// Demo network that yields to the scheduler before accepting an update
    #[derive(Default)]
    struct SlowClearnode(DemoClearnode);

    #[async_trait]
    impl ClearnodeClient for SlowClearnode {
        async fn create_channel(&self, params: &CreateChannelParams) -> Result<ChannelHandle, NetworkError> {
            self.0.create_channel(params).await
        }

        async fn update_channel(&self, id: &ChannelId, state: &ChannelState) -> Result<UpdateResult, NetworkError> {
            tokio::task::yield_now().await;
            self.0.update_channel(id, state).await
        }

        async fn close_channel(&self, id: &ChannelId, state: &ChannelState, reason: &str) -> Result<CloseResult, NetworkError> {
            self.0.close_channel(id, state, reason).await
        }

        async fn challenge_channel(&self, id: &ChannelId, reason: &str, who: &Address) -> Result<ChallengeResult, NetworkError> {
            self.0.challenge_channel(id, reason, who).await
        }

        async fn get_channel(&self, id: &ChannelId) -> Result<ChannelInfo, NetworkError> {
            self.0.get_channel(id).await
        }
    }

    fn games() -> (GameRegistry, Arc<ChannelService>) {
        games_on(Arc::new(DemoClearnode::new()))
    }

    fn games_on(network: Arc<dyn ClearnodeClient>) -> (GameRegistry, Arc<ChannelService>) {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        let channels = Arc::new(ChannelService::new(
            Arc::new(ChannelRegistry::new(clock.clone())),
            network,
            audit.clone(),
            ChannelConfig::default(),
        ));
        (GameRegistry::new(channels.clone(), audit, clock), channels)
    }

    fn place(player: u8, x: usize, y: usize) -> CerebroMove {
        CerebroMove { player: addr(player), action: MoveAction::Place, x, y }
    }

    #[tokio::test]
    async fn test_turns_alternate() {
        let (games, _) = games();
        let game = games.create_game(&addr(0xa), vec![addr(0xa), addr(0xb)], None, None).await.unwrap();
        assert_eq!(game.grid_size, DEFAULT_GRID_SIZE);

        let game = games.play(game.game_id, place(0xa, 0, 0)).await.unwrap();
        assert_eq!(game.cell(0, 0), Some(&addr(0xa)));
        assert_eq!(game.score(&addr(0xa)), PLACE_BONUS);
        assert_eq!(game.current_player, addr(0xb));
        assert_eq!(game.version, 1);

        let err = games.play(game.game_id, place(0xb, 0, 0)).await.unwrap_err();
        assert_eq!(err, PlayError::Game(GameError::CellOccupied { x: 0, y: 0 }));
    }

    #[tokio::test]
    async fn test_moves_are_pushed_to_bound_channel() {
        let (games, channels) = games();
        let channel = channels
            .create_channel(&addr(0xa), vec![addr(0xa), addr(0xb)], Allocation::new())
            .await
            .unwrap();

        let game = games
            .create_game(&addr(0xa), vec![addr(0xa), addr(0xb)], Some(4), Some(channel.channel_id.clone()))
            .await
            .unwrap();
        games.play(game.game_id, place(0xa, 1, 2)).await.unwrap();

        let record = channels.get_channel(&addr(0xb), &channel.channel_id).unwrap();
        assert_eq!(record.version(), 1);
        let mirrored: CerebroGame = serde_json::from_slice(&record.state.data).unwrap();
        assert_eq!(mirrored.cell(1, 2), Some(&addr(0xa)));
    }

    #[tokio::test]
    async fn test_closed_channel_blocks_move() {
        let (games, channels) = games();
        let channel = channels
            .create_channel(&addr(0xa), vec![addr(0xa), addr(0xb)], Allocation::new())
            .await
            .unwrap();
        let game = games
            .create_game(&addr(0xa), vec![addr(0xa), addr(0xb)], None, Some(channel.channel_id.clone()))
            .await
            .unwrap();

        channels
            .close_channel(&addr(0xa), &channel.channel_id, ChannelState::default(), "done")
            .await
            .unwrap();

        let err = games.play(game.game_id, place(0xa, 0, 0)).await.unwrap_err();
        assert!(matches!(err, PlayError::Channel(ChannelError::NotFound(_))));
        assert_eq!(games.get_game(&addr(0xa), game.game_id).await.unwrap().version, 0);
    }

    #[tokio::test]
    async fn test_unknown_game() {
        let (games, _) = games();
        let id = Uuid::new_v4();
        assert_eq!(games.play(id, place(0xa, 0, 0)).await.unwrap_err(), PlayError::Game(GameError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_move_waits_for_a_concurrent_channel_update() {
        let (games, channels) = games_on(Arc::new(SlowClearnode::default()));
        let channel = channels
            .create_channel(&addr(0xa), vec![addr(0xa), addr(0xb)], Allocation::new())
            .await
            .unwrap();
        let id = channel.channel_id.clone();
        let game = games
            .create_game(&addr(0xa), vec![addr(0xa), addr(0xb)], None, Some(id.clone()))
            .await
            .unwrap();

        let transfer = ChannelState {
            version: 1,
            allocations: [(addr(0xa), -5), (addr(0xb), 5)].into_iter().collect(),
            data: Vec::new(),
        };

        // The transfer takes the channel lock first and is still in flight when the move arrives
        let addr_b = addr(0xb);
        let (transferred, played) = tokio::join!(
            channels.update_channel_state(&addr_b, &id, transfer.clone()),
            games.play(game.game_id, place(0xa, 3, 3)),
        );
        assert_eq!(transferred.unwrap().version(), 1);
        let played = played.unwrap();
        assert_eq!(played.version, 1);

        let record = channels.get_channel(&addr(0xa), &id).unwrap();
        assert_eq!(record.version(), 2);
        assert_eq!(record.state.allocations, transfer.allocations);
        let mirrored: CerebroGame = serde_json::from_slice(&record.state.data).unwrap();
        assert_eq!(mirrored.cell(3, 3), Some(&addr(0xa)));
    }

    #[tokio::test]
    async fn test_ended_game_is_forgotten() {
        let (games, _) = games();
        let game = games.create_game(&addr(0xa), vec![addr(0xa), addr(0xb)], None, None).await.unwrap();
        games.play(game.game_id, place(0xa, 0, 0)).await.unwrap();

        let err = games.end_game(&addr(0xc), game.game_id).await.unwrap_err();
        assert_eq!(err, PlayError::Game(GameError::NotPlayer(addr(0xc))));
        assert_eq!(games.len(), 1);

        let ended = games.end_game(&addr(0xb), game.game_id).await.unwrap();
        assert_eq!(ended.version, 1);
        assert!(games.is_empty());

        let missing = PlayError::Game(GameError::NotFound(game.game_id));
        assert_eq!(games.play(game.game_id, place(0xb, 1, 1)).await.unwrap_err(), missing);
        assert_eq!(games.get_game(&addr(0xa), game.game_id).await.unwrap_err(), missing);
        assert_eq!(games.end_game(&addr(0xa), game.game_id).await.unwrap_err(), missing);
    }
}
