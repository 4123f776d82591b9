// web-server/src/lib.rs
pub mod api;
pub mod audit;
pub mod channel_registry;
pub mod channel_service;
pub mod error;
pub mod faucet;
pub mod game_registry;
pub mod middleware;
pub mod network;
pub mod session_store;
pub mod static_files;
pub mod utils;

use actix::{Actor, Addr};
use actix_web::web;
use common::{Clock, Config, NetworkError};
use std::sync::Arc;

use crate::audit::AuditSink;
use crate::channel_registry::ChannelRegistry;
use crate::channel_service::ChannelService;
use crate::faucet::FaucetClient;
use crate::game_registry::GameRegistry;
use crate::network::ClearnodeClient;
use crate::session_store::SessionKeyStore;

/// Shared handles registered as app data on every worker
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub sessions: web::Data<Addr<SessionKeyStore>>,
    pub channels: web::Data<ChannelService>,
    pub games: web::Data<GameRegistry>,
    pub faucet: Option<web::Data<FaucetClient>>,
}

impl AppState {
    /// Wire up the stores. Must be called from inside a running actix system.
    pub fn build(
        config: Config,
        network: Arc<dyn ClearnodeClient>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, NetworkError> {
        let sessions = SessionKeyStore::from_config(&config.session, clock.clone(), audit.clone()).start();

        let registry = Arc::new(ChannelRegistry::new(clock.clone()));
        let channels = Arc::new(ChannelService::new(
            registry,
            network,
            audit.clone(),
            config.channel.clone(),
        ));
        let games = GameRegistry::new(channels.clone(), audit, clock);
        let faucet = FaucetClient::from_config(&config.faucet)?.map(web::Data::new);

        if faucet.is_none() {
            tracing::info!("No faucet configured, /api/faucet is disabled");
        }

        Ok(Self {
            config: web::Data::new(config),
            sessions: web::Data::new(sessions),
            channels: web::Data::from(channels),
            games: web::Data::new(games),
            faucet,
        })
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.config.clone())
            .app_data(self.sessions.clone())
            .app_data(self.channels.clone())
            .app_data(self.games.clone());

        if let Some(faucet) = &self.faucet {
            cfg.app_data(faucet.clone());
        }

        api::configure(cfg);
    }
}
