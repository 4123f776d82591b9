// web-server/src/network.rs
//! Client side of the state-channel network ("clearnode").
//!
//! Every call may fail with a [`NetworkError`]; callers treat that as terminal
//! for the operation in flight and do not retry.

use async_trait::async_trait;
use common::models::channel::{Allocation, ChannelId, ChannelState};
use common::{Address, ClearnodeConfig, ClearnodeMode, NetworkError};
use dashmap::DashMap;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SERVICE: &str = "clearnode";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelParams {
    pub channel_id: ChannelId,
    pub participants: Vec<Address>,
    pub initial_allocation: Allocation,
    pub token: String,
    pub challenge_period_secs: u64,
    pub adjudicator: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHandle {
    pub channel_id: ChannelId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub channel_id: ChannelId,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseResult {
    pub channel_id: ChannelId,
    pub final_version: u64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub channel_id: ChannelId,
    pub challenger: Address,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: ChannelId,
    pub participants: Vec<Address>,
    pub version: u64,
    pub status: String,
}

#[async_trait]
pub trait ClearnodeClient: Send + Sync {
    async fn create_channel(&self, params: &CreateChannelParams) -> Result<ChannelHandle, NetworkError>;

    async fn update_channel(&self, channel_id: &ChannelId, state: &ChannelState) -> Result<UpdateResult, NetworkError>;

    async fn close_channel(
        &self,
        channel_id: &ChannelId,
        final_state: &ChannelState,
        reason: &str,
    ) -> Result<CloseResult, NetworkError>;

    async fn challenge_channel(
        &self,
        channel_id: &ChannelId,
        reason: &str,
        challenger: &Address,
    ) -> Result<ChallengeResult, NetworkError>;

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<ChannelInfo, NetworkError>;
}

/// Build the client selected by configuration
pub fn build_client(config: &ClearnodeConfig) -> Result<Arc<dyn ClearnodeClient>, NetworkError> {
    match config.mode {
        ClearnodeMode::Remote => {
            tracing::info!("Using clearnode at {}", config.url);
            Ok(Arc::new(HttpClearnode::new(&config.url, Duration::from_secs(config.request_timeout_secs))?))
        }
        ClearnodeMode::Demo => {
            tracing::warn!("Demo mode: channel operations stay in this process");
            Ok(Arc::new(DemoClearnode::new()))
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

// Typed params keep i128 allocations out of serde_json::Value
#[derive(Debug, Serialize)]
struct StateParams<'a> {
    channel_id: &'a ChannelId,
    #[serde(flatten)]
    state: &'a ChannelState,
}

#[derive(Debug, Serialize)]
struct CloseParams<'a> {
    channel_id: &'a ChannelId,
    final_state: &'a ChannelState,
    reason: &'a str,
}

/// JSON-RPC over HTTP client for a remote clearnode
#[derive(Clone)]
pub struct HttpClearnode {
    client: Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl HttpClearnode {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R, NetworkError>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::debug!("clearnode call {} (id {})", method, request.id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NetworkError::Transport {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Transport {
                service: SERVICE.to_string(),
                message: format!("{} returned HTTP {}: {}", method, status, body),
            });
        }

        let body: RpcResponse<R> = response.json().await.map_err(|e| NetworkError::InvalidResponse {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })?;

        match (body.result, body.error) {
            (_, Some(error)) => Err(NetworkError::Rejected {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(NetworkError::InvalidResponse {
                service: SERVICE.to_string(),
                message: format!("{} returned neither result nor error", method),
            }),
        }
    }
}

#[async_trait]
impl ClearnodeClient for HttpClearnode {
    async fn create_channel(&self, params: &CreateChannelParams) -> Result<ChannelHandle, NetworkError> {
        self.call("create_channel", params).await
    }

    async fn update_channel(&self, channel_id: &ChannelId, state: &ChannelState) -> Result<UpdateResult, NetworkError> {
        self.call("update_channel", StateParams { channel_id, state }).await
    }

    async fn close_channel(
        &self,
        channel_id: &ChannelId,
        final_state: &ChannelState,
        reason: &str,
    ) -> Result<CloseResult, NetworkError> {
        self.call(
            "close_channel",
            CloseParams {
                channel_id,
                final_state,
                reason,
            },
        )
        .await
    }

    async fn challenge_channel(
        &self,
        channel_id: &ChannelId,
        reason: &str,
        challenger: &Address,
    ) -> Result<ChallengeResult, NetworkError> {
        self.call(
            "challenge_channel",
            serde_json::json!({
                "channel_id": channel_id,
                "reason": reason,
                "challenger": challenger,
            }),
        )
        .await
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<ChannelInfo, NetworkError> {
        self.call("get_channel", serde_json::json!({ "channel_id": channel_id })).await
    }
}

/// In-process channel network used only when demo mode is configured
#[derive(Debug, Default)]
pub struct DemoClearnode {
    channels: DashMap<ChannelId, ChannelInfo>,
}

impl DemoClearnode {
    pub fn new() -> Self {
        Self::default()
    }

    fn unknown(method: &str, channel_id: &ChannelId) -> NetworkError {
        NetworkError::Rejected {
            method: method.to_string(),
            code: 404,
            message: format!("unknown channel {}", channel_id),
        }
    }
}

#[async_trait]
impl ClearnodeClient for DemoClearnode {
    async fn create_channel(&self, params: &CreateChannelParams) -> Result<ChannelHandle, NetworkError> {
        self.channels.insert(
            params.channel_id.clone(),
            ChannelInfo {
                channel_id: params.channel_id.clone(),
                participants: params.participants.clone(),
                version: 0,
                status: "open".to_string(),
            },
        );

        Ok(ChannelHandle {
            channel_id: params.channel_id.clone(),
            status: "open".to_string(),
        })
    }

    async fn update_channel(&self, channel_id: &ChannelId, state: &ChannelState) -> Result<UpdateResult, NetworkError> {
        let mut info = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| Self::unknown("update_channel", channel_id))?;
        info.version = state.version;

        Ok(UpdateResult {
            channel_id: channel_id.clone(),
            version: state.version,
        })
    }

    async fn close_channel(
        &self,
        channel_id: &ChannelId,
        final_state: &ChannelState,
        _reason: &str,
    ) -> Result<CloseResult, NetworkError> {
        self.channels
            .remove(channel_id)
            .ok_or_else(|| Self::unknown("close_channel", channel_id))?;

        Ok(CloseResult {
            channel_id: channel_id.clone(),
            final_version: final_state.version,
            status: "closed".to_string(),
        })
    }

    async fn challenge_channel(
        &self,
        channel_id: &ChannelId,
        _reason: &str,
        challenger: &Address,
    ) -> Result<ChallengeResult, NetworkError> {
        let mut info = self
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| Self::unknown("challenge_channel", channel_id))?;
        info.status = "challenged".to_string();

        Ok(ChallengeResult {
            channel_id: channel_id.clone(),
            challenger: challenger.clone(),
            status: "challenged".to_string(),
        })
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<ChannelInfo, NetworkError> {
        self.channels
            .get(channel_id)
            .map(|info| info.value().clone())
            .ok_or_else(|| Self::unknown("get_channel", channel_id))
    }
}
