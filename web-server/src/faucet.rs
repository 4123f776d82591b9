// web-server/src/faucet.rs
use common::{FaucetConfig, FaucetReceipt, FaucetRequest, NetworkError};
use reqwest::Client;
use std::time::Duration;

const SERVICE: &str = "faucet";

/// Client for the test-token faucet used in demo flows
#[derive(Clone)]
pub struct FaucetClient {
    client: Client,
    url: String,
    default_token: String,
}

impl FaucetClient {
    /// `None` when no faucet URL is configured
    pub fn from_config(config: &FaucetConfig) -> Result<Option<Self>, NetworkError> {
        let Some(url) = config.url.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NetworkError::Transport {
                service: SERVICE.to_string(),
                message: e.to_string(),
            })?;

        Ok(Some(Self {
            client,
            url,
            default_token: config.default_token.clone(),
        }))
    }

    pub async fn request(&self, mut request: FaucetRequest) -> Result<FaucetReceipt, NetworkError> {
        if request.token.is_none() {
            request.token = Some(self.default_token.clone());
        }

        tracing::info!("Requesting faucet funds for {}", request.address);

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
                message: format!("HTTP {}: {}", status, body),
            });
        }

        response.json().await.map_err(|e| NetworkError::InvalidResponse {
            service: SERVICE.to_string(),
            message: e.to_string(),
        })
    }
}
