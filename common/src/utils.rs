// common/src/utils.rs
use serde::{Deserialize, Deserializer, Serializer};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Setup tracing for consistent logging across services.
///
/// `RUST_LOG` takes precedence over the configured default filter.
pub fn setup_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

/// Serde adapter rendering byte payloads as `0x`-prefixed hex strings
pub mod hex_bytes {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let body = text.strip_prefix("0x").unwrap_or(&text);
        hex::decode(body).map_err(serde::de::Error::custom)
    }
}
