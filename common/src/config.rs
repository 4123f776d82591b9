// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web_server_addr: String,
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_level: String,

    pub session: SessionConfig,
    pub channel: ChannelConfig,
    pub clearnode: ClearnodeConfig,
    pub faucet: FaucetConfig,
    pub demo: DemoConfig,
    pub rate_limit: RateLimitConfig,

    // Static file serving configuration
    pub static_files: StaticFilesConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of an issued session key
    pub timeout_secs: i64,
    /// Capacity of the store; the oldest session is evicted beyond it
    pub max_sessions: usize,
    /// Period of the background sweep, 0 disables it
    pub cleanup_interval_secs: u64,
}

/// Parameters forwarded to the clearnode when opening a channel
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub token: String,
    pub challenge_period_secs: u64,
    pub adjudicator: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearnodeMode {
    /// JSON-RPC over HTTP to `clearnode.url`
    Remote,
    /// In-process channel network for demos, never a fallback
    Demo,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClearnodeConfig {
    pub mode: ClearnodeMode,
    pub url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    pub url: Option<String>,
    pub default_token: String,
    pub request_timeout_secs: u64,
}

/// Opt-in demo mode: a fixed wallet address can connect without a wallet
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub enabled: bool,
    pub address: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
    pub paths: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub path: String,
    pub index: String,
    pub enable_compression: bool,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_age: u32,
    pub immutable: bool,
    pub must_revalidate: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_server_addr: "127.0.0.1:8081".to_string(),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
            channel: ChannelConfig::default(),
            clearnode: ClearnodeConfig::default(),
            faucet: FaucetConfig::default(),
            demo: DemoConfig::default(),
            rate_limit: RateLimitConfig::default(),
            static_files: StaticFilesConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            max_sessions: 100,
            cleanup_interval_secs: 300,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            token: "0x0000000000000000000000000000000000000000".to_string(),
            challenge_period_secs: 86400,
            adjudicator: "0x0000000000000000000000000000000000000000".to_string(),
        }
    }
}

impl Default for ClearnodeConfig {
    fn default() -> Self {
        Self {
            mode: ClearnodeMode::Remote,
            url: "http://127.0.0.1:8000/rpc".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            url: None,
            default_token: "usdc".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0x742d35cc6634c0532925a3b844bc454e4438f44e".to_string(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 30,
            window_secs: 60,
            paths: vec!["/api/sessions".to_string(), "/api/faucet".to_string()],
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            path: "./static".to_string(),
            index: "index.html".to_string(),
            enable_compression: true,
            cache: CacheConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: 3600,
            immutable: false,
            must_revalidate: true,
        }
    }
}

/// Where the effective configuration came from.
///
/// Loading happens before the subscriber is installed, so the outcome is
/// returned and logged by the caller once tracing is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Files { dir: PathBuf, run_mode: String },
    Defaults { dir: PathBuf, reason: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::Files { dir, run_mode } => {
                tracing::info!("Configuration loaded from {} (run mode {})", dir.display(), run_mode);
            },
            ConfigSource::Defaults { dir, reason } => {
                tracing::warn!("Failed to load configuration from {}: {}", dir.display(), reason);
                tracing::info!("Falling back to defaults and environment variables");
            },
        }
    }
}

impl Config {
    /// Load `default.toml`, `<run_mode>.toml` and `local.toml` from `dir`, then `APP__` variables
    pub fn load_from(dir: &Path, run_mode: &str) -> Result<Self, config::ConfigError> {
        ConfigFile::builder()
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(File::from(dir.join(format!("{}.toml", run_mode))).required(false))
            .add_source(File::from(dir.join("local.toml")).required(false))
            // APP__SESSION__TIMEOUT_SECS=600 and friends
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load using `CONFIG_DIR` and `RUN_MODE` (default "development")
    pub fn from_env() -> (Self, ConfigSource) {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        Self::from_dir(&config_dir(), &run_mode)
    }

    /// Load from files, falling back to defaults plus a few plain environment variables
    pub fn from_dir(dir: &Path, run_mode: &str) -> (Self, ConfigSource) {
        match Self::load_from(dir, run_mode) {
            Ok(config) => (config, ConfigSource::Files { dir: dir.to_path_buf(), run_mode: run_mode.to_string() }),
            Err(e) => {
                let mut config = Self::default();

                if let Ok(addr) = env::var("WEB_SERVER_ADDR") {
                    config.web_server_addr = addr;
                }

                if let Ok(url) = env::var("CLEARNODE_URL") {
                    config.clearnode.url = url;
                }

                if let Ok(url) = env::var("FAUCET_URL") {
                    config.faucet.url = Some(url);
                }

                if let Some(timeout) = env::var("SESSION_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok())
                {
                    config.session.timeout_secs = timeout;
                }

                if let Ok(path) = env::var("STATIC_FILES_PATH") {
                    config.static_files.path = path;
                }

                (config, ConfigSource::Defaults { dir: dir.to_path_buf(), reason: e.to_string() })
            }
        }
    }
}

// Project root or a subcrate
fn config_dir() -> PathBuf {
    env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let path = PathBuf::from("./config");
            if path.exists() {
                path
            } else {
                PathBuf::from("../config")
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = ConfigFile::builder()
            .add_source(config::File::from_str(
                "[session]\nmax_sessions = 5\n\n[clearnode]\nmode = \"demo\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.session.max_sessions, 5);
        assert_eq!(config.session.timeout_secs, 3600);
        assert_eq!(config.clearnode.mode, ClearnodeMode::Demo);
        assert!(!config.demo.enabled);
        assert_eq!(config.static_files.index, "index.html");
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("revatix-config-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_broken_file_falls_back_with_reason() {
        let dir = scratch_dir("broken");
        std::fs::write(dir.join("default.toml"), "[session\nmax_sessions = ").unwrap();

        let (config, source) = Config::from_dir(&dir, "test");
        assert_eq!(config.session.max_sessions, Config::default().session.max_sessions);
        match source {
            ConfigSource::Defaults { dir: from, reason } => {
                assert_eq!(from, dir);
                assert!(!reason.is_empty());
            },
            other => panic!("expected a fallback, got {:?}", other),
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_files_are_reported_with_run_mode() {
        let dir = scratch_dir("files");
        std::fs::write(dir.join("default.toml"), "[session]\nmax_sessions = 7\n").unwrap();

        let (config, source) = Config::from_dir(&dir, "test");
        assert_eq!(config.session.max_sessions, 7);
        assert_eq!(source, ConfigSource::Files { dir: dir.clone(), run_mode: "test".into() });

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
