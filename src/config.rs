use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::OutputBackend;
use crate::playback::PlaybackConfig;

/// Prefix of environment overrides, e.g. `SPECPIPE__NATS__URL`
pub const ENV_PREFIX: &str = "SPECPIPE";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub nats: NatsConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub playback: PlaybackSection,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

/// `[playback]` table: frame layout plus the output backend
#[derive(Debug, Default, Deserialize)]
pub struct PlaybackSection {
    #[serde(flatten)]
    pub config: PlaybackConfig,
    #[serde(default)]
    pub output: OutputBackend,
}

fn default_namespace() -> String {
    "specpipe".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_api_timeout_ms() -> u64 {
    5000
}

impl NatsConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// Load `path` (extension optional) and overlay `SPECPIPE__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path))?;

        let cfg: Config = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.playback.config.validate()?;

        Ok(cfg)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}
