use std::env;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::notification::Platform;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub ios: PlatformConfig,
    #[serde(default)]
    pub android: PlatformConfig,
    #[serde(default)]
    pub web: PlatformConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// What `submit` does when the dispatch queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueFullPolicy {
    /// Wait for a free slot
    #[default]
    Block,
    /// Fail the submission with `DispatchError::QueueFull`
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Number of concurrent delivery workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Capacity of the pending-request queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub queue_full_policy: QueueFullPolicy,
    /// How long shutdown waits for queued requests to drain
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_queue_capacity() -> usize {
    8192
}

fn default_shutdown_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Gateway credential used when a request carries none
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum delivery attempts per request
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// APNs certificate or token key file
    #[serde(default)]
    pub key_path: Option<String>,
    /// APNs key material, base64 encoded
    #[serde(default)]
    pub key_base64: Option<String>,
    #[serde(default)]
    pub voip_enabled: bool,
    #[serde(default)]
    pub voip_key_path: Option<String>,
    #[serde(default)]
    pub voip_key_base64: Option<String>,
}

fn default_max_retry() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    /// `memory` or `redis`
    #[serde(default = "default_stats_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

fn default_stats_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_prefix() -> String {
    "push_stats".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("dispatch.queue_capacity", 8192)?
            .set_default("dispatch.queue_full_policy", "block")?
            .set_default("stats.backend", "memory")?
            .set_default("log.level", "info")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PUSH__DISPATCH__WORKERS, PUSH__ANDROID__API_KEY, ...
            .add_source(
                Environment::with_prefix("PUSH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Configuration for one platform
    pub fn platform(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Ios => &self.ios,
            Platform::Android => &self.android,
            Platform::Web => &self.web,
        }
    }

    /// Check that the enabled platforms carry the credentials they need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ios.voip_enabled && !self.ios.enabled && !self.android.enabled && !self.web.enabled {
            return Err(invalid("enable at least one of ios, ios voip, android or web"));
        }

        if self.ios.enabled {
            check_key_source(
                self.ios.key_path.as_deref(),
                self.ios.key_base64.as_deref(),
                "ios",
            )?;
        }

        if self.ios.voip_enabled {
            check_key_source(
                self.ios.voip_key_path.as_deref(),
                self.ios.voip_key_base64.as_deref(),
                "ios voip",
            )?;
        }

        if self.android.enabled && is_blank(self.android.api_key.as_deref()) {
            return Err(invalid("missing android api_key"));
        }

        if self.web.enabled && is_blank(self.web.api_key.as_deref()) {
            return Err(invalid("missing web api_key"));
        }

        if self.dispatch.workers == 0 {
            return Err(invalid("dispatch.workers must be at least 1"));
        }

        if self.dispatch.queue_capacity == 0 {
            return Err(invalid("dispatch.queue_capacity must be at least 1"));
        }

        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

fn check_key_source(path: Option<&str>, base64: Option<&str>, name: &str) -> Result<(), ConfigError> {
    if is_blank(path) && is_blank(base64) {
        return Err(invalid(&format!("missing {} certificate key", name)));
    }
    if let Some(path) = path.filter(|p| !p.trim().is_empty()) {
        if !Path::new(path).exists() {
            return Err(invalid(&format!("{} certificate file does not exist: {}", name, path)));
        }
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Message(message.to_string())
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            queue_full_policy: QueueFullPolicy::default(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            max_retry: default_max_retry(),
            key_path: None,
            key_base64: None,
            voip_enabled: false,
            voip_key_path: None,
            voip_key_base64: None,
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            backend: default_stats_backend(),
            redis_url: default_redis_url(),
            redis_prefix: default_redis_prefix(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
