use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub recording: RecordingConfig,
    pub playback: PlaybackConfig,
    pub scenario: ScenarioConfig,
    pub persistence: PersistenceConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "svenska-practice".to_string(),
        }
    }
}

/// Practice backend connection
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bearer credential; anonymous practice when absent
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
    /// Units smaller than this never reach the pipeline
    pub min_unit_bytes: usize,
    pub volume_interval_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
            min_unit_bytes: 1000,
            volume_interval_ms: 50,
        }
    }
}

impl RecordingConfig {
    pub fn volume_interval(&self) -> Duration {
        Duration::from_millis(self.volume_interval_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub cache_capacity: usize,
    /// Where fetched clips are spooled while cached
    pub spool_dir: PathBuf,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 10,
            spool_dir: std::env::temp_dir().join("svenska-practice-audio"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub min_situation_chars: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            min_situation_chars: 3,
        }
    }
}

impl ScenarioConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub data_dir: PathBuf,
    pub freshness_hours: i64,
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".svenska-practice"),
            freshness_hours: 24,
            debounce_ms: 500,
        }
    }
}

impl PersistenceConfig {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.freshness_hours)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7878,
        }
    }
}

impl Config {
    /// Load from `path` (any format the `config` crate understands), with
    /// `PRACTICE__SECTION__KEY` environment overrides. A missing file yields defaults.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PRACTICE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
