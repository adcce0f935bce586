use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use crate::error::{ConfigError, Result};
use crate::transcode::{TranscodeBackend, VideoCodec};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RelayConfig {
    pub server: ServerSection,
    pub paths: PathsSection,
    #[serde(default)]
    pub encoder: EncoderSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub transcode: TranscodeSection,
}

impl RelayConfig {
    /// Resolves `candidate` against `paths.data_dir` unless it is already absolute.
    pub fn resolve_path<P: AsRef<Path>>(&self, candidate: P) -> PathBuf {
        let path = candidate.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.paths.data_dir).join(path)
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.database)
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.recordings_dir)
    }

    pub fn channels_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.channels_file)
    }

    pub fn runtime_settings_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.runtime_settings)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.max_active_recordings == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.max_active_recordings",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scheduler.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.poll_interval_seconds",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.encoder.relay_chunk_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "encoder.relay_chunk_bytes",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(url) = &self.discovery.backend_url {
            Url::parse(url).map_err(|err| ConfigError::Invalid {
                field: "discovery.backend_url",
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    pub public_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub data_dir: String,
    pub database: String,
    pub recordings_dir: String,
    pub channels_file: String,
    pub runtime_settings: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderSection {
    pub ffmpeg: String,
    pub vaapi_device: String,
    pub relay_chunk_bytes: usize,
}

impl Default for EncoderSection {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            vaapi_device: "/dev/dri/renderD128".to_string(),
            relay_chunk_bytes: 8192,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub poll_interval_seconds: u64,
    pub max_active_recordings: usize,
}

impl SchedulerSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            max_active_recordings: 16,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Fixed backend base URL, pinned in the locator ahead of any mDNS answer.
    pub backend_url: Option<String>,
    pub mdns_enabled: bool,
    pub service_type: String,
    pub service_instance: String,
    pub query_interval_seconds: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            backend_url: None,
            mdns_enabled: true,
            service_type: "_http._tcp.local".to_string(),
            service_instance: "ZapLinkCore".to_string(),
            query_interval_seconds: 15,
        }
    }
}

impl DiscoverySection {
    pub fn query_interval(&self) -> Duration {
        Duration::from_secs(self.query_interval_seconds.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscodeSection {
    pub backend: TranscodeBackend,
    pub codec: VideoCodec,
}

impl Default for TranscodeSection {
    fn default() -> Self {
        Self {
            backend: TranscodeBackend::Software,
            codec: VideoCodec::H264,
        }
    }
}

pub fn load_relay_config<P: AsRef<Path>>(path: P) -> Result<RelayConfig> {
    let config: RelayConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

pub(crate) fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
