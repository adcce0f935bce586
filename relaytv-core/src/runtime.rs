use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::load_toml;
use crate::error::ConfigError;
use crate::transcode::{TranscodeBackend, VideoCodec};

#[derive(Debug, Error)]
pub enum RuntimeSettingsError {
    #[error(transparent)]
    Load(#[from] ConfigError),
    #[error("failed to write runtime settings {path}: {source}")]
    Write { source: io::Error, path: PathBuf },
    #[error("failed to encode runtime settings: {0}")]
    Encode(#[from] toml::ser::Error),
}

pub type RuntimeSettingsResult<T> = std::result::Result<T, RuntimeSettingsError>;

/// Backend and codec used for `/stream/<channel>` live views.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LiveTranscode {
    pub backend: TranscodeBackend,
    pub codec: VideoCodec,
}

/// Process-wide live-view settings, optionally persisted to a TOML file.
#[derive(Clone)]
pub struct RuntimeSettings {
    path: Option<PathBuf>,
    current: Arc<RwLock<LiveTranscode>>,
}

impl fmt::Debug for RuntimeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeSettings")
            .field("path", &self.path)
            .field("current", &self.current())
            .finish()
    }
}

impl RuntimeSettings {
    pub fn in_memory(initial: LiveTranscode) -> Self {
        Self {
            path: None,
            current: Arc::new(RwLock::new(initial)),
        }
    }

    /// Reads `path`, falling back to `defaults` when the file does not exist yet.
    pub fn load(path: impl AsRef<Path>, defaults: LiveTranscode) -> RuntimeSettingsResult<Self> {
        let path = path.as_ref();
        let initial = if path.exists() {
            load_toml::<LiveTranscode, _>(path)?
        } else {
            defaults
        };
        info!(
            backend = %initial.backend,
            codec = %initial.codec,
            path = %path.display(),
            "runtime settings loaded"
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            current: Arc::new(RwLock::new(initial)),
        })
    }

    pub fn current(&self) -> LiveTranscode {
        self.current
            .read()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    /// Applies whichever fields are given, persists, then publishes the result.
    pub fn update(
        &self,
        backend: Option<TranscodeBackend>,
        codec: Option<VideoCodec>,
    ) -> RuntimeSettingsResult<LiveTranscode> {
        let mut next = self.current();
        if let Some(backend) = backend {
            next.backend = backend;
        }
        if let Some(codec) = codec {
            next.codec = codec;
        }
        if let Some(path) = &self.path {
            let encoded = toml::to_string(&next)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| RuntimeSettingsError::Write {
                    source,
                    path: path.clone(),
                })?;
            }
            std::fs::write(path, encoded).map_err(|source| RuntimeSettingsError::Write {
                source,
                path: path.clone(),
            })?;
        }
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
        info!(backend = %next.backend, codec = %next.codec, "runtime settings updated");
        Ok(next)
    }
}
