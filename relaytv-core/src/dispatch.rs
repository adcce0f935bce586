use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::discovery::{backend_stream_url, BackendLocator};
use crate::dvr::{DvrStore, StoreError};
use crate::relay::{RelayError, RunningRelay, Transcoder};
use crate::runtime::RuntimeSettings;
use crate::transcode::{PlaybackRequest, TranscodeConfig, TranscodeRequest};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("backend not discovered yet")]
    BackendUnavailable,
    #[error("no channel specified")]
    MissingChannel,
    #[error("invalid recording id")]
    InvalidRecordingId,
    #[error("recording {0} not found")]
    RecordingNotFound(i64),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl DispatchError {
    /// HTTP status the request should be answered with.
    pub fn status_code(&self) -> u16 {
        match self {
            DispatchError::BackendUnavailable => 503,
            DispatchError::MissingChannel | DispatchError::InvalidRecordingId => 400,
            DispatchError::RecordingNotFound(_) => 404,
            DispatchError::Store(_) | DispatchError::Relay(_) => 500,
        }
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// What to feed the encoder and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPlan {
    pub source: String,
    pub config: TranscodeConfig,
}

impl StreamPlan {
    pub fn content_type(&self) -> &'static str {
        self.config.content_type()
    }
}

/// Maps live, ad-hoc and playback requests onto encoder runs.
#[derive(Clone)]
pub struct StreamDispatcher {
    locator: BackendLocator,
    runtime: RuntimeSettings,
    store: Arc<dyn DvrStore>,
    transcoder: Arc<Transcoder>,
}

impl fmt::Debug for StreamDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDispatcher")
            .field("locator", &self.locator)
            .field("runtime", &self.runtime)
            .field("transcoder", &self.transcoder)
            .finish()
    }
}

impl StreamDispatcher {
    pub fn new(
        locator: BackendLocator,
        runtime: RuntimeSettings,
        store: Arc<dyn DvrStore>,
        transcoder: Arc<Transcoder>,
    ) -> Self {
        Self {
            locator,
            runtime,
            store,
            transcoder,
        }
    }

    /// `/stream/<channel>` with the process-wide backend and codec.
    pub fn live(&self, channel: &str) -> DispatchResult<StreamPlan> {
        let base = self.locator.current().ok_or(DispatchError::BackendUnavailable)?;
        if channel.is_empty() {
            return Err(DispatchError::MissingChannel);
        }
        let live = self.runtime.current();
        Ok(StreamPlan {
            source: backend_stream_url(&base, channel),
            config: TranscodeConfig::new(live.backend, live.codec),
        })
    }

    /// `/transcode/<segments...>`.
    pub fn adhoc(&self, segments: &str) -> DispatchResult<StreamPlan> {
        let request = TranscodeRequest::from_path(segments);
        let base = self.locator.current().ok_or(DispatchError::BackendUnavailable)?;
        let channel = request.channel.ok_or(DispatchError::MissingChannel)?;
        Ok(StreamPlan {
            source: backend_stream_url(&base, &channel),
            config: request.config,
        })
    }

    /// `/api/play/<id>[/segments...]`, sourced from the recording's file.
    pub fn playback(&self, segments: &str) -> DispatchResult<StreamPlan> {
        let request = PlaybackRequest::from_path(segments);
        let id = request
            .recording_id
            .ok_or(DispatchError::InvalidRecordingId)?;
        let path = self
            .store
            .recording_path(id)?
            .ok_or(DispatchError::RecordingNotFound(id))?;
        Ok(StreamPlan {
            source: path.to_string_lossy().into_owned(),
            config: request.config,
        })
    }

    pub fn start(&self, plan: &StreamPlan) -> DispatchResult<RunningRelay> {
        debug!(source = %plan.source, config = ?plan.config, "dispatching stream");
        Ok(self.transcoder.start(&plan.source, &plan.config)?)
    }
}
