pub mod process;
pub mod sink;

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transcode::{ArgumentBuilder, TranscodeConfig};

pub use process::{
    EncoderChild, EncoderStdout, OutputMode, ProcessExit, ProcessSpawner, SystemProcessSpawner,
};
pub use sink::{RelaySink, SinkClosed, WriterSink};

pub const DEFAULT_CHUNK_BYTES: usize = 8192;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        source: io::Error,
    },
    #[error("encoder started without a stdout pipe")]
    MissingStdout,
    #[error("io error while supervising encoder: {0}")]
    Io(#[from] io::Error),
}

pub type RelayResult<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The sink stopped accepting bytes (client disconnect).
    SinkClosed,
    Cancelled,
    /// The encoder closed its stdout.
    EncoderFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    pub end: RelayEnd,
    pub bytes_relayed: u64,
    pub exit: ProcessExit,
}

/// Owns a child until it has been reaped. Dropping an unfinished guard
/// signals the process so an abandoned relay never leaves an encoder behind.
pub struct ChildGuard {
    child: Option<Box<dyn EncoderChild>>,
}

impl ChildGuard {
    pub fn new(child: Box<dyn EncoderChild>) -> Self {
        Self { child: Some(child) }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.id())
    }

    pub fn child_mut(&mut self) -> Option<&mut (dyn EncoderChild + 'static)> {
        self.child.as_deref_mut()
    }

    /// Terminates (a no-op if the process already exited) and waits.
    pub async fn finish(mut self) -> io::Result<ProcessExit> {
        let Some(mut child) = self.child.take() else {
            return Ok(ProcessExit { code: None });
        };
        if let Err(err) = child.terminate() {
            warn!(pid = child.id(), error = %err, "failed to signal encoder");
        }
        child.wait().await
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.terminate();
        }
    }
}

impl fmt::Debug for ChildGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildGuard").field("pid", &self.id()).finish()
    }
}

pub struct Relay {
    spawner: Arc<dyn ProcessSpawner>,
    chunk_bytes: usize,
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("program", &self.spawner.program())
            .field("chunk_bytes", &self.chunk_bytes)
            .finish()
    }
}

impl Relay {
    pub fn new(spawner: Option<Arc<dyn ProcessSpawner>>, chunk_bytes: usize) -> Self {
        let spawner = spawner.unwrap_or_else(|| Arc::new(SystemProcessSpawner::default()));
        Self {
            spawner,
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Starts the encoder. Spawn failures surface here, before any byte is relayed.
    pub fn spawn(&self, args: &[String]) -> RelayResult<RunningRelay> {
        let mut child = self
            .spawner
            .spawn(args, OutputMode::Piped)
            .map_err(|source| RelayError::Spawn {
                program: self.spawner.program().to_path_buf(),
                source,
            })?;
        let Some(stdout) = child.take_stdout() else {
            drop(ChildGuard::new(child));
            return Err(RelayError::MissingStdout);
        };
        Ok(RunningRelay {
            guard: ChildGuard::new(child),
            stdout,
            chunk_bytes: self.chunk_bytes,
        })
    }
}

pub struct RunningRelay {
    guard: ChildGuard,
    stdout: EncoderStdout,
    chunk_bytes: usize,
}

impl fmt::Debug for RunningRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningRelay")
            .field("pid", &self.guard.id())
            .field("chunk_bytes", &self.chunk_bytes)
            .finish()
    }
}

impl RunningRelay {
    pub fn pid(&self) -> Option<u32> {
        self.guard.id()
    }

    /// Copies stdout into `sink` until the sink closes, `cancel` fires or the
    /// encoder ends, then terminates and reaps the process.
    pub async fn pump<S>(self, sink: &mut S, cancel: CancellationToken) -> RelayResult<RelayOutcome>
    where
        S: RelaySink + ?Sized,
    {
        let RunningRelay {
            guard,
            mut stdout,
            chunk_bytes,
        } = self;
        let pid = guard.id();
        let mut buf = vec![0u8; chunk_bytes];
        let mut bytes_relayed = 0u64;

        let end = loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => break RelayEnd::Cancelled,
                _ = sink.closed() => break RelayEnd::SinkClosed,
                read = stdout.read(&mut buf) => read,
            };
            let n = match read {
                Ok(0) => break RelayEnd::EncoderFinished,
                Ok(n) => n,
                Err(err) => {
                    warn!(pid, error = %err, "encoder stdout read failed");
                    break RelayEnd::EncoderFinished;
                }
            };
            let chunk = Bytes::copy_from_slice(&buf[..n]);
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => break RelayEnd::Cancelled,
                sent = sink.send(chunk) => sent,
            };
            if sent.is_err() {
                break RelayEnd::SinkClosed;
            }
            bytes_relayed += n as u64;
        };

        drop(stdout);
        let exit = guard.finish().await?;
        debug!(pid, ?end, bytes_relayed, %exit, "relay finished");
        Ok(RelayOutcome {
            end,
            bytes_relayed,
            exit,
        })
    }
}

/// Argument builder plus relay: one call per live view, ad-hoc stream or playback.
#[derive(Debug)]
pub struct Transcoder {
    builder: ArgumentBuilder,
    relay: Relay,
}

impl Transcoder {
    pub fn new(builder: ArgumentBuilder, relay: Relay) -> Self {
        Self { builder, relay }
    }

    pub fn start(&self, source: &str, config: &TranscodeConfig) -> RelayResult<RunningRelay> {
        let args = self.builder.transcode_args(source, config);
        let running = self.relay.spawn(&args)?;
        info!(
            pid = running.pid(),
            source,
            backend = %config.backend,
            codec = %config.codec,
            bitrate_kbps = config.bitrate_kbps,
            surround = config.surround,
            "transcode started"
        );
        Ok(running)
    }

    pub async fn relay_transcode<S>(
        &self,
        sink: &mut S,
        source: &str,
        config: &TranscodeConfig,
        cancel: CancellationToken,
    ) -> RelayResult<RelayOutcome>
    where
        S: RelaySink + ?Sized,
    {
        self.start(source, config)?.pump(sink, cancel).await
    }
}
