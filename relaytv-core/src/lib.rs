pub mod channels;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod dvr;
pub mod error;
pub mod recorder;
pub mod relay;
pub mod runtime;
pub mod sqlite;
pub mod transcode;

pub use channels::{render_playlist, Channel, ChannelError, ChannelMap, PlaylistOptions};
pub use config::{load_relay_config, RelayConfig};
pub use discovery::{backend_stream_url, BackendLocator, DiscoveryError, MdnsBrowser};
pub use dispatch::{DispatchError, DispatchResult, StreamDispatcher, StreamPlan};
pub use dvr::{
    DvrCounts, DvrStore, NewTimer, Recording, SqliteDvrStore, SqliteDvrStoreBuilder, StoreError,
    StoreResult, Timer, TimerKind,
};
pub use error::{ConfigError, Result};
pub use recorder::{
    ActiveSlot, CycleReport, RecorderError, RecorderHandle, RecorderSettings, RecordingScheduler,
    SlotTable,
};
pub use relay::{
    ChildGuard, EncoderChild, OutputMode, ProcessExit, ProcessSpawner, Relay, RelayEnd,
    RelayError, RelayOutcome, RelaySink, RunningRelay, SinkClosed, SystemProcessSpawner,
    Transcoder, WriterSink,
};
pub use runtime::{LiveTranscode, RuntimeSettings, RuntimeSettingsError};
pub use transcode::{
    recording_args, transcode_args, ArgumentBuilder, PlaybackRequest, TranscodeBackend,
    TranscodeConfig, TranscodeRequest, VideoCodec,
};
