pub mod commands;
pub mod server;

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use relaytv_core::{
    load_relay_config, render_playlist, Channel, ChannelMap, DvrCounts, DvrStore, LiveTranscode, NewTimer,
    Recording, RelayConfig, RuntimeSettings, SqliteDvrStore, Timer,
};
use serde::Serialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use commands::{
    ChannelCommands, PlaylistArgs, RecordingCommands, RecordingDeleteArgs, TimerAddArgs,
    TimerCommands, TimerDeleteArgs,
};
use server::ServeOptions;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] relaytv_core::ConfigError),
    #[error("store error: {0}")]
    Store(#[from] relaytv_core::StoreError),
    #[error("channel map error: {0}")]
    Channels(#[from] relaytv_core::ChannelError),
    #[error("runtime settings error: {0}")]
    Runtime(#[from] relaytv_core::RuntimeSettingsError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live TV transcoding proxy and DVR", long_about = None)]
pub struct Cli {
    /// Path to relaytv.toml
    #[arg(long, default_value = "configs/relaytv.toml")]
    pub config: PathBuf,
    /// Overrides paths.data_dir
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
    /// Overrides the DVR database location
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Overrides the channels.conf location
    #[arg(long)]
    pub channels: Option<PathBuf>,
    /// Debug logging (RUST_LOG still wins)
    #[arg(short, long, global = true)]
    pub verbose: bool,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server, recording scheduler and backend discovery
    Serve(ServeArgs),
    /// Summarise timers, recordings and live settings
    Status,
    /// Manage recording timers
    #[command(subcommand)]
    Timers(TimerCommands),
    /// Manage recordings
    #[command(subcommand)]
    Recordings(RecordingCommands),
    /// Inspect the channel map
    #[command(subcommand)]
    Channels(ChannelCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Overrides server.bind
    #[arg(long)]
    pub bind: Option<String>,
    /// Overrides server.port
    #[arg(long)]
    pub port: Option<u16>,
    /// Fixed backend base URL; disables mDNS browsing
    #[arg(long)]
    pub backend_url: Option<String>,
    /// Do not browse for the backend over mDNS
    #[arg(long)]
    pub no_mdns: bool,
}

impl From<&ServeArgs> for ServeOptions {
    fn from(args: &ServeArgs) -> Self {
        ServeOptions {
            bind: args.bind.clone(),
            port: args.port,
            backend_url: args.backend_url.clone(),
            disable_mdns: args.no_mdns,
        }
    }
}

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "relaytvd=debug,relaytv_core=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let context = AppContext::new(&cli)?;

    match &cli.command {
        Commands::Serve(args) => {
            let store = context.open_store()?;
            server::serve(&context.config, store, args.into()).await?;
        }
        Commands::Status => {
            let status = context.gather_status()?;
            render(&status, cli.format)?;
        }
        Commands::Timers(TimerCommands::List) => {
            let timers = context.timer_list()?;
            render(&timers, cli.format)?;
        }
        Commands::Timers(TimerCommands::Add(args)) => {
            let result = context.timer_add(args)?;
            render(&result, cli.format)?;
        }
        Commands::Timers(TimerCommands::Delete(args)) => {
            let result = context.timer_delete(args)?;
            render(&result, cli.format)?;
        }
        Commands::Recordings(RecordingCommands::List) => {
            let recordings = context.recording_list()?;
            render(&recordings, cli.format)?;
        }
        Commands::Recordings(RecordingCommands::Delete(args)) => {
            let result = context.recording_delete(args)?;
            render(&result, cli.format)?;
        }
        Commands::Channels(ChannelCommands::List) => {
            let channels = context.channel_list()?;
            render(&channels, cli.format)?;
        }
        Commands::Channels(ChannelCommands::Playlist(args)) => {
            let playlist = context.channel_playlist(args)?;
            render(&playlist, cli.format)?;
        }
    }

    Ok(())
}

fn render<T>(value: &T, format: OutputFormat) -> Result<()>
where
    T: Serialize + DisplayFallback,
{
    match format {
        OutputFormat::Text => {
            println!("{}", value.display());
            Ok(())
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
            Ok(())
        }
    }
}

trait DisplayFallback {
    fn display(&self) -> String;
}

#[derive(Debug)]
struct AppContext {
    config: RelayConfig,
    database: PathBuf,
    channels_path: PathBuf,
}

impl AppContext {
    fn new(cli: &Cli) -> Result<Self> {
        let mut config = load_relay_config(&cli.config)?;
        if let Some(data_dir) = &cli.data_dir {
            config.paths.data_dir = data_dir.to_string_lossy().into_owned();
        }
        if let Some(channels) = &cli.channels {
            config.paths.channels_file = channels.to_string_lossy().into_owned();
        }
        let database = cli
            .database
            .clone()
            .unwrap_or_else(|| config.database_path());
        let channels_path = config.channels_path();
        Ok(Self {
            config,
            database,
            channels_path,
        })
    }

    fn open_store(&self) -> Result<SqliteDvrStore> {
        let store = SqliteDvrStore::builder()
            .path(&self.database)
            .create_if_missing(true)
            .build()?;
        store.initialize()?;
        Ok(store)
    }

    fn load_channels(&self) -> Result<ChannelMap> {
        Ok(ChannelMap::load(&self.channels_path)?)
    }

    fn gather_status(&self) -> Result<StatusReport> {
        let counts = self.open_store()?.counts()?;
        let channels = self.load_channels().map(|map| map.len()).ok();
        let live = RuntimeSettings::load(
            self.config.runtime_settings_path(),
            LiveTranscode {
                backend: self.config.transcode.backend,
                codec: self.config.transcode.codec,
            },
        )?
        .current();
        Ok(StatusReport {
            database: self.database.clone(),
            counts,
            channels,
            live,
            backend_url: self.config.discovery.backend_url.clone(),
        })
    }

    fn timer_list(&self) -> Result<TimerList> {
        Ok(TimerList {
            rows: self.open_store()?.list_timers()?,
        })
    }

    fn timer_add(&self, args: &TimerAddArgs) -> Result<ActionResult> {
        let (start_ms, end_ms) = args.window_ms()?;
        let id = self.open_store()?.add_timer(&NewTimer {
            kind: args.kind,
            title: args.title.clone(),
            channel: args.channel.clone(),
            start_ms,
            end_ms,
        })?;
        Ok(ActionResult::new("timer scheduled", id))
    }

    fn timer_delete(&self, args: &TimerDeleteArgs) -> Result<ActionResult> {
        if self.open_store()?.delete_timer(args.id)? {
            Ok(ActionResult::new("timer deleted", args.id))
        } else {
            Err(AppError::NotFound(format!("timer {}", args.id)))
        }
    }

    fn recording_list(&self) -> Result<RecordingList> {
        Ok(RecordingList {
            rows: self.open_store()?.list_recordings()?,
        })
    }

    fn recording_delete(&self, args: &RecordingDeleteArgs) -> Result<ActionResult> {
        if self.open_store()?.delete_recording(args.id)? {
            Ok(ActionResult::new("recording deleted", args.id))
        } else {
            Err(AppError::NotFound(format!("recording {}", args.id)))
        }
    }

    fn channel_list(&self) -> Result<ChannelList> {
        Ok(ChannelList {
            rows: self.load_channels()?.channels().to_vec(),
        })
    }

    fn channel_playlist(&self, args: &PlaylistArgs) -> Result<Playlist> {
        let map = self.load_channels()?;
        Ok(Playlist {
            playlist: render_playlist(&map, &args.host, &args.options()),
        })
    }
}

fn format_ms(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database: PathBuf,
    pub counts: DvrCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<usize>,
    pub live: LiveTranscode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
}

impl DisplayFallback for StatusReport {
    fn display(&self) -> String {
        let mut lines = vec![
            format!("Database: {}", self.database.display()),
            format!(
                "Timers: {} | Recordings: {} ({} in progress)",
                self.counts.timers, self.counts.recordings, self.counts.in_progress
            ),
            format!("Live: {} / {}", self.live.backend, self.live.codec),
        ];
        match self.channels {
            Some(count) => lines.push(format!("Channels: {count}")),
            None => lines.push("Channels: unavailable".to_string()),
        }
        if let Some(url) = &self.backend_url {
            lines.push(format!("Backend: {url} (pinned)"));
        }
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct TimerList {
    pub rows: Vec<Timer>,
}

impl DisplayFallback for TimerList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No timers scheduled".to_string();
        }
        self.rows
            .iter()
            .map(|timer| {
                format!(
                    "#{id} {title} | ch {channel} | {start} -> {end} | {kind}",
                    id = timer.id,
                    title = timer.title,
                    channel = timer.channel,
                    start = format_ms(timer.start_ms),
                    end = format_ms(timer.end_ms),
                    kind = timer.kind,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct RecordingList {
    pub rows: Vec<Recording>,
}

impl DisplayFallback for RecordingList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No recordings".to_string();
        }
        self.rows
            .iter()
            .map(|recording| {
                let end = if recording.in_progress() {
                    "recording".to_string()
                } else {
                    format_ms(recording.end_ms)
                };
                format!(
                    "#{id} {title} | ch {channel} | {start} -> {end} | {path}",
                    id = recording.id,
                    title = recording.title,
                    channel = recording.channel,
                    start = format_ms(recording.start_ms),
                    path = recording.file_path,
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ChannelList {
    pub rows: Vec<Channel>,
}

impl DisplayFallback for ChannelList {
    fn display(&self) -> String {
        if self.rows.is_empty() {
            return "No channels found".to_string();
        }
        self.rows
            .iter()
            .map(|channel| format!("{:>6}  {}", channel.number, channel.name))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct Playlist {
    pub playlist: String,
}

impl DisplayFallback for Playlist {
    fn display(&self) -> String {
        self.playlist.trim_end().to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct ActionResult {
    pub status: String,
    pub id: i64,
}

impl ActionResult {
    fn new(status: impl Into<String>, id: i64) -> Self {
        Self {
            status: status.into(),
            id,
        }
    }
}

impl DisplayFallback for ActionResult {
    fn display(&self) -> String {
        format!("{} (#{})", self.status, self.id)
    }
}
