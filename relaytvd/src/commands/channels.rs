use clap::{Args, Subcommand};
use relaytv_core::{PlaylistOptions, TranscodeBackend, VideoCodec};

#[derive(Subcommand, Debug)]
pub enum ChannelCommands {
    /// List channels from channels.conf
    List,
    /// Print an M3U playlist of transcode URLs
    Playlist(PlaylistArgs),
}

#[derive(Args, Debug)]
pub struct PlaylistArgs {
    /// Host (and port) clients use to reach this server
    #[arg(long, default_value = "localhost:3000")]
    pub host: String,
    #[arg(long)]
    pub backend: Option<TranscodeBackend>,
    #[arg(long)]
    pub codec: Option<VideoCodec>,
    /// Peak video bitrate in kbps
    #[arg(long)]
    pub bitrate: Option<u32>,
    /// Keep 5.1 audio
    #[arg(long)]
    pub ac6: bool,
}

impl PlaylistArgs {
    pub fn options(&self) -> PlaylistOptions {
        PlaylistOptions {
            backend: self.backend,
            codec: self.codec,
            bitrate_kbps: self.bitrate.filter(|kbps| *kbps > 0),
            surround: self.ac6,
        }
    }
}
