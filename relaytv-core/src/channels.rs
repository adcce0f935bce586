use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::transcode::{TranscodeBackend, VideoCodec};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to read channel map {path}: {source}")]
    Io { source: io::Error, path: PathBuf },
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    /// Virtual channel, `major.minor`.
    pub number: String,
    pub service_id: Option<String>,
    pub frequency: Option<String>,
}

impl Channel {
    fn sort_key(&self) -> (u32, u32) {
        let mut parts = self.number.splitn(2, '.');
        let major = parts
            .next()
            .and_then(|part| part.trim().parse().ok())
            .unwrap_or(u32::MAX);
        let minor = parts
            .next()
            .and_then(|part| part.trim().parse().ok())
            .unwrap_or(0);
        (major, minor)
    }
}

/// Channels from a dvbv5 `channels.conf`, ordered by virtual channel number.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ChannelMap {
    channels: Vec<Channel>,
}

impl ChannelMap {
    pub fn load<P: AsRef<Path>>(path: P) -> ChannelResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ChannelError::Io {
            source,
            path: path.to_path_buf(),
        })?;
        Ok(Self::parse(&content))
    }

    /// Blocks without a `VCHANNEL` are dropped.
    pub fn parse(content: &str) -> Self {
        let mut channels = Vec::new();
        let mut current: Option<PartialChannel> = None;

        for line in content.lines() {
            let line = line.trim();
            if let Some(header) = line.strip_prefix('[') {
                if let Some(done) = current.take().and_then(PartialChannel::finish) {
                    channels.push(done);
                }
                let name = header.split(']').next().unwrap_or_default();
                current = Some(PartialChannel::named(name));
                continue;
            }
            let Some(channel) = current.as_mut() else {
                continue;
            };
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "VCHANNEL" => channel.number = Some(value),
                "SERVICE_ID" => channel.service_id = Some(value),
                "FREQUENCY" => channel.frequency = Some(value),
                _ => {}
            }
        }
        if let Some(done) = current.and_then(PartialChannel::finish) {
            channels.push(done);
        }

        channels.sort_by_key(Channel::sort_key);
        Self { channels }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn find(&self, number: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.number == number)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

struct PartialChannel {
    name: String,
    number: Option<String>,
    service_id: Option<String>,
    frequency: Option<String>,
}

impl PartialChannel {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            number: None,
            service_id: None,
            frequency: None,
        }
    }

    fn finish(self) -> Option<Channel> {
        let number = self.number.filter(|number| !number.is_empty())?;
        Some(Channel {
            name: self.name,
            number,
            service_id: self.service_id,
            frequency: self.frequency,
        })
    }
}

/// Transcode options baked into every playlist URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaylistOptions {
    pub backend: Option<TranscodeBackend>,
    pub codec: Option<VideoCodec>,
    pub bitrate_kbps: Option<u32>,
    pub surround: bool,
}

impl PlaylistOptions {
    /// Path prefix understood by the `/transcode` parser, e.g. `/nvenc/hevc/b4000/ac6`.
    pub fn path_prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(backend) = self.backend {
            let _ = write!(prefix, "/{backend}");
        }
        if let Some(codec) = self.codec {
            let _ = write!(prefix, "/{codec}");
        }
        if let Some(kbps) = self.bitrate_kbps {
            let _ = write!(prefix, "/b{kbps}");
        }
        if self.surround {
            prefix.push_str("/ac6");
        }
        prefix
    }
}

/// M3U playlist pointing every channel at `http://{host}/transcode{prefix}/{number}`.
pub fn render_playlist(map: &ChannelMap, host: &str, options: &PlaylistOptions) -> String {
    if map.is_empty() {
        return "# No channels found in channels.conf\n".to_string();
    }
    let prefix = options.path_prefix();
    let mut out = String::from("#EXTM3U\n");
    for channel in map.channels() {
        let _ = writeln!(
            out,
            "#EXTINF:-1 tvg-id=\"{number}\" tvg-name=\"{name}\",{name}",
            number = channel.number,
            name = channel.name
        );
        let _ = writeln!(out, "http://{host}/transcode{prefix}/{}", channel.number);
    }
    out
}
