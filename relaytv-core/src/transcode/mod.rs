pub mod args;
pub mod request;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use args::{recording_args, transcode_args, ArgumentBuilder, DEFAULT_VAAPI_DEVICE};
pub use request::{PlaybackRequest, TranscodeRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum TranscodeBackend {
    #[default]
    #[serde(rename = "software")]
    Software,
    #[serde(rename = "qsv")]
    QuickSync,
    #[serde(rename = "nvenc")]
    Nvenc,
    #[serde(rename = "vaapi")]
    Vaapi,
}

impl TranscodeBackend {
    pub const ALL: [TranscodeBackend; 4] = [
        TranscodeBackend::Software,
        TranscodeBackend::QuickSync,
        TranscodeBackend::Nvenc,
        TranscodeBackend::Vaapi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeBackend::Software => "software",
            TranscodeBackend::QuickSync => "qsv",
            TranscodeBackend::Nvenc => "nvenc",
            TranscodeBackend::Vaapi => "vaapi",
        }
    }
}

impl fmt::Display for TranscodeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscodeBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "software" => Ok(TranscodeBackend::Software),
            "qsv" => Ok(TranscodeBackend::QuickSync),
            "nvenc" => Ok(TranscodeBackend::Nvenc),
            "vaapi" => Ok(TranscodeBackend::Vaapi),
            other => Err(format!("unknown transcode backend: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
    Av1,
    Copy,
}

impl VideoCodec {
    pub const ALL: [VideoCodec; 4] = [
        VideoCodec::H264,
        VideoCodec::Hevc,
        VideoCodec::Av1,
        VideoCodec::Copy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Hevc => "hevc",
            VideoCodec::Av1 => "av1",
            VideoCodec::Copy => "copy",
        }
    }

    /// MIME type of the container the encoder writes for this codec.
    pub fn content_type(&self) -> &'static str {
        match self {
            VideoCodec::Av1 => "video/webm",
            _ => "video/mp4",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264" => Ok(VideoCodec::H264),
            "hevc" => Ok(VideoCodec::Hevc),
            "av1" => Ok(VideoCodec::Av1),
            "copy" => Ok(VideoCodec::Copy),
            other => Err(format!("unknown video codec: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct TranscodeConfig {
    pub backend: TranscodeBackend,
    pub codec: VideoCodec,
    /// Peak video bitrate in kbps.
    pub bitrate_kbps: Option<u32>,
    /// Keep 5.1 audio instead of downmixing to stereo.
    pub surround: bool,
}

impl TranscodeConfig {
    pub fn new(backend: TranscodeBackend, codec: VideoCodec) -> Self {
        Self {
            backend,
            codec,
            bitrate_kbps: None,
            surround: false,
        }
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = Some(kbps);
        self
    }

    pub fn with_surround(mut self, surround: bool) -> Self {
        self.surround = surround;
        self
    }

    pub fn content_type(&self) -> &'static str {
        self.codec.content_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for backend in TranscodeBackend::ALL {
            assert_eq!(backend.as_str().parse::<TranscodeBackend>(), Ok(backend));
        }
        for codec in VideoCodec::ALL {
            assert_eq!(codec.as_str().parse::<VideoCodec>(), Ok(codec));
        }
        assert!("quicksync".parse::<TranscodeBackend>().is_err());
    }

    #[test]
    fn only_av1_streams_as_webm() {
        assert_eq!(VideoCodec::Av1.content_type(), "video/webm");
        assert_eq!(VideoCodec::Copy.content_type(), "video/mp4");
        assert_eq!(VideoCodec::Hevc.content_type(), "video/mp4");
    }
}
