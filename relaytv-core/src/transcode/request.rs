//! Path-segment parsing for `/transcode/...` and `/api/play/...` requests.
//!
//! Every segment is matched on its own against a fixed vocabulary. When the
//! same field is given more than once the last segment wins; this also holds
//! for the channel, which is whatever non-keyword segment came last.

use super::{TranscodeBackend, TranscodeConfig, VideoCodec};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Backend(TranscodeBackend),
    Codec(VideoCodec),
    Surround,
    Bitrate(Option<u32>),
    Other(&'a str),
}

fn classify(segment: &str) -> Segment<'_> {
    if let Ok(backend) = segment.parse::<TranscodeBackend>() {
        return Segment::Backend(backend);
    }
    if let Ok(codec) = segment.parse::<VideoCodec>() {
        return Segment::Codec(codec);
    }
    if segment == "ac6" {
        return Segment::Surround;
    }
    if let Some(bitrate) = parse_bitrate(segment) {
        return Segment::Bitrate(bitrate);
    }
    Segment::Other(segment)
}

/// `b4000`, `B4000` and `b4000k` are bitrate tokens. Zero or an overflowing
/// value is still a bitrate token, it just leaves the cap unset.
fn parse_bitrate(segment: &str) -> Option<Option<u32>> {
    let rest = segment
        .strip_prefix('b')
        .or_else(|| segment.strip_prefix('B'))?;
    let digits: &str = &rest[..rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len())];
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse::<u32>().ok().filter(|kbps| *kbps > 0))
}

fn apply(config: &mut TranscodeConfig, segment: &Segment<'_>) {
    match segment {
        Segment::Backend(backend) => config.backend = *backend,
        Segment::Codec(codec) => config.codec = *codec,
        Segment::Surround => config.surround = true,
        Segment::Bitrate(bitrate) => config.bitrate_kbps = *bitrate,
        Segment::Other(_) => {}
    }
}

/// An ad-hoc transcode request: `/transcode/[backend]/[codec]/[options]/<channel>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeRequest {
    pub config: TranscodeConfig,
    pub channel: Option<String>,
}

impl TranscodeRequest {
    pub fn parse<'a, I>(segments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut config = TranscodeConfig::default();
        let mut channel = None;
        for segment in segments.into_iter().filter(|s| !s.is_empty()) {
            match classify(segment) {
                Segment::Other(value) => channel = Some(value.to_string()),
                known => apply(&mut config, &known),
            }
        }
        Self { config, channel }
    }

    pub fn from_path(path: &str) -> Self {
        Self::parse(path.split('/'))
    }
}

/// A recording playback request: `/api/play/<id>[/format][/codec][/options]`.
///
/// The first segment is the recording id. `software` is not part of the
/// playback vocabulary, and unknown segments (such as the `mp4` format hint)
/// are ignored rather than treated as a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub recording_id: Option<i64>,
    pub config: TranscodeConfig,
}

impl PlaybackRequest {
    pub fn parse<'a, I>(segments: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut segments = segments.into_iter().filter(|s| !s.is_empty()).peekable();
        let mut recording_id = None;
        if let Some(first) = segments.peek() {
            if first.starts_with(|c: char| c.is_ascii_digit()) {
                recording_id = first.parse::<i64>().ok().filter(|id| *id > 0);
                segments.next();
            }
        }

        let mut config = TranscodeConfig::default();
        for segment in segments {
            match classify(segment) {
                Segment::Backend(TranscodeBackend::Software) | Segment::Other(_) => {}
                known => apply(&mut config, &known),
            }
        }
        Self {
            recording_id,
            config,
        }
    }

    pub fn from_path(path: &str) -> Self {
        Self::parse(path.split('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_only_channel_given() {
        let request = TranscodeRequest::from_path("5.1");
        assert_eq!(request.channel.as_deref(), Some("5.1"));
        assert_eq!(request.config, TranscodeConfig::default());
    }

    #[test]
    fn last_recognized_value_wins() {
        let request = TranscodeRequest::from_path("nvenc/hevc/vaapi/av1/b2000/B3000/7.1");
        assert_eq!(request.config.backend, TranscodeBackend::Vaapi);
        assert_eq!(request.config.codec, VideoCodec::Av1);
        assert_eq!(request.config.bitrate_kbps, Some(3000));
        assert_eq!(request.channel.as_deref(), Some("7.1"));
    }

    #[test]
    fn last_non_keyword_segment_is_the_channel() {
        let request = TranscodeRequest::from_path("2.1/qsv/ac6/9.1");
        assert_eq!(request.channel.as_deref(), Some("9.1"));
        assert_eq!(request.config.backend, TranscodeBackend::QuickSync);
        assert!(request.config.surround);
    }

    #[test]
    fn missing_channel_is_none() {
        let request = TranscodeRequest::from_path("software/h264/");
        assert!(request.channel.is_none());
    }

    #[test]
    fn bare_b_is_a_channel_not_a_bitrate() {
        let request = TranscodeRequest::from_path("b/bx");
        assert_eq!(request.channel.as_deref(), Some("bx"));
        assert_eq!(request.config.bitrate_kbps, None);
    }

    #[test]
    fn playback_takes_id_first_and_ignores_format() {
        let request = PlaybackRequest::from_path("123/mp4/hevc/nvenc/ac6");
        assert_eq!(request.recording_id, Some(123));
        assert_eq!(request.config.codec, VideoCodec::Hevc);
        assert_eq!(request.config.backend, TranscodeBackend::Nvenc);
        assert!(request.config.surround);
    }

    #[test]
    fn playback_does_not_reset_backend_on_software() {
        let request = PlaybackRequest::from_path("4/qsv/software");
        assert_eq!(request.config.backend, TranscodeBackend::QuickSync);
    }

    #[test]
    fn playback_rejects_non_numeric_or_zero_id() {
        assert_eq!(PlaybackRequest::from_path("abc/h264").recording_id, None);
        assert_eq!(PlaybackRequest::from_path("0").recording_id, None);
    }
}
