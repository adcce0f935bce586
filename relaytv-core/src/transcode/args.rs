use std::path::Path;

use super::{TranscodeBackend, TranscodeConfig, VideoCodec};

pub const DEFAULT_VAAPI_DEVICE: &str = "/dev/dri/renderD128";

const QUALITY: &str = "23";
const STEREO_AUDIO_BITRATE: &str = "128k";
const SURROUND_AUDIO_BITRATE: &str = "384k";
const SURROUND_REMAP: &str = "channelmap=channel_layout=5.1";
const QSV_FILTERS: &str = "yadif=0:-1:0,format=nv12,hwupload=extra_hw_frames=64,format=qsv";
const VAAPI_FILTERS: &str = "format=nv12,hwupload";
const FRAGMENTED_MP4_FLAGS: &str = "frag_keyframe+empty_moov+default_base_moof";

/// Builds encoder argument vectors. The program name is not included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentBuilder {
    vaapi_device: String,
}

impl Default for ArgumentBuilder {
    fn default() -> Self {
        Self {
            vaapi_device: DEFAULT_VAAPI_DEVICE.to_string(),
        }
    }
}

impl ArgumentBuilder {
    pub fn new(vaapi_device: impl Into<String>) -> Self {
        Self {
            vaapi_device: vaapi_device.into(),
        }
    }

    /// Arguments that read `source` in real time and write a streamable
    /// container to stdout.
    pub fn transcode_args(&self, source: &str, config: &TranscodeConfig) -> Vec<String> {
        let mut args = ArgList::default();

        match config.backend {
            TranscodeBackend::Vaapi => {
                args.push("-init_hw_device")
                    .push(format!("vaapi=gpu:{}", self.vaapi_device))
                    .push("-filter_hw_device")
                    .push("gpu");
            }
            TranscodeBackend::QuickSync => {
                args.push("-init_hw_device")
                    .push("qsv=hw")
                    .push("-filter_hw_device")
                    .push("hw");
            }
            TranscodeBackend::Software | TranscodeBackend::Nvenc => {}
        }

        args.push("-re").push("-i").push(source);

        if config.codec == VideoCodec::Copy {
            args.push("-c:v").push("copy");
        } else {
            push_video(&mut args, config);
            if let Some(kbps) = config.bitrate_kbps.filter(|kbps| *kbps > 0) {
                args.push("-maxrate")
                    .push(format!("{kbps}k"))
                    .push("-bufsize")
                    .push(format!("{}k", u64::from(kbps) * 2));
            }
            push_audio(&mut args, config);
        }

        if config.codec == VideoCodec::Av1 {
            args.push("-f").push("webm");
        } else {
            args.push("-f")
                .push("mp4")
                .push("-movflags")
                .push(FRAGMENTED_MP4_FLAGS);
        }

        args.push("pipe:1");
        args.into_vec()
    }
}

fn push_video(args: &mut ArgList, config: &TranscodeConfig) {
    let encoder = video_encoder(config.backend, config.codec);
    match config.backend {
        TranscodeBackend::Software => {
            args.push("-c:v")
                .push(encoder)
                .push("-preset")
                .push("fast")
                .push("-crf")
                .push(QUALITY);
        }
        TranscodeBackend::Nvenc => {
            args.push("-c:v")
                .push(encoder)
                .push("-preset")
                .push("p4")
                .push("-rc")
                .push("constqp")
                .push("-qp")
                .push(QUALITY);
        }
        TranscodeBackend::QuickSync => {
            args.push("-vf")
                .push(QSV_FILTERS)
                .push("-c:v")
                .push(encoder)
                .push("-global_quality")
                .push(QUALITY);
        }
        TranscodeBackend::Vaapi => {
            args.push("-vf")
                .push(VAAPI_FILTERS)
                .push("-c:v")
                .push(encoder)
                .push("-qp")
                .push(QUALITY);
        }
    }
}

fn push_audio(args: &mut ArgList, config: &TranscodeConfig) {
    let opus = config.codec == VideoCodec::Av1;
    let encoder = if opus { "libopus" } else { "aac" };
    if config.surround {
        args.push("-af").push(SURROUND_REMAP).push("-c:a").push(encoder);
        if opus {
            args.push("-mapping_family").push("1");
        }
        args.push("-b:a").push(SURROUND_AUDIO_BITRATE);
    } else {
        args.push("-ac")
            .push("2")
            .push("-c:a")
            .push(encoder)
            .push("-b:a")
            .push(STEREO_AUDIO_BITRATE);
    }
}

fn video_encoder(backend: TranscodeBackend, codec: VideoCodec) -> &'static str {
    match (backend, codec) {
        (TranscodeBackend::Software, VideoCodec::Hevc) => "libx265",
        (TranscodeBackend::Software, VideoCodec::Av1) => "libsvtav1",
        (TranscodeBackend::Software, _) => "libx264",
        (TranscodeBackend::Nvenc, VideoCodec::Hevc) => "hevc_nvenc",
        (TranscodeBackend::Nvenc, VideoCodec::Av1) => "av1_nvenc",
        (TranscodeBackend::Nvenc, _) => "h264_nvenc",
        (TranscodeBackend::QuickSync, VideoCodec::Hevc) => "hevc_qsv",
        (TranscodeBackend::QuickSync, VideoCodec::Av1) => "av1_qsv",
        (TranscodeBackend::QuickSync, _) => "h264_qsv",
        (TranscodeBackend::Vaapi, VideoCodec::Hevc) => "hevc_vaapi",
        (TranscodeBackend::Vaapi, VideoCodec::Av1) => "av1_vaapi",
        (TranscodeBackend::Vaapi, _) => "h264_vaapi",
    }
}

#[derive(Default)]
struct ArgList(Vec<String>);

impl ArgList {
    fn push(&mut self, arg: impl Into<String>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// [`ArgumentBuilder::transcode_args`] with the default VA-API render node.
pub fn transcode_args(source: &str, config: &TranscodeConfig) -> Vec<String> {
    ArgumentBuilder::default().transcode_args(source, config)
}

/// Stream-copies `source` into a seekable MP4 at `output`, overwriting it.
pub fn recording_args(source: &str, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        source.to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-bsf:a".to_string(),
        "aac_adtstoasc".to_string(),
        "-movflags".to_string(),
        "faststart".to_string(),
        "-y".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}
