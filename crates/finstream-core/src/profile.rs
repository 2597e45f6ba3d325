//! Device profile construction
//!
//! Builds the structured capability description the media server uses to
//! choose between direct delivery of the original file and server-side
//! transcoding. The types here are a wire contract: field names and nesting
//! must match the server's schema verbatim, hence the PascalCase renames.
//!
//! `build_device_profile` is a pure function of its inputs; the profile is
//! ephemeral and rebuilt per playback request from the current capabilities
//! and ceiling.

use crate::capabilities::Capabilities;
use crate::types::StreamSettings;
use serde::{Deserialize, Serialize};

/// Streaming bitrate ceiling applied when the caller passes 0 (unconstrained)
pub const DEFAULT_MAX_STREAMING_BITRATE: u64 = 120_000_000;
/// Width ceiling applied when the caller passes 0
pub const DEFAULT_MAX_WIDTH: u32 = 3840;
/// Height ceiling applied when the caller passes 0
pub const DEFAULT_MAX_HEIGHT: u32 = 2160;

/// Ceiling for non-streaming (sync/download) delivery
const MAX_STATIC_BITRATE: u64 = 100_000_000;
/// Ceiling for music transcoding
const MUSIC_TRANSCODING_BITRATE: u64 = 384_000;
/// Framerate cap emitted for the primary 8-bit codec
const MAX_FRAMERATE: u32 = 60;
/// H.264 level ceiling (5.1)
const H264_LEVEL_CAP: u32 = 51;
/// Platform generation from which HEVC packaging inside adaptive-streaming
/// segments is reliable
const HEVC_IN_HLS_MIN_VERSION: u32 = 4;

/// Media type for profile entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    Video,
    Audio,
}

/// Container/codec combination playable without server transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DirectPlayProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}

/// Fallback delivery format the server may transcode into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TranscodingProfile {
    pub container: String,
    #[serde(rename = "Type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    pub audio_codec: String,
    pub protocol: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_audio_channels: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_segments: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_on_non_key_frames: Option<bool>,
}

/// A single `{Condition, Property, Value}` constraint triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProfileCondition {
    pub condition: String,
    pub property: String,
    pub value: String,
}

impl ProfileCondition {
    fn less_than_equal(property: &str, value: impl ToString) -> Self {
        Self {
            condition: "LessThanEqual".into(),
            property: property.into(),
            value: value.to_string(),
        }
    }
}

/// Per-codec ceilings the server enforces when a direct-playable stream still
/// needs capping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodecProfile {
    #[serde(rename = "Type")]
    pub profile_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    pub conditions: Vec<ProfileCondition>,
}

/// Per-subtitle-format delivery policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SubtitleProfile {
    pub format: String,
    pub method: String,
}

/// The structured client capability description sent to the media server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceProfile {
    pub name: String,
    pub max_streaming_bitrate: u64,
    pub max_static_bitrate: u64,
    pub music_streaming_transcoding_bitrate: u64,
    pub direct_play_profiles: Vec<DirectPlayProfile>,
    pub transcoding_profiles: Vec<TranscodingProfile>,
    pub codec_profiles: Vec<CodecProfile>,
    pub subtitle_profiles: Vec<SubtitleProfile>,
}

// Text-subtitle formats the client can ask the server about. Every one of
// them is burned in server-side: side-loaded delivery would render fine on
// one backend and not at all on another, so the profile trades flexibility
// for guaranteed renderability.
const SUBTITLE_FORMATS: &[&str] = &[
    "srt", "subrip", "ass", "ssa", "sub", "smi", "pgssub", "dvdsub", "vtt",
];

/// Build a device profile from detected capabilities and the caller ceiling.
///
/// Pure function: identical inputs yield structurally identical profiles.
/// Zero ceiling fields mean "unconstrained" and take the documented platform
/// defaults.
pub fn build_device_profile(caps: &Capabilities, settings: &StreamSettings) -> DeviceProfile {
    let max_bitrate = if settings.max_bitrate == 0 {
        DEFAULT_MAX_STREAMING_BITRATE
    } else {
        settings.max_bitrate
    };
    let max_width = if settings.max_width == 0 {
        DEFAULT_MAX_WIDTH
    } else {
        settings.max_width
    };
    let max_height = if settings.max_height == 0 {
        DEFAULT_MAX_HEIGHT
    } else {
        settings.max_height
    };

    DeviceProfile {
        name: "Finstream".into(),
        max_streaming_bitrate: max_bitrate,
        max_static_bitrate: MAX_STATIC_BITRATE,
        music_streaming_transcoding_bitrate: MUSIC_TRANSCODING_BITRATE,
        direct_play_profiles: direct_play_profiles(caps),
        transcoding_profiles: transcoding_profiles(caps),
        codec_profiles: codec_profiles(caps, max_width, max_height, max_bitrate),
        subtitle_profiles: SUBTITLE_FORMATS
            .iter()
            .map(|format| SubtitleProfile {
                format: (*format).into(),
                method: "Encode".into(),
            })
            .collect(),
    }
}

/// Video codecs the runtime can decode, gated strictly on capability flags
fn direct_video_codecs(caps: &Capabilities) -> Vec<&'static str> {
    let mut codecs = Vec::new();
    if caps.h264 {
        codecs.push("h264");
    }
    if caps.hevc {
        codecs.push("hevc");
    }
    if caps.dolby_vision {
        codecs.push("dvhe");
        codecs.push("dvh1");
    }
    if caps.vp9 {
        codecs.push("vp9");
    }
    if caps.av1 {
        codecs.push("av1");
    }
    codecs
}

/// Audio codecs for transcoding targets: the mp3 baseline is always present,
/// the rest follow their flags
fn transcode_audio_codecs(caps: &Capabilities) -> Vec<&'static str> {
    let mut codecs = vec!["mp3"];
    if caps.aac {
        codecs.push("aac");
    }
    if caps.ac3 {
        codecs.push("ac3");
    }
    if caps.eac3 {
        codecs.push("eac3");
    }
    if caps.dts {
        codecs.push("dts");
        codecs.push("dca");
    }
    codecs
}

/// Direct-play audio additionally carries the lossless codecs; those are
/// never offered as transcoding targets
fn direct_audio_codecs(caps: &Capabilities) -> Vec<&'static str> {
    let mut codecs = transcode_audio_codecs(caps);
    codecs.push("flac");
    codecs.push("alac");
    codecs
}

fn direct_play_profiles(caps: &Capabilities) -> Vec<DirectPlayProfile> {
    let video_codecs = direct_video_codecs(caps);
    let audio_codecs = direct_audio_codecs(caps).join(",");
    let mut profiles = Vec::new();

    if !video_codecs.is_empty() {
        let video_codecs = video_codecs.join(",");
        profiles.push(DirectPlayProfile {
            container: "mp4,m4v".into(),
            media_type: MediaType::Video,
            video_codec: Some(video_codecs.clone()),
            audio_codec: Some(audio_codecs.clone()),
        });
        if caps.matroska {
            profiles.push(DirectPlayProfile {
                container: "mkv".into(),
                media_type: MediaType::Video,
                video_codec: Some(video_codecs),
                audio_codec: Some(audio_codecs.clone()),
            });
        }
    }

    let mut audio_containers = vec!["mp3", "flac", "alac", "wav"];
    if caps.aac {
        audio_containers.push("aac");
        audio_containers.push("m4a");
        audio_containers.push("m4b");
    }
    profiles.push(DirectPlayProfile {
        container: audio_containers.join(","),
        media_type: MediaType::Audio,
        video_codec: None,
        audio_codec: None,
    });

    profiles
}

/// Ordered most-compatible first: fMP4-over-HLS, then MPEG-TS-over-HLS, then
/// the static remux fallback. The static entry is unconditional so the server
/// always has a playable target.
fn transcoding_profiles(caps: &Capabilities) -> Vec<TranscodingProfile> {
    // h264 is the universal transcode target. HEVC joins the HLS codec lists
    // only from the platform generation where HEVC-in-segment packaging is
    // reliable, even when the hevc flag itself is set.
    let mut hls_video = vec!["h264"];
    if caps.hevc && caps.platform_version >= HEVC_IN_HLS_MIN_VERSION {
        hls_video.push("hevc");
    }
    let hls_video = hls_video.join(",");

    // mp3 is the unconditional baseline; everything richer follows its flag
    let mut hls_audio = Vec::new();
    if caps.aac {
        hls_audio.push("aac");
    }
    hls_audio.push("mp3");
    if caps.ac3_in_adaptive_streaming {
        if caps.ac3 {
            hls_audio.push("ac3");
        }
        if caps.eac3 {
            hls_audio.push("eac3");
        }
    }
    let hls_audio = hls_audio.join(",");

    let static_audio = if caps.aac { "aac,mp3" } else { "mp3" };

    vec![
        TranscodingProfile {
            container: "mp4".into(),
            media_type: MediaType::Video,
            video_codec: Some(hls_video.clone()),
            audio_codec: hls_audio.clone(),
            protocol: "hls".into(),
            context: "Streaming".into(),
            max_audio_channels: Some("6".into()),
            min_segments: Some(1),
            break_on_non_key_frames: Some(true),
        },
        TranscodingProfile {
            container: "ts".into(),
            media_type: MediaType::Video,
            video_codec: Some(hls_video),
            audio_codec: hls_audio,
            protocol: "hls".into(),
            context: "Streaming".into(),
            max_audio_channels: Some("6".into()),
            min_segments: Some(1),
            break_on_non_key_frames: Some(true),
        },
        TranscodingProfile {
            container: "mp4".into(),
            media_type: MediaType::Video,
            video_codec: Some("h264".into()),
            audio_codec: static_audio.into(),
            protocol: "http".into(),
            context: "Static".into(),
            max_audio_channels: Some("2".into()),
            min_segments: None,
            break_on_non_key_frames: None,
        },
        TranscodingProfile {
            container: "mp3".into(),
            media_type: MediaType::Audio,
            video_codec: None,
            audio_codec: "mp3".into(),
            protocol: "http".into(),
            context: "Streaming".into(),
            max_audio_channels: None,
            min_segments: None,
            break_on_non_key_frames: None,
        },
    ]
}

/// Cumulative ceilings for the primary 8-bit codec, and a ceiling-only set
/// for HEVC where a profile-level cap is not a meaningful gate
fn codec_profiles(
    caps: &Capabilities,
    max_width: u32,
    max_height: u32,
    max_bitrate: u64,
) -> Vec<CodecProfile> {
    let mut profiles = vec![CodecProfile {
        profile_type: "Video".into(),
        codec: Some("h264".into()),
        conditions: vec![
            ProfileCondition::less_than_equal("Width", max_width),
            ProfileCondition::less_than_equal("Height", max_height),
            ProfileCondition::less_than_equal("VideoFramerate", MAX_FRAMERATE),
            ProfileCondition::less_than_equal("VideoBitrate", max_bitrate),
            ProfileCondition::less_than_equal("VideoLevel", H264_LEVEL_CAP),
        ],
    }];

    if caps.hevc {
        profiles.push(CodecProfile {
            profile_type: "Video".into(),
            codec: Some("hevc".into()),
            conditions: vec![
                ProfileCondition::less_than_equal("Width", max_width),
                ProfileCondition::less_than_equal("Height", max_height),
                ProfileCondition::less_than_equal("VideoBitrate", max_bitrate),
            ],
        });
    }

    profiles
}
