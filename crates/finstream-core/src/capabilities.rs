//! Runtime capability detection
//!
//! Probes the runtime for codec, container, and streaming-protocol support by
//! asking the platform's feature-probe API about minimal synthetic media
//! queries (mimetype + codec tag). Where no direct probe exists, a coarse
//! platform-version threshold stands in, because some TV runtimes under-report
//! support through the standard query path.
//!
//! Detection never fails the caller: a probe that throws is an "unsupported"
//! answer, absorbed inside the `CapabilityProbe` implementation.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

/// Answer from the runtime feature-probe API.
///
/// Mirrors the tri-state reply of media-capability queries; an empty or
/// negative reply maps to `Unsupported`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResponse {
    Unsupported,
    Maybe,
    Probably,
}

impl ProbeResponse {
    /// Both non-empty answers count as supported
    pub fn is_positive(&self) -> bool {
        !matches!(self, ProbeResponse::Unsupported)
    }
}

/// Access to the platform's media feature-probe API.
///
/// Implementations must absorb probe failures and answer
/// `ProbeResponse::Unsupported`; capability detection never propagates an
/// error to the caller.
pub trait CapabilityProbe: Send + Sync {
    /// Ask whether the runtime reports support for a media type query,
    /// e.g. `video/mp4; codecs="avc1.640029"`.
    fn supports_media(&self, query: &str) -> ProbeResponse;

    /// Coarse platform/engine version string, e.g. `"6.3.2"`. `None` when the
    /// runtime does not expose one.
    fn platform_version(&self) -> Option<String>;
}

// Synthetic probe queries, one per capability flag.
const QUERY_H264: &str = r#"video/mp4; codecs="avc1.640029""#;
const QUERY_HEVC_HEV1: &str = r#"video/mp4; codecs="hev1.1.6.L153.B0""#;
const QUERY_HEVC_HVC1: &str = r#"video/mp4; codecs="hvc1.1.6.L153.B0""#;
const QUERY_DOLBY_VISION: &str = r#"video/mp4; codecs="dvhe.08.07""#;
const QUERY_VP9: &str = r#"video/webm; codecs="vp9""#;
const QUERY_AV1: &str = r#"video/mp4; codecs="av01.0.08M.08""#;
const QUERY_AAC: &str = r#"audio/mp4; codecs="mp4a.40.2""#;
const QUERY_AC3: &str = r#"audio/mp4; codecs="ac-3""#;
const QUERY_EAC3: &str = r#"audio/mp4; codecs="ec-3""#;
const QUERY_DTS: &str = r#"audio/mp4; codecs="dtsc""#;
const QUERY_NATIVE_HLS: &str = "application/vnd.apple.mpegurl";
const QUERY_MATROSKA: &str = "video/x-matroska";

/// Platform generation from which Matroska and AC-3-in-HLS are assumed
/// playable even when the query path denies them.
const VERSION_GATE_MKV_AC3: u32 = 3;

/// Detected playback capabilities.
///
/// Flags derive only from feature-probe results or platform-version
/// thresholds; they are never user-configurable. All fields are public so a
/// caller that knows better (the version heuristics are best-effort) can
/// construct or amend an instance directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Coarse platform/runtime generation; 0 when unknown
    pub platform_version: u32,
    pub h264: bool,
    pub hevc: bool,
    pub dolby_vision: bool,
    pub vp9: bool,
    pub av1: bool,
    pub aac: bool,
    pub ac3: bool,
    pub eac3: bool,
    pub dts: bool,
    /// Runtime can play adaptive-streaming manifests natively
    pub native_adaptive_streaming: bool,
    /// Matroska container is directly playable
    pub matroska: bool,
    /// AC-3/E-AC-3 can be packaged inside adaptive-streaming segments
    pub ac3_in_adaptive_streaming: bool,
}

impl Capabilities {
    /// Run every probe and assemble the capability set. Pure with respect to
    /// the probe; no caching here (see [`CapabilityCache`]).
    pub fn detect(probe: &dyn CapabilityProbe) -> Self {
        let platform_version = probe
            .platform_version()
            .as_deref()
            .map(parse_major_version)
            .unwrap_or(0);

        let caps = Self {
            platform_version,
            h264: probe.supports_media(QUERY_H264).is_positive(),
            hevc: probe.supports_media(QUERY_HEVC_HEV1).is_positive()
                || probe.supports_media(QUERY_HEVC_HVC1).is_positive(),
            dolby_vision: probe.supports_media(QUERY_DOLBY_VISION).is_positive(),
            vp9: probe.supports_media(QUERY_VP9).is_positive(),
            av1: probe.supports_media(QUERY_AV1).is_positive(),
            aac: probe.supports_media(QUERY_AAC).is_positive(),
            ac3: probe.supports_media(QUERY_AC3).is_positive(),
            eac3: probe.supports_media(QUERY_EAC3).is_positive(),
            dts: probe.supports_media(QUERY_DTS).is_positive(),
            native_adaptive_streaming: probe.supports_media(QUERY_NATIVE_HLS).is_positive(),
            // TV runtimes routinely deny Matroska through the query path while
            // playing it fine; trust the platform generation as well.
            matroska: probe.supports_media(QUERY_MATROSKA).is_positive()
                || platform_version >= VERSION_GATE_MKV_AC3,
            // No query exists for protocol-level packaging; version threshold only.
            ac3_in_adaptive_streaming: platform_version >= VERSION_GATE_MKV_AC3,
        };

        info!(
            platform_version = caps.platform_version,
            h264 = caps.h264,
            hevc = caps.hevc,
            av1 = caps.av1,
            native_hls = caps.native_adaptive_streaming,
            "Capability detection complete"
        );

        caps
    }
}

/// Leading integer of the first dot-separated component, 0 if unparseable
fn parse_major_version(version: &str) -> u32 {
    version
        .split('.')
        .next()
        .map(|major| {
            major
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

/// Process-scoped capability memo.
///
/// Detection runs once per process and the result is reused for the process
/// lifetime; `invalidate` exists so tests can reset the lifecycle
/// deterministically.
pub struct CapabilityCache {
    inner: Mutex<Option<Capabilities>>,
}

impl CapabilityCache {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    /// Return the cached capabilities, running detection on first use
    pub fn get_or_detect(&self, probe: &dyn CapabilityProbe) -> Capabilities {
        let mut guard = self.inner.lock().expect("capability cache poisoned");
        if let Some(caps) = *guard {
            debug!("Capability cache hit");
            return caps;
        }
        let caps = Capabilities::detect(probe);
        *guard = Some(caps);
        caps
    }

    /// Drop the memo so the next `get_or_detect` re-probes
    pub fn invalidate(&self) {
        *self.inner.lock().expect("capability cache poisoned") = None;
    }
}

impl Default for CapabilityCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared process-wide cache instance
pub static CAPABILITIES: CapabilityCache = CapabilityCache::new();
