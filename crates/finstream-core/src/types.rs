//! Core types for Finstream

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bitrate/resolution ceiling supplied by the settings collaborator.
///
/// `0` on any field means unconstrained; the profile builder substitutes its
/// documented platform defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Maximum streaming bitrate in bits per second (0 = unconstrained)
    pub max_bitrate: u64,
    /// Maximum video width in pixels (0 = unconstrained)
    pub max_width: u32,
    /// Maximum video height in pixels (0 = unconstrained)
    pub max_height: u32,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns quality tier name
    pub fn quality_name(&self) -> &'static str {
        match self.height {
            0..=240 => "240p",
            241..=360 => "360p",
            361..=480 => "480p",
            481..=720 => "720p",
            721..=1080 => "1080p",
            1081..=1440 => "1440p",
            _ => "4K",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Reserved subtitle track id meaning "subtitles off"
pub const SUBTITLE_TRACK_OFF: i32 = -1;

/// Selectable audio track, stable within one loaded media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    /// Track id, an index into the enumerated list
    pub id: i32,
    /// BCP-47 language code
    pub language: String,
    /// Human-readable label
    pub label: String,
    /// Channel count, if known
    pub channels: Option<u32>,
}

/// Selectable subtitle track, stable within one loaded media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrackInfo {
    /// Track id, an index into the enumerated list
    pub id: i32,
    /// BCP-47 language code
    pub language: String,
    /// Human-readable label
    pub label: String,
    /// Track kind (subtitles, captions, forced)
    pub kind: Option<String>,
}

/// Options for a `load()` call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoadOptions {
    /// Start offset in seconds, applied once the engine reports metadata
    pub start_position: Option<f64>,
    /// Initial audio track id
    pub audio_track: Option<i32>,
    /// Initial subtitle track id (`SUBTITLE_TRACK_OFF` disables)
    pub subtitle_track: Option<i32>,
}

/// Adapter lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    /// Created, engine not yet probed
    Uninitialized,
    /// `initialize()` in flight
    Initializing,
    /// Engine prepared against the surface, no media loaded
    Ready,
    /// Media loaded, not playing
    Loaded,
    /// Playback in progress
    Playing,
    /// Playback paused
    Paused,
    /// Engine torn down; terminal
    Destroyed,
}

impl AdapterState {
    /// Check if transition to target state is valid
    ///
    /// `Loaded`, `Playing`, and `Paused` may re-enter `Loaded` via a new
    /// `load()` call; the engine is reusable without reattaching the surface.
    /// `Destroyed` is reachable from every state.
    pub fn can_transition_to(&self, target: AdapterState) -> bool {
        use AdapterState::*;
        if target == Destroyed {
            return true;
        }
        matches!(
            (self, target),
            (Uninitialized, Initializing) |
            // Probe outcome: success or back to square one
            (Initializing, Ready) | (Initializing, Uninitialized) |
            (Ready, Loaded) |
            (Loaded, Playing) | (Loaded, Paused) | (Loaded, Loaded) |
            (Playing, Paused) | (Playing, Loaded) |
            (Paused, Playing) | (Paused, Loaded)
        )
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdapterState::Uninitialized => write!(f, "uninitialized"),
            AdapterState::Initializing => write!(f, "initializing"),
            AdapterState::Ready => write!(f, "ready"),
            AdapterState::Loaded => write!(f, "loaded"),
            AdapterState::Playing => write!(f, "playing"),
            AdapterState::Paused => write!(f, "paused"),
            AdapterState::Destroyed => write!(f, "destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(AdapterState::Uninitialized.can_transition_to(AdapterState::Initializing));
        assert!(AdapterState::Initializing.can_transition_to(AdapterState::Ready));
        assert!(AdapterState::Ready.can_transition_to(AdapterState::Loaded));
        assert!(AdapterState::Loaded.can_transition_to(AdapterState::Playing));
        assert!(AdapterState::Playing.can_transition_to(AdapterState::Paused));
        assert!(AdapterState::Paused.can_transition_to(AdapterState::Playing));

        // Reload without reattaching the surface
        assert!(AdapterState::Playing.can_transition_to(AdapterState::Loaded));
        assert!(AdapterState::Paused.can_transition_to(AdapterState::Loaded));

        // Invalid
        assert!(!AdapterState::Uninitialized.can_transition_to(AdapterState::Playing));
        assert!(!AdapterState::Ready.can_transition_to(AdapterState::Playing));
        assert!(!AdapterState::Destroyed.can_transition_to(AdapterState::Ready));
    }

    #[test]
    fn test_destroy_reachable_from_any_state() {
        for state in [
            AdapterState::Uninitialized,
            AdapterState::Initializing,
            AdapterState::Ready,
            AdapterState::Loaded,
            AdapterState::Playing,
            AdapterState::Paused,
            AdapterState::Destroyed,
        ] {
            assert!(state.can_transition_to(AdapterState::Destroyed));
        }
    }

    #[test]
    fn test_resolution_quality_name() {
        assert_eq!(Resolution::new(1280, 720).quality_name(), "720p");
        assert_eq!(Resolution::new(1920, 1080).quality_name(), "1080p");
        assert_eq!(Resolution::new(3840, 2160).quality_name(), "4K");
    }
}
