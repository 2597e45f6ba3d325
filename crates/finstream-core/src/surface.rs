//! Media surface abstraction
//!
//! A surface is the DOM-like video element the active adapter renders into.
//! It is exclusively owned by the currently active adapter; adapters drop
//! their handle on `destroy()` and must not retain it.

use crate::types::{AudioTrackInfo, SubtitleTrackInfo};
use std::sync::{Arc, Mutex};
use url::Url;

/// Handle shared between the factory and the one active adapter
pub type SharedSurface = Arc<Mutex<dyn MediaSurface>>;

/// Minimum contract a playback surface must expose
pub trait MediaSurface: Send {
    /// Point the surface at a media source
    fn attach_source(&mut self, url: &Url);

    /// Clear the current source and any buffered media
    fn detach_source(&mut self);

    /// Whether a source is currently attached
    fn is_attached(&self) -> bool;

    /// Current playback position in seconds
    fn current_time(&self) -> f64;

    /// Seek to a position in seconds
    fn seek(&mut self, position: f64);

    /// Media duration in seconds, once metadata is available
    fn duration(&self) -> Option<f64>;

    /// Whether the surface has parsed media metadata yet. Seeking before this
    /// reports true is unreliable.
    fn has_metadata(&self) -> bool;

    fn volume(&self) -> f64;

    fn set_volume(&mut self, volume: f64);

    fn is_paused(&self) -> bool;

    fn play(&mut self);

    fn pause(&mut self);

    /// Audio tracks exposed by the attached media
    fn audio_tracks(&self) -> Vec<AudioTrackInfo>;

    /// Text tracks exposed by the attached media
    fn text_tracks(&self) -> Vec<SubtitleTrackInfo>;

    /// Activate an audio track by list index
    fn set_active_audio_track(&mut self, index: usize);

    /// Activate a text track by list index; `None` disables subtitles
    fn set_active_text_track(&mut self, index: Option<usize>);

    /// Whether the surface supports buffer-fed adaptive playback (required by
    /// the manifest-driven engine)
    fn supports_media_source(&self) -> bool;
}

/// In-memory surface with no rendering backend.
///
/// Behaves like an ideal media element: metadata appears as soon as a source
/// is attached. Used for headless diagnostics and as the surface in the test
/// suite.
pub struct StubSurface {
    source: Option<Url>,
    position: f64,
    duration: f64,
    volume: f64,
    paused: bool,
    media_source_supported: bool,
    metadata_available: bool,
    audio_tracks: Vec<AudioTrackInfo>,
    text_tracks: Vec<SubtitleTrackInfo>,
    active_audio: Option<usize>,
    active_text: Option<usize>,
}

impl StubSurface {
    pub fn new() -> Self {
        Self {
            source: None,
            position: 0.0,
            duration: 3600.0,
            volume: 1.0,
            paused: true,
            media_source_supported: true,
            metadata_available: true,
            audio_tracks: Vec::new(),
            text_tracks: Vec::new(),
            active_audio: None,
            active_text: None,
        }
    }

    /// Disable buffer-fed playback support, forcing the factory past the
    /// manifest-driven engine
    pub fn without_media_source(mut self) -> Self {
        self.media_source_supported = false;
        self
    }

    /// Never report metadata readiness, simulating a stalled media element
    pub fn without_metadata(mut self) -> Self {
        self.metadata_available = false;
        self
    }

    /// Declare the tracks the attached media will expose
    pub fn with_tracks(
        mut self,
        audio: Vec<AudioTrackInfo>,
        text: Vec<SubtitleTrackInfo>,
    ) -> Self {
        self.audio_tracks = audio;
        self.text_tracks = text;
        self
    }

    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn active_audio_track(&self) -> Option<usize> {
        self.active_audio
    }

    pub fn active_text_track(&self) -> Option<usize> {
        self.active_text
    }

    pub fn source(&self) -> Option<&Url> {
        self.source.as_ref()
    }

    /// Wrap into the shared handle the factory expects
    pub fn into_shared(self) -> SharedSurface {
        Arc::new(Mutex::new(self))
    }
}

impl Default for StubSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSurface for StubSurface {
    fn attach_source(&mut self, url: &Url) {
        self.source = Some(url.clone());
        self.position = 0.0;
        self.paused = true;
    }

    fn detach_source(&mut self) {
        self.source = None;
        self.position = 0.0;
        self.paused = true;
        self.active_audio = None;
        self.active_text = None;
    }

    fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn seek(&mut self, position: f64) {
        self.position = position.clamp(0.0, self.duration);
    }

    fn duration(&self) -> Option<f64> {
        self.source.as_ref().map(|_| self.duration)
    }

    fn has_metadata(&self) -> bool {
        self.source.is_some() && self.metadata_available
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn play(&mut self) {
        if self.source.is_some() {
            self.paused = false;
        }
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        if self.source.is_some() {
            self.audio_tracks.clone()
        } else {
            Vec::new()
        }
    }

    fn text_tracks(&self) -> Vec<SubtitleTrackInfo> {
        if self.source.is_some() {
            self.text_tracks.clone()
        } else {
            Vec::new()
        }
    }

    fn set_active_audio_track(&mut self, index: usize) {
        if index < self.audio_tracks.len() {
            self.active_audio = Some(index);
        }
    }

    fn set_active_text_track(&mut self, index: Option<usize>) {
        match index {
            Some(i) if i < self.text_tracks.len() => self.active_text = Some(i),
            Some(_) => {}
            None => self.active_text = None,
        }
    }

    fn supports_media_source(&self) -> bool {
        self.media_source_supported
    }
}
