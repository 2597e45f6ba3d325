//! Player adapter contract
//!
//! One uniform lifecycle/event/error model over three incompatible playback
//! back-ends. Every concrete engine implements [`PlayerAdapter`]; callers
//! never learn which engine is active except through `name()`.
//!
//! Expected failure paths are boolean returns, not errors: `initialize()`
//! answers `Ok(false)` for an unsupported environment so the factory can fall
//! through, and track selection answers `false` for out-of-range ids.
//! `Err` is reserved for contract violations and genuine faults.

mod basic;
mod factory;
mod native;
mod streaming;

pub use basic::Html5Adapter;
pub use factory::{AdapterCandidate, AdapterFactory};
pub use native::{NativeAdapter, PlatformPipeline};
pub use streaming::{AbrConfig, AbrController, HlsAdapter, HlsConfig, HlsVariant, RetryPolicy};

use crate::{
    error::{Error, Result},
    events::{EventBus, EventHandler, PlayerEvent, PlayerEventKind},
    surface::{MediaSurface, SharedSurface},
    types::{
        AdapterState, AudioTrackInfo, LoadOptions, SessionId, SubtitleTrackInfo,
        SUBTITLE_TRACK_OFF,
    },
};
use async_trait::async_trait;
use std::sync::MutexGuard;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// How long `load()` waits for the surface to report metadata before the
/// start offset is applied
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const METADATA_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The uniform playback contract every concrete engine satisfies.
///
/// An instance owns exactly one attached surface and at most one loaded media
/// source at a time. `initialize()` and `load()` are asynchronous; transport
/// and track operations are synchronous delegations to the surface. The model
/// is single-threaded cooperative, so calls arrive sequentially.
#[async_trait]
pub trait PlayerAdapter: Send {
    /// Identifies the active concrete engine, for diagnostics and for the
    /// native-vs-streaming-library decision surfaced to callers
    fn name(&self) -> &'static str;

    /// Current lifecycle state
    fn state(&self) -> AdapterState;

    /// Prepare the engine against the bound surface. Returns `Ok(false)` on
    /// any environment incompatibility so the factory can try the next
    /// engine; `Err` only for truly unexpected internal faults.
    async fn initialize(&mut self) -> Result<bool>;

    /// Load a media source. Requires a prior successful `initialize()`.
    /// Start-offset seeking happens only after the engine reports metadata.
    /// Emits `Loaded` on success.
    async fn load(&mut self, url: &Url, options: LoadOptions) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn seek(&mut self, position: f64) -> Result<()>;

    fn current_time(&self) -> f64;

    fn duration(&self) -> Option<f64>;

    fn set_volume(&mut self, volume: f64);

    fn volume(&self) -> f64;

    fn is_paused(&self) -> bool;

    /// Enumerate selectable audio tracks for the loaded media
    fn audio_tracks(&self) -> Vec<AudioTrackInfo>;

    /// Enumerate selectable subtitle tracks for the loaded media
    fn subtitle_tracks(&self) -> Vec<SubtitleTrackInfo>;

    /// Select an audio track by id. Out-of-range ids are a reported no-op:
    /// `false` return, active track unchanged.
    fn select_audio_track(&mut self, id: i32) -> bool;

    /// Select a subtitle track by id; `SUBTITLE_TRACK_OFF` (-1) disables
    /// subtitles and always succeeds
    fn select_subtitle_track(&mut self, id: i32) -> bool;

    /// Currently active audio track id, if any
    fn active_audio_track(&self) -> Option<i32>;

    /// Currently active subtitle track id; `None` when subtitles are off
    fn active_subtitle_track(&self) -> Option<i32>;

    /// Subscribe a handler; handlers accumulate and fire synchronously in
    /// registration order
    fn on(&mut self, kind: PlayerEventKind, handler: EventHandler);

    /// Release all engine resources. Safe to call multiple times and from any
    /// state; afterwards no event subscription survives and the surface
    /// handle is dropped.
    async fn destroy(&mut self) -> Result<()>;
}

/// Apply initial track selections through the adapter's own selection path,
/// so engine-specific side effects (surface track switching) are not bypassed
pub(crate) fn apply_initial_tracks<A: PlayerAdapter + ?Sized>(
    adapter: &mut A,
    options: &LoadOptions,
) {
    if let Some(id) = options.audio_track {
        if !adapter.select_audio_track(id) {
            warn!(engine = adapter.name(), track_id = id, "Initial audio track ignored");
        }
    }
    if let Some(id) = options.subtitle_track {
        if !adapter.select_subtitle_track(id) {
            warn!(engine = adapter.name(), track_id = id, "Initial subtitle track ignored");
        }
    }
}

/// Shared adapter internals: the lifecycle state machine, the surface handle,
/// the event bus, and track bookkeeping. Concrete adapters compose this and
/// add their engine specifics.
pub(crate) struct AdapterCore {
    name: &'static str,
    state: AdapterState,
    surface: Option<SharedSurface>,
    events: EventBus,
    session: SessionId,
    audio_tracks: Vec<AudioTrackInfo>,
    subtitle_tracks: Vec<SubtitleTrackInfo>,
    active_audio: Option<i32>,
    active_subtitle: Option<i32>,
}

impl AdapterCore {
    pub(crate) fn new(name: &'static str, surface: SharedSurface) -> Self {
        Self {
            name,
            state: AdapterState::Uninitialized,
            surface: Some(surface),
            events: EventBus::new(),
            session: SessionId::new(),
            audio_tracks: Vec::new(),
            subtitle_tracks: Vec::new(),
            active_audio: None,
            active_subtitle: None,
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn state(&self) -> AdapterState {
        self.state
    }

    pub(crate) fn session(&self) -> SessionId {
        self.session
    }

    /// Validated state transition
    pub(crate) fn transition(&mut self, target: AdapterState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        debug!(engine = self.name, from = %self.state, to = %target, "State transition");
        self.state = target;
        Ok(())
    }

    /// `load()` is legal once the engine is ready, and again after a previous
    /// load (the engine is reusable without reattaching the surface)
    pub(crate) fn require_loadable(&self) -> Result<()> {
        match self.state {
            AdapterState::Ready
            | AdapterState::Loaded
            | AdapterState::Playing
            | AdapterState::Paused => Ok(()),
            _ => Err(Error::NotReady {
                state: self.state.to_string(),
            }),
        }
    }

    /// Locked surface handle; `SurfaceDetached` after `destroy()`
    pub(crate) fn surface(&self) -> Result<MutexGuard<'_, dyn MediaSurface + 'static>> {
        self.surface
            .as_ref()
            .ok_or(Error::SurfaceDetached)?
            .lock()
            .map_err(|_| Error::Internal("surface lock poisoned".into()))
    }

    // Transport delegations

    pub(crate) fn play(&mut self) -> Result<()> {
        match self.state {
            AdapterState::Playing => Ok(()),
            AdapterState::Loaded | AdapterState::Paused => {
                self.surface()?.play();
                self.transition(AdapterState::Playing)
            }
            _ => Err(Error::NotReady {
                state: self.state.to_string(),
            }),
        }
    }

    pub(crate) fn pause(&mut self) -> Result<()> {
        match self.state {
            AdapterState::Paused | AdapterState::Loaded => Ok(()),
            AdapterState::Playing => {
                self.surface()?.pause();
                self.transition(AdapterState::Paused)
            }
            _ => Err(Error::NotReady {
                state: self.state.to_string(),
            }),
        }
    }

    pub(crate) fn seek(&mut self, position: f64) -> Result<()> {
        self.require_loadable()?;
        self.surface()?.seek(position);
        Ok(())
    }

    pub(crate) fn current_time(&self) -> f64 {
        self.surface().map(|s| s.current_time()).unwrap_or(0.0)
    }

    pub(crate) fn duration(&self) -> Option<f64> {
        self.surface().ok().and_then(|s| s.duration())
    }

    pub(crate) fn set_volume(&mut self, volume: f64) {
        if let Ok(mut surface) = self.surface() {
            surface.set_volume(volume);
        }
    }

    pub(crate) fn volume(&self) -> f64 {
        self.surface().map(|s| s.volume()).unwrap_or(0.0)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.surface().map(|s| s.is_paused()).unwrap_or(true)
    }

    // Track bookkeeping

    pub(crate) fn set_tracks(
        &mut self,
        audio: Vec<AudioTrackInfo>,
        subtitles: Vec<SubtitleTrackInfo>,
    ) {
        self.audio_tracks = audio;
        self.subtitle_tracks = subtitles;
        self.active_audio = if self.audio_tracks.is_empty() {
            None
        } else {
            Some(0)
        };
        self.active_subtitle = None;
    }

    /// Re-enumerate tracks from the attached surface (surface-backed engines)
    pub(crate) fn refresh_tracks_from_surface(&mut self) -> Result<()> {
        let (audio, subtitles) = {
            let surface = self.surface()?;
            (surface.audio_tracks(), surface.text_tracks())
        };
        self.set_tracks(audio, subtitles);
        Ok(())
    }

    pub(crate) fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        self.audio_tracks.clone()
    }

    pub(crate) fn subtitle_tracks(&self) -> Vec<SubtitleTrackInfo> {
        self.subtitle_tracks.clone()
    }

    pub(crate) fn active_audio_track(&self) -> Option<i32> {
        self.active_audio
    }

    pub(crate) fn active_subtitle_track(&self) -> Option<i32> {
        self.active_subtitle
    }

    /// Bounds-validated selection; out-of-range ids leave the active track
    /// unchanged and report `false`
    pub(crate) fn select_audio_track(&mut self, id: i32) -> bool {
        if id < 0 || id as usize >= self.audio_tracks.len() {
            warn!(
                engine = self.name,
                track_id = id,
                tracks = self.audio_tracks.len(),
                "Rejected out-of-range audio track selection"
            );
            return false;
        }
        self.active_audio = Some(id);
        self.events
            .emit(&PlayerEvent::AudioTrackChange { track_id: id });
        true
    }

    /// `SUBTITLE_TRACK_OFF` always succeeds and clears the active track
    pub(crate) fn select_subtitle_track(&mut self, id: i32) -> bool {
        if id == SUBTITLE_TRACK_OFF {
            self.active_subtitle = None;
            return true;
        }
        if id < 0 || id as usize >= self.subtitle_tracks.len() {
            warn!(
                engine = self.name,
                track_id = id,
                tracks = self.subtitle_tracks.len(),
                "Rejected out-of-range subtitle track selection"
            );
            return false;
        }
        self.active_subtitle = Some(id);
        true
    }

    // Events

    pub(crate) fn on(&mut self, kind: PlayerEventKind, handler: EventHandler) {
        self.events.on(kind, handler);
    }

    pub(crate) fn emit(&mut self, event: &PlayerEvent) {
        self.events.emit(event);
    }

    /// Surface a playback fault through the `Error` event channel
    pub(crate) fn emit_error(&mut self, err: &Error) {
        self.events.emit(&PlayerEvent::Error {
            code: err.error_code().into(),
            message: err.to_string(),
            fatal: !err.is_recoverable(),
        });
    }

    /// Await the surface's metadata-readiness signal. Start offsets may only
    /// be applied after this resolves. Failures fire the `Error` event before
    /// propagating.
    pub(crate) async fn wait_for_metadata(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + METADATA_TIMEOUT;
        loop {
            {
                let surface = self.surface()?;
                if !surface.is_attached() {
                    drop(surface);
                    let err = Error::MediaLoad(
                        "surface lost its source while awaiting metadata".into(),
                    );
                    self.emit_error(&err);
                    return Err(err);
                }
                if surface.has_metadata() {
                    return Ok(());
                }
            }
            if tokio::time::Instant::now() >= deadline {
                let err = Error::MediaLoad("timed out waiting for media metadata".into());
                self.emit_error(&err);
                return Err(err);
            }
            tokio::time::sleep(METADATA_POLL_INTERVAL).await;
        }
    }

    /// Apply the start offset. Caller must have awaited metadata first.
    pub(crate) fn apply_start_offset(&mut self, options: &LoadOptions) -> Result<()> {
        if let Some(position) = options.start_position {
            self.surface()?.seek(position);
        }
        Ok(())
    }

    /// Idempotent teardown: drop subscriptions, detach and release the
    /// surface, enter the terminal state
    pub(crate) fn destroy(&mut self) {
        self.events.clear();
        if let Some(surface) = self.surface.take() {
            if let Ok(mut guard) = surface.lock() {
                guard.detach_source();
            }
        }
        self.audio_tracks.clear();
        self.subtitle_tracks.clear();
        self.active_audio = None;
        self.active_subtitle = None;
        self.state = AdapterState::Destroyed;
    }
}
