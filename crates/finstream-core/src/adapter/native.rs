//! Platform-pipeline playback engine
//!
//! Hands the URL to a platform-provided AV pipeline and lets the firmware do
//! demuxing and rendering. Second choice in the default engine order; only
//! usable when the embedding supplies a pipeline handle.

use super::{apply_initial_tracks, AdapterCore, PlayerAdapter};
use crate::{
    error::{Error, Result},
    events::{EventHandler, PlayerEvent, PlayerEventKind},
    surface::SharedSurface,
    types::{AdapterState, AudioTrackInfo, LoadOptions, SubtitleTrackInfo},
};
use async_trait::async_trait;
use tracing::{debug, info, instrument};
use url::Url;

/// Handle to the platform's AV pipeline.
///
/// One media item at a time: `open` on an already-loaded pipeline is a
/// contract violation, callers must `unload` first.
pub trait PlatformPipeline: Send {
    /// Point the pipeline at a media URL and begin demuxing
    fn open(&mut self, url: &Url) -> Result<()>;

    /// Release the currently opened media
    fn unload(&mut self) -> Result<()>;

    /// Whether media is currently opened
    fn is_loaded(&self) -> bool;
}

/// Adapter over the platform AV pipeline.
///
/// `initialize()` declines with `Ok(false)` when no pipeline handle was
/// supplied, which is how the factory falls through on hardware without one.
pub struct NativeAdapter {
    core: AdapterCore,
    pipeline: Option<Box<dyn PlatformPipeline>>,
}

impl NativeAdapter {
    pub fn new(surface: SharedSurface, pipeline: Option<Box<dyn PlatformPipeline>>) -> Self {
        Self {
            core: AdapterCore::new("native", surface),
            pipeline,
        }
    }
}

#[async_trait]
impl PlayerAdapter for NativeAdapter {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn state(&self) -> AdapterState {
        self.core.state()
    }

    #[instrument(skip(self), fields(engine = "native"))]
    async fn initialize(&mut self) -> Result<bool> {
        self.core.transition(AdapterState::Initializing)?;
        if self.pipeline.is_some() {
            self.core.transition(AdapterState::Ready)?;
            info!(session = %self.core.session(), "Platform pipeline ready");
            Ok(true)
        } else {
            debug!("No platform pipeline available, declining");
            self.core.transition(AdapterState::Uninitialized)?;
            Ok(false)
        }
    }

    #[instrument(skip(self, options), fields(engine = "native", url = %url))]
    async fn load(&mut self, url: &Url, options: LoadOptions) -> Result<()> {
        self.core.require_loadable()?;
        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| Error::Internal("pipeline missing after initialize".into()))?;

        // Loading over loaded media is a pipeline contract violation
        if pipeline.is_loaded() {
            debug!("Unloading previous media before reload");
            pipeline.unload()?;
        }
        pipeline.open(url)?;

        self.core.surface()?.attach_source(url);
        self.core.wait_for_metadata().await?;
        self.core.refresh_tracks_from_surface()?;
        self.core.apply_start_offset(&options)?;
        apply_initial_tracks(self, &options);

        self.core.transition(AdapterState::Loaded)?;
        self.core
            .emit(&PlayerEvent::Loaded { url: url.to_string() });
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.core.play()
    }

    fn pause(&mut self) -> Result<()> {
        self.core.pause()
    }

    fn seek(&mut self, position: f64) -> Result<()> {
        self.core.seek(position)
    }

    fn current_time(&self) -> f64 {
        self.core.current_time()
    }

    fn duration(&self) -> Option<f64> {
        self.core.duration()
    }

    fn set_volume(&mut self, volume: f64) {
        self.core.set_volume(volume);
    }

    fn volume(&self) -> f64 {
        self.core.volume()
    }

    fn is_paused(&self) -> bool {
        self.core.is_paused()
    }

    fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        self.core.audio_tracks()
    }

    fn subtitle_tracks(&self) -> Vec<SubtitleTrackInfo> {
        self.core.subtitle_tracks()
    }

    fn select_audio_track(&mut self, id: i32) -> bool {
        if !self.core.select_audio_track(id) {
            return false;
        }
        if let Ok(mut surface) = self.core.surface() {
            surface.set_active_audio_track(id as usize);
        }
        true
    }

    fn select_subtitle_track(&mut self, id: i32) -> bool {
        if !self.core.select_subtitle_track(id) {
            return false;
        }
        if let Ok(mut surface) = self.core.surface() {
            surface.set_active_text_track(self.core.active_subtitle_track().map(|i| i as usize));
        }
        true
    }

    fn active_audio_track(&self) -> Option<i32> {
        self.core.active_audio_track()
    }

    fn active_subtitle_track(&self) -> Option<i32> {
        self.core.active_subtitle_track()
    }

    fn on(&mut self, kind: PlayerEventKind, handler: EventHandler) {
        self.core.on(kind, handler);
    }

    #[instrument(skip(self), fields(engine = "native"))]
    async fn destroy(&mut self) -> Result<()> {
        if let Some(mut pipeline) = self.pipeline.take() {
            if pipeline.is_loaded() {
                pipeline.unload()?;
            }
        }
        self.core.destroy();
        Ok(())
    }
}
