//! Progressive playback engine
//!
//! Hands the URL straight to the surface and relies on its built-in
//! progressive download path. No adaptive switching, no platform pipeline.
//! Last in the default engine order; it initializes unconditionally so the
//! factory always has a working floor.

use super::{apply_initial_tracks, AdapterCore, PlayerAdapter};
use crate::{
    error::Result,
    events::{EventHandler, PlayerEvent, PlayerEventKind},
    surface::SharedSurface,
    types::{AdapterState, AudioTrackInfo, LoadOptions, SubtitleTrackInfo},
};
use async_trait::async_trait;
use tracing::{info, instrument};
use url::Url;

pub struct Html5Adapter {
    core: AdapterCore,
}

impl Html5Adapter {
    pub fn new(surface: SharedSurface) -> Self {
        Self {
            core: AdapterCore::new("html5", surface),
        }
    }
}

#[async_trait]
impl PlayerAdapter for Html5Adapter {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn state(&self) -> AdapterState {
        self.core.state()
    }

    #[instrument(skip(self), fields(engine = "html5"))]
    async fn initialize(&mut self) -> Result<bool> {
        self.core.transition(AdapterState::Initializing)?;
        self.core.transition(AdapterState::Ready)?;
        info!(session = %self.core.session(), "Progressive engine ready");
        Ok(true)
    }

    #[instrument(skip(self, options), fields(engine = "html5", url = %url))]
    async fn load(&mut self, url: &Url, options: LoadOptions) -> Result<()> {
        self.core.require_loadable()?;

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

    #[instrument(skip(self), fields(engine = "html5"))]
    async fn destroy(&mut self) -> Result<()> {
        self.core.destroy();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::StubSurface;
    use crate::types::{SubtitleTrackInfo, SUBTITLE_TRACK_OFF};

    fn tracked_surface() -> SharedSurface {
        StubSurface::new()
            .with_tracks(
                vec![
                    AudioTrackInfo {
                        id: 0,
                        language: "en".into(),
                        label: "English".into(),
                        channels: Some(6),
                    },
                    AudioTrackInfo {
                        id: 1,
                        language: "fr".into(),
                        label: "Francais".into(),
                        channels: Some(2),
                    },
                ],
                vec![SubtitleTrackInfo {
                    id: 0,
                    language: "en".into(),
                    label: "English".into(),
                    kind: Some("subtitles".into()),
                }],
            )
            .into_shared()
    }

    #[tokio::test]
    async fn test_initialize_always_succeeds() {
        // Even without buffer-fed playback support
        let surface = StubSurface::new().without_media_source().into_shared();
        let mut adapter = Html5Adapter::new(surface);
        assert!(adapter.initialize().await.unwrap());
        assert_eq!(adapter.state(), AdapterState::Ready);
    }

    #[tokio::test]
    async fn test_load_enumerates_surface_tracks() {
        let mut adapter = Html5Adapter::new(tracked_surface());
        adapter.initialize().await.unwrap();

        let url = Url::parse("https://example.com/video.mp4").unwrap();
        adapter.load(&url, LoadOptions::default()).await.unwrap();

        assert_eq!(adapter.audio_tracks().len(), 2);
        assert_eq!(adapter.subtitle_tracks().len(), 1);
        assert_eq!(adapter.active_audio_track(), Some(0));
        assert_eq!(adapter.active_subtitle_track(), None);
    }

    #[tokio::test]
    async fn test_track_selection_bounds() {
        let mut adapter = Html5Adapter::new(tracked_surface());
        adapter.initialize().await.unwrap();
        let url = Url::parse("https://example.com/video.mp4").unwrap();
        adapter.load(&url, LoadOptions::default()).await.unwrap();

        assert!(adapter.select_audio_track(1));
        assert_eq!(adapter.active_audio_track(), Some(1));

        // Out of range: reported no-op
        assert!(!adapter.select_audio_track(7));
        assert_eq!(adapter.active_audio_track(), Some(1));

        assert!(adapter.select_subtitle_track(0));
        assert_eq!(adapter.active_subtitle_track(), Some(0));
        assert!(adapter.select_subtitle_track(SUBTITLE_TRACK_OFF));
        assert_eq!(adapter.active_subtitle_track(), None);
    }

    #[tokio::test]
    async fn test_load_options_reach_the_surface() {
        use std::sync::{Arc, Mutex};

        let stub = Arc::new(Mutex::new(
            StubSurface::new().with_tracks(
                vec![
                    AudioTrackInfo {
                        id: 0,
                        language: "en".into(),
                        label: "English".into(),
                        channels: Some(6),
                    },
                    AudioTrackInfo {
                        id: 1,
                        language: "fr".into(),
                        label: "Francais".into(),
                        channels: Some(2),
                    },
                ],
                vec![SubtitleTrackInfo {
                    id: 0,
                    language: "fr".into(),
                    label: "Francais".into(),
                    kind: Some("subtitles".into()),
                }],
            ),
        ));
        let shared: SharedSurface = stub.clone();
        let mut adapter = Html5Adapter::new(shared);
        adapter.initialize().await.unwrap();

        let url = Url::parse("https://example.com/video.mp4").unwrap();
        let options = LoadOptions {
            start_position: None,
            audio_track: Some(1),
            subtitle_track: Some(0),
        };
        adapter.load(&url, options).await.unwrap();

        // Bookkeeping and the surface agree on the initial selections
        assert_eq!(adapter.active_audio_track(), Some(1));
        assert_eq!(adapter.active_subtitle_track(), Some(0));
        let surface = stub.lock().unwrap();
        assert_eq!(surface.active_audio_track(), Some(1));
        assert_eq!(surface.active_text_track(), Some(0));
    }

    #[tokio::test]
    async fn test_destroy_clears_handlers_and_surface() {
        use std::sync::{Arc, Mutex};

        let mut adapter = Html5Adapter::new(StubSurface::new().into_shared());
        adapter.initialize().await.unwrap();
        let url = Url::parse("https://example.com/video.mp4").unwrap();
        adapter.load(&url, LoadOptions::default()).await.unwrap();

        let fired = Arc::new(Mutex::new(0u32));
        {
            let fired = Arc::clone(&fired);
            adapter.on(
                PlayerEventKind::Loaded,
                Box::new(move |_| *fired.lock().unwrap() += 1),
            );
        }

        adapter.destroy().await.unwrap();
        assert_eq!(adapter.state(), AdapterState::Destroyed);
        assert!(adapter.play().is_err());
        assert_eq!(adapter.current_time(), 0.0);

        // Idempotent
        adapter.destroy().await.unwrap();
        assert_eq!(*fired.lock().unwrap(), 0);
    }
}
