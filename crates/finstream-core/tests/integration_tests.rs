//! Integration tests for Finstream Core

use finstream_core::{
    build_device_profile, AdapterFactory, AdapterState, AudioTrackInfo, Capabilities,
    CapabilityProbe, Error, EventHandler, Html5Adapter, HlsAdapter, LoadOptions, NativeAdapter,
    PlayerAdapter, PlayerEvent, PlayerEventKind, ProbeResponse, Result, StreamSettings, StubSurface,
    SubtitleTrackInfo, SUBTITLE_TRACK_OFF,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use url::Url;

// =============================================================================
// Capability Detection -> Device Profile
// =============================================================================

struct ListProbe {
    supported: Vec<&'static str>,
    version: Option<&'static str>,
}

impl CapabilityProbe for ListProbe {
    fn supports_media(&self, query: &str) -> ProbeResponse {
        if self.supported.iter().any(|q| query.contains(q)) {
            ProbeResponse::Probably
        } else {
            ProbeResponse::Unsupported
        }
    }

    fn platform_version(&self) -> Option<String> {
        self.version.map(String::from)
    }
}

fn video_codecs_of(profile_json: &serde_json::Value) -> Vec<String> {
    profile_json["DirectPlayProfiles"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["Type"] == "Video")
        .filter_map(|p| p["VideoCodec"].as_str())
        .flat_map(|s| s.split(',').map(String::from))
        .collect()
}

#[test]
fn test_unprobed_codecs_never_appear() {
    let probe = ListProbe {
        supported: vec!["avc1", "mp4a.40.2"],
        version: Some("2.0"),
    };
    let caps = Capabilities::detect(&probe);
    let profile = build_device_profile(&caps, &StreamSettings::default());
    let json = serde_json::to_value(&profile).unwrap();

    let codecs = video_codecs_of(&json);
    assert!(codecs.contains(&"h264".to_string()));
    assert!(!codecs.contains(&"hevc".to_string()));
    assert!(!codecs.contains(&"av1".to_string()));
    assert!(!codecs.contains(&"vp9".to_string()));
}

#[test]
fn test_hevc_in_hls_requires_platform_generation() {
    let mut caps = Capabilities::default();
    caps.h264 = true;
    caps.hevc = true;
    caps.aac = true;

    let hls_video = |caps: &Capabilities| -> Vec<String> {
        let profile = build_device_profile(caps, &StreamSettings::default());
        let json = serde_json::to_value(&profile).unwrap();
        json["TranscodingProfiles"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|p| p["Protocol"] == "hls")
            .filter_map(|p| p["VideoCodec"].as_str())
            .flat_map(|s| s.split(',').map(String::from))
            .collect()
    };

    caps.platform_version = 3;
    assert!(!hls_video(&caps).contains(&"hevc".to_string()));

    caps.platform_version = 4;
    assert!(hls_video(&caps).contains(&"hevc".to_string()));
}

#[test]
fn test_static_mp4_fallback_always_present() {
    // Even a runtime that probed nothing gets the remux fallback and the
    // mp3 audio baseline
    let caps = Capabilities::default();
    let profile = build_device_profile(&caps, &StreamSettings::default());
    let json = serde_json::to_value(&profile).unwrap();

    let transcoding = json["TranscodingProfiles"].as_array().unwrap();
    assert!(transcoding
        .iter()
        .any(|p| p["Container"] == "mp4" && p["Context"] == "Static"));
    assert!(transcoding
        .iter()
        .any(|p| p["Type"] == "Audio" && p["AudioCodec"].as_str().unwrap().contains("mp3")));
}

#[test]
fn test_profile_builder_is_pure() {
    let probe = ListProbe {
        supported: vec!["avc1", "hev1", "mp4a.40.2", "ac-3"],
        version: Some("5.1"),
    };
    let caps = Capabilities::detect(&probe);
    let settings = StreamSettings {
        max_bitrate: 40_000_000,
        max_width: 1920,
        max_height: 1080,
    };

    let a = serde_json::to_value(build_device_profile(&caps, &settings)).unwrap();
    let b = serde_json::to_value(build_device_profile(&caps, &settings)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_h264_aac_1080p_scenario() {
    let mut caps = Capabilities::default();
    caps.h264 = true;
    caps.aac = true;

    let settings = StreamSettings {
        max_bitrate: 20_000_000,
        max_width: 1920,
        max_height: 1080,
    };
    let profile = build_device_profile(&caps, &settings);
    let json = serde_json::to_value(&profile).unwrap();

    let codecs = video_codecs_of(&json);
    assert_eq!(codecs, vec!["h264".to_string()]);

    let h264 = json["CodecProfiles"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["Codec"] == "h264")
        .unwrap();
    let conditions = h264["Conditions"].as_array().unwrap();
    let value_of = |property: &str| -> &str {
        conditions
            .iter()
            .find(|c| c["Property"] == property)
            .unwrap()["Value"]
            .as_str()
            .unwrap()
    };
    assert_eq!(value_of("Width"), "1920");
    assert_eq!(value_of("Height"), "1080");
    assert_eq!(value_of("VideoBitrate"), "20000000");
    assert_eq!(value_of("VideoFramerate"), "60");
    assert!(conditions.iter().all(|c| c["Condition"] == "LessThanEqual"));

    // No hevc ceilings when hevc is unsupported
    assert!(!json["CodecProfiles"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["Codec"] == "hevc"));
}

// =============================================================================
// Factory Fallback Order
// =============================================================================

/// Scripted engine for factory-order tests
struct ScriptedAdapter {
    name: &'static str,
    outcome: ScriptedOutcome,
    destroyed: Arc<AtomicU32>,
    state: AdapterState,
}

#[derive(Clone, Copy)]
enum ScriptedOutcome {
    Accept,
    Decline,
    Fail,
}

impl ScriptedAdapter {
    fn new(
        name: &'static str,
        outcome: ScriptedOutcome,
        constructed: Arc<AtomicU32>,
        destroyed: Arc<AtomicU32>,
    ) -> Self {
        constructed.fetch_add(1, Ordering::SeqCst);
        Self {
            name,
            outcome,
            destroyed,
            state: AdapterState::Uninitialized,
        }
    }
}

#[async_trait::async_trait]
impl PlayerAdapter for ScriptedAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn state(&self) -> AdapterState {
        self.state
    }

    async fn initialize(&mut self) -> Result<bool> {
        match self.outcome {
            ScriptedOutcome::Accept => {
                self.state = AdapterState::Ready;
                Ok(true)
            }
            ScriptedOutcome::Decline => Ok(false),
            ScriptedOutcome::Fail => Err(Error::Internal("engine blew up".into())),
        }
    }

    async fn load(&mut self, _url: &Url, _options: LoadOptions) -> Result<()> {
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn seek(&mut self, _position: f64) -> Result<()> {
        Ok(())
    }

    fn current_time(&self) -> f64 {
        0.0
    }

    fn duration(&self) -> Option<f64> {
        None
    }

    fn set_volume(&mut self, _volume: f64) {}

    fn volume(&self) -> f64 {
        1.0
    }

    fn is_paused(&self) -> bool {
        true
    }

    fn audio_tracks(&self) -> Vec<AudioTrackInfo> {
        Vec::new()
    }

    fn subtitle_tracks(&self) -> Vec<SubtitleTrackInfo> {
        Vec::new()
    }

    fn select_audio_track(&mut self, _id: i32) -> bool {
        false
    }

    fn select_subtitle_track(&mut self, id: i32) -> bool {
        id == SUBTITLE_TRACK_OFF
    }

    fn active_audio_track(&self) -> Option<i32> {
        None
    }

    fn active_subtitle_track(&self) -> Option<i32> {
        None
    }

    fn on(&mut self, _kind: PlayerEventKind, _handler: EventHandler) {}

    async fn destroy(&mut self) -> Result<()> {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        self.state = AdapterState::Destroyed;
        Ok(())
    }
}

fn scripted_candidate(
    name: &'static str,
    outcome: ScriptedOutcome,
    constructed: Arc<AtomicU32>,
    destroyed: Arc<AtomicU32>,
) -> finstream_core::AdapterCandidate {
    Box::new(move |_surface| {
        Box::new(ScriptedAdapter::new(
            name,
            outcome,
            Arc::clone(&constructed),
            Arc::clone(&destroyed),
        )) as Box<dyn PlayerAdapter>
    })
}

#[tokio::test]
async fn test_factory_short_circuits_after_first_success() {
    let a_made = Arc::new(AtomicU32::new(0));
    let a_dead = Arc::new(AtomicU32::new(0));
    let b_made = Arc::new(AtomicU32::new(0));
    let b_dead = Arc::new(AtomicU32::new(0));
    let c_made = Arc::new(AtomicU32::new(0));
    let c_dead = Arc::new(AtomicU32::new(0));

    let mut factory = AdapterFactory::with_candidates(vec![
        scripted_candidate("a", ScriptedOutcome::Fail, Arc::clone(&a_made), Arc::clone(&a_dead)),
        scripted_candidate("b", ScriptedOutcome::Accept, Arc::clone(&b_made), Arc::clone(&b_dead)),
        scripted_candidate("c", ScriptedOutcome::Accept, Arc::clone(&c_made), Arc::clone(&c_dead)),
    ]);

    let adapter = factory
        .create_player(StubSurface::new().into_shared())
        .await
        .unwrap();

    assert_eq!(adapter.name(), "b");
    // Failed candidate was constructed and torn down
    assert_eq!(a_made.load(Ordering::SeqCst), 1);
    assert_eq!(a_dead.load(Ordering::SeqCst), 1);
    // Winner survives
    assert_eq!(b_made.load(Ordering::SeqCst), 1);
    assert_eq!(b_dead.load(Ordering::SeqCst), 0);
    // Later candidates never invoked
    assert_eq!(c_made.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_factory_is_deterministic() {
    for _ in 0..3 {
        let mut factory = AdapterFactory::new();
        let adapter = factory
            .create_player(StubSurface::new().into_shared())
            .await
            .unwrap();
        assert_eq!(adapter.name(), "hls");
    }
}

#[tokio::test]
async fn test_factory_aggregate_error_names_all_attempts() {
    let dead = Arc::new(AtomicU32::new(0));
    let mut factory = AdapterFactory::with_candidates(vec![
        scripted_candidate("a", ScriptedOutcome::Fail, Arc::new(AtomicU32::new(0)), Arc::clone(&dead)),
        scripted_candidate("b", ScriptedOutcome::Decline, Arc::new(AtomicU32::new(0)), Arc::clone(&dead)),
        scripted_candidate("c", ScriptedOutcome::Fail, Arc::new(AtomicU32::new(0)), Arc::clone(&dead)),
    ]);

    match factory.create_player(StubSurface::new().into_shared()).await {
        Ok(adapter) => panic!("unexpected engine {}", adapter.name()),
        Err(Error::NoPlayableEngine { attempted }) => assert_eq!(attempted, "a, b, c"),
        Err(other) => panic!("unexpected error: {other}"),
    }
    // Every failed candidate was torn down
    assert_eq!(dead.load(Ordering::SeqCst), 3);
}

// =============================================================================
// Uniform Track Semantics Across Engines
// =============================================================================

fn surface_with_tracks() -> finstream_core::SharedSurface {
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
                    language: "de".into(),
                    label: "Deutsch".into(),
                    channels: Some(2),
                },
            ],
            vec![
                SubtitleTrackInfo {
                    id: 0,
                    language: "en".into(),
                    label: "English".into(),
                    kind: Some("subtitles".into()),
                },
                SubtitleTrackInfo {
                    id: 1,
                    language: "de".into(),
                    label: "Deutsch".into(),
                    kind: Some("subtitles".into()),
                },
            ],
        )
        .into_shared()
}

struct IdlePipeline;

impl finstream_core::PlatformPipeline for IdlePipeline {
    fn open(&mut self, _url: &Url) -> Result<()> {
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        false
    }
}

async fn loaded_adapters() -> Vec<Box<dyn PlayerAdapter>> {
    let url = Url::parse("https://example.com/movie.mp4").unwrap();
    let mut adapters: Vec<Box<dyn PlayerAdapter>> = vec![
        Box::new(Html5Adapter::new(surface_with_tracks())),
        Box::new(NativeAdapter::new(
            surface_with_tracks(),
            Some(Box::new(IdlePipeline)),
        )),
    ];
    for adapter in adapters.iter_mut() {
        assert!(adapter.initialize().await.unwrap());
        adapter.load(&url, LoadOptions::default()).await.unwrap();
    }
    adapters
}

#[tokio::test]
async fn test_subtitle_off_sentinel_uniform_across_engines() {
    for mut adapter in loaded_adapters().await {
        assert!(adapter.select_subtitle_track(1));
        assert_eq!(adapter.active_subtitle_track(), Some(1));

        assert!(adapter.select_subtitle_track(SUBTITLE_TRACK_OFF));
        assert_eq!(
            adapter.active_subtitle_track(),
            None,
            "engine {} kept a subtitle active after -1",
            adapter.name()
        );
    }

    // The streaming engine honors the sentinel even before any media is
    // loaded; disabling subtitles is never an error
    let mut hls = HlsAdapter::new(StubSurface::new().into_shared());
    assert!(hls.initialize().await.unwrap());
    assert!(hls.select_subtitle_track(SUBTITLE_TRACK_OFF));
    assert_eq!(hls.active_subtitle_track(), None);
}

#[tokio::test]
async fn test_out_of_range_audio_uniform_across_engines() {
    for mut adapter in loaded_adapters().await {
        let before = adapter.active_audio_track();
        assert!(!adapter.select_audio_track(99));
        assert!(!adapter.select_audio_track(-2));
        assert_eq!(
            adapter.active_audio_track(),
            before,
            "engine {} changed its active track on a rejected id",
            adapter.name()
        );
    }
}

#[tokio::test]
async fn test_destroy_then_operations_error_uniformly() {
    for mut adapter in loaded_adapters().await {
        adapter.destroy().await.unwrap();
        assert_eq!(adapter.state(), AdapterState::Destroyed);
        assert!(adapter.play().is_err());
        assert!(adapter.seek(10.0).is_err());
        assert!(adapter.audio_tracks().is_empty());
        // Destroy again is a no-op
        adapter.destroy().await.unwrap();
    }
}

// =============================================================================
// Error Event Channel
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_metadata_stall_fires_error_event() {
    use std::sync::Mutex;

    let surface = StubSurface::new().without_metadata().into_shared();
    let mut adapter = Html5Adapter::new(surface);
    adapter.initialize().await.unwrap();

    let seen: Arc<Mutex<Vec<(String, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        adapter.on(
            PlayerEventKind::Error,
            Box::new(move |event| {
                if let PlayerEvent::Error { code, fatal, .. } = event {
                    seen.lock().unwrap().push((code.clone(), *fatal));
                }
            }),
        );
    }

    let url = Url::parse("https://example.com/video.mp4").unwrap();
    let err = adapter
        .load(&url, LoadOptions::default())
        .await
        .expect_err("load should time out waiting for metadata");
    assert_eq!(err.error_code(), "MEDIA_LOAD");

    // The fault was surfaced through the event channel, marked recoverable
    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[("MEDIA_LOAD".to_string(), false)]);
}

// =============================================================================
// Adapter Futures Are Spawnable
// =============================================================================

#[tokio::test]
async fn test_adapter_load_runs_on_a_spawned_task() {
    let handle = tokio::spawn(async {
        let mut adapter = Html5Adapter::new(StubSurface::new().into_shared());
        adapter.initialize().await.unwrap();
        let url = Url::parse("https://example.com/video.mp4").unwrap();
        adapter.load(&url, LoadOptions::default()).await.unwrap();
        adapter.name()
    });
    assert_eq!(handle.await.unwrap(), "html5");
}

// =============================================================================
// Streaming Engine Environment Gate
// =============================================================================

#[tokio::test]
async fn test_streaming_engine_requires_buffer_fed_surface() {
    let mut adapter = HlsAdapter::new(StubSurface::new().without_media_source().into_shared());
    assert_eq!(adapter.initialize().await.unwrap(), false);
    // Declined engine can be retried on a capable surface after teardown
    let mut adapter = HlsAdapter::new(StubSurface::new().into_shared());
    assert!(adapter.initialize().await.unwrap());
}
