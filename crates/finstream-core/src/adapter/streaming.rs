//! Manifest-driven adaptive streaming engine
//!
//! Fetches and parses HLS master playlists, feeds the surface the selected
//! rendition, and runs a conservative bandwidth-based ABR loop: upgrades only
//! after a stability window of consistently sufficient throughput with buffer
//! headroom, downgrades immediately when the estimate drops below the current
//! rendition's requirement.

use super::{apply_initial_tracks, AdapterCore, PlayerAdapter};
use crate::{
    error::{Error, Result},
    events::{EventHandler, PlayerEvent, PlayerEventKind},
    surface::SharedSurface,
    types::{AdapterState, AudioTrackInfo, LoadOptions, Resolution, SubtitleTrackInfo},
};
use async_trait::async_trait;
use bytes::Bytes;
use m3u8_rs::{AlternativeMediaType, Playlist};
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client with a bounded per-request timeout
fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// ABR tuning knobs
#[derive(Debug, Clone)]
pub struct AbrConfig {
    /// Buffer seconds required before an upgrade is considered
    pub min_buffer_for_upgrade: f64,
    /// Buffer level below which a `Buffering` event fires
    pub rebuffer_threshold: f64,
    /// Fraction of the bandwidth estimate a candidate rendition may consume;
    /// below 1.0 this makes upgrades conservative
    pub upgrade_safety_factor: f64,
    /// Fraction of the estimate the current rendition may consume before an
    /// immediate downgrade
    pub downgrade_safety_factor: f64,
    /// Consecutive favorable samples required before upgrading
    pub upgrade_stability_window: u32,
    /// EWMA smoothing weight for new throughput samples
    pub estimate_alpha: f64,
}

impl Default for AbrConfig {
    fn default() -> Self {
        Self {
            min_buffer_for_upgrade: 10.0,
            rebuffer_threshold: 2.0,
            upgrade_safety_factor: 0.7,
            downgrade_safety_factor: 0.95,
            upgrade_stability_window: 3,
            estimate_alpha: 0.3,
        }
    }
}

/// Segment fetch retry schedule: exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter applied to each delay, e.g. 0.2 for +/-20%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given retry attempt (attempt 1 is the first retry)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        capped.mul_f64((1.0 + jitter).max(0.0))
    }
}

/// Streaming engine configuration
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    pub abr: AbrConfig,
    pub retry: RetryPolicy,
}

/// One rendition from the master playlist
#[derive(Debug, Clone)]
pub struct HlsVariant {
    pub uri: Url,
    pub bandwidth: u64,
    pub resolution: Option<Resolution>,
    pub codecs: Option<String>,
}

/// Bandwidth-driven rendition selection.
///
/// Tracks an EWMA throughput estimate from segment downloads. Selection is
/// asymmetric: downgrades take effect on the next evaluation, upgrades wait
/// for `upgrade_stability_window` consecutive favorable samples plus buffer
/// headroom.
pub struct AbrController {
    config: AbrConfig,
    estimate_bps: f64,
    current: usize,
    favorable_samples: u32,
}

impl AbrController {
    pub fn new(config: AbrConfig) -> Self {
        Self {
            config,
            estimate_bps: 0.0,
            current: 0,
            favorable_samples: 0,
        }
    }

    /// Start over for a fresh load: lowest rendition, no history
    pub fn reset(&mut self) {
        self.estimate_bps = 0.0;
        self.current = 0;
        self.favorable_samples = 0;
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn estimate_bps(&self) -> f64 {
        self.estimate_bps
    }

    /// Fold a segment download into the throughput estimate
    pub fn record_sample(&mut self, bytes: usize, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        if secs <= 0.0 {
            return;
        }
        let sample_bps = (bytes as f64 * 8.0) / secs;
        if self.estimate_bps == 0.0 {
            self.estimate_bps = sample_bps;
        } else {
            self.estimate_bps = self.config.estimate_alpha * sample_bps
                + (1.0 - self.config.estimate_alpha) * self.estimate_bps;
        }
    }

    /// Pick the rendition for the next segment. Returns `Some(index)` when a
    /// switch should happen. `variants` must be sorted ascending by bandwidth.
    pub fn evaluate(&mut self, variants: &[HlsVariant], buffer_level: f64) -> Option<usize> {
        if variants.len() < 2 || self.estimate_bps == 0.0 {
            return None;
        }
        let current_bw = variants[self.current].bandwidth as f64;

        // Immediate downgrade when the estimate no longer carries the
        // current rendition
        if current_bw > self.estimate_bps * self.config.downgrade_safety_factor {
            self.favorable_samples = 0;
            let target = variants
                .iter()
                .rposition(|v| {
                    (v.bandwidth as f64) <= self.estimate_bps * self.config.downgrade_safety_factor
                })
                .unwrap_or(0);
            if target != self.current {
                debug!(
                    from = self.current,
                    to = target,
                    estimate_bps = self.estimate_bps as u64,
                    "ABR downgrade"
                );
                self.current = target;
                return Some(target);
            }
            return None;
        }

        // Conservative upgrade path
        let next = self.current + 1;
        if next >= variants.len() {
            self.favorable_samples = 0;
            return None;
        }
        let next_bw = variants[next].bandwidth as f64;
        let headroom_ok = next_bw <= self.estimate_bps * self.config.upgrade_safety_factor;
        let buffer_ok = buffer_level >= self.config.min_buffer_for_upgrade;

        if headroom_ok && buffer_ok {
            self.favorable_samples += 1;
            if self.favorable_samples >= self.config.upgrade_stability_window {
                debug!(
                    from = self.current,
                    to = next,
                    estimate_bps = self.estimate_bps as u64,
                    "ABR upgrade"
                );
                self.favorable_samples = 0;
                self.current = next;
                return Some(next);
            }
        } else {
            self.favorable_samples = 0;
        }
        None
    }
}

/// Adaptive streaming adapter backed by a buffer-fed surface.
///
/// First choice in the default engine order; requires the surface to support
/// buffer-fed playback, otherwise `initialize()` declines with `Ok(false)`.
pub struct HlsAdapter {
    core: AdapterCore,
    config: HlsConfig,
    http: reqwest::Client,
    abr: AbrController,
    variants: Vec<HlsVariant>,
    manifest_url: Option<Url>,
}

impl HlsAdapter {
    pub fn new(surface: SharedSurface) -> Self {
        Self::with_config(surface, HlsConfig::default())
    }

    pub fn with_config(surface: SharedSurface, config: HlsConfig) -> Self {
        let abr = AbrController::new(config.abr.clone());
        Self {
            core: AdapterCore::new("hls", surface),
            config,
            http: http_client(),
            abr,
            variants: Vec::new(),
            manifest_url: None,
        }
    }

    /// Renditions of the current load, ascending by bandwidth
    pub fn variants(&self) -> &[HlsVariant] {
        &self.variants
    }

    pub fn bandwidth_estimate_bps(&self) -> f64 {
        self.abr.estimate_bps()
    }

    /// Fetch a playlist or segment with the retry schedule
    async fn fetch_with_retry(&self, url: &Url) -> Result<Bytes> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_fetch(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if attempt < self.config.retry.max_attempts => {
                    let delay = self.config.retry.delay_for(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_fetch(&self, url: &Url) -> Result<Bytes> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestFetch(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }
        Ok(response.bytes().await?)
    }

    /// Record a finished segment download and re-evaluate the rendition.
    /// Emits `QualityChange` on a switch and `Buffering` when the buffer has
    /// drained below the rebuffer threshold.
    pub fn record_throughput(&mut self, bytes: usize, elapsed: Duration, buffer_level: f64) {
        self.abr.record_sample(bytes, elapsed);
        if buffer_level < self.config.abr.rebuffer_threshold {
            self.core.emit(&PlayerEvent::Buffering {
                level: buffer_level,
            });
        }
        if let Some(index) = self.abr.evaluate(&self.variants, buffer_level) {
            let variant = self.variants[index].clone();
            self.core.emit(&PlayerEvent::QualityChange {
                bitrate: variant.bandwidth,
                resolution: variant.resolution,
            });
        }
    }

    fn parse_manifest(
        &self,
        manifest_url: &Url,
        raw: &[u8],
    ) -> Result<(Vec<HlsVariant>, Vec<AudioTrackInfo>, Vec<SubtitleTrackInfo>)> {
        let playlist = m3u8_rs::parse_playlist_res(raw)
            .map_err(|_| Error::ManifestParse(format!("unparseable playlist at {manifest_url}")))?;

        match playlist {
            Playlist::MasterPlaylist(master) => {
                let mut variants = Vec::new();
                for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
                    let uri = manifest_url
                        .join(&variant.uri)
                        .map_err(|e| Error::ManifestParse(format!("bad variant uri: {e}")))?;
                    variants.push(HlsVariant {
                        uri,
                        bandwidth: variant.bandwidth,
                        resolution: variant.resolution.map(|r| Resolution {
                            width: r.width as u32,
                            height: r.height as u32,
                        }),
                        codecs: variant.codecs.clone(),
                    });
                }
                if variants.is_empty() {
                    return Err(Error::ManifestParse(format!(
                        "master playlist at {manifest_url} has no usable variants"
                    )));
                }
                variants.sort_by_key(|v| v.bandwidth);

                let audio = collect_audio_tracks(&master.alternatives);
                let subtitles = collect_subtitle_tracks(&master.alternatives);
                Ok((variants, audio, subtitles))
            }
            // A bare media playlist is treated as a single-rendition stream
            Playlist::MediaPlaylist(_) => Ok((
                vec![HlsVariant {
                    uri: manifest_url.clone(),
                    bandwidth: 0,
                    resolution: None,
                    codecs: None,
                }],
                vec![default_audio_track()],
                Vec::new(),
            )),
        }
    }
}

/// Audio renditions deduplicated by language; the first listed per language
/// wins
fn collect_audio_tracks(alternatives: &[m3u8_rs::AlternativeMedia]) -> Vec<AudioTrackInfo> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::new();
    for alt in alternatives
        .iter()
        .filter(|a| a.media_type == AlternativeMediaType::Audio)
    {
        let language = alt.language.clone().unwrap_or_else(|| "und".into());
        if !seen.insert(language.clone()) {
            continue;
        }
        let channels = alt.channels.as_deref().and_then(|c| c.parse().ok());
        tracks.push(AudioTrackInfo {
            id: tracks.len() as i32,
            language,
            label: alt.name.clone(),
            channels,
        });
    }
    if tracks.is_empty() {
        tracks.push(default_audio_track());
    }
    tracks
}

fn collect_subtitle_tracks(alternatives: &[m3u8_rs::AlternativeMedia]) -> Vec<SubtitleTrackInfo> {
    alternatives
        .iter()
        .filter(|a| a.media_type == AlternativeMediaType::Subtitles)
        .enumerate()
        .map(|(i, alt)| SubtitleTrackInfo {
            id: i as i32,
            language: alt.language.clone().unwrap_or_else(|| "und".into()),
            label: alt.name.clone(),
            kind: Some("subtitles".into()),
        })
        .collect()
}

fn default_audio_track() -> AudioTrackInfo {
    AudioTrackInfo {
        id: 0,
        language: "und".into(),
        label: "Default".into(),
        channels: None,
    }
}

#[async_trait]
impl PlayerAdapter for HlsAdapter {
    fn name(&self) -> &'static str {
        self.core.name()
    }

    fn state(&self) -> AdapterState {
        self.core.state()
    }

    #[instrument(skip(self), fields(engine = "hls"))]
    async fn initialize(&mut self) -> Result<bool> {
        self.core.transition(AdapterState::Initializing)?;
        let supported = self.core.surface()?.supports_media_source();
        if supported {
            self.core.transition(AdapterState::Ready)?;
            info!(session = %self.core.session(), "Streaming engine ready");
            Ok(true)
        } else {
            debug!("Surface lacks buffer-fed playback, declining");
            self.core.transition(AdapterState::Uninitialized)?;
            Ok(false)
        }
    }

    #[instrument(skip(self, options), fields(engine = "hls", url = %url))]
    async fn load(&mut self, url: &Url, options: LoadOptions) -> Result<()> {
        self.core.require_loadable()?;

        let raw = match self.fetch_with_retry(url).await {
            Ok(raw) => raw,
            Err(err) => {
                self.core.emit_error(&err);
                return Err(err);
            }
        };
        let (variants, audio, subtitles) = match self.parse_manifest(url, &raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.core.emit_error(&err);
                return Err(err);
            }
        };

        self.abr.reset();
        let initial = &variants[self.abr.current_index()];
        info!(
            variants = variants.len(),
            initial_bandwidth = initial.bandwidth,
            "Manifest parsed, starting at lowest rendition"
        );

        self.core.surface()?.attach_source(&initial.uri);
        self.core.wait_for_metadata().await?;

        self.variants = variants;
        self.manifest_url = Some(url.clone());
        self.core.set_tracks(audio, subtitles);
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

    // Selection is language-level: the engine swaps the audio rendition on
    // the next segment boundary, no surface index to push
    fn select_audio_track(&mut self, id: i32) -> bool {
        self.core.select_audio_track(id)
    }

    fn select_subtitle_track(&mut self, id: i32) -> bool {
        self.core.select_subtitle_track(id)
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

    #[instrument(skip(self), fields(engine = "hls"))]
    async fn destroy(&mut self) -> Result<()> {
        self.variants.clear();
        self.manifest_url = None;
        self.core.destroy();
        Ok(())
    }
}
