//! Media server playback negotiation
//!
//! Posts the device profile to the server's PlaybackInfo endpoint and turns
//! the response into a concrete playback URL: direct play when the server
//! allows it, direct stream next, transcoded stream as the fallback.
//! Field names are the server's wire schema, hence the PascalCase renames.

use crate::error::{Error, Result};
use crate::profile::DeviceProfile;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Server time unit: 100-nanosecond ticks
pub const TICKS_PER_SECOND: i64 = 10_000_000;

pub fn seconds_to_ticks(seconds: f64) -> i64 {
    (seconds * TICKS_PER_SECOND as f64) as i64
}

pub fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// Request body for the PlaybackInfo endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoRequest {
    pub user_id: String,
    pub device_profile: DeviceProfile,
    pub max_streaming_bitrate: u64,
    pub start_time_ticks: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source_id: Option<String>,
    pub auto_open_live_stream: bool,
}

/// One stream inside a media source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStream {
    #[serde(rename = "Type")]
    pub stream_type: String,
    pub index: i32,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub channels: Option<u32>,
}

/// One playable version of an item, with the server's delivery decision
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceInfo {
    pub id: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub supports_direct_play: bool,
    #[serde(default)]
    pub supports_direct_stream: bool,
    #[serde(default)]
    pub supports_transcoding: bool,
    #[serde(default)]
    pub direct_stream_url: Option<String>,
    #[serde(default)]
    pub transcoding_url: Option<String>,
    #[serde(default)]
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub media_streams: Vec<MediaStream>,
}

impl MediaSourceInfo {
    /// Resolve the playback URL for this source against the server base,
    /// preferring direct play, then direct stream, then transcoding
    pub fn playback_url(&self, base_url: &Url, token: &str) -> Result<PlaybackPlan> {
        if self.supports_direct_play {
            let container = self.container.as_deref().unwrap_or("mp4");
            let mut url = base_url
                .join(&format!("Videos/{}/stream.{}", self.id, container))
                .map_err(|e| Error::Internal(format!("bad direct play url: {e}")))?;
            url.query_pairs_mut()
                .append_pair("Static", "true")
                .append_pair("mediaSourceId", &self.id)
                .append_pair("api_key", token);
            return Ok(PlaybackPlan {
                url,
                method: DeliveryMethod::DirectPlay,
            });
        }
        if self.supports_direct_stream {
            if let Some(path) = &self.direct_stream_url {
                let url = base_url
                    .join(path.trim_start_matches('/'))
                    .map_err(|e| Error::Internal(format!("bad direct stream url: {e}")))?;
                return Ok(PlaybackPlan {
                    url,
                    method: DeliveryMethod::DirectStream,
                });
            }
        }
        if let Some(path) = &self.transcoding_url {
            let url = base_url
                .join(path.trim_start_matches('/'))
                .map_err(|e| Error::Internal(format!("bad transcoding url: {e}")))?;
            return Ok(PlaybackPlan {
                url,
                method: DeliveryMethod::Transcode,
            });
        }
        Err(Error::MediaLoad(format!(
            "media source {} offers no playable delivery",
            self.id
        )))
    }
}

/// How the server will deliver the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMethod {
    DirectPlay,
    DirectStream,
    Transcode,
}

/// Resolved stream URL plus the delivery decision behind it
#[derive(Debug, Clone)]
pub struct PlaybackPlan {
    pub url: Url,
    pub method: DeliveryMethod,
}

/// Response body from the PlaybackInfo endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoResponse {
    #[serde(default)]
    pub media_sources: Vec<MediaSourceInfo>,
    pub play_session_id: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Authenticated client for the media server's playback endpoints
pub struct ServerClient {
    base_url: Url,
    token: String,
    http: reqwest::Client,
}

impl ServerClient {
    pub fn new(base_url: Url, token: impl Into<String>) -> Self {
        Self {
            base_url,
            token: token.into(),
            http: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Negotiate playback for an item: send the device profile, get back the
    /// server's delivery decision per media source
    #[instrument(skip(self, request), fields(item_id = %item_id))]
    pub async fn playback_info(
        &self,
        item_id: &str,
        request: &PlaybackInfoRequest,
    ) -> Result<PlaybackInfoResponse> {
        let url = self
            .base_url
            .join(&format!("Items/{item_id}/PlaybackInfo"))
            .map_err(|e| Error::InvalidConfig(format!("bad server base url: {e}")))?;

        debug!(url = %url, "Negotiating playback");
        let response = self
            .http
            .post(url)
            .header("X-Emby-Token", &self.token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }

        let info: PlaybackInfoResponse = response.json().await?;
        if let Some(code) = &info.error_code {
            return Err(Error::Server {
                status: status.as_u16(),
                message: format!("playback error code {code}"),
            });
        }
        info!(
            sources = info.media_sources.len(),
            session = info.play_session_id.as_deref().unwrap_or(""),
            "Playback negotiated"
        );
        Ok(info)
    }

    /// Negotiate and resolve a playback plan for the first media source
    pub async fn resolve_playback(
        &self,
        item_id: &str,
        request: &PlaybackInfoRequest,
    ) -> Result<PlaybackPlan> {
        let info = self.playback_info(item_id, request).await?;
        let source = info
            .media_sources
            .first()
            .ok_or_else(|| Error::MediaLoad(format!("item {item_id} has no media sources")))?;
        source.playback_url(&self.base_url, &self.token)
    }
}
