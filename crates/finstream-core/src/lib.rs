//! Finstream Core - Adaptive Playback Engine
//!
//! This crate provides the playback stack for media-server clients on
//! constrained TV runtimes:
//! - Runtime capability detection (codec, container, protocol probes)
//! - Device profile construction for server-side delivery negotiation
//! - A uniform player adapter contract over three playback engines
//! - Engine selection with ordered fallback
//! - Conservative bandwidth-driven ABR for the streaming engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Finstream Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Capability  │  │    Device    │  │    Server    │           │
//! │  │   Detection  │─▶│    Profile   │─▶│  Negotiation │           │
//! │  └──────────────┘  └──────────────┘  └──────┬───────┘           │
//! │                                             │                   │
//! │                    ┌────────────────────────┴───┐               │
//! │                    │      Adapter Factory       │               │
//! │                    └──┬─────────┬──────────┬────┘               │
//! │                       │         │          │                    │
//! │                 ┌─────┴───┐ ┌───┴────┐ ┌───┴────┐               │
//! │                 │   HLS   │ │ Native │ │ HTML5  │               │
//! │                 │ Adapter │ │Adapter │ │Adapter │               │
//! │                 └─────┬───┘ └───┬────┘ └───┬────┘               │
//! │                       └─────────┼──────────┘                    │
//! │                          ┌──────┴──────┐                        │
//! │                          │    Media    │                        │
//! │                          │   Surface   │                        │
//! │                          └─────────────┘                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod adapter;
pub mod api;
pub mod capabilities;
pub mod error;
pub mod events;
pub mod profile;
pub mod surface;
pub mod types;

pub use adapter::{
    AdapterCandidate, AdapterFactory, Html5Adapter, HlsAdapter, NativeAdapter, PlatformPipeline,
    PlayerAdapter,
};
pub use api::{
    DeliveryMethod, MediaSourceInfo, PlaybackInfoRequest, PlaybackInfoResponse, PlaybackPlan,
    ServerClient,
};
pub use capabilities::{Capabilities, CapabilityCache, CapabilityProbe, ProbeResponse, CAPABILITIES};
pub use error::{Error, Result};
pub use events::{EventBus, EventHandler, PlayerEvent, PlayerEventKind};
pub use profile::{build_device_profile, DeviceProfile};
pub use surface::{MediaSurface, SharedSurface, StubSurface};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the playback library with default configuration
pub fn init() {
    tracing::info!(version = VERSION, "Finstream Core initialized");
}
