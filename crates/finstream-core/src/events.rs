//! Playback event bus
//!
//! Explicit publish/subscribe with ordered handler lists per event kind.
//! The playback model is single-threaded cooperative, so dispatch is
//! synchronous and in registration order; handlers accumulate and are never
//! deduplicated.

use crate::types::Resolution;
use std::collections::HashMap;

/// Event names shared by every adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerEventKind {
    Loaded,
    Error,
    Buffering,
    QualityChange,
    AudioTrackChange,
}

/// Event payloads
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Media loaded and metadata available
    Loaded { url: String },
    /// Transient playback error; recoverable by caller-level retry
    Error {
        code: String,
        message: String,
        fatal: bool,
    },
    /// Buffer level dropped below the rebuffer threshold
    Buffering { level: f64 },
    /// Active quality/rendition changed
    QualityChange {
        bitrate: u64,
        resolution: Option<Resolution>,
    },
    /// Active audio track changed
    AudioTrackChange { track_id: i32 },
}

impl PlayerEvent {
    pub fn kind(&self) -> PlayerEventKind {
        match self {
            PlayerEvent::Loaded { .. } => PlayerEventKind::Loaded,
            PlayerEvent::Error { .. } => PlayerEventKind::Error,
            PlayerEvent::Buffering { .. } => PlayerEventKind::Buffering,
            PlayerEvent::QualityChange { .. } => PlayerEventKind::QualityChange,
            PlayerEvent::AudioTrackChange { .. } => PlayerEventKind::AudioTrackChange,
        }
    }
}

/// Subscribed event handler. `Sync` so an adapter holding the bus can be
/// shared across await points.
pub type EventHandler = Box<dyn FnMut(&PlayerEvent) + Send + Sync>;

/// Ordered per-kind handler registry
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<PlayerEventKind, Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers fire in registration order
    pub fn on(&mut self, kind: PlayerEventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Dispatch an event synchronously to every handler of its kind
    pub fn emit(&mut self, event: &PlayerEvent) {
        if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
            for handler in handlers.iter_mut() {
                handler(event);
            }
        }
    }

    /// Drop every subscription; used by `destroy()` so no handler outlives
    /// the adapter
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: PlayerEventKind) -> usize {
        self.handlers.get(&kind).map(|h| h.len()).unwrap_or(0)
    }
}
