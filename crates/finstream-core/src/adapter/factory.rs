//! Engine selection with ordered fallback
//!
//! Tries each candidate engine in a fixed order against the target surface
//! and returns the first one whose `initialize()` answers `Ok(true)`.
//! A candidate that declines or errors is torn down before the next one is
//! tried; only when every candidate fails does the factory report an error.

use super::{Html5Adapter, NativeAdapter, PlatformPipeline, PlayerAdapter};
use crate::adapter::HlsAdapter;
use crate::error::{Error, Result};
use crate::surface::SharedSurface;
use tracing::{debug, info, warn};

/// Constructor for one candidate engine bound to a surface
pub type AdapterCandidate = Box<dyn FnMut(SharedSurface) -> Box<dyn PlayerAdapter> + Send>;

/// Ordered engine factory.
///
/// Default order: adaptive streaming, then the platform pipeline, then the
/// progressive floor. Selection is deterministic for a given environment and
/// stops at the first success.
pub struct AdapterFactory {
    candidates: Vec<AdapterCandidate>,
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self::with_pipeline(None)
    }

    /// Default candidate order, threading an optional platform pipeline into
    /// the native engine. The pipeline handle moves into the native candidate
    /// on its first (and only) construction.
    pub fn with_pipeline(pipeline: Option<Box<dyn PlatformPipeline>>) -> Self {
        let mut pipeline = pipeline;
        let candidates: Vec<AdapterCandidate> = vec![
            Box::new(|surface| Box::new(HlsAdapter::new(surface)) as Box<dyn PlayerAdapter>),
            Box::new(move |surface| {
                Box::new(NativeAdapter::new(surface, pipeline.take())) as Box<dyn PlayerAdapter>
            }),
            Box::new(|surface| Box::new(Html5Adapter::new(surface)) as Box<dyn PlayerAdapter>),
        ];
        Self { candidates }
    }

    /// Custom candidate order
    pub fn with_candidates(candidates: Vec<AdapterCandidate>) -> Self {
        Self { candidates }
    }

    /// Try each candidate in order and return the first engine that
    /// initializes successfully.
    ///
    /// A candidate that declines (`Ok(false)`) or errors is destroyed before
    /// the next is tried; its error is logged, never propagated. If every
    /// candidate fails the result is [`Error::NoPlayableEngine`] naming all
    /// attempted engines.
    pub async fn create_player(&mut self, surface: SharedSurface) -> Result<Box<dyn PlayerAdapter>> {
        let mut attempted = Vec::new();

        for candidate in self.candidates.iter_mut() {
            let mut adapter = candidate(surface.clone());
            let name = adapter.name();
            attempted.push(name);

            match adapter.initialize().await {
                Ok(true) => {
                    info!(engine = name, "Selected playback engine");
                    return Ok(adapter);
                }
                Ok(false) => {
                    debug!(engine = name, "Engine declined, trying next");
                }
                Err(err) => {
                    warn!(engine = name, error = %err, "Engine failed to initialize, trying next");
                }
            }
            if let Err(err) = adapter.destroy().await {
                warn!(engine = name, error = %err, "Failed-candidate teardown error");
            }
        }

        Err(Error::NoPlayableEngine {
            attempted: attempted.join(", "),
        })
    }
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new()
    }
}
