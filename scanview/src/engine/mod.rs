//! Rendering-engine collaborator interface.
//!
//! The controller never renders anything itself. It supplies parameters to the
//! engine's streamed tilesets and listens to the engine's per-frame signal.
//! This module describes the minimum capability surface it needs:
//!
//! - [`RenderEngine`]: dataset factory, scene collection, camera framing,
//!   post-render notifications, debug overlay and render requests
//! - [`EngineTileset`]: one engine-managed dataset with adjustable budget
//!   parameters, visibility, a trim operation and a readiness signal
//! - [`FrameListener`]: receiver of post-render notifications
//!
//! # Dyn Compatibility
//!
//! Async methods return [`BoxFuture`] so both traits can be used as
//! `Arc<dyn ...>` trait objects.

pub mod simulated;

use std::f64::consts::FRAC_PI_4;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

pub use simulated::{SimulatedEngine, SimulatedTileset, SimulationProfile};

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by the rendering engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine refused to materialize a dataset.
    #[error("Engine rejected request: {0}")]
    Rejected(String),

    /// The camera could not frame the requested object.
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// A tileset never became ready.
    #[error("Tileset not ready: {0}")]
    NotReady(String),
}

/// Identifier returned when registering a post-render listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Camera framing descriptor (radians, metres).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingPitchRange {
    pub heading: f64,
    pub pitch: f64,
    /// Distance from the target; `0.0` lets the engine pick a range that fits.
    pub range: f64,
}

impl HeadingPitchRange {
    pub fn new(heading: f64, pitch: f64, range: f64) -> Self {
        Self {
            heading,
            pitch,
            range,
        }
    }
}

impl Default for HeadingPitchRange {
    /// Looking north, 45° down, engine-chosen range.
    fn default() -> Self {
        Self::new(0.0, -FRAC_PI_4, 0.0)
    }
}

/// Point-cloud shading parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PointCloudShading {
    pub attenuation: bool,
    pub geometric_error_scale: f64,
    pub maximum_attenuation: f64,
    pub eye_dome_lighting: bool,
    pub eye_dome_lighting_strength: f64,
    pub eye_dome_lighting_radius: f64,
}

/// Concrete parameter values written to an engine tileset.
///
/// Produced by [`crate::registry::resolve_params`] from a preset bundle and
/// the culling state; engines copy the values onto their native object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TilesetParams {
    // Culling-dependent
    pub maximum_memory_usage_mb: u32,
    pub maximum_cache_size: u32,
    pub skip_level_of_detail: bool,
    pub immediately_load_desired_level_of_detail: bool,
    pub load_siblings: bool,
    pub preload_when_hidden: bool,
    pub preload_flight_destinations: bool,
    pub cull_requests_while_moving: bool,

    // Preset-dependent
    pub maximum_screen_space_error: f64,
    pub dynamic_screen_space_error: bool,
    pub dynamic_screen_space_error_density: f64,
    pub dynamic_screen_space_error_factor: f64,
    pub foveated_screen_space_error: bool,
    pub foveated_cone_size: f64,
    pub foveated_time_delay: f64,
    pub point_cloud_shading: PointCloudShading,
    pub point_budget: u64,

    // Fixed
    pub prefer_leaves: bool,
    pub progressive_resolution_height_fraction: f64,
}

/// Load statistics reported by an engine tileset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TilesetStatistics {
    /// Points currently loaded.
    pub points_loaded: u64,
    /// GPU geometry memory in bytes.
    pub geometry_bytes: u64,
    /// GPU texture memory in bytes.
    pub texture_bytes: u64,
}

/// Receiver of post-render notifications.
pub trait FrameListener: Send + Sync {
    /// Called once after every rendered frame.
    fn on_frame_rendered(&self);
}

/// One engine-managed streamed dataset.
pub trait EngineTileset: Send + Sync {
    /// Overwrite every adjustable parameter with the given values.
    fn apply_params(&self, params: &TilesetParams);

    /// Current parameter values.
    fn params(&self) -> TilesetParams;

    /// Show or hide the dataset.
    fn set_show(&self, show: bool);

    /// Whether the dataset is currently shown.
    fn is_shown(&self) -> bool;

    /// Evict loaded tile data that is not needed for the current view.
    fn trim_loaded_tiles(&self);

    /// Resolves once the dataset's root tile is available.
    fn ready(&self) -> BoxFuture<'_, Result<(), EngineError>>;

    /// Current load statistics.
    fn statistics(&self) -> TilesetStatistics;
}

/// The rendering engine as seen by the controller.
pub trait RenderEngine: Send + Sync {
    /// Materialize a dataset from a tileset URL.
    ///
    /// The URL is opaque to the controller and passed through unchanged.
    fn load_tileset(&self, url: &str) -> BoxFuture<'_, Result<Arc<dyn EngineTileset>, EngineError>>;

    /// Add a materialized dataset to the scene.
    fn add_to_scene(&self, tileset: Arc<dyn EngineTileset>);

    /// Remove a dataset from the scene. Returns false if it was not there.
    fn remove_from_scene(&self, tileset: &Arc<dyn EngineTileset>) -> bool;

    /// Move the camera so it frames `tileset` from the given angle.
    fn zoom_to(
        &self,
        tileset: &Arc<dyn EngineTileset>,
        view: HeadingPitchRange,
    ) -> Result<(), EngineError>;

    /// Register a post-render listener.
    fn add_post_render_listener(&self, listener: Arc<dyn FrameListener>) -> ListenerId;

    /// Unregister a post-render listener. Unknown ids are ignored.
    fn remove_post_render_listener(&self, id: ListenerId);

    /// Toggle the frustum debug overlay.
    fn set_debug_frustum(&self, show: bool);

    /// Ask the engine to render a new frame with the current parameters.
    fn request_render(&self);
}
