//! In-process rendering engine used by tests and the `simulate` command.
//!
//! The simulated engine models just enough of a real tileset renderer to close
//! the feedback loop: every shown tileset contributes a point load derived from
//! its screen-space error and point budget, and the frame time grows linearly
//! with the total load. Lowering the preset therefore raises the frame rate,
//! which is what the frame-rate monitor reacts to.
//!
//! # Example
//!
//! ```
//! use scanview::engine::{RenderEngine, SimulatedEngine};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(SimulatedEngine::with_defaults());
//! engine.reject_url("https://example.invalid/broken/tileset.json");
//! assert_eq!(engine.scene_len(), 0);
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{
    BoxFuture, EngineError, EngineTileset, FrameListener, HeadingPitchRange, ListenerId,
    RenderEngine, TilesetParams, TilesetStatistics,
};
use crate::preset::Preset;
use crate::registry::resolve_params;
use crate::settings::CullingState;

/// Screen-space error at which a dataset shows every point.
const FULL_DETAIL_SSE: f64 = 8.0;

/// Bytes per point on the GPU (xyz f32 + rgb u8).
const BYTES_PER_POINT: u64 = 15;

/// Extra load carried when siblings and hidden tiles are retained.
const RETAINED_LOAD_FACTOR: f64 = 1.25;

/// Tunables for the simulated GPU.
#[derive(Debug, Clone)]
pub struct SimulationProfile {
    /// Points the simulated GPU draws per second.
    pub points_per_second: f64,
    /// Points each dataset holds at full resolution.
    pub dataset_points: u64,
    /// Frame rate ceiling (vsync).
    pub max_fps: f64,
    /// Artificial latency before a load resolves.
    pub load_latency: Duration,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            points_per_second: 30_000_000.0,
            dataset_points: 4_000_000,
            max_fps: 60.0,
            load_latency: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
struct TilesetState {
    params: TilesetParams,
    shown: bool,
    trims: u32,
}

/// A dataset materialized by [`SimulatedEngine`].
#[derive(Debug)]
pub struct SimulatedTileset {
    url: String,
    full_points: u64,
    state: Mutex<TilesetState>,
}

impl SimulatedTileset {
    fn new(url: &str, full_points: u64) -> Self {
        Self {
            url: url.to_string(),
            full_points,
            state: Mutex::new(TilesetState {
                params: resolve_params(Preset::DEFAULT.bundle(), CullingState::default()),
                shown: true,
                trims: 0,
            }),
        }
    }

    /// URL this tileset was loaded from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of times `trim_loaded_tiles` was called.
    pub fn trim_count(&self) -> u32 {
        self.state.lock().trims
    }

    fn loaded_points(&self, params: &TilesetParams) -> u64 {
        let detail = (FULL_DETAIL_SSE / params.maximum_screen_space_error.max(1.0)).min(1.0);
        let mut points = self.full_points as f64 * detail * detail;
        if params.load_siblings {
            points *= RETAINED_LOAD_FACTOR;
        }
        (points as u64).min(params.point_budget)
    }
}

impl EngineTileset for SimulatedTileset {
    fn apply_params(&self, params: &TilesetParams) {
        self.state.lock().params = *params;
    }

    fn params(&self) -> TilesetParams {
        self.state.lock().params
    }

    fn set_show(&self, show: bool) {
        self.state.lock().shown = show;
    }

    fn is_shown(&self) -> bool {
        self.state.lock().shown
    }

    fn trim_loaded_tiles(&self) {
        self.state.lock().trims += 1;
    }

    fn ready(&self) -> BoxFuture<'_, Result<(), EngineError>> {
        Box::pin(async { Ok(()) })
    }

    fn statistics(&self) -> TilesetStatistics {
        let state = self.state.lock();
        let points = if state.shown {
            self.loaded_points(&state.params)
        } else {
            0
        };
        TilesetStatistics {
            points_loaded: points,
            geometry_bytes: points * BYTES_PER_POINT,
            texture_bytes: 0,
        }
    }
}

/// Record of the last camera framing request.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRecord {
    /// URL of the framed dataset.
    pub url: String,
    pub view: HeadingPitchRange,
}

/// In-process [`RenderEngine`] implementation.
pub struct SimulatedEngine {
    profile: SimulationProfile,
    rejected: Mutex<HashSet<String>>,
    created: Mutex<Vec<Arc<SimulatedTileset>>>,
    scene: Mutex<Vec<Arc<dyn EngineTileset>>>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn FrameListener>)>>,
    next_listener: AtomicU64,
    frames_rendered: AtomicU64,
    render_requests: AtomicU64,
    debug_frustum: AtomicBool,
    fail_navigation: AtomicBool,
    last_navigation: Mutex<Option<NavigationRecord>>,
}

impl std::fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedEngine")
            .field("profile", &self.profile)
            .field("scene_len", &self.scene_len())
            .field("frames_rendered", &self.frames_rendered())
            .finish_non_exhaustive()
    }
}

impl SimulatedEngine {
    pub fn new(profile: SimulationProfile) -> Self {
        Self {
            profile,
            rejected: Mutex::new(HashSet::new()),
            created: Mutex::new(Vec::new()),
            scene: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            frames_rendered: AtomicU64::new(0),
            render_requests: AtomicU64::new(0),
            debug_frustum: AtomicBool::new(false),
            fail_navigation: AtomicBool::new(false),
            last_navigation: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SimulationProfile::default())
    }

    /// Make every future load of `url` fail.
    pub fn reject_url(&self, url: impl Into<String>) {
        self.rejected.lock().insert(url.into());
    }

    /// Make camera framing requests fail.
    pub fn set_navigation_failure(&self, fail: bool) {
        self.fail_navigation.store(fail, Ordering::Relaxed);
    }

    /// Tilesets created so far, in creation order.
    pub fn created_tilesets(&self) -> Vec<Arc<SimulatedTileset>> {
        self.created.lock().clone()
    }

    /// Tileset created from `url`, if any.
    pub fn tileset_for(&self, url: &str) -> Option<Arc<SimulatedTileset>> {
        self.created.lock().iter().find(|t| t.url == url).cloned()
    }

    pub fn scene_len(&self) -> usize {
        self.scene.lock().len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn render_requests(&self) -> u64 {
        self.render_requests.load(Ordering::Relaxed)
    }

    pub fn debug_frustum_shown(&self) -> bool {
        self.debug_frustum.load(Ordering::Relaxed)
    }

    pub fn last_navigation(&self) -> Option<NavigationRecord> {
        self.last_navigation.lock().clone()
    }

    /// Total points drawn per frame across shown scene tilesets.
    pub fn visible_points(&self) -> u64 {
        self.scene
            .lock()
            .iter()
            .map(|t| t.statistics().points_loaded)
            .sum()
    }

    /// Frame rate the current scene load allows.
    pub fn estimated_fps(&self) -> f64 {
        let points = self.visible_points();
        if points == 0 {
            return self.profile.max_fps;
        }
        (self.profile.points_per_second / points as f64).min(self.profile.max_fps)
    }

    /// Time one frame takes at the current scene load.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.estimated_fps().max(0.1))
    }

    /// Render one frame and notify post-render listeners.
    pub fn render_frame(&self) {
        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
        let listeners: Vec<Arc<dyn FrameListener>> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener.on_frame_rendered();
        }
    }

    /// Render frames continuously at the rate the scene load allows.
    pub fn spawn_render_loop(self: &Arc<Self>, cancellation: CancellationToken) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            debug!("Simulated render loop started");
            loop {
                let frame = engine.frame_duration();
                tokio::select! {
                    _ = cancellation.cancelled() => break,
                    _ = tokio::time::sleep(frame) => engine.render_frame(),
                }
            }
            debug!(
                frames = engine.frames_rendered(),
                "Simulated render loop stopped"
            );
        })
    }
}

impl RenderEngine for SimulatedEngine {
    fn load_tileset(&self, url: &str) -> BoxFuture<'_, Result<Arc<dyn EngineTileset>, EngineError>> {
        let url = url.to_string();
        Box::pin(async move {
            if !self.profile.load_latency.is_zero() {
                tokio::time::sleep(self.profile.load_latency).await;
            }
            if url.is_empty() || self.rejected.lock().contains(&url) {
                return Err(EngineError::Rejected(format!("cannot fetch {}", url)));
            }
            let tileset = Arc::new(SimulatedTileset::new(&url, self.profile.dataset_points));
            self.created.lock().push(Arc::clone(&tileset));
            trace!(url = %url, "Simulated tileset created");
            Ok(tileset as Arc<dyn EngineTileset>)
        })
    }

    fn add_to_scene(&self, tileset: Arc<dyn EngineTileset>) {
        self.scene.lock().push(tileset);
    }

    fn remove_from_scene(&self, tileset: &Arc<dyn EngineTileset>) -> bool {
        let mut scene = self.scene.lock();
        let before = scene.len();
        scene.retain(|t| !std::ptr::addr_eq(Arc::as_ptr(t), Arc::as_ptr(tileset)));
        scene.len() != before
    }

    fn zoom_to(
        &self,
        tileset: &Arc<dyn EngineTileset>,
        view: HeadingPitchRange,
    ) -> Result<(), EngineError> {
        if self.fail_navigation.load(Ordering::Relaxed) {
            return Err(EngineError::Navigation("camera flight aborted".to_string()));
        }
        let url = self
            .created
            .lock()
            .iter()
            .find(|t| std::ptr::addr_eq(Arc::as_ptr(t), Arc::as_ptr(tileset)))
            .map(|t| t.url.clone())
            .ok_or_else(|| EngineError::Navigation("tileset is not part of this engine".into()))?;
        *self.last_navigation.lock() = Some(NavigationRecord { url, view });
        Ok(())
    }

    fn add_post_render_listener(&self, listener: Arc<dyn FrameListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    fn remove_post_render_listener(&self, id: ListenerId) {
        self.listeners.lock().retain(|(existing, _)| *existing != id);
    }

    fn set_debug_frustum(&self, show: bool) {
        self.debug_frustum.store(show, Ordering::Relaxed);
    }

    fn request_render(&self) {
        self.render_requests.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingListener(AtomicUsize);

    impl FrameListener for CountingListener {
        fn on_frame_rendered(&self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn test_load_and_reject() {
        let engine = SimulatedEngine::with_defaults();
        engine.reject_url("bad");

        assert!(engine.load_tileset("good").await.is_ok());
        assert!(matches!(
            engine.load_tileset("bad").await,
            Err(EngineError::Rejected(_))
        ));
        assert_eq!(engine.created_tilesets().len(), 1);
    }

    #[tokio::test]
    async fn test_lower_fidelity_raises_fps() {
        let engine = SimulatedEngine::with_defaults();
        let tileset = engine.load_tileset("a").await.unwrap();
        engine.add_to_scene(Arc::clone(&tileset));

        tileset.apply_params(&resolve_params(Preset::Ultra.bundle(), CullingState::enabled()));
        let ultra_fps = engine.estimated_fps();

        tileset.apply_params(&resolve_params(Preset::Low.bundle(), CullingState::enabled()));
        let low_fps = engine.estimated_fps();

        assert!(low_fps > ultra_fps);
    }

    #[tokio::test]
    async fn test_hidden_tilesets_cost_nothing() {
        let engine = SimulatedEngine::with_defaults();
        let tileset = engine.load_tileset("a").await.unwrap();
        engine.add_to_scene(Arc::clone(&tileset));

        tileset.set_show(false);
        assert_eq!(engine.visible_points(), 0);
        assert_eq!(engine.estimated_fps(), 60.0);
    }

    #[tokio::test]
    async fn test_remove_from_scene() {
        let engine = SimulatedEngine::with_defaults();
        let a = engine.load_tileset("a").await.unwrap();
        let b = engine.load_tileset("b").await.unwrap();
        engine.add_to_scene(Arc::clone(&a));
        engine.add_to_scene(Arc::clone(&b));

        assert!(engine.remove_from_scene(&a));
        assert!(!engine.remove_from_scene(&a));
        assert_eq!(engine.scene_len(), 1);
    }

    #[test]
    fn test_listeners_receive_frames_until_removed() {
        let engine = SimulatedEngine::with_defaults();
        let listener = Arc::new(CountingListener(AtomicUsize::new(0)));
        let id = engine.add_post_render_listener(Arc::clone(&listener) as Arc<dyn FrameListener>);

        engine.render_frame();
        engine.render_frame();
        engine.remove_post_render_listener(id);
        engine.render_frame();

        assert_eq!(listener.0.load(Ordering::Relaxed), 2);
        assert_eq!(engine.frames_rendered(), 3);
        assert_eq!(engine.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_zoom_records_target() {
        let engine = SimulatedEngine::with_defaults();
        let tileset = engine.load_tileset("castle.json").await.unwrap();

        engine.zoom_to(&tileset, HeadingPitchRange::default()).unwrap();
        let record = engine.last_navigation().unwrap();
        assert_eq!(record.url, "castle.json");

        engine.set_navigation_failure(true);
        assert!(engine.zoom_to(&tileset, HeadingPitchRange::default()).is_err());
    }
}
