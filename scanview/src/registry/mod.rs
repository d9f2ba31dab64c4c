//! Tileset registry.
//!
//! Tracks every dataset the viewer has loaded, applies preset bundles to them
//! and answers visibility and navigation requests. Datasets are kept in
//! registration order; the optional base layer (background buildings) is
//! tracked separately and marked with [`LayerKind::BaseLayer`] when it is
//! created, so nothing ever has to inspect an engine object to find it.
//!
//! # Example
//!
//! ```
//! use scanview::engine::{RenderEngine, SimulatedEngine};
//! use scanview::registry::{DatasetConfig, TilesetRegistry};
//! use scanview::settings::SharedSettings;
//! use std::sync::Arc;
//!
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! runtime.block_on(async {
//!     let engine: Arc<dyn RenderEngine> = Arc::new(SimulatedEngine::with_defaults());
//!     let registry = TilesetRegistry::new(engine, SharedSettings::default());
//!
//!     let loaded = registry
//!         .load_many(&[DatasetConfig::new("castle/tileset.json", "Castle")])
//!         .await;
//!     assert_eq!(loaded.len(), 1);
//!     assert!(registry.contains("castle"));
//! });
//! ```

mod datasets;
mod params;

pub use datasets::{scan_audit_datasets, slugify, DatasetConfig, SCAN_AUDIT_DATASETS};
pub use params::{
    resolve_params, CULLED_CACHE_SIZE, EYE_DOME_LIGHTING_RADIUS, EYE_DOME_LIGHTING_STRENGTH,
    PROGRESSIVE_RESOLUTION_HEIGHT_FRACTION, RETAINED_CACHE_SIZE, UNLIMITED_MEMORY_MB,
};

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::engine::{EngineTileset, HeadingPitchRange, RenderEngine};
use crate::error::ControllerError;
use crate::preset::PresetBundle;
use crate::settings::{CullingState, SharedSettings, ViewerSettings};

/// What role a tracked tileset plays in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    /// A user-toggleable point-cloud dataset.
    Dataset,
    /// The background layer (e.g. buildings).
    BaseLayer,
}

/// One loaded dataset.
///
/// Cloning a handle is cheap; all clones refer to the same engine object, so
/// visibility read through any clone reflects the engine's current state.
#[derive(Clone)]
pub struct TilesetHandle {
    id: String,
    name: String,
    url: String,
    kind: LayerKind,
    tileset: Arc<dyn EngineTileset>,
}

impl fmt::Debug for TilesetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilesetHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("visible", &self.is_visible())
            .finish_non_exhaustive()
    }
}

impl TilesetHandle {
    fn new(name: &str, url: &str, kind: LayerKind, tileset: Arc<dyn EngineTileset>) -> Self {
        Self {
            id: slugify(name),
            name: name.to_string(),
            url: url.to_string(),
            kind,
            tileset,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    pub fn is_base_layer(&self) -> bool {
        self.kind == LayerKind::BaseLayer
    }

    pub fn is_visible(&self) -> bool {
        self.tileset.is_shown()
    }

    /// The underlying engine object.
    pub fn tileset(&self) -> &Arc<dyn EngineTileset> {
        &self.tileset
    }
}

#[derive(Default)]
struct RegistryInner {
    datasets: Vec<TilesetHandle>,
    base_layer: Option<TilesetHandle>,
}

impl RegistryInner {
    fn tracked(&self) -> Vec<TilesetHandle> {
        self.datasets
            .iter()
            .chain(self.base_layer.iter())
            .cloned()
            .collect()
    }

    fn find(&self, id: &str) -> Option<&TilesetHandle> {
        self.datasets
            .iter()
            .chain(self.base_layer.iter())
            .find(|h| h.id == id)
    }
}

/// Registry of loaded datasets for one viewer.
///
/// Every change to the viewer's preset or culling state goes through
/// [`TilesetRegistry::update_settings`]. It holds the apply lock, and so does
/// the registration step of [`TilesetRegistry::load`]. A tracked dataset
/// therefore always carries the settings that were active when the last
/// update or load finished.
pub struct TilesetRegistry {
    engine: Arc<dyn RenderEngine>,
    settings: SharedSettings,
    inner: Mutex<RegistryInner>,
    // Lock order: apply_lock, then inner.
    apply_lock: Mutex<()>,
}

impl fmt::Debug for TilesetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TilesetRegistry")
            .field("ids", &self.ids())
            .field("settings", &self.settings.snapshot())
            .finish_non_exhaustive()
    }
}

impl TilesetRegistry {
    pub fn new(engine: Arc<dyn RenderEngine>, settings: SharedSettings) -> Self {
        Self {
            engine,
            settings,
            inner: Mutex::new(RegistryInner::default()),
            apply_lock: Mutex::new(()),
        }
    }

    /// The settings this registry applies.
    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Load one dataset and register it.
    ///
    /// The active preset and culling state are applied before the dataset is
    /// added to the scene. Loading a name that is already registered replaces
    /// the old dataset in place and removes it from the scene. Failures
    /// register nothing and are not retried.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::LoadFailure`] if the engine rejects the URL.
    pub async fn load(&self, url: &str, display_name: &str) -> Result<TilesetHandle, ControllerError> {
        let tileset = self.materialize(url, display_name).await?;
        let handle = TilesetHandle::new(display_name, url, LayerKind::Dataset, tileset);

        let replaced = {
            let _apply = self.apply_lock.lock();
            self.apply_current_unlocked(&handle);

            let mut inner = self.inner.lock();
            let replaced = match inner.datasets.iter_mut().find(|h| h.id == handle.id) {
                Some(existing) => Some(std::mem::replace(existing, handle.clone())),
                None => {
                    inner.datasets.push(handle.clone());
                    None
                }
            };
            drop(inner);

            if let Some(old) = &replaced {
                self.engine.remove_from_scene(&old.tileset);
            }
            self.engine.add_to_scene(Arc::clone(&handle.tileset));
            replaced
        };

        if let Some(old) = replaced {
            warn!(
                id = %handle.id,
                old_url = %old.url,
                new_url = url,
                "Dataset id already registered, replaced and removed old tileset from scene"
            );
        }
        info!(id = %handle.id, name = display_name, "Dataset loaded");
        Ok(handle)
    }

    /// Load several datasets concurrently.
    ///
    /// Every load runs independently; failures are logged and omitted from
    /// the result, so the returned list may be shorter than `configs`.
    pub async fn load_many(&self, configs: &[DatasetConfig]) -> Vec<TilesetHandle> {
        let results = join_all(configs.iter().map(|c| self.load(&c.url, &c.name))).await;

        let mut loaded = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(handle) => loaded.push(handle),
                Err(e) => error!(error = %e, "Dataset load failed"),
            }
        }

        if loaded.is_empty() && !configs.is_empty() {
            error!(requested = configs.len(), "Failed to load any datasets");
        } else {
            info!(
                loaded = loaded.len(),
                requested = configs.len(),
                "Dataset batch finished"
            );
        }
        loaded
    }

    /// Load the background layer.
    ///
    /// Replaces any previous base layer, which is removed from the scene.
    pub async fn load_base_layer(
        &self,
        url: &str,
        display_name: &str,
    ) -> Result<TilesetHandle, ControllerError> {
        let tileset = self.materialize(url, display_name).await?;
        let handle = TilesetHandle::new(display_name, url, LayerKind::BaseLayer, tileset);

        {
            let _apply = self.apply_lock.lock();
            self.apply_current_unlocked(&handle);
            let previous = self.inner.lock().base_layer.replace(handle.clone());
            if let Some(old) = previous {
                self.engine.remove_from_scene(&old.tileset);
                debug!(id = %old.id, url = %old.url, "Previous base layer removed");
            }
            self.engine.add_to_scene(Arc::clone(&handle.tileset));
        }

        info!(id = %handle.id, "Base layer loaded");
        Ok(handle)
    }

    async fn materialize(
        &self,
        url: &str,
        display_name: &str,
    ) -> Result<Arc<dyn EngineTileset>, ControllerError> {
        debug!(name = display_name, url, "Loading tileset");
        self.engine
            .load_tileset(url)
            .await
            .map_err(|source| ControllerError::LoadFailure {
                name: display_name.to_string(),
                url: url.to_string(),
                source,
            })
    }

    /// Apply a bundle under the given culling state to one handle.
    pub fn apply_bundle(&self, handle: &TilesetHandle, bundle: &PresetBundle, culling: CullingState) {
        let params = resolve_params(bundle, culling);
        handle.tileset.apply_params(&params);
        debug!(
            id = %handle.id,
            sse = params.maximum_screen_space_error,
            memory_mb = params.maximum_memory_usage_mb,
            culling = culling.frustum_culling_enabled,
            "Applied tileset parameters"
        );
    }

    /// Apply a bundle to every dataset and the base layer.
    ///
    /// Idempotent: parameters are recomputed from scratch each time.
    pub fn apply_bundle_to_all(&self, bundle: &PresetBundle, culling: CullingState) {
        let _apply = self.apply_lock.lock();
        self.apply_to_tracked_unlocked(bundle, culling);
    }

    /// Re-apply the active preset and culling state everywhere.
    pub fn apply_current_settings(&self) {
        let _apply = self.apply_lock.lock();
        let settings = self.settings.snapshot();
        self.apply_to_tracked_unlocked(settings.active_preset.bundle(), settings.culling);
    }

    /// Change the viewer settings and re-apply them to every tracked tileset
    /// as one step.
    ///
    /// `change` runs under the settings write lock and returns `None` when it
    /// left the settings untouched; nothing is re-applied in that case.
    /// Otherwise returns the settings that were applied together with the
    /// closure's result.
    ///
    /// `change` must not call back into the registry.
    pub fn update_settings<R>(
        &self,
        change: impl FnOnce(&mut ViewerSettings) -> Option<R>,
    ) -> Option<(ViewerSettings, R)> {
        let _apply = self.apply_lock.lock();
        let (applied, result) = self.settings.update(|s| change(s).map(|r| (*s, r)))?;
        self.apply_to_tracked_unlocked(applied.active_preset.bundle(), applied.culling);
        Some((applied, result))
    }

    fn apply_current_unlocked(&self, handle: &TilesetHandle) {
        let settings = self.settings.snapshot();
        self.apply_bundle(handle, settings.active_preset.bundle(), settings.culling);
    }

    fn apply_to_tracked_unlocked(&self, bundle: &PresetBundle, culling: CullingState) {
        let tracked = self.inner.lock().tracked();
        for handle in &tracked {
            self.apply_bundle(handle, bundle, culling);
        }
    }

    /// Show or hide one tracked tileset.
    ///
    /// Unknown ids are logged and ignored. Returns whether a tileset changed.
    pub fn set_visibility(&self, id: &str, visible: bool) -> bool {
        let handle = self.inner.lock().find(id).cloned();
        match handle {
            Some(handle) => {
                handle.tileset.set_show(visible);
                debug!(id, visible, "Visibility changed");
                true
            }
            None => {
                warn!(id, "Cannot change visibility: dataset not found");
                false
            }
        }
    }

    /// Toggle every dataset and the base layer together.
    ///
    /// If anything is currently hidden, everything is shown; otherwise
    /// everything is hidden. Returns the visibility that was applied.
    pub fn toggle_all(&self) -> bool {
        let tracked = self.inner.lock().tracked();
        let show = tracked.iter().any(|h| !h.is_visible());
        for handle in &tracked {
            handle.tileset.set_show(show);
        }
        info!(show, count = tracked.len(), "Toggled all datasets");
        show
    }

    /// Frame a dataset with the camera once it is ready.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::NotFound`] for unknown ids. Engine-level
    /// failures are logged and swallowed.
    pub async fn navigate_to(&self, id: &str, view: HeadingPitchRange) -> Result<(), ControllerError> {
        let handle = self
            .inner
            .lock()
            .find(id)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;

        info!(id, name = %handle.name, "Navigating to dataset");
        if let Err(e) = handle.tileset.ready().await {
            error!(id, error = %e, "Dataset never became ready");
            return Ok(());
        }
        if let Err(e) = self.engine.zoom_to(&handle.tileset, view) {
            error!(id, error = %e, "Navigation failed");
        }
        Ok(())
    }

    /// Frame the first registered dataset.
    pub async fn navigate_to_default(&self) {
        let first = self.inner.lock().datasets.first().map(|h| h.id.clone());
        match first {
            Some(id) => {
                if let Err(e) = self.navigate_to(&id, HeadingPitchRange::default()).await {
                    error!(error = %e, "Default navigation failed");
                }
            }
            None => error!("No datasets loaded to navigate to"),
        }
    }

    /// Ask the engine to evict loaded tile data for every tracked tileset.
    ///
    /// Returns the number of tilesets trimmed.
    pub fn clear_cache(&self) -> usize {
        let tracked = self.inner.lock().tracked();
        for handle in &tracked {
            handle.tileset.trim_loaded_tiles();
        }
        info!(count = tracked.len(), "Trimmed loaded tiles");
        tracked.len()
    }

    pub fn get(&self, id: &str) -> Option<TilesetHandle> {
        self.inner.lock().find(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().find(id).is_some()
    }

    /// Dataset ids in registration order (base layer excluded).
    pub fn ids(&self) -> Vec<String> {
        self.inner.lock().datasets.iter().map(|h| h.id.clone()).collect()
    }

    /// Dataset handles in registration order (base layer excluded).
    pub fn datasets(&self) -> Vec<TilesetHandle> {
        self.inner.lock().datasets.clone()
    }

    pub fn base_layer(&self) -> Option<TilesetHandle> {
        self.inner.lock().base_layer.clone()
    }

    /// Every tracked tileset: datasets first, then the base layer.
    pub fn tracked(&self) -> Vec<TilesetHandle> {
        self.inner.lock().tracked()
    }

    /// Number of datasets (base layer excluded).
    pub fn len(&self) -> usize {
        self.inner.lock().datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().datasets.is_empty()
    }
}
