//! Frustum-culling toggle.
//!
//! Flips the eviction aggressiveness of every tracked dataset independently of
//! the active preset. Turning culling on trims retained off-screen data first,
//! so the memory drop is immediate instead of waiting for the engine's next
//! eviction pass.

use std::sync::Arc;

use tracing::info;

use crate::engine::RenderEngine;
use crate::notify::SettingsBus;
use crate::registry::TilesetRegistry;
use crate::settings::{CullingState, SharedSettings};

/// Culling control for one viewer.
pub struct FrustumCulling {
    engine: Arc<dyn RenderEngine>,
    registry: Arc<TilesetRegistry>,
    settings: SharedSettings,
    bus: Arc<SettingsBus>,
}

impl std::fmt::Debug for FrustumCulling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrustumCulling")
            .field("state", &self.settings.culling())
            .finish_non_exhaustive()
    }
}

impl FrustumCulling {
    pub fn new(
        engine: Arc<dyn RenderEngine>,
        registry: Arc<TilesetRegistry>,
        settings: SharedSettings,
        bus: Arc<SettingsBus>,
    ) -> Self {
        Self {
            engine,
            registry,
            settings,
            bus,
        }
    }

    pub fn state(&self) -> CullingState {
        self.settings.culling()
    }

    pub fn is_enabled(&self) -> bool {
        self.state().frustum_culling_enabled
    }

    /// Turn culling on or off.
    ///
    /// The debug overlay is shown only when `show_debug_overlay` is set and
    /// culling is being enabled; any other call hides it if it was showing.
    pub fn set_enabled(&self, enabled: bool, show_debug_overlay: bool) {
        if enabled {
            self.registry.clear_cache();
        }

        let overlay = show_debug_overlay && enabled;
        let updated = self.registry.update_settings(|s| {
            let previous = s.culling;
            s.culling.frustum_culling_enabled = enabled;
            s.culling.debug_show_frustum = overlay;
            Some(previous)
        });
        let Some((applied, previous)) = updated else {
            return;
        };
        info!(
            enabled,
            was_enabled = previous.frustum_culling_enabled,
            "Frustum culling toggled"
        );

        if overlay != previous.debug_show_frustum {
            self.engine.set_debug_frustum(overlay);
        }

        self.engine.request_render();
        self.bus.publish(
            applied.active_preset,
            applied.culling.frustum_culling_enabled,
        );
    }

    /// Flip the current state without the overlay. Returns the new state.
    pub fn toggle(&self) -> bool {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled, false);
        enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;
    use crate::notify::{ObserverError, SettingsChange, SettingsObserver};
    use crate::preset::Preset;
    use crate::registry::{DatasetConfig, CULLED_CACHE_SIZE, RETAINED_CACHE_SIZE};
    use parking_lot::Mutex;

    struct Fixture {
        engine: Arc<SimulatedEngine>,
        registry: Arc<TilesetRegistry>,
        settings: SharedSettings,
        bus: Arc<SettingsBus>,
        culling: FrustumCulling,
    }

    async fn fixture() -> Fixture {
        let engine = Arc::new(SimulatedEngine::with_defaults());
        let settings = SharedSettings::default();
        let registry = Arc::new(TilesetRegistry::new(
            Arc::clone(&engine) as Arc<dyn RenderEngine>,
            settings.clone(),
        ));
        registry
            .load_many(&[DatasetConfig::new("a", "Castle"), DatasetConfig::new("b", "Barn")])
            .await;
        let bus = Arc::new(SettingsBus::new());
        let culling = FrustumCulling::new(
            Arc::clone(&engine) as Arc<dyn RenderEngine>,
            Arc::clone(&registry),
            settings.clone(),
            Arc::clone(&bus),
        );
        Fixture {
            engine,
            registry,
            settings,
            bus,
            culling,
        }
    }

    #[tokio::test]
    async fn test_disable_retains_everything() {
        let f = fixture().await;
        f.culling.set_enabled(false, false);

        assert!(!f.settings.culling().frustum_culling_enabled);
        for handle in f.registry.datasets() {
            let params = handle.tileset().params();
            assert_eq!(params.maximum_cache_size, RETAINED_CACHE_SIZE);
            assert!(params.load_siblings);
            assert_eq!(params.maximum_screen_space_error, 24.0);
        }
        assert!(f.engine.created_tilesets().iter().all(|t| t.trim_count() == 0));
    }

    #[tokio::test]
    async fn test_enable_trims_then_applies() {
        let f = fixture().await;
        f.culling.set_enabled(false, false);
        f.culling.set_enabled(true, false);

        assert!(f.engine.created_tilesets().iter().all(|t| t.trim_count() == 1));
        for handle in f.registry.datasets() {
            let params = handle.tileset().params();
            assert_eq!(params.maximum_cache_size, CULLED_CACHE_SIZE);
            assert_eq!(params.maximum_memory_usage_mb, 256);
        }
    }

    #[tokio::test]
    async fn test_preset_fields_survive_toggle() {
        let f = fixture().await;
        f.settings.set_active_preset(Preset::Ultra);
        f.culling.set_enabled(false, false);
        let off = f.registry.datasets()[0].tileset().params();
        f.culling.set_enabled(true, false);
        let on = f.registry.datasets()[0].tileset().params();

        assert_eq!(off.maximum_screen_space_error, on.maximum_screen_space_error);
        assert_eq!(
            off.dynamic_screen_space_error_density,
            on.dynamic_screen_space_error_density
        );
        assert_ne!(off.skip_level_of_detail, on.skip_level_of_detail);
    }

    #[tokio::test]
    async fn test_debug_overlay_only_when_requested() {
        let f = fixture().await;

        f.culling.set_enabled(true, false);
        assert!(!f.engine.debug_frustum_shown());

        f.culling.set_enabled(true, true);
        assert!(f.engine.debug_frustum_shown());
        assert!(f.settings.culling().debug_show_frustum);

        f.culling.set_enabled(false, true);
        assert!(!f.engine.debug_frustum_shown());
    }

    #[tokio::test]
    async fn test_publishes_and_requests_render() {
        let f = fixture().await;
        let seen: Arc<Mutex<Vec<SettingsChange>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn SettingsObserver> =
            Arc::new(move |change: &SettingsChange| -> Result<(), ObserverError> {
                sink.lock().push(*change);
                Ok(())
            });
        f.bus.subscribe(observer);

        assert!(!f.culling.toggle());

        assert_eq!(f.engine.render_requests(), 1);
        assert_eq!(
            *seen.lock(),
            [SettingsChange {
                preset: Preset::Medium,
                frustum_culling_enabled: false
            }]
        );
    }
}
