//! UI-facing facade.
//!
//! `ViewerController` wires one viewer's settings, registry, monitor, culling
//! toggle and notification bus together and exposes the operations a UI
//! layer needs. Each controller owns its own [`SharedSettings`], so several
//! viewers can run side by side.
//!
//! # Example
//!
//! ```
//! use scanview::controller::{Shortcut, ViewerConfig, ViewerController};
//! use scanview::engine::{RenderEngine, SimulatedEngine};
//! use scanview::preset::Preset;
//! use std::sync::Arc;
//!
//! let engine: Arc<dyn RenderEngine> = Arc::new(SimulatedEngine::with_defaults());
//! let viewer = ViewerController::new(engine, ViewerConfig::default()).unwrap();
//!
//! viewer.handle_shortcut(Shortcut::from_key('1').unwrap());
//! assert_eq!(viewer.current_preset(), Preset::Ultra);
//! ```

use std::sync::Arc;

use tracing::info;

use crate::config::ConfigFile;
use crate::culling::FrustumCulling;
use crate::engine::{HeadingPitchRange, RenderEngine};
use crate::error::ControllerError;
use crate::monitor::{CycleDirection, FrameRateMonitor, MonitorConfig};
use crate::notify::{SettingsBus, SettingsObserver};
use crate::preset::{self, Preset};
use crate::registry::{scan_audit_datasets, DatasetConfig, TilesetHandle, TilesetRegistry};
use crate::settings::{SharedSettings, ViewerSettings};
use crate::stats::PerformanceSnapshot;

/// Construction-time options for a viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerConfig {
    /// Initial preset and culling state.
    pub settings: ViewerSettings,
    pub monitor: MonitorConfig,
    /// Start the frame-rate monitor immediately.
    pub auto_adjust: bool,
}

impl ViewerConfig {
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.settings.active_preset = preset;
        self
    }

    pub fn with_frustum_culling(mut self, enabled: bool) -> Self {
        self.settings.culling.frustum_culling_enabled = enabled;
        if !enabled {
            self.settings.culling.debug_show_frustum = false;
        }
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_auto_adjust(mut self, auto_adjust: bool) -> Self {
        self.auto_adjust = auto_adjust;
        self
    }
}

impl From<&ConfigFile> for ViewerConfig {
    fn from(config: &ConfigFile) -> Self {
        Self {
            settings: config.viewer_settings(),
            monitor: config.monitor_config(),
            auto_adjust: config.monitor.auto_adjust,
        }
    }
}

/// Keyboard shortcuts understood by the performance overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// `1`-`4`
    SelectPreset(Preset),
    /// `+` or `=`
    CycleHigher,
    /// `-`
    CycleLower,
    /// `f` / `F`
    ToggleCulling,
    /// `c` / `C`
    ClearCache,
}

impl Shortcut {
    pub fn from_key(key: char) -> Option<Shortcut> {
        match key {
            '1'..='4' => {
                let index = key as usize - '1' as usize;
                Preset::from_index(index).map(Shortcut::SelectPreset)
            }
            '+' | '=' => Some(Shortcut::CycleHigher),
            '-' => Some(Shortcut::CycleLower),
            'f' | 'F' => Some(Shortcut::ToggleCulling),
            'c' | 'C' => Some(Shortcut::ClearCache),
            _ => None,
        }
    }

    /// One-line help text for the overlay.
    pub fn help() -> &'static str {
        "[1-4]: Presets | [+/-]: Cycle | [F]: Culling | [C]: Clear Cache"
    }
}

/// Adaptive performance controller for one viewer.
pub struct ViewerController {
    engine: Arc<dyn RenderEngine>,
    settings: SharedSettings,
    bus: Arc<SettingsBus>,
    registry: Arc<TilesetRegistry>,
    monitor: Arc<FrameRateMonitor>,
    culling: FrustumCulling,
}

impl std::fmt::Debug for ViewerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerController")
            .field("settings", &self.settings.snapshot())
            .field("registry", &self.registry)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl ViewerController {
    /// Build a controller around `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Configuration`] if the monitor
    /// configuration is invalid.
    pub fn new(engine: Arc<dyn RenderEngine>, config: ViewerConfig) -> Result<Self, ControllerError> {
        let settings = SharedSettings::new(config.settings);
        let bus = Arc::new(SettingsBus::new());
        let registry = Arc::new(TilesetRegistry::new(Arc::clone(&engine), settings.clone()));
        let monitor = Arc::new(FrameRateMonitor::new(
            config.monitor,
            Arc::clone(&registry),
            Arc::clone(&engine),
            settings.clone(),
            Arc::clone(&bus),
        )?);
        let culling = FrustumCulling::new(
            Arc::clone(&engine),
            Arc::clone(&registry),
            settings.clone(),
            Arc::clone(&bus),
        );

        if config.settings.culling.debug_show_frustum {
            engine.set_debug_frustum(true);
        }

        let controller = Self {
            engine,
            settings,
            bus,
            registry,
            monitor,
            culling,
        };
        if config.auto_adjust {
            controller.monitor.start();
        }
        info!(
            preset = %controller.current_preset(),
            frustum_culling = controller.settings.culling().frustum_culling_enabled,
            auto_adjust = config.auto_adjust,
            "Viewer controller ready"
        );
        Ok(controller)
    }

    pub fn preset_names(&self) -> [&'static str; 4] {
        preset::ordered_names()
    }

    pub fn current_fps(&self) -> f64 {
        self.monitor.get_fps()
    }

    pub fn current_preset(&self) -> Preset {
        self.settings.active_preset()
    }

    pub fn settings(&self) -> ViewerSettings {
        self.settings.snapshot()
    }

    pub fn registry(&self) -> &Arc<TilesetRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<FrameRateMonitor> {
        &self.monitor
    }

    pub fn engine(&self) -> &Arc<dyn RenderEngine> {
        &self.engine
    }

    // Datasets

    pub async fn load(&self, url: &str, display_name: &str) -> Result<TilesetHandle, ControllerError> {
        self.registry.load(url, display_name).await
    }

    pub async fn load_many(&self, configs: &[DatasetConfig]) -> Vec<TilesetHandle> {
        self.registry.load_many(configs).await
    }

    /// Load the bundled scan-audit datasets.
    pub async fn load_default_datasets(&self) -> Vec<TilesetHandle> {
        self.registry.load_many(&scan_audit_datasets()).await
    }

    pub async fn load_base_layer(
        &self,
        url: &str,
        display_name: &str,
    ) -> Result<TilesetHandle, ControllerError> {
        self.registry.load_base_layer(url, display_name).await
    }

    pub async fn navigate_to(&self, id: &str, view: HeadingPitchRange) -> Result<(), ControllerError> {
        self.registry.navigate_to(id, view).await
    }

    pub async fn navigate_to_default(&self) {
        self.registry.navigate_to_default().await
    }

    pub fn set_visibility(&self, id: &str, visible: bool) -> bool {
        self.registry.set_visibility(id, visible)
    }

    pub fn toggle_all(&self) -> bool {
        self.registry.toggle_all()
    }

    pub fn clear_cache(&self) -> usize {
        self.registry.clear_cache()
    }

    // Culling

    pub fn set_frustum_culling(&self, enabled: bool, show_debug_overlay: bool) {
        self.culling.set_enabled(enabled, show_debug_overlay);
    }

    pub fn toggle_frustum_culling(&self) -> bool {
        self.culling.toggle()
    }

    // Presets and monitor

    pub fn start_monitor(&self) {
        self.monitor.start();
    }

    pub fn stop_monitor(&self) {
        self.monitor.stop();
    }

    /// Turn automatic preset adjustment on or off.
    pub fn set_auto_performance(&self, enabled: bool) {
        if enabled {
            self.monitor.start();
        } else {
            self.monitor.stop();
        }
    }

    pub fn is_auto_performance(&self) -> bool {
        self.monitor.is_running()
    }

    pub fn set_preset(&self, name: &str) -> Result<Preset, ControllerError> {
        self.monitor.set_preset(name)
    }

    pub fn cycle_preset(&self, direction: CycleDirection) -> Preset {
        self.monitor.cycle_preset(direction)
    }

    // Notifications

    pub fn subscribe(&self, observer: Arc<dyn SettingsObserver>) -> bool {
        self.bus.subscribe(observer)
    }

    pub fn unsubscribe(&self, observer: &Arc<dyn SettingsObserver>) -> bool {
        self.bus.unsubscribe(observer)
    }

    /// Current performance figures.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let settings = self.settings.snapshot();
        PerformanceSnapshot::collect(
            self.monitor.get_fps(),
            settings.active_preset,
            settings.culling.frustum_culling_enabled,
            self.monitor.is_running(),
            &self.registry.tracked(),
        )
    }

    /// Dispatch a keyboard shortcut.
    pub fn handle_shortcut(&self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::SelectPreset(preset) => self.monitor.select(preset),
            Shortcut::CycleHigher => {
                self.monitor.cycle_preset(CycleDirection::HigherFidelity);
            }
            Shortcut::CycleLower => {
                self.monitor.cycle_preset(CycleDirection::LowerFidelity);
            }
            Shortcut::ToggleCulling => {
                self.culling.toggle();
            }
            Shortcut::ClearCache => {
                self.registry.clear_cache();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimulatedEngine;
    use crate::notify::{ObserverError, SettingsChange};
    use parking_lot::Mutex;

    fn viewer(config: ViewerConfig) -> (Arc<SimulatedEngine>, ViewerController) {
        let engine = Arc::new(SimulatedEngine::with_defaults());
        let controller =
            ViewerController::new(Arc::clone(&engine) as Arc<dyn RenderEngine>, config).unwrap();
        (engine, controller)
    }

    #[test]
    fn test_shortcut_keys() {
        assert_eq!(Shortcut::from_key('1'), Some(Shortcut::SelectPreset(Preset::Ultra)));
        assert_eq!(Shortcut::from_key('4'), Some(Shortcut::SelectPreset(Preset::Low)));
        assert_eq!(Shortcut::from_key('5'), None);
        assert_eq!(Shortcut::from_key('='), Some(Shortcut::CycleHigher));
        assert_eq!(Shortcut::from_key('-'), Some(Shortcut::CycleLower));
        assert_eq!(Shortcut::from_key('F'), Some(Shortcut::ToggleCulling));
        assert_eq!(Shortcut::from_key('c'), Some(Shortcut::ClearCache));
        assert_eq!(Shortcut::from_key('x'), None);
    }

    #[test]
    fn test_invalid_monitor_config() {
        let engine: Arc<dyn RenderEngine> = Arc::new(SimulatedEngine::with_defaults());
        let config =
            ViewerConfig::default().with_monitor(MonitorConfig::default().with_target_fps(0.0));
        assert!(matches!(
            ViewerController::new(engine, config),
            Err(ControllerError::Configuration(_))
        ));
    }

    #[test]
    fn test_initial_settings_from_config() {
        let (_, viewer) = viewer(
            ViewerConfig::default()
                .with_preset(Preset::High)
                .with_frustum_culling(false),
        );
        assert_eq!(viewer.current_preset(), Preset::High);
        assert!(!viewer.settings().culling.frustum_culling_enabled);
        assert!(!viewer.is_auto_performance());
        assert_eq!(viewer.preset_names(), ["ultra", "high", "medium", "low"]);
    }

    #[test]
    fn test_auto_adjust_starts_monitor() {
        let (engine, viewer) = viewer(ViewerConfig::default().with_auto_adjust(true));
        assert!(viewer.is_auto_performance());
        assert_eq!(engine.listener_count(), 1);

        viewer.set_auto_performance(false);
        assert!(!viewer.is_auto_performance());
        assert_eq!(engine.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_shortcuts_drive_state() {
        let (engine, viewer) = viewer(ViewerConfig::default());
        viewer
            .load_many(&[DatasetConfig::new("a", "Castle"), DatasetConfig::new("b", "Barn")])
            .await;

        viewer.handle_shortcut(Shortcut::SelectPreset(Preset::Low));
        assert_eq!(viewer.current_preset(), Preset::Low);

        viewer.handle_shortcut(Shortcut::CycleLower);
        assert_eq!(viewer.current_preset(), Preset::Ultra);

        viewer.handle_shortcut(Shortcut::CycleHigher);
        assert_eq!(viewer.current_preset(), Preset::Low);

        viewer.handle_shortcut(Shortcut::ToggleCulling);
        assert!(!viewer.settings().culling.frustum_culling_enabled);

        viewer.handle_shortcut(Shortcut::ClearCache);
        assert!(engine.created_tilesets().iter().all(|t| t.trim_count() == 1));
    }

    #[tokio::test]
    async fn test_observers_see_every_change() {
        let (_, viewer) = viewer(ViewerConfig::default());
        let seen: Arc<Mutex<Vec<SettingsChange>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let observer: Arc<dyn SettingsObserver> =
            Arc::new(move |change: &SettingsChange| -> Result<(), ObserverError> {
                sink.lock().push(*change);
                Ok(())
            });
        assert!(viewer.subscribe(Arc::clone(&observer)));

        viewer.set_preset("high").unwrap();
        viewer.set_frustum_culling(false, false);
        assert!(viewer.unsubscribe(&observer));
        viewer.set_preset("low").unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].preset, Preset::High);
        assert!(!seen[1].frustum_culling_enabled);
    }

    #[tokio::test]
    async fn test_snapshot_counts_datasets() {
        let (_, viewer) = viewer(ViewerConfig::default());
        viewer.load("a", "Castle").await.unwrap();
        viewer.load("b", "Barn").await.unwrap();
        viewer.load_base_layer("osm", "Buildings").await.unwrap();
        viewer.set_visibility("barn", false);

        let snapshot = viewer.snapshot();
        assert_eq!(snapshot.datasets_loaded, 2);
        assert_eq!(snapshot.datasets_visible, 1);
        assert_eq!(snapshot.preset, Preset::Medium);
        assert!(snapshot.points_loaded > 0);
        assert_eq!(snapshot.memory_bytes, snapshot.points_loaded * 15);
    }

    #[tokio::test]
    async fn test_default_datasets() {
        let (_, viewer) = viewer(ViewerConfig::default());
        let loaded = viewer.load_default_datasets().await;
        assert_eq!(loaded.len(), 3);
        assert_eq!(viewer.registry().ids(), ["castle", "barn", "guesthouse"]);
    }

    #[test]
    fn test_config_file_conversion() {
        let mut file = ConfigFile::default();
        file.performance.preset = Preset::Ultra;
        file.monitor.auto_adjust = true;
        file.monitor.target_fps = 60.0;

        let config = ViewerConfig::from(&file);
        assert_eq!(config.settings.active_preset, Preset::Ultra);
        assert_eq!(config.monitor.target_fps, 60.0);
        assert!(config.auto_adjust);
    }
}
