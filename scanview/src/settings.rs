//! Viewer-wide settings shared by the registry, monitor and culling toggle.
//!
//! One `SharedSettings` instance is owned per viewer and handed to each
//! component at construction. Cloning it is cheap and every clone observes the
//! same state, so independent viewers never interfere with each other.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::preset::Preset;

/// Frustum-culling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CullingState {
    /// When true, off-screen data is evicted aggressively.
    pub frustum_culling_enabled: bool,
    /// Whether the engine draws its frustum debug overlay.
    pub debug_show_frustum: bool,
}

impl Default for CullingState {
    fn default() -> Self {
        Self {
            frustum_culling_enabled: true,
            debug_show_frustum: false,
        }
    }
}

impl CullingState {
    /// Culling on, no overlay.
    pub fn enabled() -> Self {
        Self::default()
    }

    /// Culling off, no overlay.
    pub fn disabled() -> Self {
        Self {
            frustum_culling_enabled: false,
            debug_show_frustum: false,
        }
    }
}

/// Point-in-time copy of the viewer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerSettings {
    /// Preset currently applied to every dataset.
    pub active_preset: Preset,
    /// Current culling state.
    pub culling: CullingState,
}

/// Shared handle to the settings of one viewer.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<ViewerSettings>>,
}

impl SharedSettings {
    /// Create shared settings with the given initial values.
    pub fn new(initial: ViewerSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Snapshot of the current settings.
    pub fn snapshot(&self) -> ViewerSettings {
        *self.inner.read()
    }

    /// Mutate the settings in place under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut ViewerSettings) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn active_preset(&self) -> Preset {
        self.inner.read().active_preset
    }

    pub fn set_active_preset(&self, preset: Preset) {
        self.inner.write().active_preset = preset;
    }

    pub fn culling(&self) -> CullingState {
        self.inner.read().culling
    }

    pub fn set_frustum_culling(&self, enabled: bool) {
        self.inner.write().culling.frustum_culling_enabled = enabled;
    }

    pub fn set_debug_show_frustum(&self, show: bool) {
        self.inner.write().culling.debug_show_frustum = show;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SharedSettings::default();
        let snapshot = settings.snapshot();
        assert_eq!(snapshot.active_preset, Preset::Medium);
        assert!(snapshot.culling.frustum_culling_enabled);
        assert!(!snapshot.culling.debug_show_frustum);
    }

    #[test]
    fn test_clones_share_state() {
        let settings = SharedSettings::default();
        let other = settings.clone();

        other.set_active_preset(Preset::Low);
        other.set_frustum_culling(false);

        assert_eq!(settings.active_preset(), Preset::Low);
        assert!(!settings.culling().frustum_culling_enabled);
    }

    #[test]
    fn test_update_returns_closure_result() {
        let settings = SharedSettings::default();
        let previous = settings.update(|s| {
            let previous = s.active_preset;
            s.active_preset = Preset::High;
            s.culling.debug_show_frustum = true;
            previous
        });

        assert_eq!(previous, Preset::Medium);
        assert_eq!(settings.active_preset(), Preset::High);
        assert!(settings.culling().debug_show_frustum);
    }

    #[test]
    fn test_independent_viewers_do_not_share() {
        let a = SharedSettings::default();
        let b = SharedSettings::default();

        a.set_active_preset(Preset::Ultra);
        assert_eq!(b.active_preset(), Preset::Medium);
    }
}
