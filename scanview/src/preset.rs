//! Quality presets and their rendering-budget bundles.
//!
//! Presets are ordered from highest fidelity (most resource hungry) to lowest
//! fidelity (cheapest). The frame-rate monitor walks this order when it
//! degrades quality, so the table is the single source of truth for both the
//! parameter values and the degradation sequence.
//!
//! | preset | SSE | memory | density | factor | cone | scale | atten. | budget |
//! |--------|-----|--------|---------|--------|------|-------|--------|--------|
//! | ultra  | 8   | 1024   | 0.00002 | 4      | 0.10 | 0.5   | 8      | 5M     |
//! | high   | 16  | 512    | 0.00004 | 4      | 0.15 | 0.7   | 8      | 3M     |
//! | medium | 24  | 256    | 0.00006 | 6      | 0.20 | 1.0   | 6      | 2M     |
//! | low    | 32  | 128    | 0.00008 | 8      | 0.30 | 1.5   | 4      | 1M     |

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::ControllerError;

/// A named quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultra,
    High,
    Medium,
    Low,
}

impl Preset {
    /// All presets, highest fidelity first.
    pub const ORDERED: [Preset; 4] = [Preset::Ultra, Preset::High, Preset::Medium, Preset::Low];

    /// Preset used when nothing else is configured.
    pub const DEFAULT: Preset = Preset::Medium;

    /// Lowercase name used in configuration and UI.
    pub fn name(&self) -> &'static str {
        match self {
            Preset::Ultra => "ultra",
            Preset::High => "high",
            Preset::Medium => "medium",
            Preset::Low => "low",
        }
    }

    /// Position in [`Preset::ORDERED`].
    pub fn index(&self) -> usize {
        match self {
            Preset::Ultra => 0,
            Preset::High => 1,
            Preset::Medium => 2,
            Preset::Low => 3,
        }
    }

    /// Preset at the given position in [`Preset::ORDERED`].
    pub fn from_index(index: usize) -> Option<Preset> {
        Self::ORDERED.get(index).copied()
    }

    /// Whether this is the cheapest preset (no further degradation possible).
    pub fn is_lowest(&self) -> bool {
        self.index() == Self::ORDERED.len() - 1
    }

    /// The rendering-budget bundle for this preset.
    pub fn bundle(&self) -> &'static PresetBundle {
        &PRESET_BUNDLES[self.index()]
    }

    /// Next preset toward lower fidelity, if any.
    pub fn degraded(&self) -> Option<Preset> {
        Self::from_index(self.index() + 1)
    }

    /// Map a screen-space-error value back to the preset it belongs to.
    ///
    /// Returns `None` for values beyond the cheapest preset, which the
    /// performance panel shows as a custom configuration.
    pub fn from_screen_space_error(sse: f64) -> Option<Preset> {
        Self::ORDERED
            .iter()
            .copied()
            .find(|p| sse <= p.bundle().maximum_screen_space_error)
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ultra" => Ok(Preset::Ultra),
            "high" => Ok(Preset::High),
            "medium" => Ok(Preset::Medium),
            "low" => Ok(Preset::Low),
            _ => Err(ControllerError::UnknownPreset(s.to_string())),
        }
    }
}

/// Rendering-budget parameters for one preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PresetBundle {
    /// Maximum screen-space error in pixels; smaller is sharper.
    pub maximum_screen_space_error: f64,
    /// Memory budget in megabytes while frustum culling is on.
    pub maximum_memory_usage_mb: u32,
    /// How quickly distant detail is reduced.
    pub dynamic_screen_space_error_density: f64,
    /// Strength of the distant-detail reduction.
    pub dynamic_screen_space_error_factor: f64,
    /// Foveated cone size (0.0 - 1.0).
    pub foveated_cone_size: f64,
    /// Point size scale relative to geometric error.
    pub geometric_error_scale: f64,
    /// Maximum point attenuation in pixels.
    pub maximum_attenuation: f64,
    /// Target ceiling for the rendered point count.
    pub point_budget: u64,
}

static PRESET_BUNDLES: [PresetBundle; 4] = [
    PresetBundle {
        maximum_screen_space_error: 8.0,
        maximum_memory_usage_mb: 1024,
        dynamic_screen_space_error_density: 0.00002,
        dynamic_screen_space_error_factor: 4.0,
        foveated_cone_size: 0.1,
        geometric_error_scale: 0.5,
        maximum_attenuation: 8.0,
        point_budget: 5_000_000,
    },
    PresetBundle {
        maximum_screen_space_error: 16.0,
        maximum_memory_usage_mb: 512,
        dynamic_screen_space_error_density: 0.00004,
        dynamic_screen_space_error_factor: 4.0,
        foveated_cone_size: 0.15,
        geometric_error_scale: 0.7,
        maximum_attenuation: 8.0,
        point_budget: 3_000_000,
    },
    PresetBundle {
        maximum_screen_space_error: 24.0,
        maximum_memory_usage_mb: 256,
        dynamic_screen_space_error_density: 0.00006,
        dynamic_screen_space_error_factor: 6.0,
        foveated_cone_size: 0.2,
        geometric_error_scale: 1.0,
        maximum_attenuation: 6.0,
        point_budget: 2_000_000,
    },
    PresetBundle {
        maximum_screen_space_error: 32.0,
        maximum_memory_usage_mb: 128,
        dynamic_screen_space_error_density: 0.00008,
        dynamic_screen_space_error_factor: 8.0,
        foveated_cone_size: 0.3,
        geometric_error_scale: 1.5,
        maximum_attenuation: 4.0,
        point_budget: 1_000_000,
    },
];

/// Look up the bundle for a preset name.
///
/// # Errors
///
/// Returns [`ControllerError::UnknownPreset`] if `name` is not a preset.
pub fn bundle(name: &str) -> Result<&'static PresetBundle, ControllerError> {
    name.parse::<Preset>().map(|p| p.bundle())
}

/// Preset names ordered from highest to lowest fidelity.
pub fn ordered_names() -> [&'static str; 4] {
    Preset::ORDERED.map(|p| p.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ordered_names() {
        assert_eq!(ordered_names(), ["ultra", "high", "medium", "low"]);
    }

    #[test]
    fn test_bundle_lookup() {
        let medium = bundle("medium").unwrap();
        assert_eq!(medium.maximum_screen_space_error, 24.0);
        assert_eq!(medium.maximum_memory_usage_mb, 256);
    }

    #[test]
    fn test_bundle_lookup_is_case_insensitive() {
        assert_eq!(bundle("ULTRA").unwrap(), Preset::Ultra.bundle());
    }

    #[test]
    fn test_unknown_preset() {
        let err = bundle("cinematic").unwrap_err();
        assert!(matches!(err, ControllerError::UnknownPreset(name) if name == "cinematic"));
    }

    #[test]
    fn test_screen_space_error_strictly_increases() {
        let errors: Vec<f64> = Preset::ORDERED
            .iter()
            .map(|p| p.bundle().maximum_screen_space_error)
            .collect();
        assert!(errors.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_budgets_shrink_with_fidelity() {
        for pair in Preset::ORDERED.windows(2) {
            let (better, cheaper) = (pair[0].bundle(), pair[1].bundle());
            assert!(better.maximum_memory_usage_mb > cheaper.maximum_memory_usage_mb);
            assert!(better.point_budget > cheaper.point_budget);
        }
    }

    #[test]
    fn test_degraded_walks_the_order() {
        assert_eq!(Preset::Ultra.degraded(), Some(Preset::High));
        assert_eq!(Preset::Medium.degraded(), Some(Preset::Low));
        assert_eq!(Preset::Low.degraded(), None);
        assert!(Preset::Low.is_lowest());
    }

    #[test]
    fn test_default_is_medium() {
        assert_eq!(Preset::default(), Preset::Medium);
        assert_eq!(Preset::default().index(), 2);
    }

    #[test]
    fn test_from_screen_space_error() {
        assert_eq!(Preset::from_screen_space_error(4.0), Some(Preset::Ultra));
        assert_eq!(Preset::from_screen_space_error(16.0), Some(Preset::High));
        assert_eq!(Preset::from_screen_space_error(20.0), Some(Preset::Medium));
        assert_eq!(Preset::from_screen_space_error(32.0), Some(Preset::Low));
        assert_eq!(Preset::from_screen_space_error(48.0), None);
    }

    proptest! {
        #[test]
        fn prop_index_round_trips(index in 0usize..4) {
            let preset = Preset::from_index(index).unwrap();
            prop_assert_eq!(preset.index(), index);
            prop_assert_eq!(preset.name().parse::<Preset>().unwrap(), preset);
        }

        #[test]
        fn prop_classification_never_sharper_than_requested(sse in 0.0f64..40.0) {
            if let Some(preset) = Preset::from_screen_space_error(sse) {
                prop_assert!(sse <= preset.bundle().maximum_screen_space_error);
            } else {
                prop_assert!(sse > Preset::Low.bundle().maximum_screen_space_error);
            }
        }
    }
}
