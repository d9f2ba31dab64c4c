//! Mapping from a preset bundle and culling state to engine parameters.
//!
//! | field | culling on | culling off |
//! |---|---|---|
//! | memory budget | `bundle.maximum_memory_usage_mb` | [`UNLIMITED_MEMORY_MB`] |
//! | cache slots | [`CULLED_CACHE_SIZE`] | [`RETAINED_CACHE_SIZE`] |
//! | skip LOD | true | false |
//! | immediately load desired LOD | true | false |
//! | load siblings | false | true |
//! | preload when hidden | false | true |
//! | preload flight destinations | false | true |
//! | cull requests while moving | true | false |
//!
//! Everything else comes from the bundle or is fixed.

use crate::engine::{PointCloudShading, TilesetParams};
use crate::preset::PresetBundle;
use crate::settings::CullingState;

/// Memory budget used while culling is off.
pub const UNLIMITED_MEMORY_MB: u32 = 10_000;

/// Cache slots kept while culling is on.
pub const CULLED_CACHE_SIZE: u32 = 10;

/// Cache slots kept while culling is off.
pub const RETAINED_CACHE_SIZE: u32 = 1_000;

/// Eye-dome lighting strength applied to every point cloud.
pub const EYE_DOME_LIGHTING_STRENGTH: f64 = 0.7;

/// Eye-dome lighting radius applied to every point cloud.
pub const EYE_DOME_LIGHTING_RADIUS: f64 = 1.0;

/// Progressive resolution height fraction applied to every tileset.
pub const PROGRESSIVE_RESOLUTION_HEIGHT_FRACTION: f64 = 0.5;

/// Compute the engine parameters for a bundle under the given culling state.
///
/// Pure function: identical inputs always produce identical outputs, so
/// applying the result repeatedly never drifts.
pub fn resolve_params(bundle: &PresetBundle, culling: CullingState) -> TilesetParams {
    let cull = culling.frustum_culling_enabled;

    TilesetParams {
        maximum_memory_usage_mb: if cull {
            bundle.maximum_memory_usage_mb
        } else {
            UNLIMITED_MEMORY_MB
        },
        maximum_cache_size: if cull {
            CULLED_CACHE_SIZE
        } else {
            RETAINED_CACHE_SIZE
        },
        skip_level_of_detail: cull,
        immediately_load_desired_level_of_detail: cull,
        load_siblings: !cull,
        preload_when_hidden: !cull,
        preload_flight_destinations: !cull,
        cull_requests_while_moving: cull,

        maximum_screen_space_error: bundle.maximum_screen_space_error,
        dynamic_screen_space_error: true,
        dynamic_screen_space_error_density: bundle.dynamic_screen_space_error_density,
        dynamic_screen_space_error_factor: bundle.dynamic_screen_space_error_factor,
        foveated_screen_space_error: true,
        foveated_cone_size: bundle.foveated_cone_size,
        foveated_time_delay: 0.0,
        point_cloud_shading: PointCloudShading {
            attenuation: true,
            geometric_error_scale: bundle.geometric_error_scale,
            maximum_attenuation: bundle.maximum_attenuation,
            eye_dome_lighting: true,
            eye_dome_lighting_strength: EYE_DOME_LIGHTING_STRENGTH,
            eye_dome_lighting_radius: EYE_DOME_LIGHTING_RADIUS,
        },
        point_budget: bundle.point_budget,

        prefer_leaves: true,
        progressive_resolution_height_fraction: PROGRESSIVE_RESOLUTION_HEIGHT_FRACTION,
    }
}
