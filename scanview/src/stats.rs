//! Live performance statistics.

use std::fmt;

use serde::Serialize;

use crate::preset::Preset;
use crate::registry::TilesetHandle;

const MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time view of the viewer's performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSnapshot {
    /// Last sampled frame rate (0 before the first window).
    pub fps: f64,
    pub preset: Preset,
    pub frustum_culling_enabled: bool,
    /// Whether the frame-rate monitor is adjusting presets.
    pub auto_adjust: bool,
    /// Datasets registered (base layer excluded).
    pub datasets_loaded: usize,
    /// Datasets currently shown (base layer excluded).
    pub datasets_visible: usize,
    /// Points loaded across every tracked tileset.
    pub points_loaded: u64,
    /// GPU geometry plus texture bytes across every tracked tileset.
    pub memory_bytes: u64,
}

impl PerformanceSnapshot {
    /// Sum tileset statistics over `tracked`.
    pub(crate) fn collect(
        fps: f64,
        preset: Preset,
        frustum_culling_enabled: bool,
        auto_adjust: bool,
        tracked: &[TilesetHandle],
    ) -> Self {
        let mut snapshot = Self {
            fps,
            preset,
            frustum_culling_enabled,
            auto_adjust,
            datasets_loaded: 0,
            datasets_visible: 0,
            points_loaded: 0,
            memory_bytes: 0,
        };
        for handle in tracked {
            if !handle.is_base_layer() {
                snapshot.datasets_loaded += 1;
                if handle.is_visible() {
                    snapshot.datasets_visible += 1;
                }
            }
            let stats = handle.tileset().statistics();
            snapshot.points_loaded += stats.points_loaded;
            snapshot.memory_bytes += stats.geometry_bytes + stats.texture_bytes;
        }
        snapshot
    }

    /// Loaded points in short form (`1.2M`, `3.4K`, `950`).
    pub fn points_human(&self) -> String {
        format_count(self.points_loaded)
    }

    /// GPU memory rounded to whole mebibytes (`12 MB`).
    pub fn memory_human(&self) -> String {
        format!("{} MB", (self.memory_bytes as f64 / MIB).round() as u64)
    }
}

impl fmt::Display for PerformanceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FPS: {:.0} | Preset: {} | Culling: {} | Datasets: {}/{} | Points: {} | Memory: {}",
            self.fps,
            self.preset,
            if self.frustum_culling_enabled { "ON" } else { "OFF" },
            self.datasets_visible,
            self.datasets_loaded,
            self.points_human(),
            self.memory_human(),
        )
    }
}

/// Format a count with one decimal and an `M`/`K` suffix above a thousand.
pub fn format_count(count: u64) -> String {
    if count > 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count > 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(points: u64, memory: u64) -> PerformanceSnapshot {
        PerformanceSnapshot::collect(29.6, Preset::High, true, false, &[]).with(points, memory)
    }

    impl PerformanceSnapshot {
        fn with(mut self, points: u64, memory: u64) -> Self {
            self.points_loaded = points;
            self.memory_bytes = memory;
            self
        }
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(950), "950");
        assert_eq!(format_count(1_000), "1000");
        assert_eq!(format_count(3_400), "3.4K");
        assert_eq!(format_count(1_240_000), "1.2M");
        assert_eq!(format_count(5_000_001), "5.0M");
    }

    #[test]
    fn test_memory_human() {
        assert_eq!(snapshot(0, 0).memory_human(), "0 MB");
        assert_eq!(snapshot(0, 12 * 1024 * 1024 + 100).memory_human(), "12 MB");
    }

    #[test]
    fn test_empty_collection() {
        let s = snapshot(0, 0);
        assert_eq!(s.datasets_loaded, 0);
        assert_eq!(s.datasets_visible, 0);
        assert_eq!(s.preset, Preset::High);
    }

    #[test]
    fn test_display() {
        let text = snapshot(2_500_000, 30 * 1024 * 1024).to_string();
        assert_eq!(
            text,
            "FPS: 30 | Preset: high | Culling: ON | Datasets: 0/0 | Points: 2.5M | Memory: 30 MB"
        );
    }
}
