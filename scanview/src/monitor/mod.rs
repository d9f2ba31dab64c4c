//! Frame-rate monitor.
//!
//! Samples the achieved frame rate over fixed windows and steps the active
//! preset toward lower fidelity when the rate stays below target.
//!
//! # State Machine
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopped
//! ```
//!
//! While running, every window computes `frames / elapsed` and compares it to
//! the target:
//!
//! ```text
//! fps <  target: low_samples += 1
//! fps >= target: low_samples  = 0
//! low_samples == adjust_threshold: degrade one step, low_samples = 0
//! ```
//!
//! Degradation stops at the cheapest preset. There is no automatic upgrade;
//! a manual [`FrameRateMonitor::set_preset`] or
//! [`FrameRateMonitor::cycle_preset`] is the only way back up.
//!
//! # Timer
//!
//! When started inside a tokio runtime, a background task drives windows at
//! `sample_period`. Outside a runtime the host calls
//! [`FrameRateMonitor::sample_window`] itself. Windows arriving after `stop()`
//! are ignored.

mod counter;

pub use counter::FrameCounter;

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::engine::{FrameListener, ListenerId, RenderEngine};
use crate::error::ControllerError;
use crate::notify::SettingsBus;
use crate::preset::Preset;
use crate::registry::TilesetRegistry;
use crate::settings::{SharedSettings, ViewerSettings};

/// Default target frame rate.
pub const DEFAULT_TARGET_FPS: f64 = 30.0;

/// Default sample window.
pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_millis(2000);

/// Default number of consecutive low windows before degrading.
pub const DEFAULT_ADJUST_THRESHOLD: u32 = 3;

/// Configuration for the frame-rate monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Frame rate to stay at or above.
    pub target_fps: f64,
    /// Length of one sample window.
    pub sample_period: Duration,
    /// Consecutive low windows that trigger one degradation step.
    pub adjust_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            target_fps: DEFAULT_TARGET_FPS,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            adjust_threshold: DEFAULT_ADJUST_THRESHOLD,
        }
    }
}

impl MonitorConfig {
    pub fn with_target_fps(mut self, target_fps: f64) -> Self {
        self.target_fps = target_fps;
        self
    }

    pub fn with_sample_period(mut self, sample_period: Duration) -> Self {
        self.sample_period = sample_period;
        self
    }

    pub fn with_adjust_threshold(mut self, adjust_threshold: u32) -> Self {
        self.adjust_threshold = adjust_threshold;
        self
    }

    /// Reject values the monitor cannot work with.
    ///
    /// # Errors
    ///
    /// [`ControllerError::Configuration`] for a non-positive or non-finite
    /// target, a zero sample period or a zero threshold.
    pub fn validate(&self) -> Result<(), ControllerError> {
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(ControllerError::Configuration(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.sample_period.is_zero() {
            return Err(ControllerError::Configuration(
                "sample_period must be non-zero".to_string(),
            ));
        }
        if self.adjust_threshold == 0 {
            return Err(ControllerError::Configuration(
                "adjust_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Monitor run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Direction for a manual preset step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleDirection {
    /// Toward ultra; wraps from ultra to low.
    HigherFidelity,
    /// Toward low; wraps from low to ultra.
    LowerFidelity,
}

/// Callback invoked with the new preset after every preset change.
pub type PresetChangeCallback = Box<dyn Fn(Preset) + Send + Sync>;

#[derive(Debug)]
struct MonitorInner {
    state: MonitorState,
    low_samples: u32,
    last_fps: f64,
    window_start: Option<Instant>,
    listener: Option<ListenerId>,
    timer: Option<CancellationToken>,
}

impl MonitorInner {
    fn new() -> Self {
        Self {
            state: MonitorState::Stopped,
            low_samples: 0,
            last_fps: 0.0,
            window_start: None,
            listener: None,
            timer: None,
        }
    }
}

/// Adaptive frame-rate monitor for one viewer.
///
/// The active preset lives in the viewer's [`SharedSettings`]; the monitor is
/// the only component that changes it.
pub struct FrameRateMonitor {
    config: MonitorConfig,
    registry: Arc<TilesetRegistry>,
    engine: Arc<dyn RenderEngine>,
    settings: SharedSettings,
    bus: Arc<SettingsBus>,
    counter: Arc<FrameCounter>,
    on_preset_change: Option<PresetChangeCallback>,
    inner: Mutex<MonitorInner>,
}

impl std::fmt::Debug for FrameRateMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameRateMonitor")
            .field("config", &self.config)
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl FrameRateMonitor {
    /// Create a stopped monitor.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Configuration`] if `config` is invalid.
    pub fn new(
        config: MonitorConfig,
        registry: Arc<TilesetRegistry>,
        engine: Arc<dyn RenderEngine>,
        settings: SharedSettings,
        bus: Arc<SettingsBus>,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            engine,
            settings,
            bus,
            counter: Arc::new(FrameCounter::new()),
            on_preset_change: None,
            inner: Mutex::new(MonitorInner::new()),
        })
    }

    /// Set the callback fired after every preset change.
    pub fn with_preset_change_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(Preset) + Send + Sync + 'static,
    {
        self.on_preset_change = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> MonitorState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == MonitorState::Running
    }

    /// Last computed frame rate; `0.0` before the first window completes.
    pub fn get_fps(&self) -> f64 {
        self.inner.lock().last_fps
    }

    pub fn current_preset(&self) -> Preset {
        self.settings.active_preset()
    }

    /// Consecutive windows below target so far.
    pub fn low_sample_count(&self) -> u32 {
        self.inner.lock().low_samples
    }

    /// Frames counted in the current window.
    pub fn pending_frames(&self) -> u64 {
        self.counter.count()
    }

    /// Start sampling. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.state == MonitorState::Running {
            debug!("Frame rate monitor already running");
            return;
        }

        self.counter.take();
        inner.low_samples = 0;
        inner.window_start = Some(Instant::now());
        inner.state = MonitorState::Running;
        inner.listener = Some(
            self.engine
                .add_post_render_listener(Arc::clone(&self.counter) as Arc<dyn FrameListener>),
        );
        inner.timer = self.spawn_timer();

        info!(
            target_fps = self.config.target_fps,
            sample_period_ms = self.config.sample_period.as_millis() as u64,
            adjust_threshold = self.config.adjust_threshold,
            preset = %self.settings.active_preset(),
            timer = inner.timer.is_some(),
            "Frame rate monitor started"
        );
    }

    fn spawn_timer(self: &Arc<Self>) -> Option<CancellationToken> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let monitor: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sample_period;

        runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(monitor) = monitor.upgrade() else { break };
                        // A late wake-up still has to cover every frame counted so far.
                        monitor.sample_window(Instant::now());
                    }
                }
            }
            trace!("Frame rate timer exited");
        });
        Some(token)
    }

    /// Stop sampling. The last frame rate stays readable.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state == MonitorState::Stopped {
            return;
        }
        inner.state = MonitorState::Stopped;
        inner.window_start = None;
        let listener = inner.listener.take();
        let timer = inner.timer.take();
        let last_fps = inner.last_fps;
        drop(inner);

        if let Some(id) = listener {
            self.engine.remove_post_render_listener(id);
        }
        if let Some(token) = timer {
            token.cancel();
        }
        info!(last_fps, "Frame rate monitor stopped");
    }

    /// Close the current window at `now` and evaluate it.
    ///
    /// Returns the new preset if this window triggered a degradation step.
    pub fn sample_window(&self, now: Instant) -> Option<Preset> {
        let fps = {
            let mut inner = self.inner.lock();
            if inner.state != MonitorState::Running {
                trace!("Ignoring sample window while stopped");
                return None;
            }
            let start = inner.window_start?;
            let elapsed = now.saturating_duration_since(start);
            if elapsed.is_zero() {
                return None;
            }
            inner.window_start = Some(now);
            self.counter.take() as f64 / elapsed.as_secs_f64()
        };
        self.record_sample(fps)
    }

    /// Feed one frame-rate sample into the degradation logic.
    ///
    /// Ignored while stopped. Returns the new preset if this sample triggered
    /// a degradation step.
    pub fn record_sample(&self, fps: f64) -> Option<Preset> {
        {
            let mut inner = self.inner.lock();
            if inner.state != MonitorState::Running {
                return None;
            }
            inner.last_fps = fps;
            if fps < self.config.target_fps {
                inner.low_samples += 1;
            } else {
                inner.low_samples = 0;
            }
            debug!(
                fps = format!("{:.1}", fps),
                target_fps = self.config.target_fps,
                low_samples = inner.low_samples,
                "Frame rate sample"
            );

            if inner.low_samples < self.config.adjust_threshold {
                return None;
            }
            inner.low_samples = 0;
        }

        let degraded = self.registry.update_settings(|s| {
            let next = s.active_preset.degraded();
            if let Some(next) = next {
                s.active_preset = next;
            }
            next
        });
        let Some((applied, next)) = degraded else {
            debug!("Frame rate low but already at lowest preset");
            return None;
        };

        info!(
            preset = %next,
            fps = format!("{:.1}", fps),
            "Frame rate below target, lowering quality"
        );
        self.announce(applied);
        Some(next)
    }

    /// Apply a preset by name, overriding the automatic loop.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::UnknownPreset`] if `name` is not a preset.
    pub fn set_preset(&self, name: &str) -> Result<Preset, ControllerError> {
        let preset: Preset = name.parse()?;
        self.select(preset);
        Ok(preset)
    }

    /// Apply a known preset, overriding the automatic loop.
    pub fn select(&self, preset: Preset) {
        if let Some((applied, ())) = self.registry.update_settings(|s| {
            s.active_preset = preset;
            Some(())
        }) {
            info!(preset = %preset, "Preset selected");
            self.announce(applied);
        }
    }

    /// Step the preset one position, wrapping at either end.
    pub fn cycle_preset(&self, direction: CycleDirection) -> Preset {
        let len = Preset::ORDERED.len();
        let cycled = self.registry.update_settings(|s| {
            let current = s.active_preset.index();
            let index = match direction {
                CycleDirection::HigherFidelity => (current + len - 1) % len,
                CycleDirection::LowerFidelity => (current + 1) % len,
            };
            s.active_preset = Preset::ORDERED[index];
            Some(s.active_preset)
        });
        match cycled {
            Some((applied, preset)) => {
                info!(preset = %preset, ?direction, "Preset cycled");
                self.announce(applied);
                preset
            }
            None => self.settings.active_preset(),
        }
    }

    fn announce(&self, applied: ViewerSettings) {
        self.engine.request_render();
        if let Some(callback) = &self.on_preset_change {
            callback(applied.active_preset);
        }
        self.bus
            .publish(applied.active_preset, applied.culling.frustum_culling_enabled);
    }
}

impl Drop for FrameRateMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
