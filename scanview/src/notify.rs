//! Settings-change notification bus.
//!
//! Observers are invoked synchronously in subscription order every time the
//! active preset or the culling flag changes. Each observer is isolated: one
//! that returns an error or panics is logged and skipped, and the remaining
//! observers still run.
//!
//! # Example
//!
//! ```
//! use scanview::notify::{ObserverError, SettingsBus, SettingsChange, SettingsObserver};
//! use scanview::preset::Preset;
//! use std::sync::Arc;
//!
//! let bus = SettingsBus::new();
//! let observer: Arc<dyn SettingsObserver> = Arc::new(|change: &SettingsChange| -> Result<(), ObserverError> {
//!     println!("preset is now {}", change.preset);
//!     Ok(())
//! });
//!
//! assert!(bus.subscribe(Arc::clone(&observer)));
//! bus.publish(Preset::Low, true);
//! assert!(bus.unsubscribe(&observer));
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::preset::Preset;

/// Error type observers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Payload delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsChange {
    pub preset: Preset,
    pub frustum_culling_enabled: bool,
}

/// Receiver of settings-change notifications.
pub trait SettingsObserver: Send + Sync {
    fn on_settings_changed(&self, change: &SettingsChange) -> Result<(), ObserverError>;
}

impl<F> SettingsObserver for F
where
    F: Fn(&SettingsChange) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_settings_changed(&self, change: &SettingsChange) -> Result<(), ObserverError> {
        self(change)
    }
}

/// Ordered observer list with per-observer failure isolation.
///
/// Observer identity is the `Arc` allocation: subscribing the same `Arc`
/// twice is a no-op, and unsubscribing needs a clone of that `Arc`.
#[derive(Default)]
pub struct SettingsBus {
    observers: Mutex<Vec<Arc<dyn SettingsObserver>>>,
}

impl std::fmt::Debug for SettingsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsBus")
            .field("observers", &self.len())
            .finish()
    }
}

impl SettingsBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Returns `false` if it was already registered.
    pub fn subscribe(&self, observer: Arc<dyn SettingsObserver>) -> bool {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| same_observer(o, &observer)) {
            return false;
        }
        observers.push(observer);
        true
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, observer: &Arc<dyn SettingsObserver>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !same_observer(o, observer));
        observers.len() != before
    }

    /// Notify every observer, in subscription order.
    ///
    /// Returns the number of observers that completed successfully.
    pub fn publish(&self, preset: Preset, frustum_culling_enabled: bool) -> usize {
        let change = SettingsChange {
            preset,
            frustum_culling_enabled,
        };
        // Observers may subscribe or unsubscribe from inside the callback.
        let observers = self.observers.lock().clone();

        let mut delivered = 0;
        for (position, observer) in observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_settings_changed(&change))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!(position, error = %e, "Settings observer failed");
                }
                Err(_) => {
                    tracing::error!(position, "Settings observer panicked");
                }
            }
        }

        tracing::debug!(
            preset = %preset,
            frustum_culling_enabled,
            delivered,
            total = observers.len(),
            "Published settings change"
        );
        delivered
    }

    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

fn same_observer(a: &Arc<dyn SettingsObserver>, b: &Arc<dyn SettingsObserver>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(log: &Log, label: &'static str) -> Arc<dyn SettingsObserver> {
        let log = Arc::clone(log);
        Arc::new(move |change: &SettingsChange| -> Result<(), ObserverError> {
            log.lock().push(format!("{}:{}", label, change.preset));
            Ok(())
        })
    }

    #[test]
    fn test_publish_in_subscription_order() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        bus.subscribe(recording(&log, "a"));
        bus.subscribe(recording(&log, "b"));

        assert_eq!(bus.publish(Preset::High, true), 2);
        assert_eq!(*log.lock(), ["a:high", "b:high"]);
    }

    #[test]
    fn test_duplicate_subscribe_is_noop() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        let observer = recording(&log, "a");

        assert!(bus.subscribe(Arc::clone(&observer)));
        assert!(!bus.subscribe(Arc::clone(&observer)));
        bus.publish(Preset::Low, true);

        assert_eq!(bus.len(), 1);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        bus.subscribe(recording(&log, "a"));

        assert!(!bus.unsubscribe(&recording(&log, "a")));
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        let observer = recording(&log, "a");
        bus.subscribe(Arc::clone(&observer));

        assert!(bus.unsubscribe(&observer));
        bus.publish(Preset::Ultra, false);
        assert!(log.lock().is_empty());
        assert!(bus.is_empty());
    }

    #[test]
    fn test_failing_observer_does_not_block_others() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        let failing: Arc<dyn SettingsObserver> =
            Arc::new(|_: &SettingsChange| Err::<(), ObserverError>("panel gone".into()));
        bus.subscribe(failing);
        bus.subscribe(recording(&log, "b"));

        assert_eq!(bus.publish(Preset::Medium, true), 1);
        assert_eq!(*log.lock(), ["b:medium"]);
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let log: Log = Arc::default();
        let bus = SettingsBus::new();
        let panicking: Arc<dyn SettingsObserver> =
            Arc::new(|_: &SettingsChange| -> Result<(), ObserverError> { panic!("boom") });
        bus.subscribe(recording(&log, "a"));
        bus.subscribe(panicking);
        bus.subscribe(recording(&log, "c"));

        assert_eq!(bus.publish(Preset::Low, false), 2);
        assert_eq!(*log.lock(), ["a:low", "c:low"]);
    }

    #[test]
    fn test_change_payload() {
        let seen: Arc<Mutex<Option<SettingsChange>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let bus = SettingsBus::new();
        bus.subscribe(Arc::new(move |change: &SettingsChange| -> Result<(), ObserverError> {
            *sink.lock() = Some(*change);
            Ok(())
        }));

        bus.publish(Preset::High, false);
        assert_eq!(
            *seen.lock(),
            Some(SettingsChange {
                preset: Preset::High,
                frustum_culling_enabled: false
            })
        );
    }
}
