//! ScanView - adaptive performance presets for a streamed point-cloud viewer
//!
//! This library keeps a tileset renderer inside a frame budget. It applies
//! coherent rendering-budget presets to every loaded dataset and degrades the
//! preset automatically when the achieved frame rate stays below target.
//!
//! # Modules
//!
//! - [`preset`]: the ordered preset table
//! - [`registry`]: loaded datasets and the preset-to-parameter mapping
//! - [`monitor`]: frame-rate sampling and automatic degradation
//! - [`notify`]: settings-change observers
//! - [`culling`]: the frustum-culling toggle
//! - [`controller`]: the facade a UI talks to
//! - [`engine`]: the rendering-engine interface, plus an in-process simulation

pub mod config;
pub mod controller;
pub mod culling;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod preset;
pub mod registry;
pub mod settings;
pub mod stats;

pub use controller::{Shortcut, ViewerConfig, ViewerController};
pub use error::ControllerError;
pub use preset::{Preset, PresetBundle};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
