//! Basemap Core Library
//!
//! Platform-agnostic viewport for an infinite, pannable and zoomable map:
//! coordinate conversion, click-vs-drag gestures, tracked elements and a
//! persisted undo/redo history.

pub mod camera;
pub mod config;
pub mod element;
pub mod gesture;
pub mod history;
pub mod input;
pub mod storage;
pub mod viewport;

pub use camera::{Camera, ViewportFrame};
pub use config::{ConfigError, ViewportConfig};
pub use element::{ElementId, ElementRegistry, ElementSnapshotRecord, RegistryEvent, TrackedElement};
pub use gesture::{GestureController, GestureEvent, GestureState};
pub use history::{HistoryError, HistoryIndex, HistoryManager};
pub use input::{
    InputTarget, KeyCommand, KeyInput, Modifiers, MouseButton, MouseInput, PointerIntent, TouchInput,
    TouchTracker, WheelInput,
};
pub use storage::{Compressor, ObjectStore, ScalarStore, ScalarValue, SessionStore, StorageError};
pub use viewport::{HistoryCommand, KeyResponse, Viewport, ViewportHooks};
