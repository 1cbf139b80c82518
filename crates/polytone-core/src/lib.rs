//! Polytone Core - audio-graph backend seam
//!
//! This crate defines how the polytone voice engine talks to a real-time audio
//! rendering backend. The engine never processes samples itself: it creates
//! nodes, connects them, and schedules time-stamped parameter automation.
//!
//! # Core Abstractions
//!
//! ## Backend
//!
//! - [`AudioBackend`] - Monotonic clock, node graph, automation primitives
//! - [`BackendState`] / [`BackendEvent`] - Readiness and oscillator completion
//! - [`OfflineBackend`] - Deterministic in-memory implementation for tests and tooling
//!
//! ## Graph Handles
//!
//! - [`NodeId`] - Opaque node handle, never reused
//! - [`NodeKind`] / [`ParamKind`] - Node roles and their automatable parameters
//! - [`Waveform`], [`FilterType`], [`ShaperCurve`] - Node configuration
//!
//! ## Automation
//!
//! - [`Automation`] - Set-value / linear-ramp timeline with cancel semantics
//!
//! ## Timers
//!
//! - [`Ticker`] - Fixed-period control-rate timer
//! - [`DeferredQueue`] - Items released at an absolute time
//!
//! # Example
//!
//! ```rust
//! use polytone_core::{AudioBackend, NodeKind, OfflineBackend, ParamKind};
//!
//! let mut backend = OfflineBackend::new();
//! let amp = backend.create_node(NodeKind::Gain);
//! backend.connect(amp, backend.destination()).unwrap();
//!
//! backend.set_value_at_time(amp, ParamKind::Gain, 0.0, 0.0).unwrap();
//! backend.linear_ramp_to_value_at_time(amp, ParamKind::Gain, 0.8, 0.01).unwrap();
//!
//! assert!((backend.param_value_at(amp, ParamKind::Gain, 0.01).unwrap() - 0.8).abs() < 1e-6);
//! ```

pub mod automation;
pub mod backend;
pub mod curve;
pub mod error;
pub mod math;
pub mod node;
pub mod offline;
pub mod timer;

// Re-export main types at crate root
pub use automation::{Automation, AutomationEvent, AutomationKind};
pub use backend::{AudioBackend, BackendEvent, BackendState};
pub use curve::{DEFAULT_CURVE_SIZE, ShaperCurve};
pub use error::GraphError;
pub use math::{cents_to_ratio, clamp_signed, clamp01, midi_to_hz, wrap01};
pub use node::{FilterType, NodeId, NodeKind, ParamKind, Waveform};
pub use offline::{OfflineBackend, OscillatorState};
pub use timer::{DeferredQueue, Ticker};
