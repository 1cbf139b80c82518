//! The audio rendering backend seam.
//!
//! The voice engine never processes samples. It builds small node graphs and
//! schedules time-stamped parameter automation on whatever implements
//! [`AudioBackend`]; the backend renders sample-accurately against its own
//! monotonic clock.
//!
//! # Contract
//!
//! - [`current_time`](AudioBackend::current_time) is monotonic, in seconds.
//! - Automation is processed in time order; see [`Automation`](crate::Automation)
//!   for the exact evaluation rules.
//! - An oscillator emits exactly one [`BackendEvent::Ended`] when its stop time
//!   passes. Events are collected with [`drain_events`](AudioBackend::drain_events).
//! - A released node rejects every further operation.
//!
//! [`OfflineBackend`](crate::OfflineBackend) is the deterministic in-memory
//! implementation used by tests and the CLI.

use crate::curve::ShaperCurve;
use crate::error::GraphError;
use crate::node::{FilterType, NodeId, NodeKind, ParamKind, Waveform};

/// Lifecycle state of the backend's rendering context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendState {
    /// Created or paused; scheduling is accepted but nothing renders.
    #[default]
    Suspended,
    /// Rendering.
    Running,
    /// Shut down for good.
    Closed,
}

/// Notifications produced by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendEvent {
    /// An oscillator reached its stop time and produced its last sample.
    Ended(NodeId),
}

/// A real-time audio rendering backend driven by scheduled automation.
pub trait AudioBackend {
    /// Current time on the backend clock, in seconds.
    fn current_time(&self) -> f64;

    /// Current rendering state.
    fn state(&self) -> BackendState;

    /// Ask a suspended backend to start rendering.
    ///
    /// Completion is asynchronous: the state flips to [`BackendState::Running`]
    /// at some later point, observed through [`state`](Self::state).
    fn request_resume(&mut self);

    /// The hardware output node.
    fn destination(&self) -> NodeId;

    /// Create a node of the given kind.
    fn create_node(&mut self, kind: NodeKind) -> NodeId;

    /// Connect `from`'s output to `to`'s input.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError>;

    /// Remove every outgoing connection of `node`.
    fn disconnect(&mut self, node: NodeId) -> Result<(), GraphError>;

    /// Free the node. The handle is dead afterwards.
    fn release_node(&mut self, node: NodeId) -> Result<(), GraphError>;

    /// Set an oscillator's waveform.
    fn set_waveform(&mut self, node: NodeId, waveform: Waveform) -> Result<(), GraphError>;

    /// Set a filter's response type.
    fn set_filter_type(&mut self, node: NodeId, filter_type: FilterType) -> Result<(), GraphError>;

    /// Set a waveshaper's transfer curve.
    fn set_curve(&mut self, node: NodeId, curve: ShaperCurve) -> Result<(), GraphError>;

    /// Start an oscillator at `at`.
    fn start(&mut self, node: NodeId, at: f64) -> Result<(), GraphError>;

    /// Stop an oscillator at `at`. Stopping one that already ended is an error.
    fn stop(&mut self, node: NodeId, at: f64) -> Result<(), GraphError>;

    /// Value of a parameter at the current time.
    fn param_value(&self, node: NodeId, param: ParamKind) -> Result<f32, GraphError>;

    /// Schedule a step change.
    fn set_value_at_time(
        &mut self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        at: f64,
    ) -> Result<(), GraphError>;

    /// Schedule a linear ramp that arrives at `value` at `at`.
    fn linear_ramp_to_value_at_time(
        &mut self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        at: f64,
    ) -> Result<(), GraphError>;

    /// Cancel every scheduled change at or after `from`.
    fn cancel_scheduled_values(
        &mut self,
        node: NodeId,
        param: ParamKind,
        from: f64,
    ) -> Result<(), GraphError>;

    /// Take all pending notifications, oldest first.
    fn drain_events(&mut self) -> Vec<BackendEvent>;

    /// Cancel pending automation and pin the parameter at its current value.
    ///
    /// This is the re-anchor every scheduling call starts with, so a stale
    /// ramp from an earlier change can never fight a new one. Returns the
    /// held value.
    fn cancel_and_hold(&mut self, node: NodeId, param: ParamKind) -> Result<f32, GraphError> {
        let now = self.current_time();
        let value = self.param_value(node, param)?;
        self.cancel_scheduled_values(node, param, now)?;
        self.set_value_at_time(node, param, value, now)?;
        Ok(value)
    }
}
