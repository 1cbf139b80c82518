//! Deterministic in-memory backend.
//!
//! [`OfflineBackend`] implements [`AudioBackend`] without rendering audio. It
//! keeps the node graph, evaluates every parameter's [`Automation`] on demand,
//! and emits oscillator `Ended` events when its manually advanced clock passes
//! a stop time. Tests drive it like this:
//!
//! ```rust
//! use polytone_core::{AudioBackend, BackendEvent, NodeKind, OfflineBackend, ParamKind};
//!
//! let mut backend = OfflineBackend::new();
//! let osc = backend.create_node(NodeKind::Oscillator);
//! let amp = backend.create_node(NodeKind::Gain);
//! backend.connect(osc, amp).unwrap();
//! backend.connect(amp, backend.destination()).unwrap();
//!
//! backend.set_value_at_time(amp, ParamKind::Gain, 0.0, 0.0).unwrap();
//! backend.linear_ramp_to_value_at_time(amp, ParamKind::Gain, 1.0, 0.1).unwrap();
//! backend.start(osc, 0.0).unwrap();
//! backend.stop(osc, 0.2).unwrap();
//!
//! backend.advance_to(0.05).unwrap();
//! assert!((backend.param_value(amp, ParamKind::Gain).unwrap() - 0.5).abs() < 1e-6);
//!
//! backend.advance_to(0.25).unwrap();
//! assert_eq!(backend.drain_events(), vec![BackendEvent::Ended(osc)]);
//! ```

use crate::automation::Automation;
use crate::backend::{AudioBackend, BackendEvent, BackendState};
use crate::curve::ShaperCurve;
use crate::error::GraphError;
use crate::node::{FilterType, NodeId, NodeKind, ParamKind, Waveform};

/// Playback bookkeeping for an oscillator node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OscillatorState {
    /// Scheduled start time, once started
    pub start: Option<f64>,
    /// Scheduled stop time, once stopped
    pub stop: Option<f64>,
    /// Whether the ended event has fired
    pub ended: bool,
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    params: Vec<(ParamKind, Automation)>,
    outputs: Vec<NodeId>,
    released: bool,
    waveform: Waveform,
    filter_type: FilterType,
    curve: Option<ShaperCurve>,
    osc: OscillatorState,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            params: kind
                .params()
                .iter()
                .map(|&(param, initial)| (param, Automation::new(initial)))
                .collect(),
            outputs: Vec::new(),
            released: false,
            waveform: Waveform::Sine,
            filter_type: FilterType::Lowpass,
            curve: None,
            osc: OscillatorState::default(),
        }
    }
}

/// In-memory [`AudioBackend`] with a manually advanced clock.
#[derive(Debug)]
pub struct OfflineBackend {
    nodes: Vec<NodeData>,
    destination: NodeId,
    now: f64,
    state: BackendState,
    resume_pending: bool,
    events: Vec<BackendEvent>,
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineBackend {
    /// Create a running backend at time 0.
    pub fn new() -> Self {
        let mut backend = Self::suspended();
        backend.state = BackendState::Running;
        backend
    }

    /// Create a suspended backend at time 0.
    ///
    /// A [`request_resume`](AudioBackend::request_resume) takes effect on the
    /// next [`advance_to`](Self::advance_to), the way a real context confirms
    /// asynchronously.
    pub fn suspended() -> Self {
        let mut backend = Self {
            nodes: Vec::new(),
            destination: NodeId(0),
            now: 0.0,
            state: BackendState::Suspended,
            resume_pending: false,
            events: Vec::new(),
        };
        backend.destination = backend.push_node(NodeKind::Destination);
        backend
    }

    /// Shut the backend down. Pending resumes are dropped.
    pub fn close(&mut self) {
        self.state = BackendState::Closed;
        self.resume_pending = false;
    }

    /// Move the clock forward to `time`, completing a pending resume and
    /// firing `Ended` for every oscillator whose stop time has passed.
    pub fn advance_to(&mut self, time: f64) -> Result<(), GraphError> {
        if time < self.now {
            return Err(GraphError::NonMonotonicTime {
                requested: time,
                current: self.now,
            });
        }
        self.now = time;

        if self.resume_pending && self.state == BackendState::Suspended {
            self.state = BackendState::Running;
            self.resume_pending = false;
        }

        let mut due: Vec<(f64, NodeId)> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == NodeKind::Oscillator && !n.released && !n.osc.ended)
            .filter_map(|(i, n)| n.osc.stop.filter(|&s| s <= time).map(|s| (s, NodeId(i as u32))))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, id) in due {
            self.nodes[id.0 as usize].osc.ended = true;
            self.events.push(BackendEvent::Ended(id));
            #[cfg(feature = "tracing")]
            tracing::trace!("offline: {id} ended");
        }
        Ok(())
    }

    /// Advance the clock by `delta` seconds.
    pub fn advance_by(&mut self, delta: f64) -> Result<(), GraphError> {
        self.advance_to(self.now + delta.max(0.0))
    }

    /// Number of nodes that have not been released (destination included).
    pub fn live_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.released).count()
    }

    /// Number of oscillators that have not been released.
    pub fn live_oscillator_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Oscillator && !n.released)
            .count()
    }

    /// Number of oscillators started and not yet ended or released.
    pub fn sounding_oscillator_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| {
                n.kind == NodeKind::Oscillator
                    && !n.released
                    && !n.osc.ended
                    && n.osc.start.is_some_and(|s| s <= self.now)
            })
            .count()
    }

    /// Kind of a node, released or not.
    pub fn node_kind(&self, node: NodeId) -> Result<NodeKind, GraphError> {
        self.node(node).map(|n| n.kind)
    }

    /// Whether the node has been released.
    pub fn is_released(&self, node: NodeId) -> Result<bool, GraphError> {
        self.node(node).map(|n| n.released)
    }

    /// Outgoing connections of a live node.
    pub fn outputs_of(&self, node: NodeId) -> Result<&[NodeId], GraphError> {
        self.live(node).map(|n| n.outputs.as_slice())
    }

    /// Live nodes whose output feeds `node`.
    pub fn inputs_of(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.released && n.outputs.contains(&node))
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    /// Evaluate a parameter at an arbitrary time.
    pub fn param_value_at(
        &self,
        node: NodeId,
        param: ParamKind,
        time: f64,
    ) -> Result<f32, GraphError> {
        self.automation(node, param).map(|a| a.value_at(time))
    }

    /// The automation timeline of a parameter.
    pub fn automation(&self, node: NodeId, param: ParamKind) -> Result<&Automation, GraphError> {
        let data = self.live(node)?;
        data.params
            .iter()
            .find(|(p, _)| *p == param)
            .map(|(_, a)| a)
            .ok_or(GraphError::NoSuchParam {
                node,
                kind: data.kind,
                param,
            })
    }

    /// Playback bookkeeping of an oscillator.
    pub fn oscillator_state(&self, node: NodeId) -> Result<OscillatorState, GraphError> {
        let data = self.expect_kind(node, NodeKind::Oscillator)?;
        Ok(data.osc)
    }

    /// Waveform of an oscillator.
    pub fn waveform_of(&self, node: NodeId) -> Result<Waveform, GraphError> {
        self.expect_kind(node, NodeKind::Oscillator).map(|n| n.waveform)
    }

    /// Response type of a filter.
    pub fn filter_type_of(&self, node: NodeId) -> Result<FilterType, GraphError> {
        self.expect_kind(node, NodeKind::Filter).map(|n| n.filter_type)
    }

    /// Transfer curve of a waveshaper, if one was set.
    pub fn curve_of(&self, node: NodeId) -> Result<Option<&ShaperCurve>, GraphError> {
        self.expect_kind(node, NodeKind::WaveShaper).map(|n| n.curve.as_ref())
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(kind));
        id
    }

    fn node(&self, node: NodeId) -> Result<&NodeData, GraphError> {
        self.nodes
            .get(node.0 as usize)
            .ok_or(GraphError::NodeNotFound(node))
    }

    fn live(&self, node: NodeId) -> Result<&NodeData, GraphError> {
        let data = self.node(node)?;
        if data.released {
            return Err(GraphError::NodeReleased(node));
        }
        Ok(data)
    }

    fn live_mut(&mut self, node: NodeId) -> Result<&mut NodeData, GraphError> {
        let data = self
            .nodes
            .get_mut(node.0 as usize)
            .ok_or(GraphError::NodeNotFound(node))?;
        if data.released {
            return Err(GraphError::NodeReleased(node));
        }
        Ok(data)
    }

    fn expect_kind(&self, node: NodeId, expected: NodeKind) -> Result<&NodeData, GraphError> {
        let data = self.live(node)?;
        if data.kind != expected {
            return Err(GraphError::WrongNodeKind {
                node,
                expected,
                actual: data.kind,
            });
        }
        Ok(data)
    }

    fn expect_kind_mut(
        &mut self,
        node: NodeId,
        expected: NodeKind,
    ) -> Result<&mut NodeData, GraphError> {
        let data = self.live_mut(node)?;
        if data.kind != expected {
            return Err(GraphError::WrongNodeKind {
                node,
                expected,
                actual: data.kind,
            });
        }
        Ok(data)
    }

    fn automation_mut(
        &mut self,
        node: NodeId,
        param: ParamKind,
    ) -> Result<&mut Automation, GraphError> {
        let data = self.live_mut(node)?;
        let kind = data.kind;
        data.params
            .iter_mut()
            .find(|(p, _)| *p == param)
            .map(|(_, a)| a)
            .ok_or(GraphError::NoSuchParam { node, kind, param })
    }
}

impl AudioBackend for OfflineBackend {
    fn current_time(&self) -> f64 {
        self.now
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn request_resume(&mut self) {
        if self.state == BackendState::Suspended {
            self.resume_pending = true;
        }
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.push_node(kind);
        #[cfg(feature = "tracing")]
        tracing::trace!("offline: create {kind:?} {id}");
        id
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        self.live(to)?;
        let source = self.live_mut(from)?;
        if source.kind == NodeKind::Destination {
            return Err(GraphError::InvalidState {
                node: from,
                reason: "destination has no output",
            });
        }
        if !source.outputs.contains(&to) {
            source.outputs.push(to);
        }
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), GraphError> {
        self.live_mut(node)?.outputs.clear();
        Ok(())
    }

    fn release_node(&mut self, node: NodeId) -> Result<(), GraphError> {
        if node == self.destination {
            return Err(GraphError::InvalidState {
                node,
                reason: "destination cannot be released",
            });
        }
        let data = self.live_mut(node)?;
        data.released = true;
        data.outputs.clear();
        for other in &mut self.nodes {
            other.outputs.retain(|&o| o != node);
        }
        #[cfg(feature = "tracing")]
        tracing::trace!("offline: release {node}");
        Ok(())
    }

    fn set_waveform(&mut self, node: NodeId, waveform: Waveform) -> Result<(), GraphError> {
        self.expect_kind_mut(node, NodeKind::Oscillator)?.waveform = waveform;
        Ok(())
    }

    fn set_filter_type(&mut self, node: NodeId, filter_type: FilterType) -> Result<(), GraphError> {
        self.expect_kind_mut(node, NodeKind::Filter)?.filter_type = filter_type;
        Ok(())
    }

    fn set_curve(&mut self, node: NodeId, curve: ShaperCurve) -> Result<(), GraphError> {
        self.expect_kind_mut(node, NodeKind::WaveShaper)?.curve = Some(curve);
        Ok(())
    }

    fn start(&mut self, node: NodeId, at: f64) -> Result<(), GraphError> {
        let data = self.expect_kind_mut(node, NodeKind::Oscillator)?;
        if data.osc.start.is_some() {
            return Err(GraphError::InvalidState {
                node,
                reason: "oscillator already started",
            });
        }
        data.osc.start = Some(at);
        Ok(())
    }

    fn stop(&mut self, node: NodeId, at: f64) -> Result<(), GraphError> {
        let data = self.expect_kind_mut(node, NodeKind::Oscillator)?;
        let Some(start) = data.osc.start else {
            return Err(GraphError::InvalidState {
                node,
                reason: "oscillator was never started",
            });
        };
        if data.osc.ended {
            return Err(GraphError::InvalidState {
                node,
                reason: "oscillator already stopped",
            });
        }
        data.osc.stop = Some(at.max(start));
        Ok(())
    }

    fn param_value(&self, node: NodeId, param: ParamKind) -> Result<f32, GraphError> {
        self.param_value_at(node, param, self.now)
    }

    fn set_value_at_time(
        &mut self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        at: f64,
    ) -> Result<(), GraphError> {
        self.automation_mut(node, param)?.set_value_at(value, at);
        Ok(())
    }

    fn linear_ramp_to_value_at_time(
        &mut self,
        node: NodeId,
        param: ParamKind,
        value: f32,
        at: f64,
    ) -> Result<(), GraphError> {
        self.automation_mut(node, param)?.linear_ramp_to(value, at);
        Ok(())
    }

    fn cancel_scheduled_values(
        &mut self,
        node: NodeId,
        param: ParamKind,
        from: f64,
    ) -> Result<(), GraphError> {
        self.automation_mut(node, param)?.cancel_from(from);
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<BackendEvent> {
        core::mem::take(&mut self.events)
    }
}
