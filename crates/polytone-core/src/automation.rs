//! Parameter automation timelines.
//!
//! An [`Automation`] is the ordered list of scheduled changes for one node
//! parameter. Two primitives exist, mirroring what real-time audio backends
//! offer:
//!
//! - **Set value at time `T`**: a step change at `T`.
//! - **Linear ramp to value by time `T`**: interpolates from the previous
//!   event's `(time, value)` and reaches `value` exactly at `T`.
//!
//! Events are kept sorted by time. Events scheduled for the same time keep
//! their insertion order, so the later one wins from that instant on.
//!
//! ## Cancel and re-anchor
//!
//! A ramp scheduled earlier keeps running until it is cancelled. Callers that
//! change a parameter mid-ramp read the current value, cancel everything from
//! "now", and set that value at "now" before scheduling new segments:
//!
//! ```rust
//! use polytone_core::Automation;
//!
//! let mut gain = Automation::new(0.0);
//! gain.set_value_at(0.0, 0.0);
//! gain.linear_ramp_to(1.0, 1.0);
//!
//! // Halfway through the ramp a new target arrives.
//! let now = 0.5;
//! let held = gain.value_at(now);
//! gain.cancel_from(now);
//! gain.set_value_at(held, now);
//! gain.linear_ramp_to(0.0, 0.75);
//!
//! assert!((gain.value_at(0.5) - 0.5).abs() < 1e-6);
//! assert!((gain.value_at(0.625) - 0.25).abs() < 1e-6);
//! assert_eq!(gain.value_at(2.0), 0.0);
//! ```

/// How an event reaches its value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutomationKind {
    /// Step to the value at the event time.
    SetValue,
    /// Linear ramp from the previous event, arriving at the event time.
    LinearRamp,
}

/// A single scheduled change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutomationEvent {
    /// Event time in seconds on the backend clock
    pub time: f64,
    /// Target value
    pub value: f32,
    /// Step or ramp
    pub kind: AutomationKind,
}

/// Ordered automation timeline for one parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Automation {
    default_value: f32,
    events: Vec<AutomationEvent>,
}

impl Automation {
    /// Create an empty timeline that reads `default_value` until the first event.
    pub fn new(default_value: f32) -> Self {
        Self {
            default_value,
            events: Vec::new(),
        }
    }

    /// Value before any event applies.
    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    /// Scheduled events in time order.
    pub fn events(&self) -> &[AutomationEvent] {
        &self.events
    }

    /// Number of scheduled events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Schedule a step to `value` at `time`.
    pub fn set_value_at(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            kind: AutomationKind::SetValue,
        });
    }

    /// Schedule a linear ramp that reaches `value` at `time`.
    pub fn linear_ramp_to(&mut self, value: f32, time: f64) {
        self.insert(AutomationEvent {
            time,
            value,
            kind: AutomationKind::LinearRamp,
        });
    }

    /// Drop every event at or after `time`.
    pub fn cancel_from(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Evaluate the timeline at `time`.
    pub fn value_at(&self, time: f64) -> f32 {
        // Index of the first event strictly after `time`.
        let next = self.events.partition_point(|e| e.time <= time);

        if let Some(upcoming) = self.events.get(next) {
            if upcoming.kind == AutomationKind::LinearRamp {
                let Some(prev) = next.checked_sub(1).map(|i| self.events[i]) else {
                    return self.default_value;
                };
                let span = upcoming.time - prev.time;
                if span <= 0.0 {
                    return upcoming.value;
                }
                let t = ((time - prev.time) / span).clamp(0.0, 1.0) as f32;
                return prev.value + (upcoming.value - prev.value) * t;
            }
        }

        match next.checked_sub(1) {
            Some(i) => self.events[i].value,
            None => self.default_value,
        }
    }

    fn insert(&mut self, event: AutomationEvent) {
        // After any equal-time events, so the newest one wins.
        let at = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(at, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_before_events() {
        let mut a = Automation::new(0.25);
        a.set_value_at(1.0, 2.0);
        assert_eq!(a.value_at(0.0), 0.25);
        assert_eq!(a.value_at(1.999), 0.25);
        assert_eq!(a.value_at(2.0), 1.0);
    }

    #[test]
    fn test_linear_ramp_interpolates_from_previous_event() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 1.0);
        a.linear_ramp_to(1.0, 2.0);
        assert_eq!(a.value_at(1.0), 0.0);
        assert!((a.value_at(1.5) - 0.5).abs() < 1e-6);
        assert_eq!(a.value_at(2.0), 1.0);
        assert_eq!(a.value_at(9.0), 1.0);
    }

    #[test]
    fn test_equal_time_events_keep_insertion_order() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.3, 1.0);
        a.set_value_at(0.7, 1.0);
        assert_eq!(a.value_at(1.0), 0.7);
        assert_eq!(a.events()[0].value, 0.3);
    }

    #[test]
    fn test_ramp_without_anchor_holds_default() {
        let mut a = Automation::new(0.5);
        a.linear_ramp_to(1.0, 1.0);
        assert_eq!(a.value_at(0.5), 0.5);
        assert_eq!(a.value_at(1.0), 1.0);
    }

    #[test]
    fn test_cancel_from_removes_future_events() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.0, 0.0);
        a.linear_ramp_to(1.0, 1.0);
        a.set_value_at(0.2, 2.0);
        a.cancel_from(0.5);
        assert_eq!(a.len(), 1);
        assert_eq!(a.value_at(3.0), 0.0);
    }

    #[test]
    fn test_zero_length_ramp_jumps() {
        let mut a = Automation::new(0.0);
        a.set_value_at(0.4, 1.0);
        a.linear_ramp_to(0.9, 1.0);
        assert_eq!(a.value_at(1.0), 0.9);
    }
}
