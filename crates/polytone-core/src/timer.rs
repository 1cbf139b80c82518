//! Control-rate timers.
//!
//! The engine runs on a single control thread and never blocks. Work that has
//! to happen "later" is expressed as data the control loop polls with the
//! backend clock:
//!
//! - [`Ticker`] - a fixed-period timer for slow modulation refresh. It is an
//!   approximation of continuous modulation, not sample-accurate: a tick fires
//!   on the first poll at or after its due time, and missed periods are
//!   skipped rather than replayed.
//! - [`DeferredQueue`] - items due at an absolute time (e.g. retiring graph
//!   handles). Unlike an ad hoc timeout, the queue can be drained on demand so
//!   a forced teardown disposes everything synchronously.

/// Fixed-period timer polled against an external clock.
///
/// # Example
///
/// ```rust
/// use polytone_core::Ticker;
///
/// let mut ticker = Ticker::new(0.016, 0.0);
/// assert!(!ticker.poll(0.010));
/// assert!(ticker.poll(0.016));
/// assert!(!ticker.poll(0.020));
/// // A long stall fires once, not once per missed period.
/// assert!(ticker.poll(1.0));
/// assert!(!ticker.poll(1.001));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ticker {
    period: f64,
    next_due: f64,
}

impl Ticker {
    /// Smallest accepted period, in seconds.
    pub const MIN_PERIOD: f64 = 0.001;

    /// Create a ticker whose first tick is due one period after `now`.
    pub fn new(period: f64, now: f64) -> Self {
        let period = if period.is_finite() {
            period.max(Self::MIN_PERIOD)
        } else {
            Self::MIN_PERIOD
        };
        Self {
            period,
            next_due: now + period,
        }
    }

    /// Tick period in seconds.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// Time the next tick is due.
    pub fn next_due(&self) -> f64 {
        self.next_due
    }

    /// Returns `true` if a tick is due at `now`, and schedules the next one.
    pub fn poll(&mut self, now: f64) -> bool {
        if now < self.next_due {
            return false;
        }
        let missed = ((now - self.next_due) / self.period).floor();
        self.next_due += (missed + 1.0) * self.period;
        true
    }
}

/// Items released at an absolute due time.
#[derive(Clone, Debug)]
pub struct DeferredQueue<T> {
    items: Vec<(f64, T)>,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DeferredQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Schedule `item` for `due`.
    pub fn push(&mut self, due: f64, item: T) {
        // Stable for equal due times.
        let at = self.items.partition_point(|(d, _)| *d <= due);
        self.items.insert(at, (due, item));
    }

    /// Remove and return every item due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: f64) -> Vec<T> {
        let split = self.items.partition_point(|(d, _)| *d <= now);
        self.items.drain(..split).map(|(_, item)| item).collect()
    }

    /// Remove and return everything regardless of due time.
    pub fn drain_all(&mut self) -> Vec<T> {
        self.items.drain(..).map(|(_, item)| item).collect()
    }

    /// Due time of the earliest item.
    pub fn next_due(&self) -> Option<f64> {
        self.items.first().map(|(d, _)| *d)
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate pending items in due order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(_, item)| item)
    }
}
