//! Engine timing configuration.
//!
//! These are control-rate constants of the voice engine, not patch
//! parameters: they shape how changes are applied, not how a note sounds.
//! With the `serde` feature the struct deserializes from kebab-case keys and
//! every key is optional:
//!
//! ```toml
//! tick-period = 0.01
//! crossfade = 0.05
//! ```

/// Shortest allowed timing window in seconds.
pub const MIN_WINDOW: f64 = 0.001;

/// Timing constants of the voice engine, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "kebab-case"))]
pub struct EngineConfig {
    /// Period of the per-voice modulation refresh.
    ///
    /// Modulation is sampled at this rate, so it approximates continuous
    /// modulation and is not sample-accurate.
    pub tick_period: f64,
    /// Overlap of old and new unison stacks during a rebuild
    pub crossfade: f64,
    /// Gap between the end of the release ramp and the oscillator stop
    pub release_guard: f64,
    /// Mute ramp used when a voice is stolen or panicked
    pub force_stop_ramp: f64,
    /// Glide applied to oscillator detune when only the spread changes
    pub detune_glide: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: 0.016,
            crossfade: 0.03,
            release_guard: 0.02,
            force_stop_ramp: 0.003,
            detune_glide: 0.02,
        }
    }
}

impl EngineConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the modulation refresh period.
    pub fn with_tick_period(mut self, seconds: f64) -> Self {
        self.tick_period = window(seconds);
        self
    }

    /// Set the unison crossfade window.
    pub fn with_crossfade(mut self, seconds: f64) -> Self {
        self.crossfade = window(seconds);
        self
    }

    /// Set the release guard margin.
    pub fn with_release_guard(mut self, seconds: f64) -> Self {
        self.release_guard = window(seconds);
        self
    }

    /// Set the force-stop mute ramp.
    pub fn with_force_stop_ramp(mut self, seconds: f64) -> Self {
        self.force_stop_ramp = window(seconds);
        self
    }

    /// Set the detune glide.
    pub fn with_detune_glide(mut self, seconds: f64) -> Self {
        self.detune_glide = window(seconds);
        self
    }

    /// Copy with every window raised to [`MIN_WINDOW`].
    ///
    /// Deserialized configs bypass the builders; the engine sanitizes what it
    /// is given.
    pub fn sanitized(self) -> Self {
        Self {
            tick_period: window(self.tick_period),
            crossfade: window(self.crossfade),
            release_guard: window(self.release_guard),
            force_stop_ramp: window(self.force_stop_ramp),
            detune_glide: window(self.detune_glide),
        }
    }
}

fn window(seconds: f64) -> f64 {
    if seconds.is_nan() { MIN_WINDOW } else { seconds.max(MIN_WINDOW) }
}
