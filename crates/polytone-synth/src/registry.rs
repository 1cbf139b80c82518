//! Bounded voice pool with oldest-first stealing.
//!
//! The registry tracks at most `max_voices` voices, one per pitch, in
//! insertion order. Voices it evicts or panics are force-stopped and parked on
//! a stopping list until their completion arrives, so their graph is still
//! released exactly once and a late completion can never touch a newer voice
//! of the same pitch.

use polytone_core::{AudioBackend, NodeId};
use tracing::debug;

use crate::patch::MAX_VOICES_RANGE;
use crate::voice::Voice;

/// Active voices keyed by pitch, oldest first.
#[derive(Debug)]
pub struct VoiceRegistry {
    voices: Vec<Voice>,
    stopping: Vec<Voice>,
    max_voices: usize,
}

impl VoiceRegistry {
    /// Create an empty registry. The limit is clamped to 1..=64.
    pub fn new(max_voices: usize) -> Self {
        Self {
            voices: Vec::new(),
            stopping: Vec::new(),
            max_voices: clamp_max(max_voices),
        }
    }

    /// Current polyphony limit.
    pub fn max_voices(&self) -> usize {
        self.max_voices
    }

    /// Number of tracked voices.
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether no voice is tracked.
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Whether a voice for `midi` is tracked.
    pub fn contains(&self, midi: u8) -> bool {
        self.position(midi).is_some()
    }

    /// The tracked voice for `midi`.
    pub fn get(&self, midi: u8) -> Option<&Voice> {
        self.position(midi).map(|i| &self.voices[i])
    }

    /// Tracked voices, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    /// Pitches of tracked voices, oldest first.
    pub fn pitches(&self) -> Vec<u8> {
        self.voices.iter().map(Voice::midi).collect()
    }

    /// Evicted or panicked voices still waiting for their completion.
    pub fn stopping(&self) -> &[Voice] {
        &self.stopping
    }

    /// Insert `voice`, evicting oldest voices first while at capacity.
    ///
    /// The caller must not add a pitch that is already tracked. Returns the
    /// pitches that were stopped to make room.
    pub fn add<B: AudioBackend>(&mut self, backend: &mut B, voice: Voice, now: f64) -> Vec<u8> {
        debug_assert!(!self.contains(voice.midi()), "pitch {} already tracked", voice.midi());
        let mut stopped = Vec::new();
        while self.voices.len() >= self.max_voices {
            stopped.extend(self.evict_oldest(backend, now));
        }
        self.voices.push(voice);
        stopped
    }

    /// Release the voice for `midi`; a no-op if none is tracked.
    pub fn release<B: AudioBackend>(&mut self, backend: &mut B, midi: u8, now: f64) {
        if let Some(i) = self.position(midi) {
            self.voices[i].release(backend, now);
        }
    }

    /// Change the limit and evict oldest voices until within it.
    ///
    /// Returns the evicted pitches.
    pub fn set_max_voices<B: AudioBackend>(&mut self, backend: &mut B, max_voices: usize, now: f64) -> Vec<u8> {
        self.max_voices = clamp_max(max_voices);
        let mut evicted = Vec::new();
        while self.voices.len() > self.max_voices {
            evicted.extend(self.evict_oldest(backend, now));
        }
        evicted
    }

    /// Force-stop every voice and stop tracking all of them.
    pub fn panic<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        let voices = std::mem::take(&mut self.voices);
        debug!(count = voices.len(), "panic");
        for voice in voices {
            self.retire(backend, voice, now);
        }
    }

    /// Stop tracking the voice for `midi` without stopping it.
    pub fn remove(&mut self, midi: u8) -> Option<Voice> {
        self.position(midi).map(|i| self.voices.remove(i))
    }

    /// Route an oscillator `Ended` event to the voice it completes.
    ///
    /// The completed voice (tracked or stopping) releases its graph and is
    /// dropped. Returns its pitch, or `None` when `node` completes nothing.
    pub fn complete<B: AudioBackend>(&mut self, backend: &mut B, node: NodeId) -> Option<u8> {
        if let Some(i) = self.voices.iter().position(|v| v.lifecycle_node() == node) {
            let midi = self.voices[i].midi();
            if self.voices[i].handle_ended(backend, node) {
                self.remove(midi);
                return Some(midi);
            }
            return None;
        }
        if let Some(i) = self.stopping.iter().position(|v| v.lifecycle_node() == node)
            && self.stopping[i].handle_ended(backend, node)
        {
            return Some(self.stopping.remove(i).midi());
        }
        None
    }

    /// Run control-rate work on every voice.
    pub fn tick<B: AudioBackend>(&mut self, backend: &mut B, now: f64) {
        for voice in self.voices.iter_mut().chain(self.stopping.iter_mut()) {
            voice.tick(backend, now);
        }
    }

    /// Apply `run` to every tracked voice, oldest first.
    pub fn for_each_voice(&mut self, mut run: impl FnMut(&mut Voice)) {
        for voice in &mut self.voices {
            run(voice);
        }
    }

    /// Release every node of every voice, tracked or stopping, right now.
    pub fn teardown<B: AudioBackend>(&mut self, backend: &mut B) {
        for mut voice in self.voices.drain(..).chain(self.stopping.drain(..)) {
            voice.teardown(backend);
        }
    }

    fn position(&self, midi: u8) -> Option<usize> {
        self.voices.iter().position(|v| v.midi() == midi)
    }

    fn evict_oldest<B: AudioBackend>(&mut self, backend: &mut B, now: f64) -> Option<u8> {
        if self.voices.is_empty() {
            return None;
        }
        let oldest = self.voices.remove(0);
        let midi = oldest.midi();
        debug!(midi, max_voices = self.max_voices, "voice stolen");
        self.retire(backend, oldest, now);
        Some(midi)
    }

    fn retire<B: AudioBackend>(&mut self, backend: &mut B, mut voice: Voice, now: f64) {
        voice.force_stop(backend, now);
        if !voice.is_stopped() {
            self.stopping.push(voice);
        }
    }
}

fn clamp_max(max_voices: usize) -> usize {
    max_voices.clamp(MAX_VOICES_RANGE.0, MAX_VOICES_RANGE.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::mod_matrix::ModMatrix;
    use crate::patch::Patch;
    use crate::voice::VoiceState;
    use polytone_core::{BackendEvent, OfflineBackend};

    fn started(backend: &mut OfflineBackend, midi: u8) -> Voice {
        let out = backend.destination();
        let now = backend.current_time();
        let mut voice = Voice::new(
            backend,
            out,
            midi,
            1.0,
            &Patch::default(),
            &ModMatrix::new(),
            &EngineConfig::default(),
        )
        .unwrap();
        voice.start(backend, now);
        voice
    }

    fn drain(backend: &mut OfflineBackend, registry: &mut VoiceRegistry) -> Vec<u8> {
        let mut done = Vec::new();
        for BackendEvent::Ended(node) in backend.drain_events() {
            done.extend(registry.complete(backend, node));
        }
        done
    }

    #[test]
    fn test_oldest_is_evicted() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(2);
        for midi in [60, 64, 67] {
            let voice = started(&mut backend, midi);
            registry.add(&mut backend, voice, 0.0);
        }
        assert_eq!(registry.pitches(), vec![64, 67]);
        assert_eq!(registry.stopping().len(), 1);
        assert!(registry.stopping()[0].is_forced());
    }

    #[test]
    fn test_stolen_completion_leaves_new_voice_of_same_pitch() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(1);
        let first = started(&mut backend, 60);
        registry.add(&mut backend, first, 0.0);
        let other = started(&mut backend, 64);
        assert_eq!(registry.add(&mut backend, other, 0.0), vec![60]);
        let again = started(&mut backend, 60);
        assert_eq!(registry.add(&mut backend, again, 0.0), vec![64]);
        let node = registry.get(60).unwrap().lifecycle_node();

        // Completions of the stolen voices must not remove the new one.
        backend.advance_to(0.1).unwrap();
        let mut done = drain(&mut backend, &mut registry);
        done.sort_unstable();
        assert_eq!(done, vec![60, 64]);
        assert!(registry.stopping().is_empty());
        let voice = registry.get(60).unwrap();
        assert_eq!(voice.lifecycle_node(), node);
        assert_eq!(voice.state(), VoiceState::Active);
    }

    #[test]
    fn test_release_unknown_pitch_is_noop() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(4);
        registry.release(&mut backend, 42, 0.0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_release_then_completion_removes_once() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(4);
        let voice = started(&mut backend, 60);
        registry.add(&mut backend, voice, 0.0);

        backend.advance_to(0.1).unwrap();
        registry.release(&mut backend, 60, 0.1);
        assert_eq!(registry.get(60).unwrap().state(), VoiceState::Released);

        backend.advance_to(1.0).unwrap();
        assert_eq!(drain(&mut backend, &mut registry), vec![60]);
        assert!(registry.is_empty());
        backend.advance_to(2.0).unwrap();
        assert!(drain(&mut backend, &mut registry).is_empty());
    }

    #[test]
    fn test_shrinking_limit_evicts_oldest() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(8);
        for midi in 60..65 {
            let voice = started(&mut backend, midi);
            registry.add(&mut backend, voice, 0.0);
        }
        let evicted = registry.set_max_voices(&mut backend, 2, 0.0);
        assert_eq!(evicted, vec![60, 61, 62]);
        assert_eq!(registry.pitches(), vec![63, 64]);
        assert_eq!(registry.set_max_voices(&mut backend, 0, 0.0), vec![63]);
        assert_eq!(registry.max_voices(), 1);
    }

    #[test]
    fn test_panic_empties_and_frees_everything() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(8);
        for midi in [48, 52, 55] {
            let voice = started(&mut backend, midi);
            registry.add(&mut backend, voice, 0.0);
        }
        registry.panic(&mut backend, 0.0);
        assert!(registry.is_empty());
        assert_eq!(registry.stopping().len(), 3);

        backend.advance_to(0.05).unwrap();
        let mut done = drain(&mut backend, &mut registry);
        done.sort_unstable();
        assert_eq!(done, vec![48, 52, 55]);
        assert!(registry.stopping().is_empty());
        assert_eq!(backend.live_node_count(), 1);
    }

    #[test]
    fn test_remove_keeps_voice_running() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(4);
        let voice = started(&mut backend, 60);
        registry.add(&mut backend, voice, 0.0);
        let voice = registry.remove(60).unwrap();
        assert_eq!(voice.state(), VoiceState::Active);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_teardown_releases_all_nodes() {
        let mut backend = OfflineBackend::new();
        let mut registry = VoiceRegistry::new(4);
        for midi in [60, 62] {
            let voice = started(&mut backend, midi);
            registry.add(&mut backend, voice, 0.0);
        }
        registry.panic(&mut backend, 0.0);
        let voice = started(&mut backend, 64);
        registry.add(&mut backend, voice, 0.0);
        registry.teardown(&mut backend);
        assert_eq!(backend.live_node_count(), 1);
    }
}
