//! Text formats accepted on the command line.
//!
//! - Note scripts: `60:0.0-0.5,64:0.1-0.6@0.8` (pitch, start, end, optional
//!   velocity).
//! - LFO breakpoints: `0:0,0.25:1,0.5:0,0.75:-1,1:0` (x:y pairs).
//! - Modulation routes: `env1>osc.unison-voices:1.0`, with an optional
//!   `:bipolar` suffix.

use polytone_synth::{LfoPoint, ModRoute, ModSource, ModTarget};

use crate::error::CliError;

/// One note of a script.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScriptNote {
    pub midi: u8,
    pub start: f64,
    pub end: f64,
    pub velocity: f32,
}

/// A note event on the script timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScriptEvent {
    On { midi: u8, velocity: f32 },
    Off { midi: u8 },
}

fn invalid(entry: &str, reason: impl Into<String>) -> CliError {
    CliError::InvalidScript {
        entry: entry.to_string(),
        reason: reason.into(),
    }
}

/// Parse a comma-separated note script.
pub fn parse_script(script: &str) -> Result<Vec<ScriptNote>, CliError> {
    let mut notes = Vec::new();
    for entry in script.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (body, velocity) = match entry.split_once('@') {
            Some((body, v)) => (
                body,
                v.parse::<f32>()
                    .map_err(|_| invalid(entry, "velocity is not a number"))?,
            ),
            None => (entry, 1.0),
        };
        let (midi, span) = body
            .split_once(':')
            .ok_or_else(|| invalid(entry, "expected pitch:start-end"))?;
        let midi = midi
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|m| *m <= 127)
            .ok_or_else(|| invalid(entry, "pitch must be 0-127"))?;
        let (start, end) = span
            .split_once('-')
            .ok_or_else(|| invalid(entry, "expected start-end"))?;
        let start = start
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(entry, "start is not a number"))?;
        let end = end
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(entry, "end is not a number"))?;
        if !(start >= 0.0 && end >= start) {
            return Err(invalid(entry, "need 0 <= start <= end"));
        }
        notes.push(ScriptNote {
            midi,
            start,
            end,
            velocity,
        });
    }
    if notes.is_empty() {
        return Err(invalid(script, "no notes"));
    }
    Ok(notes)
}

/// Flatten notes into time-ordered events. At equal times note-offs come
/// first, so a pitch can end and restart on the same instant.
pub fn timeline(notes: &[ScriptNote]) -> Vec<(f64, ScriptEvent)> {
    let mut events: Vec<(f64, ScriptEvent)> = notes
        .iter()
        .flat_map(|n| {
            [
                (n.start, ScriptEvent::On {
                    midi: n.midi,
                    velocity: n.velocity,
                }),
                (n.end, ScriptEvent::Off { midi: n.midi }),
            ]
        })
        .collect();
    events.sort_by(|a, b| {
        a.0.total_cmp(&b.0)
            .then_with(|| matches!(a.1, ScriptEvent::On { .. }).cmp(&matches!(b.1, ScriptEvent::On { .. })))
    });
    events
}

/// Parse `x:y` breakpoints.
pub fn parse_points(text: &str) -> Result<Vec<LfoPoint>, CliError> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let point = entry.split_once(':').and_then(|(x, y)| {
                Some(LfoPoint::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
            });
            point.ok_or_else(|| CliError::InvalidPoint {
                entry: entry.to_string(),
            })
        })
        .collect()
}

/// Parse `source>target:amount[:bipolar]`.
pub fn parse_route(text: &str) -> Result<ModRoute, CliError> {
    let fail = |reason: &str| CliError::InvalidRoute {
        entry: text.to_string(),
        reason: reason.to_string(),
    };
    let (source, rest) = text.split_once('>').ok_or_else(|| fail("expected source>target"))?;
    let mut parts = rest.split(':');
    let target = parts.next().unwrap_or_default();
    let amount = parts.next().ok_or_else(|| fail("missing amount"))?;
    let bipolar = match parts.next() {
        None => false,
        Some("bipolar") => true,
        Some(_) => return Err(fail("only 'bipolar' may follow the amount")),
    };

    let source = ModSource::ALL
        .into_iter()
        .find(|s| s.name() == source.trim())
        .ok_or_else(|| fail("unknown source"))?;
    let target = ModTarget::ALL
        .into_iter()
        .find(|t| t.name() == target.trim())
        .ok_or_else(|| fail("unknown target"))?;
    let amount = amount.trim().parse::<f32>().map_err(|_| fail("amount is not a number"))?;

    Ok(if bipolar {
        ModRoute::bipolar(source, target, amount)
    } else {
        ModRoute::new(source, target, amount)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let notes = parse_script("60:0.0-0.5, 64:0.1-0.6@0.8").unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].midi, 60);
        assert_eq!(notes[0].velocity, 1.0);
        assert!((notes[1].start - 0.1).abs() < 1e-12);
        assert!((notes[1].velocity - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_parse_script_rejects_garbage() {
        assert!(matches!(parse_script("60"), Err(CliError::InvalidScript { .. })));
        assert!(parse_script("200:0-1").is_err());
        assert!(parse_script("60:1-0.5").is_err());
        assert!(parse_script("60:a-1").is_err());
        assert!(parse_script(" , ").is_err());
    }

    #[test]
    fn test_timeline_orders_offs_first() {
        let notes = parse_script("60:0-0.5,60:0.5-1").unwrap();
        let events = timeline(&notes);
        assert_eq!(events.len(), 4);
        assert_eq!(events[1], (0.5, ScriptEvent::Off { midi: 60 }));
        assert!(matches!(events[2], (t, ScriptEvent::On { midi: 60, .. }) if (t - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_parse_points() {
        let points = parse_points("0:0, 0.5:1, 1:-1").unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[1], LfoPoint::new(0.5, 1.0));
        assert!(parse_points("0:0,oops").is_err());
    }

    #[test]
    fn test_parse_route() {
        let route = parse_route("env1>osc.unison-voices:1.0").unwrap();
        assert_eq!(route.source, ModSource::Env1);
        assert_eq!(route.target, ModTarget::UnisonVoices);
        assert!(!route.bipolar);

        let route = parse_route("lfo1>osc.unison-detune-cents:-2:bipolar").unwrap();
        assert!(route.bipolar);
        assert_eq!(route.amount, -1.0);

        assert!(parse_route("env1>filter.cutoff:1").is_err());
        assert!(parse_route("env1 osc.unison-voices").is_err());
        assert!(parse_route("env1>osc.unison-voices:1:wobble").is_err());
    }
}
