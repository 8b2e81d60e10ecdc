// The chord chart: the engine's upstream input.
//
// A chart is an ordered list of (symbol, duration-in-beats) entries.
// Lookups are by absolute beat and wrap around the form, so a performance
// can run any number of choruses. Symbols resolve through the theory
// crate's resolver at lookup time; a symbol that fails to resolve makes
// that slot return `None` and the generators degrade (rest or hold)
// rather than stop.
//
// Charts load from JSON. A built-in demo chart (a twelve-bar jazz blues
// in F) keeps the binary usable with no input file, the same way default
// models back a missing data file.

use bandstand_theory::chord::{self, ChordContext};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;

/// One chart slot: a chord symbol held for a number of beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub symbol: String,
    pub beats: f64,
}

/// An ordered chord chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordChart {
    pub title: String,
    pub entries: Vec<ChartEntry>,
}

impl ChordChart {
    /// Load a chart from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let data = std::fs::read_to_string(path)?;
        let chart: ChordChart = serde_json::from_str(&data)?;
        Ok(chart)
    }

    /// Total length of one chorus in beats.
    pub fn total_beats(&self) -> f64 {
        self.entries.iter().map(|e| e.beats).sum()
    }

    /// The entry sounding at an absolute beat (wrapping past the form).
    pub fn entry_at(&self, beat: f64) -> Option<&ChartEntry> {
        let total = self.total_beats();
        if total <= 0.0 {
            return None;
        }
        let mut pos = beat.rem_euclid(total);
        for entry in &self.entries {
            if pos < entry.beats {
                return Some(entry);
            }
            pos -= entry.beats;
        }
        self.entries.last()
    }

    /// The chord context sounding at an absolute beat, if resolvable.
    pub fn context_at(&self, beat: f64) -> Option<ChordContext> {
        self.entry_at(beat).and_then(|e| chord::resolve(&e.symbol))
    }

    /// The context of the next chord change after an absolute beat,
    /// wrapping around the form. Used for look-ahead approach notes.
    pub fn next_context_after(&self, beat: f64) -> Option<ChordContext> {
        let total = self.total_beats();
        if total <= 0.0 {
            return None;
        }
        let mut pos = beat.rem_euclid(total);
        let mut idx = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if pos < entry.beats {
                idx = i;
                break;
            }
            pos -= entry.beats;
        }
        let next = &self.entries[(idx + 1) % self.entries.len()];
        chord::resolve(&next.symbol)
    }

    /// Chord changes that start inside `[start, start + len)` beats.
    pub fn changes_in(&self, start: f64, len: f64) -> usize {
        let total = self.total_beats();
        if total <= 0.0 {
            return 0;
        }
        let mut count = 0;
        let mut edge = 0.0;
        for entry in &self.entries {
            let s = start.rem_euclid(total);
            let wrapped = (edge - s).rem_euclid(total);
            if wrapped < len {
                count += 1;
            }
            edge += entry.beats;
        }
        count
    }

    /// Harmonic density over a window: how fast the changes come and how
    /// colored they are, folded into 0..1 for the energy chain.
    pub fn density_in(&self, start: f64, len: f64) -> f64 {
        if len <= 0.0 {
            return 0.0;
        }
        let changes = self.changes_in(start, len) as f64;
        let per_bar = changes / (len / 4.0);

        let mut altered = 0usize;
        let mut sampled = 0usize;
        let mut beat = start;
        while beat < start + len {
            if let Some(ctx) = self.context_at(beat) {
                sampled += 1;
                altered += ctx.altered_extension_count().min(1);
            }
            beat += 4.0;
        }
        let altered_frac = if sampled > 0 {
            altered as f64 / sampled as f64
        } else {
            0.0
        };

        ((per_bar / 2.0) * 0.7 + altered_frac * 0.3).clamp(0.0, 1.0)
    }

    /// The built-in demo chart: a twelve-bar jazz blues in F.
    pub fn demo() -> Self {
        let entry = |symbol: &str, beats: f64| ChartEntry {
            symbol: symbol.to_string(),
            beats,
        };
        ChordChart {
            title: "Demo Blues in F".to_string(),
            entries: vec![
                entry("F7", 4.0),
                entry("Bb7", 4.0),
                entry("F7", 4.0),
                entry("Cm7", 2.0),
                entry("F7", 2.0),
                entry("Bb7", 4.0),
                entry("B°7", 4.0),
                entry("F7", 4.0),
                entry("Am7", 2.0),
                entry("D7b9", 2.0),
                entry("Gm7", 4.0),
                entry("C7", 4.0),
                entry("Am7", 2.0),
                entry("D7", 2.0),
                entry("Gm7", 2.0),
                entry("C7", 2.0),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_chart_is_twelve_bars_and_fully_resolvable() {
        let chart = ChordChart::demo();
        assert_eq!(chart.total_beats(), 48.0);
        for entry in &chart.entries {
            assert!(
                chord::resolve(&entry.symbol).is_some(),
                "unresolvable demo symbol {}",
                entry.symbol
            );
        }
    }

    #[test]
    fn lookup_follows_entry_boundaries() {
        let chart = ChordChart::demo();
        assert_eq!(chart.entry_at(0.0).unwrap().symbol, "F7");
        assert_eq!(chart.entry_at(4.0).unwrap().symbol, "Bb7");
        assert_eq!(chart.entry_at(12.0).unwrap().symbol, "Cm7");
        assert_eq!(chart.entry_at(14.0).unwrap().symbol, "F7");
    }

    #[test]
    fn lookup_wraps_past_the_form() {
        let chart = ChordChart::demo();
        assert_eq!(
            chart.entry_at(48.0).unwrap().symbol,
            chart.entry_at(0.0).unwrap().symbol
        );
        assert_eq!(
            chart.entry_at(52.0).unwrap().symbol,
            chart.entry_at(4.0).unwrap().symbol
        );
    }

    #[test]
    fn next_context_wraps_to_the_top() {
        let chart = ChordChart::demo();
        // The last slot is C7; the next change wraps to the opening F7.
        let next = chart.next_context_after(46.0).unwrap();
        assert_eq!(next.root, 5);
    }

    #[test]
    fn density_is_normalized() {
        let chart = ChordChart::demo();
        for start in [0.0, 16.0, 32.0] {
            let d = chart.density_in(start, 16.0);
            assert!((0.0..=1.0).contains(&d), "density {d}");
        }
    }

    #[test]
    fn json_round_trip() {
        let chart = ChordChart::demo();
        let json = serde_json::to_string(&chart).unwrap();
        let restored: ChordChart = serde_json::from_str(&json).unwrap();
        assert_eq!(chart, restored);
    }

    #[test]
    fn empty_chart_yields_nothing() {
        let chart = ChordChart {
            title: "empty".to_string(),
            entries: vec![],
        };
        assert!(chart.entry_at(0.0).is_none());
        assert!(chart.context_at(10.0).is_none());
    }
}
