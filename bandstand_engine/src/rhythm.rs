// Per-bar rhythm template selection.
//
// Chooses which comping template the piano plays this bar, independent of
// harmony. Selection is a weighted random draw where the weights encode
// four pressures: what the tempo supports, what the energy level asks
// for, which transitions between templates sound natural, and how
// recently each template was already used.
//
// The engine keeps a four-bar history ring; that bound is the entire
// memory of this module. All randomness comes through the caller's rng.

use crate::pattern::{PatternName, RhythmPattern};
use rand::Rng;
use std::collections::VecDeque;

/// How many past selections the repetition penalty can see.
const HISTORY_LEN: usize = 4;

/// Caller-supplied context about the harmonic rhythm of the current bar.
#[derive(Debug, Clone, Copy)]
pub struct SpacingHint {
    /// Chord changes per bar; 1.0 or less means sparse harmony.
    pub chords_per_bar: f64,
    /// Articulation floor in beats: at very fast tempos a human comper
    /// cannot place notes shorter than this.
    pub min_step_duration: Option<f64>,
}

/// The rhythmic phrase selector.
#[derive(Debug)]
pub struct RhythmEngine {
    templates: Vec<RhythmPattern>,
    history: VecDeque<PatternName>,
}

impl Default for RhythmEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RhythmEngine {
    pub fn new() -> Self {
        RhythmEngine {
            templates: RhythmPattern::standard_set(),
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Choose this bar's template.
    pub fn select_pattern(
        &mut self,
        tempo_bpm: f64,
        energy: f64,
        spacing: Option<SpacingHint>,
        rng: &mut impl Rng,
    ) -> RhythmPattern {
        let sparse_harmony = spacing.is_some_and(|s| s.chords_per_bar <= 1.0) || tempo_bpm < 72.0;

        let weights: Vec<f64> = self
            .templates
            .iter()
            .map(|t| {
                let mut w = tempo_base_weight(t.name, tempo_bpm);
                w *= energy_bias(t.name, energy);
                if let Some(prev) = self.history.back() {
                    w += transition_bonus(*prev, t.name);
                }
                w *= self.repetition_penalty(t.name);
                if sparse_harmony && t.name.is_sustain_class() {
                    w *= 2.5;
                }
                w.max(0.0)
            })
            .collect();

        // Degenerate weight vector falls back to the first template.
        let chosen = weighted_index(&weights, rng).unwrap_or(0);

        let mut pattern = self.templates[chosen].clone();

        // Sparse harmony stretches strikes into longer note values.
        if sparse_harmony {
            stretch_steps(&mut pattern);
        }
        // Articulation ceiling: clip too-short steps up to the floor.
        if let Some(limit) = spacing.and_then(|s| s.min_step_duration) {
            for step in &mut pattern.steps {
                if step.duration < limit {
                    step.duration = limit;
                }
            }
        }

        self.history.push_back(pattern.name);
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }

        pattern
    }

    /// Multiplicative penalty for every recent occurrence of `name`.
    /// The newest occurrence bites hardest; sustain-class templates are
    /// allowed to repeat with a gentler factor.
    fn repetition_penalty(&self, name: PatternName) -> f64 {
        let base: f64 = if name.is_sustain_class() { 0.72 } else { 0.42 };
        let mut penalty = 1.0;
        for (age, past) in self.history.iter().rev().enumerate() {
            if *past == name {
                penalty *= base.powf(1.0 - age as f64 / HISTORY_LEN as f64);
            }
        }
        penalty
    }

    #[cfg(test)]
    fn last_selected(&self) -> Option<PatternName> {
        self.history.back().copied()
    }
}

/// Base desirability of each template at a given tempo.
fn tempo_base_weight(name: PatternName, tempo_bpm: f64) -> f64 {
    match name {
        PatternName::Sustain => match tempo_bpm {
            t if t < 90.0 => 3.0,
            t if t < 150.0 => 1.0,
            t if t < 220.0 => 0.35,
            // Burning tempos: sustained pads vanish from the vocabulary.
            _ => 0.05,
        },
        PatternName::Driving => match tempo_bpm {
            t if t < 90.0 => 0.3,
            t if t < 150.0 => 1.0,
            _ => 2.2,
        },
        PatternName::Standard => {
            if tempo_bpm < 90.0 {
                1.2
            } else {
                1.5
            }
        }
        PatternName::Charleston => {
            if (90.0..200.0).contains(&tempo_bpm) {
                1.3
            } else {
                0.8
            }
        }
        PatternName::Sparse => {
            if tempo_bpm < 90.0 {
                1.0
            } else {
                1.4
            }
        }
    }
}

/// Energy skews the driving/sustain balance.
fn energy_bias(name: PatternName, energy: f64) -> f64 {
    if energy > 0.7 {
        if name.is_driving_class() {
            1.0 + (energy - 0.7) * 3.0
        } else if name.is_sustain_class() {
            0.4
        } else {
            1.0
        }
    } else if energy < 0.3 {
        if name.is_sustain_class() {
            2.0
        } else if name.is_driving_class() {
            0.3
        } else {
            1.0
        }
    } else {
        1.0
    }
}

/// Hand-authored transition desirability, added to the weight of each
/// candidate given the previous bar's template. Sustain never feeds
/// itself: leaving a pad is always the favored move.
fn transition_bonus(prev: PatternName, next: PatternName) -> f64 {
    use PatternName::*;
    match (prev, next) {
        (Sustain, Standard) => 0.8,
        (Sustain, Driving) => 0.6,
        (Sustain, Charleston) => 0.4,
        (Standard, Charleston) => 0.4,
        (Standard, Driving) => 0.25,
        (Charleston, Standard) => 0.3,
        (Charleston, Sparse) => 0.25,
        (Driving, Sparse) => 0.45,
        (Driving, Standard) => 0.3,
        (Sparse, Charleston) => 0.4,
        (Sparse, Driving) => 0.3,
        _ => 0.0,
    }
}

/// Double each strike's length, capped so a step never collides with the
/// one after it or runs more than half a beat past the barline.
fn stretch_steps(pattern: &mut RhythmPattern) {
    let count = pattern.steps.len();
    for i in 0..count {
        let limit = if i + 1 < count {
            pattern.steps[i + 1].offset - pattern.steps[i].offset
        } else {
            4.5 - pattern.steps[i].offset
        };
        let step = &mut pattern.steps[i];
        step.duration = (step.duration * 2.0).min(limit);
    }
}

/// Weighted draw over a slice of non-negative weights, mirroring a
/// cumulative-sum table walk. `None` when the mass is zero.
pub(crate) fn weighted_index(weights: &[f64], rng: &mut impl Rng) -> Option<usize> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let target = rng.random::<f64>() * total;
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative > target {
            return Some(i);
        }
    }
    Some(weights.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn selection_pushes_bounded_history() {
        let mut engine = RhythmEngine::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            engine.select_pattern(140.0, 0.5, None, &mut rng);
        }
        assert!(engine.history.len() <= HISTORY_LEN);
        assert!(engine.last_selected().is_some());
    }

    #[test]
    fn immediate_repeats_stay_rare() {
        let mut engine = RhythmEngine::new();
        let mut rng = StdRng::seed_from_u64(42);
        let mut repeats = 0;
        let mut prev = None;
        for _ in 0..100 {
            let pattern = engine.select_pattern(140.0, 0.5, None, &mut rng);
            if prev == Some(pattern.name) {
                repeats += 1;
            }
            prev = Some(pattern.name);
        }
        assert!(
            repeats < 35,
            "too many immediate repeats: {repeats} out of 100"
        );
    }

    #[test]
    fn slow_sparse_charts_prefer_long_notes() {
        let mut engine = RhythmEngine::new();
        let mut rng = StdRng::seed_from_u64(3);
        let hint = SpacingHint {
            chords_per_bar: 0.5,
            min_step_duration: None,
        };
        let mut sustain_class = 0;
        for _ in 0..100 {
            let pattern = engine.select_pattern(60.0, 0.2, Some(hint), &mut rng);
            if pattern.name.is_sustain_class() {
                sustain_class += 1;
            }
        }
        assert!(
            sustain_class > 50,
            "expected mostly sustain-class at slow sparse settings, got {sustain_class}"
        );
    }

    #[test]
    fn articulation_floor_clips_short_steps() {
        let mut engine = RhythmEngine::new();
        let mut rng = StdRng::seed_from_u64(11);
        let hint = SpacingHint {
            chords_per_bar: 2.0,
            min_step_duration: Some(0.75),
        };
        for _ in 0..50 {
            let pattern = engine.select_pattern(280.0, 0.9, Some(hint), &mut rng);
            for step in &pattern.steps {
                assert!(step.duration >= 0.75);
            }
        }
    }

    #[test]
    fn zero_mass_draw_falls_back_to_first() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(weighted_index(&[0.0, 0.0], &mut rng), None);
        assert_eq!(weighted_index(&[], &mut rng), None);
        assert!(weighted_index(&[0.0, 2.0], &mut rng) == Some(1));
    }
}
