// One-bar comping rhythm templates.
//
// A template says when the piano strikes within a bar and for how long,
// in beats. Templates are fixed musical vocabulary, hand-authored the way
// a player hears them; selection logic lives in rhythm.rs and never
// mutates this table (stretching and clipping happen on a clone).
//
// Offsets are beats from the barline of a 4/4 bar. A step marked
// `anticipation` strikes the next bar's harmony early, so the voicing for
// that step resolves against the chord that starts at the following
// barline.

use serde::{Deserialize, Serialize};

/// Template identity. The set is extensible; the class predicates below
/// are what the selector actually keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatternName {
    /// Two mid-density strikes, the default texture.
    Standard,
    /// One chord held through the bar.
    Sustain,
    /// Four-plus strikes pushing the time forward.
    Driving,
    /// The dotted-quarter / eighth Charleston figure.
    Charleston,
    /// A single late strike leaving space.
    Sparse,
}

impl PatternName {
    /// Long-note templates: tolerated at slow tempos and sparse charts,
    /// and allowed to repeat more freely.
    pub fn is_sustain_class(self) -> bool {
        matches!(self, PatternName::Sustain | PatternName::Sparse)
    }

    /// High-activity templates favored at fast tempos and high energy.
    pub fn is_driving_class(self) -> bool {
        matches!(self, PatternName::Driving)
    }
}

/// One strike within a template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternStep {
    /// Beats from the barline.
    pub offset: f64,
    /// Beats.
    pub duration: f64,
    /// Strikes the next chord early (lands before the barline it belongs to).
    pub anticipation: bool,
}

impl PatternStep {
    const fn new(offset: f64, duration: f64) -> Self {
        PatternStep {
            offset,
            duration,
            anticipation: false,
        }
    }

    const fn push(offset: f64, duration: f64) -> Self {
        PatternStep {
            offset,
            duration,
            anticipation: true,
        }
    }
}

/// A named one-bar template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhythmPattern {
    pub name: PatternName,
    pub steps: Vec<PatternStep>,
}

impl RhythmPattern {
    /// The built-in template vocabulary. Order matters: the first entry
    /// is the deterministic fallback when every selection weight is zero.
    pub fn standard_set() -> Vec<RhythmPattern> {
        vec![
            RhythmPattern {
                name: PatternName::Standard,
                steps: vec![PatternStep::new(0.0, 1.5), PatternStep::new(2.5, 1.0)],
            },
            RhythmPattern {
                name: PatternName::Sustain,
                steps: vec![PatternStep::new(0.0, 4.0)],
            },
            RhythmPattern {
                name: PatternName::Driving,
                steps: vec![
                    PatternStep::new(0.0, 0.5),
                    PatternStep::new(1.0, 0.5),
                    PatternStep::new(2.0, 0.5),
                    PatternStep::new(3.0, 0.5),
                    PatternStep::push(3.5, 0.5),
                ],
            },
            RhythmPattern {
                name: PatternName::Charleston,
                steps: vec![PatternStep::new(0.0, 1.5), PatternStep::push(3.5, 0.5)],
            },
            RhythmPattern {
                name: PatternName::Sparse,
                steps: vec![PatternStep::new(2.5, 1.5)],
            },
        ]
    }

    /// Number of strikes.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_fit_inside_one_bar() {
        for pattern in RhythmPattern::standard_set() {
            for step in &pattern.steps {
                assert!(step.offset >= 0.0 && step.offset < 4.0);
                assert!(step.duration > 0.0);
                assert!(
                    step.offset + step.duration <= 4.0 + 0.5,
                    "{:?} step runs too far past the barline",
                    pattern.name
                );
            }
        }
    }

    #[test]
    fn fallback_template_is_standard() {
        assert_eq!(RhythmPattern::standard_set()[0].name, PatternName::Standard);
    }

    #[test]
    fn anticipations_sit_before_the_barline() {
        for pattern in RhythmPattern::standard_set() {
            for step in pattern.steps.iter().filter(|s| s.anticipation) {
                assert!(step.offset >= 3.0, "{:?} anticipates too early", pattern.name);
            }
        }
    }
}
