// The drum pattern generator.
//
// No templates here: drums are generated beat by beat from probabilities
// shaped by two scalars, the band's activity and the harmonic color of
// the current chord (altered chords pull the ride onto the bell). The
// time-keeping layer is stable (ride every beat, hats on 2 and 4, a
// feathered kick on 1); the snare and the ride skip note carry the
// variation.
//
// Off-beats are placed at the swing fraction of the beat, not halfway.
// Velocities carry a small random jitter so no two bars land identically.

use crate::energy::EnergyLevel;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Kit pieces, with their General MIDI notes for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrumVoice {
    Ride,
    RideBell,
    HiHat,
    Snare,
    Kick,
}

impl DrumVoice {
    /// GM percussion note number (channel 10).
    pub fn gm_note(self) -> u8 {
        match self {
            DrumVoice::Ride => 51,
            DrumVoice::RideBell => 53,
            DrumVoice::HiHat => 44,
            DrumVoice::Snare => 38,
            DrumVoice::Kick => 35,
        }
    }
}

/// One strike within a bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrumHit {
    pub voice: DrumVoice,
    /// Beats from the barline.
    pub offset: f64,
    /// Normalized velocity.
    pub velocity: f32,
}

/// The drummer.
#[derive(Debug, Clone)]
pub struct DrumKit {
    /// Fraction of a beat at which off-beats land; 2/3 is swung eighths.
    swing: f64,
}

impl Default for DrumKit {
    fn default() -> Self {
        Self::new(2.0 / 3.0)
    }
}

impl DrumKit {
    pub fn new(swing: f64) -> Self {
        DrumKit {
            swing: swing.clamp(0.5, 0.8),
        }
    }

    pub fn swing(&self) -> f64 {
        self.swing
    }

    /// Generate one 4/4 bar. Returns the hits and whether the bar ended
    /// in a fill.
    pub fn generate_bar(
        &self,
        activity: f64,
        alteration_density: f64,
        level: EnergyLevel,
        rng: &mut impl Rng,
    ) -> (Vec<DrumHit>, bool) {
        let activity = activity.clamp(0.0, 1.0);
        let color = alteration_density.clamp(0.0, 1.0);
        let mut hits = Vec::with_capacity(12);

        for beat in 0..4u8 {
            let offset = beat as f64;

            // Ride keeps the time on every beat; altered harmony and a
            // hot band move it onto the bell. Beats 2 and 4 get the
            // traditional lean.
            let bell_chance = (0.08 + 0.25 * activity + 0.2 * color).min(0.6);
            let voice = if rng.random_bool(bell_chance) {
                DrumVoice::RideBell
            } else {
                DrumVoice::Ride
            };
            let accent = if beat % 2 == 1 { 0.06 } else { 0.0 };
            hits.push(DrumHit {
                voice,
                offset,
                velocity: jitter(0.55 + 0.15 * activity as f32 + accent, rng),
            });

            // The skip note: the swung off-beat that makes it jazz.
            let skip_chance = 0.12 + 0.55 * activity;
            if rng.random_bool(skip_chance.min(0.9)) {
                hits.push(DrumHit {
                    voice: DrumVoice::Ride,
                    offset: offset + self.swing,
                    velocity: jitter(0.4 + 0.1 * activity as f32, rng),
                });
            }

            // Hats on 2 and 4.
            if beat == 1 || beat == 3 {
                hits.push(DrumHit {
                    voice: DrumVoice::HiHat,
                    offset,
                    velocity: jitter(0.5, rng),
                });
            }

            // Feathered kick on 1.
            if beat == 0 && rng.random_bool(0.85) {
                hits.push(DrumHit {
                    voice: DrumVoice::Kick,
                    offset,
                    velocity: jitter(0.26, rng),
                });
            }
        }

        // Snare comping: beat 3, or beat 2 when the band is hot, with a
        // swung displacement at high activity.
        let snare_chance = (0.3 + 0.5 * activity).min(0.95);
        if rng.random_bool(snare_chance) {
            let base_beat = if activity > 0.7 && rng.random_bool(0.5) {
                1.0
            } else {
                2.0
            };
            let offset = if activity > 0.7 && rng.random_bool(0.4) {
                base_beat + self.swing
            } else {
                base_beat
            };
            hits.push(DrumHit {
                voice: DrumVoice::Snare,
                offset,
                velocity: jitter(0.3 + 0.4 * activity as f32, rng),
            });
        }

        // A Fill bar breaks into a snare run across beat 4.
        let is_fill = level == EnergyLevel::Fill;
        if is_fill {
            let run = [3.0, 3.0 + self.swing * 0.5, 3.0 + self.swing];
            for (i, &offset) in run.iter().enumerate() {
                hits.push(DrumHit {
                    voice: DrumVoice::Snare,
                    offset,
                    velocity: jitter(0.45 + 0.12 * i as f32, rng),
                });
            }
        }

        (hits, is_fill)
    }
}

/// Humanizing velocity jitter, clamped into the normalized range.
fn jitter(base: f32, rng: &mut impl Rng) -> f32 {
    (base + rng.random_range(-0.04..0.04)).clamp(0.05, 1.0)
}
