// Chord scales: the step scale a chord quality implies.
//
// Jazz improvisation treats every chord as carrying a scale, not just a
// stack of chord tones. The walking-bass generator moves through these
// scales between chord tones; the voicing engine only needs the chord
// tones themselves and never consults a scale.
//
// A `Scale` pairs a scale kind with a root pitch class, in the same way a
// chord context pairs a quality with a root.

use serde::{Deserialize, Serialize};

/// The scale shapes used by the engine, one per chord-quality family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    /// Major (ionian): maj and maj7 chords.
    Major,
    /// Dorian: the default minor-seventh sound.
    Dorian,
    /// Mixolydian: unaltered dominants and sus chords.
    Mixolydian,
    /// Locrian: half-diminished (m7b5) chords.
    Locrian,
    /// Whole-half diminished, eight notes: dim7 chords.
    WholeHalfDiminished,
    /// Altered (super-locrian): dominants with altered extensions.
    Altered,
}

impl ScaleKind {
    /// Semitone offsets from the root for each scale degree.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleKind::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleKind::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            ScaleKind::WholeHalfDiminished => &[0, 2, 3, 5, 6, 8, 9, 11],
            ScaleKind::Altered => &[0, 1, 3, 4, 6, 8, 10],
        }
    }
}

/// A scale kind rooted on a pitch class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    pub kind: ScaleKind,
    /// Pitch class of the scale root (0 = C).
    pub root: u8,
}

impl Scale {
    pub fn new(kind: ScaleKind, root: u8) -> Self {
        Scale {
            kind,
            root: root % 12,
        }
    }

    /// Whether a MIDI pitch belongs to this scale.
    pub fn contains(&self, pitch: u8) -> bool {
        let pc = (pitch + 12 - self.root) % 12;
        self.kind.intervals().contains(&pc)
    }

    /// All member pitches inside an inclusive MIDI range.
    pub fn pitches_in_range(&self, low: u8, high: u8) -> Vec<u8> {
        (low..=high).filter(|&p| self.contains(p)).collect()
    }

    /// Snap a pitch to the nearest scale member, preferring downward on
    /// ties (approach from above sounds stronger in a bass line).
    pub fn snap(&self, pitch: u8) -> u8 {
        if self.contains(pitch) {
            return pitch;
        }
        for offset in 1u8..=6 {
            if pitch >= offset && self.contains(pitch - offset) {
                return pitch - offset;
            }
            if pitch as u16 + offset as u16 <= 127 && self.contains(pitch + offset) {
                return pitch + offset;
            }
        }
        pitch
    }

    /// The next scale member strictly above or below `pitch`.
    ///
    /// `direction` > 0 walks up, anything else walks down. Returns `None`
    /// only at the edge of the MIDI range.
    pub fn step_from(&self, pitch: u8, direction: i8) -> Option<u8> {
        if direction > 0 {
            ((pitch + 1)..=127).find(|&p| self.contains(p))
        } else {
            (0..pitch).rev().find(|&p| self.contains(p))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixolydian_on_g_has_f_natural() {
        let scale = Scale::new(ScaleKind::Mixolydian, 7);
        assert!(scale.contains(65)); // F4
        assert!(!scale.contains(66)); // F#4
        assert!(scale.contains(67)); // G4
        assert!(scale.contains(71)); // B4
    }

    #[test]
    fn dorian_on_d_is_white_notes() {
        let scale = Scale::new(ScaleKind::Dorian, 2);
        for pitch in [50u8, 52, 53, 55, 57, 59, 60] {
            assert!(scale.contains(pitch), "expected {pitch} in D dorian");
        }
        assert!(!scale.contains(51)); // Eb
    }

    #[test]
    fn diminished_scale_has_eight_notes() {
        assert_eq!(ScaleKind::WholeHalfDiminished.intervals().len(), 8);
    }

    #[test]
    fn snap_lands_on_member() {
        let scale = Scale::new(ScaleKind::Major, 0);
        assert_eq!(scale.snap(61), 60); // C# snaps down to C
        assert_eq!(scale.snap(62), 62); // D stays
    }

    #[test]
    fn step_from_walks_scale() {
        let scale = Scale::new(ScaleKind::Major, 0);
        assert_eq!(scale.step_from(60, 1), Some(62));
        assert_eq!(scale.step_from(60, -1), Some(59));
        assert_eq!(scale.step_from(64, 1), Some(65));
    }
}
