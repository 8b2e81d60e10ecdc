// Pitch-class and register arithmetic.
//
// All generators work in absolute MIDI note numbers but make decisions in
// pitch-class space: "play a D, in whatever octave sits closest to where
// the line currently is." This module owns that translation, plus the
// interval classification used by the voicing engine's parallel-motion
// rules.

/// Number of semitones in an octave.
pub const OCTAVE: i16 = 12;

/// The pitch class (0-11, C = 0) of a MIDI note.
pub fn pitch_class(pitch: u8) -> u8 {
    pitch % 12
}

/// Place a pitch class in the octave nearest to a reference note.
///
/// Exact ties between the octave above and below resolve downward.
pub fn nearest_octave(pc: u8, reference: u8) -> u8 {
    nearest_octave_leaning_low(pc, reference, 0)
}

/// Place a pitch class near a reference note, leaning low.
///
/// Like `nearest_octave`, but when the lower candidate is within
/// `tolerance` semitones of being as close as the best candidate, the
/// lower one wins. Bass lines use this: dropping an octave reads as
/// intentional, jumping up an octave reads as a mistake.
pub fn nearest_octave_leaning_low(pc: u8, reference: u8, tolerance: u8) -> u8 {
    let reference = reference as i16;
    let base = reference - reference.rem_euclid(12) + pc as i16;
    let candidates = [base - OCTAVE, base, base + OCTAVE];

    let mut best = base;
    let mut best_dist = i16::MAX;
    for &cand in &candidates {
        if !(0..=127).contains(&cand) {
            continue;
        }
        let dist = (cand - reference).abs();
        if dist < best_dist {
            best_dist = dist;
            best = cand;
        }
    }

    // Lean toward the best candidate below the reference when it is
    // nearly as close as the overall best.
    let mut low = None;
    let mut low_dist = i16::MAX;
    for &cand in &candidates {
        if !(0..=127).contains(&cand) || cand > reference {
            continue;
        }
        let dist = (cand - reference).abs();
        if dist < low_dist {
            low_dist = dist;
            low = Some(cand);
        }
    }
    if let Some(low) = low {
        if low_dist <= best_dist + tolerance as i16 {
            return low as u8;
        }
    }
    best as u8
}

/// Fold a pitch into `[low, high]` by octave shifts, clamping only if the
/// pitch class cannot be represented inside the range at all.
pub fn fold_into_range(pitch: i16, low: u8, high: u8) -> u8 {
    let mut p = pitch;
    while p < low as i16 {
        p += OCTAVE;
    }
    while p > high as i16 {
        p -= OCTAVE;
    }
    if p < low as i16 {
        // Range narrower than an octave and this pitch class misses it.
        return if (pitch - low as i16).abs() < (pitch - high as i16).abs() {
            low
        } else {
            high
        };
    }
    p as u8
}

/// Interval classification helpers for voice-leading rules.
pub mod interval {
    /// Signed interval in semitones; positive means `b` is higher.
    pub fn semitones(a: u8, b: u8) -> i16 {
        b as i16 - a as i16
    }

    /// True for unisons, octaves, and perfect fifths (mod 12). These are
    /// the intervals whose parallel motion the voicing scorer penalizes.
    pub fn is_perfect_class(semitones: i16) -> bool {
        let ic = (semitones.unsigned_abs() as u8) % 12;
        matches!(ic, 0 | 7)
    }
}

/// Compact note name for a MIDI pitch, e.g. "C4", "F#3".
pub fn pitch_name(pitch: u8) -> String {
    format!("{}{}", pc_name(pitch % 12), (pitch / 12) as i16 - 1)
}

/// Name of a bare pitch class (sharps for the black keys).
pub fn pc_name(pc: u8) -> &'static str {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
    ];
    NAMES[(pc % 12) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_octave_picks_closest() {
        // D (pc 2) near D3 (50) is 50 itself.
        assert_eq!(nearest_octave(2, 50), 50);
        // G (pc 7) near D3 (50): 43 is 7 below, 55 is 5 above, so 55.
        assert_eq!(nearest_octave(7, 50), 55);
    }

    #[test]
    fn nearest_octave_exact_tie_resolves_down() {
        // F# (pc 6) near C4 (60): 54 and 66 are both 6 away.
        assert_eq!(nearest_octave(6, 60), 54);
    }

    #[test]
    fn leaning_low_prefers_lower_near_ties() {
        // G (pc 7) near D3 (50): 55 is 5 up, 43 is 7 down. With a
        // 2-semitone tolerance the drop wins.
        assert_eq!(nearest_octave_leaning_low(7, 50, 2), 43);
        // With no tolerance the closer candidate wins.
        assert_eq!(nearest_octave_leaning_low(7, 50, 0), 55);
    }

    #[test]
    fn fold_into_range_shifts_by_octaves() {
        assert_eq!(fold_into_range(20, 28, 64), 32);
        assert_eq!(fold_into_range(80, 28, 64), 56);
        assert_eq!(fold_into_range(40, 28, 64), 40);
    }

    #[test]
    fn perfect_class_detection() {
        assert!(interval::is_perfect_class(7));
        assert!(interval::is_perfect_class(-12));
        assert!(interval::is_perfect_class(19));
        assert!(!interval::is_perfect_class(4));
        assert!(!interval::is_perfect_class(6));
    }

    #[test]
    fn note_names() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(50), "D3");
        assert_eq!(pc_name(6), "F#");
    }
}
