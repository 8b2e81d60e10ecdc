// Chord qualities, resolved chord contexts, and the symbol resolver.
//
// The engine never parses strings mid-performance: a chart symbol like
// "Dm7" or "G13" is resolved once into a `ChordContext` carrying the root
// pitch class, the quality, the explicit interval set (extensions included
// as offsets past the octave, e.g. 14 for a 9th), and the implied chord
// scale. Generators consume the context; the string is gone.
//
// `resolve` is deliberately forgiving about notation ("-7", "min7", "ø",
// "M7" are all understood) and deliberately strict about failure: an
// unrecognized symbol is `None`, and the caller plays a rest or holds.

use crate::scale::{Scale, ScaleKind};
use serde::{Deserialize, Serialize};

/// Chord quality families understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Maj,
    Maj6,
    Maj7,
    Min,
    Min6,
    Min7,
    Dom7,
    Dim7,
    HalfDim,
    Sus4,
    Altered,
}

impl Quality {
    /// The base chord tones as semitone offsets from the root.
    pub fn chord_tones(self) -> &'static [u8] {
        match self {
            Quality::Maj => &[0, 4, 7],
            Quality::Maj6 => &[0, 4, 7, 9],
            Quality::Maj7 => &[0, 4, 7, 11],
            Quality::Min => &[0, 3, 7],
            Quality::Min6 => &[0, 3, 7, 9],
            Quality::Min7 => &[0, 3, 7, 10],
            Quality::Dom7 => &[0, 4, 7, 10],
            Quality::Dim7 => &[0, 3, 6, 9],
            Quality::HalfDim => &[0, 3, 6, 10],
            Quality::Sus4 => &[0, 5, 7, 10],
            Quality::Altered => &[0, 4, 8, 10, 13],
        }
    }

    /// The two chord-defining intervals, "3rd and 7th" in the common case.
    ///
    /// Plain triads fall back to 3rd and 5th; sixth chords treat the 6th
    /// as their seventh-class tone; sus chords use the 4th in place of the
    /// 3rd. These are the tones a voicing must keep.
    pub fn guide_tones(self) -> (u8, u8) {
        match self {
            Quality::Maj => (4, 7),
            Quality::Maj6 => (4, 9),
            Quality::Maj7 => (4, 11),
            Quality::Min => (3, 7),
            Quality::Min6 => (3, 9),
            Quality::Min7 => (3, 10),
            Quality::Dom7 => (4, 10),
            Quality::Dim7 => (3, 9),
            Quality::HalfDim => (3, 10),
            Quality::Sus4 => (5, 10),
            Quality::Altered => (4, 10),
        }
    }

    /// The chord scale this quality implies.
    pub fn scale_kind(self) -> ScaleKind {
        match self {
            Quality::Maj | Quality::Maj6 | Quality::Maj7 => ScaleKind::Major,
            Quality::Min | Quality::Min6 | Quality::Min7 => ScaleKind::Dorian,
            Quality::Dom7 | Quality::Sus4 => ScaleKind::Mixolydian,
            Quality::Dim7 => ScaleKind::WholeHalfDiminished,
            Quality::HalfDim => ScaleKind::Locrian,
            Quality::Altered => ScaleKind::Altered,
        }
    }

    /// True for the dominant-function qualities.
    pub fn is_dominant(self) -> bool {
        matches!(self, Quality::Dom7 | Quality::Altered | Quality::Sus4)
    }

    /// True when the quality carries a minor third.
    pub fn is_minor(self) -> bool {
        matches!(
            self,
            Quality::Min | Quality::Min6 | Quality::Min7 | Quality::Dim7 | Quality::HalfDim
        )
    }
}

/// A chord symbol resolved into playable material.
///
/// Immutable once built; the engine resolves a fresh context per symbol
/// lookup and keeps no identity between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordContext {
    /// Root pitch class, 0-11.
    pub root: u8,
    pub quality: Quality,
    /// Ordered semitone offsets from the root. May exceed 12 so that
    /// extensions stay distinguishable from their octave-folded cousins
    /// (14 = 9th, 17 = 11th, 21 = 13th, 13 = b9, and so on).
    pub intervals: Vec<u8>,
    /// The step scale used for bass motion between chord tones.
    pub scale: Scale,
    /// Explicit bass pitch class from slash notation ("F/G"), if any.
    pub bass_pc: Option<u8>,
}

impl ChordContext {
    pub fn new(root: u8, quality: Quality) -> Self {
        let root = root % 12;
        ChordContext {
            root,
            quality,
            intervals: quality.chord_tones().to_vec(),
            scale: Scale::new(quality.scale_kind(), root),
            bass_pc: None,
        }
    }

    /// Add an interval unless an equivalent entry is already present.
    /// Idempotent, and extension-aware: a 9th (14) is not added when a b9
    /// or #9 is already in the set.
    pub fn add_interval(&mut self, interval: u8) {
        if self.intervals.contains(&interval) {
            return;
        }
        // Same extension degree, different inflection: leave it alone.
        let degree_clash = match interval {
            13 | 14 | 15 => self.intervals.iter().any(|&i| matches!(i, 13 | 14 | 15)),
            17 | 18 => self.intervals.iter().any(|&i| matches!(i, 17 | 18)),
            20 | 21 => self.intervals.iter().any(|&i| matches!(i, 20 | 21)),
            _ => false,
        };
        if !degree_clash {
            self.intervals.push(interval);
        }
    }

    /// Pitch classes of every interval in the set, deduplicated (a 9th
    /// and a 2nd land on the same class).
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = Vec::with_capacity(self.intervals.len());
        for &interval in &self.intervals {
            let pc = (self.root + interval) % 12;
            if !pcs.contains(&pc) {
                pcs.push(pc);
            }
        }
        pcs
    }

    /// The guide-tone pitch classes for this chord.
    pub fn guide_pcs(&self) -> (u8, u8) {
        let (third, seventh) = self.quality.guide_tones();
        ((self.root + third) % 12, (self.root + seventh) % 12)
    }

    /// Pitch class the bass should anchor on: the slash bass if the
    /// symbol had one, else the root.
    pub fn bass_anchor_pc(&self) -> u8 {
        self.bass_pc.unwrap_or(self.root)
    }

    /// How many altered extensions the chord carries (b5, #5, b9, #9,
    /// #11, b13). Drives the drummer's ride-bell chances.
    pub fn altered_extension_count(&self) -> usize {
        self.intervals
            .iter()
            .filter(|&&i| matches!(i, 6 | 8 | 13 | 15 | 18 | 20))
            .count()
            + usize::from(self.quality == Quality::Altered)
    }
}

/// Resolve a chord symbol into a context, or `None` if unreadable.
pub fn resolve(symbol: &str) -> Option<ChordContext> {
    let symbol = symbol.trim();
    let (body, slash) = match symbol.split_once('/') {
        Some((body, bass)) => (body, Some(bass)),
        None => (symbol, None),
    };

    let mut chars = body.chars();
    let letter = chars.next()?;
    let mut root = match letter.to_ascii_uppercase() {
        'C' => 0u8,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let suffix = match rest.chars().next() {
        Some('#') => {
            root = (root + 1) % 12;
            &rest[1..]
        }
        Some('b') => {
            root = (root + 11) % 12;
            &rest[1..]
        }
        _ => rest,
    };

    let (quality, extensions) = parse_suffix(suffix)?;
    let mut ctx = ChordContext::new(root, quality);
    for ext in extensions {
        ctx.add_interval(ext);
    }

    if let Some(bass) = slash {
        // A bad slash part degrades to "no slash", not to a bad chord.
        ctx.bass_pc = parse_bare_pc(bass);
    }
    Some(ctx)
}

/// Map a quality suffix to (quality, extension intervals).
fn parse_suffix(suffix: &str) -> Option<(Quality, Vec<u8>)> {
    // Unicode shorthands first, then the ASCII families.
    if suffix == "ø" || suffix == "ø7" {
        return Some((Quality::HalfDim, vec![]));
    }
    let normalized = suffix.replace('Δ', "maj").replace('°', "dim");
    let s = normalized.as_str();
    let lower = normalized.to_lowercase();

    // Major family. "M7" (capital M) also spells major.
    if let Some(tail) = lower.strip_prefix("maj") {
        return major_tail(tail);
    }
    if let Some(tail) = s.strip_prefix('M') {
        return major_tail(&tail.to_lowercase());
    }

    // Minor family, with "-" as the minus-notation spelling.
    let minor_tail = lower
        .strip_prefix("min")
        .or_else(|| lower.strip_prefix("mi"))
        .or_else(|| lower.strip_prefix('m'))
        .or_else(|| lower.strip_prefix('-'));
    if let Some(tail) = minor_tail {
        return match tail {
            "" => Some((Quality::Min, vec![])),
            "6" => Some((Quality::Min6, vec![])),
            "7" => Some((Quality::Min7, vec![])),
            "9" => Some((Quality::Min7, vec![14])),
            "11" => Some((Quality::Min7, vec![14, 17])),
            "13" => Some((Quality::Min7, vec![14, 21])),
            "7b5" => Some((Quality::HalfDim, vec![])),
            _ => None,
        };
    }

    match lower.as_str() {
        "" => Some((Quality::Maj, vec![])),
        "6" => Some((Quality::Maj6, vec![])),
        "69" | "6/9" => Some((Quality::Maj6, vec![14])),
        "dim" | "dim7" => Some((Quality::Dim7, vec![])),
        "aug" | "+" => Some((Quality::Altered, vec![])),
        "alt" | "7alt" => Some((Quality::Altered, vec![])),
        "sus" | "sus4" | "7sus" | "7sus4" => Some((Quality::Sus4, vec![])),
        "7" => Some((Quality::Dom7, vec![])),
        "9" => Some((Quality::Dom7, vec![14])),
        "11" => Some((Quality::Dom7, vec![14, 17])),
        "13" => Some((Quality::Dom7, vec![14, 21])),
        "7b9" => Some((Quality::Dom7, vec![13])),
        "7#9" => Some((Quality::Dom7, vec![15])),
        "7#11" => Some((Quality::Dom7, vec![18])),
        "7b13" => Some((Quality::Dom7, vec![20])),
        "7b5" => Some((Quality::Dom7, vec![6])),
        "7#5" => Some((Quality::Dom7, vec![8])),
        _ => None,
    }
}

fn major_tail(tail: &str) -> Option<(Quality, Vec<u8>)> {
    match tail {
        "" => Some((Quality::Maj, vec![])),
        "6" => Some((Quality::Maj6, vec![])),
        "7" => Some((Quality::Maj7, vec![])),
        "9" => Some((Quality::Maj7, vec![14])),
        "13" => Some((Quality::Maj7, vec![14, 21])),
        _ => None,
    }
}

/// Parse a bare note name ("G", "Bb") into a pitch class.
fn parse_bare_pc(s: &str) -> Option<u8> {
    let mut chars = s.trim().chars();
    let letter = chars.next()?;
    let mut pc = match letter.to_ascii_uppercase() {
        'C' => 0u8,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    match chars.next() {
        None => Some(pc),
        Some('#') if chars.next().is_none() => {
            pc = (pc + 1) % 12;
            Some(pc)
        }
        Some('b') if chars.next().is_none() => {
            pc = (pc + 11) % 12;
            Some(pc)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_basic_qualities() {
        let cmaj7 = resolve("Cmaj7").unwrap();
        assert_eq!(cmaj7.root, 0);
        assert_eq!(cmaj7.quality, Quality::Maj7);
        assert_eq!(cmaj7.intervals, vec![0, 4, 7, 11]);

        let dm7 = resolve("Dm7").unwrap();
        assert_eq!(dm7.root, 2);
        assert_eq!(dm7.quality, Quality::Min7);

        let g7 = resolve("G7").unwrap();
        assert_eq!(g7.root, 7);
        assert_eq!(g7.quality, Quality::Dom7);
    }

    #[test]
    fn resolves_notation_variants() {
        assert_eq!(resolve("C-7").unwrap().quality, Quality::Min7);
        assert_eq!(resolve("CM7").unwrap().quality, Quality::Maj7);
        assert_eq!(resolve("Cmin7").unwrap().quality, Quality::Min7);
        assert_eq!(resolve("Bm7b5").unwrap().quality, Quality::HalfDim);
        assert_eq!(resolve("Bø").unwrap().quality, Quality::HalfDim);
        assert_eq!(resolve("G7alt").unwrap().quality, Quality::Altered);
        assert_eq!(resolve("Eb°7").unwrap().quality, Quality::Dim7);
    }

    #[test]
    fn accidentals_shift_root() {
        assert_eq!(resolve("F#m7").unwrap().root, 6);
        assert_eq!(resolve("Bb7").unwrap().root, 10);
        assert_eq!(resolve("Cb").unwrap().root, 11);
    }

    #[test]
    fn extensions_are_explicit() {
        let g13 = resolve("G13").unwrap();
        assert!(g13.intervals.contains(&14));
        assert!(g13.intervals.contains(&21));
        assert_eq!(g13.quality, Quality::Dom7);
    }

    #[test]
    fn add_interval_is_idempotent_and_degree_aware() {
        let mut ctx = resolve("G7b9").unwrap();
        let before = ctx.intervals.clone();
        // Natural 9 must not pile on top of the b9.
        ctx.add_interval(14);
        assert_eq!(ctx.intervals, before);
        // Re-adding an existing interval changes nothing.
        ctx.add_interval(13);
        assert_eq!(ctx.intervals, before);
    }

    #[test]
    fn slash_bass_is_captured() {
        let fg = resolve("F/G").unwrap();
        assert_eq!(fg.root, 5);
        assert_eq!(fg.bass_pc, Some(7));
        assert_eq!(fg.bass_anchor_pc(), 7);
        // Unreadable slash degrades to no slash.
        assert_eq!(resolve("F/xyz").unwrap().bass_pc, None);
    }

    #[test]
    fn guide_tones_match_quality() {
        let (third, seventh) = resolve("G7").unwrap().guide_pcs();
        assert_eq!(third, 11); // B
        assert_eq!(seventh, 5); // F
        let (third, seventh) = resolve("Cmaj7").unwrap().guide_pcs();
        assert_eq!(third, 4); // E
        assert_eq!(seventh, 11); // B
    }

    #[test]
    fn altered_extensions_counted() {
        assert_eq!(resolve("G7").unwrap().altered_extension_count(), 0);
        assert_eq!(resolve("G7b9").unwrap().altered_extension_count(), 1);
        assert!(resolve("G7alt").unwrap().altered_extension_count() >= 2);
    }

    #[test]
    fn garbage_resolves_to_none() {
        assert!(resolve("").is_none());
        assert!(resolve("H7").is_none());
        assert!(resolve("Cmaj7extra").is_none());
        assert!(resolve("7").is_none());
    }
}
