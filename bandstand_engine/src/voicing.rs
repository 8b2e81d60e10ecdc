// The voicing engine: from a chord context to the piano's next grip.
//
// Candidate generation is exhaustive and deterministic: every structural
// voicing type is realized in a handful of rotations, octave-normalized
// into the comping register, then scored against the previous voicing.
// The minimum-cost candidate wins. There is no randomness here at all;
// variety comes from the harmony moving and from the scoring terms that
// reward alternating motion.
//
// The cost function is a weighted sum of voice-leading terms. Weights
// live in `VoicingWeights` and can be replaced wholesale from a JSON
// file, but the defaults are the tuned values. Penalties add cost,
// bonuses subtract it.
//
// State kept between calls: the previous voicing, the direction the
// voicing centroid moved last time, and a short informational log of
// recent grips. Nothing else.

use bandstand_theory::chord::{ChordContext, Quality};
use bandstand_theory::pitch::interval;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::VecDeque;

/// Structural voicing families the generator knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoicingType {
    /// Guide tones and extensions, no root (the bassist has it).
    Rootless,
    /// Close position with the second voice from the top dropped an octave.
    Drop2,
    /// Third voice from the top dropped an octave.
    Drop3,
    /// Second and fourth voices dropped.
    Drop24,
    /// Compact stack within about an octave.
    Close,
    /// Close position opened up by dropping the bottom voice an octave.
    Spread,
    /// Stacked fourths.
    Quartal,
    /// Adjacent seconds allowed; only generated under tension.
    Cluster,
}

impl VoicingType {
    const ALWAYS: [VoicingType; 7] = [
        VoicingType::Rootless,
        VoicingType::Drop2,
        VoicingType::Drop3,
        VoicingType::Drop24,
        VoicingType::Close,
        VoicingType::Spread,
        VoicingType::Quartal,
    ];
}

/// A concrete candidate grip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voicing {
    /// Ascending MIDI notes.
    pub notes: SmallVec<[u8; 8]>,
    pub kind: VoicingType,
    /// Rotation index that produced this candidate.
    pub variation: usize,
}

/// Tunable cost weights. Replaceable as a unit, like a scoring profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoicingWeights {
    /// Per-voice displacement cost multiplier.
    pub displacement: f64,
    /// Exponent applied to each voice's displacement before summing.
    pub displacement_exponent: f64,
    /// Convex penalty on the top-voice melodic jump.
    pub top_note_jump: f64,
    /// Reward for moving the centroid against its previous direction.
    pub contrary_motion: f64,
    /// Reward for moving opposite the bass register.
    pub bass_register: f64,
    /// Penalty per voice pair moving in identical nonzero steps.
    pub parallel_motion: f64,
    /// Extra penalty when such a pair stays a perfect fifth or octave.
    pub parallel_perfects: f64,
    /// Penalty per semitone the centroid sits outside the comping band.
    pub out_of_range: f64,
    /// Reward for matching the caller's preferred type.
    pub preferred_type: f64,
    /// Reward for cluster voicings, scaled by tension.
    pub cluster_tension: f64,
    /// Reward for carrying four or more notes.
    pub note_count: f64,
    /// Reward for containing both guide tones.
    pub guide_tones: f64,
    /// Penalty per semitone of accidental crowding below a 4-semitone gap.
    pub tight_spacing: f64,
}

impl Default for VoicingWeights {
    fn default() -> Self {
        VoicingWeights {
            displacement: 1.0,
            displacement_exponent: 1.6,
            top_note_jump: 0.18,
            contrary_motion: 2.5,
            bass_register: 1.5,
            parallel_motion: 2.0,
            parallel_perfects: 6.0,
            out_of_range: 0.9,
            preferred_type: 2.0,
            cluster_tension: 3.0,
            note_count: 1.5,
            guide_tones: 4.0,
            tight_spacing: 1.2,
        }
    }
}

/// Comping register bounds: candidates are normalized so their centroid
/// lands here, and the scorer penalizes drifting outside the wider band.
const NORMALIZE_BAND: (f64, f64) = (44.0, 64.0);
const SCORING_BAND: (f64, f64) = (42.0, 64.0);

/// How many recent grips the informational log keeps.
const LOG_LEN: usize = 12;

/// The stateful voicing selector.
#[derive(Debug)]
pub struct VoicingEngine {
    weights: VoicingWeights,
    last: Option<SmallVec<[u8; 8]>>,
    /// Signed semitones the centroid moved on the previous transition.
    last_centroid_move: f64,
    /// Recent grips, newest last. Informational only.
    log: VecDeque<String>,
}

impl Default for VoicingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VoicingEngine {
    pub fn new() -> Self {
        Self::with_weights(VoicingWeights::default())
    }

    pub fn with_weights(weights: VoicingWeights) -> Self {
        VoicingEngine {
            weights,
            last: None,
            last_centroid_move: 0.0,
            log: VecDeque::with_capacity(LOG_LEN),
        }
    }

    /// Forget all continuity state (new tune, new chorus from scratch).
    pub fn reset(&mut self) {
        self.last = None;
        self.last_centroid_move = 0.0;
        self.log.clear();
    }

    /// Produce the next grip for `chord`.
    ///
    /// An empty result means the chord yielded no playable candidates and
    /// the caller should rest; internal continuity state is left intact
    /// so the line picks up cleanly afterwards.
    pub fn next_voicing(
        &mut self,
        chord: &ChordContext,
        preferred: VoicingType,
        tension: f64,
        modern: bool,
        bass_note: Option<u8>,
    ) -> SmallVec<[u8; 8]> {
        let candidates = generate_candidates(chord, tension, modern);
        if candidates.is_empty() {
            return SmallVec::new();
        }

        // Minimum-size invariant, with the unfiltered set as the fallback
        // rather than silence.
        let filtered: Vec<&Voicing> = candidates.iter().filter(|v| v.notes.len() >= 3).collect();
        let pool: Vec<&Voicing> = if filtered.is_empty() {
            candidates.iter().collect()
        } else {
            filtered
        };

        let chosen: &Voicing = match &self.last {
            None => {
                // First grip: nothing to lead from, so take the first
                // candidate with four or more notes, in generation order.
                pool.iter()
                    .find(|v| v.notes.len() >= 4)
                    .copied()
                    .unwrap_or(pool[0])
            }
            Some(last) => pool
                .iter()
                .copied()
                .min_by(|a, b| {
                    let ca = self.cost(a, last, chord, preferred, tension, bass_note);
                    let cb = self.cost(b, last, chord, preferred, tension, bass_note);
                    ca.total_cmp(&cb)
                })
                .unwrap_or(pool[0]),
        };

        let notes = chosen.notes.clone();
        if let Some(last) = &self.last {
            self.last_centroid_move = centroid(&notes) - centroid(last);
        }
        self.last = Some(notes.clone());

        self.log
            .push_back(format!("{:?}/{}:{:?}", chosen.kind, chosen.variation, notes));
        while self.log.len() > LOG_LEN {
            self.log.pop_front();
        }

        notes
    }

    /// Weighted cost of moving from `last` to candidate `v`. Lower wins.
    fn cost(
        &self,
        v: &Voicing,
        last: &[u8],
        chord: &ChordContext,
        preferred: VoicingType,
        tension: f64,
        bass_note: Option<u8>,
    ) -> f64 {
        let w = &self.weights;
        let mut cost = 0.0;

        // Per-voice displacement against the best octave alignment of the
        // candidate. The candidate itself is already register-normalized;
        // the shift here only affects measurement.
        let mut best_displacement = f64::MAX;
        for shift in [-12i16, 0, 12] {
            let paired = v.notes.len().min(last.len());
            let mut sum = 0.0;
            for i in 0..paired {
                let d = (v.notes[i] as i16 + shift - last[i] as i16).abs() as f64;
                sum += d.powf(w.displacement_exponent);
            }
            // Unpaired voices count as appearing from nothing: half an
            // octave of displacement each keeps sizes comparable.
            sum += (v.notes.len() as i16 - paired as i16).unsigned_abs() as f64
                * 6.0f64.powf(w.displacement_exponent);
            if sum < best_displacement {
                best_displacement = sum;
            }
        }
        cost += w.displacement * best_displacement;

        // Melodic top voice: large jumps hurt disproportionately.
        if let (Some(&top), Some(&last_top)) = (v.notes.last(), last.last()) {
            let jump = (top as f64 - last_top as f64).abs();
            cost += w.top_note_jump * jump * jump;
        }

        // Alternating centroid motion keeps the comping from marching
        // steadily up or down the keyboard.
        let centroid_move = centroid(&v.notes) - centroid(last);
        if self.last_centroid_move != 0.0 && centroid_move != 0.0 {
            if centroid_move.signum() != self.last_centroid_move.signum() {
                cost -= w.contrary_motion;
            } else {
                cost += w.contrary_motion * 0.5;
            }
        }

        // Contrapuntal separation from the bass register.
        if let Some(bass) = bass_note {
            let bass_is_high = bass >= 47;
            if (bass_is_high && centroid_move < 0.0) || (!bass_is_high && centroid_move > 0.0) {
                cost -= w.bass_register;
            }
        }

        // Parallel motion between voice pairs, with the classical extra
        // charge for parallel perfect fifths and octaves.
        let paired = v.notes.len().min(last.len());
        for i in 0..paired {
            for j in (i + 1)..paired {
                let move_i = interval::semitones(last[i], v.notes[i]);
                let move_j = interval::semitones(last[j], v.notes[j]);
                if move_i != 0 && move_i == move_j {
                    cost += w.parallel_motion;
                    let before = interval::semitones(last[i], last[j]);
                    let after = interval::semitones(v.notes[i], v.notes[j]);
                    if interval::is_perfect_class(before) && interval::is_perfect_class(after) {
                        cost += w.parallel_perfects;
                    }
                }
            }
        }

        // Register drift.
        let c = centroid(&v.notes);
        if c < SCORING_BAND.0 {
            cost += w.out_of_range * (SCORING_BAND.0 - c);
        } else if c > SCORING_BAND.1 {
            cost += w.out_of_range * (c - SCORING_BAND.1);
        }

        // Caller preferences.
        if v.kind == preferred {
            cost -= w.preferred_type;
        }
        if v.kind == VoicingType::Cluster {
            cost -= w.cluster_tension * tension;
        }

        // Fuller grips and intact guide tones.
        if v.notes.len() >= 4 {
            cost -= w.note_count;
        }
        let (third, seventh) = chord.guide_pcs();
        let pcs: Vec<u8> = v.notes.iter().map(|&n| n % 12).collect();
        if pcs.contains(&third) && pcs.contains(&seventh) {
            cost -= w.guide_tones;
        }

        // Accidental crowding: seconds are a cluster's privilege.
        if v.kind != VoicingType::Cluster {
            if let Some(gap) = min_adjacent_gap(&v.notes) {
                if gap < 4 {
                    cost += w.tight_spacing * (4 - gap) as f64;
                }
            }
        }

        cost
    }
}

/// Mean pitch of a note set.
fn centroid(notes: &[u8]) -> f64 {
    if notes.is_empty() {
        return 0.0;
    }
    notes.iter().map(|&n| n as f64).sum::<f64>() / notes.len() as f64
}

/// Smallest gap between adjacent voices, `None` for fewer than two notes.
fn min_adjacent_gap(notes: &[u8]) -> Option<u8> {
    notes.windows(2).map(|w| w[1] - w[0]).min()
}

/// Build every structural candidate for a chord.
pub(crate) fn generate_candidates(
    chord: &ChordContext,
    tension: f64,
    modern: bool,
) -> Vec<Voicing> {
    if chord.intervals.is_empty() {
        return Vec::new();
    }

    // Season plain chords with extensions when the caller wants color.
    let mut chord = chord.clone();
    if (modern || tension > 0.6) && chord.intervals.len() <= 4 {
        match chord.quality {
            Quality::Maj | Quality::Maj6 | Quality::Maj7 => chord.add_interval(14),
            Quality::Min | Quality::Min6 | Quality::Min7 => chord.add_interval(14),
            Quality::Dom7 | Quality::Sus4 => {
                chord.add_interval(14);
                chord.add_interval(21);
            }
            Quality::Dim7 | Quality::HalfDim | Quality::Altered => {}
        }
    }

    let shell = priority_shell(&chord);
    let shell_pcs: Vec<u8> = shell.iter().map(|&iv| (chord.root + iv) % 12).collect();

    let mut out = Vec::new();
    for kind in VoicingType::ALWAYS {
        build_type(&mut out, kind, &shell_pcs, chord.root);
    }
    if modern || tension > 0.7 {
        build_type(&mut out, VoicingType::Cluster, &shell_pcs, chord.root);
    }

    for v in &mut out {
        normalize_register(&mut v.notes);
    }
    out
}

/// Order the chord's intervals by voicing priority: guide tones first,
/// then the fifth, the root, and upper extensions. At most five tones.
fn priority_shell(chord: &ChordContext) -> Vec<u8> {
    let (third, seventh) = chord.quality.guide_tones();
    let mut shell = Vec::with_capacity(5);
    let push = |iv: u8, shell: &mut Vec<u8>| {
        if chord.intervals.contains(&iv) && !shell.contains(&iv) && shell.len() < 5 {
            shell.push(iv);
        }
    };
    push(third, &mut shell);
    push(seventh, &mut shell);
    push(7, &mut shell);
    push(0, &mut shell);
    let mut extensions: Vec<u8> = chord
        .intervals
        .iter()
        .copied()
        .filter(|iv| !shell.contains(iv) && *iv != third && *iv != seventh && *iv != 7 && *iv != 0)
        .collect();
    extensions.sort_unstable();
    for iv in extensions {
        push(iv, &mut shell);
    }
    shell
}

/// Realize all rotations of one structural type.
fn build_type(out: &mut Vec<Voicing>, kind: VoicingType, shell_pcs: &[u8], root: u8) {
    let pcs: Vec<u8> = match kind {
        VoicingType::Rootless => {
            let without_root: Vec<u8> = shell_pcs.iter().copied().filter(|&pc| pc != root).collect();
            if without_root.len() < 3 {
                return;
            }
            without_root
        }
        // Clusters lead with the color tones so the seconds land on top
        // of the grip's identity, not instead of it.
        VoicingType::Cluster => shell_pcs.iter().rev().copied().collect(),
        _ => shell_pcs.to_vec(),
    };

    let needs_four = matches!(
        kind,
        VoicingType::Drop2 | VoicingType::Drop3 | VoicingType::Drop24
    );
    if needs_four && pcs.len() < 4 {
        return;
    }

    let variations = pcs.len().clamp(2, 4);
    for variation in 0..variations {
        let mut rotated = pcs.clone();
        rotated.rotate_left(variation % pcs.len());

        let min_gap = match kind {
            VoicingType::Quartal => 4,
            _ => 1,
        };
        let mut notes = stack(&rotated, 48, min_gap);

        match kind {
            VoicingType::Drop2 => drop_voice(&mut notes, 2),
            VoicingType::Drop3 => drop_voice(&mut notes, 3),
            VoicingType::Drop24 => {
                drop_voice(&mut notes, 2);
                drop_voice(&mut notes, 4);
            }
            VoicingType::Spread => {
                if let Some(bottom) = notes.first_mut() {
                    *bottom = bottom.saturating_sub(12);
                }
                notes.sort_unstable();
            }
            _ => {}
        }

        out.push(Voicing {
            notes,
            kind,
            variation,
        });
    }
}

/// Stack pitch classes bottom-up: each tone lands at the smallest
/// interval of at least `min_gap` above the previous one.
fn stack(pcs: &[u8], base: u8, min_gap: u8) -> SmallVec<[u8; 8]> {
    let mut notes: SmallVec<[u8; 8]> = SmallVec::new();
    let mut prev: i16 = base as i16 - 1;
    for &pc in pcs {
        let mut candidate = prev + min_gap as i16;
        while candidate.rem_euclid(12) != pc as i16 {
            candidate += 1;
        }
        notes.push(candidate.clamp(0, 127) as u8);
        prev = candidate;
    }
    notes
}

/// Lower the nth voice from the top by an octave, then restore order.
fn drop_voice(notes: &mut SmallVec<[u8; 8]>, nth_from_top: usize) {
    let len = notes.len();
    if nth_from_top == 0 || nth_from_top > len {
        return;
    }
    let idx = len - nth_from_top;
    notes[idx] = notes[idx].saturating_sub(12);
    notes.sort_unstable();
}

/// Shift the whole grip by octaves until its centroid sits in the
/// comping band.
fn normalize_register(notes: &mut SmallVec<[u8; 8]>) {
    if notes.is_empty() {
        return;
    }
    for _ in 0..8 {
        let c = centroid(notes);
        if c < NORMALIZE_BAND.0 && notes.iter().all(|&n| n <= 115) {
            for n in notes.iter_mut() {
                *n += 12;
            }
        } else if c > NORMALIZE_BAND.1 && notes.iter().all(|&n| n >= 12) {
            for n in notes.iter_mut() {
                *n -= 12;
            }
        } else {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bandstand_theory::chord::resolve;

    #[test]
    fn cmaj7_first_grip_contains_guide_tones() {
        // Cmaj7 at moderate tension with no prior voicing.
        let chord = resolve("Cmaj7").unwrap();
        let mut engine = VoicingEngine::new();
        let notes = engine.next_voicing(&chord, VoicingType::Rootless, 0.5, false, None);
        assert!(notes.len() >= 3);
        let pcs: Vec<u8> = notes.iter().map(|&n| n % 12).collect();
        assert!(pcs.contains(&4), "missing the 3rd in {notes:?}");
        assert!(pcs.contains(&11), "missing the 7th in {notes:?}");
    }

    #[test]
    fn first_grip_prefers_four_notes() {
        let chord = resolve("G7").unwrap();
        let mut engine = VoicingEngine::new();
        let notes = engine.next_voicing(&chord, VoicingType::Close, 0.3, false, None);
        assert!(notes.len() >= 4, "got {notes:?}");
    }

    #[test]
    fn guide_tones_survive_seventh_chords() {
        for symbol in ["G7", "Cmaj7", "Dm7"] {
            let chord = resolve(symbol).unwrap();
            let mut engine = VoicingEngine::new();
            // Warm up so the second call exercises the scored path.
            engine.next_voicing(&chord, VoicingType::Rootless, 0.4, false, None);
            let notes = engine.next_voicing(&chord, VoicingType::Rootless, 0.4, false, None);
            let (third, seventh) = chord.guide_pcs();
            let pcs: Vec<u8> = notes.iter().map(|&n| n % 12).collect();
            assert!(
                pcs.contains(&third) && pcs.contains(&seventh),
                "{symbol}: guide tones missing from {notes:?}"
            );
        }
    }

    #[test]
    fn voicings_sit_in_the_comping_register() {
        let chord = resolve("Bbm7").unwrap();
        for v in generate_candidates(&chord, 0.5, true) {
            let c = centroid(&v.notes);
            assert!(
                (NORMALIZE_BAND.0..=NORMALIZE_BAND.1).contains(&c),
                "{:?} centroid {c}",
                v
            );
            let mut sorted = v.notes.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, v.notes, "notes must be ascending: {v:?}");
        }
    }

    #[test]
    fn clusters_only_under_tension() {
        let chord = resolve("C7").unwrap();
        let calm = generate_candidates(&chord, 0.2, false);
        assert!(calm.iter().all(|v| v.kind != VoicingType::Cluster));
        let hot = generate_candidates(&chord, 0.9, false);
        assert!(hot.iter().any(|v| v.kind == VoicingType::Cluster));
    }

    #[test]
    fn seasoning_adds_color_once() {
        let chord = resolve("C7").unwrap();
        let candidates = generate_candidates(&chord, 0.8, true);
        // A dominant seasoned under tension carries a 9th somewhere.
        let has_ninth = candidates
            .iter()
            .any(|v| v.notes.iter().any(|&n| n % 12 == 2));
        assert!(has_ninth, "expected a seasoned 9th on C7");
    }

    #[test]
    fn consecutive_grips_move_smoothly() {
        let mut engine = VoicingEngine::new();
        let changes = ["Dm7", "G7", "Cmaj7", "A7", "Dm7", "G7", "Cmaj7"];
        let mut prev: Option<SmallVec<[u8; 8]>> = None;
        for symbol in changes {
            let chord = resolve(symbol).unwrap();
            let notes = engine.next_voicing(&chord, VoicingType::Rootless, 0.4, true, Some(40));
            assert!(notes.len() >= 3);
            if let Some(prev) = &prev {
                let jump = (centroid(&notes) - centroid(prev)).abs();
                assert!(jump < 9.0, "centroid lurched {jump} semitones");
            }
            prev = Some(notes);
        }
    }

    #[test]
    fn malformed_chord_yields_rest() {
        let mut engine = VoicingEngine::new();
        let mut empty = resolve("C").unwrap();
        empty.intervals.clear();
        let notes = engine.next_voicing(&empty, VoicingType::Close, 0.5, false, None);
        assert!(notes.is_empty());
    }

    #[test]
    fn log_is_bounded() {
        let mut engine = VoicingEngine::new();
        let chord = resolve("F7").unwrap();
        for _ in 0..40 {
            engine.next_voicing(&chord, VoicingType::Close, 0.4, false, None);
        }
        assert!(engine.log.len() <= LOG_LEN);
    }
}
