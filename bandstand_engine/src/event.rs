// Note events and bar summaries: the engine's output vocabulary.
//
// Every generator ultimately produces `NoteEvent`s, timestamped in beats
// from the start of the performance. The playback layer (or the MIDI
// renderer in midi.rs) is the only consumer of absolute time; inside the
// engine everything is beat-relative.
//
// `BarSummary` is the one piece of cross-generator communication: a
// description of what each instrument just played, produced at the end of
// a bar and consumed by the call-and-response coordinator at the start of
// the next. It lives for exactly one bar.

use crate::pattern::PatternName;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The three players of the rhythm section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    Piano,
    Bass,
    Drums,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Piano, Instrument::Bass, Instrument::Drums];

    /// The two instruments other than this one.
    pub fn others(self) -> [Instrument; 2] {
        match self {
            Instrument::Piano => [Instrument::Bass, Instrument::Drums],
            Instrument::Bass => [Instrument::Piano, Instrument::Drums],
            Instrument::Drums => [Instrument::Piano, Instrument::Bass],
        }
    }
}

/// A scheduled note (or simultaneous note group, for piano voicings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub instrument: Instrument,
    /// MIDI note numbers sounding together. One entry for bass and drums.
    pub notes: SmallVec<[u8; 8]>,
    /// Normalized velocity, 0.0 to 1.0.
    pub velocity: f32,
    /// Onset in beats from the start of the performance.
    pub onset: f64,
    /// Duration in beats.
    pub duration: f64,
}

/// What the piano did in the bar that just ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PianoBar {
    pub pattern: PatternName,
    pub steps: usize,
}

/// What the drums did in the bar that just ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrumsBar {
    pub fill: bool,
    pub hits: usize,
}

/// What the bass did in the bar that just ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BassBar {
    /// An anticipated (pushed) note ahead of a barline.
    pub push: bool,
    /// A skip, meaning an octave displacement or a dropped beat.
    pub skip: bool,
}

/// End-of-bar snapshot consumed by the dialogue coordinator next bar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BarSummary {
    pub piano: Option<PianoBar>,
    pub drums: Option<DrumsBar>,
    pub bass: Option<BassBar>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn others_excludes_self() {
        for instrument in Instrument::ALL {
            let others = instrument.others();
            assert_eq!(others.len(), 2);
            assert!(!others.contains(&instrument));
        }
    }
}
