// Call-and-response coordination between the three players.
//
// Once per bar the coordinator looks at a summary of the previous bar
// and decides whether somebody said something worth answering. The
// decision is sparse on purpose: a cooldown bar after every answer, a
// distinctiveness test on the question, and a flat probability gate keep
// the dialogue an occasional gesture instead of a tic.
//
// The coordinator only decides; the conductor applies the answer to the
// responder's material.

use crate::event::{BarSummary, Instrument};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Probability that a distinctive bar actually gets answered.
const ANSWER_PROBABILITY: f64 = 0.32;

/// Bars of silence enforced after an answer.
const COOLDOWN_BARS: usize = 1;

/// How an answer is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerKind {
    /// Play something denser that fits around the question.
    Complement,
    /// Repeat the responder's previous material.
    Echo,
    /// Lay out: silence as a reply.
    Space,
}

/// A decided answer for the coming bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub responder: Instrument,
    pub question_from: Instrument,
    pub kind: AnswerKind,
}

/// The coordinator's persistent state.
#[derive(Debug, Default)]
pub struct Dialogue {
    last_answer_bar: Option<usize>,
    last_question_from: Option<Instrument>,
}

impl Dialogue {
    pub fn new() -> Self {
        Dialogue::default()
    }

    /// Who asked the most recent answered question, if any.
    pub fn last_question_from(&self) -> Option<Instrument> {
        self.last_question_from
    }

    /// Decide whether this bar answers the previous one.
    pub fn decide(
        &mut self,
        bar_index: usize,
        last_bar: Option<&BarSummary>,
        rng: &mut impl Rng,
    ) -> Option<Answer> {
        let summary = last_bar?;

        if let Some(last) = self.last_answer_bar {
            if bar_index.saturating_sub(last) <= COOLDOWN_BARS {
                return None;
            }
        }

        let questioners = distinctive_instruments(summary);
        if questioners.is_empty() {
            return None;
        }
        let question_from = questioners[rng.random_range(0..questioners.len())];

        if !rng.random_bool(ANSWER_PROBABILITY) {
            return None;
        }

        let others = question_from.others();
        let responder = others[rng.random_range(0..2)];
        let kind = match rng.random::<f64>() {
            d if d < 0.5 => AnswerKind::Complement,
            d if d < 0.8 => AnswerKind::Echo,
            _ => AnswerKind::Space,
        };

        self.last_answer_bar = Some(bar_index);
        self.last_question_from = Some(question_from);
        Some(Answer {
            responder,
            question_from,
            kind,
        })
    }
}

/// Which instruments played a bar distinctive enough to count as a
/// question: busy non-sustain piano, a drum fill or busy kit, or a bass
/// bar with a push or a skip.
fn distinctive_instruments(summary: &BarSummary) -> Vec<Instrument> {
    let mut out = Vec::new();
    if let Some(piano) = summary.piano {
        if piano.steps >= 2 && !piano.pattern.is_sustain_class() {
            out.push(Instrument::Piano);
        }
    }
    if let Some(drums) = summary.drums {
        if drums.fill || drums.hits >= 6 {
            out.push(Instrument::Drums);
        }
    }
    if let Some(bass) = summary.bass {
        if bass.push || bass.skip {
            out.push(Instrument::Bass);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BassBar, DrumsBar, PianoBar};
    use crate::pattern::PatternName;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn busy_bar() -> BarSummary {
        BarSummary {
            piano: Some(PianoBar {
                pattern: PatternName::Driving,
                steps: 5,
            }),
            drums: Some(DrumsBar {
                fill: true,
                hits: 9,
            }),
            bass: Some(BassBar {
                push: true,
                skip: false,
            }),
        }
    }

    fn quiet_bar() -> BarSummary {
        BarSummary {
            piano: Some(PianoBar {
                pattern: PatternName::Sustain,
                steps: 1,
            }),
            drums: Some(DrumsBar {
                fill: false,
                hits: 4,
            }),
            bass: Some(BassBar {
                push: false,
                skip: false,
            }),
        }
    }

    #[test]
    fn first_bar_never_answers() {
        let mut dialogue = Dialogue::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(dialogue.decide(0, None, &mut rng).is_none());
    }

    #[test]
    fn quiet_bars_raise_no_questions() {
        let mut dialogue = Dialogue::new();
        let mut rng = StdRng::seed_from_u64(2);
        let quiet = quiet_bar();
        for bar in 1..100 {
            assert!(dialogue.decide(bar, Some(&quiet), &mut rng).is_none());
        }
    }

    #[test]
    fn cooldown_is_respected() {
        let mut dialogue = Dialogue::new();
        let mut rng = StdRng::seed_from_u64(3);
        let busy = busy_bar();
        let mut bar = 1;
        let mut answers = 0;
        while answers < 20 {
            if dialogue.decide(bar, Some(&busy), &mut rng).is_some() {
                answers += 1;
                // The very next bar must stay silent.
                assert!(
                    dialogue.decide(bar + 1, Some(&busy), &mut rng).is_none(),
                    "answer on bar {} was followed immediately by another",
                    bar
                );
                bar += 2;
            } else {
                bar += 1;
            }
        }
    }

    #[test]
    fn responder_differs_from_questioner() {
        let mut dialogue = Dialogue::new();
        let mut rng = StdRng::seed_from_u64(4);
        let busy = busy_bar();
        let mut seen = 0;
        let mut bar = 1;
        while seen < 50 {
            if let Some(answer) = dialogue.decide(bar, Some(&busy), &mut rng) {
                assert_ne!(answer.responder, answer.question_from);
                seen += 1;
            }
            bar += 1;
        }
    }

    #[test]
    fn answer_rate_tracks_the_gate() {
        let mut dialogue = Dialogue::new();
        let mut rng = StdRng::seed_from_u64(5);
        let busy = busy_bar();
        let trials = 10_000;
        let mut answers = 0;
        for bar in 1..=trials {
            // Space bars far apart so the cooldown never interferes.
            if dialogue.decide(bar * 3, Some(&busy), &mut rng).is_some() {
                answers += 1;
            }
        }
        let rate = answers as f64 / trials as f64;
        assert!(
            (0.27..0.37).contains(&rate),
            "answer rate {rate} strayed from the 0.32 gate"
        );
    }
}
