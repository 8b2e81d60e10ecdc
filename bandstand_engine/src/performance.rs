// The conductor: one bar at a time, every generator in its place.
//
// `Performer` owns a chart and one instance of each generator and renders
// a complete performance ahead of time. Per bar it:
//   1. steps the energy chain when its 4-8 bar interval elapses, feeding
//      it the chart's local harmonic density first,
//   2. asks the dialogue coordinator whether this bar answers the last,
//   3. selects the piano's rhythm template and voices each strike against
//      the chord sounding at that strike (anticipations voice the next
//      bar's chord),
//   4. walks the bass through the bar with look-ahead to the next chord,
//   5. generates the drums,
//   6. applies the answer (space, echo, or a denser complement) to the
//      responder's material,
//   7. humanizes velocities and onsets and emits the events,
//   8. leaves behind the bar summary the coordinator reads next bar.
//
// Everything is computed on one logical timeline; the output events carry
// absolute onsets in beats and the renderer converts to wall clock.

use crate::bass::WalkingBass;
use crate::chart::ChordChart;
use crate::dialogue::{Answer, AnswerKind, Dialogue};
use crate::drums::{DrumHit, DrumKit};
use crate::energy::{EnergyLevel, EnergyMarkov};
use crate::event::{BarSummary, BassBar, DrumsBar, Instrument, NoteEvent, PianoBar};
use crate::pattern::RhythmPattern;
use crate::rhythm::{RhythmEngine, SpacingHint};
use crate::voicing::{VoicingEngine, VoicingType, VoicingWeights};
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

/// Onset humanization bound, in seconds. Sub-10ms by design: enough to
/// breathe, not enough to flam.
const ONSET_JITTER_SECONDS: f64 = 0.004;

/// Performance-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformConfig {
    pub tempo_bpm: f64,
    /// Off-beat placement as a fraction of a beat. 2/3 is swung eighths.
    pub swing: f64,
    /// 3/4 instead of 4/4. Waltz bars use the simpler bass path.
    pub waltz: bool,
    /// Host-supplied activity scalar, blended with the energy chain.
    pub energy: f64,
    pub choruses: usize,
    /// Colors plain chords with extensions in the voicing engine.
    pub modern: bool,
}

impl Default for PerformConfig {
    fn default() -> Self {
        PerformConfig {
            tempo_bpm: 140.0,
            swing: 2.0 / 3.0,
            waltz: false,
            energy: 0.5,
            choruses: 2,
            modern: true,
        }
    }
}

/// A rendered performance: the full event stream plus its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    pub events: Vec<NoteEvent>,
    pub bars: usize,
    pub beats_per_bar: f64,
    pub tempo_bpm: f64,
}

impl Performance {
    pub fn duration_seconds(&self) -> f64 {
        self.bars as f64 * self.beats_per_bar * 60.0 / self.tempo_bpm
    }

    /// Compact per-bar text rendering for inspection: event counts per
    /// instrument, one bar per line.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for bar in 0..self.bars {
            let start = bar as f64 * self.beats_per_bar;
            let end = start + self.beats_per_bar;
            let count = |instrument: Instrument| {
                self.events
                    .iter()
                    .filter(|e| {
                        e.instrument == instrument && e.onset >= start - 0.25 && e.onset < end - 0.25
                    })
                    .count()
            };
            out.push_str(&format!(
                "bar {:>3} | piano {:>2} | bass {:>2} | drums {:>2}\n",
                bar + 1,
                count(Instrument::Piano),
                count(Instrument::Bass),
                count(Instrument::Drums),
            ));
        }
        out
    }
}

/// Piano material from the previous bar, kept bar-relative for echoes.
#[derive(Debug, Clone, Default)]
struct LastBar {
    piano: Vec<(f64, SmallVec<[u8; 8]>, f32, f64)>,
    bass: Vec<u8>,
    drums: Vec<DrumHit>,
}

/// The bar-by-bar conductor.
#[derive(Debug)]
pub struct Performer {
    config: PerformConfig,
    chart: ChordChart,
    rhythm: RhythmEngine,
    energy: EnergyMarkov,
    voicing: VoicingEngine,
    bass: WalkingBass,
    drums: DrumKit,
    dialogue: Dialogue,
    bars_until_energy_step: usize,
    last_summary: Option<BarSummary>,
    last_bar: LastBar,
}

impl Performer {
    pub fn new(chart: ChordChart, config: PerformConfig) -> Self {
        let drums = DrumKit::new(config.swing);
        Performer {
            config,
            chart,
            rhythm: RhythmEngine::new(),
            energy: EnergyMarkov::new(),
            voicing: VoicingEngine::new(),
            bass: WalkingBass::new(),
            drums,
            dialogue: Dialogue::new(),
            bars_until_energy_step: 0,
            last_summary: None,
            last_bar: LastBar::default(),
        }
    }

    /// Replace the voicing cost profile before rendering.
    pub fn set_voicing_weights(&mut self, weights: VoicingWeights) {
        self.voicing = VoicingEngine::with_weights(weights);
    }

    pub fn beats_per_bar(&self) -> f64 {
        if self.config.waltz { 3.0 } else { 4.0 }
    }

    /// Render the configured number of choruses.
    pub fn render(&mut self, rng: &mut impl Rng) -> Performance {
        let beats_per_bar = self.beats_per_bar();
        let form_beats = self.chart.total_beats().max(beats_per_bar);
        let bars_per_chorus = (form_beats / beats_per_bar).ceil() as usize;
        let total_bars = bars_per_chorus * self.config.choruses.max(1);

        let mut events = Vec::new();
        for bar in 0..total_bars {
            self.play_bar(bar, &mut events, rng);
        }
        events.sort_by(|a, b| a.onset.total_cmp(&b.onset));

        Performance {
            events,
            bars: total_bars,
            beats_per_bar,
            tempo_bpm: self.config.tempo_bpm,
        }
    }

    fn play_bar(&mut self, bar_index: usize, events: &mut Vec<NoteEvent>, rng: &mut impl Rng) {
        let beats_per_bar = self.beats_per_bar();
        let bar_start = bar_index as f64 * beats_per_bar;

        // Energy chain: slow-moving, re-biased by the chart ahead.
        if self.bars_until_energy_step == 0 {
            let density = self.chart.density_in(bar_start, beats_per_bar * 4.0);
            self.energy.update_intensity(density);
            self.energy.next(rng);
            self.bars_until_energy_step = rng.random_range(4..=8);
        }
        self.bars_until_energy_step -= 1;
        let level = self.energy.current();

        let activity = (self.config.energy * 0.5 + level.activity_target() * 0.5).clamp(0.0, 1.0);

        let answer = self.dialogue.decide(bar_index, self.last_summary.as_ref(), rng);

        let pattern = self.select_piano_pattern(bar_start, beats_per_bar, activity, answer, rng);
        let piano = self.play_piano(bar_start, beats_per_bar, &pattern, activity, answer, rng);
        let bass = self.play_bass(bar_start, beats_per_bar, answer, rng);
        let (drum_hits, fill) = self.play_drums(bar_start, activity, level, answer, rng);

        // Collect the bar's events, then humanize onsets in one pass.
        let mut bar_events: Vec<NoteEvent> = Vec::new();
        for (offset, notes, velocity, duration) in &piano {
            bar_events.push(NoteEvent {
                instrument: Instrument::Piano,
                notes: notes.clone(),
                velocity: *velocity,
                onset: bar_start + offset,
                duration: *duration,
            });
        }
        for (i, &note) in bass.iter().enumerate() {
            bar_events.push(NoteEvent {
                instrument: Instrument::Bass,
                notes: smallvec![note],
                velocity: jitter(0.55 + 0.2 * activity as f32, rng),
                onset: bar_start + i as f64,
                duration: 0.95,
            });
        }
        let bass_push = self.maybe_push_bass(bar_start, beats_per_bar, answer, &bass, &mut bar_events, rng);
        for hit in &drum_hits {
            bar_events.push(NoteEvent {
                instrument: Instrument::Drums,
                notes: smallvec![hit.voice.gm_note()],
                velocity: hit.velocity,
                onset: bar_start + hit.offset,
                duration: 0.25,
            });
        }

        let onset_jitter = ONSET_JITTER_SECONDS * self.config.tempo_bpm / 60.0;
        for mut event in bar_events {
            let wobble: f64 = rng.random_range(-onset_jitter..onset_jitter);
            event.onset = (event.onset + wobble).max(0.0);
            events.push(event);
        }

        // The bar summary the coordinator sees next bar.
        let bass_skip = bass.windows(2).any(|w| w[0].abs_diff(w[1]) >= 7);
        self.last_summary = Some(BarSummary {
            piano: (!piano.is_empty()).then_some(PianoBar {
                pattern: pattern.name,
                steps: piano.len(),
            }),
            drums: (!drum_hits.is_empty()).then_some(DrumsBar {
                fill,
                hits: drum_hits.len(),
            }),
            bass: (!bass.is_empty()).then_some(BassBar {
                push: bass_push,
                skip: bass_skip,
            }),
        });

        self.last_bar = LastBar {
            piano,
            bass,
            drums: drum_hits,
        };
    }

    /// Choose the bar's comping template, honoring a piano answer.
    fn select_piano_pattern(
        &mut self,
        bar_start: f64,
        beats_per_bar: f64,
        activity: f64,
        answer: Option<Answer>,
        rng: &mut impl Rng,
    ) -> RhythmPattern {
        let spacing = SpacingHint {
            chords_per_bar: self.chart.changes_in(bar_start, beats_per_bar) as f64,
            min_step_duration: (self.config.tempo_bpm >= 230.0).then_some(0.5),
        };
        let mut pattern =
            self.rhythm
                .select_pattern(self.config.tempo_bpm, activity, Some(spacing), rng);

        // A complementing piano answers with density.
        if let Some(a) = answer {
            if a.responder == Instrument::Piano
                && a.kind == AnswerKind::Complement
                && pattern.steps.len() < 3
            {
                if let Some(driving) = RhythmPattern::standard_set()
                    .into_iter()
                    .find(|p| p.name.is_driving_class())
                {
                    pattern = driving;
                }
            }
        }
        pattern
    }

    /// Voice each strike of the template. Returns bar-relative material.
    fn play_piano(
        &mut self,
        bar_start: f64,
        beats_per_bar: f64,
        pattern: &RhythmPattern,
        activity: f64,
        answer: Option<Answer>,
        rng: &mut impl Rng,
    ) -> Vec<(f64, SmallVec<[u8; 8]>, f32, f64)> {
        match answer {
            Some(a) if a.responder == Instrument::Piano && a.kind == AnswerKind::Space => {
                return Vec::new();
            }
            Some(a)
                if a.responder == Instrument::Piano
                    && a.kind == AnswerKind::Echo
                    && !self.last_bar.piano.is_empty() =>
            {
                return self.last_bar.piano.clone();
            }
            _ => {}
        }

        let tension = (0.25 + 0.6 * activity).clamp(0.0, 1.0);
        let mut out = Vec::with_capacity(pattern.steps.len());
        for step in &pattern.steps {
            // Templates are written for 4/4; in a waltz the strikes past
            // the third beat simply do not exist.
            if !step.anticipation && step.offset >= beats_per_bar {
                continue;
            }
            // An anticipation strikes the chord that owns the next barline.
            let lookup = if step.anticipation {
                bar_start + beats_per_bar
            } else {
                bar_start + step.offset
            };
            let Some(chord) = self.chart.context_at(lookup) else {
                continue; // unresolvable symbol: the piano rests this strike
            };
            let notes = self.voicing.next_voicing(
                &chord,
                VoicingType::Rootless,
                tension,
                self.config.modern,
                Some(self.bass.last_note()),
            );
            if notes.is_empty() {
                continue;
            }
            // Swing the off-beat strikes; anticipations always land just
            // ahead of the barline they push into.
            let mut offset = step.offset;
            if step.anticipation {
                offset = offset.min(beats_per_bar - 0.5);
            }
            if offset.fract() != 0.0 {
                offset = offset.floor() + self.drums.swing();
            }
            out.push((
                offset,
                notes,
                jitter(0.45 + 0.3 * activity as f32, rng),
                step.duration,
            ));
        }
        out
    }

    /// One bar of bass, honoring bass answers and degraded chart slots.
    fn play_bass(
        &mut self,
        bar_start: f64,
        beats_per_bar: f64,
        answer: Option<Answer>,
        rng: &mut impl Rng,
    ) -> Vec<u8> {
        match answer {
            Some(a) if a.responder == Instrument::Bass && a.kind == AnswerKind::Space => {
                return Vec::new();
            }
            Some(a)
                if a.responder == Instrument::Bass
                    && a.kind == AnswerKind::Echo
                    && !self.last_bar.bass.is_empty() =>
            {
                return self.last_bar.bass.clone();
            }
            _ => {}
        }

        let Some(current) = self.chart.context_at(bar_start) else {
            // Unresolvable chord: hold the register rather than guess.
            return vec![self.bass.last_note()];
        };

        if self.config.waltz {
            self.bass.generate_waltz_bar(&current, rng).to_vec()
        } else {
            let next = self
                .chart
                .context_at(bar_start + beats_per_bar)
                .unwrap_or_else(|| current.clone());
            self.bass.generate_bar(&current, &next, rng).to_vec()
        }
    }

    /// A complementing bass answer adds a pushed eighth before the next
    /// barline. Returns whether a push happened.
    fn maybe_push_bass(
        &mut self,
        bar_start: f64,
        beats_per_bar: f64,
        answer: Option<Answer>,
        bar: &[u8],
        events: &mut Vec<NoteEvent>,
        rng: &mut impl Rng,
    ) -> bool {
        let Some(a) = answer else { return false };
        if a.responder != Instrument::Bass || a.kind != AnswerKind::Complement || bar.is_empty() {
            return false;
        }
        let Some(&last) = bar.last() else {
            return false;
        };
        events.push(NoteEvent {
            instrument: Instrument::Bass,
            notes: smallvec![last],
            velocity: jitter(0.6, rng),
            onset: bar_start + (beats_per_bar - 1.0) + self.drums.swing(),
            duration: 1.0 - self.drums.swing(),
        });
        true
    }

    /// One bar of drums, honoring drum answers.
    fn play_drums(
        &mut self,
        bar_start: f64,
        activity: f64,
        level: EnergyLevel,
        answer: Option<Answer>,
        rng: &mut impl Rng,
    ) -> (Vec<DrumHit>, bool) {
        match answer {
            Some(a) if a.responder == Instrument::Drums && a.kind == AnswerKind::Space => {
                return (Vec::new(), false);
            }
            Some(a)
                if a.responder == Instrument::Drums
                    && a.kind == AnswerKind::Echo
                    && !self.last_bar.drums.is_empty() =>
            {
                return (self.last_bar.drums.clone(), false);
            }
            _ => {}
        }

        let color = self
            .chart
            .context_at(bar_start)
            .map(|c| (c.altered_extension_count() as f64 / 2.0).min(1.0))
            .unwrap_or(0.0);
        let activity = match answer {
            Some(a) if a.responder == Instrument::Drums && a.kind == AnswerKind::Complement => {
                (activity + 0.3).min(1.0)
            }
            _ => activity,
        };
        self.drums.generate_bar(activity, color, level, rng)
    }
}

/// Humanizing velocity jitter for the pitched instruments.
fn jitter(base: f32, rng: &mut impl Rng) -> f32 {
    (base + rng.random_range(-0.04..0.04)).clamp(0.05, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rendered(seed: u64) -> Performance {
        let mut performer = Performer::new(ChordChart::demo(), PerformConfig::default());
        let mut rng = StdRng::seed_from_u64(seed);
        performer.render(&mut rng)
    }

    #[test]
    fn renders_the_configured_length() {
        let performance = rendered(1);
        // Demo form is 12 bars, default config two choruses.
        assert_eq!(performance.bars, 24);
        assert!(!performance.events.is_empty());
        assert!(performance.duration_seconds() > 0.0);
    }

    #[test]
    fn events_are_sorted_and_in_bounds() {
        let performance = rendered(2);
        let total = performance.bars as f64 * performance.beats_per_bar;
        let mut prev = 0.0;
        for event in &performance.events {
            assert!(event.onset >= prev);
            prev = event.onset;
            assert!(event.onset < total + 1.0);
            assert!((0.0..=1.0).contains(&event.velocity));
            assert!(!event.notes.is_empty());
        }
    }

    #[test]
    fn all_three_instruments_play() {
        let performance = rendered(3);
        for instrument in Instrument::ALL {
            assert!(
                performance
                    .events
                    .iter()
                    .any(|e| e.instrument == instrument),
                "{instrument:?} never played"
            );
        }
    }

    #[test]
    fn bass_notes_stay_in_range() {
        let performance = rendered(4);
        for event in performance
            .events
            .iter()
            .filter(|e| e.instrument == Instrument::Bass)
        {
            for &note in &event.notes {
                assert!((28..=64).contains(&note), "bass note {note} out of range");
            }
        }
    }

    #[test]
    fn same_seed_same_performance() {
        let a = rendered(77);
        let b = rendered(77);
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn waltz_uses_three_beat_bars() {
        let config = PerformConfig {
            waltz: true,
            ..Default::default()
        };
        let mut performer = Performer::new(ChordChart::demo(), config);
        let mut rng = StdRng::seed_from_u64(6);
        let performance = performer.render(&mut rng);
        assert_eq!(performance.beats_per_bar, 3.0);
        assert_eq!(performance.bars, 32); // 48 beats / 3, two choruses
    }

    #[test]
    fn summary_covers_every_bar() {
        let performance = rendered(9);
        let summary = performance.summary();
        assert_eq!(summary.lines().count(), performance.bars);
    }
}
