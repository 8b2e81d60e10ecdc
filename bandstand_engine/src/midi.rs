// MIDI output for rendered performances.
//
// Converts a `Performance` into a Standard MIDI File for playback and
// evaluation. One track per instrument: piano on channel 0, bass on
// channel 1, drums on channel 9 (the General MIDI percussion channel,
// where the kit-piece note numbers from drums.rs apply).
//
// Uses the `midly` crate for MIDI writing. Output is SMF Format 1.

use crate::event::Instrument;
use crate::performance::Performance;
use midly::{
    Format, Header, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::error::Error;
use std::path::Path;

/// Ticks per quarter note in MIDI output.
const TICKS_PER_QUARTER: u16 = 480;

/// Render a performance to MIDI and write it to a file.
pub fn write_midi(performance: &Performance, path: &Path) -> Result<(), Box<dyn Error>> {
    let smf = performance_to_smf(performance);
    let mut buf = Vec::new();
    smf.write(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Convert a performance to an in-memory SMF.
fn performance_to_smf(performance: &Performance) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo track.
    let mut tempo_track: Track<'static> = Vec::new();
    let tempo_microseconds = (60_000_000.0 / performance.tempo_bpm) as u32;
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    tempo_track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    smf.tracks.push(tempo_track);

    for instrument in Instrument::ALL {
        smf.tracks.push(instrument_track(performance, instrument));
    }

    smf
}

/// Channel and GM program for each instrument. Drums carry no program
/// change; channel 9 selects the kit by convention.
fn channel_and_program(instrument: Instrument) -> (u4, Option<u7>) {
    match instrument {
        Instrument::Piano => (u4::new(0), Some(u7::new(0))), // acoustic grand
        Instrument::Bass => (u4::new(1), Some(u7::new(32))), // acoustic bass
        Instrument::Drums => (u4::new(9), None),
    }
}

fn track_name(instrument: Instrument) -> &'static str {
    match instrument {
        Instrument::Piano => "Piano",
        Instrument::Bass => "Bass",
        Instrument::Drums => "Drums",
    }
}

/// Build one instrument's track from the shared event stream.
fn instrument_track(performance: &Performance, instrument: Instrument) -> Track<'static> {
    let (channel, program) = channel_and_program(instrument);
    let mut track: Track<'static> = Vec::new();

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::TrackName(
            track_name(instrument).as_bytes(),
        )),
    });
    if let Some(program) = program {
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program },
            },
        });
    }

    // Flatten the beat-time events into tick-timed on/off messages.
    // At equal ticks, offs sort before ons so a retriggered pitch is
    // released before it restarts.
    let ticks_per_beat = TICKS_PER_QUARTER as f64;
    let mut messages: Vec<(u32, bool, u8, u8)> = Vec::new();
    for event in performance
        .events
        .iter()
        .filter(|e| e.instrument == instrument)
    {
        let on_tick = (event.onset * ticks_per_beat).round().max(0.0) as u32;
        let off_tick = ((event.onset + event.duration) * ticks_per_beat).round() as u32;
        let off_tick = off_tick.max(on_tick + 1);
        let velocity = (event.velocity * 127.0).round().clamp(1.0, 127.0) as u8;
        for &note in &event.notes {
            messages.push((on_tick, true, note, velocity));
            messages.push((off_tick, false, note, 0));
        }
    }
    messages.sort_by_key(|&(tick, is_on, note, _)| (tick, is_on, note));

    let mut last_tick: u32 = 0;
    for (tick, is_on, note, velocity) in messages {
        let delta = tick - last_tick;
        last_tick = tick;
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::new(note.min(127)),
                vel: u7::new(velocity),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(note.min(127)),
                vel: u7::new(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi { channel, message },
        });
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(midly::MetaMessage::EndOfTrack),
    });
    track
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::ChordChart;
    use crate::performance::{PerformConfig, Performer};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn smf_has_one_track_per_instrument_plus_tempo() {
        let mut performer = Performer::new(ChordChart::demo(), PerformConfig::default());
        let mut rng = StdRng::seed_from_u64(1);
        let performance = performer.render(&mut rng);
        let smf = performance_to_smf(&performance);
        assert_eq!(smf.tracks.len(), 4);
    }

    #[test]
    fn note_ons_match_note_offs() {
        let mut performer = Performer::new(ChordChart::demo(), PerformConfig::default());
        let mut rng = StdRng::seed_from_u64(2);
        let performance = performer.render(&mut rng);
        let smf = performance_to_smf(&performance);
        for track in &smf.tracks[1..] {
            let mut ons = 0usize;
            let mut offs = 0usize;
            for event in track {
                if let TrackEventKind::Midi { message, .. } = &event.kind {
                    match message {
                        MidiMessage::NoteOn { .. } => ons += 1,
                        MidiMessage::NoteOff { .. } => offs += 1,
                        _ => {}
                    }
                }
            }
            assert_eq!(ons, offs);
        }
    }

    #[test]
    fn deltas_are_monotonic_by_construction() {
        let mut performer = Performer::new(ChordChart::demo(), PerformConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let performance = performer.render(&mut rng);
        let smf = performance_to_smf(&performance);
        // Writing must succeed; malformed deltas would fail here.
        let mut buf = Vec::new();
        smf.write(&mut buf).unwrap();
        assert!(!buf.is_empty());
    }
}
