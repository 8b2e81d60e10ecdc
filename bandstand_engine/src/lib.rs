// Bandstand rhythm-section engine.
//
// A procedural jazz rhythm section: given a chord chart, a tempo, and an
// energy setting, the engine decides bar by bar and beat by beat what the
// piano, bass, and drums play, and emits the result as a stream of timed
// note events. The output is plausible, voice-led, and non-repeating; the
// whole system is a set of small constrained-random generators with
// bounded histories and explicit tie-break rules, deterministic given a
// seed.
//
// Architecture:
// - event.rs: note events, instruments, and the per-bar summaries the
//   players exchange
// - pattern.rs: the fixed one-bar comping rhythm templates
// - rhythm.rs: per-bar template selection (tempo bands, energy bias,
//   transition bonuses, repetition penalties)
// - energy.rs: the slow-moving Markov energy chain (Low/Medium/High/Fill)
// - voicing.rs: candidate voicing generation and voice-leading cost
//   scoring against the previous grip
// - bass.rs: the walking bass (anchor/approach bar construction, phrase
//   shapes, direction momentum, per-beat fallback path)
// - dialogue.rs: the call-and-response coordinator
// - drums.rs: probabilistic beat-indexed ride/hat/snare/kick generation
// - chart.rs: the chord chart input, with wrap-around lookups
// - performance.rs: the conductor that drives everything and humanizes
//   the output
// - midi.rs: Standard MIDI File rendering of a performance
//
// Chord symbols resolve through `bandstand_theory`; an unresolvable
// symbol degrades to silence or a held note, never an error.

pub mod bass;
pub mod chart;
pub mod dialogue;
pub mod drums;
pub mod energy;
pub mod event;
pub mod midi;
pub mod pattern;
pub mod performance;
pub mod rhythm;
pub mod voicing;
