// Bandstand music-theory vocabulary.
//
// Shared, stateless types consumed by the rhythm-section generators in
// `bandstand_engine`:
// - pitch.rs: pitch-class math, octave placement, range folding, interval
//   classification, note names
// - chord.rs: chord qualities, resolved chord contexts, and the
//   chord-symbol resolver
// - scale.rs: the step scale implied by a chord quality, with membership,
//   snapping, and stepwise-walk helpers
//
// Nothing in this crate holds engine state or draws random numbers; every
// function is a pure computation over its arguments.

pub mod chord;
pub mod pitch;
pub mod scale;
