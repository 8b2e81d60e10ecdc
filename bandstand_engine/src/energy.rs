// The energy state machine: a slow-moving mood controller.
//
// While the rhythm engine decides every bar, this Markov chain moves once
// every four to eight bars and sets the band's overall intensity. Its
// output biases the rhythm selector's weights and the voicing engine's
// tension, and gates the drummer's fills.
//
// The chain is a fixed 4x4 row-stochastic matrix, not a learned model.
// External bias arrives through `update_intensity`, which swaps the
// whole matrix for a hand-tuned hot or cool variant. One rule is
// structural rather than tuned: a fill never follows a fill, so the
// Fill row carries probability zero for Fill.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The band's energy bands, plus the fill break state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    Fill,
}

impl EnergyLevel {
    pub const ALL: [EnergyLevel; 4] = [
        EnergyLevel::Low,
        EnergyLevel::Medium,
        EnergyLevel::High,
        EnergyLevel::Fill,
    ];

    fn index(self) -> usize {
        match self {
            EnergyLevel::Low => 0,
            EnergyLevel::Medium => 1,
            EnergyLevel::High => 2,
            EnergyLevel::Fill => 3,
        }
    }

    /// The activity scalar this band aims the ensemble at. A fill bar is
    /// played hot regardless of where the chart sits.
    pub fn activity_target(self) -> f64 {
        match self {
            EnergyLevel::Low => 0.2,
            EnergyLevel::Medium => 0.5,
            EnergyLevel::High => 0.85,
            EnergyLevel::Fill => 0.9,
        }
    }
}

/// Row-stochastic transition matrix, rows indexed by `EnergyLevel`.
type Matrix = [[f64; 4]; 4];

/// Baseline behavior: hovers around Medium, visits Fill occasionally.
const DEFAULT_MATRIX: Matrix = [
    [0.45, 0.40, 0.10, 0.05],
    [0.15, 0.45, 0.30, 0.10],
    [0.05, 0.30, 0.45, 0.20],
    [0.10, 0.45, 0.45, 0.00],
];

/// Dense harmony pushes the band upward.
const HOT_MATRIX: Matrix = [
    [0.20, 0.35, 0.35, 0.10],
    [0.05, 0.30, 0.50, 0.15],
    [0.02, 0.18, 0.55, 0.25],
    [0.05, 0.30, 0.65, 0.00],
];

/// Thin harmony settles the band down.
const COOL_MATRIX: Matrix = [
    [0.65, 0.28, 0.05, 0.02],
    [0.40, 0.45, 0.10, 0.05],
    [0.20, 0.50, 0.25, 0.05],
    [0.30, 0.55, 0.15, 0.00],
];

/// The slow-moving mood chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyMarkov {
    current: EnergyLevel,
    matrix: Matrix,
}

impl Default for EnergyMarkov {
    fn default() -> Self {
        Self::new()
    }
}

impl EnergyMarkov {
    pub fn new() -> Self {
        EnergyMarkov {
            current: EnergyLevel::Medium,
            matrix: DEFAULT_MATRIX,
        }
    }

    pub fn current(&self) -> EnergyLevel {
        self.current
    }

    /// Advance the chain one step and return the new level.
    ///
    /// Draws against the cumulative row of the current state. If rounding
    /// leaves the draw past the final cumulative sum, Medium is the safe
    /// landing spot.
    pub fn next(&mut self, rng: &mut impl Rng) -> EnergyLevel {
        let row = self.matrix[self.current.index()];
        let draw = rng.random::<f64>();
        let mut cumulative = 0.0;
        let mut chosen = EnergyLevel::Medium;
        for level in EnergyLevel::ALL {
            cumulative += row[level.index()];
            if draw < cumulative {
                chosen = level;
                break;
            }
        }
        self.current = chosen;
        chosen
    }

    /// Bias the chain from the chart's harmonic density. Dense charts
    /// (many changes, altered chords) swap in the hot matrix, static
    /// charts the cool one; anything in between restores the default.
    pub fn update_intensity(&mut self, density: f64) {
        self.matrix = if density > 0.75 {
            HOT_MATRIX
        } else if density < 0.3 {
            COOL_MATRIX
        } else {
            DEFAULT_MATRIX
        };
    }
}
