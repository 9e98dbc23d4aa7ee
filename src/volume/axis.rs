//! Orientation and axis-role resolution.
//!
//! A volume stores voxels in a native axis order described by a three-letter
//! code such as `LPI`. Each letter names the anatomical direction of one
//! storage axis, taken from the pairs L/R, P/A and I/S. Displaying the volume
//! in a canonical orientation assigns each storage axis a role: the fast axis
//! runs along a row of the slice, the slow axis runs down its columns and the
//! remaining axis selects the slice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ViewerError;

/// Anatomical direction pairs, indexed by `Direction::pair`.
const DIRECTION_PAIRS: [[char; 2]; 3] = [['L', 'R'], ['P', 'A'], ['I', 'S']];

/// Canonical display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Axial,
    Sagittal,
    Coronal,
}

impl Orientation {
    /// Get the display name for this orientation.
    pub fn name(&self) -> &'static str {
        match self {
            Orientation::Axial => "Axial",
            Orientation::Sagittal => "Sagittal",
            Orientation::Coronal => "Coronal",
        }
    }

    /// Get all orientations in cycle order.
    pub fn all() -> &'static [Orientation] {
        &[
            Orientation::Axial,
            Orientation::Sagittal,
            Orientation::Coronal,
        ]
    }

    /// Next orientation in the axial -> sagittal -> coronal cycle.
    pub fn next(&self) -> Orientation {
        match self {
            Orientation::Axial => Orientation::Sagittal,
            Orientation::Sagittal => Orientation::Coronal,
            Orientation::Coronal => Orientation::Axial,
        }
    }

    /// Direction letter whose axis moves fastest across a displayed row.
    pub fn fast_letter(&self) -> char {
        match self {
            Orientation::Axial => 'L',
            Orientation::Sagittal => 'P',
            Orientation::Coronal => 'L',
        }
    }

    /// Direction letter whose axis advances once per displayed row.
    pub fn slow_letter(&self) -> char {
        match self {
            Orientation::Axial => 'P',
            Orientation::Sagittal => 'I',
            Orientation::Coronal => 'I',
        }
    }
}

fn pair_of(letter: char) -> Option<usize> {
    DIRECTION_PAIRS
        .iter()
        .position(|pair| pair.contains(&letter.to_ascii_uppercase()))
}

/// Validated native axis order, e.g. `LPI`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisCode {
    letters: [char; 3],
    /// Storage axis holding each direction pair
    axis_of_pair: [usize; 3],
}

impl AxisCode {
    /// Parse a three-letter code with exactly one letter from each direction pair.
    pub fn parse(code: &str) -> Result<Self, ViewerError> {
        let invalid = || ViewerError::InvalidAxisCode(code.to_string());

        let letters: Vec<char> = code.trim().chars().map(|c| c.to_ascii_uppercase()).collect();
        if letters.len() != 3 {
            return Err(invalid());
        }

        let mut axis_of_pair = [usize::MAX; 3];
        for (axis, letter) in letters.iter().enumerate() {
            let pair = pair_of(*letter).ok_or_else(invalid)?;
            if axis_of_pair[pair] != usize::MAX {
                return Err(invalid());
            }
            axis_of_pair[pair] = axis;
        }

        Ok(Self {
            letters: [letters[0], letters[1], letters[2]],
            axis_of_pair,
        })
    }

    /// Storage axis carrying the direction of `letter` or its opposite.
    pub fn axis_of(&self, letter: char) -> Option<usize> {
        pair_of(letter).map(|pair| self.axis_of_pair[pair])
    }

    /// Orientation a volume stored in this order is shown in first.
    pub fn initial_orientation(&self) -> Orientation {
        match self.letters {
            ['P', 'I', 'L'] => Orientation::Sagittal,
            ['L', 'I', 'P'] => Orientation::Coronal,
            _ => Orientation::Axial,
        }
    }
}

impl Default for AxisCode {
    fn default() -> Self {
        Self {
            letters: ['L', 'P', 'I'],
            axis_of_pair: [0, 1, 2],
        }
    }
}

impl FromStr for AxisCode {
    type Err = ViewerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AxisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.letters;
        write!(f, "{a}{b}{c}")
    }
}

/// Storage axis index for each slice role. Always a permutation of `{0, 1, 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AxisMapping {
    pub fast: usize,
    pub slow: usize,
    pub slice: usize,
}

impl AxisMapping {
    /// Resolve axis roles for an orientation of a volume stored in `code` order.
    pub fn resolve(orientation: Orientation, code: &AxisCode) -> Self {
        // AxisCode guarantees every direction pair maps to a distinct axis.
        let fast = code.axis_of(orientation.fast_letter()).unwrap_or(0);
        let slow = code.axis_of(orientation.slow_letter()).unwrap_or(1);
        Self {
            fast,
            slow,
            slice: 3 - fast - slow,
        }
    }

    /// Slice width in voxels.
    pub fn fast_dim(&self, dims: &[usize; 3]) -> usize {
        dims[self.fast]
    }

    /// Slice height in voxels.
    pub fn slow_dim(&self, dims: &[usize; 3]) -> usize {
        dims[self.slow]
    }

    /// Number of slices along the slice axis.
    pub fn depth(&self, dims: &[usize; 3]) -> usize {
        dims[self.slice]
    }
}
