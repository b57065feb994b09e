//! Yamaha DX7 voice data: typed parameters, the VCED/VMEM System Exclusive
//! layouts, and the canonical JSON voice schema.

use std::convert::{
    From,
    TryFrom
};

use crate::{
    Ranged,
    ParseError
};

pub mod voice;
pub mod cartridge;
pub mod operator;
pub mod lfo;
pub mod envelope;
pub mod sysex;
pub mod json;

/// Number of operators in a voice.
pub const OPERATOR_COUNT: usize = 6;

/// Number of voices in a cartridge.
pub const VOICE_COUNT: usize = 32;

/// Maximum length of a voice name.
pub const NAME_LENGTH: usize = 10;

/// Algorithm (1...32)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Algorithm(i32);

crate::ranged_impl!(Algorithm, 1, 32, 1);

impl Algorithm {
    pub fn as_byte(&self) -> u8 {
        (self.0 - 1) as u8  // adjust to 0...31 for SysEx
    }
}

impl TryFrom<u8> for Algorithm {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let v = value as i32 + 1; // make into 1...32
        Algorithm::try_new(v).ok_or(ParseError::OutOfRange("algorithm", v))
    }
}

/// Detune (-7...+7), represented in SysEx as 0...14.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Detune(i32);

crate::ranged_impl!(Detune, -7, 7, 0);

impl Detune {
    pub fn as_byte(&self) -> u8 {
        (self.0 + 7) as u8  // adjust for SysEx
    }
}

impl TryFrom<u8> for Detune {
    type Error = ParseError;

    fn try_from(item: u8) -> Result<Self, Self::Error> {
        let v = item as i32 - 7;
        Detune::try_new(v).ok_or(ParseError::OutOfRange("detune", v))
    }
}

/// Coarse (0...31).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Coarse(i32);

crate::ranged_impl!(Coarse, 0, 31, 1);

impl Coarse {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

/// Depth (0...7) for keyboard rate scaling,
/// key velocity sensitivity, feedback,
/// pitch mod sensitivity and EG bias sensitivity.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Depth(i32);

crate::ranged_impl!(Depth, 0, 7, 0);

impl Depth {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

/// Key transpose in semitones (-24...24).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Transpose(i32);

crate::ranged_impl!(Transpose, -24, 24, 0);

impl Transpose {
    /// Converts to the SysEx range 0...48, where 24 is no transpose (C3).
    pub fn as_byte(&self) -> u8 {
        (self.0 + 24) as u8
    }
}

impl TryFrom<u8> for Transpose {
    type Error = ParseError;

    /// Makes a key transpose from a System Exclusive data byte.
    fn try_from(item: u8) -> Result<Self, Self::Error> {
        // SysEx value is 0...48, corresponding to four octaves
        // with 12 semitones each.
        let semitones = item as i32 - 24;
        Transpose::try_new(semitones).ok_or(ParseError::OutOfRange("transpose", semitones))
    }
}

/// Amplitude modulation sensitivity (0...3)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Sensitivity(i32);

crate::ranged_impl!(Sensitivity, 0, 3, 0);

impl Sensitivity {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

/// Envelope level (or operator output level) (0...99)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Level(i32);

crate::ranged_impl!(Level, 0, 99, 0);

impl Level {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

/// MIDI channel (1...16).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct MidiChannel(i32);

crate::ranged_impl!(MidiChannel, 1, 16, 1);

impl MidiChannel {
    /// Gets the channel as it appears in the low nybble of a status byte.
    pub fn as_byte(&self) -> u8 {
        (self.0 - 1) as u8
    }
}

// Finds the first offset where the two slices differ.
// Returns None if no differences are found, or if the slices
// are different lengths, Some<usize> with the offset otherwise.
#[cfg(test)]
pub(crate) fn first_different_offset(v1: &[u8], v2: &[u8]) -> Option<usize> {
    if v1.len() != v2.len() {
        return None;
    }

    v1.iter().zip(v2.iter()).position(|(a, b)| a != b)
}
