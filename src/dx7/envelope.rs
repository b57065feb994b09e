use std::fmt;

use crate::{
    Ranged,
    ParseError,
    ranged_from_byte,
    ranged_from_field,
};
use crate::dx7::Level;
use crate::dx7::json::EnvelopeJson;
use crate::dx7::sysex::SystemExclusiveData;

/// Envelope rate (0...99)
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rate(i32);

crate::ranged_impl!(Rate, 0, 99, 0);

impl Rate {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }
}

pub type Rates = [Rate; 4];
pub type Levels = [Level; 4];

/// Envelope generator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Envelope {
    pub rates: Rates,
    pub levels: Levels,
}

impl Envelope {
    /// Creates a new EG with the DX7 voice defaults.
    pub fn new() -> Self {
        Envelope {
            rates: [Rate::new(99), Rate::new(99), Rate::new(99), Rate::new(99)],
            levels: [Level::new(99), Level::new(99), Level::new(99), Level::new(0)]
        }
    }

    /// Makes a new EG with rates and levels.
    pub fn new_rate_level(rates: Rates, levels: Levels) -> Self {
        Self { rates, levels }
    }

    pub fn new_rate_level_int(rates: [i32; 4], levels: [i32; 4]) -> Self {
        Self {
            rates: rates.map(Rate::new),
            levels: levels.map(Level::new),
        }
    }

    /// Makes a pitch EG at the center (no pitch change).
    pub fn pitch() -> Self {
        Envelope::new_rate_level_int([99, 99, 99, 99], [50, 50, 50, 50])
    }

    /// Makes a new EG with random rates and levels.
    pub fn random() -> Self {
        Self {
            rates: [Rate::random(), Rate::random(), Rate::random(), Rate::random()],
            levels: [Level::random(), Level::random(), Level::random(), Level::random()],
        }
    }

    pub fn to_json(&self) -> EnvelopeJson {
        EnvelopeJson {
            rates: self.rates.map(|r| r.value()),
            levels: self.levels.map(|l| l.value()),
        }
    }

    pub fn from_json(json: &EnvelopeJson) -> Result<Self, ParseError> {
        let mut eg = Envelope::new();
        for i in 0..4 {
            eg.rates[i] = ranged_from_field("eg.rates", json.rates[i])?;
            eg.levels[i] = ranged_from_field("eg.levels", json.levels[i])?;
        }
        Ok(eg)
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Envelope::new()
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "R1={} L1={} R2={} L2={} R3={} L3={} R4={} L4={}",
            self.rates[0].value(), self.levels[0].value(),
            self.rates[1].value(), self.levels[1].value(),
            self.rates[2].value(), self.levels[2].value(),
            self.rates[3].value(), self.levels[3].value())
    }
}

impl SystemExclusiveData for Envelope {
    /// Makes an envelope generator from relevant SysEx message bytes.
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        Ok(Envelope {
            rates: [
                ranged_from_byte(data, 0)?,
                ranged_from_byte(data, 1)?,
                ranged_from_byte(data, 2)?,
                ranged_from_byte(data, 3)?,
            ],
            levels: [
                ranged_from_byte(data, 4)?,
                ranged_from_byte(data, 5)?,
                ranged_from_byte(data, 6)?,
                ranged_from_byte(data, 7)?,
            ],
        })
    }

    /// Gets the SysEx bytes of this EG.
    fn to_bytes(&self) -> Vec<u8> {
        let mut data: Vec<u8> = self.rates.iter().map(|r| r.as_byte()).collect();
        data.extend(self.levels.iter().map(|l| l.as_byte()));
        data
    }

    const DATA_SIZE: usize = 8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eg_to_bytes() {
        let eg = Envelope {
            rates: [Rate::new(64), Rate::new(64), Rate::new(64), Rate::new(64)],
            levels: [Level::new(32), Level::new(32), Level::new(32), Level::new(32)]
        };
        assert_eq!(eg.to_bytes(), vec![64u8, 64, 64, 64, 32, 32, 32, 32]);
    }

    #[test]
    fn test_eg_from_bytes_rejects_out_of_range() {
        let data = [99u8, 99, 120, 99, 99, 99, 99, 0];
        assert_eq!(Envelope::from_bytes(&data), Err(ParseError::InvalidData(2)));
    }

    #[test]
    fn test_from_json_reports_field() {
        let json = EnvelopeJson { rates: [99, 99, 99, 99], levels: [99, 100, 99, 0] };
        assert_eq!(Envelope::from_json(&json), Err(ParseError::OutOfRange("eg.levels", 100)));
    }
}
