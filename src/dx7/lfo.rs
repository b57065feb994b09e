use std::fmt;
use std::convert::TryFrom;
use bit::BitIndex;
use log::warn;
use rand::Rng;

use crate::{
    ParseError,
    Ranged,
    ranged_from_byte,
    ranged_from_field,
};
use crate::dx7::Level;
use crate::dx7::json::LfoJson;
use crate::dx7::sysex::SystemExclusiveData;

/// LFO waveform.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[repr(u8)]
pub enum LfoWaveform {
    #[default]
    Triangle,
    SawDown,
    SawUp,
    Square,
    Sine,
    SampleAndHold,
}

impl LfoWaveform {
    pub const ALL: [LfoWaveform; 6] = [
        LfoWaveform::Triangle,
        LfoWaveform::SawDown,
        LfoWaveform::SawUp,
        LfoWaveform::Square,
        LfoWaveform::Sine,
        LfoWaveform::SampleAndHold,
    ];

    /// Gets the canonical name used in the JSON schema.
    pub fn name(&self) -> &'static str {
        match self {
            LfoWaveform::Triangle => "TRIANGLE",
            LfoWaveform::SawDown => "SAW DOWN",
            LfoWaveform::SawUp => "SAW UP",
            LfoWaveform::Square => "SQUARE",
            LfoWaveform::Sine => "SINE",
            LfoWaveform::SampleAndHold => "SAMPLE & HOLD",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|w| w.name() == name)
    }
}

impl TryFrom<u8> for LfoWaveform {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied()
            .ok_or(ParseError::OutOfRange("lfo.wave", value as i32))
    }
}

impl fmt::Display for LfoWaveform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// LFO.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Lfo {
    pub speed: Level,  // 0 ~ 99
    pub delay: Level,  // 0 ~ 99
    pub pmd: Level,    // 0 ~ 99
    pub amd: Level,    // 0 ~ 99
    pub sync: bool,
    pub waveform: LfoWaveform,
}

impl Lfo {
    /// Makes a new LFO initialized with the DX7 voice defaults.
    pub fn new() -> Self {
        Self {
            speed: Level::new(35),
            delay: Level::new(0),
            pmd: Level::new(0),
            amd: Level::new(0),
            sync: true,
            waveform: LfoWaveform::Triangle,
        }
    }

    /// Makes a new LFO with random settings.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        Self {
            speed: Level::random(),
            delay: Level::random(),
            pmd: Level::random(),
            amd: Level::random(),
            sync: rng.random_bool(0.5),
            waveform: LfoWaveform::ALL[rng.random_range(0..LfoWaveform::ALL.len())],
        }
    }

    /// Unpacks LFO data from a cartridge.
    /// Returns the data in the same format as for a single voice.
    pub fn unpack(data: &[u8]) -> Vec<u8> {
        vec![
            data[0],  // LFO speed
            data[1],  // LFO delay
            data[2],  // LFO PMD
            data[3],  // LFO AMD
            if data[4].bit(0) { 1 } else { 0 },  // LFO sync
            data[4].bit_range(1..4), // LFO waveform
        ]
    }

    pub fn to_json(&self) -> LfoJson {
        LfoJson {
            speed: self.speed.value(),
            delay: self.delay.value(),
            pm_depth: self.pmd.value(),
            am_depth: self.amd.value(),
            key_sync: self.sync,
            wave: self.waveform.name().to_string(),
        }
    }

    pub fn from_json(json: &LfoJson) -> Result<Self, ParseError> {
        Ok(Lfo {
            speed: ranged_from_field("lfo.speed", json.speed)?,
            delay: ranged_from_field("lfo.delay", json.delay)?,
            pmd: ranged_from_field("lfo.pmDepth", json.pm_depth)?,
            amd: ranged_from_field("lfo.amDepth", json.am_depth)?,
            sync: json.key_sync,
            waveform: LfoWaveform::from_name(&json.wave)
                .ok_or(ParseError::UnknownName("lfo.wave"))?,
        })
    }
}

impl Default for Lfo {
    fn default() -> Self {
        Lfo::new()
    }
}

impl fmt::Display for Lfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "speed = {}, delay = {}, PMD = {}, AMD = {}, sync = {}, waveform = {}",
            self.speed.value(),
            self.delay.value(),
            self.pmd.value(),
            self.amd.value(),
            self.sync,
            self.waveform)
    }
}

impl SystemExclusiveData for Lfo {
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        Ok(Lfo {
            speed: ranged_from_byte(data, 0)?,
            delay: ranged_from_byte(data, 1)?,
            pmd: ranged_from_byte(data, 2)?,
            amd: ranged_from_byte(data, 3)?,
            sync: data[4] == 1,
            waveform: LfoWaveform::try_from(data[5]).unwrap_or_else(|_| {
                warn!("LFO waveform out of range: {}, setting to TRI", data[5]);
                LfoWaveform::Triangle
            }),
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        vec![
            self.speed.as_byte(),
            self.delay.as_byte(),
            self.pmd.as_byte(),
            self.amd.as_byte(),
            if self.sync { 1 } else { 0 },
            self.waveform as u8,
        ]
    }

    const DATA_SIZE: usize = 6;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_names() {
        assert_eq!(LfoWaveform::SampleAndHold.name(), "SAMPLE & HOLD");
        assert_eq!(LfoWaveform::from_name("SAW DOWN"), Some(LfoWaveform::SawDown));
        assert_eq!(LfoWaveform::from_name("saw down"), None);
    }

    #[test]
    fn test_unpack() {
        // speed 37, delay 0, PMD 5, AMD 0, sync off, sine, PMS 3
        let packed = [37u8, 0, 5, 0, 0x38];
        assert_eq!(Lfo::unpack(&packed), vec![37u8, 0, 5, 0, 0, 4]);
    }

    #[test]
    fn test_bad_waveform_falls_back_to_triangle() {
        let data = [35u8, 0, 0, 0, 1, 9];
        let lfo = Lfo::from_bytes(&data).unwrap();
        assert_eq!(lfo.waveform, LfoWaveform::Triangle);
    }

    #[test]
    fn test_from_json_rejects_unknown_wave() {
        let mut json = Lfo::new().to_json();
        json.wave = "NOISE".to_string();
        assert!(Lfo::from_json(&json).is_err());
    }
}
