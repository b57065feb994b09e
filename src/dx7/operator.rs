use std::fmt;
use std::convert::TryFrom;
use bit::BitIndex;
use log::debug;

use crate::{
    ParseError,
    Ranged,
    ranged_from_byte,
    ranged_from_field,
};

use crate::dx7::{
    Depth,
    Level,
    Detune,
    Sensitivity,
    Coarse,
};

use crate::dx7::envelope::Envelope;
use crate::dx7::json::{
    OperatorJson,
    OscillatorJson,
    FrequencyJson,
    KeyJson,
    OutputJson,
    ScaleJson,
    ScalingSideJson,
};
use crate::dx7::sysex::SystemExclusiveData;

/// Scaling curve style.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CurveStyle {
    Linear,
    Exponential
}

impl fmt::Display for CurveStyle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CurveStyle::Linear => write!(f, "LIN"),
            CurveStyle::Exponential => write!(f, "EXP"),
        }
    }
}

/// Scaling curve sign.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CurveSign {
    Negative,
    Positive,
}

impl fmt::Display for CurveSign {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", if *self == CurveSign::Positive { "+" } else { "-" })
    }
}

/// Scaling curve settings.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ScalingCurve {
    pub style: CurveStyle,
    pub sign: CurveSign,
}

impl ScalingCurve {
    /// Makes a linear positive scaling curve.
    pub fn lin_pos() -> Self {
        ScalingCurve { style: CurveStyle::Linear, sign: CurveSign::Positive }
    }

    /// Makes a linear negative scaling curve.
    pub fn lin_neg() -> Self {
        ScalingCurve { style: CurveStyle::Linear, sign: CurveSign::Negative }
    }

    /// Makes an exponential positive scaling curve.
    pub fn exp_pos() -> Self {
        ScalingCurve { style: CurveStyle::Exponential, sign: CurveSign::Positive }
    }

    /// Makes an exponential negative scaling curve.
    pub fn exp_neg() -> Self {
        ScalingCurve { style: CurveStyle::Exponential, sign: CurveSign::Negative }
    }

    /// Gets the SysEx byte for this scaling curve.
    pub fn as_byte(&self) -> u8 {
        match self {
            ScalingCurve { style: CurveStyle::Linear, sign: CurveSign::Negative } => 0,
            ScalingCurve { style: CurveStyle::Exponential, sign: CurveSign::Negative } => 1,
            ScalingCurve { style: CurveStyle::Exponential, sign: CurveSign::Positive } => 2,
            ScalingCurve { style: CurveStyle::Linear, sign: CurveSign::Positive } => 3,
        }
    }

    /// Parses the canonical curve name (`-LIN`, `-EXP`, `+EXP`, `+LIN`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "-LIN" => Some(ScalingCurve::lin_neg()),
            "-EXP" => Some(ScalingCurve::exp_neg()),
            "+EXP" => Some(ScalingCurve::exp_pos()),
            "+LIN" => Some(ScalingCurve::lin_pos()),
            _ => None,
        }
    }
}

impl Default for ScalingCurve {
    fn default() -> Self {
        ScalingCurve::lin_neg()
    }
}

impl fmt::Display for ScalingCurve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.sign, self.style)
    }
}

impl TryFrom<u8> for ScalingCurve {
    type Error = ParseError;

    fn try_from(item: u8) -> Result<Self, Self::Error> {
        match item {
            0 => Ok(ScalingCurve::lin_neg()),
            1 => Ok(ScalingCurve::exp_neg()),
            2 => Ok(ScalingCurve::exp_pos()),
            3 => Ok(ScalingCurve::lin_pos()),
            _ => Err(ParseError::OutOfRange("scale.curve", item as i32)),
        }
    }
}

const NOTE_NAMES: [&str; 12] = [ "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B" ];

/// Names a key given as semitones from A-1, like `C3` for 39.
/// Works for any offset, also outside the range of `Key`.
pub fn note_name(offset: i32) -> String {
    let note = offset + 21;
    let octave = note.div_euclid(12) - 2;
    format!("{}{}", NOTE_NAMES[note.rem_euclid(12) as usize], octave)
}

/// Key used as the keyboard level scaling break point,
/// counted in semitones from A-1 (0 = A-1, 39 = C3, 99 = C8).
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Key(i32);

crate::ranged_impl!(Key, 0, 99, 39, custom_display);

impl Key {
    pub fn as_byte(&self) -> u8 {
        self.0 as u8
    }

    pub fn name(&self) -> String {
        note_name(self.0)
    }

    /// Parses a note name like `C3`, `F#2`, `Bb4` or `A-1`.
    /// Returns `None` for malformed names and for keys outside A-1...C8.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let mut chars = name.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let mut pitch_class: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let rest = &name[letter.len_utf8()..];
        let octave_part = if let Some(stripped) = rest.strip_prefix('#') {
            pitch_class += 1;
            stripped
        }
        else if let Some(stripped) = rest.strip_prefix('b') {
            pitch_class -= 1;
            stripped
        }
        else {
            rest
        };

        let octave: i32 = octave_part.parse().ok()?;
        let note_number = (octave + 2) * 12 + pitch_class;
        Key::try_new(note_number - 21)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Scaling {
    pub depth: Level,
    pub curve: ScalingCurve,
}

impl Scaling {
    fn to_json(&self) -> ScalingSideJson {
        ScalingSideJson {
            depth: self.depth.value(),
            curve: self.curve.to_string(),
        }
    }

    fn from_json(json: &ScalingSideJson) -> Result<Self, ParseError> {
        Ok(Scaling {
            depth: ranged_from_field("scale.depth", json.depth)?,
            curve: ScalingCurve::from_name(&json.curve)
                .ok_or(ParseError::UnknownName("scale.curve"))?,
        })
    }
}

/// Keyboard level scaling.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct KeyboardLevelScaling {
    pub breakpoint: Key, // 0 ~ 99 (A-1 ~ C8)
    pub left: Scaling,
    pub right: Scaling,
}

impl KeyboardLevelScaling {
    /// Creates new keyboard level scaling settings with DX7 voice defaults.
    pub fn new() -> Self {
        Self {
            breakpoint: Key::default(),  // Yamaha C3 is 60 - 21 = 39
            left: Scaling { depth: Level::new(0), curve: ScalingCurve::lin_neg() },
            right: Scaling { depth: Level::new(0), curve: ScalingCurve::lin_neg() },
        }
    }
}

impl Default for KeyboardLevelScaling {
    fn default() -> Self {
        KeyboardLevelScaling::new()
    }
}

impl fmt::Display for KeyboardLevelScaling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "breakpoint = {}, left depth = {}, right depth = {}, left curve = {}, right curve = {}",
            self.breakpoint, self.left.depth, self.right.depth, self.left.curve, self.right.curve)
    }
}

impl SystemExclusiveData for KeyboardLevelScaling {
    /// Makes new keyboard level scaling settings from SysEx bytes.
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        Ok(Self {
            breakpoint: ranged_from_byte(data, 0)?,
            left: Scaling {
                depth: ranged_from_byte(data, 1)?,
                curve: ScalingCurve::try_from(data[3]).map_err(|_| ParseError::InvalidData(3))?,
            },
            right: Scaling {
                depth: ranged_from_byte(data, 2)?,
                curve: ScalingCurve::try_from(data[4]).map_err(|_| ParseError::InvalidData(4))?,
            },
        })
    }

    /// Gets the SysEx bytes representing this set of parameters.
    fn to_bytes(&self) -> Vec<u8> {
        vec![
            self.breakpoint.as_byte(),
            self.left.depth.as_byte(),
            self.right.depth.as_byte(),
            self.left.curve.as_byte(),
            self.right.curve.as_byte(),
        ]
    }

    const DATA_SIZE: usize = 5;
}

/// Operator mode.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum OperatorMode {
    #[default]
    Ratio,
    Fixed,
}

impl OperatorMode {
    pub fn name(&self) -> &'static str {
        match self {
            OperatorMode::Ratio => "RATIO",
            OperatorMode::Fixed => "FIXED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "RATIO" => Some(OperatorMode::Ratio),
            "FIXED" => Some(OperatorMode::Fixed),
            _ => None,
        }
    }
}

/// Operator.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Operator {
    pub eg: Envelope,
    pub kbd_level_scaling: KeyboardLevelScaling,
    pub kbd_rate_scaling: Depth, // 0 ~ 7
    pub amp_mod_sens: Sensitivity,  // 0 ~ 3
    pub key_vel_sens: Depth,  // 0 ~ 7
    pub output_level: Level,
    pub mode: OperatorMode,
    pub coarse: Coarse,  // 0 ~ 31
    pub fine: Level,  // 0 ~ 99
    pub detune: Detune,   // -7 ~ 7
}

impl Operator {
    /// Creates a new operator and initializes it with the DX7 voice defaults.
    pub fn new() -> Self {
        Self {
            eg: Envelope::new(),
            kbd_level_scaling: KeyboardLevelScaling::new(),
            kbd_rate_scaling: Depth::new(0),
            amp_mod_sens: Sensitivity::new(0),
            key_vel_sens: Depth::new(0),
            output_level: Level::new(0),
            mode: OperatorMode::Ratio,
            coarse: Coarse::new(1),
            fine: Level::new(0),
            detune: Detune::new(0),
        }
    }

    /// Makes a new random operator.
    pub fn random() -> Self {
        Operator {
            eg: Envelope::random(),
            kbd_level_scaling: KeyboardLevelScaling {
                breakpoint: Key::random(),
                left: Scaling { depth: Level::random(), curve: ScalingCurve::lin_neg() },
                right: Scaling { depth: Level::random(), curve: ScalingCurve::exp_neg() },
            },
            kbd_rate_scaling: Depth::random(),
            amp_mod_sens: Sensitivity::random(),
            key_vel_sens: Depth::random(),
            output_level: Level::random(),
            mode: OperatorMode::Ratio,
            coarse: Coarse::random(),
            fine: Level::random(),
            detune: Detune::random(),
        }
    }

    /// Unpacks operator data from a cartridge.
    /// Returns the data in the same format as for a single voice.
    pub fn unpack(data: &[u8]) -> Vec<u8> {
        let mut result: Vec<u8> = Vec::new();

        // EG data is unpacked
        result.extend(&data[0..8]);

        // KLS
        result.push(data[8]);  // BP
        result.push(data[9]);  // LD
        result.push(data[10]); // RD

        result.push(data[11].bit_range(0..2));  // LC
        result.push(data[11].bit_range(2..4));  // RC

        result.push(data[12].bit_range(0..3));  // RS
        result.push(data[13].bit_range(0..2));  // AMS
        result.push(data[13].bit_range(2..5));  // KVS

        result.push(data[14]);  // output level
        result.push(if data[15].bit(0) { 1 } else { 0 });  // osc mode
        result.push(data[15].bit_range(1..6)); // coarse
        result.push(data[16]); // fine
        result.push(data[12].bit_range(3..7)); // detune

        result
    }

    /// Packs the operator bytes for use in a voice inside a cartridge.
    pub fn pack(data: &[u8]) -> Vec<u8> {
        let mut result: Vec<u8> = Vec::new();

        // Copy the EG bytes as is.
        result.extend(&data[0 .. 8]);

        // KLS breakpoint, left and right depths:
        result.push(data[8]);
        result.push(data[9]);
        result.push(data[10]);

        result.push(data[11] | (data[12] << 2));  // LC + RC
        result.push(data[13] | (data[20] << 3));  // RS + detune
        result.push(data[14] | (data[15] << 2));  // AMS + KVS
        result.push(data[16]);  // output level
        result.push(data[17] | (data[18] << 1));  // mode + coarse
        result.push(data[19]);  // fine

        result
    }

    /// Converts to the operator part of the JSON schema.
    /// `id` is the operator number 1...6.
    pub fn to_json(&self, id: i32) -> OperatorJson {
        OperatorJson {
            id,
            osc: OscillatorJson {
                detune: self.detune.value(),
                freq: FrequencyJson {
                    coarse: self.coarse.value(),
                    fine: self.fine.value(),
                    mode: self.mode.name().to_string(),
                },
            },
            eg: self.eg.to_json(),
            key: KeyJson {
                velocity: self.key_vel_sens.value(),
                scaling: self.kbd_rate_scaling.value(),
                break_point: self.kbd_level_scaling.breakpoint.name(),
            },
            output: OutputJson {
                level: self.output_level.value(),
                amp_mod_sens: self.amp_mod_sens.value(),
            },
            scale: ScaleJson {
                left: self.kbd_level_scaling.left.to_json(),
                right: self.kbd_level_scaling.right.to_json(),
            },
        }
    }

    pub fn from_json(json: &OperatorJson) -> Result<Self, ParseError> {
        Ok(Operator {
            eg: Envelope::from_json(&json.eg)?,
            kbd_level_scaling: KeyboardLevelScaling {
                breakpoint: Key::from_name(&json.key.break_point)
                    .ok_or(ParseError::UnknownName("key.breakPoint"))?,
                left: Scaling::from_json(&json.scale.left)?,
                right: Scaling::from_json(&json.scale.right)?,
            },
            kbd_rate_scaling: ranged_from_field("key.scaling", json.key.scaling)?,
            amp_mod_sens: ranged_from_field("output.ampModSens", json.output.amp_mod_sens)?,
            key_vel_sens: ranged_from_field("key.velocity", json.key.velocity)?,
            output_level: ranged_from_field("output.level", json.output.level)?,
            mode: OperatorMode::from_name(&json.osc.freq.mode)
                .ok_or(ParseError::UnknownName("osc.freq.mode"))?,
            coarse: ranged_from_field("osc.freq.coarse", json.osc.freq.coarse)?,
            fine: ranged_from_field("osc.freq.fine", json.osc.freq.fine)?,
            detune: ranged_from_field("osc.detune", json.osc.detune)?,
        })
    }
}

impl Default for Operator {
    fn default() -> Self {
        Operator::new()
    }
}

impl SystemExclusiveData for Operator {
    /// Makes a new operator from SysEx bytes.
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        let eg = Envelope::from_bytes(&data[0..8])?;
        let kbd_level_scaling = KeyboardLevelScaling::from_bytes(&data[8..13])
            .map_err(|e| match e {
                ParseError::InvalidData(offset) => ParseError::InvalidData(offset + 8),
                other => other,
            })?;
        debug!("EG = {}, KLS = {}", eg, kbd_level_scaling);

        let detune = Detune::try_from(data[20]).map_err(|_| ParseError::InvalidData(20))?;

        Ok(Self {
            eg,
            kbd_level_scaling,
            kbd_rate_scaling: ranged_from_byte(data, 13)?,
            amp_mod_sens: ranged_from_byte(data, 14)?,
            key_vel_sens: ranged_from_byte(data, 15)?,
            output_level: ranged_from_byte(data, 16)?,
            mode: if data[17] == 0b1 { OperatorMode::Fixed } else { OperatorMode::Ratio },
            coarse: ranged_from_byte(data, 18)?,
            fine: ranged_from_byte(data, 19)?,
            detune,
        })
    }

    /// Gets the SysEx bytes representing the operator.
    fn to_bytes(&self) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::new();
        data.extend(self.eg.to_bytes());
        data.extend(self.kbd_level_scaling.to_bytes());
        data.push(self.kbd_rate_scaling.as_byte());
        data.push(self.amp_mod_sens.as_byte());
        data.push(self.key_vel_sens.as_byte());
        data.push(self.output_level.as_byte());
        data.push(self.mode as u8);
        data.push(self.coarse.as_byte());
        data.push(self.fine.as_byte());
        data.push(self.detune.as_byte()); // 0 = detune -7, 7 = 0, 14 = +7
        data
    }

    const DATA_SIZE: usize = 21;
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "EG: {}
Kbd level scaling: {}, Kbd rate scaling: {}
Amp mod sens = {}, Key vel sens = {}
Level = {}, Mode = {}
Coarse = {}, Fine = {}, Detune = {}
",
            self.eg,
            self.kbd_level_scaling,
            self.kbd_rate_scaling.value(),
            self.amp_mod_sens,
            self.key_vel_sens.value(),
            self.output_level.value(),
            self.mode.name(),
            self.coarse.value(),
            self.fine.value(),
            self.detune.value())
    }
}
