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
    Algorithm,
    Coarse,
    Depth,
    Detune,
    Transpose,
    Level,
    MidiChannel,
    Sensitivity,
    OPERATOR_COUNT,
    NAME_LENGTH,
};

use crate::dx7::sysex::{self, SystemExclusiveData, Header, Format};
use crate::dx7::operator::{
    Operator,
    Key,
    KeyboardLevelScaling,
    Scaling,
    ScalingCurve,
};
use crate::dx7::lfo::{Lfo, LfoWaveform};
use crate::dx7::envelope::{Envelope, Rate};
use crate::dx7::json::{VoiceJson, GlobalJson};

/// Size of one voice inside a cartridge.
pub const PACKED_SIZE: usize = 128;

/// A DX7 voice.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Voice {
    pub operators: [Operator; OPERATOR_COUNT],  // OP1 first
    pub peg: Envelope,  // pitch env
    pub alg: Algorithm,  // 1...32
    pub feedback: Depth,
    pub osc_sync: bool,
    pub lfo: Lfo,
    pub pitch_mod_sens: Depth,  // pitch mode sensitivity 0 ~7 (for all operators)
    pub transpose: Transpose,  // semitones (-24...+24), 0 = C3
    pub name: String,

    // Voice-level modulation settings kept by the editor.
    // They have no place in the single voice dump and are not transmitted.
    pub amp_mod_sens: Sensitivity,
    pub eg_bias_sens: Depth,
}

impl Voice {
    /// Creates a new voice and initializes it with the DX7 voice defaults.
    /// The defaults are as described in Howard Massey's "The Complete DX7",
    /// Appendix B: only OP1 is audible.
    pub fn new() -> Self {
        let init_op1 = Operator {
            output_level: Level::new(99),
            ..Operator::new()
        };

        // Operators 2...6 are identical to operator 1 except they
        // have their output level set to zero.
        let init_op_rest = Operator::new();

        Self {
            operators: [
                init_op1,
                init_op_rest,
                init_op_rest,
                init_op_rest,
                init_op_rest,
                init_op_rest,
            ],
            peg: Envelope::pitch(),
            alg: Algorithm::new(1),
            feedback: Depth::new(0),
            osc_sync: true,
            lfo: Lfo::new(),
            pitch_mod_sens: Depth::new(3),
            transpose: Transpose::new(0),
            name: "INIT VOICE".to_string(),
            amp_mod_sens: Sensitivity::new(0),
            eg_bias_sens: Depth::new(0),
        }
    }

    /// Makes the initial voice for a cartridge slot (0...31).
    pub fn init(slot: usize) -> Self {
        Voice {
            name: default_voice_name(slot),
            ..Voice::new()
        }
    }

    /// Makes a new random voice. The name is left as in the init voice.
    pub fn random() -> Self {
        Voice {
            operators: [
                Operator::random(),
                Operator::random(),
                Operator::random(),
                Operator::random(),
                Operator::random(),
                Operator::random(),
            ],
            peg: Envelope::random(),
            alg: Algorithm::random(),
            feedback: Depth::random(),
            osc_sync: rand::random(),
            lfo: Lfo::random(),
            pitch_mod_sens: Depth::random(),
            transpose: Transpose::new(0),
            ..Voice::new()
        }
    }

    /// Pack the voice data to use in a cartridge.
    pub fn pack(data: &[u8]) -> Vec<u8> {
        let mut result: Vec<u8> = Vec::new();

        let mut offset = 0;

        // The operator data is already in reverse order (OP6 first),
        // so just take each chunk and pack it.
        for _ in 0..OPERATOR_COUNT {
            let op_data = &data[offset .. offset + Operator::DATA_SIZE];
            result.extend(Operator::pack(op_data));
            offset += Operator::DATA_SIZE;
        }

        // Copy the pitch EG as is.
        result.extend(&data[offset .. offset + 8]);
        offset += 8;

        result.push(data[offset]);  // algorithm
        offset += 1;

        let byte111 = data[offset] // feedback
            | (data[offset + 1] << 3);  // osc sync
        result.push(byte111);
        offset += 2;

        // LFO speed, delay, PMD, AMD
        result.extend(&data[offset .. offset + 4]);
        offset += 4;

        let mut byte116: u8 = data[offset];  // LFO sync
        byte116.set_bit_range(1..4, data[offset + 1]);  // LFO waveform
        byte116.set_bit_range(4..7, data[offset + 2]);  // pitch mod sens (voice)
        result.push(byte116);
        offset += 3;

        result.push(data[offset]);  // transpose
        offset += 1;

        // voice name
        result.extend(&data[offset .. offset + NAME_LENGTH]);

        result
    }

    /// Unpack voice data from a cartridge.
    /// Returns a vector to use for normal parsing.
    pub fn unpack(data: &[u8]) -> Vec<u8> {
        let mut result: Vec<u8> = Vec::new();

        let size = 17;  // packed operator data length
        let mut offset = 0;
        for _ in 0..OPERATOR_COUNT {  // OP6 first, like the unpacked data
            result.extend(Operator::unpack(&data[offset .. offset + size]));
            offset += size;
        }

        result.extend(&data[offset .. offset + 8]);  // PEG = 4xrate + 4xlevel
        offset += 8;

        result.push(data[offset].bit_range(0..5));  // algorithm
        offset += 1;

        result.push(data[offset].bit_range(0..3)); // feedback
        result.push(if data[offset].bit(3) { 1 } else { 0 }); // osc sync
        offset += 1;

        result.extend(Lfo::unpack(&data[offset .. offset + 5]));
        offset += 4;  // the last LFO byte also holds the pitch mod sens
        result.push(data[offset].bit_range(4..7));  // pitch mod sens
        offset += 1;

        result.push(data[offset]); // transpose
        offset += 1;

        // Voice name (last 10 characters)
        result.extend(&data[offset .. offset + NAME_LENGTH]);

        result
    }

    /// Makes a voice from the packed 128-byte cartridge format.
    pub fn from_packed_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < PACKED_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, PACKED_SIZE as u32));
        }
        Voice::from_bytes(&Voice::unpack(&data[..PACKED_SIZE]))
    }

    pub fn to_packed_bytes(&self) -> Vec<u8> {
        Voice::pack(&self.to_bytes())
    }

    /// Makes a single voice bulk dump message.
    pub fn to_message(&self, channel: MidiChannel) -> Vec<u8> {
        let header = Header::new(channel, Format::Voice);
        sysex::message(&header, &self.to_bytes())
    }

    /// Parses a single voice bulk dump message.
    pub fn from_message(data: &[u8]) -> Result<Self, ParseError> {
        let (header, payload) = sysex::parse_message(data)?;
        match header.format {
            Format::Voice => Voice::from_bytes(payload),
            Format::Cartridge => Err(ParseError::Unidentified),
        }
    }

    pub fn to_json(&self) -> VoiceJson {
        VoiceJson {
            name: self.name.clone(),
            operators: self.operators.iter()
                .enumerate()
                .map(|(index, op)| op.to_json(index as i32 + 1))
                .collect(),
            pitch_eg: self.peg.to_json(),
            lfo: self.lfo.to_json(),
            global: GlobalJson {
                algorithm: self.alg.value(),
                feedback: self.feedback.value(),
                osc_key_sync: self.osc_sync,
                pitch_mod_sens: self.pitch_mod_sens.value(),
                transpose: self.transpose.value(),
                amp_mod_sens: self.amp_mod_sens.value(),
                eg_bias_sens: self.eg_bias_sens.value(),
            },
        }
    }

    /// Makes a voice from the JSON schema. Every value must be in range.
    pub fn from_json(json: &VoiceJson) -> Result<Self, ParseError> {
        if json.operators.len() != OPERATOR_COUNT {
            return Err(ParseError::InvalidLength(json.operators.len() as u32, OPERATOR_COUNT as u32));
        }

        let mut operators = [Operator::new(); OPERATOR_COUNT];
        for (index, op) in json.operators.iter().enumerate() {
            operators[index] = Operator::from_json(op)?;
        }

        Ok(Voice {
            operators,
            peg: Envelope::from_json(&json.pitch_eg)?,
            alg: ranged_from_field("global.algorithm", json.global.algorithm)?,
            feedback: ranged_from_field("global.feedback", json.global.feedback)?,
            osc_sync: json.global.osc_key_sync,
            lfo: Lfo::from_json(&json.lfo)?,
            pitch_mod_sens: ranged_from_field("global.pitchModSens", json.global.pitch_mod_sens)?,
            transpose: ranged_from_field("global.transpose", json.global.transpose)?,
            name: normalize_name(&json.name),
            amp_mod_sens: ranged_from_field("global.ampModSens", json.global.amp_mod_sens)?,
            eg_bias_sens: ranged_from_field("global.egBiasSens", json.global.eg_bias_sens)?,
        })
    }
}

impl Default for Voice {
    fn default() -> Voice {
        Voice::new()
    }
}

/// Gets the default name for a voice slot (0...31), like "Voice 1".
pub fn default_voice_name(slot: usize) -> String {
    format!("Voice {}", slot + 1)
}

/// Limits a voice name to what fits in the voice data.
pub fn normalize_name(name: &str) -> String {
    name.chars().take(NAME_LENGTH).collect()
}

fn name_to_bytes(name: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = name.chars()
        .take(NAME_LENGTH)
        .map(|c| if (' '..='~').contains(&c) { c as u8 } else { b' ' })
        .collect();
    bytes.resize(NAME_LENGTH, b' ');
    bytes
}

fn name_from_bytes(data: &[u8]) -> String {
    let name: String = data.iter()
        .map(|b| if (0x20..=0x7e).contains(b) { *b as char } else { ' ' })
        .collect();
    name.trim_end().to_string()
}

// Makes an error offset in a sub-structure relative to the whole voice.
fn at_offset(error: ParseError, base: usize) -> ParseError {
    match error {
        ParseError::InvalidData(offset) => ParseError::InvalidData(offset + base as u32),
        other => other,
    }
}

impl SystemExclusiveData for Voice {
    fn from_bytes(data: &[u8]) -> Result<Voice, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        // Note that the operator data is in reverse order:
        // OP6 is first, OP1 is last.
        let mut operators = [Operator::new(); OPERATOR_COUNT];
        for i in 0..OPERATOR_COUNT {
            let start = i * Operator::DATA_SIZE;
            operators[OPERATOR_COUNT - 1 - i] = Operator::from_bytes(&data[start .. start + Operator::DATA_SIZE])
                .map_err(|e| at_offset(e, start))?;
        }

        let peg = Envelope::from_bytes(&data[126..134])
            .map_err(|e| at_offset(e, 126))?;
        let alg = Algorithm::try_from(data[134])
            .map_err(|_| ParseError::InvalidData(134))?;
        let transpose = Transpose::try_from(data[144])
            .map_err(|_| ParseError::InvalidData(144))?;
        let name = name_from_bytes(&data[145..155]);
        debug!("Parsed voice '{}'", name);

        Ok(Voice {
            operators,
            peg,
            alg,
            feedback: ranged_from_byte(data, 135)?,
            osc_sync: data[136] == 1,
            lfo: Lfo::from_bytes(&data[137..143])
                .map_err(|e| at_offset(e, 137))?,
            pitch_mod_sens: ranged_from_byte(data, 143)?,
            transpose,
            name,
            amp_mod_sens: Sensitivity::default(),
            eg_bias_sens: Depth::default(),
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::new();

        for i in (0..OPERATOR_COUNT).rev() {  // NOTE: reverse order!
            data.extend(self.operators[i].to_bytes());
        }

        data.extend(self.peg.to_bytes());

        data.push(self.alg.as_byte());
        data.push(self.feedback.as_byte());
        data.push(if self.osc_sync { 1 } else { 0 });
        data.extend(self.lfo.to_bytes());
        data.push(self.pitch_mod_sens.as_byte());
        data.push(self.transpose.as_byte());
        data.extend(name_to_bytes(&self.name));

        data
    }

    const DATA_SIZE: usize = 155;
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "==========
{}
==========
OP1: {}
OP2: {}
OP3: {}
OP4: {}
OP5: {}
OP6: {}
PEG: {}
ALG: {}, feedback = {}, osc sync = {}
LFO: {}, PMS = {}
Transpose: {}
",
            self.name,
            self.operators[0],
            self.operators[1],
            self.operators[2],
            self.operators[3],
            self.operators[4],
            self.operators[5],
            self.peg,
            self.alg.value(),
            self.feedback.value(),
            self.osc_sync,
            self.lfo,
            self.pitch_mod_sens.value(),
            self.transpose.value())
    }
}

/// Makes a new voice based on the "BRASS 1" settings in the DX7 manual.
pub fn make_brass1() -> Voice {
    let kbd_level_scaling = KeyboardLevelScaling {
        breakpoint: Key::new(60 - 21),
        left: Scaling { depth: Level::new(0), curve: ScalingCurve::lin_neg() },
        right: Scaling { depth: Level::new(0), curve: ScalingCurve::lin_neg() },
    };

    // Make one operator and then specify the differences to the others.
    let op = Operator {
        key_vel_sens: Depth::new(2),
        ..Operator::new()
    };

    let op6 = Operator {
        eg: Envelope::new_rate_level(
            [Rate::new(49), Rate::new(99), Rate::new(28), Rate::new(68)],
            [Level::new(98), Level::new(98), Level::new(91), Level::new(0)]),
        kbd_level_scaling: KeyboardLevelScaling {
            left: Scaling { depth: Level::new(54), curve: ScalingCurve::exp_neg() },
            right: Scaling { depth: Level::new(50), curve: ScalingCurve::exp_neg() },
            ..kbd_level_scaling
        },
        kbd_rate_scaling: Depth::new(4),
        output_level: Level::new(82),
        ..op
    };

    let op5 = Operator {
        eg: Envelope::new_rate_level(
            [Rate::new(77), Rate::new(36), Rate::new(41), Rate::new(71)],
            [Level::new(99), Level::new(98), Level::new(98), Level::new(0)]),
        kbd_level_scaling,
        output_level: Level::new(98),
        detune: Detune::new(1),
        ..op
    };

    let op4 = Operator {
        eg: op5.eg,
        kbd_level_scaling,
        output_level: Level::new(99),
        ..op
    };

    let op3 = Operator {
        eg: Envelope::new_rate_level(
            [Rate::new(77), Rate::new(76), Rate::new(82), Rate::new(71)],
            [Level::new(99), Level::new(98), Level::new(98), Level::new(0)]),
        kbd_level_scaling,
        output_level: Level::new(99),
        detune: Detune::new(-2),
        ..op
    };

    let op2 = Operator {
        eg: Envelope::new_rate_level(
            [Rate::new(62), Rate::new(51), Rate::new(29), Rate::new(71)],
            [Level::new(82), Level::new(95), Level::new(96), Level::new(0)]),
        kbd_level_scaling: KeyboardLevelScaling {
            breakpoint: Key::new(48 - 21),
            left: Scaling { depth: Level::new(0), curve: ScalingCurve::lin_pos() },
            right: Scaling { depth: Level::new(7), curve: ScalingCurve::exp_neg() },
        },
        key_vel_sens: Depth::new(0),
        output_level: Level::new(86),
        coarse: Coarse::new(0),
        detune: Detune::new(7),
        ..op
    };

    let op1 = Operator {
        eg: Envelope::new_rate_level(
            [Rate::new(72), Rate::new(76), Rate::new(99), Rate::new(71)],
            [Level::new(99), Level::new(88), Level::new(96), Level::new(0)]),
        kbd_level_scaling: KeyboardLevelScaling {
            right: Scaling { depth: Level::new(14), curve: ScalingCurve::lin_neg() },
            ..kbd_level_scaling
        },
        key_vel_sens: Depth::new(0),
        output_level: Level::new(98),
        coarse: Coarse::new(0),
        detune: Detune::new(7),
        ..op
    };

    Voice {
        operators: [op1, op2, op3, op4, op5, op6],
        peg: Envelope::new_rate_level(
            [Rate::new(84), Rate::new(95), Rate::new(95), Rate::new(60)],
            [Level::new(50), Level::new(50), Level::new(50), Level::new(50)]),
        alg: Algorithm::new(22),
        feedback: Depth::new(7),
        osc_sync: true,
        lfo: Lfo {
            speed: Level::new(37),
            delay: Level::new(0),
            pmd: Level::new(5),
            amd: Level::new(0),
            sync: false,
            waveform: LfoWaveform::Sine,
        },
        pitch_mod_sens: Depth::new(3),
        transpose: Transpose::new(0),
        name: "BRASS   1".to_string(),
        ..Voice::new()
    }
}

#[cfg(test)]
mod tests {
    // Note this useful idiom: importing names from outer (for mod tests) scope.
    use super::*;

    #[test]
    fn test_voice_length() {
        assert_eq!(Voice::new().to_bytes().len(), Voice::DATA_SIZE);
    }

    #[test]
    fn test_voice_packed_length() {
        let brass1 = make_brass1();
        assert_eq!(brass1.to_packed_bytes().len(), PACKED_SIZE);
    }

    #[test]
    fn test_packed_round_trip() {
        let brass1 = make_brass1();
        let packed = brass1.to_packed_bytes();
        let voice = Voice::from_packed_bytes(&packed).expect("valid voice data");
        assert_eq!(voice, brass1);
    }

    #[test]
    fn test_packed_global_bytes() {
        let packed = make_brass1().to_packed_bytes();
        assert_eq!(packed[110], 21);    // algorithm 22
        assert_eq!(packed[111], 0x0f);  // feedback 7, osc sync on
        assert_eq!(packed[116], 0x38);  // LFO sync off, sine, PMS 3
        assert_eq!(packed[117], 24);    // no transpose
        assert_eq!(&packed[118..128], b"BRASS   1 ");
    }

    #[test]
    fn test_voice_from_bytes() {
        let data: [u8; 155] = [
            0x63, 0x63, 0x63, 0x63,
            0x63, 0x63, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x57, 0x00, 0x0b, 0x00, 0x07, 0x63, 0x27, 0x63,
            0x63, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x07, 0x41, 0x00, 0x00, 0x00, 0x07, 0x63, 0x27,
            0x63, 0x63, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00,
            0x00, 0x00, 0x00, 0x05, 0x58, 0x00, 0x08, 0x00, 0x07, 0x63,
            0x20, 0x63, 0x57, 0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11,
            0x00, 0x00, 0x00, 0x00, 0x03, 0x47, 0x00, 0x03, 0x00, 0x07,
            0x63, 0x23, 0x63, 0x57, 0x63, 0x63, 0x63, 0x00, 0x00, 0x00,
            0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x5c, 0x00, 0x00, 0x00,
            0x07, 0x63, 0x43, 0x1e, 0x57, 0x63, 0x5f, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x63, 0x00, 0x00,
            0x00, 0x07, 0x63, 0x63, 0x63, 0x63, 0x32, 0x32, 0x32, 0x32,
            0x0f, 0x05, 0x01, 0x23, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
            0x18, 0x47, 0x45, 0x54, 0x20, 0x46, 0x55, 0x4e, 0x4b, 0x59,
            0x20,
        ];

        let voice = Voice::from_bytes(&data).expect("valid voice data");
        assert_eq!(voice.name, "GET FUNKY");
        assert_eq!(voice.alg.value(), 16);
        assert_eq!(voice.feedback.value(), 5);
        assert_eq!(voice.to_bytes(), data.to_vec());
    }

    #[test]
    fn test_from_bytes_reports_offset() {
        let mut data = Voice::new().to_bytes();
        data[134] = 32;  // algorithm byte is 0...31
        assert_eq!(Voice::from_bytes(&data), Err(ParseError::InvalidData(134)));

        let mut data = Voice::new().to_bytes();
        data[21 + 16] = 100;  // OP5 output level
        assert_eq!(Voice::from_bytes(&data), Err(ParseError::InvalidData(37)));
    }

    #[test]
    fn test_message_round_trip() {
        let brass1 = make_brass1();
        let msg = brass1.to_message(MidiChannel::new(1));
        assert_eq!(msg.len(), 163);
        assert_eq!(&msg[..6], &[0xF0, 0x43, 0x00, 0x00, 0x01, 0x1B]);
        assert_eq!(Voice::from_message(&msg), Ok(brass1));
    }

    #[test]
    fn test_json_round_trip() {
        let brass1 = make_brass1();
        let json = brass1.to_json();
        assert_eq!(json.operators.len(), 6);
        assert_eq!(json.operators[0].id, 1);
        assert_eq!(json.operators[5].key.break_point, "C3");
        assert_eq!(json.operators[1].key.break_point, "C2");
        assert_eq!(json.lfo.wave, "SINE");
        assert_eq!(Voice::from_json(&json), Ok(brass1));
    }

    #[test]
    fn test_from_json_rejects_out_of_range() {
        let mut json = Voice::new().to_json();
        json.global.algorithm = 33;
        assert_eq!(Voice::from_json(&json), Err(ParseError::OutOfRange("global.algorithm", 33)));

        let mut json = Voice::new().to_json();
        json.operators.pop();
        assert_eq!(Voice::from_json(&json), Err(ParseError::InvalidLength(5, 6)));
    }

    #[test]
    fn test_name_is_sanitized() {
        let voice = Voice { name: "Bräss".to_string(), ..Voice::new() };
        let bytes = voice.to_bytes();
        assert_eq!(&bytes[145..155], b"Br ss     ");
    }

    #[test]
    fn test_init_voice_name() {
        assert_eq!(Voice::init(0).name, "Voice 1");
        assert_eq!(Voice::init(31).name, "Voice 32");
        assert_eq!(Voice::init(5).operators, Voice::new().operators);
    }

    #[test]
    fn test_random_voice_is_valid() {
        for _ in 0..20 {
            let voice = Voice::random();
            assert_eq!(Voice::from_bytes(&voice.to_bytes()), Ok(voice));
        }
    }
}
