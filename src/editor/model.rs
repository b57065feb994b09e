//! The voice being edited.
//!
//! `VoiceModel` holds plain, directly assignable parameter values the way an
//! editor front end manipulates them. It converts to the canonical JSON
//! schema on demand and reads it back defensively: anything missing or
//! malformed falls back to the init voice, anything out of range is clamped.

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::{ParseError, Ranged};
use crate::dx7::{
    MidiChannel,
    OPERATOR_COUNT,
};
use crate::dx7::json::{
    VoiceJson,
    OperatorJson,
    OscillatorJson,
    FrequencyJson,
    EnvelopeJson,
    KeyJson,
    OutputJson,
    ScaleJson,
    ScalingSideJson,
    LfoJson,
    GlobalJson,
};
use crate::dx7::lfo::LfoWaveform;
use crate::dx7::operator::{Key, OperatorMode, ScalingCurve, note_name};
use crate::dx7::voice::{Voice, normalize_name};
use crate::editor::EditorError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct EnvelopeParams {
    pub rates: [u8; 4],   // 0 ~ 99
    pub levels: [u8; 4],  // 0 ~ 99
}

impl EnvelopeParams {
    fn to_json(&self) -> EnvelopeJson {
        EnvelopeJson {
            rates: self.rates.map(i32::from),
            levels: self.levels.map(i32::from),
        }
    }

    fn read(value: Option<&Value>, defaults: &EnvelopeParams) -> Self {
        EnvelopeParams {
            rates: read_quad(field(value, "rates"), &defaults.rates, 99),
            levels: read_quad(field(value, "levels"), &defaults.levels, 99),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct OperatorParams {
    pub enabled: bool,  // editor only, not part of the voice data
    pub mode: OperatorMode,
    pub coarse: u8,  // 0 ~ 31
    pub fine: u8,  // 0 ~ 99
    pub detune: u8,  // 0 ~ 14, 7 is center
    pub eg: EnvelopeParams,
    pub break_point: u8,  // semitones from A-1, 0 ~ 99
    pub left_depth: u8,  // 0 ~ 99
    pub right_depth: u8,  // 0 ~ 99
    pub left_curve: ScalingCurve,
    pub right_curve: ScalingCurve,
    pub rate_scaling: u8,  // 0 ~ 7
    pub output_level: u8,  // 0 ~ 99
    pub amp_mod_sens: u8,  // 0 ~ 3
    pub key_vel_sens: u8,  // 0 ~ 7
}

impl OperatorParams {
    fn to_json(&self, id: i32) -> OperatorJson {
        OperatorJson {
            id,
            osc: OscillatorJson {
                detune: self.detune as i32 - 7,
                freq: FrequencyJson {
                    coarse: self.coarse.into(),
                    fine: self.fine.into(),
                    mode: self.mode.name().to_string(),
                },
            },
            eg: self.eg.to_json(),
            key: KeyJson {
                velocity: self.key_vel_sens.into(),
                scaling: self.rate_scaling.into(),
                break_point: note_name(self.break_point.into()),
            },
            output: OutputJson {
                level: self.output_level.into(),
                amp_mod_sens: self.amp_mod_sens.into(),
            },
            scale: ScaleJson {
                left: ScalingSideJson {
                    depth: self.left_depth.into(),
                    curve: self.left_curve.to_string(),
                },
                right: ScalingSideJson {
                    depth: self.right_depth.into(),
                    curve: self.right_curve.to_string(),
                },
            },
        }
    }

    fn read(value: Option<&Value>, defaults: &OperatorParams) -> Self {
        let osc = field(value, "osc");
        let freq = field(osc, "freq");
        let key = field(value, "key");
        let output = field(value, "output");
        let scale = field(value, "scale");
        let left = field(scale, "left");
        let right = field(scale, "right");

        OperatorParams {
            enabled: true,
            mode: text(field(freq, "mode"))
                .and_then(OperatorMode::from_name)
                .unwrap_or(defaults.mode),
            coarse: read_u8(field(freq, "coarse"), defaults.coarse, 0, 31),
            fine: read_u8(field(freq, "fine"), defaults.fine, 0, 99),
            detune: (read_int(field(osc, "detune"), defaults.detune as i32 - 7, -7, 7) + 7) as u8,
            eg: EnvelopeParams::read(field(value, "eg"), &defaults.eg),
            break_point: read_break_point(field(key, "breakPoint"), defaults.break_point),
            left_depth: read_u8(field(left, "depth"), defaults.left_depth, 0, 99),
            right_depth: read_u8(field(right, "depth"), defaults.right_depth, 0, 99),
            left_curve: read_curve(field(left, "curve"), defaults.left_curve),
            right_curve: read_curve(field(right, "curve"), defaults.right_curve),
            rate_scaling: read_u8(field(key, "scaling"), defaults.rate_scaling, 0, 7),
            output_level: read_u8(field(output, "level"), defaults.output_level, 0, 99),
            amp_mod_sens: read_u8(field(output, "ampModSens"), defaults.amp_mod_sens, 0, 3),
            key_vel_sens: read_u8(field(key, "velocity"), defaults.key_vel_sens, 0, 7),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LfoParams {
    pub speed: u8,  // 0 ~ 99
    pub delay: u8,  // 0 ~ 99
    pub pm_depth: u8,  // 0 ~ 99
    pub am_depth: u8,  // 0 ~ 99
    pub key_sync: u8,  // 0 or 1
    pub wave: LfoWaveform,
    pub pitch_mod_sens: u8,  // 0 ~ 7
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct GlobalParams {
    pub algorithm: u8,  // 1 ~ 32
    pub feedback: u8,  // 0 ~ 7
    pub osc_key_sync: u8,  // 0 or 1
    pub transpose: u8,  // 0 ~ 48, 24 is C3
    pub amp_mod_sens: u8,  // 0 ~ 3
    pub eg_bias_sens: u8,  // 0 ~ 7
}

/// Where a voice to load into the model comes from.
#[derive(Debug, Clone, Copy)]
pub enum VoiceSource<'a> {
    Codec(&'a Voice),
    Json(&'a VoiceJson),
}

/// The voice currently being edited.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VoiceModel {
    pub name: String,
    pub operators: [OperatorParams; OPERATOR_COUNT],  // OP1 first
    pub pitch_eg: EnvelopeParams,
    pub lfo: LfoParams,
    pub global: GlobalParams,
}

impl Default for VoiceModel {
    /// Makes a model holding the init voice.
    fn default() -> Self {
        VoiceModel::from(&Voice::new())
    }
}

impl From<&Voice> for VoiceModel {
    fn from(voice: &Voice) -> Self {
        let operators = voice.operators.map(|op| OperatorParams {
            enabled: true,
            mode: op.mode,
            coarse: op.coarse.as_byte(),
            fine: op.fine.as_byte(),
            detune: op.detune.as_byte(),
            eg: EnvelopeParams {
                rates: op.eg.rates.map(|r| r.as_byte()),
                levels: op.eg.levels.map(|l| l.as_byte()),
            },
            break_point: op.kbd_level_scaling.breakpoint.as_byte(),
            left_depth: op.kbd_level_scaling.left.depth.as_byte(),
            right_depth: op.kbd_level_scaling.right.depth.as_byte(),
            left_curve: op.kbd_level_scaling.left.curve,
            right_curve: op.kbd_level_scaling.right.curve,
            rate_scaling: op.kbd_rate_scaling.as_byte(),
            output_level: op.output_level.as_byte(),
            amp_mod_sens: op.amp_mod_sens.as_byte(),
            key_vel_sens: op.key_vel_sens.as_byte(),
        });

        VoiceModel {
            name: voice.name.clone(),
            operators,
            pitch_eg: EnvelopeParams {
                rates: voice.peg.rates.map(|r| r.as_byte()),
                levels: voice.peg.levels.map(|l| l.as_byte()),
            },
            lfo: LfoParams {
                speed: voice.lfo.speed.as_byte(),
                delay: voice.lfo.delay.as_byte(),
                pm_depth: voice.lfo.pmd.as_byte(),
                am_depth: voice.lfo.amd.as_byte(),
                key_sync: voice.lfo.sync as u8,
                wave: voice.lfo.waveform,
                pitch_mod_sens: voice.pitch_mod_sens.as_byte(),
            },
            global: GlobalParams {
                algorithm: voice.alg.value() as u8,
                feedback: voice.feedback.as_byte(),
                osc_key_sync: voice.osc_sync as u8,
                transpose: voice.transpose.as_byte(),
                amp_mod_sens: voice.amp_mod_sens.as_byte(),
                eg_bias_sens: voice.eg_bias_sens.as_byte(),
            },
        }
    }
}

impl VoiceModel {
    /// Renders the model in the canonical JSON schema.
    pub fn to_json(&self) -> VoiceJson {
        VoiceJson {
            name: self.name.clone(),
            operators: self.operators.iter()
                .enumerate()
                .map(|(index, op)| op.to_json(index as i32 + 1))
                .collect(),
            pitch_eg: self.pitch_eg.to_json(),
            lfo: LfoJson {
                speed: self.lfo.speed.into(),
                delay: self.lfo.delay.into(),
                pm_depth: self.lfo.pm_depth.into(),
                am_depth: self.lfo.am_depth.into(),
                key_sync: self.lfo.key_sync != 0,
                wave: self.lfo.wave.name().to_string(),
            },
            global: GlobalJson {
                algorithm: self.global.algorithm.into(),
                feedback: self.global.feedback.into(),
                osc_key_sync: self.global.osc_key_sync != 0,
                pitch_mod_sens: self.lfo.pitch_mod_sens.into(),
                transpose: self.global.transpose as i32 - 24,
                amp_mod_sens: self.global.amp_mod_sens.into(),
                eg_bias_sens: self.global.eg_bias_sens.into(),
            },
        }
    }

    /// Makes a codec voice of this voice.
    /// Fails if a parameter has been set out of range.
    pub fn to_voice(&self) -> Result<Voice, ParseError> {
        Voice::from_json(&self.to_json())
    }

    /// Makes the single voice bulk dump of this voice.
    pub fn to_sysex(&self, channel: MidiChannel) -> Result<Vec<u8>, EditorError> {
        Ok(self.to_voice()?.to_message(channel))
    }

    /// Replaces the model with the voice in `json`.
    ///
    /// Missing or malformed fields take their value from the init voice and
    /// out-of-range numbers are clamped. Fails only if `json` is not an object,
    /// in which case the model is left as it was.
    pub fn load_from_json(&mut self, json: &Value) -> Result<(), EditorError> {
        let object = json.as_object().ok_or(EditorError::NotAnObject)?;
        *self = VoiceModel::read(object);
        debug!("Loaded voice '{}' into the editor", self.name);
        Ok(())
    }

    pub fn load_from_voice(&mut self, source: VoiceSource) -> Result<(), EditorError> {
        let json = match source {
            VoiceSource::Codec(voice) => serde_json::to_value(voice.to_json())?,
            VoiceSource::Json(json) => serde_json::to_value(json)?,
        };
        self.load_from_json(&json)
    }

    /// Fills every parameter except the name with random values.
    pub fn randomize(&mut self) -> Result<(), EditorError> {
        let name = std::mem::take(&mut self.name);
        let result = self.load_from_voice(VoiceSource::Codec(&Voice::random()));
        self.name = name;
        result
    }

    fn read(object: &Map<String, Value>) -> Self {
        let defaults = VoiceModel::default();
        let name = match object.get("name") {
            Some(Value::String(name)) => normalize_name(name),
            Some(other) => {
                warn!("Voice name is not a string: {}", other);
                defaults.name.clone()
            },
            None => defaults.name.clone(),
        };

        let operator_values = object.get("operators").and_then(Value::as_array);
        if let Some(values) = operator_values {
            if values.len() != OPERATOR_COUNT {
                warn!("Expected {} operators, got {}", OPERATOR_COUNT, values.len());
            }
        }
        let mut operators = defaults.operators;
        for (index, op) in operators.iter_mut().enumerate() {
            let value = operator_values.and_then(|values| values.get(index));
            *op = OperatorParams::read(value, &defaults.operators[index]);
        }

        let lfo = object.get("lfo");
        let global = object.get("global");

        VoiceModel {
            name,
            operators,
            pitch_eg: EnvelopeParams::read(object.get("pitchEG"), &defaults.pitch_eg),
            lfo: LfoParams {
                speed: read_u8(field(lfo, "speed"), defaults.lfo.speed, 0, 99),
                delay: read_u8(field(lfo, "delay"), defaults.lfo.delay, 0, 99),
                pm_depth: read_u8(field(lfo, "pmDepth"), defaults.lfo.pm_depth, 0, 99),
                am_depth: read_u8(field(lfo, "amDepth"), defaults.lfo.am_depth, 0, 99),
                key_sync: read_flag(field(lfo, "keySync"), defaults.lfo.key_sync),
                wave: text(field(lfo, "wave"))
                    .and_then(LfoWaveform::from_name)
                    .unwrap_or(defaults.lfo.wave),
                pitch_mod_sens: read_u8(field(global, "pitchModSens"), defaults.lfo.pitch_mod_sens, 0, 7),
            },
            global: GlobalParams {
                algorithm: read_u8(field(global, "algorithm"), defaults.global.algorithm, 1, 32),
                feedback: read_u8(field(global, "feedback"), defaults.global.feedback, 0, 7),
                osc_key_sync: read_flag(field(global, "oscKeySync"), defaults.global.osc_key_sync),
                transpose: (read_int(field(global, "transpose"), defaults.global.transpose as i32 - 24, -24, 24) + 24) as u8,
                amp_mod_sens: read_u8(field(global, "ampModSens"), defaults.global.amp_mod_sens, 0, 3),
                eg_bias_sens: read_u8(field(global, "egBiasSens"), defaults.global.eg_bias_sens, 0, 7),
            },
        }
    }
}

fn field<'a>(value: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    value.and_then(|v| v.get(key))
}

fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str)
}

// Reads a number, clamping it into `first..=last`.
// Anything that is not a number gives the default.
fn read_int(value: Option<&Value>, default: i32, first: i32, last: i32) -> i32 {
    let number = match value {
        None => return default,
        Some(v) => v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64)),
    };

    match number {
        Some(n) => {
            let clamped = n.clamp(first as i64, last as i64) as i32;
            if clamped as i64 != n {
                debug!("Value {} clamped to {}", n, clamped);
            }
            clamped
        },
        None => {
            warn!("Expected a number, got {}", value.map(Value::to_string).unwrap_or_default());
            default
        },
    }
}

fn read_u8(value: Option<&Value>, default: u8, first: i32, last: i32) -> u8 {
    read_int(value, default.into(), first, last) as u8
}

// Booleans may also arrive as 0/1.
fn read_flag(value: Option<&Value>, default: u8) -> u8 {
    match value {
        Some(Value::Bool(b)) => *b as u8,
        Some(v) if v.is_number() => (read_int(Some(v), 0, 0, 1) != 0) as u8,
        _ => default,
    }
}

fn read_quad(value: Option<&Value>, defaults: &[u8; 4], last: i32) -> [u8; 4] {
    let items = value.and_then(Value::as_array);
    let mut result = *defaults;
    for (index, item) in result.iter_mut().enumerate() {
        let v = items.and_then(|items| items.get(index));
        *item = read_u8(v, *item, 0, last);
    }
    result
}

fn read_curve(value: Option<&Value>, default: ScalingCurve) -> ScalingCurve {
    text(value).and_then(ScalingCurve::from_name).unwrap_or(default)
}

// A missing break point is the init voice's; an unreadable one is A-1.
fn read_break_point(value: Option<&Value>, default: u8) -> u8 {
    match value {
        None => default,
        Some(Value::String(name)) => match Key::from_name(name) {
            Some(key) => key.as_byte(),
            None => {
                warn!("Bad break point '{}', using A-1", name);
                Key::FIRST as u8
            },
        },
        Some(Value::Number(n)) => n.as_i64()
            .map(|n| n.clamp(Key::FIRST as i64, Key::LAST as i64) as u8)
            .unwrap_or(Key::FIRST as u8),
        Some(_) => Key::FIRST as u8,
    }
}
