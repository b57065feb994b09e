//! The canonical JSON voice schema.
//!
//! These types are the interchange format between the editor, file
//! import/export and the stored document. They hold plain numbers; range
//! checks happen when converting to the typed voice in `dx7::voice`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeJson {
    pub rates: [i32; 4],
    pub levels: [i32; 4],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyJson {
    pub coarse: i32,
    pub fine: i32,
    pub mode: String,  // "RATIO" or "FIXED"
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OscillatorJson {
    pub detune: i32,  // -7...7
    pub freq: FrequencyJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyJson {
    pub velocity: i32,
    pub scaling: i32,
    pub break_point: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputJson {
    pub level: i32,
    pub amp_mod_sens: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingSideJson {
    pub depth: i32,
    pub curve: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleJson {
    pub left: ScalingSideJson,
    pub right: ScalingSideJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorJson {
    pub id: i32,
    pub osc: OscillatorJson,
    pub eg: EnvelopeJson,
    pub key: KeyJson,
    pub output: OutputJson,
    pub scale: ScaleJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LfoJson {
    pub speed: i32,
    pub delay: i32,
    pub pm_depth: i32,
    pub am_depth: i32,
    pub key_sync: bool,
    pub wave: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalJson {
    pub algorithm: i32,
    pub feedback: i32,
    pub osc_key_sync: bool,
    pub pitch_mod_sens: i32,
    pub transpose: i32,  // semitones, -24...24
    pub amp_mod_sens: i32,
    pub eg_bias_sens: i32,
}

/// One voice in the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceJson {
    pub name: String,
    pub operators: Vec<OperatorJson>,
    #[serde(rename = "pitchEG")]
    pub pitch_eg: EnvelopeJson,
    pub lfo: LfoJson,
    pub global: GlobalJson,
}

/// A named bank of voices, as stored and as exchanged in `.json` bank files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankJson {
    #[serde(default)]
    pub name: String,
    pub voices: Vec<VoiceJson>,
}
