use log::debug;

use crate::ParseError;
use crate::dx7::{MidiChannel, VOICE_COUNT};
use crate::dx7::voice::{Voice, PACKED_SIZE};
use crate::dx7::json::VoiceJson;
use crate::dx7::sysex::{self, SystemExclusiveData, Header, Format};

/// A DX7 cartridge with 32 voices.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Cartridge {
    voices: Vec<Voice>,
}

impl Default for Cartridge {
    fn default() -> Self {
        Cartridge {
            voices: (0..VOICE_COUNT).map(Voice::init).collect(),
        }
    }
}

impl Cartridge {
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    /// Replaces the voice in a slot, returning the previous one.
    /// Returns `None` and leaves the cartridge alone if the slot does not exist.
    pub fn replace_voice(&mut self, index: usize, voice: Voice) -> Option<Voice> {
        self.voices.get_mut(index).map(|slot| std::mem::replace(slot, voice))
    }

    pub fn voice_mut(&mut self, index: usize) -> Option<&mut Voice> {
        self.voices.get_mut(index)
    }

    /// Makes a cartridge of the given voices.
    /// There must be exactly 32 of them.
    pub fn from_voices(voices: Vec<Voice>) -> Result<Self, ParseError> {
        if voices.len() != VOICE_COUNT {
            return Err(ParseError::InvalidLength(voices.len() as u32, VOICE_COUNT as u32));
        }
        Ok(Cartridge { voices })
    }

    pub fn to_json(&self) -> Vec<VoiceJson> {
        self.voices.iter().map(Voice::to_json).collect()
    }

    /// Makes a cartridge bulk dump message.
    pub fn to_message(&self, channel: MidiChannel) -> Vec<u8> {
        let header = Header::new(channel, Format::Cartridge);
        sysex::message(&header, &self.to_bytes())
    }

    /// Parses a cartridge bulk dump message.
    pub fn from_message(data: &[u8]) -> Result<Self, ParseError> {
        let (header, payload) = sysex::parse_message(data)?;
        match header.format {
            Format::Cartridge => Cartridge::from_bytes(payload),
            Format::Voice => Err(ParseError::Unidentified),
        }
    }

    /// Parses either a complete bulk dump message or
    /// the bare 4096-byte cartridge payload.
    pub fn from_sysex_file(data: &[u8]) -> Result<Self, ParseError> {
        if data.first() == Some(&sysex::SYSEX_START) {
            Cartridge::from_message(data)
        }
        else {
            Cartridge::from_bytes(data)
        }
    }
}

impl SystemExclusiveData for Cartridge {
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() != Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        let voices = data.chunks(PACKED_SIZE)
            .enumerate()
            .map(|(index, packed_voice_data)| {
                Voice::from_packed_bytes(packed_voice_data).map_err(|e| {
                    debug!("Voice #{} is invalid: {}", index + 1, e);
                    match e {
                        ParseError::InvalidData(_) => ParseError::InvalidData((index * PACKED_SIZE) as u32),
                        other => other,
                    }
                })
            })
            .collect::<Result<Vec<Voice>, ParseError>>()?;
        Ok(Cartridge { voices })
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut data: Vec<u8> = Vec::new();

        for (index, voice) in self.voices.iter().enumerate() {
            let packed_voice_data = voice.to_packed_bytes();
            debug!("Voice #{} packed data length = {} bytes", index + 1, packed_voice_data.len());
            data.extend(packed_voice_data);
        }

        data
    }

    const DATA_SIZE: usize = 4096;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ranged;
    use crate::dx7::voice::make_brass1;

    #[test]
    fn test_cartridge_length() {
        let cartridge = Cartridge::default();
        assert_eq!(cartridge.to_bytes().len(), 4096);
        assert_eq!(cartridge.voices().len(), 32);
    }

    #[test]
    fn test_default_voice_names() {
        let cartridge = Cartridge::default();
        assert_eq!(cartridge.voice(0).unwrap().name, "Voice 1");
        assert_eq!(cartridge.voice(31).unwrap().name, "Voice 32");
        assert!(cartridge.voice(32).is_none());
    }

    #[test]
    fn test_message_round_trip() {
        let mut cartridge = Cartridge::default();
        cartridge.replace_voice(3, make_brass1());

        let msg = cartridge.to_message(MidiChannel::new(1));
        assert_eq!(msg.len(), 4104);
        assert_eq!(&msg[..6], &[0xF0, 0x43, 0x00, 0x09, 0x20, 0x00]);

        let parsed = Cartridge::from_sysex_file(&msg).unwrap();
        assert_eq!(parsed, cartridge);

        let bare = Cartridge::from_sysex_file(&msg[6..4102]).unwrap();
        assert_eq!(bare, cartridge);
    }

    #[test]
    fn test_voice_dump_is_not_a_cartridge() {
        let msg = make_brass1().to_message(MidiChannel::new(1));
        assert_eq!(Cartridge::from_message(&msg), Err(ParseError::Unidentified));
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert_eq!(Cartridge::from_bytes(&[0u8; 100]), Err(ParseError::InvalidLength(100, 4096)));
    }

    #[test]
    fn test_replace_voice_out_of_range() {
        let mut cartridge = Cartridge::default();
        assert!(cartridge.replace_voice(32, make_brass1()).is_none());
        assert_eq!(cartridge, Cartridge::default());
    }

    #[test]
    fn test_from_voices_needs_32_voices() {
        let voices = vec![Voice::new(); 31];
        assert_eq!(Cartridge::from_voices(voices), Err(ParseError::InvalidLength(31, 32)));

        let voices: Vec<Voice> = (0..32).map(Voice::init).collect();
        assert_eq!(Cartridge::from_voices(voices).unwrap(), Cartridge::default());
    }
}
