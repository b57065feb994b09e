use std::convert::{
    From,
    TryFrom
};

use std::fmt;

use log::debug;

use crate::{
    ParseError,
    Ranged,
};
use crate::dx7::MidiChannel;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
pub const YAMAHA_ID: u8 = 0x43;

/// Parsing and generating MIDI System Exclusive data.
pub trait SystemExclusiveData: Sized {
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError>;
    fn to_bytes(&self) -> Vec<u8>;
    const DATA_SIZE: usize;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum Format {
    Voice = 0,
    Cartridge = 9,
}

impl Format {
    /// Gets the payload size announced in the header.
    pub fn byte_count(&self) -> u16 {
        match self {
            Format::Voice => 155,
            Format::Cartridge => 4096,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "{}",
            match *self {
                Format::Voice => "voice",
                Format::Cartridge => "cartridge"
            })
    }
}

impl TryFrom<u8> for Format {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Format::Voice),
            9 => Ok(Format::Cartridge),
            _ => Err(ParseError::Unidentified)
        }
    }
}

impl From<Format> for u8 {
    fn from(f: Format) -> u8 {
        f as u8
    }
}

/// The bulk dump header that follows the manufacturer ID.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Header {
    pub sub_status: u8,  // 0=voice/cartridge, 1=parameter
    pub channel: MidiChannel,
    pub format: Format,
    pub byte_count: u16,  // 14-bit number distributed evenly over two bytes
    // voice=155 (00000010011011 = 0x009B, appears as "01 1B")
    // cartridge=4096 (01000000000000 = 0x1000, appears as "20 00")
}

impl Header {
    pub fn new(channel: MidiChannel, format: Format) -> Self {
        Header {
            sub_status: 0,
            channel,
            format,
            byte_count: format.byte_count(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Format = {}, channel = {}, length = {} bytes",
            self.format, self.channel, self.byte_count)
    }
}

impl SystemExclusiveData for Header {
    fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < Self::DATA_SIZE {
            return Err(ParseError::InvalidLength(data.len() as u32, Self::DATA_SIZE as u32));
        }

        let channel = MidiChannel::try_new((data[0] & 0b00001111) as i32 + 1)
            .ok_or(ParseError::InvalidData(0))?;
        let format = Format::try_from(data[1])?;
        let byte_count = ((data[2] as u16) << 7) | (data[3] as u16);
        if byte_count != format.byte_count() {
            return Err(ParseError::InvalidData(2));
        }

        Ok(Self {
            sub_status: (data[0] >> 4) & 0b00000111,
            channel,
            format,
            byte_count,
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        vec![
            self.channel.as_byte() | (self.sub_status << 4),
            self.format.into(),
            ((self.byte_count >> 7) & 0x7f) as u8,
            (self.byte_count & 0x7f) as u8,
        ]
    }

    const DATA_SIZE: usize = 4;
}

/// Computes the bulk dump checksum: the two's complement
/// of the sum of the data bytes, masked to seven bits.
pub fn voice_checksum(data: &[u8]) -> u8 {
    let sum = data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg() & 0x7f
}

/// Wraps a payload into a complete bulk dump message.
pub fn message(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut result = vec![SYSEX_START, YAMAHA_ID];
    result.extend(header.to_bytes());
    result.extend(payload);
    result.push(voice_checksum(payload));
    result.push(SYSEX_END);
    result
}

/// Splits a bulk dump message into its header and verified payload.
pub fn parse_message(data: &[u8]) -> Result<(Header, &[u8]), ParseError> {
    if data.len() < 2 || data[0] != SYSEX_START || data[1] != YAMAHA_ID {
        return Err(ParseError::Unidentified);
    }

    let header = Header::from_bytes(&data[2..])?;
    let start = 2 + Header::DATA_SIZE;
    let size = header.byte_count as usize;
    let expected_length = start + size + 2;
    if data.len() < expected_length {
        return Err(ParseError::InvalidLength(data.len() as u32, expected_length as u32));
    }

    let payload = &data[start..start + size];
    let checksum = data[start + size];
    let computed = voice_checksum(payload);
    if computed != checksum {
        return Err(ParseError::InvalidChecksum(computed, checksum));
    }

    if data[start + size + 1] != SYSEX_END {
        return Err(ParseError::InvalidData((start + size + 1) as u32));
    }

    debug!("{}", header);
    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_byte_count() {
        let voice = Header::new(MidiChannel::new(1), Format::Voice);
        assert_eq!(voice.to_bytes(), vec![0x00, 0x00, 0x01, 0x1B]);

        let cartridge = Header::new(MidiChannel::new(16), Format::Cartridge);
        assert_eq!(cartridge.to_bytes(), vec![0x0F, 0x09, 0x20, 0x00]);
    }

    #[test]
    fn test_header_from_bytes() {
        let header = Header::from_bytes(&[0x02, 0x09, 0x20, 0x00]).unwrap();
        assert_eq!(header.channel.value(), 3);
        assert_eq!(header.format, Format::Cartridge);
        assert_eq!(header.byte_count, 4096);

        assert_eq!(Header::from_bytes(&[0x00, 0x05, 0x20, 0x00]), Err(ParseError::Unidentified));
        assert_eq!(Header::from_bytes(&[0x00, 0x09, 0x01, 0x1B]), Err(ParseError::InvalidData(2)));
    }

    #[test]
    fn test_checksum() {
        assert_eq!(voice_checksum(&[]), 0);
        assert_eq!(voice_checksum(&[0x01]), 0x7f);
        assert_eq!(voice_checksum(&[0x7f, 0x01]), 0x00);

        // The payload plus its checksum always sums to zero in seven bits.
        let data: Vec<u8> = (0..155u32).map(|i| (i * 7 % 100) as u8).collect();
        let sum: u32 = data.iter().map(|b| *b as u32).sum::<u32>() + voice_checksum(&data) as u32;
        assert_eq!(sum & 0x7f, 0);
    }

    #[test]
    fn test_message_round_trip() {
        let header = Header::new(MidiChannel::new(1), Format::Voice);
        let payload = vec![0x11u8; 155];
        let msg = message(&header, &payload);
        assert_eq!(msg.len(), 163);
        assert_eq!(msg[0], SYSEX_START);
        assert_eq!(*msg.last().unwrap(), SYSEX_END);

        let (parsed_header, parsed_payload) = parse_message(&msg).unwrap();
        assert_eq!(parsed_header, header);
        assert_eq!(parsed_payload, &payload[..]);
    }

    #[test]
    fn test_bad_checksum_is_rejected() {
        let header = Header::new(MidiChannel::new(1), Format::Voice);
        let mut msg = message(&header, &[0x11u8; 155]);
        let checksum_offset = msg.len() - 2;
        msg[checksum_offset] ^= 0x01;
        assert!(matches!(parse_message(&msg), Err(ParseError::InvalidChecksum(_, _))));
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        let header = Header::new(MidiChannel::new(1), Format::Cartridge);
        let msg = message(&header, &[0u8; 100]);
        assert!(matches!(parse_message(&msg), Err(ParseError::InvalidLength(_, 4104))));
    }
}
