// This file is part of nova64.
// Grounded on spec.md §4.7 and §6's PSID wire format table.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

const MAGIC: &[u8; 4] = b"PSID";
const HEADER_LEN: usize = 22;

#[derive(Debug)]
pub enum PsidLoadError {
    TooShort,
    BadMagic,
}

impl fmt::Display for PsidLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PsidLoadError::TooShort => write!(f, "PSID file shorter than the fixed header"),
            PsidLoadError::BadMagic => write!(f, "missing 'PSID' magic"),
        }
    }
}

impl std::error::Error for PsidLoadError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PsidHeader {
    pub version: u16,
    pub data_offset: u16,
    pub load_address: u16,
    pub init_address: u16,
    pub play_address: u16,
    pub song_count: u16,
    pub start_song: u16,
    pub speed: u32,
}

impl PsidHeader {
    /// Bit 0 of the speed field: set selects CIA timing (divisor 167),
    /// clear selects VBLANK timing (divisor 200), per spec.md §4.7.
    pub fn uses_cia_timing(&self) -> bool {
        self.speed & 0x1 != 0
    }

    pub fn tick_divisor(&self) -> u32 {
        if self.uses_cia_timing() {
            167
        } else {
            200
        }
    }

    /// Encodes the header back to its 22-byte big-endian wire form. The
    /// left inverse of `parse`: `parse(&h.encode()) == Ok((h, ..))`.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(MAGIC);
        BigEndian::write_u16(&mut out[4..6], self.version);
        BigEndian::write_u16(&mut out[6..8], self.data_offset);
        BigEndian::write_u16(&mut out[8..10], self.load_address);
        BigEndian::write_u16(&mut out[10..12], self.init_address);
        BigEndian::write_u16(&mut out[12..14], self.play_address);
        BigEndian::write_u16(&mut out[14..16], self.song_count);
        BigEndian::write_u16(&mut out[16..18], self.start_song);
        BigEndian::write_u32(&mut out[18..22], self.speed);
        out
    }
}

/// Parses a PSID file, returning the header, its effective load address
/// (resolved against the escape hatch), and the payload bytes that follow
/// the load-address escape (if any).
pub fn parse(data: &[u8]) -> Result<(PsidHeader, u16, &[u8]), PsidLoadError> {
    if data.len() < HEADER_LEN {
        return Err(PsidLoadError::TooShort);
    }
    if &data[0..4] != MAGIC {
        return Err(PsidLoadError::BadMagic);
    }
    let header = PsidHeader {
        version: BigEndian::read_u16(&data[4..6]),
        data_offset: BigEndian::read_u16(&data[6..8]),
        load_address: BigEndian::read_u16(&data[8..10]),
        init_address: BigEndian::read_u16(&data[10..12]),
        play_address: BigEndian::read_u16(&data[12..14]),
        song_count: BigEndian::read_u16(&data[14..16]),
        start_song: BigEndian::read_u16(&data[16..18]),
        speed: BigEndian::read_u32(&data[18..22]),
    };

    let mut payload = data.get(header.data_offset as usize..).unwrap_or(&[]);
    let load_address = if header.load_address == 0 {
        let lo = *payload.first().unwrap_or(&0);
        let hi = *payload.get(1).unwrap_or(&0);
        payload = &payload[payload.len().min(2)..];
        u16::from_le_bytes([lo, hi])
    } else {
        header.load_address
    };
    Ok((header, load_address, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> PsidHeader {
        PsidHeader {
            version: 2,
            data_offset: HEADER_LEN as u16,
            load_address: 0x1000,
            init_address: 0x1000,
            play_address: 0x1003,
            song_count: 1,
            start_song: 1,
            speed: 0,
        }
    }

    #[test]
    fn parsing_is_left_inverse_of_encoding() {
        let header = sample_header();
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0xea, 0xea, 0x60]);
        let (parsed, load_addr, payload) = parse(&bytes).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(load_addr, 0x1000);
        assert_eq!(payload, &[0xea, 0xea, 0x60]);
    }

    #[test]
    fn zero_load_address_reads_little_endian_escape_from_payload() {
        let mut header = sample_header();
        header.load_address = 0;
        let mut bytes = header.encode().to_vec();
        bytes.extend_from_slice(&[0x00, 0x10, 0xea]);
        let (_, load_addr, payload) = parse(&bytes).unwrap();
        assert_eq!(load_addr, 0x1000);
        assert_eq!(payload, &[0xea]);
    }

    #[test]
    fn speed_bit_zero_selects_timing_divisor() {
        let mut header = sample_header();
        header.speed = 0;
        assert_eq!(header.tick_divisor(), 200);
        header.speed = 1;
        assert_eq!(header.tick_divisor(), 167);
    }
}
