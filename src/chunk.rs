use byteorder::{ByteOrder, LittleEndian};

use crate::error::DecodeError;
use crate::source::ByteSource;

pub const CHUNK_HEADER_SIZE: usize = 8;

/// Largest legal chunk payload. The signature chunk's size field is a
/// sentinel and exempt from the cap.
pub const CHUNK_MAX_SIZE: u32 = 65536;

pub const ROQ_INFO: u16 = 0x1001;
pub const ROQ_QUAD_CODEBOOK: u16 = 0x1002;
pub const ROQ_QUAD_VQ: u16 = 0x1011;
pub const ROQ_JPEG: u16 = 0x1012;
pub const ROQ_SOUND_MONO: u16 = 0x1020;
pub const ROQ_SOUND_STEREO: u16 = 0x1021;
pub const ROQ_PACKET: u16 = 0x1030;
pub const ROQ_SIGNATURE: u16 = 0x1084;

pub const SIGNATURE_SIZE: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    pub id: u16,
    pub size: u32,
    pub arg: u16,
}

/// Reads the 8-byte little-endian chunk header at the current position.
pub fn read_header(source: &mut ByteSource) -> Result<ChunkHeader, DecodeError> {
    let buf = source.read(CHUNK_HEADER_SIZE)?;

    let header = ChunkHeader {
        id: LittleEndian::read_u16(&buf[0..2]),
        size: LittleEndian::read_u32(&buf[2..6]),
        arg: LittleEndian::read_u16(&buf[6..8]),
    };

    if header.size != SIGNATURE_SIZE && header.size > CHUNK_MAX_SIZE {
        return Err(DecodeError::ChunkTooLarge(header.size));
    }

    Ok(header)
}
