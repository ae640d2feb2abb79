//! Container header: layout, checksum rule, version gates.
//!
//! Current format is version 6. Versions 3..=5 used a block-count field
//! and a truncated 4-bit checksum; they are read but never written.
//! Versions below 3 are reserved and refused.

use std::io::{Read, Write};

use crate::bitstream::{BitReader, BitWriter};
use crate::entropy::EntropyType;
use crate::error::{Error, Result};

/// Container magic, "KANZ".
pub const MAGIC: u32 = 0x4B41_4E5A;
pub const VERSION: u32 = 6;
pub const MIN_VERSION: u32 = 3;
pub const MIN_BLOCK_SIZE: usize = 1024;
pub const MAX_BLOCK_SIZE: usize = 1 << 30;

const CHECKSUM_MULT: u32 = 0x1E35_A7BD;

/// Parsed container header.
#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    pub checksum: bool,
    pub entropy: EntropyType,
    pub transform: u64,
    pub block_size: usize,
    /// Original size when recorded; 0 = unknown.
    pub orig_size: u64,
}

/// Width selector for the original-size field: `16 * sz_mask` bits.
fn sz_mask_for(orig_size: u64) -> u32 {
    if orig_size == 0 {
        0
    } else if orig_size < 1 << 16 {
        1
    } else if orig_size < 1 << 32 {
        2
    } else if orig_size < 1 << 48 {
        3
    } else {
        0 // too large to record; falls back to unknown
    }
}

/// 32-bit mixing state for the header checksum.
fn checksum_state(
    version: u32,
    entropy_id: u32,
    transform: u64,
    block_size: u32,
    sz_mask: u32,
    orig_size: u64,
) -> u32 {
    let mut s = CHECKSUM_MULT.wrapping_mul(version);
    s ^= CHECKSUM_MULT.wrapping_mul(!entropy_id);
    s ^= CHECKSUM_MULT.wrapping_mul(((!transform) >> 32) as u32);
    s ^= CHECKSUM_MULT.wrapping_mul((!transform) as u32);
    s ^= CHECKSUM_MULT.wrapping_mul(!block_size);
    if sz_mask > 0 {
        s ^= CHECKSUM_MULT.wrapping_mul(((!orig_size) >> 32) as u32);
        s ^= CHECKSUM_MULT.wrapping_mul((!orig_size) as u32);
    }
    (s >> 23) ^ (s >> 3)
}

pub fn write_header<W: Write>(bs: &mut BitWriter<W>, h: &Header) -> Result<()> {
    let sz_mask = sz_mask_for(h.orig_size);
    bs.write_bits(MAGIC as u64, 32)?;
    bs.write_bits(VERSION as u64, 4)?;
    bs.write_bit(h.checksum as u8)?;
    bs.write_bits(h.entropy.id() as u64, 5)?;
    bs.write_bits(h.transform, 48)?;
    bs.write_bits((h.block_size >> 4) as u64, 28)?;
    bs.write_bits(sz_mask as u64, 2)?;
    if sz_mask > 0 {
        bs.write_bits(h.orig_size, 16 * sz_mask as usize)?;
    }
    let crc = checksum_state(
        VERSION,
        h.entropy.id() as u32,
        h.transform,
        h.block_size as u32,
        sz_mask,
        h.orig_size,
    ) & 0xFFFF;
    bs.write_bits(crc as u64, 16)?;
    Ok(())
}

pub fn read_header<R: Read>(bs: &mut BitReader<R>) -> Result<Header> {
    let magic = bs.read_bits(32)? as u32;
    if magic != MAGIC {
        return Err(Error::InvalidFile(format!("bad magic 0x{:08X}", magic)));
    }
    let version = bs.read_bits(4)? as u32;
    if version > VERSION || version < MIN_VERSION {
        return Err(Error::StreamVersion(version));
    }
    let checksum = bs.read_bit()? == 1;
    let entropy = EntropyType::from_id(bs.read_bits(5)? as u8)?;
    let transform = bs.read_bits(48)?;
    crate::transform::unpack_descriptor(transform)?;
    let block_size = (bs.read_bits(28)? as usize) << 4;
    if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(Error::BlockSize(format!("{} in header", block_size)));
    }

    if version < VERSION {
        // Legacy layout: 6-bit block count (informational), 4-bit checksum.
        let _block_count = bs.read_bits(6)?;
        let stored = bs.read_bits(4)? as u32;
        let expected =
            checksum_state(version, entropy.id() as u32, transform, block_size as u32, 0, 0) & 0x0F;
        if stored != expected {
            return Err(Error::CrcCheck("legacy header checksum".to_string()));
        }
        return Ok(Header {
            version,
            checksum,
            entropy,
            transform,
            block_size,
            orig_size: 0,
        });
    }

    let sz_mask = bs.read_bits(2)? as u32;
    let orig_size = if sz_mask > 0 {
        bs.read_bits(16 * sz_mask as usize)?
    } else {
        0
    };
    let stored = bs.read_bits(16)? as u32;
    let expected = checksum_state(
        version,
        entropy.id() as u32,
        transform,
        block_size as u32,
        sz_mask,
        orig_size,
    ) & 0xFFFF;
    if stored != expected {
        return Err(Error::CrcCheck("header checksum".to_string()));
    }
    Ok(Header {
        version,
        checksum,
        entropy,
        transform,
        block_size,
        orig_size,
    })
}
