//! Per-block frame: mode byte, skip flags, length fields, and the
//! block-length prefix on the shared bitstream.
//!
//! Mode byte layout: bit 7 = copy block, bits 6..5 = bytes-1 used by the
//! post-transform length, bit 4 = long skip mask follows, bits 3..0 = skip
//! flags of transforms 0..3 when bit 4 is clear.

use std::io::{Read, Write};

use crate::bitstream::{BitReader, BitWriter, StageReader, StageWriter};
use crate::error::{Error, Result};

pub const COPY_FLAG: u8 = 0x80;
pub const LONG_SKIP_FLAG: u8 = 0x10;
pub const MAX_POST_LEN: usize = 1 << 30;
/// Largest supported length-prefix width.
pub const MAX_PREFIX_WIDTH: usize = 34;

/// Parsed per-block frame header (the part inside the staged payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub copy: bool,
    pub skip: u8,
    pub post_len: usize,
    pub hash: Option<u32>,
}

/// Bytes needed to encode a post-transform length.
pub fn data_size_for(len: usize) -> usize {
    match len {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

pub fn write_block_header(
    sw: &mut StageWriter,
    copy: bool,
    nb_transforms: usize,
    skip: u8,
    post_len: usize,
    hash: Option<u32>,
) -> Result<()> {
    if post_len == 0 || post_len > MAX_POST_LEN {
        return Err(Error::InvalidParam(format!("post length {}", post_len)));
    }
    let d = data_size_for(post_len);
    let mut mode: u8 = ((d - 1) as u8) << 5;
    if copy {
        mode |= COPY_FLAG | 0x0F;
        sw.write_bits(mode as u64, 8)?;
    } else if nb_transforms > 4 {
        mode |= LONG_SKIP_FLAG;
        sw.write_bits(mode as u64, 8)?;
        sw.write_bits(skip as u64, 8)?;
    } else {
        mode |= skip >> 4;
        sw.write_bits(mode as u64, 8)?;
    }
    sw.write_bits(post_len as u64, 8 * d)?;
    if let Some(h) = hash {
        sw.write_bits(h as u64, 32)?;
    }
    Ok(())
}

pub fn read_block_header(sr: &mut StageReader, checksum: bool) -> Result<BlockHeader> {
    let mode = sr.read_bits(8)? as u8;
    let copy = mode & COPY_FLAG != 0;
    let skip = if copy {
        0xFF
    } else if mode & LONG_SKIP_FLAG != 0 {
        sr.read_bits(8)? as u8
    } else {
        ((mode & 0x0F) << 4) | 0x0F
    };
    let d = ((mode >> 5) & 3) as usize + 1;
    let post_len = sr.read_bits(8 * d)? as usize;
    if post_len > MAX_POST_LEN {
        return Err(Error::BlockSize(format!("post length {}", post_len)));
    }
    let hash = if checksum {
        Some(sr.read_bits(32)? as u32)
    } else {
        None
    };
    Ok(BlockHeader {
        copy,
        skip,
        post_len,
        hash,
    })
}

/// Width of the `written_bits` field for one frame.
pub fn length_prefix_width(written_bits: u64) -> usize {
    if written_bits < 8 {
        3
    } else {
        (64 - written_bits.leading_zeros() as usize).min(MAX_PREFIX_WIDTH)
    }
}

/// Emit length prefix plus payload bits for one frame.
pub fn write_frame<W: Write>(
    obs: &mut BitWriter<W>,
    written_bits: u64,
    staged: &[u8],
) -> Result<()> {
    let lw = length_prefix_width(written_bits);
    obs.write_bits((lw - 3) as u64, 5)?;
    obs.write_bits(written_bits, lw)?;
    obs.write_bits_from(staged, written_bits as usize)?;
    Ok(())
}

/// End-of-stream marker: a zero-width frame.
pub fn write_terminator<W: Write>(obs: &mut BitWriter<W>) -> Result<()> {
    obs.write_bits(0, 5)?;
    obs.write_bits(0, 3)?;
    Ok(())
}

/// Read the next frame's bit count. Zero means end of stream.
pub fn read_frame_prefix<R: Read>(ibs: &mut BitReader<R>) -> Result<u64> {
    let lw = ibs.read_bits(5)? as usize + 3;
    ibs.read_bits(lw)
}
