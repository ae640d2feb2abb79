//! Entropy codec roster and dispatch.
//!
//! Every codec encodes against a per-block staging [`StageWriter`] and
//! decodes from a [`StageReader`]; the shared session stream never sees a
//! codec directly. A fresh codec is built per frame so no statistics leak
//! across blocks. Dispatch is a constructor table keyed by the 5-bit id
//! stored in the container header.

pub mod alphabet;
pub mod ans;
pub mod binary;
pub mod cm;
pub mod fpaq;
pub mod huffman;
pub mod predictor;
pub mod range;
pub mod tpaq;

use crate::bitstream::{StageReader, StageWriter};
use crate::error::{Error, Result};

/// 5-bit entropy codec ids. Id 3 is reserved (obsolete), ids 10..=15 are
/// reserved for future coders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntropyType {
    None = 0,
    Huffman = 1,
    Fpaq = 2,
    Range = 4,
    Ans0 = 5,
    Cm = 6,
    Tpaq = 7,
    Ans1 = 8,
    Tpaqx = 9,
}

impl EntropyType {
    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            0 => EntropyType::None,
            1 => EntropyType::Huffman,
            2 => EntropyType::Fpaq,
            4 => EntropyType::Range,
            5 => EntropyType::Ans0,
            6 => EntropyType::Cm,
            7 => EntropyType::Tpaq,
            8 => EntropyType::Ans1,
            9 => EntropyType::Tpaqx,
            _ => return Err(Error::InvalidCodec(format!("entropy id {}", id))),
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            EntropyType::None => "NONE",
            EntropyType::Huffman => "HUFFMAN",
            EntropyType::Fpaq => "FPAQ",
            EntropyType::Range => "RANGE",
            EntropyType::Ans0 => "ANS0",
            EntropyType::Cm => "CM",
            EntropyType::Tpaq => "TPAQ",
            EntropyType::Ans1 => "ANS1",
            EntropyType::Tpaqx => "TPAQX",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name.to_ascii_uppercase().as_str() {
            "NONE" => EntropyType::None,
            "HUFFMAN" => EntropyType::Huffman,
            "FPAQ" => EntropyType::Fpaq,
            "RANGE" => EntropyType::Range,
            "ANS0" => EntropyType::Ans0,
            "CM" => EntropyType::Cm,
            "TPAQ" => EntropyType::Tpaq,
            "ANS1" => EntropyType::Ans1,
            "TPAQX" => EntropyType::Tpaqx,
            _ => return Err(Error::InvalidCodec(format!("entropy name {}", name))),
        })
    }

    /// Build a fresh encoder for one frame.
    pub fn new_encoder(self) -> Box<dyn EntropyEncoder> {
        match self {
            EntropyType::None => Box::new(RawCodec),
            EntropyType::Huffman => Box::new(huffman::HuffmanCodec::new()),
            EntropyType::Fpaq => Box::new(binary::BinaryCodec::new(Box::new(
                fpaq::FpaqPredictor::new(),
            ))),
            EntropyType::Range => Box::new(range::RangeCodec::new()),
            EntropyType::Ans0 => Box::new(ans::AnsCodec::new(0)),
            EntropyType::Cm => Box::new(binary::BinaryCodec::new(Box::new(
                cm::CmPredictor::new(),
            ))),
            EntropyType::Tpaq => Box::new(binary::BinaryCodec::new(Box::new(
                tpaq::TpaqPredictor::new(false),
            ))),
            EntropyType::Ans1 => Box::new(ans::AnsCodec::new(1)),
            EntropyType::Tpaqx => Box::new(binary::BinaryCodec::new(Box::new(
                tpaq::TpaqPredictor::new(true),
            ))),
        }
    }

    /// Build a fresh decoder for one frame.
    pub fn new_decoder(self) -> Box<dyn EntropyDecoder> {
        match self {
            EntropyType::None => Box::new(RawCodec),
            EntropyType::Huffman => Box::new(huffman::HuffmanCodec::new()),
            EntropyType::Fpaq => Box::new(binary::BinaryCodec::new(Box::new(
                fpaq::FpaqPredictor::new(),
            ))),
            EntropyType::Range => Box::new(range::RangeCodec::new()),
            EntropyType::Ans0 => Box::new(ans::AnsCodec::new(0)),
            EntropyType::Cm => Box::new(binary::BinaryCodec::new(Box::new(
                cm::CmPredictor::new(),
            ))),
            EntropyType::Tpaq => Box::new(binary::BinaryCodec::new(Box::new(
                tpaq::TpaqPredictor::new(false),
            ))),
            EntropyType::Ans1 => Box::new(ans::AnsCodec::new(1)),
            EntropyType::Tpaqx => Box::new(binary::BinaryCodec::new(Box::new(
                tpaq::TpaqPredictor::new(true),
            ))),
        }
    }
}

/// Symbol encoder half of an entropy codec.
pub trait EntropyEncoder: Send {
    /// Encode `block` into the staging stream. Returns the number of input
    /// bytes consumed (always `block.len()` on success).
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize>;

    /// Flush any codec-internal tail state. Most codecs finish inside
    /// `encode`; the default is a no-op.
    fn dispose(&mut self, _bs: &mut StageWriter) -> Result<()> {
        Ok(())
    }
}

/// Symbol decoder half of an entropy codec.
pub trait EntropyDecoder: Send {
    /// Decode exactly `block.len()` bytes from the staging stream.
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize>;

    fn dispose(&mut self, _bs: &mut StageReader) -> Result<()> {
        Ok(())
    }
}

/// Raw passthrough codec (id NONE): 8 bits per byte, no statistics.
pub struct RawCodec;

impl EntropyEncoder for RawCodec {
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize> {
        bs.write_bits_from(block, block.len() * 8)?;
        Ok(block.len())
    }
}

impl EntropyDecoder for RawCodec {
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize> {
        let n = block.len();
        bs.read_bits_into(block, n * 8)?;
        Ok(n)
    }
}

/// Write a length as 7-bit groups, least-significant group first, high bit
/// of each byte marking continuation.
pub(crate) fn write_varint(bs: &mut StageWriter, mut value: u64) -> Result<()> {
    while value >= 0x80 {
        bs.write_bits((value & 0x7F) | 0x80, 8)?;
        value >>= 7;
    }
    bs.write_bits(value, 8)?;
    Ok(())
}

/// Inverse of [`write_varint`].
pub(crate) fn read_varint(bs: &mut StageReader) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let b = bs.read_bits(8)?;
        value |= (b & 0x7F) << shift;
        if b < 0x80 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::ProcessBlock("varint overflow".to_string()));
        }
    }
}
