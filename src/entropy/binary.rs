//! Binary (range-style) arithmetic coder over a pluggable bit predictor.
//!
//! The coder keeps 56-bit `low`/`high` registers. Each bit splits the
//! current interval at a point proportional to the predicted probability of
//! a 1, then renormalizes by shipping the agreed top 32 bits whenever
//! `low` and `high` share bits 24..55. Output is staged per chunk and
//! framed as: varint byte count, then the staged bytes (which start with
//! the decoder's 56-bit initial window and end with a 56-bit tail).

use crate::bitstream::{StageReader, StageWriter};
use crate::entropy::predictor::Predictor;
use crate::entropy::{read_varint, write_varint, EntropyDecoder, EntropyEncoder};
use crate::error::{Error, Result};

const TOP: u64 = 0x00FF_FFFF_FFFF_FFFF;
const MASK_24_56: u64 = 0x00FF_FFFF_FF00_0000;
const MASK_0_24: u64 = 0x00FF_FFFF;
const MASK_0_32: u64 = 0xFFFF_FFFF;

/// Bytes coded per register reset. Predictor state persists across chunks.
const CHUNK_SIZE: usize = 1 << 26;

/// Arithmetic coder + predictor pair. One instance serves as encoder or
/// decoder for a single frame.
pub struct BinaryCodec {
    predictor: Box<dyn Predictor>,
    low: u64,
    high: u64,
    current: u64,
    stage: Vec<u8>,
    payload: Vec<u8>,
    pos: usize,
}

impl BinaryCodec {
    pub fn new(predictor: Box<dyn Predictor>) -> Self {
        BinaryCodec {
            predictor,
            low: 0,
            high: TOP,
            current: 0,
            stage: Vec::new(),
            payload: Vec::new(),
            pos: 0,
        }
    }

    #[inline]
    fn encode_bit(&mut self, bit: i32) {
        let p = self.predictor.get() as u64;
        let split = ((self.high - self.low) >> 4).wrapping_mul(p) >> 8;
        if bit != 0 {
            self.high = self.low + split;
        } else {
            self.low = self.low + split + 1;
        }
        self.predictor.update(bit);
        while (self.low ^ self.high) & MASK_24_56 == 0 {
            let word = ((self.high >> 24) & MASK_0_32) as u32;
            self.stage.extend_from_slice(&word.to_be_bytes());
            self.low = (self.low << 32) & TOP;
            self.high = ((self.high << 32) | MASK_0_32) & TOP;
        }
    }

    #[inline]
    fn encode_byte(&mut self, b: u8) {
        for i in (0..8).rev() {
            self.encode_bit(((b >> i) & 1) as i32);
        }
    }

    #[inline]
    fn decode_bit(&mut self) -> Result<i32> {
        let p = self.predictor.get() as u64;
        let split = self.low + (((self.high - self.low) >> 4).wrapping_mul(p) >> 8);
        let bit = if split >= self.current {
            self.high = split;
            1
        } else {
            self.low = split + 1;
            0
        };
        self.predictor.update(bit);
        while (self.low ^ self.high) & MASK_24_56 == 0 {
            self.low = (self.low << 32) & TOP;
            self.high = ((self.high << 32) | MASK_0_32) & TOP;
            let word = self.next_u32()?;
            self.current = ((self.current << 32) | word as u64) & TOP;
        }
        Ok(bit)
    }

    #[inline]
    fn decode_byte(&mut self) -> Result<u8> {
        let mut v = 1u32;
        for _ in 0..8 {
            v = (v << 1) | self.decode_bit()? as u32;
        }
        Ok((v & 0xFF) as u8)
    }

    fn next_u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.payload.len() {
            return Err(Error::ProcessBlock("binary coder payload underrun".to_string()));
        }
        let w = u32::from_be_bytes(self.payload[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(w)
    }
}

impl EntropyEncoder for BinaryCodec {
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize> {
        for chunk in block.chunks(CHUNK_SIZE) {
            self.low = 0;
            self.high = TOP;
            self.stage.clear();
            for &b in chunk {
                self.encode_byte(b);
            }
            let tail = self.low | MASK_0_24;
            self.stage.extend_from_slice(&tail.to_be_bytes()[1..8]);
            write_varint(bs, self.stage.len() as u64)?;
            bs.write_bits_from(&self.stage, self.stage.len() * 8)?;
        }
        Ok(block.len())
    }
}

impl EntropyDecoder for BinaryCodec {
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize> {
        let total = block.len();
        for chunk in block.chunks_mut(CHUNK_SIZE) {
            let n = read_varint(bs)? as usize;
            if n < 7 {
                return Err(Error::ProcessBlock(format!("binary coder chunk of {} bytes", n)));
            }
            self.payload.resize(n, 0);
            bs.read_bits_into(&mut self.payload, n * 8)?;
            self.low = 0;
            self.high = TOP;
            let mut cur = 0u64;
            for &b in &self.payload[..7] {
                cur = (cur << 8) | b as u64;
            }
            self.current = cur;
            self.pos = 7;
            for out in chunk.iter_mut() {
                *out = self.decode_byte()?;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BitReader, BitWriter};
    use crate::entropy::fpaq::FpaqPredictor;
    use std::io::Cursor;

    fn round_trip(data: &[u8]) {
        let mut enc = BinaryCodec::new(Box::new(FpaqPredictor::new()));
        let mut bw = BitWriter::new(Vec::new());
        assert_eq!(enc.encode(&mut bw, data).unwrap(), data.len());
        bw.close().unwrap();

        let mut dec = BinaryCodec::new(Box::new(FpaqPredictor::new()));
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        let mut out = vec![0u8; data.len()];
        assert_eq!(dec.decode(&mut br, &mut out).unwrap(), data.len());
        assert_eq!(out, data);
    }

    #[test]
    fn round_trips_text() {
        round_trip(b"the binary coder splits intervals, the binary coder renormalizes");
    }

    #[test]
    fn round_trips_all_byte_values() {
        let data: Vec<u8> = (0u8..=255).cycle().take(4096).collect();
        round_trip(&data);
    }

    #[test]
    fn round_trips_constant_and_empty() {
        round_trip(&[]);
        round_trip(&[0u8; 2000]);
        round_trip(&[0xFFu8; 2000]);
    }

    #[test]
    fn round_trips_skewed_bits() {
        let data: Vec<u8> = (0..3000).map(|i| if i % 17 == 0 { 0x80 } else { 0 }).collect();
        round_trip(&data);
    }
}
