//! Order-0 range coder over normalized cumulative frequencies.
//!
//! Classic byte-oriented range coding: a 32-bit `range` register shrinks by
//! the symbol probability, carries propagate through a cached byte chain,
//! and renormalization ships one byte whenever `range` drops below 2^24.
//! Chunk framing reuses the shared alphabet and frequency serialization.

use crate::bitstream::{StageReader, StageWriter};
use crate::entropy::alphabet::{
    decode_alphabet, decode_frequencies, encode_alphabet, encode_frequencies,
    normalize_frequencies,
};
use crate::entropy::{read_varint, write_varint, EntropyDecoder, EntropyEncoder};
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 1 << 18;
const DEFAULT_LOG_RANGE: usize = 12;
const MIN_LOG_RANGE: usize = 8;
const RENORM_THRESHOLD: u32 = 1 << 24;

pub struct RangeCodec {
    payload: Vec<u8>,
    pos: usize,
}

impl RangeCodec {
    pub fn new() -> Self {
        RangeCodec {
            payload: Vec::new(),
            pos: 0,
        }
    }

    fn log_range_for(len: usize) -> usize {
        let bits = usize::BITS as usize - len.leading_zeros() as usize;
        bits.clamp(MIN_LOG_RANGE, DEFAULT_LOG_RANGE)
    }

    fn next_byte(&mut self) -> Result<u8> {
        if self.pos >= self.payload.len() {
            return Err(Error::ProcessBlock("range payload underrun".to_string()));
        }
        let b = self.payload[self.pos];
        self.pos += 1;
        Ok(b)
    }
}

impl Default for RangeCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Encoder register with carry chain
// ---------------------------------------------------------------------------

struct RangeEncoderState {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    out: Vec<u8>,
}

impl RangeEncoderState {
    fn new() -> Self {
        RangeEncoderState {
            low: 0,
            range: u32::MAX,
            cache: 0,
            cache_size: 1,
            out: Vec::new(),
        }
    }

    fn encode(&mut self, cum: u32, freq: u32, log_range: usize) {
        let r = self.range >> log_range;
        self.low += cum as u64 * r as u64;
        self.range = r * freq;
        while self.range < RENORM_THRESHOLD {
            self.shift_low();
            self.range <<= 8;
        }
    }

    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            self.out.push(self.cache.wrapping_add(carry));
            for _ in 1..self.cache_size {
                self.out.push(0xFFu8.wrapping_add(carry));
            }
            self.cache = ((self.low >> 24) & 0xFF) as u8;
            self.cache_size = 0;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

impl EntropyEncoder for RangeCodec {
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize> {
        for chunk in block.chunks(CHUNK_SIZE) {
            let log_range = Self::log_range_for(chunk.len());
            bs.write_bits((log_range - MIN_LOG_RANGE) as u64, 3)?;

            let mut freqs = [0u32; 256];
            for &b in chunk {
                freqs[b as usize] += 1;
            }
            normalize_frequencies(&mut freqs, chunk.len() as u32, 1 << log_range)?;
            let alphabet: Vec<usize> = (0..256).filter(|&s| freqs[s] > 0).collect();
            encode_alphabet(bs, &alphabet)?;
            encode_frequencies(bs, &alphabet, &freqs)?;
            let mut cum = [0u32; 256];
            let mut acc = 0u32;
            for &s in &alphabet {
                cum[s] = acc;
                acc += freqs[s];
            }

            let mut rc = RangeEncoderState::new();
            for &b in chunk {
                rc.encode(cum[b as usize], freqs[b as usize], log_range);
            }
            rc.flush();
            write_varint(bs, rc.out.len() as u64)?;
            bs.write_bits_from(&rc.out, rc.out.len() * 8)?;
        }
        Ok(block.len())
    }
}

impl EntropyDecoder for RangeCodec {
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize> {
        let total = block.len();
        for chunk in block.chunks_mut(CHUNK_SIZE) {
            let log_range = bs.read_bits(3)? as usize + MIN_LOG_RANGE;
            let alphabet = decode_alphabet(bs)?;
            if alphabet.is_empty() {
                return Err(Error::ProcessBlock("empty alphabet for non-empty chunk".to_string()));
            }
            let mut freqs = [0u32; 256];
            decode_frequencies(bs, &alphabet, log_range, &mut freqs)?;
            let mut cum = [0u32; 256];
            let mut acc = 0u32;
            for &s in &alphabet {
                cum[s] = acc;
                acc += freqs[s];
            }
            let mut slots = vec![0u8; 1 << log_range];
            for &s in &alphabet {
                let lo = cum[s] as usize;
                for slot in slots[lo..lo + freqs[s] as usize].iter_mut() {
                    *slot = s as u8;
                }
            }

            let n = read_varint(bs)? as usize;
            self.payload.resize(n, 0);
            bs.read_bits_into(&mut self.payload, n * 8)?;
            self.pos = 0;

            // First byte is the flushed initial cache (always 0).
            let _ = self.next_byte()?;
            let mut code = 0u32;
            for _ in 0..4 {
                code = (code << 8) | self.next_byte()? as u32;
            }
            let mut range = u32::MAX;
            let max_slot = (1u32 << log_range) - 1;
            for out in chunk.iter_mut() {
                let r = range >> log_range;
                let slot = (code / r).min(max_slot);
                let s = slots[slot as usize] as usize;
                code -= cum[s] * r;
                range = r * freqs[s];
                while range < RENORM_THRESHOLD {
                    code = (code << 8) | self.next_byte()? as u32;
                    range <<= 8;
                }
                *out = s as u8;
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BitReader, BitWriter};
    use std::io::Cursor;

    fn round_trip(data: &[u8]) {
        let mut enc = RangeCodec::new();
        let mut bw = BitWriter::new(Vec::new());
        enc.encode(&mut bw, data).unwrap();
        bw.close().unwrap();
        let mut dec = RangeCodec::new();
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        let mut out = vec![0u8; data.len()];
        dec.decode(&mut br, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn round_trips_varied_inputs() {
        round_trip(b"r");
        round_trip(b"range coding range coding range coding");
        round_trip(&[0x00u8; 3000]);
        round_trip(&[0xFFu8; 3000]);
        let ramp: Vec<u8> = (0..20_000).map(|i| (i % 256) as u8).collect();
        round_trip(&ramp);
    }

    #[test]
    fn round_trips_two_symbol_heavy_skew() {
        let data: Vec<u8> = (0..50_000).map(|i| if i % 64 == 0 { 1u8 } else { 0u8 }).collect();
        round_trip(&data);
    }

    #[test]
    fn round_trips_across_chunk_boundary() {
        let data: Vec<u8> = (0..CHUNK_SIZE + 513).map(|i| (i % 7) as u8).collect();
        round_trip(&data);
    }
}
