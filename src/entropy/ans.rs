//! Range asymmetric numeral system coder, order 0 and order 1.
//!
//! Per chunk the encoder histograms the data, normalizes frequencies to
//! `1 << log_range`, serializes the alphabet and frequency tables, then runs
//! the rANS state machine over the chunk right-to-left so the decoder can
//! stream left-to-right. Order 0 interleaves two states on alternating
//! positions; order 1 keys the frequency tables by the previous byte and
//! uses a single state. Renormalization moves 16 bits at a time.

use crate::bitstream::{StageReader, StageWriter};
use crate::entropy::alphabet::{
    decode_alphabet, decode_frequencies, encode_alphabet, encode_frequencies,
    normalize_frequencies,
};
use crate::entropy::{read_varint, write_varint, EntropyDecoder, EntropyEncoder};
use crate::error::{Error, Result};

/// Lower bound of the state interval.
const ANS_TOP: u32 = 1 << 15;
const DEFAULT_LOG_RANGE: usize = 12;
const MIN_LOG_RANGE: usize = 8;
const MAX_LOG_RANGE: usize = 15;
/// Chunk size; stays far below the format ceiling of `1 << 27`.
const CHUNK_SIZE: usize = 1 << 18;

pub struct AnsCodec {
    order: u8,
    payload: Vec<u8>,
    pos: usize,
}

impl AnsCodec {
    /// `order` must be 0 or 1.
    pub fn new(order: u8) -> Self {
        debug_assert!(order <= 1);
        AnsCodec {
            order,
            payload: Vec::new(),
            pos: 0,
        }
    }

    fn log_range_for(len: usize) -> usize {
        let bits = usize::BITS as usize - len.leading_zeros() as usize;
        bits.clamp(MIN_LOG_RANGE, DEFAULT_LOG_RANGE)
    }

    fn next_u16(&mut self) -> Result<u32> {
        if self.pos + 2 > self.payload.len() {
            return Err(Error::ProcessBlock("ans payload underrun".to_string()));
        }
        let v = ((self.payload[self.pos] as u32) << 8) | self.payload[self.pos + 1] as u32;
        self.pos += 2;
        Ok(v)
    }

    fn next_u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.payload.len() {
            return Err(Error::ProcessBlock("ans payload underrun".to_string()));
        }
        let v = u32::from_be_bytes(self.payload[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }
}

fn build_cum(alphabet: &[usize], freqs: &[u32; 256], cum: &mut [u32; 256]) {
    let mut acc = 0u32;
    for &s in alphabet {
        cum[s] = acc;
        acc += freqs[s];
    }
}

fn build_slots(alphabet: &[usize], freqs: &[u32; 256], cum: &[u32; 256], slots: &mut [u8]) {
    for &s in alphabet {
        let lo = cum[s] as usize;
        let hi = lo + freqs[s] as usize;
        for slot in slots[lo..hi].iter_mut() {
            *slot = s as u8;
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[inline]
fn encode_symbol(st: &mut u32, freq: u32, cum: u32, log_range: usize, out: &mut Vec<u8>) {
    // Renormalize before the state grows past the encodable interval.
    let x_max = ((ANS_TOP >> log_range) << 16) * freq;
    while *st >= x_max {
        // Low byte first; the whole buffer is reversed before emission.
        out.push((*st & 0xFF) as u8);
        out.push(((*st >> 8) & 0xFF) as u8);
        *st >>= 16;
    }
    *st = ((*st / freq) << log_range) + (*st % freq) + cum;
}

#[inline]
fn push_final_state(st: u32, out: &mut Vec<u8>) {
    // Little-endian push; after the global reversal the decoder reads the
    // state back big-endian.
    out.extend_from_slice(&st.to_le_bytes());
}

impl EntropyEncoder for AnsCodec {
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize> {
        for chunk in block.chunks(CHUNK_SIZE) {
            let log_range = Self::log_range_for(chunk.len());
            bs.write_bits((log_range - MIN_LOG_RANGE) as u64, 3)?;
            if self.order == 0 {
                self.encode_chunk_order0(bs, chunk, log_range)?;
            } else {
                self.encode_chunk_order1(bs, chunk, log_range)?;
            }
        }
        Ok(block.len())
    }
}

impl AnsCodec {
    fn encode_chunk_order0(
        &mut self,
        bs: &mut StageWriter,
        chunk: &[u8],
        log_range: usize,
    ) -> Result<()> {
        let mut freqs = [0u32; 256];
        for &b in chunk {
            freqs[b as usize] += 1;
        }
        normalize_frequencies(&mut freqs, chunk.len() as u32, 1 << log_range)?;
        let alphabet: Vec<usize> = (0..256).filter(|&s| freqs[s] > 0).collect();
        encode_alphabet(bs, &alphabet)?;
        encode_frequencies(bs, &alphabet, &freqs)?;
        let mut cum = [0u32; 256];
        build_cum(&alphabet, &freqs, &mut cum);

        let mut out = Vec::with_capacity(chunk.len() / 2 + 16);
        let mut st = [ANS_TOP, ANS_TOP];
        for i in (0..chunk.len()).rev() {
            let s = chunk[i] as usize;
            encode_symbol(&mut st[i & 1], freqs[s], cum[s], log_range, &mut out);
        }
        // The decoder reads st0 first, so it must be pushed last.
        push_final_state(st[1], &mut out);
        push_final_state(st[0], &mut out);
        out.reverse();
        write_varint(bs, out.len() as u64)?;
        bs.write_bits_from(&out, out.len() * 8)?;
        Ok(())
    }

    fn encode_chunk_order1(
        &mut self,
        bs: &mut StageWriter,
        chunk: &[u8],
        log_range: usize,
    ) -> Result<()> {
        let mut freqs = vec![[0u32; 256]; 256];
        let mut totals = [0u32; 256];
        let mut ctx = 0usize;
        for &b in chunk {
            freqs[ctx][b as usize] += 1;
            totals[ctx] += 1;
            ctx = b as usize;
        }
        let mut alphabets: Vec<Vec<usize>> = Vec::with_capacity(256);
        let mut cums = vec![[0u32; 256]; 256];
        for c in 0..256 {
            if totals[c] > 0 {
                normalize_frequencies(&mut freqs[c], totals[c], 1 << log_range)?;
            }
            let alphabet: Vec<usize> = (0..256).filter(|&s| freqs[c][s] > 0).collect();
            encode_alphabet(bs, &alphabet)?;
            if !alphabet.is_empty() {
                encode_frequencies(bs, &alphabet, &freqs[c])?;
                build_cum(&alphabet, &freqs[c], &mut cums[c]);
            }
            alphabets.push(alphabet);
        }

        let mut out = Vec::with_capacity(chunk.len() / 2 + 8);
        let mut st = ANS_TOP;
        for i in (0..chunk.len()).rev() {
            let c = if i == 0 { 0 } else { chunk[i - 1] as usize };
            let s = chunk[i] as usize;
            encode_symbol(&mut st, freqs[c][s], cums[c][s], log_range, &mut out);
        }
        push_final_state(st, &mut out);
        out.reverse();
        write_varint(bs, out.len() as u64)?;
        bs.write_bits_from(&out, out.len() * 8)?;
        Ok(())
    }

    fn decode_chunk_order0(
        &mut self,
        bs: &mut StageReader,
        chunk: &mut [u8],
        log_range: usize,
    ) -> Result<()> {
        let alphabet = decode_alphabet(bs)?;
        if alphabet.is_empty() {
            return Err(Error::ProcessBlock("empty alphabet for non-empty chunk".to_string()));
        }
        let mut freqs = [0u32; 256];
        decode_frequencies(bs, &alphabet, log_range, &mut freqs)?;
        let mut cum = [0u32; 256];
        build_cum(&alphabet, &freqs, &mut cum);
        let mut slots = vec![0u8; 1 << log_range];
        build_slots(&alphabet, &freqs, &cum, &mut slots);

        let n = read_varint(bs)? as usize;
        self.payload.resize(n, 0);
        bs.read_bits_into(&mut self.payload, n * 8)?;
        self.pos = 0;
        let mask = (1u32 << log_range) - 1;
        let mut st = [self.next_u32()?, self.next_u32()?];
        for i in 0..chunk.len() {
            let state = &mut st[i & 1];
            let slot = *state & mask;
            let s = slots[slot as usize] as usize;
            *state = freqs[s] * (*state >> log_range) + slot - cum[s];
            while *state < ANS_TOP {
                let bits = self.next_u16()?;
                *state = (*state << 16) | bits;
            }
            chunk[i] = s as u8;
        }
        Ok(())
    }

    fn decode_chunk_order1(
        &mut self,
        bs: &mut StageReader,
        chunk: &mut [u8],
        log_range: usize,
    ) -> Result<()> {
        let mut freqs = vec![[0u32; 256]; 256];
        let mut cums = vec![[0u32; 256]; 256];
        let mut slots = vec![vec![0u8; 0]; 256];
        for c in 0..256 {
            let alphabet = decode_alphabet(bs)?;
            if alphabet.is_empty() {
                continue;
            }
            decode_frequencies(bs, &alphabet, log_range, &mut freqs[c])?;
            build_cum(&alphabet, &freqs[c], &mut cums[c]);
            slots[c] = vec![0u8; 1 << log_range];
            build_slots(&alphabet, &freqs[c], &cums[c], &mut slots[c]);
        }

        let n = read_varint(bs)? as usize;
        self.payload.resize(n, 0);
        bs.read_bits_into(&mut self.payload, n * 8)?;
        self.pos = 0;
        let mask = (1u32 << log_range) - 1;
        let mut st = self.next_u32()?;
        let mut ctx = 0usize;
        for out in chunk.iter_mut() {
            if slots[ctx].is_empty() {
                return Err(Error::ProcessBlock("missing context table".to_string()));
            }
            let slot = st & mask;
            let s = slots[ctx][slot as usize] as usize;
            st = freqs[ctx][s] * (st >> log_range) + slot - cums[ctx][s];
            while st < ANS_TOP {
                let bits = self.next_u16()?;
                st = (st << 16) | bits;
            }
            *out = s as u8;
            ctx = s;
        }
        Ok(())
    }
}

impl EntropyDecoder for AnsCodec {
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize> {
        let total = block.len();
        for chunk in block.chunks_mut(CHUNK_SIZE) {
            let log_range = bs.read_bits(3)? as usize + MIN_LOG_RANGE;
            if log_range > MAX_LOG_RANGE {
                return Err(Error::ProcessBlock(format!("log range {}", log_range)));
            }
            if self.order == 0 {
                self.decode_chunk_order0(bs, chunk, log_range)?;
            } else {
                self.decode_chunk_order1(bs, chunk, log_range)?;
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

    fn round_trip(order: u8, data: &[u8]) {
        let mut enc = AnsCodec::new(order);
        let mut bw = BitWriter::new(Vec::new());
        enc.encode(&mut bw, data).unwrap();
        bw.close().unwrap();

        let mut dec = AnsCodec::new(order);
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        let mut out = vec![0u8; data.len()];
        dec.decode(&mut br, &mut out).unwrap();
        assert_eq!(out, data, "order {}", order);
    }

    #[test]
    fn order0_round_trips_varied_inputs() {
        round_trip(0, b"a");
        round_trip(0, b"abracadabra abracadabra abracadabra");
        round_trip(0, &[7u8; 5000]);
        let ramp: Vec<u8> = (0..10_000).map(|i| (i % 256) as u8).collect();
        round_trip(0, &ramp);
    }

    #[test]
    fn order1_round_trips_varied_inputs() {
        round_trip(1, b"z");
        round_trip(1, b"mississippi mississippi mississippi river");
        round_trip(1, &[0u8; 4000]);
        let mixed: Vec<u8> = (0..8192).map(|i| ((i * i) % 251) as u8).collect();
        round_trip(1, &mixed);
    }

    #[test]
    fn round_trips_across_chunk_boundary() {
        let data: Vec<u8> = (0..CHUNK_SIZE + 1000)
            .map(|i| b"entropy coding "[i % 15])
            .collect();
        round_trip(0, &data);
    }

    #[test]
    fn compresses_skewed_data() {
        let mut data = vec![b'x'; 60_000];
        for i in (0..data.len()).step_by(100) {
            data[i] = b'y';
        }
        let mut enc = AnsCodec::new(0);
        let mut bw = BitWriter::new(Vec::new());
        enc.encode(&mut bw, &data).unwrap();
        bw.close().unwrap();
        assert!((bw.written() / 8) < data.len() as u64 / 4);
    }
}
