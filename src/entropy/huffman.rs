//! Canonical Huffman codec.
//!
//! Chunked at 16 KiB with a full statistics reset per chunk. Code lengths
//! are capped at 14 bits (frequencies are halved and the tree rebuilt until
//! the cap holds) and serialized as signed exp-Golomb deltas over the
//! ascending alphabet. Codes are canonical, so the decoder rebuilds the
//! exact tables from lengths alone.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::bitstream::{StageReader, StageWriter};
use crate::entropy::alphabet::{decode_alphabet, encode_alphabet};
use crate::entropy::{EntropyDecoder, EntropyEncoder};
use crate::error::{Error, Result};

const CHUNK_SIZE: usize = 16 * 1024;
pub const MAX_CODE_LEN: usize = 14;

pub struct HuffmanCodec;

impl HuffmanCodec {
    pub fn new() -> Self {
        HuffmanCodec
    }
}

impl Default for HuffmanCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Exp-Golomb (order 0, signed) for length deltas
// ---------------------------------------------------------------------------

fn write_exp_golomb(bs: &mut StageWriter, delta: i32) -> Result<()> {
    let u: u32 = if delta <= 0 {
        (-delta as u32) << 1
    } else {
        ((delta as u32) << 1) - 1
    };
    let v = u + 1;
    let nb = 32 - v.leading_zeros() as usize;
    if nb > 1 {
        bs.write_bits(0, nb - 1)?;
    }
    bs.write_bits(v as u64, nb)?;
    Ok(())
}

fn read_exp_golomb(bs: &mut StageReader) -> Result<i32> {
    let mut zeros = 0usize;
    while bs.read_bit()? == 0 {
        zeros += 1;
        if zeros > 31 {
            return Err(Error::ProcessBlock("exp-golomb run too long".to_string()));
        }
    }
    let mut v = 1u32;
    if zeros > 0 {
        v = (v << zeros) | bs.read_bits(zeros)? as u32;
    }
    let u = v - 1;
    Ok(if u & 1 != 0 {
        ((u + 1) >> 1) as i32
    } else {
        -((u >> 1) as i32)
    })
}

// ---------------------------------------------------------------------------
// Code length computation
// ---------------------------------------------------------------------------

/// Plain Huffman code lengths for the present symbols; ties broken by node
/// index so the result is deterministic.
fn huffman_lengths(freqs: &[u64], lengths: &mut [u8]) {
    let k = freqs.len();
    debug_assert!(k >= 2);
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = BinaryHeap::with_capacity(2 * k);
    let mut parent = vec![usize::MAX; 2 * k - 1];
    for (i, &f) in freqs.iter().enumerate() {
        heap.push(Reverse((f, i)));
    }
    let mut next = k;
    while heap.len() > 1 {
        let Reverse((fa, a)) = heap.pop().unwrap();
        let Reverse((fb, b)) = heap.pop().unwrap();
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((fa + fb, next)));
        next += 1;
    }
    for i in 0..k {
        let mut depth = 0u8;
        let mut n = i;
        while parent[n] != usize::MAX {
            depth += 1;
            n = parent[n];
        }
        lengths[i] = depth;
    }
}

/// Lengths capped at `MAX_CODE_LEN`: halve frequencies and rebuild until
/// the deepest leaf fits.
fn limited_lengths(raw: &[u32], lengths: &mut [u8]) {
    let mut freqs: Vec<u64> = raw.iter().map(|&f| f as u64).collect();
    loop {
        huffman_lengths(&freqs, lengths);
        if lengths.iter().all(|&l| l as usize <= MAX_CODE_LEN) {
            return;
        }
        for f in freqs.iter_mut() {
            *f = (*f + 1) >> 1;
        }
    }
}

/// Assign canonical codes given lengths, ordered by (length, symbol).
fn canonical_codes(alphabet: &[usize], lengths: &[u8], codes: &mut [u32; 256]) {
    let mut order: Vec<usize> = (0..alphabet.len()).collect();
    order.sort_by_key(|&i| (lengths[i], alphabet[i]));
    let mut code = 0u32;
    let mut prev_len = lengths[order[0]];
    for (rank, &i) in order.iter().enumerate() {
        if rank > 0 {
            code = (code + 1) << (lengths[i] - prev_len);
            prev_len = lengths[i];
        }
        codes[alphabet[i]] = code;
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

impl EntropyEncoder for HuffmanCodec {
    fn encode(&mut self, bs: &mut StageWriter, block: &[u8]) -> Result<usize> {
        for chunk in block.chunks(CHUNK_SIZE) {
            let mut hist = [0u32; 256];
            for &b in chunk {
                hist[b as usize] += 1;
            }
            let alphabet: Vec<usize> = (0..256).filter(|&s| hist[s] > 0).collect();
            encode_alphabet(bs, &alphabet)?;
            if alphabet.len() == 1 {
                // Constant chunk: the alphabet alone reconstructs it.
                continue;
            }

            let raw: Vec<u32> = alphabet.iter().map(|&s| hist[s]).collect();
            let mut lengths = vec![0u8; alphabet.len()];
            limited_lengths(&raw, &mut lengths);

            let mut prev = 0i32;
            for &len in &lengths {
                write_exp_golomb(bs, len as i32 - prev)?;
                prev = len as i32;
            }

            let mut codes = [0u32; 256];
            canonical_codes(&alphabet, &lengths, &mut codes);
            let mut len_by_symbol = [0u8; 256];
            for (i, &s) in alphabet.iter().enumerate() {
                len_by_symbol[s] = lengths[i];
            }
            for &b in chunk {
                bs.write_bits(codes[b as usize] as u64, len_by_symbol[b as usize] as usize)?;
            }
        }
        Ok(block.len())
    }
}

impl EntropyDecoder for HuffmanCodec {
    fn decode(&mut self, bs: &mut StageReader, block: &mut [u8]) -> Result<usize> {
        let total = block.len();
        for chunk in block.chunks_mut(CHUNK_SIZE) {
            let alphabet = decode_alphabet(bs)?;
            if alphabet.is_empty() {
                return Err(Error::ProcessBlock("empty alphabet for non-empty chunk".to_string()));
            }
            if alphabet.len() == 1 {
                chunk.fill(alphabet[0] as u8);
                continue;
            }

            let mut lengths = vec![0u8; alphabet.len()];
            let mut prev = 0i32;
            for len in lengths.iter_mut() {
                let l = prev + read_exp_golomb(bs)?;
                if !(1..=MAX_CODE_LEN as i32).contains(&l) {
                    return Err(Error::ProcessBlock(format!("code length {}", l)));
                }
                *len = l as u8;
                prev = l;
            }

            // Canonical tables: per length, the first code and the start of
            // the symbol run in (length, symbol) order.
            let mut order: Vec<usize> = (0..alphabet.len()).collect();
            order.sort_by_key(|&i| (lengths[i], alphabet[i]));
            let mut count = [0u32; MAX_CODE_LEN + 1];
            for &i in &order {
                count[lengths[i] as usize] += 1;
            }
            let mut first_code = [0u32; MAX_CODE_LEN + 1];
            let mut first_rank = [0u32; MAX_CODE_LEN + 1];
            let mut code = 0u32;
            let mut rank = 0u32;
            for len in 1..=MAX_CODE_LEN {
                first_code[len] = code;
                first_rank[len] = rank;
                code = (code + count[len]) << 1;
                rank += count[len];
            }
            let symbols_in_order: Vec<u8> = order.iter().map(|&i| alphabet[i] as u8).collect();

            for out in chunk.iter_mut() {
                let mut code = 0u32;
                let mut len = 0usize;
                let sym = loop {
                    code = (code << 1) | bs.read_bit()? as u32;
                    len += 1;
                    if len > MAX_CODE_LEN {
                        return Err(Error::ProcessBlock("invalid canonical code".to_string()));
                    }
                    if count[len] > 0
                        && code >= first_code[len]
                        && code - first_code[len] < count[len]
                    {
                        break symbols_in_order[(first_rank[len] + code - first_code[len]) as usize];
                    }
                };
                *out = sym;
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
        let mut enc = HuffmanCodec::new();
        let mut bw = BitWriter::new(Vec::new());
        enc.encode(&mut bw, data).unwrap();
        bw.close().unwrap();
        let mut dec = HuffmanCodec::new();
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        let mut out = vec![0u8; data.len()];
        dec.decode(&mut br, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn exp_golomb_round_trips_deltas() {
        let mut bw = BitWriter::new(Vec::new());
        let deltas = [-14i32, -3, -1, 0, 1, 2, 7, 13];
        for &d in &deltas {
            write_exp_golomb(&mut bw, d).unwrap();
        }
        bw.close().unwrap();
        let mut br = BitReader::new(Cursor::new(bw.into_inner()));
        for &d in &deltas {
            assert_eq!(read_exp_golomb(&mut br).unwrap(), d);
        }
    }

    #[test]
    fn round_trips_text_and_binary() {
        round_trip(b"huffman coding huffman coding huffman");
        let ramp: Vec<u8> = (0..40_000).map(|i| (i % 256) as u8).collect();
        round_trip(&ramp);
    }

    #[test]
    fn round_trips_constant_chunk() {
        round_trip(&[9u8; 20_000]);
        round_trip(b"q");
    }

    #[test]
    fn round_trips_two_symbols() {
        let data: Vec<u8> = (0..9000).map(|i| if i % 5 == 0 { b'1' } else { b'0' }).collect();
        round_trip(&data);
    }

    #[test]
    fn skewed_frequencies_respect_length_cap() {
        // Exponential-ish frequency spread would want codes deeper than 14
        // bits without the cap.
        let mut raw = vec![1u32; 30];
        for (i, f) in raw.iter_mut().enumerate() {
            *f = 1u32 << (i.min(25));
        }
        let mut lengths = vec![0u8; raw.len()];
        limited_lengths(&raw, &mut lengths);
        assert!(lengths.iter().all(|&l| (1..=MAX_CODE_LEN as u8).contains(&l)));
    }

    #[test]
    fn compresses_english_like_text() {
        let data: Vec<u8> = b"the quick brown fox jumps over the lazy dog "
            .iter()
            .cycle()
            .take(30_000)
            .copied()
            .collect();
        let mut enc = HuffmanCodec::new();
        let mut bw = BitWriter::new(Vec::new());
        enc.encode(&mut bw, &data).unwrap();
        bw.close().unwrap();
        assert!(bw.written() / 8 < data.len() as u64 * 3 / 4);
    }
}
