//! Nucleotide packing: 2 bits per base for pure ACGT payloads.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_BLOCK_LEN: usize = 64;
const UPPER: [u8; 4] = *b"ACGT";
const LOWER: [u8; 4] = *b"acgt";

pub struct DnaCodec;

impl DnaCodec {
    pub fn new() -> Self {
        DnaCodec
    }
}

impl Default for DnaCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn base_code(alphabet: &[u8; 4], b: u8) -> Option<usize> {
    alphabet.iter().position(|&a| a == b)
}

impl ByteTransform for DnaCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        let alphabet = match src[0] {
            b if UPPER.contains(&b) => &UPPER,
            b if LOWER.contains(&b) => &LOWER,
            _ => return None,
        };
        let lower = alphabet == &LOWER;
        let body_len = (n * 2 + 7) / 8;
        // 1 flag byte + 4-byte length + body
        let total = 5 + body_len;
        if total >= n || total > dst.len() {
            return None;
        }
        dst[0] = lower as u8;
        dst[1..5].copy_from_slice(&(n as u32).to_be_bytes());
        let body = &mut dst[5..total];
        body.fill(0);
        for (i, &b) in src.iter().enumerate() {
            let code = base_code(alphabet, b)?;
            body[i / 4] |= (code << (6 - 2 * (i % 4))) as u8;
        }
        Some(total)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt dna stream".to_string());
        if src.len() < 5 || src[0] > 1 {
            return Err(corrupt());
        }
        let alphabet = if src[0] == 1 { &LOWER } else { &UPPER };
        let n = u32::from_be_bytes(src[1..5].try_into().unwrap()) as usize;
        if n > dst.len() {
            return Err(Error::ProcessBlock("dna inverse overflow".to_string()));
        }
        let body = &src[5..];
        if body.len() < (n * 2 + 7) / 8 {
            return Err(corrupt());
        }
        for (i, slot) in dst[..n].iter_mut().enumerate() {
            let code = (body[i / 4] >> (6 - 2 * (i % 4))) & 3;
            *slot = alphabet[code as usize];
        }
        Ok(n)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BlockContext {
        BlockContext::default()
    }

    #[test]
    fn packs_pure_sequences_both_cases() {
        for alphabet in [&UPPER, &LOWER] {
            let data: Vec<u8> = (0..4001).map(|i| alphabet[(i * 3) % 4]).collect();
            let mut t = DnaCodec::new();
            let mut buf = vec![0u8; data.len()];
            let n = t.forward(&ctx(), &data, &mut buf).expect("must pack");
            assert!(n <= data.len() / 4 + 8);
            buf.truncate(n);
            let mut out = vec![0u8; data.len()];
            let m = DnaCodec::new().inverse(&ctx(), &buf, &mut out).unwrap();
            out.truncate(m);
            assert_eq!(out, data);
        }
    }

    #[test]
    fn declines_mixed_case_and_non_nucleotides() {
        let mut t = DnaCodec::new();
        let mut buf = vec![0u8; 4096];
        let mixed: Vec<u8> = b"ACGTacgt".iter().cycle().take(1024).copied().collect();
        assert!(t.forward(&ctx(), &mixed, &mut buf).is_none());
        let text = vec![b'E'; 1024];
        assert!(t.forward(&ctx(), &text, &mut buf).is_none());
    }
}
