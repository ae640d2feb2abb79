//! Byte-oriented LZ77 codec (LZ and LZX).
//!
//! Sequence format: a token byte whose high nibble is the literal count and
//! low nibble the match length minus the 4-byte minimum (15 in either
//! nibble chains 255-extension bytes), the literals, a 2-byte little-endian
//! match offset, then the match extension bytes. The final sequence is
//! literals only. LZX uses the same format with a deeper chained match
//! search.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_MATCH: usize = 4;
const MAX_OFFSET: usize = 65535;
const HASH_LOG: usize = 16;
const HASH_SHIFT: u32 = 32 - HASH_LOG as u32;
const MIN_BLOCK_LEN: usize = 16;
/// Probe depth for the chained search in LZX mode.
const DEEP_ATTEMPTS: usize = 16;

pub struct LzCodec {
    deep: bool,
}

impl LzCodec {
    pub fn new(deep: bool) -> Self {
        LzCodec { deep }
    }
}

#[inline]
fn hash4(v: u32) -> usize {
    (v.wrapping_mul(2654435761) >> HASH_SHIFT) as usize
}

#[inline]
fn read_u32(src: &[u8], i: usize) -> u32 {
    u32::from_le_bytes(src[i..i + 4].try_into().unwrap())
}

struct Emitter<'a> {
    dst: &'a mut [u8],
    idx: usize,
}

impl<'a> Emitter<'a> {
    #[inline]
    fn push(&mut self, b: u8) -> Option<()> {
        if self.idx >= self.dst.len() {
            return None;
        }
        self.dst[self.idx] = b;
        self.idx += 1;
        Some(())
    }

    fn push_len_extension(&mut self, mut v: usize) -> Option<()> {
        loop {
            if v < 255 {
                return self.push(v as u8);
            }
            self.push(255)?;
            v -= 255;
        }
    }

    fn push_sequence(
        &mut self,
        literals: &[u8],
        match_len: usize,
        offset: usize,
    ) -> Option<()> {
        let lit_nibble = literals.len().min(15);
        let match_nibble = if match_len == 0 {
            0
        } else {
            (match_len - MIN_MATCH).min(15)
        };
        self.push(((lit_nibble << 4) | match_nibble) as u8)?;
        if lit_nibble == 15 {
            self.push_len_extension(literals.len() - 15)?;
        }
        for &b in literals {
            self.push(b)?;
        }
        if match_len > 0 {
            self.push((offset & 0xFF) as u8)?;
            self.push((offset >> 8) as u8)?;
            if match_nibble == 15 {
                self.push_len_extension(match_len - MIN_MATCH - 15)?;
            }
        }
        Some(())
    }
}

#[inline]
fn match_length(src: &[u8], a: usize, b: usize, limit: usize) -> usize {
    let mut l = 0;
    while b + l < limit && src[a + l] == src[b + l] {
        l += 1;
    }
    l
}

impl ByteTransform for LzCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        let mut e = Emitter { dst, idx: 0 };
        let mut head = vec![u32::MAX; 1 << HASH_LOG];
        // Chain links for the deep search, indexed by position.
        let mut chain = if self.deep {
            vec![u32::MAX; n]
        } else {
            Vec::new()
        };
        let mut anchor = 0usize;
        let mut i = 0usize;
        let limit = n.saturating_sub(MIN_MATCH);
        while i < limit {
            let h = hash4(read_u32(src, i));
            let mut best_len = 0usize;
            let mut best_pos = 0usize;
            let mut candidate = head[h];
            let mut attempts = if self.deep { DEEP_ATTEMPTS } else { 1 };
            while candidate != u32::MAX && attempts > 0 {
                let c = candidate as usize;
                if i - c <= MAX_OFFSET {
                    let l = match_length(src, c, i, n);
                    if l > best_len {
                        best_len = l;
                        best_pos = c;
                    }
                } else {
                    break;
                }
                if !self.deep {
                    break;
                }
                candidate = chain[c];
                attempts -= 1;
            }
            if self.deep {
                chain[i] = head[h];
            }
            head[h] = i as u32;
            if best_len >= MIN_MATCH {
                e.push_sequence(&src[anchor..i], best_len, i - best_pos)?;
                i += best_len;
                anchor = i;
            } else {
                i += 1;
            }
        }
        // Trailing literals.
        if anchor < n {
            e.push_sequence(&src[anchor..n], 0, 0)?;
        } else {
            // A block ending exactly on a match still needs a terminal
            // token so the decoder sees the end.
            e.push_sequence(&[], 0, 0)?;
        }
        if e.idx >= n {
            return None;
        }
        Some(e.idx)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt lz stream".to_string());
        let mut i = 0usize;
        let mut o = 0usize;
        while i < src.len() {
            let token = src[i];
            i += 1;
            let mut lit_len = (token >> 4) as usize;
            if lit_len == 15 {
                loop {
                    let b = *src.get(i).ok_or_else(corrupt)?;
                    i += 1;
                    lit_len += b as usize;
                    if b != 255 {
                        break;
                    }
                }
            }
            if i + lit_len > src.len() || o + lit_len > dst.len() {
                return Err(corrupt());
            }
            dst[o..o + lit_len].copy_from_slice(&src[i..i + lit_len]);
            i += lit_len;
            o += lit_len;
            if i >= src.len() {
                break; // terminal literal-only sequence
            }
            let offset = {
                let lo = *src.get(i).ok_or_else(corrupt)? as usize;
                let hi = *src.get(i + 1).ok_or_else(corrupt)? as usize;
                i += 2;
                (hi << 8) | lo
            };
            let mut match_len = (token & 0x0F) as usize + MIN_MATCH;
            if token & 0x0F == 15 {
                loop {
                    let b = *src.get(i).ok_or_else(corrupt)?;
                    i += 1;
                    match_len += b as usize;
                    if b != 255 {
                        break;
                    }
                }
            }
            if offset == 0 || offset > o || o + match_len > dst.len() {
                return Err(corrupt());
            }
            // Overlapping copy: must go byte by byte.
            for k in 0..match_len {
                dst[o + k] = dst[o - offset + k];
            }
            o += match_len;
        }
        Ok(o)
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

    fn round_trip(deep: bool, data: &[u8]) -> Option<usize> {
        let mut t = LzCodec::new(deep);
        let mut buf = vec![0u8; t.max_encoded_len(data.len())];
        let n = t.forward(&ctx(), data, &mut buf)?;
        buf.truncate(n);
        let mut out = vec![0u8; data.len()];
        let m = LzCodec::new(deep).inverse(&ctx(), &buf, &mut out).unwrap();
        out.truncate(m);
        assert_eq!(out, data);
        Some(n)
    }

    #[test]
    fn round_trips_repetitive_text() {
        for deep in [false, true] {
            let data: Vec<u8> = b"compress me, compress me again and again "
                .iter()
                .cycle()
                .take(10_000)
                .copied()
                .collect();
            let n = round_trip(deep, &data).expect("must compress");
            assert!(n < data.len() / 3);
        }
    }

    #[test]
    fn round_trips_overlapping_matches() {
        // Single repeated byte forces offset-1 overlapping copies.
        for deep in [false, true] {
            round_trip(deep, &[9u8; 5000]).expect("run must compress");
        }
    }

    #[test]
    fn round_trips_block_ending_on_match() {
        let mut data = b"0123456789abcdef".to_vec();
        let tail = data.clone();
        data.extend_from_slice(&tail);
        data.extend_from_slice(&tail);
        round_trip(false, &data).expect("must compress");
    }

    #[test]
    fn round_trips_long_literal_and_match_extensions() {
        // > 15 literals then a long match to exercise both extensions.
        let mut data: Vec<u8> = (0u8..=255).collect();
        let rep: Vec<u8> = data.clone();
        for _ in 0..8 {
            data.extend_from_slice(&rep);
        }
        round_trip(false, &data).expect("must compress");
    }

    #[test]
    fn declines_on_incompressible_input() {
        // A permutation-ish sequence with no 4-byte repeats.
        let data: Vec<u8> = (0..2048u32)
            .flat_map(|i| (i.wrapping_mul(2654435761) ^ 0xA5A5).to_le_bytes())
            .collect();
        let mut t = LzCodec::new(false);
        let mut buf = vec![0u8; t.max_encoded_len(data.len())];
        assert!(t.forward(&ctx(), &data, &mut buf).is_none());
    }

    #[test]
    fn both_search_depths_compress_cyclic_data() {
        let data: Vec<u8> = b"abcabdabcabeabcabdabcabf"
            .iter()
            .cycle()
            .take(6000)
            .copied()
            .collect();
        let shallow = round_trip(false, &data).unwrap();
        let deep = round_trip(true, &data).unwrap();
        assert!(shallow < data.len() / 2);
        assert!(deep < data.len() / 2);
    }

    #[test]
    fn inverse_rejects_bad_offset() {
        // Token demanding a match before the start of output.
        let stream = [0x04u8, b'a', b'b', b'c', b'd', 0x10, 0x00];
        let mut out = vec![0u8; 64];
        assert!(LzCodec::new(false).inverse(&ctx(), &stream, &mut out).is_err());
    }
}
