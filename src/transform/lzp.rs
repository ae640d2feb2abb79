//! LZP codec: order-4 context prediction with an escape byte.
//!
//! A hash of the last four bytes predicts the match position. When the
//! table has a prediction, an escape byte introduces either a match length
//! or a doubled literal escape; when it has none, bytes pass through raw.
//! Encoder and decoder maintain the identical table (keyed on identical
//! data), so no positions are transmitted.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const HASH_LOG: usize = 16;
const MIN_MATCH: usize = 4;
const MIN_BLOCK_LEN: usize = 24;
/// Length header: 0 = literal escape, 1..=254 direct, 255 = 2-byte BE add-on.
const LEN_DIRECT_MAX: usize = 254;
const MAX_MATCH: usize = MIN_MATCH - 1 + LEN_DIRECT_MAX + 65535;

pub struct LzpCodec;

impl LzpCodec {
    pub fn new() -> Self {
        LzpCodec
    }

    fn pick_escape(src: &[u8]) -> u8 {
        let mut freqs = [0u32; 256];
        for &b in src {
            freqs[b as usize] += 1;
        }
        let mut best = 0usize;
        for s in 1..256 {
            if freqs[s] < freqs[best] {
                best = s;
            }
        }
        best as u8
    }
}

impl Default for LzpCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn ctx_hash(src: &[u8], i: usize) -> usize {
    let v = u32::from_le_bytes(src[i - 4..i].try_into().unwrap());
    (v.wrapping_mul(2654435761) >> (32 - HASH_LOG)) as usize
}

impl ByteTransform for LzpCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        let escape = Self::pick_escape(src);
        let mut table = vec![0u32; 1 << HASH_LOG]; // 0 = no entry (positions start at 4)
        let mut o = 0usize;
        let mut push = |dst: &mut [u8], o: &mut usize, b: u8| -> Option<()> {
            if *o >= dst.len() {
                return None;
            }
            dst[*o] = b;
            *o += 1;
            Some(())
        };
        push(dst, &mut o, escape)?;
        for k in 0..MIN_MATCH {
            push(dst, &mut o, src[k])?;
        }
        let mut i = MIN_MATCH;
        while i < n {
            let h = ctx_hash(src, i);
            let pos = table[h] as usize;
            table[h] = i as u32;
            if pos > 0 {
                let mut l = 0usize;
                let max = (n - i).min(MAX_MATCH);
                while l < max && src[pos + l] == src[i + l] {
                    l += 1;
                }
                if l >= MIN_MATCH {
                    push(dst, &mut o, escape)?;
                    let v = l - MIN_MATCH + 1; // >= 1
                    if v <= LEN_DIRECT_MAX {
                        push(dst, &mut o, v as u8)?;
                    } else {
                        let extra = v - LEN_DIRECT_MAX - 1;
                        push(dst, &mut o, 255)?;
                        push(dst, &mut o, (extra >> 8) as u8)?;
                        push(dst, &mut o, (extra & 0xFF) as u8)?;
                    }
                    i += l;
                    continue;
                }
                // Predicted but unmatched: the literal needs escaping.
                let b = src[i];
                push(dst, &mut o, b)?;
                if b == escape {
                    push(dst, &mut o, 0)?;
                }
                i += 1;
            } else {
                // No prediction: raw literal, decoder agrees.
                push(dst, &mut o, src[i])?;
                i += 1;
            }
        }
        if o >= n {
            return None;
        }
        Some(o)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt lzp stream".to_string());
        if src.len() < 1 + MIN_MATCH {
            return Err(corrupt());
        }
        let escape = src[0];
        let mut table = vec![0u32; 1 << HASH_LOG];
        if dst.len() < MIN_MATCH {
            return Err(corrupt());
        }
        dst[..MIN_MATCH].copy_from_slice(&src[1..1 + MIN_MATCH]);
        let mut i = 1 + MIN_MATCH;
        let mut o = MIN_MATCH;
        while i < src.len() {
            if o + 1 > dst.len() {
                return Err(Error::ProcessBlock("lzp inverse overflow".to_string()));
            }
            let h = ctx_hash(dst, o);
            let pos = table[h] as usize;
            table[h] = o as u32;
            let b = src[i];
            i += 1;
            if pos > 0 {
                if b == escape {
                    let hdr = *src.get(i).ok_or_else(corrupt)? as usize;
                    i += 1;
                    if hdr == 0 {
                        dst[o] = escape;
                        o += 1;
                        continue;
                    }
                    let v = if hdr < 255 {
                        hdr
                    } else {
                        let hi = *src.get(i).ok_or_else(corrupt)? as usize;
                        let lo = *src.get(i + 1).ok_or_else(corrupt)? as usize;
                        i += 2;
                        LEN_DIRECT_MAX + 1 + ((hi << 8) | lo)
                    };
                    let l = v + MIN_MATCH - 1;
                    if o + l > dst.len() {
                        return Err(Error::ProcessBlock("lzp inverse overflow".to_string()));
                    }
                    for k in 0..l {
                        dst[o + k] = dst[pos + k];
                    }
                    o += l;
                    continue;
                }
                dst[o] = b;
                o += 1;
            } else {
                dst[o] = b;
                o += 1;
            }
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

    fn round_trip(data: &[u8]) -> Option<usize> {
        let mut t = LzpCodec::new();
        let mut buf = vec![0u8; t.max_encoded_len(data.len())];
        let n = t.forward(&ctx(), data, &mut buf)?;
        buf.truncate(n);
        let mut out = vec![0u8; data.len()];
        let m = LzpCodec::new().inverse(&ctx(), &buf, &mut out).unwrap();
        out.truncate(m);
        assert_eq!(out, data);
        Some(n)
    }

    #[test]
    fn round_trips_repetitive_phrases() {
        let data: Vec<u8> = b"predict the next phrase, predict the next phrase, "
            .iter()
            .cycle()
            .take(20_000)
            .copied()
            .collect();
        let n = round_trip(&data).expect("must compress");
        assert!(n < data.len() / 2);
    }

    #[test]
    fn round_trips_long_runs_hitting_length_extension() {
        let mut data = b"prefix--".to_vec();
        data.extend(std::iter::repeat(b'R').take(70_000));
        data.extend_from_slice(b"--suffix");
        round_trip(&data).expect("must compress");
    }

    #[test]
    fn round_trips_with_escape_collisions() {
        // Make every byte value appear so the escape also appears in data.
        let mut data: Vec<u8> = (0u8..=255).collect();
        let rep = data.clone();
        for _ in 0..40 {
            data.extend_from_slice(&rep);
        }
        round_trip(&data).expect("must compress");
    }

    #[test]
    fn declines_short_input() {
        let mut t = LzpCodec::new();
        let mut buf = vec![0u8; 64];
        assert!(t.forward(&ctx(), b"tiny input here", &mut buf).is_none());
    }
}
