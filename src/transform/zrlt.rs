//! Zero run-length codec.
//!
//! Zero runs become the binary digits of `run + 1` (leading 1 implied),
//! each digit occupying one output byte, so the 0/1 output values are left
//! for run digits only. Nonzero bytes shift up by one; 0xFE and 0xFF use a
//! two-byte escape.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_BLOCK_LEN: usize = 16;

pub struct ZrltCodec;

impl ZrltCodec {
    pub fn new() -> Self {
        ZrltCodec
    }
}

impl Default for ZrltCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteTransform for ZrltCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        if src.len() < MIN_BLOCK_LEN {
            return None;
        }
        // Zeros must be common enough to pay for the value shift.
        let zeros = src.iter().filter(|&&b| b == 0).count();
        if zeros < src.len() / 8 {
            return None;
        }
        let mut o = 0usize;
        let mut push = |dst: &mut [u8], o: &mut usize, b: u8| -> Option<()> {
            if *o >= dst.len() {
                return None;
            }
            dst[*o] = b;
            *o += 1;
            Some(())
        };
        let mut i = 0usize;
        while i < src.len() {
            let b = src[i];
            if b == 0 {
                let start = i;
                while i < src.len() && src[i] == 0 {
                    i += 1;
                }
                let v = (i - start) as u64 + 1; // >= 2
                let bits = 63 - v.leading_zeros();
                for k in (0..bits).rev() {
                    push(dst, &mut o, ((v >> k) & 1) as u8)?;
                }
                continue;
            }
            i += 1;
            if b >= 0xFE {
                push(dst, &mut o, 0xFF)?;
                push(dst, &mut o, b - 0xFE)?;
            } else {
                push(dst, &mut o, b + 1)?;
            }
        }
        if o >= src.len() {
            return None;
        }
        Some(o)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let overflow = || Error::ProcessBlock("zrlt inverse overflow".to_string());
        let mut o = 0usize;
        let mut i = 0usize;
        while i < src.len() {
            let b = src[i];
            if b <= 1 {
                let mut v = 1u64;
                while i < src.len() && src[i] <= 1 {
                    v = (v << 1) | src[i] as u64;
                    i += 1;
                    if v > (1 << 40) {
                        return Err(Error::ProcessBlock("zrlt run overflow".to_string()));
                    }
                }
                let run = (v - 1) as usize;
                if o + run > dst.len() {
                    return Err(overflow());
                }
                dst[o..o + run].fill(0);
                o += run;
                continue;
            }
            i += 1;
            let value = if b == 0xFF {
                let lo = *src
                    .get(i)
                    .ok_or_else(|| Error::ProcessBlock("truncated zrlt escape".to_string()))?;
                i += 1;
                if lo > 1 {
                    return Err(Error::ProcessBlock("bad zrlt escape".to_string()));
                }
                0xFE + lo
            } else {
                b - 1
            };
            if o >= dst.len() {
                return Err(overflow());
            }
            dst[o] = value;
            o += 1;
        }
        Ok(o)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
