//! UTF-8 alias codec.
//!
//! Valid UTF-8 with a small set of distinct multi-byte scalars (at most
//! 128) is recoded with one-byte aliases: ASCII passes through unchanged
//! below 0x80, and byte `0x80 | k` stands for the k-th dictionary entry.
//! The dictionary is serialized up front as plain UTF-8 sequences, which
//! are self-delimiting.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_BLOCK_LEN: usize = 64;
const MAX_DICT: usize = 128;

pub struct UtfCodec;

impl UtfCodec {
    pub fn new() -> Self {
        UtfCodec
    }
}

impl Default for UtfCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn utf8_len(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC0..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF7 => Some(4),
        _ => None,
    }
}

impl ByteTransform for UtfCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        std::str::from_utf8(src).ok()?;

        // Dictionary in first-occurrence order, body in one pass.
        let mut entries: Vec<[u8; 4]> = Vec::new();
        let mut lens: Vec<usize> = Vec::new();
        let mut body: Vec<u8> = Vec::with_capacity(n);
        let mut i = 0usize;
        while i < n {
            let l = utf8_len(src[i])?;
            if l == 1 {
                body.push(src[i]);
                i += 1;
                continue;
            }
            let seq = &src[i..i + l];
            let k = match entries
                .iter()
                .zip(lens.iter())
                .position(|(e, &el)| &e[..el] == seq)
            {
                Some(k) => k,
                None => {
                    if entries.len() == MAX_DICT {
                        return None;
                    }
                    let mut a = [0u8; 4];
                    a[..l].copy_from_slice(seq);
                    entries.push(a);
                    lens.push(l);
                    entries.len() - 1
                }
            };
            body.push(0x80 | k as u8);
            i += l;
        }
        if entries.is_empty() {
            return None; // nothing to alias
        }

        // Header: entry count, then the raw UTF-8 of each entry.
        let header_len = 1 + lens.iter().sum::<usize>();
        let total = header_len + body.len();
        if total >= n || total > dst.len() {
            return None;
        }
        let mut o = 0usize;
        dst[o] = entries.len() as u8;
        o += 1;
        for (e, &l) in entries.iter().zip(lens.iter()) {
            dst[o..o + l].copy_from_slice(&e[..l]);
            o += l;
        }
        dst[o..o + body.len()].copy_from_slice(&body);
        Some(total)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt utf stream".to_string());
        let mut i = 0usize;
        let count = *src.get(i).ok_or_else(corrupt)? as usize;
        i += 1;
        if count > MAX_DICT {
            return Err(corrupt());
        }
        let mut entries: Vec<(usize, usize)> = Vec::with_capacity(count); // (offset, len)
        for _ in 0..count {
            let lead = *src.get(i).ok_or_else(corrupt)?;
            let l = utf8_len(lead).ok_or_else(corrupt)?;
            if l < 2 || i + l > src.len() {
                return Err(corrupt());
            }
            entries.push((i, l));
            i += l;
        }
        let mut o = 0usize;
        while i < src.len() {
            let b = src[i];
            i += 1;
            if b < 0x80 {
                if o >= dst.len() {
                    return Err(Error::ProcessBlock("utf inverse overflow".to_string()));
                }
                dst[o] = b;
                o += 1;
            } else {
                let k = (b & 0x7F) as usize;
                let (off, l) = *entries.get(k).ok_or_else(corrupt)?;
                if o + l > dst.len() {
                    return Err(Error::ProcessBlock("utf inverse overflow".to_string()));
                }
                dst[o..o + l].copy_from_slice(&src[off..off + l]);
                o += l;
            }
        }
        Ok(o)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
