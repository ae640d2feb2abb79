//! Small-alphabet bit packing.
//!
//! Blocks drawing on at most 16 distinct byte values are repacked at 1, 2
//! or 4 bits per symbol behind a header carrying the symbol map and the
//! original length.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_BLOCK_LEN: usize = 64;
const MAX_SYMBOLS: usize = 16;

pub struct PackTransform;

impl PackTransform {
    pub fn new() -> Self {
        PackTransform
    }
}

impl Default for PackTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn width_for(count: usize) -> usize {
    match count {
        0..=2 => 1,
        3..=4 => 2,
        _ => 4,
    }
}

fn push_varint(out: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        out.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn take_varint(src: &[u8], i: &mut usize) -> Option<u64> {
    let mut v = 0u64;
    let mut shift = 0u32;
    loop {
        let b = *src.get(*i)?;
        *i += 1;
        v |= ((b & 0x7F) as u64) << shift;
        if b < 0x80 {
            return Some(v);
        }
        shift += 7;
        if shift > 63 {
            return None;
        }
    }
}

impl ByteTransform for PackTransform {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        let mut present = [false; 256];
        let mut map = [0u8; 256];
        let mut symbols: Vec<u8> = Vec::new();
        for &b in src {
            if !present[b as usize] {
                present[b as usize] = true;
                if symbols.len() == MAX_SYMBOLS {
                    return None;
                }
                symbols.push(b);
            }
        }
        symbols.sort_unstable();
        for (i, &s) in symbols.iter().enumerate() {
            map[s as usize] = i as u8;
        }
        let width = width_for(symbols.len());

        let mut header = Vec::with_capacity(symbols.len() + 6);
        header.push(symbols.len() as u8);
        header.extend_from_slice(&symbols);
        push_varint(&mut header, n as u64);
        let body_len = (n * width + 7) / 8;
        let total = header.len() + body_len;
        if total >= n || total > dst.len() {
            return None;
        }
        dst[..header.len()].copy_from_slice(&header);
        let body = &mut dst[header.len()..total];
        body.fill(0);
        let mut bitpos = 0usize;
        for &b in src {
            let code = map[b as usize] as usize;
            let byte = bitpos / 8;
            let off = bitpos % 8;
            body[byte] |= (code << (8 - width - off)) as u8;
            bitpos += width;
        }
        Some(total)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt pack stream".to_string());
        let mut i = 0usize;
        let count = *src.get(i).ok_or_else(corrupt)? as usize;
        i += 1;
        if count == 0 || count > MAX_SYMBOLS || i + count > src.len() {
            return Err(corrupt());
        }
        let symbols = &src[i..i + count];
        i += count;
        let n = take_varint(src, &mut i).ok_or_else(corrupt)? as usize;
        if n > dst.len() {
            return Err(Error::ProcessBlock("pack inverse overflow".to_string()));
        }
        let width = width_for(count);
        let body = &src[i..];
        if body.len() < (n * width + 7) / 8 {
            return Err(corrupt());
        }
        let mask = (1usize << width) - 1;
        let mut bitpos = 0usize;
        for slot in dst[..n].iter_mut() {
            let byte = bitpos / 8;
            let off = bitpos % 8;
            let code = (body[byte] as usize >> (8 - width - off)) & mask;
            if code >= count {
                return Err(corrupt());
            }
            *slot = symbols[code];
            bitpos += width;
        }
        Ok(n)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
