//! Word-dictionary text codec.
//!
//! Two passes: collect the frequency of every `[A-Za-z]{2,32}` word, keep
//! the ones whose repetitions pay for a dictionary entry, then rewrite the
//! text with `escape + varint(index+1)` at each occurrence (`escape +
//! varint(0)` doubles a literal escape byte). The dictionary rides in the
//! header, so the decoder does no tokenizing of its own.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};
use crate::util::magic::DataType;

const MIN_BLOCK_LEN: usize = 128;
const MIN_WORD_LEN: usize = 2;
const MAX_WORD_LEN: usize = 32;
const MAX_DICT: usize = 4096;

pub struct TextCodec;

impl TextCodec {
    pub fn new() -> Self {
        TextCodec
    }

    fn looks_textual(ctx: &BlockContext, src: &[u8]) -> bool {
        if matches!(ctx.data_type, DataType::Text | DataType::Utf8) {
            return true;
        }
        let sample = &src[..src.len().min(4096)];
        let printable = sample
            .iter()
            .filter(|&&b| (0x20..0x7F).contains(&b) || b == b'\n' || b == b'\r' || b == b'\t')
            .count();
        printable * 4 >= sample.len() * 3
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

impl Default for TextCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn is_letter(b: u8) -> bool {
    b.is_ascii_alphabetic()
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

/// Iterate maximal letter runs as (start, end) pairs.
fn words(src: &[u8]) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut i = 0usize;
    std::iter::from_fn(move || {
        while i < src.len() && !is_letter(src[i]) {
            i += 1;
        }
        if i >= src.len() {
            return None;
        }
        let start = i;
        while i < src.len() && is_letter(src[i]) {
            i += 1;
        }
        Some((start, i))
    })
}

impl ByteTransform for TextCodec {
    fn forward(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN || !Self::looks_textual(ctx, src) {
            return None;
        }
        let escape = Self::pick_escape(src);

        // Pass 1: frequencies, first-occurrence order.
        let mut counts: HashMap<&[u8], u32> = HashMap::new();
        let mut order: Vec<&[u8]> = Vec::new();
        for (start, end) in words(src) {
            let len = end - start;
            if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) {
                continue;
            }
            let w = &src[start..end];
            let c = counts.entry(w).or_insert(0);
            if *c == 0 {
                order.push(w);
            }
            *c += 1;
        }
        // Keep words whose replacements save more than their header cost.
        // An occurrence costs ~1 escape + 2 varint bytes, the header costs
        // len + 1.
        let mut dict: Vec<&[u8]> = Vec::new();
        let mut index: HashMap<&[u8], usize> = HashMap::new();
        for w in order {
            let c = counts[w] as usize;
            let saved = c.saturating_mul(w.len().saturating_sub(3));
            if c >= 2 && saved > w.len() + 2 {
                index.insert(w, dict.len());
                dict.push(w);
                if dict.len() == MAX_DICT {
                    break;
                }
            }
        }
        if dict.is_empty() {
            return None;
        }

        // Header: escape, dict size, entries as (len byte, letters).
        let mut out: Vec<u8> = Vec::with_capacity(n);
        out.push(escape);
        push_varint(&mut out, dict.len() as u64);
        for w in &dict {
            out.push(w.len() as u8);
            out.extend_from_slice(w);
        }

        // Pass 2: rewrite.
        let mut i = 0usize;
        let mut word_iter = words(src).peekable();
        while i < n {
            if let Some(&(start, end)) = word_iter.peek() {
                if start == i {
                    word_iter.next();
                    let w = &src[start..end];
                    if let Some(&k) = index.get(w) {
                        out.push(escape);
                        push_varint(&mut out, k as u64 + 1);
                        i = end;
                        continue;
                    }
                    // Unlisted word: copy letters (letters are never the
                    // escape candidate's problem, but stay uniform).
                    for &b in w {
                        out.push(b);
                        if b == escape {
                            out.push(0);
                        }
                    }
                    i = end;
                    continue;
                }
                if start < i {
                    word_iter.next();
                    continue;
                }
            }
            let b = src[i];
            out.push(b);
            if b == escape {
                push_varint(&mut out, 0);
            }
            i += 1;
            if out.len() >= n {
                return None;
            }
        }
        if out.len() >= n || out.len() > dst.len() {
            return None;
        }
        dst[..out.len()].copy_from_slice(&out);
        Some(out.len())
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt text stream".to_string());
        let overflow = || Error::ProcessBlock("text inverse overflow".to_string());
        let mut i = 0usize;
        let escape = *src.get(i).ok_or_else(corrupt)?;
        i += 1;
        let count = take_varint(src, &mut i).ok_or_else(corrupt)? as usize;
        if count == 0 || count > MAX_DICT {
            return Err(corrupt());
        }
        let mut entries: Vec<(usize, usize)> = Vec::with_capacity(count);
        for _ in 0..count {
            let len = *src.get(i).ok_or_else(corrupt)? as usize;
            i += 1;
            if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) || i + len > src.len() {
                return Err(corrupt());
            }
            entries.push((i, len));
            i += len;
        }
        let mut o = 0usize;
        while i < src.len() {
            let b = src[i];
            i += 1;
            if b != escape {
                if o >= dst.len() {
                    return Err(overflow());
                }
                dst[o] = b;
                o += 1;
                continue;
            }
            let v = take_varint(src, &mut i).ok_or_else(corrupt)? as usize;
            if v == 0 {
                if o >= dst.len() {
                    return Err(overflow());
                }
                dst[o] = escape;
                o += 1;
                continue;
            }
            let (off, len) = *entries.get(v - 1).ok_or_else(corrupt)?;
            if o + len > dst.len() {
                return Err(overflow());
            }
            dst[o..o + len].copy_from_slice(&src[off..off + len]);
            o += len;
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
        let mut t = TextCodec::new();
        let mut buf = vec![0u8; t.max_encoded_len(data.len())];
        let n = t.forward(&ctx(), data, &mut buf)?;
        buf.truncate(n);
        let mut out = vec![0u8; data.len()];
        let m = TextCodec::new().inverse(&ctx(), &buf, &mut out).unwrap();
        out.truncate(m);
        assert_eq!(out, data);
        Some(n)
    }

    #[test]
    fn repeated_words_shrink() {
        let text = "the compression ratio depends on the dictionary and the escape handling. "
            .repeat(50);
        let n = round_trip(text.as_bytes()).expect("must compress");
        assert!(n < text.len() * 3 / 4);
    }

    #[test]
    fn words_longer_than_cap_pass_through() {
        let long_word = "a".repeat(40);
        let text = format!("{} {} {} stop and stop and stop and stop", long_word, long_word, long_word).repeat(8);
        round_trip(text.as_bytes()).expect("must compress");
    }

    #[test]
    fn escape_bytes_in_text_round_trip() {
        // Force many distinct bytes so the escape lands on a value that
        // actually occurs.
        let mut text = Vec::new();
        for _ in 0..30 {
            text.extend_from_slice(b"repeat repeat repeat repeat repeat repeat ");
            text.extend((0u8..=255).filter(|b| !b.is_ascii_alphabetic()));
        }
        let _ = round_trip(&text);
    }

    #[test]
    fn declines_binary_data() {
        let data: Vec<u8> = (0..2048u32).map(|i| (i * 251 % 256) as u8).collect();
        let mut t = TextCodec::new();
        let mut buf = vec![0u8; data.len()];
        assert!(t.forward(&ctx(), &data, &mut buf).is_none());
    }

    #[test]
    fn declines_unique_word_text() {
        let mut text = String::new();
        for i in 0..200 {
            text.push_str(&format!("w{:05} ", i * 7919));
        }
        let mut t = TextCodec::new();
        let mut buf = vec![0u8; text.len()];
        assert!(t.forward(&ctx(), text.as_bytes(), &mut buf).is_none());
    }
}
