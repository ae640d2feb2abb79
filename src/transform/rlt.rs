//! Run-length codec with a dynamically chosen escape byte.
//!
//! Runs longer than the threshold are replaced by `escape` plus a 1..3 byte
//! run-length extension; literal occurrences of the escape byte are doubled
//! as `escape, 0`. The escape is the least frequent byte of the block (ties
//! to the smallest value), so escape doubling stays rare.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};
use crate::util::magic::DataType;

const RUN_THRESHOLD: usize = 3;
/// One-byte extension ceiling: `v` in `[1, 223]`.
const RUN_LEN_ENCODE1: usize = 224;
/// Two-byte extension ceiling: `v` in `[224, 6943]`.
const RUN_LEN_ENCODE2: usize = 6944;
/// Largest encodable extra-run value: three-byte extension.
const MAX_RUN_VALUE: usize = 65534 + RUN_LEN_ENCODE2;
const MIN_BLOCK_LEN: usize = 16;

pub struct RltCodec;

impl RltCodec {
    pub fn new() -> Self {
        RltCodec
    }

    /// Least frequent byte value, ties broken by smallest value.
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

impl Default for RltCodec {
    fn default() -> Self {
        Self::new()
    }
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
}

/// Append the 1..3 byte encoding of `v = run - RUN_THRESHOLD` (`v >= 1`).
fn emit_run_value(e: &mut Emitter<'_>, v: usize) -> Option<()> {
    if v < RUN_LEN_ENCODE1 {
        e.push(v as u8)
    } else if v < RUN_LEN_ENCODE2 {
        let x = v - RUN_LEN_ENCODE1;
        e.push((RUN_LEN_ENCODE1 + (x >> 8)) as u8)?;
        e.push((x & 0xFF) as u8)
    } else {
        let x = v - RUN_LEN_ENCODE2;
        e.push(0xFF)?;
        e.push((x >> 8) as u8)?;
        e.push((x & 0xFF) as u8)
    }
}

impl ByteTransform for RltCodec {
    fn forward(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        if src.len() < MIN_BLOCK_LEN {
            return None;
        }
        if matches!(ctx.data_type, DataType::Dna | DataType::Base64 | DataType::Utf8) {
            return None;
        }
        let escape = Self::pick_escape(src);
        let mut e = Emitter { dst, idx: 0 };

        e.push(escape)?;
        let first = src[0];
        e.push(first)?;
        if first == escape {
            e.push(0)?;
        }

        let mut prev = first;
        // Extra repeats of `prev` beyond the copy already emitted.
        let mut run = 0usize;
        let mut emit_pending = |e: &mut Emitter<'_>, prev: u8, run: &mut usize| -> Option<()> {
            if *run == 0 {
                return Some(());
            }
            if *run > RUN_THRESHOLD {
                e.push(escape)?;
                emit_run_value(e, *run - RUN_THRESHOLD)?;
            } else {
                for _ in 0..*run {
                    e.push(prev)?;
                    if prev == escape {
                        e.push(0)?;
                    }
                }
            }
            *run = 0;
            Some(())
        };

        for &cur in &src[1..] {
            if cur == prev {
                run += 1;
                if run == MAX_RUN_VALUE + RUN_THRESHOLD {
                    emit_pending(&mut e, prev, &mut run)?;
                }
                continue;
            }
            emit_pending(&mut e, prev, &mut run)?;
            prev = cur;
            e.push(prev)?;
            if prev == escape {
                e.push(0)?;
            }
        }
        emit_pending(&mut e, prev, &mut run)?;

        if e.idx >= src.len() {
            return None; // no shrink
        }
        Some(e.idx)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if src.len() < 2 {
            return Err(Error::ProcessBlock("rlt stream too short".to_string()));
        }
        let corrupt = || Error::ProcessBlock("corrupt rlt stream".to_string());
        let escape = src[0];
        let mut i = 1usize;
        let mut o = 0usize;
        let mut push = |dst: &mut [u8], o: &mut usize, b: u8| -> Result<()> {
            if *o >= dst.len() {
                return Err(Error::ProcessBlock("rlt inverse overflow".to_string()));
            }
            dst[*o] = b;
            *o += 1;
            Ok(())
        };

        let first = src[i];
        i += 1;
        push(dst, &mut o, first)?;
        if first == escape {
            if i >= src.len() || src[i] != 0 {
                return Err(corrupt());
            }
            i += 1;
        }
        let mut prev = first;

        while i < src.len() {
            let b = src[i];
            i += 1;
            if b != escape {
                push(dst, &mut o, b)?;
                prev = b;
                continue;
            }
            let h = *src.get(i).ok_or_else(corrupt)?;
            i += 1;
            if h == 0 {
                push(dst, &mut o, escape)?;
                prev = escape;
                continue;
            }
            let v = if (h as usize) < RUN_LEN_ENCODE1 {
                h as usize
            } else if h != 0xFF {
                let lo = *src.get(i).ok_or_else(corrupt)? as usize;
                i += 1;
                RUN_LEN_ENCODE1 + (((h as usize - RUN_LEN_ENCODE1) << 8) | lo)
            } else {
                let hi = *src.get(i).ok_or_else(corrupt)? as usize;
                let lo = *src.get(i + 1).ok_or_else(corrupt)? as usize;
                i += 2;
                RUN_LEN_ENCODE2 + ((hi << 8) | lo)
            };
            let run = v + RUN_THRESHOLD;
            for _ in 0..run {
                push(dst, &mut o, prev)?;
            }
        }
        Ok(o)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        // Output must shrink; a bound of n lets the emitter decline inline.
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BlockContext {
        BlockContext::default()
    }

    fn round_trip(data: &[u8]) -> Option<Vec<u8>> {
        let mut fwd = RltCodec::new();
        let mut buf = vec![0u8; fwd.max_encoded_len(data.len())];
        let n = fwd.forward(&ctx(), data, &mut buf)?;
        buf.truncate(n);
        let mut inv = RltCodec::new();
        let mut out = vec![0u8; data.len() + 16];
        let m = inv.inverse(&ctx(), &buf, &mut out).unwrap();
        out.truncate(m);
        assert_eq!(out, data);
        Some(buf)
    }

    #[test]
    fn declines_below_sixteen_bytes() {
        let mut t = RltCodec::new();
        let mut buf = vec![0u8; 32];
        assert!(t.forward(&ctx(), b"aaaaaaaaaaaaaaa", &mut buf).is_none());
    }

    #[test]
    fn declines_on_excluded_data_types() {
        let mut t = RltCodec::new();
        let data = vec![b'A'; 1000];
        let mut buf = vec![0u8; 1000];
        for dt in [DataType::Dna, DataType::Base64, DataType::Utf8] {
            let c = BlockContext { data_type: dt };
            assert!(t.forward(&c, &data, &mut buf).is_none(), "{:?}", dt);
        }
    }

    #[test]
    fn long_single_byte_run_is_logarithmic() {
        for n in [100usize, 10_000, 80_000] {
            let data = vec![0x55u8; n];
            let encoded = round_trip(&data).expect("run must compress");
            assert!(encoded.len() < 24, "{} bytes for run of {}", encoded.len(), n);
        }
    }

    #[test]
    fn mixed_runs_round_trip() {
        let mut data = Vec::new();
        for i in 0..200u32 {
            let b = (i % 7) as u8;
            let len = 1 + (i as usize * 13) % 400;
            data.extend(std::iter::repeat(b).take(len));
        }
        round_trip(&data).expect("repetitive data must compress");
    }

    #[test]
    fn runs_of_the_escape_byte_round_trip() {
        // Byte 0 is rare so it becomes the escape; include runs of it.
        let mut data = vec![b'x'; 600];
        data.extend_from_slice(&[0u8; 40]);
        data.extend_from_slice(&[b'y'; 600]);
        data.push(0);
        round_trip(&data).expect("escape runs must round-trip");
    }

    #[test]
    fn first_byte_equal_to_escape_round_trips() {
        // All 256 values present with value 0 least frequent and first.
        let mut data = vec![0u8];
        for _ in 0..4 {
            for v in 1..=255u8 {
                data.extend(std::iter::repeat(v).take(8));
            }
        }
        round_trip(&data).expect("repetitive data must compress");
    }

    #[test]
    fn incompressible_data_declines() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 101 + 7) as u8).collect();
        let mut t = RltCodec::new();
        let mut buf = vec![0u8; t.max_encoded_len(data.len())];
        assert!(t.forward(&ctx(), &data, &mut buf).is_none());
    }

    #[test]
    fn boundary_run_lengths_round_trip() {
        // Exercise the 1/2/3-byte extension boundaries: v in {1, 223, 224,
        // 6943, 6944} plus the maximum run.
        for extra in [
            RUN_THRESHOLD + 1,
            RUN_LEN_ENCODE1 + RUN_THRESHOLD - 1,
            RUN_LEN_ENCODE1 + RUN_THRESHOLD,
            RUN_LEN_ENCODE2 + RUN_THRESHOLD - 1,
            RUN_LEN_ENCODE2 + RUN_THRESHOLD,
            MAX_RUN_VALUE + RUN_THRESHOLD,
            MAX_RUN_VALUE + RUN_THRESHOLD + 5,
        ] {
            let mut data = vec![b'a'; 8];
            data.extend(std::iter::repeat(b'r').take(extra + 1));
            data.extend_from_slice(b"tailtail");
            round_trip(&data).expect("run must compress");
        }
    }
}
