//! Multimedia delta filter.
//!
//! Raw sample data (PCM audio, uncompressed bitmaps) correlates at a small
//! fixed stride. The filter picks the stride in {1,2,3,4} with the smallest
//! sampled absolute delta sum and emits a one-byte header followed by the
//! first `stride` bytes raw and wrapping deltas for the rest. Applies only
//! when the multimedia hint is set.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};
use crate::util::magic::DataType;

const MIN_BLOCK_LEN: usize = 64;

pub struct MmFilter;

impl MmFilter {
    pub fn new() -> Self {
        MmFilter
    }

    fn best_stride(src: &[u8]) -> usize {
        let mut best = 1usize;
        let mut best_score = u64::MAX;
        for stride in 1..=4usize {
            let mut score = 0u64;
            let mut samples = 0u64;
            let mut i = stride;
            while i < src.len() && samples < 8192 {
                let d = src[i] as i32 - src[i - stride] as i32;
                score += d.unsigned_abs() as u64;
                samples += 1;
                i += 7; // sparse sampling keeps the probe cheap
            }
            if samples > 0 && score < best_score {
                best_score = score;
                best = stride;
            }
        }
        best
    }
}

impl Default for MmFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteTransform for MmFilter {
    fn forward(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN || ctx.data_type != DataType::Multimedia || dst.len() < n + 1 {
            return None;
        }
        let stride = Self::best_stride(src);
        dst[0] = stride as u8;
        dst[1..1 + stride].copy_from_slice(&src[..stride]);
        for i in stride..n {
            dst[1 + i] = src[i].wrapping_sub(src[i - stride]);
        }
        Some(n + 1)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt mm stream".to_string());
        if src.len() < 2 {
            return Err(corrupt());
        }
        let stride = src[0] as usize;
        if !(1..=4).contains(&stride) {
            return Err(corrupt());
        }
        let n = src.len() - 1;
        if n < stride || dst.len() < n {
            return Err(Error::ProcessBlock("mm inverse overflow".to_string()));
        }
        dst[..stride].copy_from_slice(&src[1..1 + stride]);
        for i in stride..n {
            dst[i] = src[1 + i].wrapping_add(dst[i - stride]);
        }
        Ok(n)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mm_ctx() -> BlockContext {
        BlockContext {
            data_type: DataType::Multimedia,
        }
    }

    #[test]
    fn smooth_waveform_deltas_concentrate_near_zero() {
        // Interleaved channels: a slow ramp and a constant. Stride 2 sees
        // deltas of 1 and 0; any other stride mixes the channels.
        let data: Vec<u8> = (0..8192)
            .map(|i| if i % 2 == 0 { (i / 2 % 256) as u8 } else { 0x40 })
            .collect();
        let mut t = MmFilter::new();
        let mut fwd = vec![0u8; t.max_encoded_len(data.len())];
        let n = t.forward(&mm_ctx(), &data, &mut fwd).expect("applies");
        fwd.truncate(n);
        assert_eq!(fwd[0], 2);
        let near_zero = fwd[3..].iter().filter(|&&b| b < 8 || b > 248).count();
        assert!(near_zero > (n - 3) * 3 / 4);

        let mut back = vec![0u8; data.len()];
        let m = MmFilter::new().inverse(&mm_ctx(), &fwd, &mut back).unwrap();
        back.truncate(m);
        assert_eq!(back, data);
    }

    #[test]
    fn round_trips_every_stride() {
        for stride in 1..=4usize {
            let data: Vec<u8> = (0..2000).map(|i| ((i / stride) % 256) as u8).collect();
            let mut fwd = vec![0u8; data.len() + 1];
            let n = MmFilter::new().forward(&mm_ctx(), &data, &mut fwd).unwrap();
            fwd.truncate(n);
            let mut back = vec![0u8; data.len()];
            MmFilter::new().inverse(&mm_ctx(), &fwd, &mut back).unwrap();
            assert_eq!(back, data);
        }
    }

    #[test]
    fn declines_without_multimedia_hint() {
        let data = vec![1u8; 1024];
        let mut buf = vec![0u8; 1025];
        assert!(MmFilter::new()
            .forward(&BlockContext::default(), &data, &mut buf)
            .is_none());
    }
}
