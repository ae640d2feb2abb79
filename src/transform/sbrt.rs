//! Sort-by-rank transforms: RANK and SRT.
//!
//! Both replace each byte with its position in a self-organizing list and
//! then promote the symbol; they differ only in the promotion rule. RANK
//! swaps the symbol one position toward the front (frequency-flavored),
//! SRT jumps it halfway to the front (recency-flavored). The decoder keeps
//! the identical list, so inversion is a table lookup plus the same
//! promotion.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Rank,
    Recency,
}

pub struct SbrTransform {
    mode: Mode,
    table: [u8; 256],
}

impl SbrTransform {
    pub fn rank() -> Self {
        SbrTransform {
            mode: Mode::Rank,
            table: [0; 256],
        }
    }

    pub fn recency() -> Self {
        SbrTransform {
            mode: Mode::Recency,
            table: [0; 256],
        }
    }

    fn reset(&mut self) {
        for (i, t) in self.table.iter_mut().enumerate() {
            *t = i as u8;
        }
    }

    #[inline]
    fn promote(&mut self, pos: usize) {
        match self.mode {
            Mode::Rank => {
                if pos > 0 {
                    self.table.swap(pos, pos - 1);
                }
            }
            Mode::Recency => {
                let target = pos / 2;
                let b = self.table[pos];
                self.table.copy_within(target..pos, target + 1);
                self.table[target] = b;
            }
        }
    }
}

impl ByteTransform for SbrTransform {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        if dst.len() < src.len() {
            return None;
        }
        self.reset();
        for (i, &b) in src.iter().enumerate() {
            let pos = self.table.iter().position(|&s| s == b).unwrap();
            dst[i] = pos as u8;
            self.promote(pos);
        }
        Some(src.len())
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if dst.len() < src.len() {
            return Err(Error::ProcessBlock("sbrt inverse overflow".to_string()));
        }
        self.reset();
        for (i, &rank) in src.iter().enumerate() {
            let pos = rank as usize;
            dst[i] = self.table[pos];
            self.promote(pos);
        }
        Ok(src.len())
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
