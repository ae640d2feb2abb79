//! Move-to-front transform.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

/// Classic MTF: each byte is replaced by its rank in a recency list, then
/// promoted to the front. Length-preserving and always applicable.
pub struct MtftTransform {
    table: [u8; 256],
}

impl MtftTransform {
    pub fn new() -> Self {
        let mut table = [0u8; 256];
        for (i, t) in table.iter_mut().enumerate() {
            *t = i as u8;
        }
        MtftTransform { table }
    }

    fn reset(&mut self) {
        for (i, t) in self.table.iter_mut().enumerate() {
            *t = i as u8;
        }
    }
}

impl Default for MtftTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteTransform for MtftTransform {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        if dst.len() < src.len() {
            return None;
        }
        self.reset();
        for (i, &b) in src.iter().enumerate() {
            let rank = self.table.iter().position(|&s| s == b).unwrap();
            dst[i] = rank as u8;
            self.table.copy_within(0..rank, 1);
            self.table[0] = b;
        }
        Some(src.len())
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if dst.len() < src.len() {
            return Err(Error::ProcessBlock("mtft inverse overflow".to_string()));
        }
        self.reset();
        for (i, &rank) in src.iter().enumerate() {
            let b = self.table[rank as usize];
            dst[i] = b;
            self.table.copy_within(0..rank as usize, 1);
            self.table[0] = b;
        }
        Ok(src.len())
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
