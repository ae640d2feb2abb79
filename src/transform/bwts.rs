//! Bijective Burrows-Wheeler transform (Scott variant).
//!
//! Forward factors the input into Lyndon words (Duval), sorts the rotations
//! of every word by their infinite periodic expansion (ties keep text
//! order), and emits each rotation's last character. No primary index is
//! needed: the inverse walks the cycles of the stable-sort next table,
//! smallest unvisited start first, filling the output back to front.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

/// The periodic comparator is quadratic in the worst case; keep blocks
/// moderate.
pub const MAX_BWTS_BLOCK: usize = 4 * 1024 * 1024;
const MIN_BLOCK_LEN: usize = 16;

pub struct BwtsTransform;

impl BwtsTransform {
    pub fn new() -> Self {
        BwtsTransform
    }
}

impl Default for BwtsTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Duval's algorithm: the unique non-increasing Lyndon factorization,
/// returned as (start, length) pairs.
fn lyndon_factors(s: &[u8]) -> Vec<(usize, usize)> {
    let n = s.len();
    let mut factors = Vec::new();
    let mut i = 0usize;
    while i < n {
        let mut j = i + 1;
        let mut k = i;
        while j < n && s[k] <= s[j] {
            if s[k] < s[j] {
                k = i;
            } else {
                k += 1;
            }
            j += 1;
        }
        while i <= k {
            factors.push((i, j - k));
            i += j - k;
        }
    }
    factors
}

/// Compare two rotations as infinite periodic words. `a`/`b` are absolute
/// rotation start positions inside their words.
fn cmp_periodic(s: &[u8], (sa, la, pa): (usize, usize, usize), (sb, lb, pb): (usize, usize, usize)) -> Ordering {
    let limit = la + lb;
    for t in 0..limit {
        let ca = s[sa + (pa - sa + t) % la];
        let cb = s[sb + (pb - sb + t) % lb];
        match ca.cmp(&cb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl ByteTransform for BwtsTransform {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if !(MIN_BLOCK_LEN..=MAX_BWTS_BLOCK).contains(&n) || dst.len() < n {
            return None;
        }
        let factors = lyndon_factors(src);
        // word_of[p] = (start, len) of the factor containing position p.
        let mut word_of = vec![(0usize, 0usize); n];
        for &(st, len) in &factors {
            for w in word_of[st..st + len].iter_mut() {
                *w = (st, len);
            }
        }
        let mut rotations: Vec<u32> = (0..n as u32).collect();
        rotations.sort_by(|&a, &b| {
            let (sa, la) = word_of[a as usize];
            let (sb, lb) = word_of[b as usize];
            cmp_periodic(src, (sa, la, a as usize), (sb, lb, b as usize))
        });
        for (i, &p) in rotations.iter().enumerate() {
            let (st, len) = word_of[p as usize];
            let last = st + (p as usize - st + len - 1) % len;
            dst[i] = src[last];
        }
        Some(n)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let n = src.len();
        if dst.len() < n {
            return Err(Error::ProcessBlock("bwts inverse overflow".to_string()));
        }
        if n == 0 {
            return Ok(0);
        }
        // Stable counting sort next table, as in plain BWT inversion.
        let mut offsets = [0usize; 257];
        for &b in src {
            offsets[b as usize + 1] += 1;
        }
        for c in 0..256 {
            offsets[c + 1] += offsets[c];
        }
        let mut next = vec![-1i64; n];
        for (i, &b) in src.iter().enumerate() {
            next[offsets[b as usize]] = i as i64;
            offsets[b as usize] += 1;
        }
        // Decode cycles: each cycle is one Lyndon word; cycles discovered
        // from the smallest start fill the output right to left.
        let mut j = n as i64 - 1;
        for i in 0..n {
            if next[i] < 0 {
                continue;
            }
            let mut p = i;
            loop {
                dst[j as usize] = src[p];
                j -= 1;
                let t = next[p];
                next[p] = -1;
                p = t as usize;
                if next[p] < 0 {
                    break;
                }
            }
        }
        if j != -1 {
            return Err(Error::ProcessBlock("bwts cycle walk incomplete".to_string()));
        }
        Ok(n)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
