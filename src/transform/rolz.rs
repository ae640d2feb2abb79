//! Reduced-offset LZ codec (ROLZ and ROLZX).
//!
//! Matches are addressed by a slot into a per-context ring of recent
//! positions instead of a raw offset; the context is the previous byte.
//! Items are grouped eight per flag byte (bit set = match). ROLZ keeps 4
//! positions per context (2-bit slot, 6-bit length), ROLZX 16 (4-bit slot,
//! 4-bit length); saturated length fields chain one extension byte.
//! Encoder and decoder perform the identical ring updates, so slots always
//! resolve to the same positions.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};

const MIN_MATCH: usize = 4;
const MIN_BLOCK_LEN: usize = 64;

pub struct RolzCodec {
    /// ROLZX mode: wider rings, shorter length field.
    extended: bool,
}

impl RolzCodec {
    pub fn new(extended: bool) -> Self {
        RolzCodec { extended }
    }

    fn positions_log(&self) -> usize {
        if self.extended {
            4
        } else {
            2
        }
    }

    fn len_bits(&self) -> usize {
        8 - self.positions_log()
    }
}

struct Ring {
    positions: Vec<u32>,
    heads: Vec<u32>,
    k: usize,
}

impl Ring {
    fn new(k: usize) -> Self {
        Ring {
            positions: vec![0; 256 * k],
            heads: vec![0; 256],
            k,
        }
    }

    #[inline]
    fn push(&mut self, ctx: usize, pos: usize) {
        let h = self.heads[ctx] as usize;
        self.positions[ctx * self.k + (h & (self.k - 1))] = pos as u32;
        self.heads[ctx] = (h + 1) as u32;
    }

    /// Position stored `slot` pushes ago, or None if not yet filled.
    #[inline]
    fn get(&self, ctx: usize, slot: usize) -> Option<usize> {
        let h = self.heads[ctx] as usize;
        if slot >= h.min(self.k) {
            return None;
        }
        let idx = (h - 1 - slot) & (self.k - 1);
        Some(self.positions[ctx * self.k + idx] as usize)
    }
}

enum Item {
    Literal(u8),
    Match { slot: usize, len: usize },
}

impl ByteTransform for RolzCodec {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN {
            return None;
        }
        let k = 1 << self.positions_log();
        let len_bits = self.len_bits();
        let len_max = (1 << len_bits) - 1; // saturation marker
        let mut ring = Ring::new(k);
        let mut items: Vec<Item> = Vec::new();
        let mut i = 0usize;
        items.push(Item::Literal(src[0]));
        i += 1;
        while i < n {
            let ctx = src[i - 1] as usize;
            let mut best_len = 0usize;
            let mut best_slot = 0usize;
            for slot in 0..k {
                let Some(pos) = ring.get(ctx, slot) else { break };
                let max = (n - i).min(MIN_MATCH + len_max - 1 + 255);
                let mut l = 0usize;
                while l < max && src[pos + l] == src[i + l] {
                    l += 1;
                }
                if l > best_len {
                    best_len = l;
                    best_slot = slot;
                }
            }
            ring.push(ctx, i);
            if best_len >= MIN_MATCH {
                items.push(Item::Match {
                    slot: best_slot,
                    len: best_len,
                });
                i += best_len;
            } else {
                items.push(Item::Literal(src[i]));
                i += 1;
            }
        }

        // Serialize: flag byte per 8 items, then the item payloads.
        let mut o = 0usize;
        let mut push = |dst: &mut [u8], o: &mut usize, b: u8| -> Option<()> {
            if *o >= dst.len() {
                return None;
            }
            dst[*o] = b;
            *o += 1;
            Some(())
        };
        for group in items.chunks(8) {
            let mut flags = 0u8;
            for (j, item) in group.iter().enumerate() {
                if matches!(item, Item::Match { .. }) {
                    flags |= 0x80 >> j;
                }
            }
            push(dst, &mut o, flags)?;
            for item in group {
                match *item {
                    Item::Literal(b) => push(dst, &mut o, b)?,
                    Item::Match { slot, len } => {
                        let v = len - MIN_MATCH;
                        if v < len_max {
                            push(dst, &mut o, ((slot << len_bits) | v) as u8)?;
                        } else {
                            push(dst, &mut o, ((slot << len_bits) | len_max) as u8)?;
                            push(dst, &mut o, (v - len_max) as u8)?;
                        }
                    }
                }
            }
        }
        if o >= n {
            return None;
        }
        Some(o)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let corrupt = || Error::ProcessBlock("corrupt rolz stream".to_string());
        let overflow = || Error::ProcessBlock("rolz inverse overflow".to_string());
        let k = 1 << self.positions_log();
        let len_bits = self.len_bits();
        let len_max = (1usize << len_bits) - 1;
        let slot_shift = len_bits;
        let mut ring = Ring::new(k);
        let mut i = 0usize;
        let mut o = 0usize;
        let mut first = true;
        while i < src.len() {
            let flags = src[i];
            i += 1;
            for j in 0..8 {
                if i >= src.len() {
                    break;
                }
                let is_match = flags & (0x80 >> j) != 0;
                if first {
                    if is_match {
                        return Err(corrupt());
                    }
                    if o >= dst.len() {
                        return Err(overflow());
                    }
                    dst[o] = src[i];
                    o += 1;
                    i += 1;
                    first = false;
                    continue;
                }
                let ctx = dst[o - 1] as usize;
                if is_match {
                    let b = src[i] as usize;
                    i += 1;
                    let slot = b >> slot_shift;
                    let mut v = b & len_max;
                    if v == len_max {
                        v += *src.get(i).ok_or_else(corrupt)? as usize;
                        i += 1;
                    }
                    let len = v + MIN_MATCH;
                    // Slot resolution sees the pre-push ring, exactly like
                    // the encoder's search.
                    let pos = ring.get(ctx, slot).ok_or_else(corrupt)?;
                    ring.push(ctx, o);
                    if o + len > dst.len() {
                        return Err(overflow());
                    }
                    for t in 0..len {
                        dst[o + t] = dst[pos + t];
                    }
                    o += len;
                } else {
                    ring.push(ctx, o);
                    if o >= dst.len() {
                        return Err(overflow());
                    }
                    dst[o] = src[i];
                    o += 1;
                    i += 1;
                }
            }
        }
        Ok(o)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
