//! Reversible byte transforms and the per-block transform sequence.
//!
//! A transform either applies (returning its output length) or declines;
//! declining is normal control flow, not an error. The [`Sequence`] composes
//! up to eight transforms from the 48-bit container descriptor, negotiates
//! the per-block skip mask, and ping-pongs between two owned buffers so a
//! transform never sees aliasing source and destination.

pub mod bwt;
pub mod bwts;
pub mod dna;
pub mod exe;
pub mod lz;
pub mod lzp;
pub mod mm;
pub mod mtft;
pub mod pack;
pub mod rlt;
pub mod rolz;
pub mod sbrt;
pub mod text;
pub mod utf;
pub mod zrlt;

use crate::error::{Error, Result};
use crate::util::magic::DataType;

/// Per-block context handed to every transform.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockContext {
    /// Content hint detected from the raw block.
    pub data_type: DataType,
}

/// Forward/inverse reversible byte-array transform.
///
/// `forward` returns `None` when the transform is not applicable or not
/// profitable for this block; the caller then treats it as skipped.
/// `inverse` failing is a real error: the bitstream promised this transform
/// was applied.
pub trait ByteTransform: Send {
    fn forward(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize>;
    fn inverse(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize>;
    /// Conservative upper bound on forward output length for `n` input bytes.
    fn max_encoded_len(&self, n: usize) -> usize;
}

/// 6-bit transform ids as stored in the container descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransformType {
    None = 0,
    Pack = 1,
    Bwt = 2,
    Bwts = 3,
    Lz = 4,
    Lzx = 5,
    Lzp = 6,
    Rolz = 7,
    Rolzx = 8,
    Rlt = 9,
    Zrlt = 10,
    Mtft = 11,
    Rank = 12,
    Srt = 13,
    Text = 14,
    Exe = 15,
    Mm = 16,
    Utf = 17,
    Dna = 18,
}

impl TransformType {
    pub fn from_id(id: u8) -> Result<Self> {
        Ok(match id {
            0 => TransformType::None,
            1 => TransformType::Pack,
            2 => TransformType::Bwt,
            3 => TransformType::Bwts,
            4 => TransformType::Lz,
            5 => TransformType::Lzx,
            6 => TransformType::Lzp,
            7 => TransformType::Rolz,
            8 => TransformType::Rolzx,
            9 => TransformType::Rlt,
            10 => TransformType::Zrlt,
            11 => TransformType::Mtft,
            12 => TransformType::Rank,
            13 => TransformType::Srt,
            14 => TransformType::Text,
            15 => TransformType::Exe,
            16 => TransformType::Mm,
            17 => TransformType::Utf,
            18 => TransformType::Dna,
            _ => return Err(Error::InvalidCodec(format!("transform id {}", id))),
        })
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformType::None => "NONE",
            TransformType::Pack => "PACK",
            TransformType::Bwt => "BWT",
            TransformType::Bwts => "BWTS",
            TransformType::Lz => "LZ",
            TransformType::Lzx => "LZX",
            TransformType::Lzp => "LZP",
            TransformType::Rolz => "ROLZ",
            TransformType::Rolzx => "ROLZX",
            TransformType::Rlt => "RLT",
            TransformType::Zrlt => "ZRLT",
            TransformType::Mtft => "MTFT",
            TransformType::Rank => "RANK",
            TransformType::Srt => "SRT",
            TransformType::Text => "TEXT",
            TransformType::Exe => "EXE",
            TransformType::Mm => "MM",
            TransformType::Utf => "UTF",
            TransformType::Dna => "DNA",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.to_ascii_uppercase();
        for id in 0..=18u8 {
            let t = TransformType::from_id(id).unwrap();
            if t.name() == upper {
                return Ok(t);
            }
        }
        Err(Error::InvalidCodec(format!("transform name {}", name)))
    }

    /// Fresh transform instance for one block.
    pub fn new_transform(self) -> Box<dyn ByteTransform> {
        match self {
            TransformType::None => Box::new(NullTransform),
            TransformType::Pack => Box::new(pack::PackTransform::new()),
            TransformType::Bwt => Box::new(bwt::BwtTransform::new()),
            TransformType::Bwts => Box::new(bwts::BwtsTransform::new()),
            TransformType::Lz => Box::new(lz::LzCodec::new(false)),
            TransformType::Lzx => Box::new(lz::LzCodec::new(true)),
            TransformType::Lzp => Box::new(lzp::LzpCodec::new()),
            TransformType::Rolz => Box::new(rolz::RolzCodec::new(false)),
            TransformType::Rolzx => Box::new(rolz::RolzCodec::new(true)),
            TransformType::Rlt => Box::new(rlt::RltCodec::new()),
            TransformType::Zrlt => Box::new(zrlt::ZrltCodec::new()),
            TransformType::Mtft => Box::new(mtft::MtftTransform::new()),
            TransformType::Rank => Box::new(sbrt::SbrTransform::rank()),
            TransformType::Srt => Box::new(sbrt::SbrTransform::recency()),
            TransformType::Text => Box::new(text::TextCodec::new()),
            TransformType::Exe => Box::new(exe::ExeCodec::new()),
            TransformType::Mm => Box::new(mm::MmFilter::new()),
            TransformType::Utf => Box::new(utf::UtfCodec::new()),
            TransformType::Dna => Box::new(dna::DnaCodec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor packing: eight 6-bit ids, leftmost transform in the highest
// bits, trailing NONE as padding.
// ---------------------------------------------------------------------------

pub const MAX_SEQUENCE_LEN: usize = 8;

/// Pack up to eight transform types into the 48-bit descriptor.
pub fn pack_descriptor(types: &[TransformType]) -> Result<u64> {
    if types.len() > MAX_SEQUENCE_LEN {
        return Err(Error::InvalidParam(format!(
            "{} transforms in sequence (max {})",
            types.len(),
            MAX_SEQUENCE_LEN
        )));
    }
    let mut d = 0u64;
    for (i, t) in types.iter().enumerate() {
        d |= (t.id() as u64) << (42 - 6 * i);
    }
    Ok(d)
}

/// Unpack the descriptor into the declared (non-NONE) transform list.
pub fn unpack_descriptor(descriptor: u64) -> Result<Vec<TransformType>> {
    let mut types = Vec::new();
    for i in 0..MAX_SEQUENCE_LEN {
        let id = ((descriptor >> (42 - 6 * i)) & 0x3F) as u8;
        let t = TransformType::from_id(id)?;
        if t != TransformType::None {
            types.push(t);
        }
    }
    Ok(types)
}

/// Render a descriptor as `NAME+NAME` (or `NONE` when empty).
pub fn descriptor_name(descriptor: u64) -> String {
    let types = match unpack_descriptor(descriptor) {
        Ok(t) => t,
        Err(_) => return "?".to_string(),
    };
    if types.is_empty() {
        return "NONE".to_string();
    }
    types
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join("+")
}

/// Parse `NAME+NAME` into a descriptor.
pub fn parse_descriptor(spec: &str) -> Result<u64> {
    let mut types = Vec::new();
    for part in spec.split('+') {
        let t = TransformType::from_name(part.trim())?;
        if t != TransformType::None {
            types.push(t);
        }
    }
    pack_descriptor(&types)
}

// ---------------------------------------------------------------------------
// Null transform (id NONE)
// ---------------------------------------------------------------------------

/// Identity transform used when the descriptor names no other transform.
pub struct NullTransform;

impl ByteTransform for NullTransform {
    fn forward(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        if dst.len() < src.len() {
            return None;
        }
        dst[..src.len()].copy_from_slice(src);
        Some(src.len())
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        if dst.len() < src.len() {
            return Err(Error::ProcessBlock("null inverse overflow".to_string()));
        }
        dst[..src.len()].copy_from_slice(src);
        Ok(src.len())
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Ordered composition of up to eight transforms with skip negotiation.
pub struct Sequence {
    entries: Vec<Box<dyn ByteTransform>>,
}

impl Sequence {
    /// Build fresh transform instances from a descriptor. An all-NONE
    /// descriptor yields a single null transform.
    pub fn new(descriptor: u64) -> Result<Self> {
        let types = unpack_descriptor(descriptor)?;
        let entries: Vec<Box<dyn ByteTransform>> = if types.is_empty() {
            vec![Box::new(NullTransform)]
        } else {
            types.iter().map(|t| t.new_transform()).collect()
        };
        Ok(Sequence { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the forward chain. Returns the output length and the skip mask,
    /// or `None` when every transform declined (caller must fall back to a
    /// copy block). On success `out` holds the final bytes.
    pub fn forward(
        &mut self,
        ctx: &BlockContext,
        src: &[u8],
        out: &mut Vec<u8>,
    ) -> Option<(usize, u8)> {
        let mut skip: u8 = 0xFF;
        let mut cur: Vec<u8> = Vec::new();
        let mut have_cur = false;
        let mut tmp: Vec<u8> = Vec::new();
        for (i, t) in self.entries.iter_mut().enumerate() {
            let input: &[u8] = if have_cur { &cur } else { src };
            if input.is_empty() {
                break;
            }
            let cap = t.max_encoded_len(input.len());
            tmp.resize(cap, 0);
            if let Some(written) = t.forward(ctx, input, &mut tmp) {
                tmp.truncate(written);
                std::mem::swap(&mut cur, &mut tmp);
                have_cur = true;
                skip &= !(0x80 >> i);
            }
            // A decline leaves the current side in place; the pair is
            // reused for the next transform.
        }
        if skip == 0xFF {
            return None;
        }
        out.clear();
        out.extend_from_slice(&cur);
        Some((out.len(), skip))
    }

    /// Run the inverse chain in reverse declared order, honoring the skip
    /// mask. `max_size` bounds every intermediate and the final output.
    pub fn inverse(
        &mut self,
        ctx: &BlockContext,
        src: &[u8],
        out: &mut Vec<u8>,
        skip: u8,
        max_size: usize,
    ) -> Result<usize> {
        if skip == 0xFF {
            out.clear();
            out.extend_from_slice(src);
            return Ok(src.len());
        }
        // Chained headers can push intermediates slightly past max_size.
        let cap = max_size + 256;
        let mut cur: Vec<u8> = Vec::new();
        let mut have_cur = false;
        let mut tmp: Vec<u8> = vec![0; cap];
        let n = self.entries.len();
        for (i, t) in self.entries.iter_mut().enumerate().rev() {
            if skip & (0x80 >> i) != 0 {
                continue;
            }
            let input: &[u8] = if have_cur { &cur } else { src };
            tmp.resize(cap, 0);
            let written = t.inverse(ctx, input, &mut tmp)?;
            if written > cap {
                return Err(Error::ProcessBlock(format!(
                    "inverse transform {} of {} overflowed",
                    i, n
                )));
            }
            tmp.truncate(written);
            std::mem::swap(&mut cur, &mut tmp);
            have_cur = true;
        }
        if !have_cur {
            cur.extend_from_slice(src);
        }
        if cur.len() > max_size {
            return Err(Error::ProcessBlock(format!(
                "inverse output {} exceeds block size {}",
                cur.len(),
                max_size
            )));
        }
        out.clear();
        out.append(&mut cur);
        Ok(out.len())
    }
}
