//! x86 branch target transform.
//!
//! Rewrites the 32-bit relative displacement after E8/E9 (call/jmp rel32)
//! opcodes into an absolute target, big-endian, so repeated calls to the
//! same function produce repeated byte patterns for the later stages. The
//! rewrite is unconditional at every opcode hit, which makes the inverse a
//! pure mirror with no side table. Applies only to blocks detected as
//! executables.

use crate::error::{Error, Result};
use crate::transform::{BlockContext, ByteTransform};
use crate::util::magic::DataType;

const MIN_BLOCK_LEN: usize = 64;

pub struct ExeCodec;

impl ExeCodec {
    pub fn new() -> Self {
        ExeCodec
    }

    fn looks_executable(ctx: &BlockContext, src: &[u8]) -> bool {
        if ctx.data_type == DataType::Executable {
            return true;
        }
        src.len() >= 4
            && (src.starts_with(&[0x7F, b'E', b'L', b'F'])
                || src.starts_with(b"MZ")
                || src.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
                || src.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
                || src.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
                || src.starts_with(&[0xCE, 0xFA, 0xED, 0xFE]))
    }
}

impl Default for ExeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteTransform for ExeCodec {
    fn forward(&mut self, ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Option<usize> {
        let n = src.len();
        if n < MIN_BLOCK_LEN || dst.len() < n || !Self::looks_executable(ctx, src) {
            return None;
        }
        dst[..n].copy_from_slice(src);
        let mut i = 0usize;
        while i + 5 <= n {
            if dst[i] == 0xE8 || dst[i] == 0xE9 {
                let rel = i32::from_le_bytes(dst[i + 1..i + 5].try_into().unwrap());
                let abs = rel.wrapping_add(i as i32);
                dst[i + 1..i + 5].copy_from_slice(&abs.to_be_bytes());
                i += 5;
            } else {
                i += 1;
            }
        }
        Some(n)
    }

    fn inverse(&mut self, _ctx: &BlockContext, src: &[u8], dst: &mut [u8]) -> Result<usize> {
        let n = src.len();
        if dst.len() < n {
            return Err(Error::ProcessBlock("exe inverse overflow".to_string()));
        }
        dst[..n].copy_from_slice(src);
        let mut i = 0usize;
        while i + 5 <= n {
            if dst[i] == 0xE8 || dst[i] == 0xE9 {
                let abs = i32::from_be_bytes(dst[i + 1..i + 5].try_into().unwrap());
                let rel = abs.wrapping_sub(i as i32);
                dst[i + 1..i + 5].copy_from_slice(&rel.to_le_bytes());
                i += 5;
            } else {
                i += 1;
            }
        }
        Ok(n)
    }

    fn max_encoded_len(&self, n: usize) -> usize {
        n
    }
}
