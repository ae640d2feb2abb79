//! Container pipelines: framed bitstream, encode and decode engines.

pub mod compress;
pub mod decompress;
pub mod frame;
pub mod header;

pub use compress::CompressedWriter;
pub use decompress::CompressedReader;

use crate::entropy::EntropyType;
use crate::error::{Error, Result};
use header::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};

pub const MIN_JOBS: usize = 1;
pub const MAX_JOBS: usize = 64;

/// Per-session configuration shared by every block task.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// 48-bit transform descriptor.
    pub transform: u64,
    pub entropy: EntropyType,
    pub block_size: usize,
    /// Store and verify per-block content hashes.
    pub checksum: bool,
    pub jobs: usize,
    /// Detect and bypass incompressible blocks.
    pub skip_blocks: bool,
    /// Uncompressed input size when known up front; 0 = unknown.
    pub orig_size: u64,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig {
            transform: 0,
            entropy: EntropyType::None,
            block_size: 4 << 20,
            checksum: false,
            jobs: 1,
            skip_blocks: false,
            orig_size: 0,
        }
    }
}

impl CompressorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&self.block_size) {
            return Err(Error::BlockSize(format!(
                "{} not in [{}, {}]",
                self.block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if self.block_size % 16 != 0 {
            return Err(Error::BlockSize(format!(
                "{} not a multiple of 16",
                self.block_size
            )));
        }
        if !(MIN_JOBS..=MAX_JOBS).contains(&self.jobs) {
            return Err(Error::InvalidParam(format!(
                "jobs {} not in [{}, {}]",
                self.jobs, MIN_JOBS, MAX_JOBS
            )));
        }
        crate::transform::unpack_descriptor(self.transform)?;
        Ok(())
    }

    /// Worker count actually used: bounded by the number of blocks when the
    /// input size is known.
    pub fn effective_jobs(&self) -> usize {
        let mut jobs = self.jobs;
        if self.orig_size > 0 {
            let blocks = self.orig_size.div_ceil(self.block_size as u64).max(1);
            jobs = jobs.min(blocks as usize);
        }
        jobs.clamp(MIN_JOBS, MAX_JOBS)
    }
}
