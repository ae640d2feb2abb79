//! Encode pipeline: block slicing, per-block transform+entropy staging, and
//! gate-ordered emission into the shared bitstream.
//!
//! The writer accumulates input into block-sized buffers. Every `jobs`
//! blocks form a wave: each block is handed to the worker pool, where the
//! transform chain and entropy coder run against a private staging buffer;
//! only the final length-prefix-plus-payload emit touches the shared
//! writer, serialized by the block gate. Workers report per-block status
//! over a channel and the first failing block wins error reporting.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::bitstream::BitWriter;
use crate::block::frame::{write_block_header, write_frame, write_terminator};
use crate::block::header::{write_header, Header, VERSION};
use crate::block::CompressorConfig;
use crate::entropy::EntropyType;
use crate::error::{Error, Result};
use crate::hash::block_hash;
use crate::pool::{BlockGate, WorkerPool};
use crate::transform::{BlockContext, Sequence};
use crate::util::magic::{detect_type, entropy_1024, is_known_compressed, INCOMPRESSIBLE_THRESHOLD};

/// Blocks at or below this size are always copy blocks.
const TINY_BLOCK: usize = 15;

type SharedWriter = Arc<Mutex<BitWriter<Box<dyn Write + Send>>>>;

pub struct CompressedWriter {
    cfg: CompressorConfig,
    obs: SharedWriter,
    gate: Arc<BlockGate>,
    pool: WorkerPool,
    current: Vec<u8>,
    wave: Vec<Vec<u8>>,
    next_block_id: u64,
    status_tx: Sender<(u64, Result<u64>)>,
    status_rx: Receiver<(u64, Result<u64>)>,
    read_in: u64,
    errored: bool,
    closed: bool,
}

impl CompressedWriter {
    pub fn new(sink: Box<dyn Write + Send>, cfg: CompressorConfig) -> Result<Self> {
        cfg.validate()?;
        let jobs = cfg.effective_jobs();
        let pool = WorkerPool::new(jobs, jobs)?;
        let mut obs = BitWriter::new(sink);
        write_header(
            &mut obs,
            &Header {
                version: VERSION,
                checksum: cfg.checksum,
                entropy: cfg.entropy,
                transform: cfg.transform,
                block_size: cfg.block_size,
                orig_size: cfg.orig_size,
            },
        )?;
        let (status_tx, status_rx) = unbounded();
        let block_size = cfg.block_size;
        Ok(CompressedWriter {
            cfg,
            obs: Arc::new(Mutex::new(obs)),
            gate: Arc::new(BlockGate::new()),
            pool,
            current: Vec::with_capacity(block_size),
            wave: Vec::new(),
            next_block_id: 1,
            status_tx,
            status_rx,
            read_in: 0,
            errored: false,
            closed: false,
        })
    }

    /// Raw bytes accepted so far.
    pub fn bytes_read(&self) -> u64 {
        self.read_in
    }

    /// Compressed bits emitted so far (only settled after `close`).
    pub fn bytes_written(&self) -> u64 {
        self.obs.lock().unwrap().written().div_ceil(8)
    }

    fn queue_block(&mut self, data: Vec<u8>) -> Result<()> {
        self.wave.push(data);
        if self.wave.len() >= self.pool.num_threads() {
            self.dispatch_wave()?;
        }
        Ok(())
    }

    fn dispatch_wave(&mut self) -> Result<()> {
        if self.errored {
            return Err(Error::ProcessBlock("previous block failed".to_string()));
        }
        for data in self.wave.drain(..) {
            let id = self.next_block_id;
            self.next_block_id += 1;
            let cfg = self.cfg.clone();
            let obs = Arc::clone(&self.obs);
            let gate = Arc::clone(&self.gate);
            let tx = self.status_tx.clone();
            self.pool.submit(Box::new(move || {
                let outcome = encode_and_emit(&cfg, &data, id, &gate, &obs);
                if let Err(e) = &outcome {
                    if !matches!(e, Error::Canceled) {
                        gate.cancel();
                    }
                }
                let _ = tx.send((id, outcome));
            }));
        }
        self.pool.wait_idle();
        // First failing block id wins.
        let mut first: Option<(u64, Error)> = None;
        while let Ok((id, st)) = self.status_rx.try_recv() {
            if let Err(e) = st {
                if matches!(e, Error::Canceled) {
                    continue;
                }
                if first.as_ref().map_or(true, |(fid, _)| id < *fid) {
                    first = Some((id, e));
                }
            }
        }
        if let Some((_, e)) = first {
            self.errored = true;
            return Err(e);
        }
        Ok(())
    }

    /// Flush remaining blocks, emit the terminator, and close the shared
    /// stream. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if !self.current.is_empty() {
            let block = std::mem::take(&mut self.current);
            self.wave.push(block);
        }
        if !self.wave.is_empty() {
            self.dispatch_wave()?;
        }
        let mut obs = self.obs.lock().unwrap();
        write_terminator(&mut *obs)?;
        obs.close()
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.closed {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                Error::Closed.to_string(),
            ));
        }
        let mut consumed = 0usize;
        while consumed < buf.len() {
            let room = self.cfg.block_size - self.current.len();
            let take = room.min(buf.len() - consumed);
            self.current.extend_from_slice(&buf[consumed..consumed + take]);
            consumed += take;
            if self.current.len() == self.cfg.block_size {
                let block = std::mem::replace(
                    &mut self.current,
                    Vec::with_capacity(self.cfg.block_size),
                );
                self.queue_block(block)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            }
        }
        self.read_in += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        // Blocks only leave on boundaries or close; nothing to do here.
        Ok(())
    }
}

impl Drop for CompressedWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

/// Stage one block (transform + entropy into a private buffer), then emit
/// it under the gate. Returns the frame's bit count.
fn encode_and_emit(
    cfg: &CompressorConfig,
    data: &[u8],
    block_id: u64,
    gate: &BlockGate,
    obs: &SharedWriter,
) -> Result<u64> {
    let (staged, bits) = stage_block(cfg, data)?;
    gate.wait_for(block_id)?;
    let emit = {
        let mut obs = obs.lock().unwrap();
        write_frame(&mut *obs, bits, &staged)
    };
    match emit {
        Ok(()) => {
            gate.release(block_id);
            Ok(bits)
        }
        Err(e) => {
            // A partial frame poisons the stream; peers must stop.
            gate.cancel();
            Err(e)
        }
    }
}

/// Transform + entropy one block into a fresh staging buffer.
fn stage_block(cfg: &CompressorConfig, data: &[u8]) -> Result<(Vec<u8>, u64)> {
    let hash = if cfg.checksum {
        Some(block_hash(data))
    } else {
        None
    };
    let data_type = detect_type(data);
    let mut copy = data.len() <= TINY_BLOCK;
    if !copy
        && cfg.skip_blocks
        && (is_known_compressed(data) || entropy_1024(data) >= INCOMPRESSIBLE_THRESHOLD)
    {
        copy = true;
    }

    let mut transformed = Vec::new();
    let mut skip = 0xFFu8;
    let mut nb_transforms = 1usize;
    if !copy {
        let mut seq = Sequence::new(cfg.transform)?;
        nb_transforms = seq.len();
        let ctx = BlockContext { data_type };
        match seq.forward(&ctx, data, &mut transformed) {
            Some((len, s)) if len <= cfg.block_size => skip = s,
            // Declined or oversized output: fall back to a copy block.
            _ => copy = true,
        }
    }

    let (payload, entropy) = if copy {
        (data, EntropyType::None)
    } else {
        (transformed.as_slice(), cfg.entropy)
    };
    let mut sw = BitWriter::new(Vec::new());
    write_block_header(&mut sw, copy, nb_transforms, skip, payload.len(), hash)?;
    let mut enc = entropy.new_encoder();
    enc.encode(&mut sw, payload)?;
    enc.dispose(&mut sw)?;
    sw.close()?;
    let bits = sw.written();
    Ok((sw.into_inner(), bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_marks_tiny_blocks_as_copy() {
        let cfg = CompressorConfig::default();
        let (staged, bits) = stage_block(&cfg, b"A").unwrap();
        // mode byte + 1 length byte + 8 raw bits
        assert_eq!(bits, 24);
        assert_eq!(staged[0] & 0x80, 0x80);
        assert_eq!(staged[2], b'A');
    }

    #[test]
    fn stage_skip_policy_copies_incompressible_blocks() {
        let mut cfg = CompressorConfig {
            skip_blocks: true,
            entropy: EntropyType::Huffman,
            transform: crate::transform::parse_descriptor("RLT").unwrap(),
            ..Default::default()
        };
        cfg.block_size = 1 << 20;
        // Pseudo-random block scores above the incompressible threshold.
        let data: Vec<u8> = (0..65536u64)
            .map(|i| (i.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 56) as u8)
            .collect();
        assert!(entropy_1024(&data) >= INCOMPRESSIBLE_THRESHOLD);
        let (staged, _) = stage_block(&cfg, &data).unwrap();
        assert_eq!(staged[0] & 0x80, 0x80, "copy flag expected");
    }

    #[test]
    fn stage_applies_transform_and_entropy_when_profitable() {
        let cfg = CompressorConfig {
            entropy: EntropyType::Huffman,
            transform: crate::transform::parse_descriptor("RLT").unwrap(),
            block_size: 1 << 20,
            ..Default::default()
        };
        let data = vec![0x55u8; 10_000];
        let (staged, bits) = stage_block(&cfg, &data).unwrap();
        assert_eq!(staged[0] & 0x80, 0, "transform path expected");
        assert!(bits < 10_000, "staged {} bits", bits);
    }
}
