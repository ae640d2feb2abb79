//! Decode pipeline: gate-ordered frame draining, private entropy decode and
//! inverse transform, checksum verification, ordered delivery.
//!
//! Each worker holds the shared reader only long enough to copy its
//! frame's length prefix and payload into a private buffer, then releases
//! the gate and decodes in parallel. Results come back over a channel and
//! are delivered to the consumer strictly in block order. When a block
//! fails, verified blocks before it are still delivered; the error
//! surfaces once that prefix is consumed, and nothing at or after the
//! failing block ever reaches the consumer. An optional `[from, to)`
//! block range discards out-of-range frames after the gate has advanced
//! past them.

use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::bitstream::BitReader;
use crate::block::frame::{read_block_header, read_frame_prefix};
use crate::block::header::{read_header, Header};
use crate::entropy::{EntropyDecoder, RawCodec};
use crate::error::{Error, Result};
use crate::hash::block_hash;
use crate::pool::{BlockGate, WorkerPool};
use crate::transform::{BlockContext, Sequence};

type SharedReader = Arc<Mutex<BitReader<Box<dyn Read + Send>>>>;

enum Outcome {
    Decoded(Vec<u8>),
    Filtered,
    Eos,
}

pub struct CompressedReader {
    header: Header,
    ibs: SharedReader,
    gate: Arc<BlockGate>,
    pool: WorkerPool,
    queue: std::collections::VecDeque<Vec<u8>>,
    front_pos: usize,
    next_block_id: u64,
    from: u64,
    to: u64,
    status_tx: Sender<(u64, Result<Outcome>)>,
    status_rx: Receiver<(u64, Result<Outcome>)>,
    total_out: u64,
    eos: bool,
    failed: Option<Error>,
}

impl CompressedReader {
    pub fn new(source: Box<dyn Read + Send>, jobs: usize) -> Result<Self> {
        Self::with_range(source, jobs, 0, u64::MAX)
    }

    /// Decode only blocks with `from <= block_id < to` (1-based ids);
    /// frames outside the range are drained but produce no output.
    pub fn with_range(
        source: Box<dyn Read + Send>,
        jobs: usize,
        from: u64,
        to: u64,
    ) -> Result<Self> {
        let jobs = jobs.clamp(crate::block::MIN_JOBS, crate::block::MAX_JOBS);
        let mut ibs = BitReader::new(source);
        let header = read_header(&mut ibs)?;
        let pool = WorkerPool::new(jobs, jobs)?;
        let (status_tx, status_rx) = unbounded();
        Ok(CompressedReader {
            header,
            ibs: Arc::new(Mutex::new(ibs)),
            gate: Arc::new(BlockGate::new()),
            pool,
            queue: std::collections::VecDeque::new(),
            front_pos: 0,
            next_block_id: 1,
            from,
            to,
            status_tx,
            status_rx,
            total_out: 0,
            eos: false,
            failed: None,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decoded bytes delivered so far.
    pub fn bytes_written(&self) -> u64 {
        self.total_out
    }

    fn run_wave(&mut self) {
        let jobs = self.pool.num_threads();
        for k in 0..jobs {
            let id = self.next_block_id + k as u64;
            let header = self.header.clone();
            let ibs = Arc::clone(&self.ibs);
            let gate = Arc::clone(&self.gate);
            let tx = self.status_tx.clone();
            let (from, to) = (self.from, self.to);
            self.pool.submit(Box::new(move || {
                let outcome = drain_and_decode(&header, id, from, to, &gate, &ibs);
                if let Err(e) = &outcome {
                    if !matches!(e, Error::Canceled) {
                        gate.cancel();
                    }
                }
                let _ = tx.send((id, outcome));
            }));
        }
        self.pool.wait_idle();
        self.next_block_id += jobs as u64;

        let mut results: Vec<(u64, Result<Outcome>)> = Vec::with_capacity(jobs);
        while let Ok(r) = self.status_rx.try_recv() {
            results.push(r);
        }
        results.sort_by_key(|(id, _)| *id);
        for (_, res) in results {
            match res {
                Ok(Outcome::Decoded(data)) => {
                    // Blocks sorting after an error or the terminator are
                    // dropped; verified predecessors stay deliverable.
                    if self.eos {
                        continue;
                    }
                    self.total_out += data.len() as u64;
                    self.queue.push_back(data);
                }
                Ok(Outcome::Filtered) => {}
                Ok(Outcome::Eos) => self.eos = true,
                Err(Error::Canceled) => {}
                Err(e) => {
                    if self.failed.is_none() {
                        self.failed = Some(e);
                    }
                    self.eos = true;
                }
            }
        }
    }

    /// End-of-stream sanity: the recorded original size (when present) must
    /// match what was delivered. Only meaningful for full-range decodes.
    fn check_recorded_size(&self) -> Result<()> {
        if self.header.orig_size > 0
            && self.from <= 1
            && self.to == u64::MAX
            && self.total_out != self.header.orig_size
        {
            return Err(Error::CrcCheck(format!(
                "decoded {} bytes, header records {}",
                self.total_out, self.header.orig_size
            )));
        }
        Ok(())
    }
}

impl Read for CompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            if let Some(front) = self.queue.front() {
                let avail = &front[self.front_pos..];
                if !avail.is_empty() {
                    let take = avail.len().min(buf.len());
                    buf[..take].copy_from_slice(&avail[..take]);
                    self.front_pos += take;
                    if self.front_pos == front.len() {
                        self.queue.pop_front();
                        self.front_pos = 0;
                    }
                    return Ok(take);
                }
                self.queue.pop_front();
                self.front_pos = 0;
                continue;
            }
            // The queue holds only verified blocks that precede any
            // failure; once it is drained, a stored error surfaces.
            if let Some(e) = &self.failed {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e.to_string(),
                ));
            }
            if self.eos {
                self.check_recorded_size()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
                return Ok(0);
            }
            self.run_wave();
        }
    }
}

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

/// Copy one frame out of the shared stream under the gate, then decode it
/// privately.
fn drain_and_decode(
    header: &Header,
    block_id: u64,
    from: u64,
    to: u64,
    gate: &BlockGate,
    ibs: &SharedReader,
) -> Result<Outcome> {
    gate.wait_for(block_id)?;
    let payload = {
        let mut ibs = ibs.lock().unwrap();
        let written_bits = read_frame_prefix(&mut *ibs)?;
        if written_bits == 0 {
            drop(ibs);
            gate.cancel();
            return Ok(Outcome::Eos);
        }
        // The staged frame is bounded by the block plus codec expansion.
        let max_bits = (header.block_size as u64) * 16 + (1 << 16);
        if written_bits > max_bits {
            return Err(Error::ProcessBlock(format!(
                "frame of {} bits exceeds block budget",
                written_bits
            )));
        }
        let nbytes = written_bits.div_ceil(8) as usize;
        let mut payload = vec![0u8; nbytes];
        ibs.read_bits_into(&mut payload, written_bits as usize)?;
        payload
    };
    gate.release(block_id);

    if block_id < from || block_id >= to {
        return Ok(Outcome::Filtered);
    }

    let mut sr = BitReader::new(Cursor::new(payload));
    let bh = read_block_header(&mut sr, header.checksum)?;
    if bh.post_len == 0 {
        // Empty terminal block.
        return Ok(Outcome::Eos);
    }
    if !bh.copy && bh.post_len > header.block_size {
        return Err(Error::ProcessBlock(format!(
            "post-transform length {} exceeds block size",
            bh.post_len
        )));
    }

    let out = if bh.copy {
        let mut raw = vec![0u8; bh.post_len];
        RawCodec.decode(&mut sr, &mut raw)?;
        raw
    } else {
        let mut buf = vec![0u8; bh.post_len];
        let mut dec = header.entropy.new_decoder();
        let n = dec.decode(&mut sr, &mut buf)?;
        dec.dispose(&mut sr)?;
        if n != bh.post_len {
            return Err(Error::ProcessBlock(format!(
                "entropy decoded {} of {} bytes",
                n, bh.post_len
            )));
        }
        let mut seq = Sequence::new(header.transform)?;
        let ctx = BlockContext::default();
        let mut out = Vec::new();
        seq.inverse(&ctx, &buf, &mut out, bh.skip, header.block_size)?;
        out
    };

    if let Some(expected) = bh.hash {
        let actual = block_hash(&out);
        if actual != expected {
            return Err(Error::CrcCheck(format!(
                "block {}: stored {:08X}, computed {:08X}",
                block_id, expected, actual
            )));
        }
    }
    Ok(Outcome::Decoded(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::compress::CompressedWriter;
    use crate::block::CompressorConfig;
    use crate::entropy::EntropyType;
    use std::io::Write;

    fn compress(data: &[u8], cfg: CompressorConfig) -> Vec<u8> {
        let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        struct SharedSink(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedSink {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut w = CompressedWriter::new(Box::new(SharedSink(Arc::clone(&sink))), cfg).unwrap();
        w.write_all(data).unwrap();
        w.close().unwrap();
        let out = sink.lock().unwrap().clone();
        out
    }

    #[test]
    fn empty_input_is_header_plus_terminator_only() {
        let cfg = CompressorConfig {
            entropy: EntropyType::Huffman,
            transform: crate::transform::parse_descriptor("DNA+LZ").unwrap(),
            block_size: 1024,
            ..Default::default()
        };
        let bytes = compress(&[], cfg);
        // 136-bit header plus the 8-bit terminator frame.
        assert_eq!(bytes.len(), 18);

        let mut r = CompressedReader::new(Box::new(Cursor::new(bytes)), 2).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn single_byte_copy_block_round_trips() {
        let cfg = CompressorConfig {
            block_size: 1024,
            ..Default::default()
        };
        let bytes = compress(b"A", cfg);
        let mut r = CompressedReader::new(Box::new(Cursor::new(bytes)), 1).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"A");
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let cfg = CompressorConfig {
            checksum: true,
            entropy: EntropyType::Ans0,
            transform: crate::transform::parse_descriptor("TEXT+UTF+BWT+RANK+ZRLT").unwrap(),
            block_size: 8192,
            ..Default::default()
        };
        let data: Vec<u8> = b"Hello, World! ".iter().cycle().take(8 * 1024).copied().collect();
        let mut bytes = compress(&data, cfg);
        // Flip one bit inside the first frame's payload, past the header.
        let target = 20;
        bytes[target] ^= 0x01;
        let mut r = CompressedReader::new(Box::new(Cursor::new(bytes)), 2).unwrap();
        let mut out = Vec::new();
        let err = r.read_to_end(&mut out).unwrap_err();
        assert!(out.is_empty(), "no bytes may be exposed, got error {}", err);
    }
}
