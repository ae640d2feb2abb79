//! Shared helpers for the integration suite: in-memory compression round
//! trips over every pipeline knob.
//!
//! Not every binary uses every helper.
#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

use knz::block::{CompressedReader, CompressedWriter, CompressorConfig};
use knz::entropy::EntropyType;
use knz::transform::parse_descriptor;

/// `Write` sink that shares its buffer with the test body.
pub struct SharedSink(pub Arc<Mutex<Vec<u8>>>);

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

pub fn config(
    transform: &str,
    entropy: &str,
    block_size: usize,
    jobs: usize,
    checksum: bool,
) -> CompressorConfig {
    CompressorConfig {
        transform: parse_descriptor(transform).unwrap(),
        entropy: EntropyType::from_name(entropy).unwrap(),
        block_size,
        checksum,
        jobs,
        skip_blocks: false,
        orig_size: 0,
    }
}

pub fn compress(data: &[u8], cfg: CompressorConfig) -> Vec<u8> {
    let sink = Arc::new(Mutex::new(Vec::new()));
    let mut w = CompressedWriter::new(Box::new(SharedSink(Arc::clone(&sink))), cfg)
        .expect("writer construction");
    w.write_all(data).expect("write");
    w.close().expect("close");
    drop(w);
    let out = sink.lock().unwrap().clone();
    out
}

pub fn decompress(bytes: &[u8], jobs: usize) -> Vec<u8> {
    let mut r = CompressedReader::new(Box::new(Cursor::new(bytes.to_vec())), jobs)
        .expect("reader construction");
    let mut out = Vec::new();
    r.read_to_end(&mut out).expect("decode");
    out
}

pub fn decompress_range(bytes: &[u8], jobs: usize, from: u64, to: u64) -> Vec<u8> {
    let mut r =
        CompressedReader::with_range(Box::new(Cursor::new(bytes.to_vec())), jobs, from, to)
            .expect("reader construction");
    let mut out = Vec::new();
    r.read_to_end(&mut out).expect("decode");
    out
}

/// Deterministic pseudo-random bytes (xorshift-style; no external seed
/// state so every test run sees the same data).
pub fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        out.push((seed >> 32) as u8);
    }
    out
}

/// English-ish text of the requested length.
pub fn sample_text(len: usize) -> Vec<u8> {
    let phrase = b"It is a truth universally acknowledged, that a single block in \
possession of a good transform, must be in want of an entropy coder. ";
    phrase.iter().cycle().take(len).copied().collect()
}
